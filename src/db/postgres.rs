//! PostgreSQL backend over a sqlx pool

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use super::{dedup_tables, format_create_table, DbResult, SqlBackend};

const TABLE_DEFINITION_SQL: &str = r#"
SELECT pg_attribute.attname::text, format_type(atttypid, atttypmod)
FROM pg_class
JOIN pg_namespace ON pg_namespace.oid = pg_class.relnamespace
JOIN pg_attribute ON pg_attribute.attrelid = pg_class.oid
WHERE pg_attribute.attnum > 0
    AND NOT pg_attribute.attisdropped
    AND pg_class.relname = $1
    AND pg_namespace.nspname = 'public'
ORDER BY pg_attribute.attnum
"#;

const TABLE_NAMES_SQL: &str = "SELECT tablename::text FROM pg_tables WHERE schemaname = 'public'";

const REFERENCING_TABLES_SQL: &str = r#"
SELECT a.relname::text
FROM pg_constraint con
JOIN pg_class a ON a.oid = con.conrelid
WHERE con.confrelid = (SELECT oid FROM pg_class WHERE relname = $1 LIMIT 1)
LIMIT $2
"#;

const REFERENCED_TABLES_SQL: &str = r#"
SELECT a.relname::text
FROM pg_constraint con
JOIN pg_class a ON a.oid = con.confrelid
WHERE con.conrelid = (SELECT oid FROM pg_class WHERE relname = $1 LIMIT 1)
LIMIT $2
"#;

/// Postgres connection pool plus the catalog queries agents need
#[derive(Clone)]
pub struct PostgresManager {
    pool: PgPool,
}

impl PostgresManager {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> DbResult<Self> {
        info!("Connecting to PostgreSQL with max {} connections", max_connections);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await?;

        info!("Successfully connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Wrap a statement so Postgres returns its rows as one JSON array
fn json_rows_query(sql: &str) -> String {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    format!(
        "SELECT COALESCE(json_agg(t), '[]'::json) FROM (\n{}\n) AS t",
        statement
    )
}

#[async_trait]
impl SqlBackend for PostgresManager {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn run_sql(&self, sql: &str) -> DbResult<String> {
        debug!("run_sql(): {}", sql);
        let rows: Value = sqlx::query_scalar(&json_rows_query(sql))
            .fetch_one(&self.pool)
            .await?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    async fn table_names(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(TABLE_NAMES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn table_definition(&self, table: &str) -> DbResult<String> {
        let columns: Vec<(String, String)> = sqlx::query_as(TABLE_DEFINITION_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;
        Ok(format_create_table(table, &columns))
    }

    async fn related_tables(&self, tables: &[String], n: usize) -> DbResult<Vec<String>> {
        let limit = n as i64;
        let mut related = Vec::new();

        for table in tables {
            for statement in [REFERENCING_TABLES_SQL, REFERENCED_TABLES_SQL] {
                let names: Vec<String> = sqlx::query_scalar(statement)
                    .bind(table)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?;
                related.extend(names);
            }
        }

        Ok(dedup_tables(related))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
