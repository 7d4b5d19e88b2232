//! SQL backends the agents query
//!
//! [`SqlBackend`] is the only surface the rest of the crate sees: run a
//! query and get JSON text back, list tables, and describe them as
//! `CREATE TABLE` statements for prompts.

mod error;
mod postgres;
mod presto;

pub use error::{DbError, DbResult};
pub use postgres::PostgresManager;
pub use presto::{PrestoClient, PrestoSettings};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A queryable SQL database
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Run a statement and return its rows as a pretty-printed JSON array of objects
    async fn run_sql(&self, sql: &str) -> DbResult<String>;

    /// Names of all user tables
    async fn table_names(&self) -> DbResult<Vec<String>>;

    /// `CREATE TABLE` text for one table
    async fn table_definition(&self, table: &str) -> DbResult<String>;

    /// Tables linked to any of `tables` by a foreign key in either direction,
    /// at most `n` per table and direction, without duplicates
    async fn related_tables(&self, tables: &[String], n: usize) -> DbResult<Vec<String>>;

    /// Table name to `CREATE TABLE` text for every table
    async fn table_definition_map(&self) -> DbResult<BTreeMap<String, String>> {
        let mut definitions = BTreeMap::new();
        for table in self.table_names().await? {
            let definition = self.table_definition(&table).await?;
            definitions.insert(table, definition);
        }
        Ok(definitions)
    }

    /// Every table definition joined by blank lines
    async fn table_definitions_for_prompt(&self) -> DbResult<String> {
        let definitions = self.table_definition_map().await?;
        Ok(definitions.into_values().collect::<Vec<_>>().join("\n\n"))
    }

    async fn close(&self) {}
}

/// Which SQL engine to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Postgres,
    Presto,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Postgres => write!(f, "postgres"),
            BackendKind::Presto => write!(f, "presto"),
        }
    }
}

/// Connect to the configured backend
pub async fn connect(settings: &crate::config::DatabaseSettings) -> DbResult<Arc<dyn SqlBackend>> {
    info!("Connecting to {} backend", settings.backend);

    match settings.backend {
        BackendKind::Postgres => {
            let url = settings.url.as_deref().ok_or_else(|| {
                DbError::Configuration("database.url is required for postgres".to_string())
            })?;
            let manager = PostgresManager::connect(
                url,
                settings.max_connections,
                settings.connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(manager))
        }
        BackendKind::Presto => {
            let presto = settings.presto.clone().ok_or_else(|| {
                DbError::Configuration("database.presto is required for presto".to_string())
            })?;
            Ok(Arc::new(PrestoClient::new(presto)?))
        }
    }
}

/// Render columns as `CREATE TABLE name (\ncol type,\n...\n);`
pub fn format_create_table(table: &str, columns: &[(String, String)]) -> String {
    let body = columns
        .iter()
        .map(|(name, data_type)| format!("{} {}", name, data_type))
        .collect::<Vec<_>>()
        .join(",\n");

    if body.is_empty() {
        format!("CREATE TABLE {} (\n);", table)
    } else {
        format!("CREATE TABLE {} (\n{}\n);", table, body)
    }
}

/// Order-preserving de-duplication
pub(crate) fn dedup_tables(tables: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tables
        .into_iter()
        .filter(|table| seen.insert(table.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_create_table() {
        let columns = vec![
            ("id".to_string(), "integer".to_string()),
            ("email".to_string(), "character varying(255)".to_string()),
        ];
        assert_eq!(
            format_create_table("users", &columns),
            "CREATE TABLE users (\nid integer,\nemail character varying(255)\n);"
        );
        assert_eq!(format_create_table("empty", &[]), "CREATE TABLE empty (\n);");
    }

    #[test]
    fn test_dedup_tables_keeps_first_occurrence() {
        let tables = vec!["orders", "users", "orders", "items"]
            .into_iter()
            .map(String::from);
        assert_eq!(dedup_tables(tables), vec!["orders", "users", "items"]);
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: BackendKind = serde_json::from_str("\"presto\"").unwrap();
        assert_eq!(kind, BackendKind::Presto);
        assert_eq!(BackendKind::default().to_string(), "postgres");
    }
}
