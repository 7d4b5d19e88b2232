//! Presto backend over the REST statement protocol
//!
//! A statement is POSTed to `/v1/statement`; results arrive in pages that are
//! fetched by following `nextUri` until the server stops returning one.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{format_create_table, DbError, DbResult, SqlBackend};

fn default_scheme() -> String {
    "http".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Connection settings for a Presto coordinator
#[derive(Debug, Clone, Deserialize)]
pub struct PrestoSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub catalog: String,
    pub schema: String,
    #[serde(default = "default_scheme")]
    pub http_scheme: String,
    /// Enables basic auth when set
    #[serde(default)]
    pub password: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementPage {
    #[serde(default)]
    next_uri: Option<String>,
    #[serde(default)]
    columns: Option<Vec<Column>>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    message: String,
}

/// Result of one fully drained statement
#[derive(Debug, Default)]
struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    fn absorb(&mut self, page: StatementPage) -> DbResult<Option<String>> {
        if let Some(error) = page.error {
            return Err(DbError::Query(error.message));
        }
        if self.columns.is_empty() {
            if let Some(columns) = page.columns {
                self.columns = columns.into_iter().map(|c| c.name).collect();
            }
        }
        if let Some(data) = page.data {
            self.rows.extend(data);
        }
        Ok(page.next_uri)
    }

    fn into_objects(self) -> Vec<Value> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| {
                let object: Map<String, Value> = columns.iter().cloned().zip(row).collect();
                Value::Object(object)
            })
            .collect()
    }

    fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()
    }
}

/// HTTP client for a Presto coordinator
pub struct PrestoClient {
    client: Client,
    settings: PrestoSettings,
}

impl PrestoClient {
    pub fn new(settings: PrestoSettings) -> DbResult<Self> {
        if settings.host.is_empty() {
            return Err(DbError::Configuration("presto host is empty".to_string()));
        }
        let client = Client::builder().build()?;
        Ok(Self { client, settings })
    }

    fn statement_url(&self) -> String {
        format!(
            "{}://{}:{}/v1/statement",
            self.settings.http_scheme, self.settings.host, self.settings.port
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.password {
            Some(password) => {
                request.basic_auth(&self.settings.user, Some(password.expose_secret()))
            }
            None => request,
        }
    }

    async fn execute(&self, sql: &str) -> DbResult<ResultSet> {
        debug!("presto statement: {}", sql);

        let request = self
            .client
            .post(self.statement_url())
            .header("X-Presto-User", &self.settings.user)
            .header("X-Presto-Catalog", &self.settings.catalog)
            .header("X-Presto-Schema", &self.settings.schema)
            .body(sql.to_string());

        let mut page: StatementPage = self
            .authorize(request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DbError::Query(e.to_string()))?
            .json()
            .await?;

        let mut results = ResultSet::default();
        while let Some(next) = results.absorb(page)? {
            page = self
                .authorize(self.client.get(&next))
                .send()
                .await?
                .error_for_status()
                .map_err(|e| DbError::Query(e.to_string()))?
                .json()
                .await?;
        }

        Ok(results)
    }
}

#[async_trait]
impl SqlBackend for PrestoClient {
    fn name(&self) -> &'static str {
        "presto"
    }

    async fn run_sql(&self, sql: &str) -> DbResult<String> {
        let statement = sql.trim().trim_end_matches(';');
        let rows = self.execute(statement).await?.into_objects();
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    async fn table_names(&self) -> DbResult<Vec<String>> {
        Ok(self.execute("SHOW TABLES").await?.first_column())
    }

    async fn table_definition(&self, table: &str) -> DbResult<String> {
        let described = self.execute(&format!("DESCRIBE {}", table)).await?;
        let columns: Vec<(String, String)> = described
            .rows
            .iter()
            .filter_map(|row| {
                let name = row.first()?.as_str()?;
                let data_type = row.get(1)?.as_str()?;
                Some((name.to_string(), data_type.to_string()))
            })
            .collect();
        Ok(format_create_table(table, &columns))
    }

    /// Presto catalogs expose no foreign keys
    async fn related_tables(&self, _tables: &[String], _n: usize) -> DbResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> PrestoSettings {
        PrestoSettings {
            host: "presto.local".into(),
            port: 8080,
            user: "analyst".into(),
            catalog: "hive".into(),
            schema: "default".into(),
            http_scheme: "https".into(),
            password: None,
        }
    }

    #[test]
    fn test_statement_url() {
        let client = PrestoClient::new(settings()).unwrap();
        assert_eq!(client.statement_url(), "https://presto.local:8080/v1/statement");
    }

    #[test]
    fn test_pages_collect_into_objects() {
        let first: StatementPage = serde_json::from_value(json!({
            "id": "q1",
            "nextUri": "http://presto.local:8080/v1/statement/q1/1",
            "columns": [{"name": "id", "type": "integer"}, {"name": "email", "type": "varchar"}],
            "data": [[1, "a@example.com"]]
        }))
        .unwrap();
        let last: StatementPage = serde_json::from_value(json!({
            "id": "q1",
            "data": [[2, "b@example.com"]]
        }))
        .unwrap();

        let mut results = ResultSet::default();
        assert!(results.absorb(first).unwrap().is_some());
        assert!(results.absorb(last).unwrap().is_none());

        let objects = results.into_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1], json!({"id": 2, "email": "b@example.com"}));
    }

    #[test]
    fn test_page_error_is_query_error() {
        let page: StatementPage = serde_json::from_value(json!({
            "id": "q2",
            "error": {"message": "Table hive.default.userz does not exist"}
        }))
        .unwrap();
        let err = ResultSet::default().absorb(page).unwrap_err();
        assert_eq!(err.to_string(), "Table hive.default.userz does not exist");
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut bad = settings();
        bad.host.clear();
        assert!(PrestoClient::new(bad).is_err());
    }
}
