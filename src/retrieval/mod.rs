//! Table retrieval for prompts
//!
//! Picks the tables a natural-language query most likely needs and renders
//! their definitions into the prompt under a capitalized reference.

mod embedder;

pub use embedder::{cosine_similarity, Embedder, OpenAiEmbedder};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::agents::error::LlmResult;
use crate::db::{dedup_tables, DbResult, SqlBackend};

/// Capitalized reference table definitions are attached under
pub const TABLE_DEFINITIONS_CAP_REF: &str = "TABLE_DEFINITIONS";

/// Attach `content` to a prompt under a capitalized reference
///
/// `add_cap_ref("Refactor this code.", "Make it more readable using this EXAMPLE.", "EXAMPLE", "def foo(): ...")`
/// gives `"Refactor this code. Make it more readable using this EXAMPLE.\n\nEXAMPLE\n\ndef foo(): ..."`.
pub fn add_cap_ref(prompt: &str, suffix: &str, cap_ref: &str, content: &str) -> String {
    format!("{} {}\n\n{}\n\n{}", prompt, suffix, cap_ref, content)
}

/// Finds tables relevant to a query
pub struct TableRetriever {
    definitions: BTreeMap<String, String>,
    embedder: Option<Arc<dyn Embedder>>,
    embeddings: BTreeMap<String, Vec<f32>>,
}

impl TableRetriever {
    /// Retriever that matches by table name only
    pub fn new(definitions: BTreeMap<String, String>) -> Self {
        Self {
            definitions,
            embedder: None,
            embeddings: BTreeMap::new(),
        }
    }

    /// Load every table definition from a backend
    pub async fn from_backend(db: &dyn SqlBackend) -> DbResult<Self> {
        let definitions = db.table_definition_map().await?;
        info!("Loaded {} table definitions from {}", definitions.len(), db.name());
        Ok(Self::new(definitions))
    }

    /// Embed every table definition so queries can be ranked by similarity
    pub async fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> LlmResult<Self> {
        for (table, definition) in &self.definitions {
            let embedding = embedder.embed(definition).await?;
            self.embeddings.insert(table.clone(), embedding);
        }
        self.embedder = Some(embedder);
        Ok(self)
    }

    pub fn definitions(&self) -> &BTreeMap<String, String> {
        &self.definitions
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    /// Tables whose name appears in the query, case-insensitively
    pub fn similar_by_word_match(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        self.definitions
            .keys()
            .filter(|table| query.contains(&table.to_lowercase()))
            .cloned()
            .collect()
    }

    /// Top `n` tables by embedding similarity; empty without an embedder
    pub async fn similar_by_embeddings(&self, query: &str, n: usize) -> LlmResult<Vec<String>> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };

        let query_embedding = embedder.embed(query).await?;
        let mut scored: Vec<(&String, f32)> = self
            .embeddings
            .iter()
            .map(|(table, embedding)| (table, cosine_similarity(&query_embedding, embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(n)
            .map(|(table, _)| table.clone())
            .collect())
    }

    /// Embedding matches followed by name matches, without duplicates
    pub async fn similar_tables(&self, query: &str, n: usize) -> LlmResult<Vec<String>> {
        let mut tables = self.similar_by_embeddings(query, n).await?;
        tables.extend(self.similar_by_word_match(query));
        let tables = dedup_tables(tables);
        debug!("Similar tables for query: {:?}", tables);
        Ok(tables)
    }

    /// Definitions of the named tables joined by blank lines; unknown names are skipped
    pub fn definitions_for<S: AsRef<str>>(&self, names: &[S]) -> String {
        names
            .iter()
            .filter_map(|name| {
                let definition = self.definitions.get(name.as_ref());
                if definition.is_none() {
                    debug!("No definition for table {}", name.as_ref());
                }
                definition.map(String::as_str)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
