use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

pub mod validator;

use crate::agents::config::LlmProviderConfig;
use crate::agents::orchestration::{ConversationPolicy, TerminationMode};
use crate::cli::Cli;
use crate::db::{BackendKind, PrestoSettings};

/// Prefix of environment overrides, e.g. `DATACREW__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "DATACREW";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmProviderConfig,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub orchestration: OrchestrationSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: BackendKind,
    /// Connection URL for postgres
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub presto: Option<PrestoSettings>,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            presto: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceSettings {
    #[serde(default = "crate::instruments::default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            base_dir: crate::instruments::default_base_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationSettings {
    #[serde(default)]
    pub termination: TerminationMode,
    #[serde(default = "default_completion_keyword")]
    pub completion_keyword: String,
    #[serde(default = "default_price_per_1k_tokens")]
    pub price_per_1k_tokens: f64,
    #[serde(default = "default_self_correction_attempts")]
    pub self_correction_attempts: usize,
    /// Cycles of the insights round-robin
    #[serde(default = "default_insights_loops")]
    pub insights_loops: usize,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_assistant_model")]
    pub assistant_model: String,
    #[serde(default = "default_assistant_poll_interval_ms")]
    pub assistant_poll_interval_ms: u64,
    #[serde(default = "default_assistant_max_polls")]
    pub assistant_max_polls: usize,
}

fn default_completion_keyword() -> String {
    "APPROVED".to_string()
}

fn default_price_per_1k_tokens() -> f64 {
    crate::agents::token::DEFAULT_PRICE_PER_1K_TOKENS
}

fn default_self_correction_attempts() -> usize {
    1
}

fn default_insights_loops() -> usize {
    1
}

fn default_assistant_name() -> String {
    "Turbo4".to_string()
}

fn default_assistant_model() -> String {
    "gpt-4-1106-preview".to_string()
}

fn default_assistant_poll_interval_ms() -> u64 {
    500
}

fn default_assistant_max_polls() -> usize {
    crate::agents::assistant::DEFAULT_MAX_POLLS
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            termination: TerminationMode::default(),
            completion_keyword: default_completion_keyword(),
            price_per_1k_tokens: default_price_per_1k_tokens(),
            self_correction_attempts: default_self_correction_attempts(),
            insights_loops: default_insights_loops(),
            assistant_name: default_assistant_name(),
            assistant_model: default_assistant_model(),
            assistant_poll_interval_ms: default_assistant_poll_interval_ms(),
            assistant_max_polls: default_assistant_max_polls(),
        }
    }
}

impl OrchestrationSettings {
    pub fn policy(&self) -> ConversationPolicy {
        ConversationPolicy {
            termination: self.termination,
            completion_keyword: self.completion_keyword.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSettings {
    /// Tables picked by similarity to the query
    #[serde(default = "default_similar_tables")]
    pub similar_tables: usize,
    /// Tables added through foreign keys of the similar ones
    #[serde(default = "default_related_tables")]
    pub related_tables: usize,
    /// Rank tables with embeddings in addition to name matching
    #[serde(default)]
    pub embeddings: bool,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_similar_tables() -> usize {
    5
}

fn default_related_tables() -> usize {
    3
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            similar_tables: default_similar_tables(),
            related_tables: default_related_tables(),
            embeddings: false,
            embedding_model: default_embedding_model(),
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments (config file, env overrides, then CLI)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::load(&cli.config)?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);
        settings.validate()?;

        Ok(settings)
    }

    /// Load and validate settings from an optional config file and the environment
    pub fn from_path(config_path: &Path) -> Result<Self, anyhow::Error> {
        let settings = Self::load(config_path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(config_path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;

        if settings.database.url.is_none() {
            settings.database.url = std::env::var("DATABASE_URL").ok();
        }

        Ok(settings)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(base_dir) = &cli.base_dir {
            self.workspace.base_dir = base_dir.clone();
        }
        if let Some(url) = &cli.database_url {
            self.database.url = Some(url.clone());
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }
}
