//! Per-session agent instruments
//!
//! [`AgentInstruments`] owns everything a run touches outside the model: the
//! session workspace directory, the SQL backend, the tool handlers agents
//! call, the result-file validators and transcript persistence.
//!
//! All artifacts for one run live under `{base_dir}/{session_id}`:
//!
//! | File | Written by |
//! |------|------------|
//! | `run_sql_results.json` | `run_sql` |
//! | `sql_query.sql` | `run_sql` |
//! | `write_file.txt` | `write_file` |
//! | `write_json_file.json` | `write_json_file` |
//! | `write_yml_file.yml` | `write_yml_file` |
//! | `{i}_innovation_file.json` | `write_innovation_file` |
//! | `agent_chats_{team}.json` | transcript sink |
//! | `agent_cost_{team}.json` | transcript sink |

mod files;
mod session;
mod tools;


pub use files::normalize_quotes;
pub use session::{generate_session_id, session_id_at, unique_session_id, SESSION_PREFIX_LEN};
pub use tools::{
    RunSqlArgs, WriteFileArgs, WriteInnovationFileArgs, WriteJsonFileArgs, WriteYmlFileArgs,
    RUN_SQL, WRITE_FILE, WRITE_INNOVATION_FILE, WRITE_JSON_FILE, WRITE_YML_FILE,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agents::domain::Chat;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::orchestration::{TranscriptSink, ValidationHook, ValidationOutcome};
use crate::agents::token::CostReport;
use crate::db::SqlBackend;

/// Env var that overrides the default workspace root
pub const BASE_DIR_ENV: &str = "BASE_DIR";

/// Workspace root used when nothing else is configured
pub const DEFAULT_BASE_DIR: &str = "./agent_results";

pub const RUN_SQL_RESULTS_FILE: &str = "run_sql_results.json";
pub const SQL_QUERY_FILE: &str = "sql_query.sql";
pub const WRITE_FILE_FILE: &str = "write_file.txt";
pub const WRITE_JSON_FILE_FILE: &str = "write_json_file.json";
pub const WRITE_YML_FILE_FILE: &str = "write_yml_file.yml";

pub const RUN_SQL_CONFIRMATION: &str = "Successfully delivered results to json file";
pub const INNOVATION_CONFIRMATION: &str =
    "Successfully wrote innovation file. You can check my work.";

/// `BASE_DIR` from the environment, or `./agent_results`
pub fn default_base_dir() -> PathBuf {
    std::env::var(BASE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_BASE_DIR))
}

/// Shared state and tools for every team in one session
pub struct AgentInstruments {
    session_id: String,
    root_dir: PathBuf,
    db: Arc<dyn SqlBackend>,
    innovation_index: AtomicUsize,
}

impl AgentInstruments {
    /// Create instruments without touching the filesystem
    pub fn new(
        base_dir: impl AsRef<Path>,
        session_id: impl Into<String>,
        db: Arc<dyn SqlBackend>,
    ) -> Self {
        let session_id = session_id.into();
        Self {
            root_dir: base_dir.as_ref().join(&session_id),
            session_id,
            db,
            innovation_index: AtomicUsize::new(0),
        }
    }

    /// Create instruments with a fresh, empty session directory
    pub fn open(
        base_dir: impl AsRef<Path>,
        session_id: impl Into<String>,
        db: Arc<dyn SqlBackend>,
    ) -> AgentResult<Arc<Self>> {
        let instruments = Self::new(base_dir, session_id, db);
        instruments.reset_files()?;
        info!(
            "Session {} workspace ready at {}",
            instruments.session_id,
            instruments.root_dir.display()
        );
        Ok(Arc::new(instruments))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn db(&self) -> &Arc<dyn SqlBackend> {
        &self.db
    }

    /// Create the session directory if needed and delete the files inside it
    pub fn reset_files(&self) -> AgentResult<()> {
        std::fs::create_dir_all(&self.root_dir).map_err(|e| persistence(&self.root_dir, e))?;

        let entries = std::fs::read_dir(&self.root_dir).map_err(|e| persistence(&self.root_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| persistence(&self.root_dir, e))?.path();
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| persistence(&path, e))?;
            }
        }

        self.innovation_index.store(0, Ordering::SeqCst);
        Ok(())
    }

    pub fn file_path(&self, fname: &str) -> PathBuf {
        self.root_dir.join(fname)
    }

    pub fn run_sql_results_file(&self) -> PathBuf {
        self.file_path(RUN_SQL_RESULTS_FILE)
    }

    pub fn sql_query_file(&self) -> PathBuf {
        self.file_path(SQL_QUERY_FILE)
    }

    pub fn agent_chat_file(&self, team: &str) -> PathBuf {
        self.file_path(&format!("agent_chats_{}.json", team))
    }

    pub fn agent_cost_file(&self, team: &str) -> PathBuf {
        self.file_path(&format!("agent_cost_{}.json", team))
    }

    pub fn innovation_file(&self, index: usize) -> PathBuf {
        self.file_path(&format!("{}_innovation_file.json", index))
    }

    /// Number of innovation files written so far
    pub fn innovation_count(&self) -> usize {
        self.innovation_index.load(Ordering::SeqCst)
    }

    /// Run a query, saving the rows and the query text to the session directory
    pub async fn run_sql(&self, sql: &str) -> AgentResult<String> {
        info!("run_sql(): {}", sql);
        let results = self
            .db
            .run_sql(sql)
            .await
            .map_err(|e| AgentError::tool_failed(RUN_SQL, e))?;

        files::write_text(&self.run_sql_results_file(), &results)?;
        files::write_text(&self.sql_query_file(), sql)?;
        Ok(RUN_SQL_CONFIRMATION.to_string())
    }

    pub fn write_file(&self, content: &str) -> AgentResult<String> {
        let path = self.file_path(WRITE_FILE_FILE);
        files::write_text(&path, content)?;
        Ok(format!("Successfully wrote {}", WRITE_FILE_FILE))
    }

    /// Write a JSON report; a payload that does not parse is reported back, not written
    pub fn write_json_file(&self, json_str: &str) -> AgentResult<String> {
        let path = self.file_path(WRITE_JSON_FILE_FILE);
        report_skipped(files::write_json(&path, json_str), WRITE_JSON_FILE_FILE)
    }

    /// Write a YAML report from a JSON payload; a payload that does not parse is reported back
    pub fn write_yml_file(&self, json_str: &str) -> AgentResult<String> {
        let path = self.file_path(WRITE_YML_FILE_FILE);
        report_skipped(files::write_yaml(&path, json_str), WRITE_YML_FILE_FILE)
    }

    pub fn write_innovation_file(&self, content: &str) -> AgentResult<String> {
        let index = self.innovation_index.fetch_add(1, Ordering::SeqCst);
        files::write_text(&self.innovation_file(index), content)?;
        Ok(INNOVATION_CONFIRMATION.to_string())
    }

    /// The SQL results file must exist and have content
    pub fn validate_run_sql(&self) -> ValidationOutcome {
        let path = self.run_sql_results_file();
        if files::has_content(&path) {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::failed(format!("File {} is empty", path.display()))
        }
    }

    /// Every innovation file written so far must have content
    pub fn validate_innovation_files(&self) -> ValidationOutcome {
        (0..self.innovation_count())
            .map(|index| self.innovation_file(index))
            .find(|path| !files::has_content(path))
            .map(|path| ValidationOutcome::failed(format!("File {} is empty", path.display())))
            .unwrap_or_else(ValidationOutcome::ok)
    }

    pub fn run_sql_hook(self: &Arc<Self>) -> ValidationHook {
        let instruments = Arc::clone(self);
        Box::new(move || instruments.validate_run_sql())
    }

    pub fn innovation_hook(self: &Arc<Self>) -> ValidationHook {
        let instruments = Arc::clone(self);
        Box::new(move || instruments.validate_innovation_files())
    }

    /// Rows saved by the last successful `run_sql`
    pub fn read_run_sql_results(&self) -> AgentResult<String> {
        let path = self.run_sql_results_file();
        std::fs::read_to_string(&path).map_err(|e| persistence(&path, e))
    }

    /// Query text saved by the last successful `run_sql`
    pub fn read_sql_query(&self) -> AgentResult<String> {
        let path = self.sql_query_file();
        std::fs::read_to_string(&path).map_err(|e| persistence(&path, e))
    }
}

fn persistence(path: &Path, err: std::io::Error) -> AgentError {
    AgentError::Persistence(format!("{}: {}", path.display(), err))
}

fn report_skipped(written: AgentResult<()>, fname: &str) -> AgentResult<String> {
    match written {
        Ok(()) => Ok(format!("Successfully wrote {}", fname)),
        Err(AgentError::Serialization(reason)) => {
            warn!("Skipped writing {}: {}", fname, reason);
            Ok(format!("Skipped writing {}: {}", fname, reason))
        }
        Err(other) => Err(other),
    }
}

impl TranscriptSink for AgentInstruments {
    fn persist_chats(&self, team: &str, chats: &[Chat]) -> AgentResult<()> {
        let path = self.agent_chat_file(team);
        let body = serde_json::to_string_pretty(chats)?;
        debug!("Persisting {} chats to {}", chats.len(), path.display());
        files::write_text(&path, &body)
    }

    fn persist_cost(&self, team: &str, report: &CostReport) -> AgentResult<()> {
        let path = self.agent_cost_file(team);
        let body = serde_json::to_string_pretty(report)?;
        files::write_text(&path, &body)
    }
}
