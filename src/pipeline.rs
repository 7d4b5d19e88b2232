//! End-to-end query fulfilment
//!
//! [`DataPipeline::run`] drives the whole crew for one natural-language query:
//! gate → table retrieval → SQL generation (with self-correction when the query
//! fails) → report writers → insights. [`DataPipeline::fulfill_query`] is the
//! reduced flow served over HTTP, and [`DataPipeline::run_assistant`] answers the
//! same query with a single hosted assistant.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::agents::assistant::{AssistantRunner, AssistantsApi};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::ConversationResult;
use crate::agents::error::AgentError;
use crate::agents::llm::LlmProvider;
use crate::agents::orchestration::{
    ConversationPolicy, ConversationProtocol, SelfCorrectionController, SelfCorrectionRequest,
};
use crate::agents::teams::{build_team_orchestrator, Team, TeamContext};
use crate::agents::token::CostEstimator;
use crate::config::{OrchestrationSettings, RetrievalSettings, Settings};
use crate::db::SqlBackend;
use crate::instruments::{generate_session_id, unique_session_id, AgentInstruments, RUN_SQL};
use crate::retrieval::{add_cap_ref, Embedder, TableRetriever, TABLE_DEFINITIONS_CAP_REF};

pub const TABLE_DEFINITIONS_SUFFIX: &str = "Use these TABLE_DEFINITIONS to satisfy the database query.";

pub const ASSISTANT_INSTRUCTIONS: &str =
    "You're an elite SQL developer. You generate the most concise and performant SQL queries.";

pub const ASSISTANT_RUN_SQL_PROMPT: &str =
    "Use the run_sql function to run the SQL you've just generated.";

pub fn query_prompt(raw_prompt: &str) -> String {
    format!("Fulfill this database query: {}. ", raw_prompt)
}

pub fn insights_prompt(raw_prompt: &str) -> String {
    format!(
        "Given this database query: '{}'. Generate novel insights and new database queries to give business insights.",
        raw_prompt
    )
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No similar tables found.")]
    NoSimilarTables,

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Verdict of the scrum master gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "value", rename_all = "snake_case")]
pub enum GateDecision {
    /// Rank 3 to 5
    Approved(u8),
    /// Rank 1 or 2
    Rejected(u8),
    /// Anything that is not a rank
    Invalid(String),
}

impl GateDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateDecision::Approved(_))
    }
}

pub fn gate_decision(answer: &str) -> GateDecision {
    match answer.trim().parse::<u8>() {
        Ok(rank @ 1..=2) => GateDecision::Rejected(rank),
        Ok(rank @ 3..=5) => GateDecision::Approved(rank),
        _ => GateDecision::Invalid(answer.trim().to_string()),
    }
}

/// Tables picked for a query
#[derive(Debug, Clone, Default)]
pub struct RetrievedTables {
    pub similar: Vec<String>,
    pub related: Vec<String>,
    /// Definitions of the similar tables
    pub definitions: String,
    /// Definitions of the related and similar tables
    pub all_definitions: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamRun {
    pub team: String,
    pub result: ConversationResult,
}

/// Everything one full pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub session_id: String,
    pub gate: GateDecision,
    pub teams: Vec<TeamRun>,
}

impl PipelineReport {
    pub fn total_cost(&self) -> f64 {
        self.teams.iter().map(|run| run.result.cost).sum()
    }

    pub fn team(&self, name: &str) -> Option<&ConversationResult> {
        self.teams
            .iter()
            .find(|run| run.team == name)
            .map(|run| &run.result)
    }
}

/// Body of a successful `POST /prompt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub prompt: String,
    pub results: String,
    pub sql: String,
}

/// What the HTTP layer needs from the pipeline
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn fulfill_query(&self, prompt: &str) -> Result<PromptResponse, PipelineError>;
}

pub struct DataPipeline {
    provider: Arc<dyn LlmProvider>,
    llm: LlmProviderConfig,
    db: Arc<dyn SqlBackend>,
    base_dir: PathBuf,
    orchestration: OrchestrationSettings,
    retrieval: RetrievalSettings,
    cost: CostEstimator,
    embedder: Option<Arc<dyn Embedder>>,
    assistants: Option<Arc<dyn AssistantsApi>>,
}

impl DataPipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        db: Arc<dyn SqlBackend>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, AgentError> {
        let orchestration = OrchestrationSettings::default();
        let cost = CostEstimator::with_price(orchestration.price_per_1k_tokens)?;
        Ok(Self {
            provider,
            llm: LlmProviderConfig::default(),
            db,
            base_dir: base_dir.into(),
            orchestration,
            retrieval: RetrievalSettings::default(),
            cost,
            embedder: None,
            assistants: None,
        })
    }

    pub fn from_settings(
        settings: &Settings,
        provider: Arc<dyn LlmProvider>,
        db: Arc<dyn SqlBackend>,
    ) -> Result<Self, AgentError> {
        Ok(Self::new(provider, db, settings.workspace.base_dir.clone())?
            .with_llm_config(settings.llm.clone())
            .with_orchestration(settings.orchestration.clone())?
            .with_retrieval(settings.retrieval.clone()))
    }

    pub fn with_llm_config(mut self, llm: LlmProviderConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_orchestration(
        mut self,
        orchestration: OrchestrationSettings,
    ) -> Result<Self, AgentError> {
        self.cost = CostEstimator::with_price(orchestration.price_per_1k_tokens)?;
        self.orchestration = orchestration;
        Ok(self)
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalSettings) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_assistants(mut self, api: Arc<dyn AssistantsApi>) -> Self {
        self.assistants = Some(api);
        self
    }

    pub fn policy(&self) -> ConversationPolicy {
        self.orchestration.policy()
    }

    /// Create the session workspace and the context teams are built from
    pub fn open_session(&self, session_id: &str) -> Result<TeamContext, AgentError> {
        let instruments = AgentInstruments::open(&self.base_dir, session_id, Arc::clone(&self.db))?;
        info!(
            "Opened session {} in {}",
            session_id,
            instruments.root_dir().display()
        );

        Ok(TeamContext {
            provider: Arc::clone(&self.provider),
            llm: self.llm.clone(),
            instruments,
            policy: self.policy(),
            cost: self.cost.clone(),
        })
    }

    /// Ask the scrum master whether the prompt is a database query
    pub async fn gate(
        &self,
        ctx: &TeamContext,
        prompt: &str,
    ) -> Result<(GateDecision, ConversationResult), AgentError> {
        let mut orchestrator = build_team_orchestrator(Team::ScrumMaster.as_str(), ctx, None)?;
        let result = orchestrator
            .run(ConversationProtocol::Sequential, prompt)
            .await?;

        let decision = gate_decision(&result.last_message_str);
        match &decision {
            GateDecision::Approved(rank) => {
                info!("✅ Gate Team Approved - Valid confidence: {}", rank)
            }
            GateDecision::Rejected(rank) => {
                info!("❌ Gate Team Rejected - Confidence too low: {}", rank)
            }
            GateDecision::Invalid(answer) => {
                info!("❌ Gate Team Rejected - Invalid response: {}", answer)
            }
        }

        Ok((decision, result))
    }

    /// Similar tables for the query plus tables related to them
    pub async fn retrieve(&self, raw_prompt: &str) -> Result<RetrievedTables, PipelineError> {
        let mut retriever = TableRetriever::from_backend(self.db.as_ref())
            .await
            .map_err(AgentError::from)?;
        if self.retrieval.embeddings {
            if let Some(embedder) = &self.embedder {
                retriever = retriever
                    .with_embedder(Arc::clone(embedder))
                    .await
                    .map_err(AgentError::from)?;
            }
        }

        let similar = retriever
            .similar_tables(raw_prompt, self.retrieval.similar_tables)
            .await
            .map_err(AgentError::from)?;
        if similar.is_empty() {
            warn!("No similar tables for: {}", raw_prompt);
            return Err(PipelineError::NoSimilarTables);
        }

        let related = if self.retrieval.related_tables == 0 {
            Vec::new()
        } else {
            self.db
                .related_tables(&similar, self.retrieval.related_tables)
                .await
                .map_err(AgentError::from)?
        };
        info!("similar_tables: {:?}, related_tables: {:?}", similar, related);

        let definitions = retriever.definitions_for(&similar);
        let mut core_and_related = related.clone();
        core_and_related.extend(similar.iter().cloned());
        let all_definitions = retriever.definitions_for(&core_and_related);

        Ok(RetrievedTables {
            similar,
            related,
            definitions,
            all_definitions,
        })
    }

    /// Generate and run SQL with the data engineering team
    ///
    /// A run that stopped on a failing `run_sql` call gets handed to the
    /// self-correction team; its result replaces the original one.
    pub async fn generate_sql(
        &self,
        ctx: &TeamContext,
        prompt: &str,
        runs: &mut Vec<TeamRun>,
    ) -> Result<ConversationResult, AgentError> {
        let hook = ctx.instruments.run_sql_hook();
        let mut data_eng = build_team_orchestrator(Team::DataEng.as_str(), ctx, Some(hook))?;
        let result = data_eng.run(ConversationProtocol::Sequential, prompt).await?;
        runs.push(TeamRun {
            team: data_eng.name().to_string(),
            result: result.clone(),
        });

        if !result.failed_on_sql() {
            return Ok(result);
        }
        let Some(failure) = result.tool_failure.clone() else {
            return Ok(result);
        };

        warn!("run_sql failed, starting self-correction: {}", failure.error);
        let request = SelfCorrectionRequest {
            failing_sql: failure.sql().unwrap_or_default(),
            error: failure.error.clone(),
            table_definitions: self.db.table_definitions_for_prompt().await?,
        };

        let hook = ctx.instruments.run_sql_hook();
        let mut correction =
            build_team_orchestrator(Team::SelfCorrection.as_str(), ctx, Some(hook))?;
        let corrected = SelfCorrectionController::new(self.orchestration.self_correction_attempts)
            .run(&mut correction, request)
            .await?;
        runs.push(TeamRun {
            team: correction.name().to_string(),
            result: corrected.clone(),
        });

        Ok(corrected)
    }

    /// Broadcast the query results to the report writers
    pub async fn write_reports(&self, ctx: &TeamContext) -> Result<ConversationResult, AgentError> {
        let results = ctx.instruments.read_run_sql_results()?;
        let mut data_viz = build_team_orchestrator(Team::DataViz.as_str(), ctx, None)?;
        data_viz.run(ConversationProtocol::Broadcast, &results).await
    }

    /// Let the insights team propose new queries for the same tables
    pub async fn generate_insights(
        &self,
        ctx: &TeamContext,
        raw_prompt: &str,
        all_definitions: &str,
    ) -> Result<ConversationResult, AgentError> {
        let prompt = add_cap_ref(
            &insights_prompt(raw_prompt),
            TABLE_DEFINITIONS_SUFFIX,
            TABLE_DEFINITIONS_CAP_REF,
            all_definitions,
        );

        let hook = ctx.instruments.innovation_hook();
        let mut insights = build_team_orchestrator(Team::DataInsights.as_str(), ctx, Some(hook))?;
        insights
            .run(
                ConversationProtocol::RoundRobin {
                    loops: self.orchestration.insights_loops,
                },
                &prompt,
            )
            .await
    }

    /// Run every team for one query
    ///
    /// A rejected gate ends the run early with only the gate transcript.
    pub async fn run(&self, raw_prompt: &str) -> Result<PipelineReport, PipelineError> {
        let session_id = generate_session_id(raw_prompt);
        let ctx = self.open_session(&session_id)?;
        let prompt = query_prompt(raw_prompt);
        let mut teams = Vec::new();

        let (gate, gate_result) = self.gate(&ctx, &prompt).await?;
        teams.push(TeamRun {
            team: Team::ScrumMaster.orchestrator_name(),
            result: gate_result,
        });
        if !gate.is_approved() {
            return Ok(PipelineReport {
                session_id,
                gate,
                teams,
            });
        }

        let tables = self.retrieve(raw_prompt).await?;
        let prompt = add_cap_ref(
            &prompt,
            TABLE_DEFINITIONS_SUFFIX,
            TABLE_DEFINITIONS_CAP_REF,
            &tables.definitions,
        );

        let sql_result = self
            .generate_sql(&ctx, &prompt, &mut teams)
            .await?;

        if sql_result.success {
            let reports = self.write_reports(&ctx).await?;
            teams.push(TeamRun {
                team: Team::DataViz.orchestrator_name(),
                result: reports,
            });
        } else {
            warn!(
                "Skipping reports, no query results: {}",
                sql_result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        let insights = self
            .generate_insights(&ctx, raw_prompt, &tables.all_definitions)
            .await?;
        teams.push(TeamRun {
            team: Team::DataInsights.orchestrator_name(),
            result: insights,
        });

        let report = PipelineReport {
            session_id,
            gate,
            teams,
        };
        info!("💰📊🤖 Total cost: {:.2}", report.total_cost());
        Ok(report)
    }

    /// Answer the query with one hosted assistant instead of agent teams
    pub async fn run_assistant(&self, raw_prompt: &str) -> Result<ConversationResult, PipelineError> {
        let api = self.assistants.clone().ok_or_else(|| {
            AgentError::Configuration("No assistants API configured".to_string())
        })?;

        let name = self.orchestration.assistant_name.clone();
        let session_id = generate_session_id(&format!("{}{}", name, raw_prompt));
        let ctx = self.open_session(&session_id)?;

        let tables = self.retrieve(raw_prompt).await?;
        let prompt = add_cap_ref(
            &query_prompt(raw_prompt),
            TABLE_DEFINITIONS_SUFFIX,
            TABLE_DEFINITIONS_CAP_REF,
            &tables.definitions,
        );

        let mut runner = AssistantRunner::new(api, name, self.cost.clone())
            .with_poll_interval(Duration::from_millis(
                self.orchestration.assistant_poll_interval_ms,
            ))
            .with_max_polls(self.orchestration.assistant_max_polls);

        runner
            .get_or_create_assistant(&self.orchestration.assistant_model)
            .await?;
        runner.set_instructions(ASSISTANT_INSTRUCTIONS).await?;
        runner.equip_tools(ctx.instruments.toolbox()?)?;
        runner.make_thread().await?;
        runner.add_message(&prompt).await?;
        runner.run_thread(None).await?;
        runner.add_message(ASSISTANT_RUN_SQL_PROMPT).await?;
        runner.run_thread(Some(&[RUN_SQL][..])).await?;

        let instruments = Arc::clone(&ctx.instruments);
        let outcome = runner.run_validation(|| instruments.validate_run_sql());
        let report = runner.persist(ctx.instruments.as_ref())?;

        let messages = runner.chat_messages();
        let last_message_str = messages
            .last()
            .map(|chat| chat.message.render())
            .unwrap_or_default();

        Ok(ConversationResult {
            success: outcome.success,
            messages,
            cost: report.cost,
            tokens: report.tokens,
            last_message_str,
            error_message: outcome.error_message,
            tool_failure: None,
        })
    }
}

#[async_trait]
impl PromptService for DataPipeline {
    /// Retrieval, SQL generation and execution; answers with the stored query and results
    async fn fulfill_query(&self, raw_prompt: &str) -> Result<PromptResponse, PipelineError> {
        let tables = self.retrieve(raw_prompt).await?;

        let session_id = unique_session_id(raw_prompt);
        let ctx = self.open_session(&session_id)?;
        let prompt = add_cap_ref(
            &query_prompt(raw_prompt),
            TABLE_DEFINITIONS_SUFFIX,
            TABLE_DEFINITIONS_CAP_REF,
            &tables.definitions,
        );

        let mut runs = Vec::new();
        let result = self.generate_sql(&ctx, &prompt, &mut runs).await?;
        if !result.success {
            let reason = result
                .error_message
                .unwrap_or_else(|| "SQL generation failed".to_string());
            return Err(PipelineError::QueryFailed(reason));
        }

        Ok(PromptResponse {
            prompt: raw_prompt.to_string(),
            results: ctx.instruments.read_run_sql_results()?,
            sql: ctx.instruments.read_sql_query()?,
        })
    }
}
