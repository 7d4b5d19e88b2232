//! Named agent teams
//!
//! | Team | Members | Protocol |
//! |------|---------|----------|
//! | `scrum_master` | Admin, Scrum_Master | sequential |
//! | `data_eng` | Admin, Engineer, Sr_Data_Analyst | sequential |
//! | `data_viz` | Admin, Text/Json/Yml report analysts | broadcast |
//! | `data_insights` | Admin, Insights, Insights_Data_Reporter | round-robin |
//! | `self_correction` | Admin, Sr_Data_Analyst | self-correction loop |

pub mod prompts;

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use self::prompts::*;
use crate::agents::config::{AgentConfig, FunctionConfig, LlmProviderConfig};
use crate::agents::core::{Agent, GatekeeperAgent, LlmAgent, UserProxyAgent};
use crate::agents::domain::AgentRole;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::LlmProvider;
use crate::agents::orchestration::{always_valid, ConversationPolicy, Orchestrator, ValidationHook};
use crate::agents::token::CostEstimator;
use crate::instruments::{
    AgentInstruments, RUN_SQL, WRITE_FILE, WRITE_INNOVATION_FILE, WRITE_JSON_FILE, WRITE_YML_FILE,
};

pub const ADMIN: &str = "Admin";
pub const ENGINEER: &str = "Engineer";
pub const SR_DATA_ANALYST: &str = "Sr_Data_Analyst";
pub const TEXT_REPORT_ANALYST: &str = "Text_Report_Analyst";
pub const JSON_REPORT_ANALYST: &str = "Json_Report_Analyst";
pub const YML_REPORT_ANALYST: &str = "Yml_Report_Analyst";
pub const SCRUM_MASTER: &str = "Scrum_Master";
pub const INSIGHTS: &str = "Insights";
pub const INSIGHTS_DATA_REPORTER: &str = "Insights_Data_Reporter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    ScrumMaster,
    DataEng,
    DataViz,
    DataInsights,
    SelfCorrection,
}

impl Team {
    pub const ALL: [Team; 5] = [
        Team::ScrumMaster,
        Team::DataEng,
        Team::DataViz,
        Team::DataInsights,
        Team::SelfCorrection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Team::ScrumMaster => "scrum_master",
            Team::DataEng => "data_eng",
            Team::DataViz => "data_viz",
            Team::DataInsights => "data_insights",
            Team::SelfCorrection => "self_correction",
        }
    }

    /// Name the orchestrator and its transcript files carry
    pub fn orchestrator_name(&self) -> String {
        format!("{}_team", self.as_str())
    }
}

impl FromStr for Team {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Team::ALL
            .into_iter()
            .find(|team| team.as_str() == s)
            .ok_or_else(|| AgentError::UnknownTeam(s.to_string()))
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything needed to assemble a team for one session
#[derive(Clone)]
pub struct TeamContext {
    pub provider: Arc<dyn LlmProvider>,
    pub llm: LlmProviderConfig,
    pub instruments: Arc<AgentInstruments>,
    pub policy: ConversationPolicy,
    pub cost: CostEstimator,
}

impl TeamContext {
    fn llm_agent(&self, name: &str, prompt: &str, role: AgentRole) -> LlmAgent {
        let config = AgentConfig {
            name: name.to_string(),
            system_prompt: prompt.to_string(),
            llm: FunctionConfig::plain(&self.llm),
        };
        LlmAgent::new(config, role, Arc::clone(&self.provider))
    }

    fn tool_agent(
        &self,
        name: &str,
        prompt: &str,
        role: AgentRole,
        tools: &[&str],
    ) -> AgentResult<Box<dyn Agent>> {
        let toolbox = self.instruments.toolbox()?.subset(tools)?;
        let agent = self.llm_agent(name, prompt, role).with_toolbox(toolbox)?;
        Ok(Box::new(agent))
    }

    fn admin(&self) -> Box<dyn Agent> {
        Box::new(UserProxyAgent::new(ADMIN, USER_PROXY_PROMPT))
    }
}

/// The agents of a team, in conversation order
pub fn build_team(team: Team, ctx: &TeamContext) -> AgentResult<Vec<Box<dyn Agent>>> {
    let agents: Vec<Box<dyn Agent>> = match team {
        Team::ScrumMaster => vec![
            ctx.admin(),
            Box::new(GatekeeperAgent::new(ctx.llm_agent(
                SCRUM_MASTER,
                SCRUM_MASTER_NLQ_PROMPT,
                AgentRole::Gatekeeper,
            ))),
        ],
        Team::DataEng => vec![
            ctx.admin(),
            Box::new(ctx.llm_agent(ENGINEER, DATA_ENGINEER_PROMPT, AgentRole::Generator)),
            ctx.tool_agent(
                SR_DATA_ANALYST,
                SR_DATA_ANALYST_PROMPT,
                AgentRole::Executor,
                &[RUN_SQL],
            )?,
        ],
        Team::DataViz => vec![
            ctx.admin(),
            ctx.tool_agent(
                TEXT_REPORT_ANALYST,
                TEXT_REPORT_ANALYST_PROMPT,
                AgentRole::Reporter,
                &[WRITE_FILE],
            )?,
            ctx.tool_agent(
                JSON_REPORT_ANALYST,
                JSON_REPORT_ANALYST_PROMPT,
                AgentRole::Reporter,
                &[WRITE_JSON_FILE],
            )?,
            ctx.tool_agent(
                YML_REPORT_ANALYST,
                YML_REPORT_ANALYST_PROMPT,
                AgentRole::Reporter,
                &[WRITE_YML_FILE],
            )?,
        ],
        Team::DataInsights => vec![
            ctx.admin(),
            Box::new(ctx.llm_agent(INSIGHTS, DATA_INSIGHTS_PROMPT, AgentRole::Generator)),
            ctx.tool_agent(
                INSIGHTS_DATA_REPORTER,
                INSIGHTS_FILE_REPORTER_PROMPT,
                AgentRole::Reporter,
                &[WRITE_INNOVATION_FILE],
            )?,
        ],
        Team::SelfCorrection => vec![
            ctx.admin(),
            ctx.tool_agent(
                SR_DATA_ANALYST,
                SELF_CORRECTION_ANALYST_PROMPT,
                AgentRole::Validator,
                &[RUN_SQL],
            )?,
        ],
    };

    Ok(agents)
}

/// Build the orchestrator for a team by name
///
/// Without a validation hook every run is accepted.
pub fn build_team_orchestrator(
    team: &str,
    ctx: &TeamContext,
    validation: Option<ValidationHook>,
) -> AgentResult<Orchestrator> {
    let team: Team = team.parse()?;
    info!("Building {} team", team);

    let orchestrator = Orchestrator::new(
        team.orchestrator_name(),
        build_team(team, ctx)?,
        validation.unwrap_or_else(always_valid),
    )?
    .with_policy(ctx.policy.clone())
    .with_cost_estimator(ctx.cost.clone())
    .with_sink(ctx.instruments.clone());

    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_names_round_trip() {
        for team in Team::ALL {
            assert_eq!(team.as_str().parse::<Team>().unwrap(), team);
        }
        assert_eq!(Team::DataEng.orchestrator_name(), "data_eng_team");
    }

    #[test]
    fn test_unknown_team() {
        let err = "marketing".parse::<Team>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown team: marketing");
    }
}
