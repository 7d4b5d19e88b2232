//! Tool handlers backed by the session instruments

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::AgentInstruments;
use crate::agents::error::AgentResult;
use crate::agents::tools::{parse_arguments, ToolDescriptor, ToolHandler, Toolbox};

pub const RUN_SQL: &str = "run_sql";
pub const WRITE_FILE: &str = "write_file";
pub const WRITE_JSON_FILE: &str = "write_json_file";
pub const WRITE_YML_FILE: &str = "write_yml_file";
pub const WRITE_INNOVATION_FILE: &str = "write_innovation_file";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunSqlArgs {
    /// The SQL query to run
    pub sql: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// The name of the file to write
    pub fname: String,
    /// The content of the file to write
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteJsonFileArgs {
    /// The name of the file to write
    pub fname: String,
    /// The content of the file to write
    pub json_str: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteYmlFileArgs {
    /// The name of the file to write
    pub fname: String,
    /// The json content of the file to write
    pub json_str: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteInnovationFileArgs {
    /// The content of the file to write
    pub content: String,
}

/// Which instrument a handler dispatches to
#[derive(Debug, Clone, Copy)]
enum Instrument {
    RunSql,
    WriteFile,
    WriteJsonFile,
    WriteYmlFile,
    WriteInnovationFile,
}

struct InstrumentTool {
    instruments: Arc<AgentInstruments>,
    instrument: Instrument,
}

#[async_trait]
impl ToolHandler for InstrumentTool {
    async fn invoke(&self, arguments: &Value) -> AgentResult<String> {
        let instruments = &self.instruments;
        match self.instrument {
            Instrument::RunSql => {
                let args: RunSqlArgs = parse_arguments(RUN_SQL, arguments)?;
                instruments.run_sql(&args.sql).await
            }
            Instrument::WriteFile => {
                let args: WriteFileArgs = parse_arguments(WRITE_FILE, arguments)?;
                debug!("write_file(): model named the report {}", args.fname);
                instruments.write_file(&args.content)
            }
            Instrument::WriteJsonFile => {
                let args: WriteJsonFileArgs = parse_arguments(WRITE_JSON_FILE, arguments)?;
                debug!("write_json_file(): model named the report {}", args.fname);
                instruments.write_json_file(&args.json_str)
            }
            Instrument::WriteYmlFile => {
                let args: WriteYmlFileArgs = parse_arguments(WRITE_YML_FILE, arguments)?;
                debug!("write_yml_file(): model named the report {}", args.fname);
                instruments.write_yml_file(&args.json_str)
            }
            Instrument::WriteInnovationFile => {
                let args: WriteInnovationFileArgs =
                    parse_arguments(WRITE_INNOVATION_FILE, arguments)?;
                instruments.write_innovation_file(&args.content)
            }
        }
    }
}

impl AgentInstruments {
    fn tool<A: JsonSchema>(
        self: &Arc<Self>,
        name: &str,
        description: &str,
        instrument: Instrument,
    ) -> ToolDescriptor {
        ToolDescriptor::typed::<A>(
            name,
            description,
            Arc::new(InstrumentTool {
                instruments: Arc::clone(self),
                instrument,
            }),
        )
    }

    /// Every instrument tool; teams take the subset each agent may call
    pub fn toolbox(self: &Arc<Self>) -> AgentResult<Toolbox> {
        let database = self.db.name();
        Toolbox::new()
            .with(self.tool::<RunSqlArgs>(
                RUN_SQL,
                &format!("Run a SQL query against the {} database", database),
                Instrument::RunSql,
            ))?
            .with(self.tool::<WriteFileArgs>(
                WRITE_FILE,
                "Write a file to the filesystem",
                Instrument::WriteFile,
            ))?
            .with(self.tool::<WriteJsonFileArgs>(
                WRITE_JSON_FILE,
                "Write a json file to the filesystem",
                Instrument::WriteJsonFile,
            ))?
            .with(self.tool::<WriteYmlFileArgs>(
                WRITE_YML_FILE,
                "Write a yml file to the filesystem",
                Instrument::WriteYmlFile,
            ))?
            .with(self.tool::<WriteInnovationFileArgs>(
                WRITE_INNOVATION_FILE,
                "Write a file to the filesystem",
                Instrument::WriteInnovationFile,
            ))
    }
}
