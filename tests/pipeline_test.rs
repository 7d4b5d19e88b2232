mod common;

use std::sync::Arc;

use common::{call, pipeline, run_sql, session_dir, text, FakeAssistants, ScriptedProvider, ShopBackend, USERS_ROWS};
use datacrew::agents::core::Agent;
use datacrew::agents::domain::AgentRole;
use datacrew::agents::teams::prompts::*;
use datacrew::agents::teams::{build_team, Team};
use datacrew::agents::Chat;
use datacrew::config::OrchestrationSettings;
use datacrew::instruments::{RUN_SQL, RUN_SQL_CONFIRMATION};
use datacrew::pipeline::{GateDecision, PipelineError, PromptService};
use serde_json::{json, Value};
use tempfile::TempDir;

const RECENT_USERS_SQL: &str =
    "SELECT * FROM users WHERE created > now() - interval '7 days'";

fn read_json(path: std::path::PathBuf) -> Value {
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
    serde_json::from_str(&content).unwrap()
}

fn full_crew() -> ScriptedProvider {
    ScriptedProvider::new()
        .on(SCRUM_MASTER_NLQ_PROMPT, vec![text("5")])
        .on(DATA_ENGINEER_PROMPT, vec![text(RECENT_USERS_SQL)])
        .on(SR_DATA_ANALYST_PROMPT, vec![run_sql(RECENT_USERS_SQL)])
        .on(
            TEXT_REPORT_ANALYST_PROMPT,
            vec![call(
                "write_file",
                json!({ "fname": "write_file.txt", "content": "One user signed up this week." }),
            )],
        )
        .on(
            JSON_REPORT_ANALYST_PROMPT,
            vec![call(
                "write_json_file",
                json!({ "fname": "write_json_file.json", "json_str": "{'users': 1}" }),
            )],
        )
        .on(
            YML_REPORT_ANALYST_PROMPT,
            vec![call(
                "write_yml_file",
                json!({ "fname": "write_yml_file.yml", "json_str": "{\"users\": 1}" }),
            )],
        )
        .on(
            DATA_INSIGHTS_PROMPT,
            vec![text("[{\"insight\": \"Repeat buyers\", \"sql\": \"SELECT user_id FROM orders\"}]")],
        )
        .on(
            INSIGHTS_FILE_REPORTER_PROMPT,
            vec![call(
                "write_innovation_file",
                json!({ "content": "[{\"insight\": \"Repeat buyers\"}]" }),
            )],
        )
}

#[tokio::test]
async fn test_full_pipeline_for_recent_users() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(full_crew());
    let db = Arc::new(ShopBackend::new());
    let pipeline = pipeline(provider.clone(), db.clone(), dir.path());

    let report = pipeline
        .run("list all users created in the last 7 days")
        .await
        .unwrap();

    assert_eq!(report.gate, GateDecision::Approved(5));
    assert!(report.session_id.starts_with("list_all_users_created_in_the___"));
    let teams: Vec<&str> = report.teams.iter().map(|run| run.team.as_str()).collect();
    assert_eq!(
        teams,
        vec!["scrum_master_team", "data_eng_team", "data_viz_team", "data_insights_team"]
    );

    let data_eng = report.team("data_eng_team").unwrap();
    assert!(data_eng.success, "{:?}", data_eng.error_message);
    assert_eq!(data_eng.last_message_str, RUN_SQL_CONFIRMATION);
    assert!(report.team("data_insights_team").unwrap().success);
    assert_eq!(db.executed(), vec![RECENT_USERS_SQL.to_string()]);

    let session = session_dir(dir.path());
    assert_eq!(
        std::fs::read_to_string(session.join("run_sql_results.json")).unwrap(),
        USERS_ROWS
    );
    assert_eq!(
        std::fs::read_to_string(session.join("sql_query.sql")).unwrap(),
        RECENT_USERS_SQL
    );

    // every report writer got the same rows and wrote its own file
    assert_eq!(
        std::fs::read_to_string(session.join("write_file.txt")).unwrap(),
        "One user signed up this week."
    );
    assert_eq!(read_json(session.join("write_json_file.json")), json!({ "users": 1 }));
    assert!(std::fs::read_to_string(session.join("write_yml_file.yml"))
        .unwrap()
        .contains("users: 1"));
    assert!(session.join("0_innovation_file.json").exists());

    let chats: Vec<Chat> =
        serde_json::from_value(read_json(session.join("agent_chats_data_eng_team.json"))).unwrap();
    assert_eq!(chats.len(), data_eng.messages.len());
    assert!(chats.windows(2).all(|pair| pair[0].created <= pair[1].created));

    let cost = read_json(session.join("agent_cost_data_eng_team.json"));
    assert!(cost["cost"].is_number());
    assert!(cost["tokens"].as_u64().unwrap() > 0);
    assert!(report.total_cost() >= 0.0);
}

#[tokio::test]
async fn test_gate_rejection_stops_before_sql() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().on(SCRUM_MASTER_NLQ_PROMPT, vec![text("2")]));
    let db = Arc::new(ShopBackend::new());
    let pipeline = pipeline(provider.clone(), db.clone(), dir.path());

    let report = pipeline.run("tell me a joke").await.unwrap();

    assert_eq!(report.gate, GateDecision::Rejected(2));
    assert_eq!(report.teams.len(), 1);
    assert_eq!(provider.calls_for(DATA_ENGINEER_PROMPT), 0);
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_retrieve_adds_related_tables() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        Arc::new(ScriptedProvider::new()),
        Arc::new(ShopBackend::new()),
        dir.path(),
    );

    let tables = pipeline.retrieve("list all users").await.unwrap();

    assert_eq!(tables.similar, vec!["users".to_string()]);
    assert_eq!(tables.related, vec!["orders".to_string()]);
    assert!(tables.definitions.starts_with("CREATE TABLE users"));
    assert!(!tables.definitions.contains("CREATE TABLE orders"));
    assert!(tables.all_definitions.contains("CREATE TABLE orders"));
    assert!(tables.all_definitions.contains("CREATE TABLE users"));
}

#[tokio::test]
async fn test_fulfill_query_corrects_failing_sql() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(DATA_ENGINEER_PROMPT, vec![text("SELECT * FROM userz")])
            .on(SR_DATA_ANALYST_PROMPT, vec![run_sql("SELECT * FROM userz")])
            .on(
                SELF_CORRECTION_ANALYST_PROMPT,
                vec![
                    text("The table is called users, not userz."),
                    text("SELECT * FROM users"),
                    run_sql("SELECT * FROM users"),
                ],
            ),
    );
    let db = Arc::new(ShopBackend::new());
    let pipeline = pipeline(provider, db.clone(), dir.path());

    let response = pipeline.fulfill_query("list all users").await.unwrap();

    assert_eq!(response.prompt, "list all users");
    assert_eq!(response.sql, "SELECT * FROM users");
    assert_eq!(response.results, USERS_ROWS);
    assert_eq!(
        db.executed(),
        vec!["SELECT * FROM userz".to_string(), "SELECT * FROM users".to_string()]
    );

    let session = session_dir(dir.path());
    assert!(session.join("agent_chats_data_eng_team.json").exists());
    assert!(session.join("agent_chats_self_correction_team.json").exists());
}

#[tokio::test]
async fn test_fulfill_query_reports_uncorrected_failure() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(DATA_ENGINEER_PROMPT, vec![text("SELECT * FROM userz")])
            .on(SR_DATA_ANALYST_PROMPT, vec![run_sql("SELECT * FROM userz")])
            .on(
                SELF_CORRECTION_ANALYST_PROMPT,
                vec![
                    text("Looks fine to me."),
                    text("SELECT * FROM userz"),
                    run_sql("SELECT * FROM userz"),
                ],
            ),
    );
    let db = Arc::new(ShopBackend::new());
    let pipeline = pipeline(provider, db.clone(), dir.path());

    let err = pipeline.fulfill_query("list all users").await.unwrap_err();

    match err {
        PipelineError::QueryFailed(reason) => assert!(reason.contains("userz"), "{}", reason),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(db.executed().len(), 2);
}

#[tokio::test]
async fn test_fulfill_query_without_matching_tables() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    let pipeline = pipeline(provider.clone(), Arc::new(ShopBackend::new()), dir.path());

    let err = pipeline
        .fulfill_query("how many widgets were sold")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoSimilarTables));
    assert_eq!(provider.calls_for(DATA_ENGINEER_PROMPT), 0);
}

#[tokio::test]
async fn test_assistant_runs_sql_through_thread() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeAssistants::new());
    let db = Arc::new(ShopBackend::new());
    let pipeline = pipeline(Arc::new(ScriptedProvider::new()), db.clone(), dir.path())
        .with_orchestration(OrchestrationSettings {
            assistant_poll_interval_ms: 1,
            ..OrchestrationSettings::default()
        })
        .unwrap()
        .with_assistants(api.clone());

    let result = pipeline.run_assistant("list all users").await.unwrap();

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(db.executed(), vec!["SELECT id, email FROM users".to_string()]);

    let submitted = api.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].tool_call_id, "call_1");
    assert_eq!(submitted[0].output, RUN_SQL_CONFIRMATION);

    assert_eq!(result.messages.first().unwrap().from_name, "user");
    assert!(result
        .messages
        .windows(2)
        .all(|pair| pair[0].created <= pair[1].created));

    let session = session_dir(dir.path());
    let name = session.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("turbo4list_all_users__"), "{}", name);
    assert!(session.join("agent_chats_Turbo4.json").exists());
    assert!(session.join("agent_cost_Turbo4.json").exists());
}

#[tokio::test]
async fn test_assistant_requires_api() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        Arc::new(ScriptedProvider::new()),
        Arc::new(ShopBackend::new()),
        dir.path(),
    );

    let err = pipeline.run_assistant("list all users").await.unwrap_err();
    assert!(err.to_string().contains("No assistants API configured"));
}

#[tokio::test]
async fn test_self_correction_sees_every_table_definition() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(DATA_ENGINEER_PROMPT, vec![text("SELECT * FROM userz")])
            .on(SR_DATA_ANALYST_PROMPT, vec![run_sql("SELECT * FROM userz")])
            .on(
                SELF_CORRECTION_ANALYST_PROMPT,
                vec![
                    text("The table is called users, not userz."),
                    text("SELECT * FROM users"),
                    run_sql("SELECT * FROM users"),
                ],
            ),
    );
    let db = Arc::new(ShopBackend::with_jobs_table());
    let pipeline = pipeline(provider.clone(), db, dir.path());

    let tables = pipeline.retrieve("list all users").await.unwrap();
    assert!(!tables.all_definitions.contains("CREATE TABLE jobs"));

    pipeline.fulfill_query("list all users").await.unwrap();

    let inputs = provider.inputs_for(SELF_CORRECTION_ANALYST_PROMPT);
    let diagnosis = &inputs[0];
    assert!(diagnosis.contains("SELECT * FROM userz"), "{}", diagnosis);
    assert!(diagnosis.contains("CREATE TABLE jobs"), "{}", diagnosis);
    assert!(diagnosis.contains("CREATE TABLE orders"), "{}", diagnosis);
    assert!(diagnosis.contains("CREATE TABLE users"), "{}", diagnosis);
}

#[tokio::test]
async fn test_fulfill_query_runs_sql_called_during_diagnosis() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(DATA_ENGINEER_PROMPT, vec![text("SELECT * FROM userz")])
            .on(SR_DATA_ANALYST_PROMPT, vec![run_sql("SELECT * FROM userz")])
            .on(
                SELF_CORRECTION_ANALYST_PROMPT,
                vec![
                    run_sql("SELECT * FROM users"),
                    text("The query now reads from users."),
                    text("Done."),
                ],
            ),
    );
    let db = Arc::new(ShopBackend::new());
    let pipeline = pipeline(provider.clone(), db.clone(), dir.path());

    let response = pipeline.fulfill_query("list all users").await.unwrap();

    assert_eq!(response.sql, "SELECT * FROM users");
    assert_eq!(response.results, USERS_ROWS);
    assert_eq!(
        db.executed(),
        vec!["SELECT * FROM userz".to_string(), "SELECT * FROM users".to_string()]
    );
    // validation passed right after the call, so the analyst answered only once
    assert_eq!(provider.calls_for(SELF_CORRECTION_ANALYST_PROMPT), 1);
}

#[tokio::test]
async fn test_concurrent_queries_get_separate_workspaces() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(
                DATA_ENGINEER_PROMPT,
                vec![text("SELECT * FROM users"), text("SELECT * FROM users")],
            )
            .on(
                SR_DATA_ANALYST_PROMPT,
                vec![run_sql("SELECT * FROM users"), run_sql("SELECT * FROM users")],
            ),
    );
    let pipeline = pipeline(provider, Arc::new(ShopBackend::new()), dir.path());

    let (first, second) = tokio::join!(
        pipeline.fulfill_query("list all users"),
        pipeline.fulfill_query("list all users")
    );
    assert_eq!(first.unwrap().results, USERS_ROWS);
    assert_eq!(second.unwrap().results, USERS_ROWS);

    let sessions: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_dir())
        .collect();
    assert_eq!(sessions.len(), 2);
    for session in sessions {
        assert!(session.join("sql_query.sql").exists());
        assert!(session.join("run_sql_results.json").exists());
    }
}

#[tokio::test]
async fn test_self_correction_team_is_admin_and_validator() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(Arc::new(ScriptedProvider::new()), Arc::new(ShopBackend::new()), dir.path());
    let ctx = pipeline.open_session("self_correction_roles").unwrap();

    let agents = build_team(Team::SelfCorrection, &ctx).unwrap();

    let roles: Vec<AgentRole> = agents.iter().map(|agent| agent.role()).collect();
    assert_eq!(roles, vec![AgentRole::Admin, AgentRole::Validator]);
    assert!(agents[1].has_tools());
    assert!(agents[1].toolbox().unwrap().get(RUN_SQL).is_some());
}
