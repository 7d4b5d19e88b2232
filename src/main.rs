use clap::Parser;
use datacrew::adapters::health_handler::HealthHandler;
use datacrew::agents::assistant::OpenAiAssistantsApi;
use datacrew::agents::llm::create_provider;
use datacrew::cli::Cli;
use datacrew::config::Settings;
use datacrew::pipeline::DataPipeline;
use datacrew::retrieval::OpenAiEmbedder;
use datacrew::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration (CLI > env vars > config file)
    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;

    let provider = create_provider(&settings.llm)?;
    let db = datacrew::db::connect(&settings.database).await?;
    info!("Connected to {} database", db.name());

    let mut pipeline = DataPipeline::from_settings(&settings, provider, db.clone())?;
    if settings.retrieval.embeddings {
        let embedder = OpenAiEmbedder::new(&settings.llm, &settings.retrieval.embedding_model)?;
        pipeline = pipeline.with_embedder(Arc::new(embedder));
    }

    if let Some(prompt) = cli.prompt.as_deref() {
        let outcome = if cli.assistant {
            let api = OpenAiAssistantsApi::new(&settings.llm)?;
            let pipeline = pipeline.with_assistants(Arc::new(api));
            pipeline.run_assistant(prompt).await.map(|result| {
                info!(
                    "{} finished: success={}, cost={}, tokens={}",
                    settings.orchestration.assistant_name, result.success, result.cost, result.tokens
                );
            })
        } else {
            pipeline.run(prompt).await.map(|report| {
                info!(
                    "Session {} finished: gate={:?}, teams={}, cost={:.2}",
                    report.session_id,
                    report.gate,
                    report.teams.len(),
                    report.total_cost()
                );
            })
        };

        db.close().await;
        if let Err(e) = outcome {
            error!("Pipeline failed: {}", e);
            return Err(e.into());
        }
        return Ok(());
    }

    let host = settings.server.host.clone();
    let port = settings.server.port;
    info!("Starting datacrew on {}:{}", host, port);

    let state = AppState {
        prompts: Arc::new(pipeline),
        health: Arc::new(HealthHandler::new(db)),
    };
    let app = datacrew::create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
