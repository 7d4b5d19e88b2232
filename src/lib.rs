//! # datacrew - multi-agent natural-language to SQL
//!
//! datacrew answers a natural-language database question with a crew of
//! LLM-backed agents. Teams of agents talk to each other through an
//! [`agents::Orchestrator`] (sequential, broadcast or round-robin), call
//! tools against a per-session workspace, and are scored by validation hooks
//! once their conversation ends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datacrew::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Load configuration from datacrew.toml and DATACREW__* variables
//!     let settings = Settings::from_path(std::path::Path::new("datacrew.toml"))?;
//!     println!("{}:{}", settings.server.host, settings.server.port);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Agents**: agent roles, LLM providers, tools, orchestration and teams
//! - **Instruments**: session workspace, tool handlers and validators
//! - **Db**: SQL backends (Postgres, Presto)
//! - **Retrieval**: picks the tables relevant to a query
//! - **Pipeline**: the end-to-end flow
//! - **Adapters**: HTTP handlers

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod db;
pub mod instruments;
pub mod pipeline;
pub mod retrieval;

use crate::adapters::health_handler::HealthHandler;
use crate::adapters::prompt_handler::{handle_prompt, handle_prompt_options};
use crate::pipeline::PromptService;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;

/// Shared handlers behind the router
#[derive(Clone)]
pub struct AppState {
    pub prompts: Arc<dyn PromptService>,
    pub health: Arc<HealthHandler>,
}

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `state` - Prompt service and health handler
///
/// # Returns
///
/// Configured Axum Router
pub fn create_app(state: AppState) -> Router {
    let health_router = Router::new()
        .route("/health", get({
            let handler = state.health.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = state.health.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = state.health.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }));

    let prompt_router = Router::new()
        .route("/prompt", post(handle_prompt).options(handle_prompt_options))
        .with_state(state.prompts.clone());

    health_router.merge(prompt_router).layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
