use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::pipeline::{PipelineError, PromptService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::NoSimilarTables => StatusCode::BAD_REQUEST,
            PipelineError::QueryFailed(_) | PipelineError::Agent(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// POST /prompt - turn a natural-language query into SQL and its results
pub async fn handle_prompt(
    State(service): State<Arc<dyn PromptService>>,
    Json(request): Json<PromptRequest>,
) -> Response {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return (StatusCode::BAD_REQUEST, "Prompt must not be empty").into_response();
    }

    info!("POST /prompt: {}", prompt);
    match service.fulfill_query(prompt).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            match &e {
                PipelineError::NoSimilarTables => warn!("Prompt rejected: {}", e),
                _ => error!("Prompt failed: {}", e),
            }
            e.into_response()
        }
    }
}

/// OPTIONS /prompt - preflight without CORS request headers
pub async fn handle_prompt_options() -> StatusCode {
    StatusCode::OK
}
