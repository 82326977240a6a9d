use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use atlas_providers::Message;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// `POST /api/chat`: one system prompt plus the user message, no history
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let message = match payload {
        Ok(Json(ChatRequest {
            message: Some(message),
        })) if !message.is_empty() => message,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "No message provided"),
        Err(rejection) => {
            tracing::debug!("Rejected chat payload: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, "No message provided");
        }
    };

    let messages = vec![
        Message::system(state.system_prompt.as_ref()),
        Message::user(message),
    ];

    match state.provider.chat(messages).await {
        Ok(response) => Json(ChatResponse {
            response,
            model: state.provider.model().to_string(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Upstream chat request failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
