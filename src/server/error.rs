//! Error responses for the HTTP surface.
//!
//! Every failure becomes a JSON body with an `error` field; failures that
//! happen after validation also carry a friendly `response` the UI can show
//! or speak in place of a model reply.

use std::any::Any;

use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::session::ChatError;
use crate::session::prompt::{CHAT_FALLBACK, SERVER_FALLBACK};
use crate::speech::TranscriptionError;

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error description.
    pub error: String,
    /// Friendly fallback reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Request failure mapped to a status code and JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// 400: a required field is missing or empty.
    BadRequest(&'static str),
    /// 413: the request body exceeds the upload limit.
    PayloadTooLarge,
    /// 500: speech could not be transcribed.
    Transcription(TranscriptionError),
    /// 500 (503 while the session circuit is open): the chat model failed.
    Chat(ChatError),
    /// 500: anything else.
    Server(String),
}

impl From<TranscriptionError> for ApiError {
    fn from(err: TranscriptionError) -> Self {
        Self::Transcription(err)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::Chat(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::Server(rejection.body_text())
        }
    }
}

/// Turn a handler panic into the generic server error response.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(other) => other
            .downcast::<&'static str>()
            .map_or_else(|_| "handler panicked".to_string(), |message| (*message).to_string()),
    };
    ApiError::Server(detail).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => {
                let body = ErrorBody {
                    error: msg.to_string(),
                    response: None,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            Self::PayloadTooLarge => {
                warn!("Rejected oversized request body");
                let body = ErrorBody {
                    error: "Request body too large".to_string(),
                    response: None,
                };
                (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
            }
            Self::Transcription(err) => {
                error!(error = %err, "Transcription failed");
                let body = ErrorBody {
                    error: err.to_string(),
                    response: Some(SERVER_FALLBACK.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            Self::Chat(ChatError::CircuitOpen { retry_in_secs }) => {
                let body = ErrorBody {
                    error: "Chat temporarily unavailable".to_string(),
                    response: Some(CHAT_FALLBACK.to_string()),
                };
                let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_in_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            Self::Chat(err) => {
                error!(error = %err, "Error getting response from chat manager");
                let body = ErrorBody {
                    error: "Chat error".to_string(),
                    response: Some(CHAT_FALLBACK.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            Self::Server(msg) => {
                error!(error = %msg, "Error processing request");
                let body = ErrorBody {
                    error: "Server error".to_string(),
                    response: Some(SERVER_FALLBACK.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
