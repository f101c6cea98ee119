//! Maps domain errors onto HTTP status codes and a JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::error::{
    FormError, GenerationError, ParameterError, ReviewError, SessionError, StoreError,
};

#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    /// The request body could not be read as the expected JSON.
    InvalidBody { status: StatusCode, message: String },
    SessionNotFound,
    FormNotFound,
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

macro_rules! via_session {
    ($($ty:ty),*) => {
        $(impl From<$ty> for AppError {
            fn from(e: $ty) -> Self {
                AppError::Session(e.into())
            }
        })*
    };
}

via_session!(ParameterError, GenerationError, ReviewError, FormError, StoreError);

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        use SessionError as S;
        match self {
            AppError::InvalidBody { status, .. } => (*status, "INVALID_BODY"),
            AppError::SessionNotFound => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            AppError::FormNotFound => (StatusCode::NOT_FOUND, "FORM_NOT_FOUND"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AppError::Session(S::Parameter(ParameterError::OverBudget { .. })) => {
                (StatusCode::BAD_REQUEST, "OVER_BUDGET")
            }
            AppError::Session(S::Parameter(_)) => (StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
            AppError::Session(S::Generation(e)) => match e {
                GenerationError::Unavailable => {
                    (StatusCode::SERVICE_UNAVAILABLE, "GENERATION_UNAVAILABLE")
                }
                GenerationError::InFlight => (StatusCode::CONFLICT, "GENERATION_IN_FLIGHT"),
                GenerationError::Superseded => (StatusCode::CONFLICT, "GENERATION_SUPERSEDED"),
                GenerationError::Format { .. } => (StatusCode::BAD_GATEWAY, "GENERATION_FORMAT"),
                GenerationError::Service { .. }
                | GenerationError::Transport(_)
                | GenerationError::EmptyResponse => (StatusCode::BAD_GATEWAY, "GENERATION_SERVICE"),
            },
            AppError::Session(S::Review(ReviewError::StaleCandidate(_))) => {
                (StatusCode::CONFLICT, "STALE_CANDIDATE")
            }
            AppError::Session(S::Form(e)) => match e {
                FormError::EmptyTitle => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_TITLE"),
                FormError::NoQuestions => (StatusCode::UNPROCESSABLE_ENTITY, "NO_QUESTIONS"),
                FormError::QuestionNotFound(_) | FormError::OptionNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "QUESTION_NOT_FOUND")
                }
                FormError::OptionsNotAllowed(_) => (StatusCode::BAD_REQUEST, "OPTIONS_NOT_ALLOWED"),
            },
            AppError::Session(S::Store(StoreError::Codec(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_CODEC")
            }
            AppError::Session(S::Store(_)) => (StatusCode::BAD_GATEWAY, "STORE_UNAVAILABLE"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Session(e) => e.to_string(),
            AppError::InvalidBody { message, .. } => message.clone(),
            AppError::SessionNotFound => "session not found".to_string(),
            AppError::FormNotFound => "form not found".to_string(),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = self.message();

        if status.is_server_error() {
            error!(%status, code, %message, "request failed");
        } else {
            warn!(%status, code, %message, "request rejected");
        }

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
