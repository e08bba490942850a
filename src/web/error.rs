use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::{LoadError, PersistenceError, QuizError, SessionError};

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("No rank stored for quiz '{0}'")]
    RankNotFound(String),
    #[error("Rank storage error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Session(SessionError::Load(err)) => match err {
                LoadError::MissingIdentifier | LoadError::InvalidIdentifier(_) => {
                    StatusCode::BAD_REQUEST
                }
                LoadError::LoadFailure { .. } => StatusCode::NOT_FOUND,
                LoadError::MalformedData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LoadError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            WebError::Session(SessionError::Quiz(err)) => match err {
                QuizError::NoSelection | QuizError::InvalidOption(_) => StatusCode::BAD_REQUEST,
                QuizError::AlreadyAnswered
                | QuizError::NotAnswered
                | QuizError::SessionFinished => StatusCode::CONFLICT,
            },
            WebError::Session(SessionError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            WebError::RankNotFound(_) => StatusCode::NOT_FOUND,
            WebError::Persistence(_) | WebError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T, E = WebError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                WebError::from(SessionError::Load(LoadError::MissingIdentifier)),
                StatusCode::BAD_REQUEST,
            ),
            (
                WebError::from(SessionError::Load(LoadError::LoadFailure {
                    quiz_id: "x".to_string(),
                    attempts: vec![],
                })),
                StatusCode::NOT_FOUND,
            ),
            (
                WebError::from(SessionError::Load(LoadError::MalformedData {
                    quiz_id: "x".to_string(),
                    reason: "bad".to_string(),
                })),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                WebError::from(SessionError::Quiz(QuizError::NoSelection)),
                StatusCode::BAD_REQUEST,
            ),
            (
                WebError::from(SessionError::Quiz(QuizError::NotAnswered)),
                StatusCode::CONFLICT,
            ),
            (
                WebError::from(SessionError::NotFound(Uuid::new_v4())),
                StatusCode::NOT_FOUND,
            ),
            (
                WebError::from(PersistenceError::Io {
                    path: "ranks.json".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{error}");
        }
    }

    #[test]
    fn test_no_selection_prompts_user() {
        let error = WebError::from(SessionError::Quiz(QuizError::NoSelection));
        assert_eq!(error.to_string(), "Please choose an option first");
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
