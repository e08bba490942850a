use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Fatal errors raised while resolving and parsing a question bank.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No quiz identifier was supplied")]
    MissingIdentifier,
    #[error("Quiz identifier '{0}' is not allowed")]
    InvalidIdentifier(String),
    #[error("Quiz data file not found for '{quiz_id}' (tried: {})", .attempts.join(", "))]
    LoadFailure {
        quiz_id: String,
        attempts: Vec<String>,
    },
    #[error("Quiz data for '{quiz_id}' has a bad structure: {reason}")]
    MalformedData { quiz_id: String, reason: String },
    #[error("Content source misconfigured: {0}")]
    Config(String),
}

/// Rejected session commands. None of these change session state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuizError {
    #[error("Please choose an option first")]
    NoSelection,
    #[error("'{0}' is not an option of the current question")]
    InvalidOption(String),
    #[error("The current question has already been answered")]
    AlreadyAnswered,
    #[error("The current question has not been answered yet")]
    NotAnswered,
    #[error("The quiz session is already finished")]
    SessionFinished,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Rank storage I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Rank storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("Session manager unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Web server/handler error: {0}")]
    Web(#[from] crate::web::WebError),
    #[error("Content loader error: {0}")]
    Load(#[from] LoadError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
