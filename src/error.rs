//! Error types for self-polish.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Authentication and authorization errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Email is already registered")]
    EmailAlreadyExists,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must not be empty")]
    WeakPassword,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Principal is inactive")]
    PrincipalInactive,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token encoding failed: {0}")]
    TokenEncoding(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Questionnaire protocol violations. The session is left unchanged whenever
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Question limit reached ({cursor} of {total})")]
    QuestionLimitReached { cursor: usize, total: usize },

    #[error("Question {cursor} requested but the session is at {expected}")]
    QuestionOutOfOrder { cursor: usize, expected: usize },

    #[error("Invalid question count {total}: must be between 1 and {max}")]
    InvalidQuestionCount { total: usize, max: usize },

    #[error("Answer out of order: position {claimed}, expected {expected}")]
    OutOfOrderAnswer { claimed: usize, expected: usize },

    #[error("No question exists at position {position}")]
    NoMatchingQuestion { position: usize },

    #[error("No questions have been asked yet")]
    NoQuestionsYet,

    #[error("No answers have been given yet")]
    NoAnswersYet,
}
