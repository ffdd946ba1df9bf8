//! Configuration types.

use std::time::Duration;

use jsonwebtoken::Algorithm;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Everything the binary needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub questionnaire: QuestionnaireConfig,
    pub server: ServerConfig,
    pub llm: crate::llm::LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            auth: AuthConfig::from_env()?,
            questionnaire: QuestionnaireConfig::from_env()?,
            server: ServerConfig::from_env()?,
            llm: llm_from_env()?,
        })
    }
}

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens.
    pub secret: SecretString,
    /// Signing algorithm (HMAC family only).
    pub algorithm: Algorithm,
    /// Lifetime of an issued token.
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            algorithm: Algorithm::HS256,
            token_ttl: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Load from `SELF_POLISH_JWT_*` / `SELF_POLISH_TOKEN_TTL_MIN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("SELF_POLISH_JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("SELF_POLISH_JWT_SECRET".to_string()))?;
        if secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SELF_POLISH_JWT_SECRET".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let algorithm = match std::env::var("SELF_POLISH_JWT_ALGORITHM") {
            Ok(raw) => parse_algorithm(&raw)?,
            Err(_) => Algorithm::HS256,
        };

        let ttl_minutes: u64 = env_parse("SELF_POLISH_TOKEN_TTL_MIN", 30)?;
        if ttl_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SELF_POLISH_TOKEN_TTL_MIN".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            secret: SecretString::from(secret),
            algorithm,
            token_ttl: Duration::from_secs(ttl_minutes * 60),
        })
    }
}

/// Questionnaire configuration.
#[derive(Debug, Clone)]
pub struct QuestionnaireConfig {
    /// Number of questions when the client does not say.
    pub default_questions: usize,
    /// Upper bound on the number of questions a client may request.
    pub max_questions: usize,
    /// Bound on a single provider call.
    pub provider_timeout: Duration,
    /// LLM temperature for question generation.
    pub temperature: f32,
    /// Max tokens for a generated question or proposal.
    pub max_tokens: u32,
}

impl Default for QuestionnaireConfig {
    fn default() -> Self {
        Self {
            default_questions: 5,
            max_questions: 20,
            provider_timeout: Duration::from_secs(20),
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

impl QuestionnaireConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let default_questions = env_parse("SELF_POLISH_DEFAULT_QUESTIONS", defaults.default_questions)?;
        let max_questions = env_parse("SELF_POLISH_MAX_QUESTIONS", defaults.max_questions)?;
        if default_questions == 0 || default_questions > max_questions {
            return Err(ConfigError::InvalidValue {
                key: "SELF_POLISH_DEFAULT_QUESTIONS".to_string(),
                message: format!("must be between 1 and {max_questions}"),
            });
        }
        let timeout_secs = env_parse(
            "SELF_POLISH_PROVIDER_TIMEOUT_SECS",
            defaults.provider_timeout.as_secs(),
        )?;

        Ok(Self {
            default_questions,
            max_questions,
            provider_timeout: Duration::from_secs(timeout_secs.max(1)),
            ..defaults
        })
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: String,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,
    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_parse("SELF_POLISH_PORT", 8000)?,
            db_path: std::env::var("SELF_POLISH_DB_PATH")
                .unwrap_or_else(|_| "./data/self-polish.db".to_string()),
            cors_origin: std::env::var("SELF_POLISH_CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            log_dir: std::env::var("SELF_POLISH_LOG_DIR").ok(),
        })
    }
}

/// Provider selection from `SELF_POLISH_LLM_BACKEND` / `SELF_POLISH_MODEL`.
pub fn llm_from_env() -> Result<crate::llm::LlmConfig, ConfigError> {
    let backend = match std::env::var("SELF_POLISH_LLM_BACKEND")
        .unwrap_or_else(|_| "anthropic".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "anthropic" => LlmBackend::Anthropic,
        "openai" => LlmBackend::OpenAi,
        other => {
            return Err(ConfigError::InvalidValue {
                key: "SELF_POLISH_LLM_BACKEND".to_string(),
                message: format!("unknown backend '{other}' (expected anthropic or openai)"),
            });
        }
    };

    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key =
        std::env::var(key_var).map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;

    let model = std::env::var("SELF_POLISH_MODEL").unwrap_or_else(|_| {
        match backend {
            LlmBackend::Anthropic => "claude-sonnet-4-20250514",
            LlmBackend::OpenAi => "gpt-4o-mini",
        }
        .to_string()
    });

    Ok(crate::llm::LlmConfig {
        backend,
        api_key: SecretString::from(api_key),
        model,
    })
}

fn parse_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(ConfigError::InvalidValue {
            key: "SELF_POLISH_JWT_ALGORITHM".to_string(),
            message: format!("unsupported algorithm '{other}' (expected HS256, HS384 or HS512)"),
        }),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
