//! HTTP surface: shared state, router assembly and error mapping.

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts};
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::auth::{AuthGate, auth_routes};
use crate::config::QuestionnaireConfig;
use crate::error::{AuthError, ConfigError, DatabaseError, SessionError};
use crate::llm::LlmProvider;
use crate::questionnaire::routes::{QuestionRouteState, question_routes};
use crate::questionnaire::{ProposalSynthesizer, QuestionFlow, SessionStore};
use crate::users::routes::{UserRouteState, user_routes};

/// Everything the handlers need, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthGate>,
    pub sessions: Arc<SessionStore>,
    pub flow: Arc<QuestionFlow>,
    pub proposals: Arc<ProposalSynthesizer>,
    pub questionnaire: QuestionnaireConfig,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthGate>,
        llm: Arc<dyn LlmProvider>,
        questionnaire: QuestionnaireConfig,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let flow = Arc::new(QuestionFlow::new(
            Arc::clone(&llm),
            Arc::clone(&sessions),
            questionnaire.clone(),
        ));
        let proposals = Arc::new(ProposalSynthesizer::new(
            llm,
            Arc::clone(&sessions),
            questionnaire.clone(),
        ));
        Self {
            auth,
            sessions,
            flow,
            proposals,
            questionnaire,
        }
    }
}

/// Build the full application router (without CORS).
pub fn router(state: &AppState) -> Router {
    let questions = QuestionRouteState {
        auth: Arc::clone(&state.auth),
        flow: Arc::clone(&state.flow),
        proposals: Arc::clone(&state.proposals),
        sessions: Arc::clone(&state.sessions),
        default_questions: state.questionnaire.default_questions,
    };
    let users = UserRouteState {
        auth: Arc::clone(&state.auth),
        sessions: Arc::clone(&state.sessions),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes(Arc::clone(&state.auth)))
        .merge(user_routes(users))
        .merge(question_routes(questions))
}

/// CORS for the browser front end at `origin`.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let origin = HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidValue {
        key: "SELF_POLISH_CORS_ORIGIN".to_string(),
        message: e.to_string(),
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]))
}

// ── Root / Health ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: &'static str,
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "self-polish API: token auth and guided self-improvement questionnaire"
    }))
}

async fn health() -> impl IntoResponse {
    Json(StatusResponse {
        status: "healthy",
        message: "API is running",
    })
}

// ── Extractors ──────────────────────────────────────────────────────────

/// `Json` whose rejection is an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Form` whose rejection is an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

/// `Query` whose rejection is an [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ── Errors ──────────────────────────────────────────────────────────────

/// Error returned by every handler. Client errors carry their message;
/// server errors are logged and replaced by an opaque one.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Session(SessionError),
    /// The request body or query string could not be decoded.
    Rejected(StatusCode, String),
    NotFound(String),
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials
                | AuthError::MissingToken
                | AuthError::TokenInvalid
                | AuthError::TokenExpired
                | AuthError::PrincipalNotFound => StatusCode::UNAUTHORIZED,
                AuthError::PrincipalInactive => StatusCode::FORBIDDEN,
                AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_) | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
                AuthError::Hashing(_) | AuthError::TokenEncoding(_) | AuthError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Session(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(status, _) => *status,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            Self::Auth(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %e, "Request failed");
                "Internal server error".to_string()
            }
            Self::Auth(e) => e.to_string(),
            Self::Session(e) => e.to_string(),
            Self::Rejected(_, detail) => detail.clone(),
            Self::NotFound(what) => what.clone(),
        };

        let body = Json(serde_json::json!({ "error": message }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
