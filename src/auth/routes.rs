//! REST endpoints for registration, login and the current principal.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::server::{ApiError, ApiForm, ApiJson};
use crate::users::Principal;

use super::extract::CurrentPrincipal;
use super::gate::AuthGate;
use super::token::IssuedToken;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.token,
            token_type: "bearer".to_string(),
            expires_at: issued.expires_at,
        }
    }
}

async fn do_login(gate: &AuthGate, req: LoginRequest) -> Result<Json<TokenResponse>, ApiError> {
    let issued = gate.login(&req.email, &req.password).await?;
    Ok(Json(issued.into()))
}

async fn do_register(
    gate: &AuthGate,
    req: RegisterRequest,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    let principal = gate
        .register(&req.email, &req.password, req.full_name)
        .await?;
    Ok((StatusCode::CREATED, Json(principal)))
}

/// POST /api/auth/login (form-encoded)
async fn login(
    State(gate): State<Arc<AuthGate>>,
    ApiForm(req): ApiForm<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    do_login(&gate, req).await
}

/// POST /api/auth/login/json
async fn login_json(
    State(gate): State<Arc<AuthGate>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    do_login(&gate, req).await
}

/// POST /api/auth/register (form-encoded)
async fn register(
    State(gate): State<Arc<AuthGate>>,
    ApiForm(req): ApiForm<RegisterRequest>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    do_register(&gate, req).await
}

/// POST /api/auth/register/json
async fn register_json(
    State(gate): State<Arc<AuthGate>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    do_register(&gate, req).await
}

/// GET /api/auth/me
async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    Json(principal)
}

/// Build the authentication routes.
pub fn auth_routes(gate: Arc<AuthGate>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/login/json", post(login_json))
        .route("/api/auth/register", post(register))
        .route("/api/auth/register/json", post(register_json))
        .route("/api/auth/me", get(me))
        .with_state(gate)
}
