//! REST endpoints for user administration.

use std::sync::Arc;

use axum::extract::{FromRef, Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthGate, CurrentPrincipal};
use crate::questionnaire::SessionStore;
use crate::server::{ApiError, ApiJson, ApiQuery};

use super::model::{Principal, PrincipalUpdate};

/// Largest page `GET /api/users` will return.
const MAX_PAGE: usize = 100;

/// Shared state for user routes.
#[derive(Clone)]
pub struct UserRouteState {
    pub auth: Arc<AuthGate>,
    pub sessions: Arc<SessionStore>,
}

impl FromRef<UserRouteState> for Arc<AuthGate> {
    fn from_ref(state: &UserRouteState) -> Self {
        Arc::clone(&state.auth)
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    MAX_PAGE
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("User {id} not found"))
}

/// GET /api/users
async fn list_users(
    State(state): State<UserRouteState>,
    CurrentPrincipal(_): CurrentPrincipal,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Vec<Principal>>, ApiError> {
    let users = state
        .auth
        .store()
        .list_users(page.skip, page.limit.min(MAX_PAGE))
        .await?;
    Ok(Json(users))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<UserRouteState>,
    CurrentPrincipal(_): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Principal>, ApiError> {
    state
        .auth
        .store()
        .get_user(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// PUT /api/users/{id}
async fn update_user(
    State(state): State<UserRouteState>,
    CurrentPrincipal(actor): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ApiJson(update): ApiJson<PrincipalUpdate>,
) -> Result<Json<Principal>, ApiError> {
    if update.is_empty() {
        return state
            .auth
            .store()
            .get_user(id)
            .await?
            .map(Json)
            .ok_or_else(|| not_found(id));
    }

    let updated = state
        .auth
        .update_principal(id, update)
        .await?
        .ok_or_else(|| not_found(id))?;
    info!(actor = %actor.id, user_id = %id, "User updated via admin API");
    Ok(Json(updated))
}

/// DELETE /api/users/{id}
async fn delete_user(
    State(state): State<UserRouteState>,
    CurrentPrincipal(actor): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.auth.store().delete_user(id).await? {
        return Err(not_found(id));
    }
    state.sessions.remove(id).await;
    info!(actor = %actor.id, user_id = %id, "User deleted");
    Ok(Json(serde_json::json!({ "message": "User deleted successfully" })))
}

/// Build the user administration routes.
pub fn user_routes(state: UserRouteState) -> Router {
    Router::new()
        .route("/api/users", get(list_users))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(state)
}
