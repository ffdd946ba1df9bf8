//! REST endpoints for the questionnaire.

use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthGate, CurrentPrincipal};
use crate::server::{ApiError, ApiJson};

use super::flow::QuestionFlow;
use super::proposal::ProposalSynthesizer;
use super::session::SessionSnapshot;
use super::store::SessionStore;

/// Shared state for questionnaire routes.
#[derive(Clone)]
pub struct QuestionRouteState {
    pub auth: Arc<AuthGate>,
    pub flow: Arc<QuestionFlow>,
    pub proposals: Arc<ProposalSynthesizer>,
    pub sessions: Arc<SessionStore>,
    pub default_questions: usize,
}

impl FromRef<QuestionRouteState> for Arc<AuthGate> {
    fn from_ref(state: &QuestionRouteState) -> Self {
        Arc::clone(&state.auth)
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub current_num: usize,
    #[serde(default)]
    pub num_questions: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question: String,
    pub current_num: usize,
    pub total_questions: usize,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
    pub current_num: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub message: String,
    pub current_num: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub proposal: String,
}

/// POST /api/questions
async fn next_question(
    State(state): State<QuestionRouteState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(req): ApiJson<QuestionRequest>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let total = req.num_questions.unwrap_or(state.default_questions);
    let generated = state
        .flow
        .next_question(principal.id, req.current_num, total)
        .await?;
    Ok(Json(QuestionResponse {
        question: generated.question,
        current_num: generated.next_cursor,
        total_questions: generated.total,
    }))
}

/// POST /api/questions/answer
async fn record_answer(
    State(state): State<QuestionRouteState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(req): ApiJson<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let ack = state
        .flow
        .record_answer(principal.id, req.current_num, req.answer)
        .await?;
    Ok(Json(AnswerResponse {
        message: "回答が正常に保存されました".to_string(),
        current_num: ack.next_cursor,
    }))
}

/// POST /api/questions/proposal
async fn proposal(
    State(state): State<QuestionRouteState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<ProposalResponse>, ApiError> {
    let proposal = state.proposals.synthesize(principal.id).await?;
    Ok(Json(ProposalResponse {
        proposal: proposal.text,
    }))
}

/// GET /api/questions/session
async fn session(
    State(state): State<QuestionRouteState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Json<SessionSnapshot> {
    Json(state.sessions.snapshot(principal.id).await)
}

/// POST /api/questions/reset
async fn reset(
    State(state): State<QuestionRouteState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Json<serde_json::Value> {
    state.sessions.reset(principal.id).await;
    Json(serde_json::json!({ "message": "セッションが正常にリセットされました" }))
}

/// Build the questionnaire routes.
pub fn question_routes(state: QuestionRouteState) -> Router {
    Router::new()
        .route("/api/questions", post(next_question))
        .route("/api/questions/answer", post(record_answer))
        .route("/api/questions/proposal", post(proposal))
        .route("/api/questions/session", get(session))
        .route("/api/questions/reset", post(reset))
        .with_state(state)
}
