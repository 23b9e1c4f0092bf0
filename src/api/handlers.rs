use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::bot::InboundMessage;
use crate::errors::ApprovalError;
use crate::models::approval::{Approval, ApprovalStatus, Event};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

/// A provider reporting a deployment candidate that needs votes.
#[derive(Deserialize)]
pub struct CreateApprovalRequest {
    pub provider: String,
    pub event: Event,
    pub current_version: String,
    pub votes_required: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct IdentifierParams {
    pub identifier: String,
}

#[derive(Serialize)]
pub struct ApprovalView {
    #[serde(flatten)]
    pub approval: Approval,
    pub status: ApprovalStatus,
}

impl From<Approval> for ApprovalView {
    fn from(approval: Approval) -> Self {
        let status = approval.status();
        Self { approval, status }
    }
}

#[derive(Serialize)]
pub struct ChatEventResponse {
    pub accepted: bool,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/approvals: list live approvals
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ApprovalView>>, ApprovalError> {
    let approvals = state.manager.list().await?;
    Ok(Json(approvals.into_iter().map(ApprovalView::from).collect()))
}

/// POST /api/v1/approvals: open an approval for a provider event
pub async fn create_approval(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateApprovalRequest>,
) -> Result<(StatusCode, Json<ApprovalView>), ApprovalError> {
    let mut approval = Approval::from_event(
        &payload.provider,
        payload.event,
        payload.current_version,
        payload.votes_required,
    );
    if let Some(message) = payload.message {
        approval = approval.with_message(message);
    }

    let created = state.manager.create(approval).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/v1/approvals/lookup?identifier=: fetch one approval
pub async fn get_approval(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentifierParams>,
) -> Result<Json<ApprovalView>, ApprovalError> {
    let approval = state.manager.get(&params.identifier).await?;
    Ok(Json(approval.into()))
}

/// DELETE /api/v1/approvals?identifier=: archive an approval
pub async fn delete_approval(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentifierParams>,
) -> Result<StatusCode, ApprovalError> {
    state.manager.delete(&params.identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/chat/events: inbound chat message from the platform bridge
pub async fn chat_event(
    State(state): State<Arc<AppState>>,
    Json(message): Json<InboundMessage>,
) -> (StatusCode, Json<ChatEventResponse>) {
    let accepted = state.dispatcher.handle_inbound(message).await;
    (StatusCode::ACCEPTED, Json(ChatEventResponse { accepted }))
}

/// GET /metrics: Prometheus scrape endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.encode()
}
