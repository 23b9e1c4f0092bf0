use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::approvals::{ApprovalNotice, ApprovalObserver};
use crate::models::approval::{Approval, ApprovalStatus};

// ── Webhook Event Types ───────────────────────────────────────

/// A structured event payload sent to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// Event type identifier, e.g. "approval_created", "approval_approved".
    pub event_type: String,
    /// ISO-8601 timestamp of when the event occurred.
    pub timestamp: String,
    pub identifier: String,
    pub provider: String,
    pub status: ApprovalStatus,
    /// Event-specific details (versions, votes, deadline, ...).
    pub details: serde_json::Value,
}

impl WebhookEvent {
    fn for_approval(event_type: &str, approval: &Approval, status: ApprovalStatus) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            identifier: approval.identifier.clone(),
            provider: approval.provider.clone(),
            status,
            details: serde_json::json!({
                "current_version": approval.current_version,
                "new_version": approval.new_version,
                "votes_required": approval.votes_required,
                "votes_received": approval.votes_received,
                "expires_at": approval.expires_at.to_rfc3339(),
                "event": approval.event,
            }),
        }
    }

    pub fn approval_created(approval: &Approval) -> Self {
        Self::for_approval("approval_created", approval, ApprovalStatus::Pending)
    }

    pub fn approval_approved(approval: &Approval) -> Self {
        let mut event = Self::for_approval("approval_approved", approval, ApprovalStatus::Approved);
        event.details["voters"] = serde_json::json!(approval.voters);
        event
    }

    pub fn approval_rejected(approval: &Approval) -> Self {
        let mut event = Self::for_approval("approval_rejected", approval, ApprovalStatus::Rejected);
        event.details["rejected_by"] = serde_json::json!(approval.rejected_by);
        event
    }

    /// The webhook event for a manager notice, if it warrants one.
    pub fn from_notice(notice: &ApprovalNotice) -> Option<Self> {
        match notice {
            ApprovalNotice::Created(approval) => Some(Self::approval_created(approval)),
            ApprovalNotice::StatusChanged {
                approval,
                status: ApprovalStatus::Approved,
            } => Some(Self::approval_approved(approval)),
            ApprovalNotice::StatusChanged {
                approval,
                status: ApprovalStatus::Rejected,
            } => Some(Self::approval_rejected(approval)),
            _ => None,
        }
    }
}

// ── HMAC Signing ─────────────────────────────────────────────

/// Compute HMAC-SHA256 of `payload` using `secret`.
/// Returns lowercase hex digest (e.g. "sha256=<hex>").
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    let result = mac.finalize();
    let bytes = result.into_bytes();
    format!("sha256={}", hex::encode(bytes))
}

// ── Webhook Notifier ──────────────────────────────────────────

/// Dispatches webhook events to one or more configured URLs.
/// Supports:
/// - HMAC-SHA256 signing (X-Promogate-Signature header)
/// - Up to 3 retries with exponential back-off (1s → 5s → 25s)
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    backoff_secs: Vec<u64>,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Promogate-Webhook/1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build webhook HTTP client: {}", e))?;
        Ok(Self {
            client,
            backoff_secs: vec![0, 1, 5, 25],
        })
    }

    /// Override the delay schedule; one attempt per entry.
    pub fn with_backoff(mut self, backoff_secs: Vec<u64>) -> Self {
        self.backoff_secs = backoff_secs;
        self
    }

    /// Send a signed webhook event to a single URL with retry.
    ///
    /// If `signing_secret` is `Some`, the request body is signed with HMAC-SHA256
    /// and the signature is sent in the `X-Promogate-Signature` header.
    pub async fn send_signed(
        &self,
        url: &str,
        event: &WebhookEvent,
        signing_secret: Option<&str>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| anyhow::anyhow!("webhook serialize error: {}", e))?;
        let delivery_id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = signing_secret.map(|s| hmac_sha256_hex(s, &payload));

        for (attempt, &delay) in self.backoff_secs.iter().enumerate() {
            if delay > 0 {
                debug!(
                    url,
                    attempt,
                    delay_secs = delay,
                    event_type = %event.event_type,
                    "retrying webhook delivery"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            let mut req = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-promogate-delivery-id", &delivery_id)
                .header("x-promogate-timestamp", &timestamp)
                .header("x-promogate-event", &event.event_type);

            if let Some(ref sig) = signature {
                req = req.header("x-promogate-signature", sig.as_str());
            }

            match req.body(payload.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        url,
                        event_type = %event.event_type,
                        identifier = %event.identifier,
                        delivery_id = %delivery_id,
                        attempt,
                        "webhook delivered"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        status = %status,
                        body = %body,
                        "webhook delivery failed (non-2xx), will retry"
                    );
                }
                Err(e) => {
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        error = %e,
                        "webhook request error, will retry"
                    );
                }
            }
        }

        Err(anyhow::anyhow!(
            "webhook delivery failed after {} attempts: {}",
            self.backoff_secs.len(),
            url
        ))
    }

    /// Dispatch an event to every target (fire-and-forget). Each URL gets its
    /// own delivery task, so a dead endpoint retrying does not hold up others.
    pub fn dispatch(
        &self,
        urls: &[String],
        signing_secret: Option<String>,
        event: WebhookEvent,
    ) -> Vec<JoinHandle<()>> {
        if urls.is_empty() {
            debug!("dispatch: no webhook targets, skipping");
            return Vec::new();
        }

        urls.iter()
            .map(|url| {
                let notifier = self.clone();
                let url = url.clone();
                let event = event.clone();
                let signing_secret = signing_secret.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier
                        .send_signed(&url, &event, signing_secret.as_deref())
                        .await
                    {
                        warn!(url = %url, error = %e, "webhook dispatch ultimately failed");
                    }
                })
            })
            .collect()
    }
}

// ── Approval Observer ─────────────────────────────────────────

/// Forwards creations and final decisions to external webhooks so an
/// orchestrator can act on them.
pub struct WebhookRelay {
    notifier: WebhookNotifier,
    urls: Vec<String>,
    signing_secret: Option<String>,
}

impl WebhookRelay {
    pub fn new(notifier: WebhookNotifier, urls: Vec<String>, signing_secret: Option<String>) -> Self {
        Self {
            notifier,
            urls,
            signing_secret,
        }
    }
}

impl ApprovalObserver for WebhookRelay {
    fn notify(&self, notice: &ApprovalNotice) {
        if let Some(event) = WebhookEvent::from_notice(notice) {
            self.notifier
                .dispatch(&self.urls, self.signing_secret.clone(), event);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
