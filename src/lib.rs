//! promogate: quorum approvals for deployment promotions, collected over chat.
//!
//! Library crate; the `promogate` binary and the integration tests in
//! `tests/` both build on it.

use std::sync::Arc;

pub mod api;
pub mod approvals;
pub mod bot;
pub mod cli;
pub mod codec;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod notification;
pub mod providers;
pub mod store;

/// Shared application state passed to HTTP handlers.
pub struct AppState {
    pub manager: Arc<approvals::ApprovalManager>,
    pub dispatcher: bot::Dispatcher,
    pub metrics: Arc<metrics::Metrics>,
    /// Key required on every `/api/v1` route. Unset = API refuses all calls.
    pub admin_key: Option<String>,
}
