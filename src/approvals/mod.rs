//! Approval lifecycle and quorum voting.

pub mod manager;
pub mod observer;

pub use manager::ApprovalManager;
pub use observer::{ApprovalNotice, ApprovalObserver};
