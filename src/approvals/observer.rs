use crate::models::approval::{Approval, ApprovalStatus, Decision};

/// Something the manager reports after a state change has been persisted.
#[derive(Debug, Clone)]
pub enum ApprovalNotice {
    Created(Approval),
    Voted {
        approval: Approval,
        voter: String,
        decision: Decision,
    },
    /// The approval crossed into a terminal status.
    StatusChanged {
        approval: Approval,
        status: ApprovalStatus,
    },
}

impl ApprovalNotice {
    pub fn approval(&self) -> &Approval {
        match self {
            ApprovalNotice::Created(approval)
            | ApprovalNotice::Voted { approval, .. }
            | ApprovalNotice::StatusChanged { approval, .. } => approval,
        }
    }
}

/// Subscriber to approval notices.
///
/// Called inline from the manager after the store write succeeded, so
/// implementations must return quickly: hand the notice to a channel or a
/// spawned task. Delivery is best effort and can never roll back the write.
pub trait ApprovalObserver: Send + Sync {
    fn notify(&self, notice: &ApprovalNotice);
}
