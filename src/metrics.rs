//! Prometheus metrics for the approval engine.
//!
//! Exposed on `/metrics`. Updated from manager notices, so counts only ever
//! reflect state changes that were persisted.

use prometheus::{opts, CounterVec, Encoder, IntCounter, Registry, TextEncoder};

use crate::approvals::{ApprovalNotice, ApprovalObserver};

pub struct Metrics {
    registry: Registry,
    approvals_created_total: IntCounter,
    votes_total: CounterVec,
    approvals_finalized_total: CounterVec,
}

impl Metrics {
    /// Create all metrics in a registry owned by this recorder.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let approvals_created_total = IntCounter::with_opts(opts!(
            "promogate_approvals_created_total",
            "Total number of approvals created"
        ))?;
        registry.register(Box::new(approvals_created_total.clone()))?;

        let votes_total = CounterVec::new(
            opts!("promogate_votes_total", "Total votes recorded by decision"),
            &["decision"],
        )?;
        registry.register(Box::new(votes_total.clone()))?;

        let approvals_finalized_total = CounterVec::new(
            opts!(
                "promogate_approvals_finalized_total",
                "Approvals that reached a terminal status"
            ),
            &["status"],
        )?;
        registry.register(Box::new(approvals_finalized_total.clone()))?;

        Ok(Self {
            registry,
            approvals_created_total,
            votes_total,
            approvals_finalized_total,
        })
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl ApprovalObserver for Metrics {
    fn notify(&self, notice: &ApprovalNotice) {
        match notice {
            ApprovalNotice::Created(_) => self.approvals_created_total.inc(),
            ApprovalNotice::Voted { decision, .. } => self
                .votes_total
                .with_label_values(&[decision.as_str()])
                .inc(),
            ApprovalNotice::StatusChanged { status, .. } => self
                .approvals_finalized_total
                .with_label_values(&[status.as_str()])
                .inc(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::{Approval, ApprovalStatus, Decision, Event, Repository};

    #[test]
    fn test_notices_are_counted() {
        let metrics = Metrics::new().unwrap();
        let approval = Approval::new(
            "p/r:1.2.3",
            "1.2.2",
            "1.2.3",
            1,
            Event::new(Repository::default(), "poll"),
        );

        metrics.notify(&ApprovalNotice::Created(approval.clone()));
        metrics.notify(&ApprovalNotice::Voted {
            approval: approval.clone(),
            voter: "U1".into(),
            decision: Decision::Approve,
        });
        metrics.notify(&ApprovalNotice::StatusChanged {
            approval,
            status: ApprovalStatus::Approved,
        });

        let output = metrics.encode();
        assert!(output.contains("promogate_approvals_created_total 1"));
        assert!(output.contains("promogate_votes_total{decision=\"approve\"} 1"));
        assert!(output.contains("promogate_approvals_finalized_total{status=\"approved\"} 1"));
    }

    #[test]
    fn test_independent_registries() {
        // Two recorders must not collide on registration.
        assert!(Metrics::new().is_ok());
        assert!(Metrics::new().is_ok());
    }
}
