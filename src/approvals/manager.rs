use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::observer::{ApprovalNotice, ApprovalObserver};
use crate::codec::Codec;
use crate::errors::{ApprovalError, Result};
use crate::models::approval::{is_valid_identifier, Approval, ApprovalStatus, Decision};
use crate::store::ApprovalStore;

pub const DEFAULT_APPROVAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Owns approval records and their quorum logic.
///
/// Every mutation (create, vote, delete) is a read-modify-write held under one
/// manager-wide guard, so an HTTP delete can never interleave with a vote the
/// chat consumer (see `bot::Dispatcher`) is applying.
pub struct ApprovalManager {
    store: Arc<dyn ApprovalStore>,
    codec: Arc<dyn Codec>,
    ttl: Duration,
    observers: RwLock<Vec<Arc<dyn ApprovalObserver>>>,
    /// Held from load to write in every mutation.
    write_lock: Mutex<()>,
}

impl ApprovalManager {
    pub fn new(store: Arc<dyn ApprovalStore>, codec: Arc<dyn Codec>) -> Self {
        Self {
            store,
            codec,
            ttl: DEFAULT_APPROVAL_TTL,
            observers: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn subscribe(&self, observer: Arc<dyn ApprovalObserver>) {
        self.observers.write().await.push(observer);
    }

    /// Stamp, validate and store a new approval.
    ///
    /// Fails with `AlreadyExists` while a pending approval holds the same
    /// identifier. A terminal record under the identifier is replaced.
    pub async fn create(&self, mut approval: Approval) -> Result<Approval> {
        if approval.votes_required == 0 {
            return Err(ApprovalError::Invalid(
                "votes_required must be at least 1".to_string(),
            ));
        }
        if !is_valid_identifier(&approval.identifier) {
            return Err(ApprovalError::Invalid(format!(
                "identifier '{}' is not <provider>/<repo>:<tag>",
                approval.identifier
            )));
        }
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|_| ApprovalError::Invalid("approval ttl out of range".to_string()))?;

        let guard = self.write_lock.lock().await;

        if let Some(existing) = self.load(&approval.identifier).await? {
            if !existing.status().is_terminal() {
                return Err(ApprovalError::AlreadyExists(approval.identifier));
            }
            debug!(
                identifier = %approval.identifier,
                previous = %existing.status(),
                "replacing finalized approval"
            );
        }

        let now = Utc::now();
        approval.created_at = now;
        approval.expires_at = now + ttl;
        approval.votes_received = 0;
        approval.voters.clear();
        approval.rejected = false;
        approval.rejected_by = None;

        self.persist(&approval, self.ttl).await?;
        drop(guard);

        info!(
            identifier = %approval.identifier,
            delta = %approval.delta(),
            votes_required = approval.votes_required,
            expires_at = %approval.expires_at,
            "approval created"
        );
        self.notify(ApprovalNotice::Created(approval.clone())).await;
        Ok(approval)
    }

    /// Fails with `NotFound` for missing and expired approvals.
    pub async fn get(&self, identifier: &str) -> Result<Approval> {
        match self.load(identifier).await? {
            Some(approval) if approval.status() != ApprovalStatus::Expired => Ok(approval),
            _ => Err(ApprovalError::NotFound(identifier.to_string())),
        }
    }

    /// Apply one vote.
    ///
    /// A single reject finalizes the approval as Rejected. Approve votes count
    /// towards quorum; a second approve from the same voter is refused with
    /// `AlreadyVoted` and changes nothing. The record keeps its original
    /// deadline. Nothing is observable unless the write succeeds.
    pub async fn vote(
        &self,
        identifier: &str,
        voter: &str,
        decision: Decision,
    ) -> Result<Approval> {
        let guard = self.write_lock.lock().await;
        let mut approval = self
            .load(identifier)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(identifier.to_string()))?;

        let now = Utc::now();
        match approval.status_at(now) {
            ApprovalStatus::Pending => {}
            ApprovalStatus::Expired => return Err(ApprovalError::NotFound(identifier.to_string())),
            status => {
                return Err(ApprovalError::AlreadyFinalized {
                    identifier: identifier.to_string(),
                    status,
                })
            }
        }

        match decision {
            Decision::Reject => {
                approval.rejected = true;
                approval.rejected_by = Some(voter.to_string());
            }
            Decision::Approve => {
                if !approval.voters.insert(voter.to_string()) {
                    return Err(ApprovalError::AlreadyVoted {
                        identifier: identifier.to_string(),
                        voter: voter.to_string(),
                    });
                }
                approval.votes_received += 1;
            }
        }

        let ttl = approval
            .remaining_ttl(now)
            .ok_or_else(|| ApprovalError::NotFound(identifier.to_string()))?;
        self.persist(&approval, ttl).await?;
        drop(guard);

        let status = approval.status_at(now);
        info!(
            identifier,
            voter,
            decision = %decision,
            votes_received = approval.votes_received,
            votes_required = approval.votes_required,
            status = %status,
            "vote recorded"
        );

        self.notify(ApprovalNotice::Voted {
            approval: approval.clone(),
            voter: voter.to_string(),
            decision,
        })
        .await;
        if status.is_terminal() {
            self.notify(ApprovalNotice::StatusChanged {
                approval: approval.clone(),
                status,
            })
            .await;
        }
        Ok(approval)
    }

    /// All live approvals, oldest first.
    pub async fn list(&self) -> Result<Vec<Approval>> {
        let keys = self.store.keys().await.map_err(ApprovalError::Store)?;
        let now = Utc::now();
        let mut approvals = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(approval) = self.load(&key).await? {
                if approval.status_at(now) != ApprovalStatus::Expired {
                    approvals.push(approval);
                }
            }
        }
        approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(approvals)
    }

    pub async fn delete(&self, identifier: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.load(identifier).await?.is_none() {
            return Err(ApprovalError::NotFound(identifier.to_string()));
        }
        self.store
            .delete(identifier)
            .await
            .map_err(ApprovalError::Store)?;
        info!(identifier, "approval deleted");
        Ok(())
    }

    async fn load(&self, identifier: &str) -> Result<Option<Approval>> {
        let bytes = self
            .store
            .get(identifier)
            .await
            .map_err(ApprovalError::Store)?;
        bytes
            .map(|b| self.codec.decode(&b).map_err(ApprovalError::Codec))
            .transpose()
    }

    async fn persist(&self, approval: &Approval, ttl: Duration) -> Result<()> {
        let bytes = self.codec.encode(approval).map_err(ApprovalError::Codec)?;
        self.store
            .put(&approval.identifier, bytes, ttl)
            .await
            .map_err(ApprovalError::Store)
    }

    async fn notify(&self, notice: ApprovalNotice) {
        for observer in self.observers.read().await.iter() {
            observer.notify(&notice);
        }
    }
}
