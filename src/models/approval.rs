use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `<provider>/<namespace-or-repo>:<tag>`. The repo part may itself contain
/// slashes (`k8s/project/repo:1.2.3`).
static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+/[^\s:]+:[^\s:]+$").unwrap());

pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_REGEX.is_match(identifier)
}

/// Image repository a deployment candidate points at.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    #[serde(default)]
    pub host: String,
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub digest: String,
}

/// A deployment candidate as reported by a provider. Opaque to the approval
/// engine; carried along so it can be handed back once the vote passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub repository: Repository,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub trigger_name: String,
}

impl Event {
    pub fn new(repository: Repository, trigger_name: &str) -> Self {
        Self {
            repository,
            created_at: Utc::now(),
            trigger_name: trigger_name.to_string(),
        }
    }
}

/// An image a provider is currently watching for new versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedImage {
    pub image: String,
    pub namespace: String,
    pub provider: String,
    pub trigger: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployment candidate gated behind a vote quorum.
///
/// Status is never stored; it is derived from the vote fields and the
/// deadline every time it is read (see [`Approval::status_at`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Approval {
    pub identifier: String,
    pub provider: String,
    pub current_version: String,
    pub new_version: String,
    #[serde(default)]
    pub message: String,
    pub votes_required: u32,
    pub votes_received: u32,
    /// Voters whose approve votes were counted.
    #[serde(default)]
    pub voters: BTreeSet<String>,
    pub rejected: bool,
    #[serde(default)]
    pub rejected_by: Option<String>,
    pub event: Event,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Approval {
    /// Timestamps are placeholders until the manager stamps them on create.
    pub fn new(
        identifier: impl Into<String>,
        current_version: impl Into<String>,
        new_version: impl Into<String>,
        votes_required: u32,
        event: Event,
    ) -> Self {
        let identifier = identifier.into();
        let provider = identifier
            .split_once('/')
            .map(|(p, _)| p.to_string())
            .unwrap_or_default();
        let now = Utc::now();
        Self {
            identifier,
            provider,
            current_version: current_version.into(),
            new_version: new_version.into(),
            message: String::new(),
            votes_required,
            votes_received: 0,
            voters: BTreeSet::new(),
            rejected: false,
            rejected_by: None,
            event,
            created_at: now,
            expires_at: now,
        }
    }

    /// Build a fresh approval for an event submitted by `provider`. The
    /// event's tag becomes the proposed version.
    pub fn from_event(
        provider: &str,
        event: Event,
        current_version: impl Into<String>,
        votes_required: u32,
    ) -> Self {
        let identifier = format!(
            "{}/{}:{}",
            provider, event.repository.name, event.repository.tag
        );
        let new_version = event.repository.tag.clone();
        Self::new(identifier, current_version, new_version, votes_required, event)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> ApprovalStatus {
        if self.rejected {
            ApprovalStatus::Rejected
        } else if self.votes_received >= self.votes_required {
            ApprovalStatus::Approved
        } else if now > self.expires_at {
            ApprovalStatus::Expired
        } else {
            ApprovalStatus::Pending
        }
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status_at(Utc::now())
    }

    /// Time left before the deadline, `None` once it has passed.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }

    pub fn delta(&self) -> String {
        format!("{} -> {}", self.current_version, self.new_version)
    }
}
