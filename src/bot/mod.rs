//! Chat dispatcher.
//!
//! Bridges the approval manager and a chat platform:
//!
//! 1. New approvals are announced in the configured channel.
//! 2. Inbound chat text is parsed into commands (see [`commands`]).
//! 3. Votes go onto a bounded queue drained by exactly one consumer task,
//!    which calls [`ApprovalManager::vote`] and posts the outcome.
//!
//! The single consumer is what keeps two replies to the same identifier from
//! racing on its vote count; the manager itself does not lock votes.

pub mod commands;
pub mod messages;
pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::approvals::{ApprovalManager, ApprovalNotice, ApprovalObserver};
use crate::errors::TransportError;
use crate::models::approval::{Approval, Decision};
use commands::Command;
use transport::{ChatTransport, PostOptions, PostedMessage};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Channel new approvals are announced in.
    pub channel: String,
    pub bot_name: String,
    /// Messages from this user are the bot's own and never parsed.
    pub bot_user_id: Option<String>,
    pub post_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            channel: "general".to_string(),
            bot_name: "promogate".to_string(),
            bot_user_id: None,
            post_timeout: Duration::from_secs(10),
            queue_capacity: 100,
        }
    }
}

/// A chat message as delivered by the platform's event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
    /// Channel the message arrived in; replies go there.
    #[serde(default)]
    pub channel: Option<String>,
}

/// A parsed vote waiting for the consumer.
#[derive(Debug, Clone)]
pub struct ApprovalResponse {
    pub voter: String,
    pub decision: Decision,
    pub identifier: String,
    pub text: String,
    pub channel: String,
    /// Arrival order across all producers.
    pub seq: u64,
}

#[derive(Debug)]
enum Job {
    Vote(ApprovalResponse),
    Help { channel: String },
}

struct Inner {
    manager: Arc<ApprovalManager>,
    transport: Arc<dyn ChatTransport>,
    config: DispatcherConfig,
}

/// Producer-side handle. Cheap to clone; every clone feeds the same consumer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
    jobs: mpsc::Sender<Job>,
    seq: Arc<AtomicU64>,
}

/// Background tasks owned by a running dispatcher.
pub struct DispatcherTasks {
    announcer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl DispatcherTasks {
    /// Wait for both loops to exit (after the cancellation token fires).
    pub async fn join(self) {
        if let Err(e) = self.announcer.await {
            warn!(error = %e, "announcer task failed");
        }
        if let Err(e) = self.consumer.await {
            warn!(error = %e, "vote consumer task failed");
        }
    }
}

/// Forwards creation notices from the manager into the announcer loop
/// without blocking the manager.
struct CreationForwarder {
    tx: mpsc::Sender<Approval>,
}

impl ApprovalObserver for CreationForwarder {
    fn notify(&self, notice: &ApprovalNotice) {
        if let ApprovalNotice::Created(approval) = notice {
            if let Err(e) = self.tx.try_send(approval.clone()) {
                warn!(
                    identifier = %approval.identifier,
                    error = %e,
                    "dropping approval announcement"
                );
            }
        }
    }
}

impl Dispatcher {
    /// Subscribe to `manager` and start the announcer and vote consumer.
    /// Both stop when `cancel` fires.
    pub async fn spawn(
        manager: Arc<ApprovalManager>,
        transport: Arc<dyn ChatTransport>,
        config: DispatcherConfig,
        cancel: CancellationToken,
    ) -> (Self, DispatcherTasks) {
        let capacity = config.queue_capacity.max(1);
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity);
        let (created_tx, created_rx) = mpsc::channel(capacity);

        manager
            .subscribe(Arc::new(CreationForwarder { tx: created_tx }))
            .await;

        let inner = Arc::new(Inner {
            manager,
            transport,
            config,
        });

        let announcer = tokio::spawn(announce_loop(inner.clone(), created_rx, cancel.clone()));
        let consumer = tokio::spawn(consume_loop(inner.clone(), jobs_rx, cancel));

        info!(
            channel = %inner.config.channel,
            queue_capacity = capacity,
            "chat dispatcher started"
        );

        (
            Self {
                inner,
                jobs: jobs_tx,
                seq: Arc::new(AtomicU64::new(0)),
            },
            DispatcherTasks {
                announcer,
                consumer,
            },
        )
    }

    /// Parse an inbound message and queue it. Returns `false` if the message
    /// was ignored (noise, the bot's own message, or a stopped dispatcher).
    ///
    /// Waits for queue space when the consumer is behind.
    pub async fn handle_inbound(&self, message: InboundMessage) -> bool {
        if self.inner.config.bot_user_id.as_deref() == Some(message.sender.as_str()) {
            return false;
        }

        let Some(command) = commands::parse(&message.text) else {
            debug!(sender = %message.sender, "ignoring non-command message");
            return false;
        };

        let channel = message
            .channel
            .unwrap_or_else(|| self.inner.config.channel.clone());

        let job = match command {
            Command::Help => Job::Help { channel },
            Command::Vote {
                decision,
                identifier,
            } => Job::Vote(ApprovalResponse {
                voter: message.sender,
                decision,
                identifier,
                text: message.text,
                channel,
                seq: self.seq.fetch_add(1, Ordering::SeqCst),
            }),
        };

        if self.jobs.send(job).await.is_err() {
            warn!("vote consumer has stopped, dropping command");
            return false;
        }
        true
    }
}

async fn announce_loop(
    inner: Arc<Inner>,
    mut created: mpsc::Receiver<Approval>,
    cancel: CancellationToken,
) {
    loop {
        let approval = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = created.recv() => match next {
                Some(approval) => approval,
                None => break,
            },
        };

        let text = messages::approval_request(&approval);
        if inner.post(&inner.config.channel, &text, &cancel).await.is_some() {
            info!(identifier = %approval.identifier, "approval announced");
        }
    }
    debug!("approval announcer stopped");
}

async fn consume_loop(inner: Arc<Inner>, mut jobs: mpsc::Receiver<Job>, cancel: CancellationToken) {
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = jobs.recv() => match next {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            Job::Vote(response) => inner.apply_vote(response, &cancel).await,
            Job::Help { channel } => {
                let text = messages::help(&inner.config.bot_name);
                inner.post(&channel, &text, &cancel).await;
            }
        }
    }
    debug!("vote consumer stopped");
}

impl Inner {
    async fn apply_vote(&self, response: ApprovalResponse, cancel: &CancellationToken) {
        let text = match self
            .manager
            .vote(&response.identifier, &response.voter, response.decision)
            .await
        {
            Ok(approval) => messages::vote_result(&approval, &response.voter, response.decision),
            Err(e) => {
                warn!(
                    identifier = %response.identifier,
                    voter = %response.voter,
                    seq = response.seq,
                    error = %e,
                    "vote not applied"
                );
                messages::vote_error(&e, &response.identifier)
            }
        };
        self.post(&response.channel, &text, cancel).await;
    }

    /// Post with the configured timeout, abandoning the call on cancellation.
    /// Failures are logged and swallowed.
    async fn post(
        &self,
        channel: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Option<PostedMessage> {
        let options = PostOptions {
            username: Some(self.config.bot_name.clone()),
            ..Default::default()
        };
        let timeout = self.config.post_timeout;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            r = tokio::time::timeout(timeout, self.transport.post_message(channel, text, &options)) => {
                r.unwrap_or(Err(TransportError::Timeout(timeout)))
            }
        };

        match result {
            Ok(posted) => Some(posted),
            Err(e) => {
                warn!(channel, error = %e, "failed to post chat message");
                None
            }
        }
    }
}
