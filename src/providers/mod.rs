//! Deployment providers: the sources of approval-worthy events and the
//! consumers of approved ones.
//!
//! Discovery and rollout live in the provider implementations; this module only
//! fixes the contract and relays approved events back to them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::approvals::{ApprovalNotice, ApprovalObserver};
use crate::models::approval::{ApprovalStatus, Event, TrackedImage};

#[async_trait]
pub trait Provider: Send + Sync {
    /// Hand an event to the provider. For approved events this triggers the
    /// actual rollout.
    async fn submit(&self, event: Event) -> anyhow::Result<()>;

    async fn tracked_images(&self) -> anyhow::Result<Vec<TrackedImage>>;

    /// Names of the workloads the provider manages.
    fn list(&self) -> Vec<String>;

    fn stop(&self);

    fn name(&self) -> &str;
}

/// Set of registered providers.
#[derive(Clone, Default)]
pub struct Providers {
    providers: Vec<Arc<dyn Provider>>,
}

impl Providers {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn tracked_images(&self) -> Vec<TrackedImage> {
        let mut images = Vec::new();
        for provider in &self.providers {
            match provider.tracked_images().await {
                Ok(mut tracked) => images.append(&mut tracked),
                Err(e) => warn!(provider = provider.name(), error = %e, "failed to list tracked images"),
            }
        }
        images
    }

    /// Submit to the named provider only. Returns `false` when no provider
    /// of that name is registered; the event is then not delivered anywhere.
    pub async fn submit(&self, provider: &str, event: Event) -> bool {
        let Some(target) = self.get(provider) else {
            warn!(provider, "no provider registered under this name, event dropped");
            return false;
        };
        if let Err(e) = target.submit(event).await {
            warn!(provider = target.name(), error = %e, "provider rejected event");
        }
        true
    }

    pub fn stop(&self) {
        for provider in &self.providers {
            provider.stop();
        }
    }
}

/// Resubmits an approval's event to the provider that owns it once the vote
/// passes. Approvals whose provider is not registered are dropped with a warning.
pub struct ProviderRelay {
    providers: Providers,
}

impl ProviderRelay {
    pub fn new(providers: Providers) -> Self {
        Self { providers }
    }
}

impl ApprovalObserver for ProviderRelay {
    fn notify(&self, notice: &ApprovalNotice) {
        let ApprovalNotice::StatusChanged {
            approval,
            status: ApprovalStatus::Approved,
        } = notice
        else {
            return;
        };
        if self.providers.is_empty() {
            return;
        }

        info!(
            identifier = %approval.identifier,
            provider = %approval.provider,
            "approval reached quorum, resubmitting event"
        );
        let providers = self.providers.clone();
        let provider = approval.provider.clone();
        let event = approval.event.clone();
        tokio::spawn(async move {
            providers.submit(&provider, event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::{Approval, Repository};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeProvider {
        name: String,
        submitted: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        async fn submit(&self, event: Event) -> anyhow::Result<()> {
            self.submitted.lock().unwrap().push(event);
            Ok(())
        }
        async fn tracked_images(&self) -> anyhow::Result<Vec<TrackedImage>> {
            Ok(vec![TrackedImage {
                image: "project/repo".into(),
                namespace: "default".into(),
                provider: self.name.clone(),
                trigger: "poll".into(),
            }])
        }
        fn list(&self) -> Vec<String> {
            vec!["fakeprovider".into()]
        }
        fn stop(&self) {}
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn fake(name: &str) -> Arc<FakeProvider> {
        Arc::new(FakeProvider {
            name: name.into(),
            ..Default::default()
        })
    }

    fn approval() -> Approval {
        let event = Event::new(
            Repository {
                name: "project/repo".into(),
                tag: "1.2.3".into(),
                ..Default::default()
            },
            "poll",
        );
        Approval::from_event("fp", event, "1.2.2", 1)
    }

    #[tokio::test]
    async fn test_relay_submits_to_owning_provider_on_approval() {
        let fp = fake("fp");
        let other = fake("other");
        let relay = ProviderRelay::new(Providers::new(vec![fp.clone() as Arc<dyn Provider>, other.clone()]));
        let a = approval();

        relay.notify(&ApprovalNotice::Created(a.clone()));
        relay.notify(&ApprovalNotice::StatusChanged {
            approval: a.clone(),
            status: ApprovalStatus::Rejected,
        });
        relay.notify(&ApprovalNotice::StatusChanged {
            approval: a.clone(),
            status: ApprovalStatus::Approved,
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let submitted = fp.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0], a.event);
        assert!(other.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tracked_images_are_merged() {
        let providers = Providers::new(vec![fake("a") as Arc<dyn Provider>, fake("b")]);
        let images = providers.tracked_images().await;
        assert_eq!(images.len(), 2);
        assert_eq!(providers.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_broadcast() {
        let a = fake("a");
        let b = fake("b");
        let providers = Providers::new(vec![a.clone() as Arc<dyn Provider>, b.clone()]);

        let delivered = providers.submit("missing", approval().event).await;

        assert!(!delivered);
        assert!(a.submitted.lock().unwrap().is_empty());
        assert!(b.submitted.lock().unwrap().is_empty());
        assert!(providers.submit("b", approval().event).await);
        assert_eq!(b.submitted.lock().unwrap().len(), 1);
    }
}
