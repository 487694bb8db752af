//! Downstream routing between pipeline stages.
//!
//! A connector owns one part's routing table and forwards processed items
//! to the next stage(s) through their abstract receive capability. Zero
//! targets (terminal stage), one target, and fan-out are all legal
//! configurations.

use crate::error::{ActorError, Result};
use crate::part::PartId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// The receive capability a connector forwards into. `Part` implements
/// this; the connector never sees more of a part than this trait.
#[async_trait]
pub trait Inbound<T>: Send + Sync {
    fn id(&self) -> &PartId;

    async fn receive(&self, item: T) -> Result<()>;
}

/// Routing table from one part to its downstream part(s).
pub struct Connector<T> {
    downstream: RwLock<Vec<Arc<dyn Inbound<T>>>>,
}

impl<T> Default for Connector<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Connector<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            downstream: RwLock::new(Vec::new()),
        }
    }

    /// Add a downstream target. Wiring is expected during pipeline
    /// assembly, before traffic flows.
    pub fn add_target(&self, target: Arc<dyn Inbound<T>>) {
        self.downstream.write().push(target);
    }

    /// Ids of the current downstream targets.
    pub fn target_ids(&self) -> Vec<PartId> {
        self.downstream.read().iter().map(|t| t.id().clone()).collect()
    }

    /// A terminal stage forwards to nobody.
    pub fn is_terminal(&self) -> bool {
        self.downstream.read().is_empty()
    }

    /// Send a processed item to every downstream target.
    ///
    /// Every target is attempted even after a failure; targets that refused
    /// the item are surfaced in one `DownstreamUnavailable` error so the
    /// calling task can decide whether to retry, log, or raise a failure
    /// event. Nothing is dropped silently.
    pub async fn forward(&self, item: T) -> Result<()> {
        let targets = { self.downstream.read().clone() };
        if targets.is_empty() {
            return Ok(());
        }

        let mut failed = Vec::new();
        for target in &targets {
            if let Err(err) = target.receive(item.clone()).await {
                warn!(target_id = %target.id(), error = %err, "Forward to downstream part failed");
                failed.push(target.id().clone());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ActorError::DownstreamUnavailable { targets: failed })
        }
    }
}
