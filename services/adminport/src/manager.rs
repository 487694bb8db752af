//! Replication manager: one part pipeline per replication.
//!
//! A replication moves document mutations from a source bucket to a bucket
//! on a peer cluster. The manager assembles each replication as a two-stage
//! pipeline — a source nozzle that decodes wire metadata feeding a target
//! nozzle through a connector — and drives it exclusively through the part
//! contract: start, stop, receive, heartbeat.
//!
//! Pause and resume map to part stop/start; the runtime supports repeated
//! Stopped↔Started cycles, and a pause of an already paused replication
//! fails cleanly with the runtime's lifecycle error.

use crate::error::{AdminError, AdminResult};

use codec::DocMetadata;
use config::replication::{self, keys};
use config::SettingsMap;
use pipeline_actors::{
    ActorError, HeartbeatMonitor, LifecycleState, Part, PartEvent, PartEventKind, PartId,
    Processor,
};

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// How often replication parts are probed for liveness.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

// Statistics names on the admin surface
pub const DOCS_RECEIVED: &str = "docs_received";
pub const DOCS_WRITTEN: &str = "docs_written";
pub const DOCS_FAILED: &str = "docs_failed";
pub const DATA_REPLICATED: &str = "data_replicated";
pub const CHANGES_LEFT: &str = "changes_left";

/// One document mutation moving through a replication pipeline.
#[derive(Debug, Clone)]
pub struct DocumentMutation {
    pub key: String,
    pub body: Vec<u8>,
    pub opcode: u8,
    pub cas: u64,
    pub extras: Vec<u8>,
    /// Decoded by the source nozzle; `None` until then.
    pub metadata: Option<DocMetadata>,
}

impl DocumentMutation {
    /// A mutation as it arrives off the data-store wire, metadata still
    /// encoded in the extras section.
    pub fn from_wire(key: impl Into<String>, body: Vec<u8>, cas: u64, extras: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            body,
            opcode: codec::GET_WITH_META,
            cas,
            extras,
            metadata: None,
        }
    }
}

/// First pipeline stage: decodes the wire metadata every downstream
/// decision (revision comparison, expiry handling) depends on.
struct SourceNozzle {
    id: PartId,
}

#[async_trait]
impl Processor<DocumentMutation> for SourceNozzle {
    async fn process(
        &self,
        mut mutation: DocumentMutation,
    ) -> pipeline_actors::Result<DocumentMutation> {
        let metadata = DocMetadata::from_response(mutation.opcode, &mutation.extras, mutation.cas)
            .map_err(|err| ActorError::processing_failed(&self.id, err.to_string()))?;
        mutation.metadata = Some(metadata);
        Ok(mutation)
    }
}

/// Terminal pipeline stage: hands mutations to the peer cluster.
///
/// The actual remote write protocol lives behind this seam; the nozzle
/// accounts for what it ships.
struct TargetNozzle {
    bytes_shipped: AtomicU64,
}

#[async_trait]
impl Processor<DocumentMutation> for TargetNozzle {
    async fn process(
        &self,
        mutation: DocumentMutation,
    ) -> pipeline_actors::Result<DocumentMutation> {
        self.bytes_shipped
            .fetch_add(mutation.body.len() as u64, Ordering::Relaxed);
        Ok(mutation)
    }
}

/// Counters kept per replication, fed by part lifecycle events.
#[derive(Debug, Default)]
struct ReplicationStats {
    docs_received: AtomicU64,
    docs_written: AtomicU64,
    docs_failed: AtomicU64,
    data_replicated: AtomicU64,
}

/// Everything the manager knows about one replication.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationSpecification {
    pub id: String,
    pub from_bucket: String,
    pub to_cluster_uuid: String,
    pub to_bucket: String,
    pub filter_name: Option<String>,
    pub settings: SettingsMap,
}

struct Replication {
    spec: ReplicationSpecification,
    source: Arc<Part<DocumentMutation>>,
    target: Arc<Part<DocumentMutation>>,
    stats: Arc<ReplicationStats>,
}

impl Replication {
    fn is_running(&self) -> bool {
        self.source.state() == LifecycleState::Started
    }
}

/// The cluster-wide admin layer over replication pipelines.
pub struct ReplicationManager {
    cluster_uuid: String,
    replications: RwLock<HashMap<String, Replication>>,
    monitor: Arc<HeartbeatMonitor>,
}

impl ReplicationManager {
    pub fn new() -> Arc<Self> {
        let cluster_uuid = format!("cluster-{}", Uuid::new_v4().simple());
        info!(cluster_uuid = %cluster_uuid, "Creating replication manager");

        let (monitor, mut reports) = HeartbeatMonitor::new(HEARTBEAT_INTERVAL);
        monitor.start();
        // The monitor observes; reacting is this layer's job. For now the
        // reaction is an operator-visible alert.
        tokio::spawn(async move {
            while let Some(miss) = reports.recv().await {
                warn!(part_id = %miss.part, "Replication part is unresponsive");
            }
        });

        Arc::new(Self {
            cluster_uuid,
            replications: RwLock::new(HashMap::new()),
            monitor,
        })
    }

    pub fn cluster_uuid(&self) -> &str {
        &self.cluster_uuid
    }

    /// Create a replication and, unless created inactive, start its
    /// pipeline. Returns the replication id.
    pub async fn create_replication(
        &self,
        from_bucket: &str,
        to_cluster_uuid: &str,
        to_bucket: &str,
        filter_name: Option<String>,
        mut settings: SettingsMap,
    ) -> AdminResult<String> {
        replication::apply_default_settings(&mut settings);
        replication::definitions().validate(&settings)?;

        let id = format!(
            "{}_{}_{}_{}",
            self.cluster_uuid, from_bucket, to_cluster_uuid, to_bucket
        );

        let mut replications = self.replications.write().await;
        if replications.contains_key(&id) {
            return Err(AdminError::DuplicateReplication { id });
        }

        let stats = Arc::new(ReplicationStats::default());
        let source = Part::new(
            format!("{id}:source").as_str(),
            Arc::new(SourceNozzle {
                id: PartId::new(format!("{id}:source")),
            }),
            replication::definitions(),
        );
        let target = Part::new(
            format!("{id}:target").as_str(),
            Arc::new(TargetNozzle {
                bytes_shipped: AtomicU64::new(0),
            }),
            replication::definitions(),
        );
        source.connector().add_target(target.clone());
        subscribe_stats(&source, &target, &stats);

        self.monitor.watch(source.clone());
        self.monitor.watch(target.clone());

        let active = settings
            .get(keys::ACTIVE)
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if active {
            // Downstream first, so the source never forwards into a part
            // that is not yet accepting.
            target.start(&settings).await?;
            source.start(&settings).await?;
        }

        let spec = ReplicationSpecification {
            id: id.clone(),
            from_bucket: from_bucket.to_string(),
            to_cluster_uuid: to_cluster_uuid.to_string(),
            to_bucket: to_bucket.to_string(),
            filter_name,
            settings,
        };
        info!(replication_id = %id, active, "Replication created");
        replications.insert(
            id.clone(),
            Replication {
                spec,
                source,
                target,
                stats,
            },
        );
        Ok(id)
    }

    /// Tear a replication down, draining any in-flight mutations.
    pub async fn delete_replication(&self, id: &str) -> AdminResult<()> {
        let removed = self
            .replications
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AdminError::UnknownReplication { id: id.to_string() })?;

        stop_pipeline(&removed).await?;
        info!(replication_id = %id, "Replication deleted");
        Ok(())
    }

    /// Stop the pipeline but keep the specification. Source first, so
    /// everything it already accepted drains into the target before the
    /// target goes down.
    pub async fn pause_replication(&self, id: &str) -> AdminResult<()> {
        let mut replications = self.replications.write().await;
        let replication = replications
            .get_mut(id)
            .ok_or_else(|| AdminError::UnknownReplication { id: id.to_string() })?;

        replication.source.stop().await?;
        replication.target.stop().await?;
        replication
            .spec
            .settings
            .insert(keys::ACTIVE.to_string(), false.into());
        info!(replication_id = %id, "Replication paused");
        Ok(())
    }

    /// Restart a paused pipeline with its stored settings.
    pub async fn resume_replication(&self, id: &str) -> AdminResult<()> {
        let mut replications = self.replications.write().await;
        let replication = replications
            .get_mut(id)
            .ok_or_else(|| AdminError::UnknownReplication { id: id.to_string() })?;

        replication
            .spec
            .settings
            .insert(keys::ACTIVE.to_string(), true.into());
        replication.target.start(&replication.spec.settings).await?;
        replication.source.start(&replication.spec.settings).await?;
        info!(replication_id = %id, "Replication resumed");
        Ok(())
    }

    pub async fn replication_settings(&self, id: &str) -> AdminResult<SettingsMap> {
        let replications = self.replications.read().await;
        let replication = replications
            .get(id)
            .ok_or_else(|| AdminError::UnknownReplication { id: id.to_string() })?;
        Ok(replication.spec.settings.clone())
    }

    /// Merge settings changes into a replication; an `active` flip pauses
    /// or resumes the pipeline.
    pub async fn change_replication_settings(
        &self,
        id: &str,
        updates: SettingsMap,
    ) -> AdminResult<()> {
        replication::definitions().validate(&updates)?;

        let requested_active = updates.get(keys::ACTIVE).and_then(|v| v.as_bool());
        let was_running = {
            let mut replications = self.replications.write().await;
            let replication = replications
                .get_mut(id)
                .ok_or_else(|| AdminError::UnknownReplication { id: id.to_string() })?;
            replication.spec.settings.extend(updates);
            replication.is_running()
        };

        match requested_active {
            Some(false) if was_running => self.pause_replication(id).await?,
            Some(true) if !was_running => self.resume_replication(id).await?,
            _ => {}
        }
        info!(replication_id = %id, "Replication settings changed");
        Ok(())
    }

    /// Statistics for all replications, keyed by replication id.
    pub async fn statistics(&self) -> serde_json::Value {
        let replications = self.replications.read().await;
        let mut all = serde_json::Map::new();
        for (id, replication) in replications.iter() {
            let stats = &replication.stats;
            let changes_left =
                (replication.source.in_flight() + replication.target.in_flight()) as u64;
            let mut entry = serde_json::Map::new();
            entry.insert(
                DOCS_RECEIVED.to_string(),
                json!(stats.docs_received.load(Ordering::Relaxed)),
            );
            entry.insert(
                DOCS_WRITTEN.to_string(),
                json!(stats.docs_written.load(Ordering::Relaxed)),
            );
            entry.insert(
                DOCS_FAILED.to_string(),
                json!(stats.docs_failed.load(Ordering::Relaxed)),
            );
            entry.insert(
                DATA_REPLICATED.to_string(),
                json!(stats.data_replicated.load(Ordering::Relaxed)),
            );
            entry.insert(CHANGES_LEFT.to_string(), json!(changes_left));
            entry.insert(keys::ACTIVE.to_string(), json!(replication.is_running()));
            all.insert(id.clone(), serde_json::Value::Object(entry));
        }
        serde_json::Value::Object(all)
    }

    /// Data-plane entry point: hand a mutation to a replication's source
    /// stage. The upstream change-stream layer hooks in here.
    pub async fn feed(&self, id: &str, mutation: DocumentMutation) -> AdminResult<()> {
        let source = {
            let replications = self.replications.read().await;
            let replication = replications
                .get(id)
                .ok_or_else(|| AdminError::UnknownReplication { id: id.to_string() })?;
            Arc::clone(&replication.source)
        };
        source.receive(mutation).await?;
        Ok(())
    }

    pub async fn replication_ids(&self) -> Vec<String> {
        self.replications.read().await.keys().cloned().collect()
    }

    /// Stop every pipeline and the heartbeat monitor.
    pub async fn shutdown(&self) -> AdminResult<()> {
        let replications: Vec<String> = self.replication_ids().await;
        for id in replications {
            if let Err(err) = self.delete_replication(&id).await {
                warn!(replication_id = %id, error = %err, "Error tearing down replication");
            }
        }
        self.monitor.stop().await;
        info!("Replication manager shut down");
        Ok(())
    }
}

/// Stop both parts, tolerating a pipeline that was already paused.
async fn stop_pipeline(replication: &Replication) -> AdminResult<()> {
    for part in [&replication.source, &replication.target] {
        match part.stop().await {
            Ok(()) | Err(ActorError::NotStarted { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Wire the statistics counters to part lifecycle events.
fn subscribe_stats(
    source: &Arc<Part<DocumentMutation>>,
    target: &Arc<Part<DocumentMutation>>,
    stats: &Arc<ReplicationStats>,
) {
    {
        let stats = Arc::clone(stats);
        source.subscribe(
            PartEventKind::Received,
            Arc::new(move |_: &PartEvent<DocumentMutation>| {
                stats.docs_received.fetch_add(1, Ordering::Relaxed);
            }),
        );
    }
    {
        let stats = Arc::clone(stats);
        target.subscribe(
            PartEventKind::Processed,
            Arc::new(move |event: &PartEvent<DocumentMutation>| {
                stats.docs_written.fetch_add(1, Ordering::Relaxed);
                stats
                    .data_replicated
                    .fetch_add(event.payload.body.len() as u64, Ordering::Relaxed);
            }),
        );
    }
    for part in [source, target] {
        let stats = Arc::clone(stats);
        part.subscribe(
            PartEventKind::ProcessingFailed,
            Arc::new(move |_: &PartEvent<DocumentMutation>| {
                stats.docs_failed.fetch_add(1, Ordering::Relaxed);
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_extras(deleted: u32, flags: u32, expiry: u32, rev_seqno: u64) -> Vec<u8> {
        let mut extras = Vec::with_capacity(20);
        extras.extend_from_slice(&deleted.to_be_bytes());
        extras.extend_from_slice(&flags.to_be_bytes());
        extras.extend_from_slice(&expiry.to_be_bytes());
        extras.extend_from_slice(&rev_seqno.to_be_bytes());
        extras
    }

    fn mutation(key: &str, body: &[u8]) -> DocumentMutation {
        DocumentMutation::from_wire(key, body.to_vec(), 77, wire_extras(0, 0, 0, 1))
    }

    async fn create(manager: &ReplicationManager) -> String {
        manager
            .create_replication("beer-sample", "cluster-b", "beer-backup", None, SettingsMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_starts_an_active_pipeline_and_counts_stats() {
        let manager = ReplicationManager::new();
        let id = create(&manager).await;
        assert!(id.contains("beer-sample"));

        manager.feed(&id, mutation("doc-1", b"abc")).await.unwrap();
        manager.feed(&id, mutation("doc-2", b"defgh")).await.unwrap();
        // Draining via pause makes the counters deterministic.
        manager.pause_replication(&id).await.unwrap();

        let stats = manager.statistics().await;
        let entry = &stats[&id];
        assert_eq!(entry[DOCS_RECEIVED], 2);
        assert_eq!(entry[DOCS_WRITTEN], 2);
        assert_eq!(entry[DOCS_FAILED], 0);
        assert_eq!(entry[DATA_REPLICATED], 8);
        assert_eq!(entry[CHANGES_LEFT], 0);
        assert_eq!(entry[keys::ACTIVE], false);
    }

    #[tokio::test]
    async fn duplicate_replications_are_rejected() {
        let manager = ReplicationManager::new();
        create(&manager).await;
        let err = manager
            .create_replication("beer-sample", "cluster-b", "beer-backup", None, SettingsMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::DuplicateReplication { .. }));
    }

    #[tokio::test]
    async fn truncated_wire_metadata_counts_as_a_failure() {
        let manager = ReplicationManager::new();
        let id = create(&manager).await;

        let bad = DocumentMutation::from_wire("doc-bad", b"x".to_vec(), 1, vec![0u8; 4]);
        manager.feed(&id, bad).await.unwrap();
        manager.pause_replication(&id).await.unwrap();

        let stats = manager.statistics().await;
        assert_eq!(stats[&id][DOCS_FAILED], 1);
        assert_eq!(stats[&id][DOCS_WRITTEN], 0);
    }

    #[tokio::test]
    async fn pause_resume_cycle() {
        let manager = ReplicationManager::new();
        let id = create(&manager).await;

        manager.pause_replication(&id).await.unwrap();
        // Paused replication refuses data.
        assert!(matches!(
            manager.feed(&id, mutation("d", b"x")).await,
            Err(AdminError::Pipeline(ActorError::NotRunning { .. }))
        ));
        // Pausing again fails cleanly.
        assert!(matches!(
            manager.pause_replication(&id).await,
            Err(AdminError::Pipeline(ActorError::NotStarted { .. }))
        ));

        manager.resume_replication(&id).await.unwrap();
        manager.feed(&id, mutation("d", b"x")).await.unwrap();
        manager.pause_replication(&id).await.unwrap();
        assert_eq!(manager.statistics().await[&id][DOCS_WRITTEN], 1);
    }

    #[tokio::test]
    async fn inactive_create_leaves_the_pipeline_stopped() {
        let manager = ReplicationManager::new();
        let mut settings = SettingsMap::new();
        settings.insert(keys::ACTIVE.to_string(), false.into());
        let id = manager
            .create_replication("b1", "c2", "b2", None, settings)
            .await
            .unwrap();

        assert!(matches!(
            manager.feed(&id, mutation("d", b"x")).await,
            Err(AdminError::Pipeline(ActorError::NotRunning { .. }))
        ));
    }

    #[tokio::test]
    async fn settings_changes_merge_and_toggle_activity() {
        let manager = ReplicationManager::new();
        let id = create(&manager).await;

        let mut updates = SettingsMap::new();
        updates.insert(keys::CHECKPOINT_INTERVAL.to_string(), 60.into());
        updates.insert(keys::ACTIVE.to_string(), false.into());
        manager.change_replication_settings(&id, updates).await.unwrap();

        let settings = manager.replication_settings(&id).await.unwrap();
        assert_eq!(
            settings.get(keys::CHECKPOINT_INTERVAL).and_then(|v| v.as_int()),
            Some(60)
        );
        assert!(matches!(
            manager.feed(&id, mutation("d", b"x")).await,
            Err(AdminError::Pipeline(ActorError::NotRunning { .. }))
        ));

        let mut reactivate = SettingsMap::new();
        reactivate.insert(keys::ACTIVE.to_string(), true.into());
        manager.change_replication_settings(&id, reactivate).await.unwrap();
        manager.feed(&id, mutation("d", b"x")).await.unwrap();
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_the_replication() {
        let manager = ReplicationManager::new();
        let id = create(&manager).await;
        manager.delete_replication(&id).await.unwrap();

        assert!(matches!(
            manager.delete_replication(&id).await,
            Err(AdminError::UnknownReplication { .. })
        ));
        assert!(manager.replication_ids().await.is_empty());
    }
}
