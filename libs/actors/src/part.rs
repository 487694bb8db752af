//! Pipeline stage ("part"): identity + runtime + events + routing.
//!
//! A part binds a stable identifier, the actor runtime, the lifecycle event
//! bus, and a connector into the public contract the owning pipeline works
//! with: `start`, `stop`, `receive`, `heartbeat`.

use crate::connector::{Connector, Inbound};
use crate::error::{ActorError, Result};
use crate::events::{EventBus, PartEvent, PartEventKind, PartEventListener};
use crate::monitor::Monitored;
use crate::runtime::{GenServer, LifecycleState, Processor};

use config::{SettingDefinitions, SettingsMap};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Stable part identifier, unique within a pipeline and immutable for the
/// part's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartId(Arc<str>);

impl PartId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One pipeline stage.
pub struct Part<T> {
    id: PartId,
    server: GenServer<T>,
    events: Arc<EventBus<T>>,
    connector: Arc<Connector<T>>,
    definitions: SettingDefinitions,
}

impl<T> Part<T>
where
    T: Clone + Send + 'static,
{
    /// Construct a part around a processing behavior and the settings it
    /// recognizes at start.
    pub fn new(
        id: impl Into<PartId>,
        processor: Arc<dyn Processor<T>>,
        definitions: SettingDefinitions,
    ) -> Arc<Self> {
        let id = id.into();
        let events = Arc::new(EventBus::new());
        let connector = Arc::new(Connector::new());
        let server = GenServer::new(
            id.clone(),
            processor,
            Arc::clone(&events),
            Arc::clone(&connector),
        );
        Arc::new(Self {
            id,
            server,
            events,
            connector,
            definitions,
        })
    }

    pub fn id(&self) -> &PartId {
        &self.id
    }

    /// Routing handle used to wire this part to its downstream stage(s).
    pub fn connector(&self) -> &Arc<Connector<T>> {
        &self.connector
    }

    /// Register a lifecycle-event listener. Intended before `start`.
    pub fn subscribe(&self, kind: PartEventKind, listener: Arc<dyn PartEventListener<T>>) {
        self.events.subscribe(kind, listener);
    }

    pub fn state(&self) -> LifecycleState {
        self.server.state()
    }

    pub fn in_flight(&self) -> usize {
        self.server.in_flight()
    }

    /// Validate the settings against this part's definitions, then start
    /// the runtime. On a validation failure the part remains stopped.
    pub async fn start(&self, settings: &SettingsMap) -> Result<()> {
        self.definitions
            .validate(settings)
            .map_err(|err| ActorError::Configuration {
                id: self.id.clone(),
                source: err,
            })?;
        self.server.start(settings).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.server.stop().await
    }

    /// Hand an item to this part. The `Received` event fires only once the
    /// runtime has accepted the item, never on rejection.
    pub async fn receive(&self, item: T) -> Result<()> {
        self.server.receive(item.clone()).await?;
        self.events
            .raise(&PartEvent::new(PartEventKind::Received, item, self.id.clone()));
        Ok(())
    }

    pub fn heartbeat(&self) -> bool {
        self.server.heartbeat()
    }
}

#[async_trait]
impl<T> Inbound<T> for Part<T>
where
    T: Clone + Send + 'static,
{
    fn id(&self) -> &PartId {
        &self.id
    }

    async fn receive(&self, item: T) -> Result<()> {
        Part::receive(self, item).await
    }
}

impl<T> Monitored for Part<T>
where
    T: Clone + Send + 'static,
{
    fn id(&self) -> &PartId {
        &self.id
    }

    fn heartbeat(&self) -> bool {
        Part::heartbeat(self)
    }
}
