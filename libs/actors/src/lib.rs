//! Actor-Based Pipeline Stage Infrastructure
//!
//! Concurrent actor runtime for Cascade replication pipelines. Every
//! pipeline stage ("part") is an independently scheduled actor with a
//! single-slot mailbox, a pluggable processing behavior, lifecycle-event
//! notification, liveness probing, and a drain-safe shutdown protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐     ┌──────────────────────────────┐
//! │  Part "source"               │     │  Part "target"               │
//! │                              │     │                              │
//! │  receive ─▶ mailbox ─▶ loop ─┼──┐  │  receive ─▶ mailbox ─▶ loop  │
//! │               │              │  │  │                              │
//! │        per-item task         │  │  └──────────────────────────────┘
//! │   process → event → forward ─┼──┘ Connector.forward
//! └──────────────────────────────┘
//! ```
//!
//! The scheduling loop dequeues items in FIFO arrival order and dispatches
//! each to its own task, so completion order across items is deliberately
//! unordered: throughput is bought at the price of ordering, and any
//! sequencing guarantee belongs in a layer above this runtime.
//!
//! # Shutdown contract
//!
//! `stop` refuses new intake, drains every item already accepted, waits for
//! all dispatched processing tasks to finish, runs the owner's exit
//! behavior, and only then returns. There is no drain timeout: a hung
//! processing task blocks shutdown until its owner intervenes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pipeline_actors::{Part, Processor};
//! use pipeline_actors::error::Result;
//! use config::{SettingDefinitions, SettingsMap};
//! use async_trait::async_trait;
//!
//! struct Uppercase;
//!
//! #[async_trait]
//! impl Processor<String> for Uppercase {
//!     async fn process(&self, item: String) -> Result<String> {
//!         Ok(item.to_uppercase())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let part = Part::new("shouter", std::sync::Arc::new(Uppercase), SettingDefinitions::new());
//! part.start(&SettingsMap::new()).await?;
//! part.receive("hello".to_string()).await?;
//! part.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod error;
pub mod events;
pub mod mailbox;
pub mod monitor;
pub mod part;
pub mod runtime;

pub use connector::{Connector, Inbound};
pub use error::{ActorError, Result};
pub use events::{EventBus, PartEvent, PartEventKind, PartEventListener};
pub use monitor::{HeartbeatMiss, HeartbeatMonitor, Monitored};
pub use part::{Part, PartId};
pub use runtime::{GenServer, LifecycleState, Processor};
