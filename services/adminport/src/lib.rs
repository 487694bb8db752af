//! # Cascade Replication Manager Admin Port
//!
//! HTTP control plane of the replication manager. Decodes replication
//! commands (create/delete/pause/resume, settings, statistics), drives the
//! [`ReplicationManager`] that assembles part pipelines over the actor
//! substrate, and propagates commands to peer cluster nodes with bounded
//! retry.
//!
//! Commands arrive form-encoded, mirroring the data store's admin
//! conventions; statistics leave as JSON.

pub mod error;
pub mod forward;
pub mod keys;
pub mod manager;
pub mod requests;
pub mod server;

pub use error::{AdminError, AdminResult};
pub use forward::PeerForwarder;
pub use keys::RequestKey;
pub use manager::{DocumentMutation, ReplicationManager, ReplicationSpecification};
pub use server::AdminPort;
