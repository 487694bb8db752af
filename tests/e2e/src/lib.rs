//! Shared fixtures for Cascade end-to-end tests.

use cascade_adminport::{AdminPort, DocumentMutation, PeerForwarder, ReplicationManager};
use pipeline_actors::error::Result;
use pipeline_actors::Processor;

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Get-with-metadata extras: deleted, flags, expiry, rev_seqno, big-endian.
pub fn wire_extras(deleted: u32, flags: u32, expiry: u32, rev_seqno: u64) -> Vec<u8> {
    let mut extras = Vec::with_capacity(20);
    extras.extend_from_slice(&deleted.to_be_bytes());
    extras.extend_from_slice(&flags.to_be_bytes());
    extras.extend_from_slice(&expiry.to_be_bytes());
    extras.extend_from_slice(&rev_seqno.to_be_bytes());
    extras
}

/// A live document mutation with well-formed wire metadata.
pub fn sample_mutation(key: &str, body: &[u8]) -> DocumentMutation {
    DocumentMutation::from_wire(key, body.to_vec(), 0xC0FFEE, wire_extras(0, 0, 0, 1))
}

/// Fixed-amount increase stage for integer pipelines.
pub struct Increase {
    amount: i64,
}

impl Increase {
    pub fn new(amount: i64) -> Arc<Self> {
        Arc::new(Self { amount })
    }
}

#[async_trait]
impl Processor<i64> for Increase {
    async fn process(&self, item: i64) -> Result<i64> {
        Ok(item + self.amount)
    }
}

/// A running admin port on an ephemeral port.
pub struct AdminFixture {
    pub manager: Arc<ReplicationManager>,
    pub forwarder: Arc<PeerForwarder>,
    pub addr: SocketAddr,
    pub server: JoinHandle<()>,
}

impl AdminFixture {
    /// Spin up a full admin node: manager, forwarder, HTTP surface.
    pub fn spawn(forward_retry: Duration) -> anyhow::Result<Self> {
        let manager = ReplicationManager::new();
        let forwarder = PeerForwarder::with_retry("unbound", 2, forward_retry);
        let admin = AdminPort::new(Arc::clone(&manager), Arc::clone(&forwarder));
        let (addr, server) = admin.spawn("127.0.0.1:0".parse()?)?;
        Ok(Self {
            manager,
            forwarder,
            addr,
            server,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}
