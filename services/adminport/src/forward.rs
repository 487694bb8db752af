//! Peer-node command forwarding.
//!
//! Replication commands accepted on one node are propagated to every other
//! node of the cluster, with the forward flag rewritten to false so peers do
//! not re-forward. Delivery to each peer is retried with exponential backoff
//! up to a bounded number of attempts; a peer that stays unreachable is
//! assumed dead and will pick the command up through its own recovery.

use crate::error::{AdminError, AdminResult};
use crate::requests::{self, FORWARD};

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const MAX_FORWARDING_RETRY: u32 = 5;
pub const FORWARDING_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Fans admin commands out to peer nodes.
pub struct PeerForwarder {
    client: reqwest::Client,
    my_addr: String,
    peers: RwLock<Vec<String>>,
    max_retries: u32,
    retry_interval: Duration,
}

impl PeerForwarder {
    pub fn new(my_addr: &str) -> Arc<Self> {
        Self::with_retry(my_addr, MAX_FORWARDING_RETRY, FORWARDING_RETRY_INTERVAL)
    }

    pub fn with_retry(my_addr: &str, max_retries: u32, retry_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            client: reqwest::Client::new(),
            my_addr: my_addr.to_string(),
            peers: RwLock::new(Vec::new()),
            max_retries,
            retry_interval,
        })
    }

    /// Replace the peer list (`host:port` entries).
    pub fn set_peers(&self, peers: Vec<String>) {
        *self.peers.write() = peers;
    }

    /// Peers the next forward would reach (everyone but this node).
    pub fn forward_targets(&self) -> Vec<String> {
        self.peers
            .read()
            .iter()
            .filter(|peer| **peer != self.my_addr)
            .cloned()
            .collect()
    }

    /// Forward an accepted command to every peer. Fire-and-forget per peer:
    /// the local operation already succeeded, and each peer retries
    /// independently.
    pub fn forward_request(self: &Arc<Self>, path: &str, form: Vec<(String, String)>) {
        let targets = self.forward_targets();
        if targets.is_empty() {
            return;
        }

        let body = requests::encode_form(&rewrite_forward_flag(form));
        for peer in targets {
            let url = format!("http://{}{}", peer, path);
            let forwarder = Arc::clone(self);
            let body = body.clone();
            tokio::spawn(async move {
                if let Err(err) = forwarder.forward_to_node(&url, body).await {
                    error!(url = %url, error = %err, "Giving up forwarding admin request");
                }
            });
        }
    }

    async fn forward_to_node(&self, url: &str, body: Vec<u8>) -> AdminResult<()> {
        let mut interval = self.retry_interval;
        for attempt in 0..=self.max_retries {
            debug!(url = %url, attempt = attempt + 1, "Forwarding admin request to peer");
            let result = self
                .client
                .post(url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone())
                .send()
                .await;
            if matches!(&result, Ok(response) if response.status().is_success()) {
                info!(url = %url, "Forwarded admin request to peer");
                return Ok(());
            }
            // if it did not succeed, wait and try again
            if attempt < self.max_retries {
                tokio::time::sleep(interval).await;
                interval *= 2;
            }
        }
        Err(AdminError::ForwardingFailed)
    }
}

/// Peers must not re-forward: pin the forward flag to false.
fn rewrite_forward_flag(mut form: Vec<(String, String)>) -> Vec<(String, String)> {
    form.retain(|(key, _)| key != FORWARD);
    form.push((FORWARD.to_string(), "false".to_string()));
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_flag_is_pinned_false() {
        let form = vec![
            ("fromBucket".to_string(), "a".to_string()),
            (FORWARD.to_string(), "true".to_string()),
        ];
        let rewritten = rewrite_forward_flag(form);
        assert_eq!(
            rewritten,
            vec![
                ("fromBucket".to_string(), "a".to_string()),
                (FORWARD.to_string(), "false".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn forwarding_skips_this_node() {
        let forwarder = PeerForwarder::new("node-a:9998");
        forwarder.set_peers(vec![
            "node-a:9998".to_string(),
            "node-b:9998".to_string(),
            "node-c:9998".to_string(),
        ]);
        assert_eq!(
            forwarder.forward_targets(),
            vec!["node-b:9998".to_string(), "node-c:9998".to_string()]
        );
    }

    #[tokio::test]
    async fn unreachable_peer_exhausts_retries() {
        // Port 9 is discard; nothing listens there in test environments.
        let forwarder =
            PeerForwarder::with_retry("node-a:9998", 1, Duration::from_millis(10));
        let err = forwarder
            .forward_to_node("http://127.0.0.1:9/controller/pauseReplication/r1", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::ForwardingFailed));
    }
}
