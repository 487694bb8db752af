//! Single-slot handoff channel between producers and one actor.
//!
//! The mailbox buffers at most one outstanding item: a producer's `send`
//! suspends until the actor's scheduling loop is ready to take the handoff.
//! This is the system's backpressure mechanism — a slow actor naturally
//! throttles its upstream producers instead of accumulating an unbounded
//! queue.

use thiserror::Error;
use tokio::sync::mpsc;

/// One item may be in the slot at a time.
const HANDOFF_CAPACITY: usize = 1;

/// The actor refused the handoff because its intake is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mailbox closed")]
pub struct MailboxClosed;

/// Producer half. Cheap to clone; all clones feed the same actor.
#[derive(Debug)]
pub struct MailboxSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

/// Consumer half, owned exclusively by the actor's scheduling loop.
#[derive(Debug)]
pub struct MailboxReceiver<T> {
    rx: mpsc::Receiver<T>,
}

/// Create a connected mailbox pair.
pub fn channel<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    (MailboxSender { tx }, MailboxReceiver { rx })
}

impl<T> MailboxSender<T> {
    /// Hand an item to the actor, suspending until the slot is free.
    pub async fn send(&self, item: T) -> Result<(), MailboxClosed> {
        self.tx.send(item).await.map_err(|_| MailboxClosed)
    }
}

impl<T> MailboxReceiver<T> {
    /// Take the next item, suspending until one arrives. Returns `None`
    /// once the mailbox is closed and fully drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Refuse further sends. Items already handed off (including sends that
    /// were mid-flight when intake closed) remain receivable until `recv`
    /// returns `None`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
