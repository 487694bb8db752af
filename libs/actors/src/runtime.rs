//! Actor runtime core ("GenServer").
//!
//! Owns one actor's lifecycle state, its scheduling loop, the drain-on-stop
//! protocol, and heartbeat responsiveness. The runtime is behavior-agnostic:
//! the owner supplies a [`Processor`] at construction and the runtime drives
//! it.
//!
//! # Lock discipline (CRITICAL for probe latency)
//!
//! The lifecycle mutex serializes state transitions only and is never held
//! across an await. `heartbeat` reads nothing but atomics — it must stay off
//! the transition mutex, or a start/stop in progress could make the probe
//! itself report false death under load.

use crate::connector::Connector;
use crate::error::{ActorError, Result};
use crate::events::{EventBus, PartEvent, PartEventKind};
use crate::mailbox::{self, MailboxReceiver, MailboxSender};
use crate::part::PartId;

use config::{SettingsError, SettingsMap};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often the scheduling loop wakes to report liveness when idle.
const IDLE_TICK: Duration = Duration::from_millis(100);

/// A loop that has not ticked within this window is considered stalled.
const LIVENESS_WINDOW: Duration = Duration::from_millis(500);

/// Actor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Stopped = 0,
    Starting = 1,
    Started = 2,
    Stopping = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Started,
            3 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Started => write!(f, "started"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Processing behavior supplied by the owner of a part.
///
/// `process` is invoked from concurrently dispatched tasks, so implementors
/// hold their mutable state behind interior mutability.
#[async_trait]
pub trait Processor<T>: Send + Sync + 'static {
    /// Consume validated start settings. Runs while the part is `Starting`,
    /// before the scheduling loop launches; an error leaves the part
    /// stopped.
    async fn configure(&self, _settings: &SettingsMap) -> std::result::Result<(), SettingsError> {
        Ok(())
    }

    /// Transform one item.
    async fn process(&self, item: T) -> Result<T>;

    /// Exit behavior: runs once per stop, after every dispatched task has
    /// completed.
    async fn on_exit(&self) {}
}

/// Count of dispatched-but-not-completed processing tasks.
///
/// The decrement lives in a drop guard so that no exit path of a dispatched
/// task — success, error, or panic — can orphan the counter.
#[derive(Clone)]
struct InFlight {
    shared: Arc<InFlightShared>,
}

struct InFlightShared {
    count: AtomicUsize,
    drained: Notify,
}

struct InFlightGuard {
    shared: Arc<InFlightShared>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            shared: Arc::new(InFlightShared {
                count: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    fn begin(&self) -> InFlightGuard {
        self.shared.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    fn count(&self) -> usize {
        self.shared.count.load(Ordering::SeqCst)
    }

    async fn wait_drained(&self) {
        loop {
            let notified = self.shared.drained.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.shared.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.drained.notify_waiters();
        }
    }
}

/// Loop progress record, read lock-free by `heartbeat`.
struct Pulse {
    base: Instant,
    last_beat_ns: AtomicU64,
}

impl Pulse {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            last_beat_ns: AtomicU64::new(0),
        }
    }

    fn beat(&self) {
        let now_ns = self.base.elapsed().as_nanos() as u64;
        self.last_beat_ns.store(now_ns, Ordering::Relaxed);
    }

    fn since_last_beat(&self) -> Duration {
        let last = self.last_beat_ns.load(Ordering::Relaxed);
        self.base.elapsed().saturating_sub(Duration::from_nanos(last))
    }
}

/// Context shared by the runtime surface, the scheduling loop, and every
/// dispatched processing task.
struct Inner<T> {
    id: PartId,
    processor: Arc<dyn Processor<T>>,
    events: Arc<EventBus<T>>,
    connector: Arc<Connector<T>>,
    in_flight: InFlight,
    pulse: Pulse,
}

/// The actor runtime: lifecycle enforcement, scheduling loop, drain
/// contract.
pub struct GenServer<T> {
    inner: Arc<Inner<T>>,
    /// Serializes state transitions. Never held across an await.
    lifecycle: Mutex<LifecycleState>,
    /// Lock-free mirror of the lifecycle state for probes and intake checks.
    state_cell: AtomicU8,
    sender: Mutex<Option<MailboxSender<T>>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T> GenServer<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(
        id: PartId,
        processor: Arc<dyn Processor<T>>,
        events: Arc<EventBus<T>>,
        connector: Arc<Connector<T>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                processor,
                events,
                connector,
                in_flight: InFlight::new(),
                pulse: Pulse::new(),
            }),
            lifecycle: Mutex::new(LifecycleState::Stopped),
            state_cell: AtomicU8::new(LifecycleState::Stopped as u8),
            sender: Mutex::new(None),
            stop_tx: Mutex::new(None),
            loop_handle: Mutex::new(None),
        }
    }

    /// Current lifecycle state (lock-free read).
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state_cell.load(Ordering::SeqCst))
    }

    /// Count of dispatched-but-not-completed processing tasks.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.count()
    }

    /// Launch the scheduling loop.
    ///
    /// Returns once the loop is confirmed running, so the caller may
    /// `receive` immediately. Fails with `AlreadyStarted` unless the actor
    /// is `Stopped`; fails with `Configuration` (actor stays stopped) if the
    /// processor rejects the settings.
    pub async fn start(&self, settings: &SettingsMap) -> Result<()> {
        {
            let mut state = self.lifecycle.lock();
            if *state != LifecycleState::Stopped {
                return Err(ActorError::AlreadyStarted {
                    id: self.inner.id.clone(),
                    state: *state,
                });
            }
            self.transition(&mut state, LifecycleState::Starting);
        }

        if let Err(err) = self.inner.processor.configure(settings).await {
            warn!(part_id = %self.inner.id, error = %err, "Part configuration rejected");
            let mut state = self.lifecycle.lock();
            self.transition(&mut state, LifecycleState::Stopped);
            return Err(ActorError::Configuration {
                id: self.inner.id.clone(),
                source: err,
            });
        }

        let (tx, rx) = mailbox::channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel();

        *self.sender.lock() = Some(tx);
        *self.stop_tx.lock() = Some(stop_tx);

        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), rx, stop_rx, ready_tx));
        *self.loop_handle.lock() = Some(handle);

        if ready_rx.await.is_err() {
            error!(part_id = %self.inner.id, "Scheduling loop died before confirming startup");
            self.sender.lock().take();
            self.stop_tx.lock().take();
            self.loop_handle.lock().take();
            let mut state = self.lifecycle.lock();
            self.transition(&mut state, LifecycleState::Stopped);
            return Err(ActorError::not_running(&self.inner.id));
        }

        {
            let mut state = self.lifecycle.lock();
            self.transition(&mut state, LifecycleState::Started);
        }
        info!(part_id = %self.inner.id, "Part started");
        Ok(())
    }

    /// Stop the actor: refuse new intake, drain accepted items, wait for
    /// every dispatched task, run the exit behavior, return.
    ///
    /// There is no drain timeout — a hung processing task blocks this call
    /// indefinitely; timeout policy belongs to the caller.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.lifecycle.lock();
            if *state != LifecycleState::Started {
                return Err(ActorError::NotStarted {
                    id: self.inner.id.clone(),
                    state: *state,
                });
            }
            self.transition(&mut state, LifecycleState::Stopping);
        }

        // Drop the intake handle and tell the loop to wind down.
        self.sender.lock().take();
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(true);
        }

        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!(part_id = %self.inner.id, error = %err, "Scheduling loop task failed");
                }
            }
        }

        self.inner.in_flight.wait_drained().await;
        self.inner.processor.on_exit().await;

        {
            let mut state = self.lifecycle.lock();
            self.transition(&mut state, LifecycleState::Stopped);
        }
        info!(part_id = %self.inner.id, "Part stopped, all in-flight work drained");
        Ok(())
    }

    /// Hand an item to the actor. Suspends the caller while the mailbox
    /// slot is occupied — this is the backpressure point.
    pub async fn receive(&self, item: T) -> Result<()> {
        if self.state() != LifecycleState::Started {
            return Err(ActorError::not_running(&self.inner.id));
        }
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => sender
                .send(item)
                .await
                .map_err(|_| ActorError::not_running(&self.inner.id)),
            None => Err(ActorError::not_running(&self.inner.id)),
        }
    }

    /// Non-blocking liveness probe: is the scheduling loop making progress?
    ///
    /// Reads only atomics; bounded latency regardless of load or a pending
    /// stop drain.
    pub fn heartbeat(&self) -> bool {
        self.state() == LifecycleState::Started
            && self.inner.pulse.since_last_beat() <= LIVENESS_WINDOW
    }

    fn transition(&self, state: &mut LifecycleState, next: LifecycleState) {
        debug!(part_id = %self.inner.id, from = %*state, to = %next, "Lifecycle transition");
        *state = next;
        self.state_cell.store(next as u8, Ordering::SeqCst);
    }
}

/// The scheduling loop: blocking intake with a separate stop signal, FIFO
/// dequeue, one concurrently dispatched task per item.
async fn run_loop<T>(
    inner: Arc<Inner<T>>,
    mut receiver: MailboxReceiver<T>,
    mut stop_rx: watch::Receiver<bool>,
    ready_tx: oneshot::Sender<()>,
) where
    T: Clone + Send + 'static,
{
    inner.pulse.beat();
    let _ = ready_tx.send(());
    debug!(part_id = %inner.id, "Scheduling loop running");

    let mut idle = tokio::time::interval(IDLE_TICK);
    idle.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => break,

            maybe_item = receiver.recv() => match maybe_item {
                Some(item) => {
                    inner.pulse.beat();
                    dispatch(&inner, item);
                }
                None => break,
            },

            _ = idle.tick() => inner.pulse.beat(),
        }
    }

    // Stop requested: refuse new handoffs, then drain what was already
    // accepted so no in-flight data is dropped.
    receiver.close();
    let mut drained = 0usize;
    while let Some(item) = receiver.recv().await {
        inner.pulse.beat();
        dispatch(&inner, item);
        drained += 1;
    }
    debug!(part_id = %inner.id, drained, "Scheduling loop exited");
}

/// Dispatch one item to its own task: transform, raise the lifecycle event,
/// forward downstream, release the in-flight slot.
fn dispatch<T>(inner: &Arc<Inner<T>>, item: T)
where
    T: Clone + Send + 'static,
{
    let guard = inner.in_flight.begin();
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        // Held for the whole task: the decrement must happen on every exit
        // path, or stop() would wait forever.
        let _guard = guard;
        let input = item.clone();

        match std::panic::AssertUnwindSafe(inner.processor.process(item))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => {
                inner.events.raise(&PartEvent::new(
                    PartEventKind::Processed,
                    result.clone(),
                    inner.id.clone(),
                ));
                if let Err(err) = inner.connector.forward(result).await {
                    warn!(part_id = %inner.id, error = %err, "Downstream rejected processed item");
                    inner
                        .events
                        .raise(&PartEvent::failed(input, inner.id.clone(), err.to_string()));
                }
            }
            Ok(Err(err)) => {
                warn!(part_id = %inner.id, error = %err, "Item processing failed");
                inner
                    .events
                    .raise(&PartEvent::failed(input, inner.id.clone(), err.to_string()));
            }
            Err(_) => {
                error!(part_id = %inner.id, "Item processing panicked");
                inner.events.raise(&PartEvent::failed(
                    input,
                    inner.id.clone(),
                    "processing panicked",
                ));
            }
        }
    });
}
