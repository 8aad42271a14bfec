//! Bulkhead: per-dependency concurrency limiting with a bounded FIFO queue.
//!
//! # Admission
//! ```text
//! running < max_concurrent        → take slot, run now
//! queue.len() < max_queue_size    → enqueue, run when a slot is handed over
//! otherwise                       → reject (operation never invoked)
//! ```
//!
//! # Design Decisions
//! - Admission is decided synchronously inside `execute`/`admit`, under the
//!   instance mutex, so two callers can never both take the last slot
//! - A finishing call hands its slot directly to the head of the queue, so
//!   dequeue order is strict FIFO (completion order is not)
//! - Slots are RAII permits; dropping a caller's future never leaks capacity
//! - Tier is a label for metrics and capacity presets, never enforced here

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};

use crate::config::schema::BulkheadConfig;
use crate::observability::metrics;
use crate::resilience::error::{BulkheadRejectedError, RejectReason, ResilienceError};

/// Priority class of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Critical,
    #[default]
    Standard,
    Optional,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Standard => "standard",
            Tier::Optional => "optional",
        }
    }

    /// Capacity preset (max_concurrent, max_queue_size) used when the
    /// configuration leaves limits unset.
    pub fn default_limits(&self) -> (usize, usize) {
        match self {
            Tier::Critical => (20, 50),
            Tier::Standard => (10, 20),
            Tier::Optional => (3, 5),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time bulkhead occupancy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkheadStats {
    pub tier: Tier,
    pub current_concurrent: usize,
    pub max_concurrent: usize,
    pub queue_size: usize,
    pub max_queue_size: usize,
    pub total_executed: u64,
    pub total_rejected: u64,
}

type Grant = Result<(), BulkheadRejectedError>;

#[derive(Debug)]
struct Waiter {
    id: u64,
    tx: oneshot::Sender<Grant>,
}

#[derive(Debug, Default)]
struct Occupancy {
    running: usize,
    queue: VecDeque<Waiter>,
    next_id: u64,
    total_executed: u64,
    total_rejected: u64,
}

impl Occupancy {
    fn is_idle(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }
}

#[derive(Debug)]
struct Shared {
    service: String,
    tier: Tier,
    max_concurrent: usize,
    max_queue_size: usize,
    occupancy: Mutex<Occupancy>,
    idle: Notify,
}

impl Shared {
    fn rejection(&self, occ: &Occupancy, reason: RejectReason) -> BulkheadRejectedError {
        BulkheadRejectedError {
            service: self.service.clone(),
            tier: self.tier,
            reason,
            running: occ.running,
            max_concurrent: self.max_concurrent,
            queued: occ.queue.len(),
            max_queue_size: self.max_queue_size,
        }
    }

    fn publish(&self, running: usize, queued: usize) {
        metrics::record_bulkhead_occupancy(&self.service, self.tier, running, queued);
    }

    /// Return a slot: hand it to the oldest live waiter or free it.
    fn release(&self) {
        let mut occ = self.occupancy.lock();

        let mut handed_over = false;
        while let Some(waiter) = occ.queue.pop_front() {
            if waiter.tx.send(Ok(())).is_ok() {
                occ.total_executed += 1;
                handed_over = true;
                break;
            }
        }
        if !handed_over {
            occ.running = occ.running.saturating_sub(1);
        }

        let (running, queued, idle) = (occ.running, occ.queue.len(), occ.is_idle());
        drop(occ);

        self.publish(running, queued);
        if idle {
            self.idle.notify_waiters();
        }
    }

    /// Return a slot that was handed to a caller who left before using it.
    fn return_unused(&self) {
        {
            let mut occ = self.occupancy.lock();
            occ.total_executed = occ.total_executed.saturating_sub(1);
        }
        self.release();
    }

    /// Remove a queued entry whose caller went away.
    fn cancel(&self, id: u64) {
        let mut occ = self.occupancy.lock();
        occ.queue.retain(|w| w.id != id);
        let (running, queued, idle) = (occ.running, occ.queue.len(), occ.is_idle());
        drop(occ);

        self.publish(running, queued);
        if idle {
            self.idle.notify_waiters();
        }
    }
}

/// Concurrency limiter with a bounded wait queue.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    shared: Arc<Shared>,
}

impl Bulkhead {
    /// A `max_concurrent` of zero is raised to one.
    pub fn new(service: impl Into<String>, config: &BulkheadConfig) -> Self {
        let service = service.into();
        if config.max_concurrent == Some(0) {
            tracing::warn!(service = %service, "Bulkhead max_concurrent is 0, using 1");
        }
        Self {
            shared: Arc::new(Shared {
                service,
                tier: config.tier,
                max_concurrent: config.max_concurrent(),
                max_queue_size: config.max_queue_size(),
                occupancy: Mutex::new(Occupancy::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.shared.service
    }

    pub fn tier(&self) -> Tier {
        self.shared.tier
    }

    pub fn stats(&self) -> BulkheadStats {
        let occ = self.shared.occupancy.lock();
        BulkheadStats {
            tier: self.shared.tier,
            current_concurrent: occ.running,
            max_concurrent: self.shared.max_concurrent,
            queue_size: occ.queue.len(),
            max_queue_size: self.shared.max_queue_size,
            total_executed: occ.total_executed,
            total_rejected: occ.total_rejected,
        }
    }

    /// Decide admission for one call, synchronously.
    pub fn admit(&self) -> Result<Admission, BulkheadRejectedError> {
        let shared = &self.shared;
        let mut occ = shared.occupancy.lock();

        if occ.running < shared.max_concurrent {
            occ.running += 1;
            occ.total_executed += 1;
            let (running, queued) = (occ.running, occ.queue.len());
            drop(occ);

            shared.publish(running, queued);
            return Ok(Admission::Ready(BulkheadPermit {
                shared: Arc::clone(shared),
            }));
        }

        if occ.queue.len() < shared.max_queue_size {
            let id = occ.next_id;
            occ.next_id += 1;
            let (tx, rx) = oneshot::channel();
            occ.queue.push_back(Waiter { id, tx });
            let (running, queued) = (occ.running, occ.queue.len());
            drop(occ);

            tracing::debug!(service = %shared.service, tier = %shared.tier, running, queued, "Call queued by bulkhead");
            shared.publish(running, queued);
            return Ok(Admission::Queued(QueuedTicket {
                shared: Arc::clone(shared),
                id,
                rx,
                done: false,
            }));
        }

        occ.total_rejected += 1;
        let err = shared.rejection(&occ, RejectReason::CapacityExhausted);
        drop(occ);

        tracing::debug!(
            service = %shared.service,
            tier = %shared.tier,
            running = err.running,
            queued = err.queued,
            "Bulkhead full, rejecting call"
        );
        Err(err)
    }

    /// Run `operation` once a slot is available.
    ///
    /// Admission happens before this returns; a rejected call never invokes
    /// `operation`.
    pub fn execute<F, Fut, T, E>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<T, ResilienceError<E>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.admit();

        async move {
            let permit = admission?.wait().await?;
            let result = operation().await;
            drop(permit);
            result.map_err(ResilienceError::Operation)
        }
    }

    /// Reject every queued (not yet started) call. Running calls continue.
    pub fn clear(&self) {
        let shared = &self.shared;
        let mut occ = shared.occupancy.lock();
        let waiters: Vec<Waiter> = occ.queue.drain(..).collect();
        if waiters.is_empty() {
            return;
        }
        occ.total_rejected += waiters.len() as u64;
        let err = shared.rejection(&occ, RejectReason::Shutdown);
        let (running, idle) = (occ.running, occ.is_idle());
        drop(occ);

        tracing::info!(
            service = %shared.service,
            tier = %shared.tier,
            dropped = waiters.len(),
            "Bulkhead queue cleared"
        );
        for waiter in waiters {
            let _ = waiter.tx.send(Err(err.clone()));
        }

        shared.publish(running, 0);
        if idle {
            shared.idle.notify_waiters();
        }
    }

    /// Wait until nothing is running and nothing is queued.
    pub async fn drain(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.occupancy.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of a successful admission decision.
#[derive(Debug)]
pub enum Admission {
    /// A slot was free; the call may start now.
    Ready(BulkheadPermit),
    /// The call is queued behind earlier arrivals.
    Queued(QueuedTicket),
}

impl Admission {
    /// Wait for the slot (immediate for `Ready`).
    pub async fn wait(self) -> Result<BulkheadPermit, BulkheadRejectedError> {
        match self {
            Admission::Ready(permit) => Ok(permit),
            Admission::Queued(ticket) => ticket.wait().await,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Admission::Queued(_))
    }
}

/// A held concurrency slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct BulkheadPermit {
    shared: Arc<Shared>,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.shared.release();
    }
}

/// A place in the bulkhead queue.
#[derive(Debug)]
pub struct QueuedTicket {
    shared: Arc<Shared>,
    id: u64,
    rx: oneshot::Receiver<Grant>,
    done: bool,
}

impl QueuedTicket {
    async fn wait(mut self) -> Result<BulkheadPermit, BulkheadRejectedError> {
        let outcome = (&mut self.rx).await;
        self.done = true;

        match outcome {
            Ok(Ok(())) => Ok(BulkheadPermit {
                shared: Arc::clone(&self.shared),
            }),
            Ok(Err(rejected)) => Err(rejected),
            Err(_) => {
                let occ = self.shared.occupancy.lock();
                Err(self.shared.rejection(&occ, RejectReason::Shutdown))
            }
        }
    }
}

impl Drop for QueuedTicket {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.rx.close();
        match self.rx.try_recv() {
            // Slot was handed over after the caller gave up: pass it on.
            Ok(Ok(())) => self.shared.return_unused(),
            Ok(Err(_)) => {}
            Err(_) => self.shared.cancel(self.id),
        }
    }
}
