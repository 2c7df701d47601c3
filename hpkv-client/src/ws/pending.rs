//! # Pending Request Table
//!
//! Purpose: Track in-flight WebSocket requests by correlation id and hand
//! each one exactly one result.
//!
//! ## Design Principles
//! 1. **Register Before Send**: Callers insert their slot before the frame
//!    leaves, so a fast response can never miss it.
//! 2. **Remove-Then-Resolve**: A slot is taken out of the map under the lock
//!    and resolved after the lock is released. Whoever removes it owns the
//!    only sender, so double completion is impossible.
//! 3. **Closed Is Terminal**: After `close`, every slot has been rejected
//!    and new registrations fail, so no entry can be orphaned by a dead
//!    connection.
//!
//! ## Lifecycle
//!
//! ```text
//!   register(id) ──► [pending] ──complete(id)──► resolved / rejected
//!                        │
//!                        ├──remove(id)──► cancelled (handle dropped, timeout, send failure)
//!                        └──close()────► rejected with ConnectionClosed
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use hpkv_common::{HpkvError, HpkvResult, RecordValue};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// Result delivered to a pending request.
pub type Completion = HpkvResult<Option<RecordValue>>;

/// Monotonic correlation id source, one per client.
///
/// Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct CorrelationIds {
    next: AtomicU64,
}

impl CorrelationIds {
    pub fn new() -> Self {
        CorrelationIds {
            next: AtomicU64::new(1),
        }
    }

    /// Returns an id strictly greater than every id returned before.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for CorrelationIds {
    fn default() -> Self {
        Self::new()
    }
}

struct TableState {
    slots: HashMap<u64, oneshot::Sender<Completion>>,
    closed: bool,
}

/// Correlation id → single-resolution slot.
pub struct PendingTable {
    state: Mutex<TableState>,
}

impl PendingTable {
    pub fn new() -> Self {
        PendingTable {
            state: Mutex::new(TableState {
                slots: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Inserts a slot for `id` and returns the receiving half.
    ///
    /// Fails with `ConnectionClosed` after [`PendingTable::close`], and with
    /// `DuplicateCorrelationId` if `id` is already pending.
    pub fn register(&self, id: u64) -> HpkvResult<oneshot::Receiver<Completion>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(HpkvError::ConnectionClosed);
        }
        if state.slots.contains_key(&id) {
            return Err(HpkvError::DuplicateCorrelationId(id));
        }
        let (tx, rx) = oneshot::channel();
        state.slots.insert(id, tx);
        Ok(rx)
    }

    /// Removes the slot for `id` and delivers `result` to it.
    ///
    /// Returns false when no slot was pending under `id`.
    pub fn complete(&self, id: u64, result: Completion) -> bool {
        let slot = self.state.lock().slots.remove(&id);
        match slot {
            Some(tx) => {
                // The waiter may have given up already; nothing to do then.
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Drops the slot for `id` without resolving it.
    pub fn remove(&self, id: u64) -> bool {
        self.state.lock().slots.remove(&id).is_some()
    }

    /// Rejects every pending slot and refuses new ones.
    ///
    /// Returns the number of rejected slots.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.slots.drain().collect()
        };
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(HpkvError::ConnectionClosed));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one in-flight request.
///
/// Resolves to the response value (`None` when the response carried none)
/// or to the error the service reported. Dropping the handle before it
/// resolves removes its table entry.
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<Completion>,
    table: Arc<PendingTable>,
    finished: bool,
}

impl PendingResponse {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<Completion>, table: Arc<PendingTable>) -> Self {
        PendingResponse {
            id,
            rx,
            table,
            finished: false,
        }
    }

    /// Correlation id carried by the request.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => {
                this.finished = true;
                Poll::Ready(result)
            }
            Poll::Ready(Err(_)) => {
                // Sender dropped without a result: the table went away.
                this.finished = true;
                Poll::Ready(Err(HpkvError::ConnectionClosed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if !self.finished && self.table.remove(self.id) {
            debug!(message_id = self.id, "abandoned pending request");
        }
    }
}
