//! Shutdown-aware measurement queue.
//!
//! Unbounded and multi-producer: sensor callbacks push from their own
//! threads without ever blocking. The single fusion worker blocks on
//! [`MeasurementQueue::pop`], which keeps returning queued items after
//! shutdown until the queue is drained and only then reports closure.
//!
//! Built on a crossbeam unbounded channel; shutting down drops the sender
//! half, which is exactly the drain-then-close contract the worker needs.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Mutex;

pub struct MeasurementQueue<T> {
    tx: Mutex<Option<Sender<T>>>,
    rx: Receiver<T>,
}

impl<T> Default for MeasurementQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MeasurementQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Enqueue an item. Never blocks. Returns false when the queue has
    /// been shut down (the item is discarded).
    pub fn push(&self, item: T) -> bool {
        match self.tx.lock().expect("queue sender lock poisoned").as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// Block until an item is available. Returns `None` once the queue is
    /// shut down and drained.
    pub fn pop(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Close the queue and wake the blocked consumer. Idempotent.
    pub fn shutdown(&self) {
        self.tx.lock().expect("queue sender lock poisoned").take();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
