//! Same-tick batching queue for synchronous work.
//!
//! Synchronous renders are not run on the spot. They are pushed here and the
//! queue is drained from a microtask, so several updates dispatched in the
//! same tick share one render.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub(crate) type SyncCallback = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct SyncQueue {
    callbacks: RefCell<VecDeque<SyncCallback>>,
    is_flushing: Cell<bool>,
}

impl SyncQueue {
    pub(crate) fn schedule(&self, callback: SyncCallback) {
        self.callbacks.borrow_mut().push_back(callback);
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Run queued callbacks, including ones queued while draining.
    /// Re-entrant calls return immediately.
    pub(crate) fn flush(&self) {
        if self.is_flushing.replace(true) {
            return;
        }
        loop {
            let next = self.callbacks.borrow_mut().pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.is_flushing.set(false);
    }
}
