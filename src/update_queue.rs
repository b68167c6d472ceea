//! Update Queue - pending state mutations for one state cell.
//!
//! Each state cell (the root's element slot, every `use_state` hook) owns one
//! queue, shared by `Rc` between the current and work-in-progress
//! generations. Dispatch sites append; the render phase folds.
//!
//! # Consumption
//!
//! Folding does not remove anything. The render pass remembers how many
//! updates it looked at, and [`RetireUpdates::retire`] settles them once that
//! pass commits. A render that is abandoned (preempted by a higher lane)
//! leaves the queue untouched, so no update is lost.
//!
//! # Skipped updates
//!
//! Updates whose lane is not part of the render lane are skipped. The fold
//! records the state reached just before the first skipped update as the
//! new base. On retire, applied updates ahead of that point are dropped;
//! applied updates after it stay queued with no lane, so every later render
//! replays them in dispatch order over the base:
//!
//! ```text
//! queue: [+100 @DEFAULT, =5 @SYNC]   base 0
//! SYNC render:    skip +100, apply =5      -> state 5, base 0
//! retire:         [+100 @DEFAULT, =5 @-]
//! DEFAULT render: apply +100, apply =5     -> state 5, base 5
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::lanes::{is_subset_of_lanes, Lane, NO_LANES};
#[cfg(test)]
use crate::lanes::Lanes;

/// New state, or a pure function from the accumulated state to the new one.
pub enum Action<S> {
    Replace(S),
    Reduce(Rc<dyn Fn(&S) -> S>),
}

impl<S: Clone> Action<S> {
    fn apply(&self, state: S) -> S {
        match self {
            Self::Replace(next) => next.clone(),
            Self::Reduce(reducer) => reducer(&state),
        }
    }
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Replace(next) => Self::Replace(next.clone()),
            Self::Reduce(reducer) => Self::Reduce(Rc::clone(reducer)),
        }
    }
}

/// One queued mutation tagged with its lane.
pub struct Update<S> {
    pub action: Action<S>,
    pub lane: Lane,
}

impl<S> Update<S> {
    pub fn new(action: Action<S>, lane: Lane) -> Self {
        Self { action, lane }
    }
}

/// Result of folding a queue for one render lane.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed<S> {
    /// State after applying every matching update.
    pub state: S,
    /// State before the first skipped update, or `state` if none was
    /// skipped. The next render folds from here.
    pub base: S,
    /// Number of queued updates inspected (applied or skipped).
    pub seen: usize,
    /// Number of updates skipped because their lane was not rendered.
    pub skipped: usize,
}

/// FIFO of pending updates for one state cell.
pub struct UpdateQueue<S> {
    pending: RefCell<VecDeque<Update<S>>>,
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
        }
    }
}

impl<S: Clone> UpdateQueue<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an update. O(1).
    pub fn enqueue(&self, update: Update<S>) {
        self.pending.borrow_mut().push_back(update);
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Union of the lanes of every queued update.
    #[cfg(test)]
    fn pending_lanes(&self) -> Lanes {
        self.pending
            .borrow()
            .iter()
            .fold(NO_LANES, |lanes, update| lanes | update.lane)
    }

    /// Fold the updates included in `render_lane` over `base`, in queue
    /// order. Updates without a lane are always included.
    pub fn process(&self, base: S, render_lane: Lane) -> Processed<S> {
        // Snapshot the actions so reducers run without the queue borrowed.
        let (actions, seen) = {
            let pending = self.pending.borrow();
            let actions: Vec<Option<Action<S>>> = pending
                .iter()
                .map(|update| {
                    is_subset_of_lanes(render_lane, update.lane).then(|| update.action.clone())
                })
                .collect();
            (actions, pending.len())
        };

        let mut skipped = 0;
        let mut new_base = None;
        let mut state = base;
        for action in actions {
            match action {
                Some(action) => state = action.apply(state),
                None => {
                    if new_base.is_none() {
                        new_base = Some(state.clone());
                    }
                    skipped += 1;
                }
            }
        }

        let base = new_base.unwrap_or_else(|| state.clone());
        Processed {
            state,
            base,
            seen,
            skipped,
        }
    }
}

// =============================================================================
// Retirement after commit
// =============================================================================

/// A queue whose processed updates can be settled once their render commits.
pub(crate) trait RetireUpdates {
    /// Settle the first `seen` updates after a pass at `lane` committed.
    ///
    /// Applied updates before the first skipped one are removed. Applied
    /// updates after it lose their lane and stay for replay. Skipped
    /// updates and updates queued after the pass looked are kept as is.
    fn retire(&self, seen: usize, lane: Lane);
}

impl<S> RetireUpdates for UpdateQueue<S> {
    fn retire(&self, seen: usize, lane: Lane) {
        let mut pending = self.pending.borrow_mut();
        let seen = seen.min(pending.len());
        let mut kept = VecDeque::with_capacity(pending.len());
        let mut skipped_any = false;

        for (index, mut update) in pending.drain(..).enumerate() {
            if index < seen {
                if !is_subset_of_lanes(lane, update.lane) {
                    skipped_any = true;
                } else if skipped_any {
                    update.lane = NO_LANES;
                } else {
                    continue;
                }
            }
            kept.push_back(update);
        }

        *pending = kept;
    }
}

/// A queue inspected during a render pass, with how much of it was seen.
#[derive(Clone)]
pub(crate) struct ProcessedQueue {
    pub(crate) queue: Rc<dyn RetireUpdates>,
    pub(crate) seen: usize,
}

impl ProcessedQueue {
    pub(crate) fn retire(&self, lane: Lane) {
        self.queue.retire(self.seen, lane);
    }
}
