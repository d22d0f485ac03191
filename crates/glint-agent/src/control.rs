//! Busy tracking and cancellation
//!
//! One [`RequestControl`] lives for the life of a coordinator. Each accepted
//! submission takes a [`WorkerTicket`] carrying a generation number and its
//! own cancel flag. A ticket only touches shared state while its generation
//! is current, so a worker that outlives `interrupt` cannot clear the busy
//! flag of the request that replaced it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Where the current request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Dispatched,
    AwaitingTool,
    Retrying,
    Interrupted,
}

impl CoordinatorState {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

struct Slot {
    generation: u64,
    busy: bool,
    cancel: Arc<AtomicBool>,
}

pub(crate) struct RequestControl {
    slot: Mutex<Slot>,
    state: watch::Sender<CoordinatorState>,
}

impl RequestControl {
    pub fn new() -> Arc<Self> {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        Arc::new(Self {
            slot: Mutex::new(Slot {
                generation: 0,
                busy: false,
                cancel: Arc::new(AtomicBool::new(false)),
            }),
            state,
        })
    }

    /// Claim the slot for a new request, or `None` while another is in flight
    pub fn begin(self: &Arc<Self>) -> Option<WorkerTicket> {
        let mut slot = self.slot.lock();
        if slot.busy {
            return None;
        }
        slot.generation += 1;
        slot.busy = true;
        slot.cancel = Arc::new(AtomicBool::new(false));
        self.state.send_replace(CoordinatorState::Dispatched);

        Some(WorkerTicket {
            generation: slot.generation,
            cancel: Arc::clone(&slot.cancel),
            control: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.slot.lock().busy
    }

    /// Flag the in-flight request. Returns false when nothing is running.
    ///
    /// `on_cancel` runs under the slot lock, so nothing a worker publishes
    /// through [`WorkerTicket::publish`] can be ordered after it.
    pub fn cancel_current(&self, on_cancel: impl FnOnce()) -> bool {
        let slot = self.slot.lock();
        if !slot.busy {
            return false;
        }
        slot.cancel.store(true, Ordering::SeqCst);
        self.state.send_replace(CoordinatorState::Interrupted);
        on_cancel();
        true
    }

    /// Return to Idle regardless of what the worker is doing
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.busy = false;
        self.state.send_replace(CoordinatorState::Idle);
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }
}

/// A worker's claim on the request slot
pub(crate) struct WorkerTicket {
    generation: u64,
    cancel: Arc<AtomicBool>,
    control: Arc<RequestControl>,
}

impl WorkerTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn is_current(&self) -> bool {
        self.control.slot.lock().generation == self.generation
    }

    /// Whether this worker may still publish anything
    pub fn is_live(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    /// Run `publish` only while this worker is live, holding the slot lock
    pub fn publish(&self, publish: impl FnOnce()) {
        let slot = self.control.slot.lock();
        if slot.generation == self.generation && !self.is_cancelled() {
            publish();
        }
    }

    pub fn set_state(&self, state: CoordinatorState) {
        let slot = self.control.slot.lock();
        if slot.generation == self.generation && !self.is_cancelled() {
            self.control.state.send_replace(state);
        }
    }

    /// Release the slot if it still belongs to this worker
    pub fn finish(self) {
        let mut slot = self.control.slot.lock();
        if slot.generation == self.generation {
            slot.busy = false;
            self.control.state.send_replace(CoordinatorState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slot() {
        let control = RequestControl::new();
        let ticket = control.begin().unwrap();
        assert!(control.is_busy());
        assert_eq!(control.state(), CoordinatorState::Dispatched);
        assert!(control.begin().is_none());

        ticket.finish();
        assert!(!control.is_busy());
        assert_eq!(control.state(), CoordinatorState::Idle);
        assert!(control.begin().is_some());
    }

    #[test]
    fn test_cancel_without_request_is_noop() {
        let control = RequestControl::new();
        assert!(!control.cancel_current(|| panic!("nothing to cancel")));
        assert_eq!(control.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_stale_worker_cannot_release_newer_request() {
        let control = RequestControl::new();
        let stale = control.begin().unwrap();

        let mut notified = false;
        assert!(control.cancel_current(|| notified = true));
        assert!(notified);
        assert!(stale.is_cancelled());

        let mut published = false;
        stale.publish(|| published = true);
        assert!(!published);
        control.reset();

        let fresh = control.begin().unwrap();
        assert!(!fresh.is_cancelled());
        assert!(!stale.is_current());

        stale.set_state(CoordinatorState::AwaitingTool);
        stale.finish();
        assert!(control.is_busy());
        assert_eq!(control.state(), CoordinatorState::Dispatched);

        fresh.set_state(CoordinatorState::AwaitingTool);
        assert_eq!(control.state(), CoordinatorState::AwaitingTool);
        fresh.finish();
        assert!(!control.is_busy());
    }
}
