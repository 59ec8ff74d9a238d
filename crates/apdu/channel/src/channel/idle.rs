//! Debounced idle notification
//!
//! A single-slot delayed task. Scheduling replaces any pending notification;
//! cancelling reports whether one was still pending. Each scheduled task gets
//! a generation number and only fires if it can still claim the slot for its
//! generation, so a notification is either cancelled or delivered, never
//! both. Listeners run after the slot is released and never block `cancel`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, after, bounded, select};
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::event::ChannelEvent;
use super::listener::ListenerRegistry;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    cancel: Option<Sender<()>>,
}

/// Cancellable delayed `Idle` notification
#[derive(Debug, Default)]
pub struct IdleScheduler {
    slot: Arc<Mutex<Slot>>,
}

impl IdleScheduler {
    /// Create a scheduler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `Idle` to `listeners` after `delay` unless cancelled first
    pub fn schedule(&self, delay: Duration, listeners: Arc<ListenerRegistry>) {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);

        let generation = {
            let mut slot = self.slot.lock();
            slot.generation = slot.generation.wrapping_add(1);
            // Dropping the previous sender wakes and retires its task
            slot.cancel = Some(cancel_tx);
            slot.generation
        };

        let slot = Arc::clone(&self.slot);
        let spawned = thread::Builder::new()
            .name("apdu-idle".into())
            .spawn(move || {
                select! {
                    recv(cancel_rx) -> _ => {
                        trace!(generation, "Idle notification cancelled");
                    }
                    recv(after(delay)) -> _ => {
                        let fire = {
                            let mut slot = slot.lock();
                            slot.generation == generation && slot.cancel.take().is_some()
                        };
                        if fire {
                            trace!(generation, "Channel idle");
                            listeners.notify(&ChannelEvent::Idle);
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn idle timer, idle notification dropped");
            let mut slot = self.slot.lock();
            if slot.generation == generation {
                slot.cancel = None;
            }
        }
    }

    /// Cancel the pending notification
    ///
    /// Returns `true` if a notification was pending and has been suppressed.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.generation = slot.generation.wrapping_add(1);
        slot.cancel.take().is_some()
    }

    /// Whether a notification is waiting to fire
    pub fn is_pending(&self) -> bool {
        self.slot.lock().cancel.is_some()
    }
}

impl Drop for IdleScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
