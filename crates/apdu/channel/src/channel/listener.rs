//! Weakly held state listeners
//!
//! The registry never keeps a listener alive. Owners hold the [`Arc`] and a
//! dropped listener is pruned the next time an event is delivered.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::event::ChannelEvent;

/// Trait for observers of channel state changes
///
/// Notification is synchronous on the thread that caused the event. `Idle`
/// is delivered from the timer thread, concurrently with any send that
/// starts after the notification fired.
pub trait StateListener: Send + Sync {
    /// Handle a channel event
    fn notify(&self, event: &ChannelEvent);
}

impl<F> StateListener for F
where
    F: Fn(&ChannelEvent) + Send + Sync,
{
    fn notify(&self, event: &ChannelEvent) {
        self(event)
    }
}

/// Ordered set of weak listener handles
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Weak<dyn StateListener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, replacing an identical registration
    pub fn add(&self, listener: Weak<dyn StateListener>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|existing| !Weak::ptr_eq(existing, &listener));
        listeners.push(listener);
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove(&self, listener: &Weak<dyn StateListener>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|existing| !Weak::ptr_eq(existing, listener));
        listeners.len() != before
    }

    /// Number of registrations, dead ones included
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Deliver an event to every live listener in registration order
    pub fn notify(&self, event: &ChannelEvent) {
        let snapshot: Vec<_> = self.listeners.lock().clone();

        let mut dead = 0;
        for listener in &snapshot {
            match listener.upgrade() {
                Some(listener) => listener.notify(event),
                None => dead += 1,
            }
        }

        if dead > 0 {
            trace!(dead, "Pruning dropped state listeners");
            self.listeners
                .lock()
                .retain(|listener| listener.strong_count() > 0);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Downgrade a concrete listener into a registry handle
pub fn downgrade<L: StateListener + 'static>(listener: &Arc<L>) -> Weak<dyn StateListener> {
    let listener: Arc<dyn StateListener> = listener.clone();
    Arc::downgrade(&listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl StateListener for Counter {
        fn notify(&self, _event: &ChannelEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_identical_registration_is_replaced() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Counter::default());

        registry.add(downgrade(&counter));
        registry.add(downgrade(&counter));
        assert_eq!(registry.len(), 1);

        registry.notify(&ChannelEvent::Busy);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dead_listeners_are_pruned() {
        let registry = ListenerRegistry::new();
        let kept = Arc::new(Counter::default());
        let dropped = Arc::new(Counter::default());

        registry.add(downgrade(&dropped));
        registry.add(downgrade(&kept));
        drop(dropped);
        assert_eq!(registry.len(), 2);

        registry.notify(&ChannelEvent::Idle);
        assert_eq!(registry.len(), 1);
        assert_eq!(kept.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_and_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let order = order.clone();
            Arc::new(move |_: &ChannelEvent| order.lock().push(1))
        };
        let second = {
            let order = order.clone();
            Arc::new(move |_: &ChannelEvent| order.lock().push(2))
        };

        registry.add(downgrade(&first));
        registry.add(downgrade(&second));
        registry.notify(&ChannelEvent::Disconnected);
        assert_eq!(*order.lock(), vec![1, 2]);

        assert!(registry.remove(&downgrade(&first)));
        assert!(!registry.remove(&downgrade(&first)));
        registry.notify(&ChannelEvent::Disconnected);
        assert_eq!(*order.lock(), vec![1, 2, 2]);
    }
}
