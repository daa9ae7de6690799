//! Fan-out of decoded server events to registered listeners.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ambient_shared::{event_types, ServerEvent};

/// Callback invoked for every matching event.
pub type Listener = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Keeps a listener registered for as long as it is alive.
///
/// Dropping the handle (or calling [`ListenerHandle::unsubscribe`]) removes
/// the listener; if it was the last one for a server-side event type the
/// server subscription is released as well.
#[must_use = "dropping the handle removes the listener immediately"]
pub struct ListenerHandle {
    event_type: String,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerHandle {
    pub(crate) fn new(event_type: &str, remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            event_type: event_type.to_string(),
            remove: Some(Box::new(remove)),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("event_type", &self.event_type)
            .field("active", &self.remove.is_some())
            .finish()
    }
}

struct Entry {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_type: HashMap<String, Vec<Entry>>,
}

/// Listener registry keyed by event type, plus the `*` wildcard.
#[derive(Default)]
pub struct Dispatcher {
    registry: Mutex<Registry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` under `event_type`.
    ///
    /// Returns the listener id and whether it is the first listener for
    /// that type.
    pub fn add(&self, event_type: &str, listener: Listener) -> (u64, bool) {
        let mut registry = self.registry();
        let id = registry.next_id;
        registry.next_id += 1;

        let entries = registry.by_type.entry(event_type.to_string()).or_default();
        entries.push(Entry { id, listener });
        (id, entries.len() == 1)
    }

    /// Remove listener `id`, handing it back along with whether it was the
    /// last listener registered for `event_type`.
    ///
    /// The listener is returned rather than dropped so callers holding
    /// other locks can release them first.
    pub fn remove(&self, event_type: &str, id: u64) -> Option<(Listener, bool)> {
        let mut registry = self.registry();
        let entries = registry.by_type.get_mut(event_type)?;
        let index = entries.iter().position(|entry| entry.id == id)?;
        let entry = entries.remove(index);
        let last = entries.is_empty();
        if last {
            registry.by_type.remove(event_type);
        }
        Some((entry.listener, last))
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry()
            .by_type
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        // Dropped outside the lock; a listener may own handles of its own.
        let removed = std::mem::take(&mut self.registry().by_type);
        drop(removed);
    }

    /// Deliver `event` to its type-specific listeners, then to wildcard
    /// listeners, each in registration order.
    ///
    /// Listeners run on a snapshot taken before the first call, outside the
    /// registry lock, so they are free to add or remove listeners. A
    /// panicking listener is logged and skipped.
    pub fn dispatch(&self, event: &ServerEvent) {
        let event_type = event.event_type();
        let snapshot: Vec<Listener> = {
            let registry = self.registry();
            let specific = registry.by_type.get(event_type).into_iter().flatten();
            let wildcard = registry
                .by_type
                .get(event_types::WILDCARD)
                .into_iter()
                .flatten();
            let listeners: Vec<Listener> = specific
                .chain(wildcard)
                .map(|entry| entry.listener.clone())
                .collect();
            listeners
        };

        for listener in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                tracing::error!(
                    event_type,
                    panic = panic_message(&*panic),
                    "event listener panicked"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener {
        let log = log.clone();
        Arc::new(move |event: &ServerEvent| {
            log.lock()
                .unwrap()
                .push(format!("{tag}:{}", event.event_type()));
        })
    }

    #[test]
    fn specific_listeners_run_before_wildcard_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.add(event_types::WILDCARD, recorder(&log, "any"));
        dispatcher.add(event_types::PONG, recorder(&log, "first"));
        dispatcher.add(event_types::PONG, recorder(&log, "second"));
        dispatcher.add(event_types::PING, recorder(&log, "ping"));

        dispatcher.dispatch(&ServerEvent::Pong);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:Pong", "second:Pong", "any:Pong"]
        );
    }

    #[test]
    fn add_and_remove_report_first_and_last() {
        let dispatcher = Dispatcher::new();
        let noop: Listener = Arc::new(|_: &ServerEvent| {});
        let (a, first) = dispatcher.add(event_types::PONG, noop.clone());
        assert!(first);
        let (b, first) = dispatcher.add(event_types::PONG, noop);
        assert!(!first);

        assert!(matches!(dispatcher.remove(event_types::PONG, a), Some((_, false))));
        assert!(dispatcher.remove(event_types::PONG, a).is_none());
        assert!(matches!(dispatcher.remove(event_types::PONG, b), Some((_, true))));
        assert_eq!(dispatcher.listener_count(event_types::PONG), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_others() {
        let dispatcher = Dispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        dispatcher.add(event_types::PONG, Arc::new(|_: &ServerEvent| panic!("listener bug")));
        let counter = calls.clone();
        dispatcher.add(
            event_types::PONG,
            Arc::new(move |_: &ServerEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch(&ServerEvent::Pong);
        dispatcher.dispatch(&ServerEvent::Pong);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listeners_may_mutate_the_registry_during_dispatch() {
        let dispatcher = Arc::new(Dispatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = dispatcher.clone();
        let counter = calls.clone();
        dispatcher.add(
            event_types::PONG,
            Arc::new(move |_: &ServerEvent| {
                let counter = counter.clone();
                inner.add(
                    event_types::PONG,
                    Arc::new(move |_: &ServerEvent| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        // The listener added mid-dispatch only sees the next event.
        dispatcher.dispatch(&ServerEvent::Pong);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        dispatcher.dispatch(&ServerEvent::Pong);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_removed_mid_dispatch_still_run_once_for_that_event() {
        let dispatcher = Arc::new(Dispatcher::new());
        let calls: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let ids: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

        let (inner, log, targets) = (dispatcher.clone(), calls.clone(), ids.clone());
        let (first, _) = dispatcher.add(
            event_types::PONG,
            Arc::new(move |_: &ServerEvent| {
                log.lock().unwrap().push("first");
                // Remove itself and the second listener.
                for id in targets.lock().unwrap().drain(..) {
                    inner.remove(event_types::PONG, id);
                }
            }),
        );
        for tag in ["second", "third"] {
            let log = calls.clone();
            let (id, _) = dispatcher.add(
                event_types::PONG,
                Arc::new(move |_: &ServerEvent| log.lock().unwrap().push(tag)),
            );
            if tag == "second" {
                ids.lock().unwrap().extend([first, id]);
            }
        }

        dispatcher.dispatch(&ServerEvent::Pong);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(dispatcher.listener_count(event_types::PONG), 1);

        dispatcher.dispatch(&ServerEvent::Pong);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["first", "second", "third", "third"]
        );
    }

    #[test]
    fn dropping_the_handle_runs_its_removal_once() {
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = removed.clone();
        let handle = ListenerHandle::new(event_types::PONG, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.event_type(), event_types::PONG);
        handle.unsubscribe();
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }
}
