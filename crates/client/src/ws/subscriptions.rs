//! Server-side event subscription bookkeeping.
//!
//! The tracker is pure state: every operation returns the control message
//! that should go out (if any) and the connection decides whether it can be
//! sent. A type is never both pending and confirmed.

use std::collections::BTreeSet;

use ambient_shared::{event_types, ClientMessage};

#[derive(Debug, Default, Clone)]
pub struct SubscriptionTracker {
    /// Everything the UI currently wants, confirmed or not.
    requested: BTreeSet<String>,
    /// Sent, awaiting `SubscriptionConfirmed`.
    pending: BTreeSet<String>,
    /// Acknowledged by the server.
    confirmed: BTreeSet<String>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `types`. Returns one batched Subscribe for the types that are
    /// neither pending nor confirmed yet, and marks them pending.
    pub fn subscribe<I, S>(&mut self, types: I) -> Option<ClientMessage>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fresh = BTreeSet::new();
        for ty in types {
            let ty = ty.as_ref();
            if event_types::is_local(ty) {
                continue;
            }
            self.requested.insert(ty.to_string());
            if !self.confirmed.contains(ty) && !self.pending.contains(ty) {
                fresh.insert(ty.to_string());
            }
        }

        if fresh.is_empty() {
            return None;
        }
        self.pending.extend(fresh.iter().cloned());
        Some(ClientMessage::subscribe(fresh))
    }

    /// Drop `types` from every set and return one batched Unsubscribe,
    /// whatever their previous state was.
    pub fn unsubscribe<I, S>(&mut self, types: I) -> Option<ClientMessage>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dropped = BTreeSet::new();
        for ty in types {
            let ty = ty.as_ref();
            if event_types::is_local(ty) {
                continue;
            }
            self.requested.remove(ty);
            self.pending.remove(ty);
            self.confirmed.remove(ty);
            dropped.insert(ty.to_string());
        }

        if dropped.is_empty() {
            None
        } else {
            Some(ClientMessage::unsubscribe(dropped))
        }
    }

    /// Apply a `SubscriptionConfirmed` from the server.
    ///
    /// Confirmations for types that were unsubscribed in the meantime are
    /// ignored so they are not replayed after the next reconnect.
    pub fn confirm<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ty in types {
            let ty = ty.as_ref();
            self.pending.remove(ty);
            if self.requested.contains(ty) {
                self.confirmed.insert(ty.to_string());
            }
        }
    }

    /// Called once a new socket is open. In-flight confirmations are assumed
    /// lost, so `pending` is emptied before building the replay message,
    /// which carries every confirmed type plus anything still requested.
    pub fn resubscribe(&mut self) -> Option<ClientMessage> {
        self.pending.clear();

        let replay: BTreeSet<String> = self.confirmed.union(&self.requested).cloned().collect();
        if replay.is_empty() {
            return None;
        }
        for ty in &replay {
            if !self.confirmed.contains(ty) {
                self.pending.insert(ty.clone());
            }
        }
        Some(ClientMessage::subscribe(replay))
    }

    /// Forget everything (used by `close()`).
    pub fn reset(&mut self) {
        self.requested.clear();
        self.pending.clear();
        self.confirmed.clear();
    }

    pub fn is_pending(&self, ty: &str) -> bool {
        self.pending.contains(ty)
    }

    pub fn is_confirmed(&self, ty: &str) -> bool {
        self.confirmed.contains(ty)
    }

    pub fn pending(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }

    pub fn confirmed(&self) -> Vec<String> {
        self.confirmed.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = event_types::LED_STATUS_CHANGED;
    const COLORS: &str = event_types::LED_SORTED_COLORS_CHANGED;

    #[test]
    fn subscribe_batches_new_types_and_marks_them_pending() {
        let mut tracker = SubscriptionTracker::new();
        let msg = tracker.subscribe([STATUS, COLORS]).unwrap();
        assert_eq!(msg, ClientMessage::subscribe([COLORS, STATUS]));
        assert!(tracker.is_pending(STATUS));
        assert!(tracker.is_pending(COLORS));
    }

    #[test]
    fn pending_types_are_not_requested_twice() {
        let mut tracker = SubscriptionTracker::new();
        tracker.subscribe([STATUS]);
        assert_eq!(tracker.subscribe([STATUS]), None);

        let msg = tracker.subscribe([STATUS, COLORS]).unwrap();
        assert_eq!(msg.event_types(), [COLORS.to_string()]);
    }

    #[test]
    fn confirmation_moves_pending_to_confirmed() {
        let mut tracker = SubscriptionTracker::new();
        tracker.subscribe([STATUS, COLORS]);
        tracker.confirm([STATUS]);

        assert!(tracker.is_confirmed(STATUS));
        assert!(!tracker.is_pending(STATUS));
        assert!(tracker.is_pending(COLORS));
        assert_eq!(tracker.subscribe([STATUS]), None);
    }

    #[test]
    fn unsubscribe_always_sends_and_clears_both_sets() {
        let mut tracker = SubscriptionTracker::new();
        tracker.subscribe([STATUS, COLORS]);
        tracker.confirm([STATUS]);

        let msg = tracker.unsubscribe([STATUS, COLORS]).unwrap();
        assert_eq!(msg, ClientMessage::unsubscribe([COLORS, STATUS]));
        assert!(tracker.confirmed().is_empty());
        assert!(tracker.pending().is_empty());

        // Idempotent: still emitted for unknown types.
        assert!(tracker.unsubscribe([STATUS]).is_some());
    }

    #[test]
    fn late_confirmation_after_unsubscribe_is_ignored() {
        let mut tracker = SubscriptionTracker::new();
        tracker.subscribe([STATUS]);
        tracker.unsubscribe([STATUS]);
        tracker.confirm([STATUS]);
        assert!(!tracker.is_confirmed(STATUS));
        assert_eq!(tracker.resubscribe(), None);
    }

    #[test]
    fn resubscribe_replays_confirmed_set_in_one_message() {
        let mut tracker = SubscriptionTracker::new();
        tracker.subscribe([STATUS, COLORS]);
        tracker.confirm([STATUS, COLORS]);

        let msg = tracker.resubscribe().unwrap();
        assert_eq!(msg, ClientMessage::subscribe([COLORS, STATUS]));
        // Confirmed types stay confirmed and are not double-tracked.
        assert!(tracker.pending().is_empty());
        assert_eq!(tracker.confirmed(), vec![COLORS.to_string(), STATUS.to_string()]);
    }

    #[test]
    fn resubscribe_drops_stale_pending_and_retries_unconfirmed() {
        let mut tracker = SubscriptionTracker::new();
        tracker.subscribe([STATUS]);
        tracker.confirm([STATUS]);
        tracker.subscribe([COLORS]);

        let msg = tracker.resubscribe().unwrap();
        assert_eq!(msg.event_types(), [COLORS.to_string(), STATUS.to_string()]);
        assert_eq!(tracker.pending(), vec![COLORS.to_string()]);
        assert!(tracker.is_confirmed(STATUS));
        assert!(!tracker.is_pending(STATUS));
    }

    #[test]
    fn local_types_never_reach_the_server() {
        let mut tracker = SubscriptionTracker::new();
        assert_eq!(
            tracker.subscribe([event_types::CONNECTION_STATUS_CHANGED, event_types::WILDCARD]),
            None
        );
        assert_eq!(tracker.unsubscribe([event_types::CONNECTION_STATUS_CHANGED]), None);
    }
}
