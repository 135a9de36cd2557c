use std::time::Instant;

use indexmap::IndexMap;

use crate::events::{EventTag, Payload};

/// Debounce windows are tracked per owner instance and tag so two fields
/// sharing a tag never cancel each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebounceKey {
    pub owner: String,
    pub tag: EventTag,
}

impl DebounceKey {
    pub fn new(owner: impl Into<String>, tag: EventTag) -> Self {
        Self {
            owner: owner.into(),
            tag,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCall {
    deadline: Instant,
    payload: Payload,
    seq: u64,
}

/// Last-write-wins pending calls, one per key.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: IndexMap<DebounceKey, PendingCall>,
    seq: u64,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the window for `key`. Returns `true` when an earlier
    /// pending call was superseded.
    pub fn schedule(&mut self, key: DebounceKey, deadline: Instant, payload: Payload) -> bool {
        self.seq += 1;
        let call = PendingCall {
            deadline,
            payload,
            seq: self.seq,
        };
        self.pending.insert(key, call).is_some()
    }

    pub fn cancel(&mut self, key: &DebounceKey) -> Option<Payload> {
        self.pending.shift_remove(key).map(|call| call.payload)
    }

    pub fn is_pending(&self, key: &DebounceKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|call| call.deadline).min()
    }

    /// Removes and returns every call whose window has elapsed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(DebounceKey, Payload)> {
        let mut due = Vec::new();
        self.pending.retain(|key, call| {
            if call.deadline <= now {
                due.push((key.clone(), call.clone()));
                false
            } else {
                true
            }
        });
        Self::ordered(due)
    }

    /// Removes and returns every pending call regardless of its deadline.
    pub fn take_all(&mut self) -> Vec<(DebounceKey, Payload)> {
        let all = self.pending.drain(..).collect();
        Self::ordered(all)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn ordered(mut calls: Vec<(DebounceKey, PendingCall)>) -> Vec<(DebounceKey, Payload)> {
        calls.sort_by_key(|(_, call)| (call.deadline, call.seq));
        calls
            .into_iter()
            .map(|(key, call)| (key, call.payload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::form::FieldValue;

    fn text(value: &str) -> Payload {
        Payload::Value(FieldValue::Text(value.to_string()))
    }

    #[test]
    fn rescheduling_replaces_payload_and_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new();
        let key = DebounceKey::new("email", EventTag::OnValidate);

        assert!(!debouncer.schedule(key.clone(), start + Duration::from_millis(500), text("e1")));
        assert!(debouncer.schedule(key.clone(), start + Duration::from_millis(800), text("e2")));

        assert!(debouncer.take_due(start + Duration::from_millis(500)).is_empty());
        let due = debouncer.take_due(start + Duration::from_millis(800));
        assert_eq!(due, vec![(key, text("e2"))]);
        assert!(debouncer.is_empty());
    }

    #[test]
    fn keys_are_independent_per_owner() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new();
        let a = DebounceKey::new("a", EventTag::OnValidate);
        let b = DebounceKey::new("b", EventTag::OnValidate);
        debouncer.schedule(a.clone(), start + Duration::from_millis(20), text("a"));
        debouncer.schedule(b.clone(), start + Duration::from_millis(10), text("b"));

        let due = debouncer.take_due(start + Duration::from_millis(30));
        assert_eq!(due, vec![(b, text("b")), (a, text("a"))]);
    }

    #[test]
    fn cancel_returns_pending_payload() {
        let mut debouncer = Debouncer::new();
        let key = DebounceKey::new("a", EventTag::OnChange);
        debouncer.schedule(key.clone(), Instant::now(), text("x"));
        assert_eq!(debouncer.cancel(&key), Some(text("x")));
        assert!(!debouncer.is_pending(&key));
    }
}
