use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crate::time::SharedClock;
use crate::tracking::Tracker;

pub type Subscriber = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberList {
    Strong,
    Weak,
    All,
}

/// One-to-many change signal.
///
/// Strong subscribers live until removed. Weak subscribers are held through
/// [`Weak`] and disappear once the caller drops its last `Rc`; dead entries
/// are pruned on every trigger.
pub struct ObservableSubject {
    strong: Vec<Subscriber>,
    weak: Vec<Weak<dyn Fn()>>,
    pending: Option<Instant>,
    clock: SharedClock,
    tracker: Tracker,
    source: String,
}

impl std::fmt::Debug for ObservableSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableSubject")
            .field("source", &self.source)
            .field("strong", &self.strong.len())
            .field("weak", &self.weak.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl ObservableSubject {
    pub fn new(source: impl Into<String>, clock: SharedClock, tracker: Tracker) -> Self {
        Self {
            strong: Vec::new(),
            weak: Vec::new(),
            pending: None,
            clock,
            tracker,
            source: source.into(),
        }
    }

    pub fn subscribe(&mut self, subscriber: &Subscriber, use_weak: bool) {
        if use_weak {
            self.weak.push(Rc::downgrade(subscriber));
        } else {
            self.strong.push(Rc::clone(subscriber));
        }
    }

    /// Removes `subscriber` by identity from the strong or the weak list.
    pub fn un_subscribe(&mut self, subscriber: &Subscriber, for_weak: bool) -> bool {
        if for_weak {
            let before = self.weak.len();
            let target = Rc::downgrade(subscriber);
            self.weak.retain(|entry| !Weak::ptr_eq(entry, &target));
            before != self.weak.len()
        } else {
            let before = self.strong.len();
            self.strong.retain(|entry| !Rc::ptr_eq(entry, subscriber));
            before != self.strong.len()
        }
    }

    pub fn un_subscribe_all(&mut self, list: SubscriberList) {
        match list {
            SubscriberList::Strong => self.strong.clear(),
            SubscriberList::Weak => self.weak.clear(),
            SubscriberList::All => {
                self.strong.clear();
                self.weak.clear();
            }
        }
    }

    /// Live subscribers, after pruning collected weak entries.
    pub fn subscriber_count(&mut self) -> usize {
        self.prune();
        self.strong.len() + self.weak.len()
    }

    /// Invokes every live subscriber, strong ones first, each in registration
    /// order. A panicking subscriber is logged and skipped.
    pub fn trigger(&mut self) -> usize {
        self.pending = None;
        self.prune();
        let mut targets: Vec<Subscriber> = self.strong.clone();
        targets.extend(self.weak.iter().filter_map(Weak::upgrade));

        let mut delivered = 0;
        for subscriber in targets {
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber())) {
                Ok(()) => delivered += 1,
                Err(_) => self
                    .tracker
                    .internal_error(&self.source, "observable subscriber panicked"),
            }
        }
        delivered
    }

    /// Coalesces trigger requests: the subscribers run once, `delay` after the
    /// latest request.
    pub fn debounce_trigger(&mut self, delay: Duration) {
        self.pending = Some(self.clock.now() + delay);
    }

    pub fn is_trigger_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Runs a pending debounced trigger if its window has elapsed.
    pub fn poll(&mut self) -> bool {
        match self.pending {
            Some(deadline) if deadline <= self.clock.now() => {
                self.trigger();
                true
            }
            _ => false,
        }
    }

    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    fn prune(&mut self) {
        self.weak.retain(|entry| entry.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::time::ManualClock;
    use crate::tracking::{MemoryProvider, Severity};

    fn counter() -> (Rc<Cell<usize>>, Subscriber) {
        let count = Rc::new(Cell::new(0));
        let handle = Rc::clone(&count);
        let subscriber: Subscriber = Rc::new(move || handle.set(handle.get() + 1));
        (count, subscriber)
    }

    fn subject(clock: &ManualClock) -> ObservableSubject {
        ObservableSubject::new("test", clock.shared(), Tracker::new())
    }

    #[test]
    fn strong_subscribers_run_before_weak_ones() {
        let clock = ManualClock::new();
        let mut subject = subject(&clock);
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let weak_log = Rc::clone(&order);
        let strong_log = Rc::clone(&order);
        let weak: Subscriber = Rc::new(move || weak_log.borrow_mut().push("weak"));
        let strong: Subscriber = Rc::new(move || strong_log.borrow_mut().push("strong"));
        subject.subscribe(&weak, true);
        subject.subscribe(&strong, false);

        assert_eq!(subject.trigger(), 2);
        assert_eq!(*order.borrow(), vec!["strong", "weak"]);
    }

    #[test]
    fn dropped_weak_subscribers_are_pruned() {
        let clock = ManualClock::new();
        let mut subject = subject(&clock);
        let (count, subscriber) = counter();
        subject.subscribe(&subscriber, true);
        assert_eq!(subject.subscriber_count(), 1);

        drop(subscriber);
        assert_eq!(subject.trigger(), 0);
        assert_eq!(subject.subscriber_count(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn un_subscribe_matches_by_identity() {
        let clock = ManualClock::new();
        let mut subject = subject(&clock);
        let (count_a, a) = counter();
        let (count_b, b) = counter();
        subject.subscribe(&a, false);
        subject.subscribe(&b, false);

        assert!(subject.un_subscribe(&a, false));
        assert!(!subject.un_subscribe(&a, false));
        subject.trigger();
        assert_eq!(count_a.get(), 0);
        assert_eq!(count_b.get(), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_block_the_rest() {
        let clock = ManualClock::new();
        let memory = Rc::new(MemoryProvider::default());
        let mut subject =
            ObservableSubject::new("test", clock.shared(), Tracker::new().with_provider(memory.clone()));
        let broken: Subscriber = Rc::new(|| panic!("subscriber failure"));
        let (count, ok) = counter();
        subject.subscribe(&broken, false);
        subject.subscribe(&ok, false);

        assert_eq!(subject.trigger(), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(memory.count(Severity::Error), 1);
    }

    #[test]
    fn debounce_trigger_coalesces_requests() {
        let clock = ManualClock::new();
        let mut subject = subject(&clock);
        let (count, subscriber) = counter();
        subject.subscribe(&subscriber, false);

        subject.debounce_trigger(Duration::from_millis(100));
        clock.advance_ms(60);
        subject.debounce_trigger(Duration::from_millis(100));
        clock.advance_ms(60);
        assert!(!subject.poll());
        clock.advance_ms(40);
        assert!(subject.poll());
        assert!(!subject.poll());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn un_subscribe_all_clears_selected_list() {
        let clock = ManualClock::new();
        let mut subject = subject(&clock);
        let (_, strong) = counter();
        let (_, weak) = counter();
        subject.subscribe(&strong, false);
        subject.subscribe(&weak, true);

        subject.un_subscribe_all(SubscriberList::Weak);
        assert_eq!(subject.subscriber_count(), 1);
        subject.un_subscribe_all(SubscriberList::All);
        assert_eq!(subject.subscriber_count(), 0);
    }
}
