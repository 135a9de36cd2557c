use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use super::batch::{
    Armed, BatchConfig, BatchQueue, EventGroup, QueuedNotification, group_events_by_type,
};
use super::debounce::{DebounceKey, Debouncer};
use super::subject::{ObservableSubject, Subscriber, SubscriberList};
use crate::events::{Event, EventTag, Payload};
use crate::time::SharedClock;
use crate::tracking::Tracker;

pub type NotifyMethod<C> = Rc<dyn Fn(&mut C, &Payload) -> anyhow::Result<()>>;

/// A diagnostics-only manager that receives an `onRegister` notification for
/// every registration accepted by the managers it is attached to.
pub type AutoTracker = Rc<RefCell<NotificationManager<()>>>;

/// One registration: a unique id, the event it reacts to and the method run
/// against the manager's context.
pub struct Notifier<C> {
    id: String,
    event: Event,
    method: NotifyMethod<C>,
}

impl<C> Clone for Notifier<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            event: self.event.clone(),
            method: Rc::clone(&self.method),
        }
    }
}

impl<C> fmt::Debug for Notifier<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

impl<C> Notifier<C> {
    pub fn new<F>(id: impl Into<String>, event: Event, method: F) -> Self
    where
        F: Fn(&mut C, &Payload) -> anyhow::Result<()> + 'static,
    {
        Self {
            id: id.into(),
            event,
            method: Rc::new(method),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event(&self) -> &Event {
        &self.event
    }
}

/// Routes tagged notifications to registered notifiers.
///
/// `C` is the context every notifier method receives mutably. The manager does
/// not own the context; callers pass it into each delivering call, which keeps
/// the manager storable inside the aggregate it serves.
pub struct NotificationManager<C> {
    owner: String,
    notifiers: IndexMap<String, Notifier<C>>,
    observers: ObservableSubject,
    debouncer: Debouncer,
    batch: BatchQueue,
    auto_tracker: Option<AutoTracker>,
    tracker: Tracker,
    clock: SharedClock,
    disposed: bool,
}

impl<C> fmt::Debug for NotificationManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationManager")
            .field("owner", &self.owner)
            .field("notifiers", &self.notifiers.keys().collect::<Vec<_>>())
            .field("observers", &self.observers)
            .field("debouncer", &self.debouncer)
            .field("queued", &self.batch.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<C> NotificationManager<C> {
    pub fn new(owner: impl Into<String>, clock: SharedClock, tracker: Tracker) -> Self {
        let owner = owner.into();
        Self {
            observers: ObservableSubject::new(owner.clone(), Rc::clone(&clock), tracker.clone()),
            owner,
            notifiers: IndexMap::new(),
            debouncer: Debouncer::new(),
            batch: BatchQueue::new(BatchConfig::default()),
            auto_tracker: None,
            tracker,
            clock,
            disposed: false,
        }
    }

    pub fn with_batch_config(mut self, config: BatchConfig) -> Self {
        self.batch.set_config(config);
        self
    }

    pub fn with_auto_tracker(mut self, auto_tracker: AutoTracker) -> Self {
        self.auto_tracker = Some(auto_tracker);
        self
    }

    pub fn set_auto_tracker(&mut self, auto_tracker: Option<AutoTracker>) {
        self.auto_tracker = auto_tracker;
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn batch_config(&self) -> BatchConfig {
        self.batch.config()
    }

    pub fn set_batch_config(&mut self, config: BatchConfig) {
        self.batch.set_config(config);
    }

    /// Registers `notifier` unless its id is already taken. Returns whether it
    /// was inserted; an existing registration is never overwritten.
    pub fn accept(&mut self, notifier: Notifier<C>) -> bool {
        if self.notifiers.contains_key(notifier.id()) {
            self.tracker.internal_info(
                &self.owner,
                format!("notifier `{}` already registered", notifier.id()),
            );
            return false;
        }
        self.audit(notifier.event());
        self.notifiers.insert(notifier.id.clone(), notifier);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Notifier<C>> {
        self.notifiers.shift_remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notifiers.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Notifier<C>> {
        self.notifiers.get(id)
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn notifier_ids(&self) -> impl Iterator<Item = &str> {
        self.notifiers.keys().map(String::as_str)
    }

    pub fn listeners(&self, tag: EventTag) -> usize {
        self.notifiers
            .values()
            .filter(|notifier| notifier.event.handles(tag))
            .count()
    }

    /// Runs every notifier handling `tag`, in registration order, then
    /// triggers the observers. Returns how many methods completed without
    /// error. A tag nobody handles is a no-op.
    pub fn notify(&mut self, ctx: &mut C, tag: EventTag, data: &Payload) -> usize {
        if self.listeners(tag) == 0 {
            return 0;
        }
        let delivered = self.deliver(ctx, tag, data);
        self.observers.trigger();
        delivered
    }

    /// Delays delivery of `tag` by `delay`. A later call for the same tag
    /// cancels the pending one and its data.
    /// Refused once the manager is disposed.
    pub fn debounce_notify(&mut self, tag: EventTag, delay: Duration, data: Payload) -> bool {
        if self.refuses_timers("debounce", tag) {
            return false;
        }
        let key = DebounceKey::new(self.owner.clone(), tag);
        let deadline = self.clock.now() + delay;
        self.debouncer.schedule(key, deadline, data)
    }

    pub fn cancel_debounce(&mut self, tag: EventTag) -> Option<Payload> {
        self.debouncer
            .cancel(&DebounceKey::new(self.owner.clone(), tag))
    }

    pub fn is_debounce_pending(&self, tag: EventTag) -> bool {
        self.debouncer
            .is_pending(&DebounceKey::new(self.owner.clone(), tag))
    }

    pub fn queued_len(&self) -> usize {
        self.batch.len()
    }

    /// Queues one notification for batched delivery. A full queue is flushed
    /// on the spot; otherwise nothing is delivered until a batch is scheduled.
    pub fn queue_notification(&mut self, ctx: &mut C, item: QueuedNotification) -> usize {
        if self.refuses_timers("batch", item.tag) {
            return 0;
        }
        self.batch.push(item);
        if self.batch.is_full() {
            return self.flush_batch(ctx);
        }
        0
    }

    /// Queues `items` and arms a flush.
    pub fn batch_notify(&mut self, ctx: &mut C, items: Vec<QueuedNotification>) -> usize {
        let mut delivered = 0;
        for item in items {
            delivered += self.queue_notification(ctx, item);
        }
        delivered + self.schedule_batch(ctx)
    }

    /// Arms the batch flush according to the configured strategy. With the
    /// immediate strategy the queue is flushed before returning.
    pub fn schedule_batch(&mut self, ctx: &mut C) -> usize {
        if self.disposed || self.batch.len() == 0 {
            return 0;
        }
        match self.batch.arm(self.clock.now()) {
            Armed::FlushNow => self.flush_batch(ctx),
            Armed::Scheduled(_) => 0,
        }
    }

    /// Delivers one group: each notifier handling the group's tag runs once.
    pub fn process_event_group(&mut self, ctx: &mut C, group: &EventGroup) -> usize {
        self.deliver(ctx, group.tag, &group.payload())
    }

    /// Delivers everything waiting, ignoring debounce and batch windows.
    pub fn flush_pending_notifications(&mut self, ctx: &mut C) -> usize {
        let mut delivered = 0;
        let mut touched = false;
        for (key, payload) in self.debouncer.take_all() {
            touched = true;
            delivered += self.deliver(ctx, key.tag, &payload);
        }
        if self.batch.len() > 0 {
            touched = true;
            delivered += self.deliver_batch(ctx);
        }
        if touched || self.observers.is_trigger_pending() {
            self.observers.trigger();
        }
        delivered
    }

    /// Performs the work whose deadline has passed: debounced notifications,
    /// a due batch flush and a due debounced trigger.
    pub fn poll(&mut self, ctx: &mut C) -> usize {
        let now = self.clock.now();
        let mut delivered = 0;
        for (key, payload) in self.debouncer.take_due(now) {
            delivered += self.notify(ctx, key.tag, &payload);
        }
        if self.batch.is_due(now) {
            delivered += self.flush_batch(ctx);
        }
        self.observers.poll();
        delivered
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let batch = if self.batch.len() > 0 {
            self.batch.deadline()
        } else {
            None
        };
        [
            self.debouncer.next_deadline(),
            batch,
            self.observers.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn observers(&self) -> &ObservableSubject {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObservableSubject {
        &mut self.observers
    }

    pub fn subscribe(&mut self, subscriber: &Subscriber, use_weak: bool) {
        self.observers.subscribe(subscriber, use_weak);
    }

    pub fn un_subscribe(&mut self, subscriber: &Subscriber, for_weak: bool) -> bool {
        self.observers.un_subscribe(subscriber, for_weak)
    }

    fn refuses_timers(&self, kind: &str, tag: EventTag) -> bool {
        if self.disposed {
            self.tracker.internal_info(
                &self.owner,
                format!("{kind} of `{tag}` ignored after dispose"),
            );
        }
        self.disposed
    }

    /// Drops every observer and pending timer. Registrations stay in place;
    /// later debounce and batch requests are refused.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.observers.un_subscribe_all(SubscriberList::All);
        self.observers.cancel_pending();
        self.debouncer.clear();
        self.batch.clear();
        self.disposed = true;
        self.tracker
            .internal_info(&self.owner, "notification manager disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn flush_batch(&mut self, ctx: &mut C) -> usize {
        let delivered = self.deliver_batch(ctx);
        self.observers.trigger();
        delivered
    }

    fn deliver_batch(&mut self, ctx: &mut C) -> usize {
        let mut delivered = 0;
        for group in group_events_by_type(self.batch.take()) {
            delivered += self.process_event_group(ctx, &group);
        }
        delivered
    }

    fn deliver(&self, ctx: &mut C, tag: EventTag, data: &Payload) -> usize {
        let targets: Vec<(String, NotifyMethod<C>)> = self
            .notifiers
            .values()
            .filter(|notifier| notifier.event.handles(tag))
            .map(|notifier| (notifier.id.clone(), Rc::clone(&notifier.method)))
            .collect();

        let mut delivered = 0;
        for (id, method) in targets {
            match method(ctx, data) {
                Ok(()) => delivered += 1,
                Err(err) => self.tracker.internal_error(
                    &self.owner,
                    format!("notifier `{id}` failed on {tag}: {err:#}"),
                ),
            }
        }
        delivered
    }

    fn audit(&self, event: &Event) {
        let Some(auto_tracker) = &self.auto_tracker else {
            return;
        };
        match auto_tracker.try_borrow_mut() {
            Ok(mut manager) => {
                manager.notify(&mut (), EventTag::OnRegister, &Payload::Event(event.clone()));
            }
            Err(_) => self
                .tracker
                .internal_warning(&self.owner, "auto-tracker busy; registration not audited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use anyhow::anyhow;

    use super::*;
    use crate::events::create_event;
    use crate::form::FieldValue;
    use crate::notify::BatchStrategy;
    use crate::time::{Clock, ManualClock};
    use crate::tracking::{MemoryProvider, Severity};

    type Log = Vec<String>;

    fn manager(clock: &ManualClock) -> NotificationManager<Log> {
        NotificationManager::new("field-1", clock.shared(), Tracker::new())
    }

    fn recorder(id: &str, tags: &[EventTag]) -> Notifier<Log> {
        let label = id.to_string();
        Notifier::new(id, create_event("f", id, tags, "test"), move |log: &mut Log, data| {
            let suffix = match data.latest() {
                Payload::Value(FieldValue::Text(text)) => text.clone(),
                Payload::Empty => "-".to_string(),
                other => format!("{other:?}"),
            };
            log.push(format!("{label}:{suffix}"));
            Ok(())
        })
    }

    fn text(value: &str) -> Payload {
        Payload::Value(FieldValue::Text(value.to_string()))
    }

    #[test]
    fn accept_is_idempotent_by_id() {
        let clock = ManualClock::new();
        let mut manager = manager(&clock);
        assert!(manager.accept(recorder("a", &[EventTag::OnChange])));
        assert!(!manager.accept(recorder("a", &[EventTag::OnBlur])));
        assert_eq!(manager.len(), 1);
        assert!(manager.accept(recorder("b", &[EventTag::OnChange])));
        assert_eq!(manager.len(), 2);
        assert_eq!(
            manager.get("a").unwrap().event().types(),
            &[EventTag::OnChange]
        );
    }

    #[test]
    fn notify_runs_matching_notifiers_in_registration_order() {
        let clock = ManualClock::new();
        let mut manager = manager(&clock);
        manager.accept(recorder("first", &[EventTag::OnChange]));
        manager.accept(recorder("blur", &[EventTag::OnBlur]));
        manager.accept(recorder("second", &[EventTag::OnChange, EventTag::OnBlur]));

        let mut log = Log::new();
        assert_eq!(manager.notify(&mut log, EventTag::OnChange, &text("x")), 2);
        assert_eq!(log, vec!["first:x", "second:x"]);
        assert_eq!(manager.notify(&mut log, EventTag::OnSubmit, &Payload::Empty), 0);
    }

    #[test]
    fn failing_notifier_does_not_stop_delivery() {
        let clock = ManualClock::new();
        let memory = Rc::new(MemoryProvider::default());
        let mut manager: NotificationManager<Log> = NotificationManager::new(
            "field-1",
            clock.shared(),
            Tracker::new().with_provider(memory.clone()),
        );
        manager.accept(Notifier::new(
            "broken",
            create_event("f", "broken", &[EventTag::OnChange], "test"),
            |_: &mut Log, _| Err(anyhow!("handler exploded")),
        ));
        manager.accept(recorder("ok", &[EventTag::OnChange]));

        let mut log = Log::new();
        assert_eq!(manager.notify(&mut log, EventTag::OnChange, &Payload::Empty), 1);
        assert_eq!(log, vec!["ok:-"]);
        assert!(memory.contains(Severity::Error, "handler exploded"));
    }

    #[test]
    fn debounce_delivers_last_payload_once() {
        let clock = ManualClock::new();
        let mut manager = manager(&clock);
        manager.accept(recorder("validate", &[EventTag::OnValidate]));
        let mut log = Log::new();

        manager.debounce_notify(EventTag::OnValidate, Duration::from_millis(500), text("e1"));
        clock.advance_ms(200);
        assert!(manager.debounce_notify(EventTag::OnValidate, Duration::from_millis(500), text("e2")));

        clock.advance_ms(499);
        assert_eq!(manager.poll(&mut log), 0);
        assert!(log.is_empty());
        clock.advance_ms(1);
        assert_eq!(manager.poll(&mut log), 1);
        assert_eq!(log, vec!["validate:e2"]);
        assert_eq!(manager.poll(&mut log), 0);
    }

    #[test]
    fn immediate_batch_groups_by_tag() {
        let clock = ManualClock::new();
        let mut manager = manager(&clock);
        manager.accept(recorder("change", &[EventTag::OnChange]));
        manager.accept(recorder("blur", &[EventTag::OnBlur]));
        let mut log = Log::new();

        let delivered = manager.batch_notify(
            &mut log,
            vec![
                QueuedNotification::new(EventTag::OnChange, text("1")),
                QueuedNotification::new(EventTag::OnBlur, text("2")),
                QueuedNotification::new(EventTag::OnChange, text("3")),
            ],
        );
        assert_eq!(delivered, 2);
        assert_eq!(log, vec!["change:3", "blur:2"]);
    }

    #[test]
    fn windowed_batch_waits_for_poll_or_flush() {
        let clock = ManualClock::new();
        let mut manager =
            manager(&clock).with_batch_config(BatchConfig::windowed(Duration::from_millis(50)));
        manager.accept(recorder("change", &[EventTag::OnChange]));
        let mut log = Log::new();

        manager.batch_notify(
            &mut log,
            vec![QueuedNotification::new(EventTag::OnChange, text("1"))],
        );
        assert!(log.is_empty());
        assert_eq!(manager.next_deadline(), Some(clock.now() + Duration::from_millis(50)));
        clock.advance_ms(50);
        assert_eq!(manager.poll(&mut log), 1);
        assert_eq!(log, vec!["change:1"]);

        manager.batch_notify(
            &mut log,
            vec![QueuedNotification::new(EventTag::OnChange, text("2"))],
        );
        assert_eq!(manager.flush_pending_notifications(&mut log), 1);
        assert_eq!(log, vec!["change:1", "change:2"]);
    }

    #[test]
    fn full_queue_flushes_early() {
        let clock = ManualClock::new();
        let config = BatchConfig {
            strategy: BatchStrategy::Windowed,
            window: Duration::from_secs(10),
            max_queue: 2,
        };
        let mut manager = manager(&clock).with_batch_config(config);
        manager.accept(recorder("change", &[EventTag::OnChange]));
        let mut log = Log::new();

        assert_eq!(
            manager.queue_notification(&mut log, QueuedNotification::new(EventTag::OnChange, text("1"))),
            0
        );
        assert_eq!(
            manager.queue_notification(&mut log, QueuedNotification::new(EventTag::OnChange, text("2"))),
            1
        );
        assert_eq!(manager.queued_len(), 0);
    }

    #[test]
    fn flush_pending_delivers_debounced_calls() {
        let clock = ManualClock::new();
        let mut manager = manager(&clock);
        manager.accept(recorder("validate", &[EventTag::OnValidate]));
        let mut log = Log::new();
        manager.debounce_notify(EventTag::OnValidate, Duration::from_secs(1), text("now"));

        assert_eq!(manager.flush_pending_notifications(&mut log), 1);
        assert_eq!(log, vec!["validate:now"]);
        assert!(!manager.is_debounce_pending(EventTag::OnValidate));
    }

    #[test]
    fn notify_triggers_observers_and_dispose_releases_them() {
        let clock = ManualClock::new();
        let mut manager = manager(&clock);
        manager.accept(recorder("change", &[EventTag::OnChange]));
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        let subscriber: Subscriber = Rc::new(move || counter.set(counter.get() + 1));
        manager.subscribe(&subscriber, false);
        let mut log = Log::new();

        manager.notify(&mut log, EventTag::OnChange, &Payload::Empty);
        assert_eq!(renders.get(), 1);

        manager.debounce_notify(EventTag::OnChange, Duration::from_millis(10), Payload::Empty);
        manager.dispose();
        manager.dispose();
        assert!(manager.is_disposed());
        clock.advance_ms(20);
        assert_eq!(manager.poll(&mut log), 0);
        manager.notify(&mut log, EventTag::OnChange, &Payload::Empty);
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn auto_tracker_audits_accepted_registrations() {
        let clock = ManualClock::new();
        let audited = Rc::new(Cell::new(0));
        let seen = Rc::clone(&audited);
        let mut auditor = NotificationManager::<()>::new("audit", clock.shared(), Tracker::new());
        auditor.accept(Notifier::new(
            "count",
            create_event("audit", "audit.count", &[EventTag::OnRegister], "audit"),
            move |_: &mut (), data| {
                if matches!(data, Payload::Event(_)) {
                    seen.set(seen.get() + 1);
                }
                Ok(())
            },
        ));
        let auto_tracker: AutoTracker = Rc::new(RefCell::new(auditor));
        let mut manager = manager(&clock).with_auto_tracker(Rc::clone(&auto_tracker));

        manager.accept(recorder("a", &[EventTag::OnChange]));
        manager.accept(recorder("a", &[EventTag::OnChange]));
        manager.accept(recorder("b", &[EventTag::OnBlur]));
        assert_eq!(audited.get(), 2);
    }
}
