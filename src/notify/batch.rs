use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::events::{EventTag, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum BatchStrategy {
    /// Flush as soon as a batch is scheduled.
    #[default]
    Immediate,
    /// Flush on the next `poll`.
    NextTick,
    /// Flush once the configured window has elapsed.
    Windowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub strategy: BatchStrategy,
    pub window: Duration,
    pub max_queue: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strategy: BatchStrategy::Immediate,
            window: Duration::from_millis(16),
            max_queue: 256,
        }
    }
}

impl BatchConfig {
    pub fn windowed(window: Duration) -> Self {
        Self {
            strategy: BatchStrategy::Windowed,
            window,
            ..Self::default()
        }
    }

    pub fn next_tick() -> Self {
        Self {
            strategy: BatchStrategy::NextTick,
            ..Self::default()
        }
    }

    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedNotification {
    pub tag: EventTag,
    pub payload: Payload,
    pub priority: i32,
}

impl QueuedNotification {
    pub fn new(tag: EventTag, payload: Payload) -> Self {
        Self {
            tag,
            payload,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    pub priority: i32,
    pub tag: EventTag,
    pub payloads: Vec<Payload>,
}

impl EventGroup {
    /// The payload handed to notifiers: a lone payload as-is, otherwise the
    /// whole group in arrival order.
    pub fn payload(&self) -> Payload {
        match self.payloads.as_slice() {
            [single] => single.clone(),
            _ => Payload::Group(self.payloads.clone()),
        }
    }
}

/// Buckets queued notifications by priority (highest first), then groups each
/// bucket by tag in order of first appearance. Arrival order is kept inside a
/// group.
pub fn group_events_by_type(items: Vec<QueuedNotification>) -> Vec<EventGroup> {
    let mut priorities: Vec<i32> = items.iter().map(|item| item.priority).collect();
    priorities.sort_unstable_by(|a, b| b.cmp(a));
    priorities.dedup();

    let mut groups: Vec<EventGroup> = Vec::new();
    for priority in priorities {
        let bucket_start = groups.len();
        for item in items.iter().filter(|item| item.priority == priority) {
            let existing = groups[bucket_start..]
                .iter()
                .position(|group| group.tag == item.tag);
            match existing {
                Some(offset) => groups[bucket_start + offset]
                    .payloads
                    .push(item.payload.clone()),
                None => groups.push(EventGroup {
                    priority,
                    tag: item.tag,
                    payloads: vec![item.payload.clone()],
                }),
            }
        }
    }
    groups
}

pub(crate) enum Armed {
    FlushNow,
    Scheduled(Instant),
}

#[derive(Debug, Default)]
pub(crate) struct BatchQueue {
    items: Vec<QueuedNotification>,
    deadline: Option<Instant>,
    config: BatchConfig,
}

impl BatchQueue {
    pub(crate) fn new(config: BatchConfig) -> Self {
        Self {
            items: Vec::new(),
            deadline: None,
            config,
        }
    }

    pub(crate) fn config(&self) -> BatchConfig {
        self.config
    }

    pub(crate) fn set_config(&mut self, config: BatchConfig) {
        self.config = config;
    }

    pub(crate) fn push(&mut self, item: QueuedNotification) {
        self.items.push(item);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.items.len() >= self.config.max_queue
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arms a flush per the configured strategy. An already armed deadline is
    /// kept so a steady stream cannot starve the flush.
    pub(crate) fn arm(&mut self, now: Instant) -> Armed {
        if self.config.strategy == BatchStrategy::Immediate || self.is_full() {
            return Armed::FlushNow;
        }
        let deadline = *self.deadline.get_or_insert(match self.config.strategy {
            BatchStrategy::Windowed => now + self.config.window,
            _ => now,
        });
        Armed::Scheduled(deadline)
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        !self.items.is_empty() && self.deadline.is_some_and(|deadline| deadline <= now)
    }

    pub(crate) fn take(&mut self) -> Vec<QueuedNotification> {
        self.deadline = None;
        std::mem::take(&mut self.items)
    }

    pub(crate) fn clear(&mut self) {
        self.deadline = None;
        self.items.clear();
    }
}
