//! Publish/subscribe plumbing shared by fields and forms.
//!
//! - [`ObservableSubject`]: fire-and-forget re-render signal with strong and
//!   weak subscribers.
//! - [`NotificationManager`]: tag-routed notifier registry with immediate,
//!   debounced and batched delivery.
//!
//! Delivery is synchronous and runs to completion; deferred work (debounce
//! windows, batch windows) is performed by `poll`, which compares deadlines
//! against the injected clock.

mod batch;
mod debounce;
mod manager;
mod subject;

pub use batch::{BatchConfig, BatchStrategy, EventGroup, QueuedNotification, group_events_by_type};
pub use debounce::{DebounceKey, Debouncer};
pub use manager::{AutoTracker, NotificationManager, NotifyMethod, Notifier};
pub use subject::{ObservableSubject, Subscriber, SubscriberList};
