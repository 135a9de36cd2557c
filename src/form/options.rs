use std::time::Duration;

use crate::domain::OptionsDescriptor;
use crate::events::EventTag;
use crate::form::validation::ValidationStrategy;
use crate::form::values::ValueStrategy;
use crate::notify::{AutoTracker, BatchConfig};
use crate::time::{SharedClock, system_clock};
use crate::tracking::Tracker;

/// Settings shared by a form and the fields created through it.
#[derive(Debug, Clone)]
pub struct FormularOptions {
    pub debounce_delay: Duration,
    pub validation_timeout: Duration,
    pub batch: BatchConfig,
    pub trigger_mode: Vec<EventTag>,
    pub validate_after_first_submit: bool,
    /// Fields built without validation have no manager; validating them is a
    /// logged no-op.
    pub validation_enabled: bool,
    pub tracker: Tracker,
    pub clock: SharedClock,
    pub auto_tracker: Option<AutoTracker>,
    pub(crate) value_strategies: Vec<ValueStrategy>,
    pub(crate) validation_strategies: Vec<ValidationStrategy>,
}

impl Default for FormularOptions {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(500),
            validation_timeout: Duration::from_secs(5),
            batch: BatchConfig::default(),
            trigger_mode: vec![EventTag::OnChange],
            validate_after_first_submit: false,
            validation_enabled: true,
            tracker: Tracker::default(),
            clock: system_clock(),
            auto_tracker: None,
            value_strategies: Vec::new(),
            validation_strategies: Vec::new(),
        }
    }
}

impl FormularOptions {
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_trigger_mode(mut self, tags: impl Into<Vec<EventTag>>) -> Self {
        self.trigger_mode = tags.into();
        self
    }

    pub fn with_validate_after_first_submit(mut self, enabled: bool) -> Self {
        self.validate_after_first_submit = enabled;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn with_tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_auto_tracker(mut self, auto_tracker: AutoTracker) -> Self {
        self.auto_tracker = Some(auto_tracker);
        self
    }

    /// Extra value strategy, consulted after the defaults.
    pub fn with_value_strategy(mut self, strategy: ValueStrategy) -> Self {
        self.value_strategies.push(strategy);
        self
    }

    /// Extra validation rule, evaluated after the defaults.
    pub fn with_validation_strategy(mut self, strategy: ValidationStrategy) -> Self {
        self.validation_strategies.push(strategy);
        self
    }

    /// Overlays the values a form document sets; absent entries keep the
    /// current settings.
    pub fn apply_descriptor(mut self, descriptor: &OptionsDescriptor) -> Self {
        if let Some(ms) = descriptor.debounce_ms {
            self.debounce_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = descriptor.validation_timeout_ms {
            self.validation_timeout = Duration::from_millis(ms);
        }
        if let Some(tags) = &descriptor.trigger_mode {
            self.trigger_mode = tags.clone();
        }
        if let Some(enabled) = descriptor.validate_after_first_submit {
            self.validate_after_first_submit = enabled;
        }
        if let Some(batch) = &descriptor.batch {
            self.batch.strategy = batch.strategy;
            if let Some(ms) = batch.window_ms {
                self.batch.window = Duration::from_millis(ms);
            }
            if let Some(max_queue) = batch.max_queue {
                self.batch = self.batch.with_max_queue(max_queue);
            }
        }
        self
    }
}
