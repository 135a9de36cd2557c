//! Rule evaluation over fields.
//!
//! A [`ValidationManager`] holds an ordered table of [`ValidationStrategy`]
//! entries. A pass over a field asks every strategy for results against the
//! field's display string and validation value, then reduces them into the
//! field's `is_valid` / `has_errors` flags.

mod rules;

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use crate::form::field::{FieldCore, FieldState, FieldValue};
use crate::form::values::ValuePurpose;
use crate::time::SharedClock;
use crate::tracking::Tracker;

pub use rules::default_validation_strategies;
pub(crate) use rules::{CompiledPattern, compile_patterns};

const SOURCE: &str = "formular.validation";

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            state: true,
            message: None,
            error_code: None,
        }
    }

    pub fn fail(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: false,
            message: Some(message.into()),
            error_code: Some(code.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.state
    }
}

/// What a rule sees: the field, its string view and its validation value.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    pub field: &'a FieldState,
    pub text: &'a str,
    pub value: Option<&'a FieldValue>,
}

impl ValidationContext<'_> {
    /// Empty by string view, with an unchecked box also counting as empty.
    pub fn is_empty(&self) -> bool {
        match self.value {
            Some(FieldValue::Bool(flag)) => !flag,
            Some(value) if value.is_empty() => true,
            _ => self.text.trim().is_empty(),
        }
    }
}

pub type RuleFn = Rc<dyn Fn(&ValidationContext<'_>) -> Vec<ValidationResult>>;

#[derive(Clone)]
pub struct ValidationStrategy {
    id: String,
    evaluate: RuleFn,
}

impl ValidationStrategy {
    pub fn new<F>(id: impl Into<String>, evaluate: F) -> Self
    where
        F: Fn(&ValidationContext<'_>) -> Vec<ValidationResult> + 'static,
    {
        Self {
            id: id.into(),
            evaluate: Rc::new(evaluate),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn evaluate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        (self.evaluate)(ctx)
    }
}

impl fmt::Debug for ValidationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationStrategy")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Counts from one [`ValidationManager::validate_many`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub validated: usize,
    pub skipped: usize,
    pub valid: usize,
    pub invalid: usize,
    pub timed_out: usize,
}

impl ValidationSummary {
    pub fn all_valid(&self) -> bool {
        self.invalid == 0
    }
}

#[derive(Debug, Clone)]
pub struct ValidationManager {
    strategies: Vec<ValidationStrategy>,
    timeout: Duration,
    clock: SharedClock,
    tracker: Tracker,
}

impl ValidationManager {
    /// A manager preloaded with the default rule table.
    pub fn new(clock: SharedClock, tracker: Tracker) -> Self {
        let mut manager = Self::empty(clock, tracker);
        manager.add_validation_strategies(default_validation_strategies());
        manager
    }

    pub fn empty(clock: SharedClock, tracker: Tracker) -> Self {
        Self {
            strategies: Vec::new(),
            timeout: Duration::from_secs(5),
            clock,
            tracker,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Appends strategies, skipping ids already present. Returns how many were added.
    pub fn add_validation_strategies(
        &mut self,
        strategies: impl IntoIterator<Item = ValidationStrategy>,
    ) -> usize {
        let mut added = 0;
        for strategy in strategies {
            if self.strategies.iter().any(|known| known.id == strategy.id) {
                self.tracker.internal_info(
                    SOURCE,
                    format!("validation strategy `{}` already registered", strategy.id),
                );
                continue;
            }
            self.strategies.push(strategy);
            added += 1;
        }
        added
    }

    pub fn strategy_ids(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(ValidationStrategy::id)
    }

    /// Runs the rule table against one field's current state without
    /// touching its flags.
    pub fn evaluate(&self, core: &FieldCore) -> Vec<ValidationResult> {
        let state = &core.state;
        let text = core.values.get_as_string(state);
        let value = core.values.get_value(state, ValuePurpose::Validation);
        let ctx = ValidationContext {
            field: state,
            text: &text,
            value: value.as_ref(),
        };
        self.strategies
            .iter()
            .flat_map(|strategy| strategy.evaluate(&ctx))
            .collect()
    }

    /// Validates every field that opts in. With `reset` the previous results
    /// are cleared instead and no rule runs.
    pub fn validate_many<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a mut FieldCore>,
        reset: bool,
    ) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        for core in fields {
            if reset {
                core.state.clear_validation_results();
                summary.skipped += 1;
                continue;
            }
            if !core.state.should_validate {
                summary.skipped += 1;
                continue;
            }
            core.state.flags.is_busy = true;
            let started = self.clock.now();
            let results = self.evaluate(core);
            let elapsed = self.clock.now().saturating_duration_since(started);
            core.state.flags.is_busy = false;

            summary.validated += 1;
            if elapsed > self.timeout {
                self.tracker.internal_error(
                    SOURCE,
                    format!(
                        "validation of `{}` exceeded {:?}",
                        core.state.id, self.timeout
                    ),
                );
                core.state.apply_validation_results(vec![ValidationResult::fail(
                    "timeout",
                    "validation timed out",
                )]);
                summary.timed_out += 1;
            } else {
                core.state.apply_validation_results(results);
            }

            if core.state.flags.is_valid {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::domain::{FieldDescriptor, FieldType, ValidationOptions};
    use crate::form::{Field, FormularOptions};
    use crate::time::ManualClock;

    fn field(descriptor: FieldDescriptor, clock: &ManualClock) -> Field {
        let options = FormularOptions::default()
            .with_clock(clock.shared())
            .with_tracker(Tracker::new());
        Field::new(descriptor, &options).unwrap()
    }

    #[test]
    fn required_empty_field_fails_once() {
        let clock = ManualClock::new();
        let mut name = field(
            FieldDescriptor::new("1", "name").with_validation(ValidationOptions::required()),
            &clock,
        );
        let manager = ValidationManager::new(clock.shared(), Tracker::new());
        let summary = manager.validate_many([name.core_mut()], false);
        assert_eq!(summary.invalid, 1);
        let results = name.state().validation_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error_code.as_deref(), Some("required"));
        assert!(!name.is_valid());
    }

    #[test]
    fn reset_clears_without_running_rules() {
        let clock = ManualClock::new();
        let mut name = field(
            FieldDescriptor::new("1", "name").with_validation(ValidationOptions::required()),
            &clock,
        );
        let manager = ValidationManager::new(clock.shared(), Tracker::new());
        manager.validate_many([name.core_mut()], false);
        assert!(name.state().flags().has_errors);
        let summary = manager.validate_many([name.core_mut()], true);
        assert_eq!(summary.validated, 0);
        assert!(name.state().validation_results().is_empty());
        assert!(name.is_valid());
    }

    #[test]
    fn opted_out_fields_are_skipped() {
        let clock = ManualClock::new();
        let mut name = field(
            FieldDescriptor::new("1", "name")
                .with_validation(ValidationOptions::required())
                .with_should_validate(false),
            &clock,
        );
        let manager = ValidationManager::new(clock.shared(), Tracker::new());
        let summary = manager.validate_many([name.core_mut()], false);
        assert_eq!(summary.skipped, 1);
        assert!(name.is_valid());
    }

    #[test]
    fn slow_rule_fails_safe() {
        let clock = ManualClock::new();
        let mut age = field(
            FieldDescriptor::new("2", "age").with_type(FieldType::Number),
            &clock,
        );
        let mut manager = ValidationManager::empty(clock.shared(), Tracker::new())
            .with_timeout(Duration::from_millis(10));
        let slow_clock = clock.clone();
        manager.add_validation_strategies([ValidationStrategy::new("slow", move |_| {
            slow_clock.advance_ms(50);
            vec![ValidationResult::pass()]
        })]);
        let summary = manager.validate_many([age.core_mut()], false);
        assert_eq!(summary.timed_out, 1);
        assert!(!age.state().flags().is_busy);
        assert!(!age.is_valid());
        assert_eq!(
            age.state().validation_results()[0].error_code.as_deref(),
            Some("timeout")
        );
    }

    #[test]
    fn duplicate_strategy_ids_are_ignored() {
        let clock = ManualClock::new();
        let mut manager = ValidationManager::empty(clock.shared(), Tracker::new());
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let strategy = ValidationStrategy::new("count", move |_| {
            counter.set(counter.get() + 1);
            Vec::new()
        });
        assert_eq!(
            manager.add_validation_strategies([strategy.clone(), strategy]),
            1
        );
        assert_eq!(manager.strategy_ids().collect::<Vec<_>>(), vec!["count"]);
        assert_eq!(calls.get(), 0);
    }
}
