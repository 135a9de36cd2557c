use serde::Serialize;
use serde_json::Value;

use crate::domain::{FieldOption, FieldType, ValidationOptions};
use crate::events::EventTag;
use crate::form::validation::{CompiledPattern, ValidationResult};

use super::value::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFlags {
    pub is_valid: bool,
    pub is_dirty: bool,
    pub is_pristine: bool,
    pub is_focus: bool,
    pub is_busy: bool,
    pub has_errors: bool,
    pub enabled: bool,
    pub required: bool,
}

impl Default for FieldFlags {
    fn default() -> Self {
        Self {
            is_valid: true,
            is_dirty: false,
            is_pristine: true,
            is_focus: false,
            is_busy: false,
            has_errors: false,
            enabled: true,
            required: false,
        }
    }
}

/// Everything a field knows about itself apart from its notifier.
#[derive(Debug, Clone)]
pub struct FieldState {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) label: Option<String>,
    pub(crate) field_type: FieldType,
    pub(crate) value: FieldValue,
    pub(crate) original_value: FieldValue,
    pub(crate) options: Vec<FieldOption>,
    pub(crate) selected_option_id: Option<usize>,
    pub(crate) validation_results: Vec<ValidationResult>,
    pub(crate) flags: FieldFlags,
    pub(crate) validation_options: ValidationOptions,
    pub(crate) patterns: Vec<CompiledPattern>,
    pub(crate) expected_value: Option<Value>,
    pub(crate) should_validate: bool,
    pub(crate) mask: Option<String>,
    pub(crate) trigger_mode: Vec<EventTag>,
}

impl FieldState {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn original_value(&self) -> &FieldValue {
        &self.original_value
    }

    pub fn options(&self) -> &[FieldOption] {
        &self.options
    }

    pub fn selected_option_id(&self) -> Option<usize> {
        self.selected_option_id
    }

    pub fn validation_results(&self) -> &[ValidationResult] {
        &self.validation_results
    }

    pub fn flags(&self) -> &FieldFlags {
        &self.flags
    }

    pub fn validation_options(&self) -> &ValidationOptions {
        &self.validation_options
    }

    pub fn expected_value(&self) -> Option<&Value> {
        self.expected_value.as_ref()
    }

    pub fn should_validate(&self) -> bool {
        self.should_validate
    }

    pub fn mask(&self) -> Option<&str> {
        self.mask.as_deref()
    }

    pub fn trigger_mode(&self) -> &[EventTag] {
        &self.trigger_mode
    }

    /// `is_pristine` is always the negation of `is_dirty`.
    pub(crate) fn refresh_dirty(&mut self) {
        self.flags.is_dirty = self.value != self.original_value;
        self.flags.is_pristine = !self.flags.is_dirty;
    }

    /// Replaces the result list and recomputes the derived flags.
    pub(crate) fn apply_validation_results(&mut self, results: Vec<ValidationResult>) {
        self.flags.is_valid = results.iter().all(|result| result.state);
        self.flags.has_errors = results.iter().any(|result| !result.state);
        self.validation_results = results;
    }

    pub(crate) fn clear_validation_results(&mut self) {
        self.apply_validation_results(Vec::new());
    }

    pub fn option_by_id(&self, id: &str) -> Option<&FieldOption> {
        self.options.iter().find(|option| option.id == id)
    }

    pub fn option_by_value(&self, value: &str) -> Option<&FieldOption> {
        self.options.iter().find(|option| option.value == value)
    }

    pub fn option_by_sequence_id(&self, sequence_id: usize) -> Option<&FieldOption> {
        self.options
            .iter()
            .find(|option| option.sequence_id == sequence_id)
    }

    pub fn selected_option(&self) -> Option<&FieldOption> {
        match &self.value {
            FieldValue::Choice(id) => self.option_by_id(id),
            _ => None,
        }
    }

    pub(crate) fn empty_value(&self) -> FieldValue {
        match self.field_type.category() {
            crate::domain::ValueCategory::Boolean => FieldValue::Bool(false),
            crate::domain::ValueCategory::String => FieldValue::Text(String::new()),
            _ => FieldValue::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::validation::ValidationResult;

    fn state() -> FieldState {
        FieldState {
            id: "f".into(),
            name: "f".into(),
            label: None,
            field_type: FieldType::Text,
            value: FieldValue::Text(String::new()),
            original_value: FieldValue::Text(String::new()),
            options: Vec::new(),
            selected_option_id: None,
            validation_results: Vec::new(),
            flags: FieldFlags::default(),
            validation_options: ValidationOptions::default(),
            patterns: Vec::new(),
            expected_value: None,
            should_validate: true,
            mask: None,
            trigger_mode: vec![EventTag::OnChange],
        }
    }

    #[test]
    fn pristine_tracks_dirty() {
        let mut state = state();
        state.value = FieldValue::from("x");
        state.refresh_dirty();
        assert!(state.flags.is_dirty && !state.flags.is_pristine);
        state.value = FieldValue::Text(String::new());
        state.refresh_dirty();
        assert!(!state.flags.is_dirty && state.flags.is_pristine);
    }

    #[test]
    fn results_reduce_to_flags() {
        let mut state = state();
        state.apply_validation_results(vec![
            ValidationResult::pass(),
            ValidationResult::fail("required", "required"),
        ]);
        assert!(!state.flags.is_valid);
        assert!(state.flags.has_errors);
        state.clear_validation_results();
        assert!(state.flags.is_valid);
        assert!(!state.flags.has_errors);
    }
}
