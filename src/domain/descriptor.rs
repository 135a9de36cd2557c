use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::validation::ValidationOptions;
use crate::events::EventTag;
use crate::notify::BatchStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Checkbox,
    Toggle,
    #[default]
    Text,
    Richtext,
    Radio,
    Select,
    Number,
    Range,
    Date,
    Time,
    Tel,
    Email,
    Url,
    Password,
}

/// The shape a field's value takes internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    Boolean,
    String,
    Numeric,
    Date,
    Option,
}

impl FieldType {
    pub const ALL: [FieldType; 14] = [
        FieldType::Checkbox,
        FieldType::Toggle,
        FieldType::Text,
        FieldType::Richtext,
        FieldType::Radio,
        FieldType::Select,
        FieldType::Number,
        FieldType::Range,
        FieldType::Date,
        FieldType::Time,
        FieldType::Tel,
        FieldType::Email,
        FieldType::Url,
        FieldType::Password,
    ];

    pub fn category(self) -> ValueCategory {
        match self {
            FieldType::Checkbox | FieldType::Toggle => ValueCategory::Boolean,
            FieldType::Radio | FieldType::Select => ValueCategory::Option,
            FieldType::Number | FieldType::Range => ValueCategory::Numeric,
            FieldType::Date => ValueCategory::Date,
            FieldType::Text
            | FieldType::Richtext
            | FieldType::Time
            | FieldType::Tel
            | FieldType::Email
            | FieldType::Url
            | FieldType::Password => ValueCategory::String,
        }
    }

    pub fn is_option_based(self) -> bool {
        self.category() == ValueCategory::Option
    }

    /// Types whose native element carries a `checked` state.
    pub fn is_checkable(self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Toggle | FieldType::Radio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Checkbox => "checkbox",
            FieldType::Toggle => "toggle",
            FieldType::Text => "text",
            FieldType::Richtext => "richtext",
            FieldType::Radio => "radio",
            FieldType::Select => "select",
            FieldType::Number => "number",
            FieldType::Range => "range",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Tel => "tel",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Password => "password",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    #[serde(deserialize_with = "string_or_number")]
    #[schemars(with = "String")]
    pub id: String,
    pub value: String,
    pub text: String,
    #[serde(default)]
    pub sequence_id: usize,
    #[serde(default)]
    pub disabled: bool,
}

impl FieldOption {
    pub fn new(
        id: impl Into<String>,
        value: impl Into<String>,
        text: impl Into<String>,
        sequence_id: usize,
    ) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            text: text.into(),
            sequence_id,
            disabled: false,
        }
    }
}

/// Construction input for one field.
///
/// `id` and `name` are optional here so that a malformed document still
/// deserializes; `Field::new` rejects descriptors missing either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[schemars(with = "Option<String>")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub validation_options: ValidationOptions,
    #[serde(default)]
    pub expected_value: Option<Value>,
    #[serde(default = "default_true")]
    pub should_validate: bool,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            label: None,
            field_type: FieldType::default(),
            value: None,
            default_value: None,
            options: Vec::new(),
            validation_options: ValidationOptions::default(),
            expected_value: None,
            should_validate: true,
            mask: None,
            enabled: true,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_validation(mut self, options: ValidationOptions) -> Self {
        self.validation_options = options;
        self
    }

    pub fn with_expected_value(mut self, value: Value) -> Self {
        self.expected_value = Some(value);
        self
    }

    pub fn with_should_validate(mut self, should_validate: bool) -> Self {
        self.should_validate = should_validate;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The value the field starts from: `value`, else `defaultValue`.
    pub fn initial_value(&self) -> Option<&Value> {
        self.value
            .as_ref()
            .filter(|value| !value.is_null())
            .or(self.default_value.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub id: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub options: OptionsDescriptor,
}

/// Form-level configuration as it appears in documents (durations in ms).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsDescriptor {
    pub debounce_ms: Option<u64>,
    pub validation_timeout_ms: Option<u64>,
    pub trigger_mode: Option<Vec<EventTag>>,
    pub validate_after_first_submit: Option<bool>,
    pub batch: Option<BatchDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchDescriptor {
    pub strategy: BatchStrategy,
    pub window_ms: Option<u64>,
    pub max_queue: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn id_from_value<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(E::custom(format!("expected string or number id, found {other}"))),
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_from_value(value)?
        .ok_or_else(|| <D::Error as serde::de::Error>::custom("option id must not be null"))
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_from_value(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn descriptor_accepts_numeric_ids_and_defaults() {
        let descriptor: FieldDescriptor = serde_json::from_value(json!({
            "id": 1,
            "name": "agree",
            "type": "checkbox",
            "value": false
        }))
        .unwrap();
        assert_eq!(descriptor.id.as_deref(), Some("1"));
        assert_eq!(descriptor.field_type, FieldType::Checkbox);
        assert!(descriptor.should_validate);
        assert!(descriptor.enabled);
        assert_eq!(descriptor.initial_value(), Some(&json!(false)));
    }

    #[test]
    fn missing_value_falls_back_to_default_value() {
        let descriptor = FieldDescriptor::new("2", "city").with_default_value(json!("Oslo"));
        assert_eq!(descriptor.initial_value(), Some(&json!("Oslo")));
    }

    #[test]
    fn categories_cover_option_and_checkable_types() {
        assert!(FieldType::Select.is_option_based());
        assert!(FieldType::Radio.is_option_based());
        assert!(FieldType::Radio.is_checkable());
        assert_eq!(FieldType::Range.category(), ValueCategory::Numeric);
        assert_eq!(FieldType::Email.category(), ValueCategory::String);
    }
}
