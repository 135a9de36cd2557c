use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ValidationContext, ValidationResult, ValidationStrategy};
use crate::domain::{FieldType, ValidationOptions};
use crate::form::field::FieldValue;
use crate::form::field::convert::format_number;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid built-in pattern")
});
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+[^\s]*$").expect("valid built-in pattern")
});
static TEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()\-]{3,}$").expect("valid built-in pattern"));
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9](:[0-5][0-9])?$").expect("valid built-in pattern")
});

/// A user pattern, compiled once when its field is built.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    source: String,
    message: Option<String>,
    regex: Result<Regex, String>,
}

pub(crate) fn compile_patterns(options: &ValidationOptions) -> Vec<CompiledPattern> {
    options
        .patterns
        .iter()
        .map(|rule| CompiledPattern {
            source: rule.pattern.clone(),
            message: rule.message.clone(),
            regex: Regex::new(&rule.pattern).map_err(|err| err.to_string()),
        })
        .collect()
}

/// The rule table every [`super::ValidationManager::new`] starts with, in
/// evaluation order.
pub fn default_validation_strategies() -> Vec<ValidationStrategy> {
    vec![
        ValidationStrategy::new("required", required),
        ValidationStrategy::new("length", length),
        ValidationStrategy::new("range", range),
        ValidationStrategy::new("pattern", pattern),
        ValidationStrategy::new("format", format),
        ValidationStrategy::new("expected", expected),
        ValidationStrategy::new("schema", schema),
    ]
}

fn required(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let Some(rule) = ctx.field.validation_options().required_data.as_ref() else {
        return Vec::new();
    };
    if !rule.required {
        return Vec::new();
    }
    if ctx.is_empty() {
        let message = rule
            .message
            .clone()
            .unwrap_or_else(|| format!("{} is required", ctx.field.name()));
        vec![ValidationResult::fail("required", message)]
    } else {
        vec![ValidationResult::pass()]
    }
}

fn length(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let Some(rule) = ctx.field.validation_options().length_data.as_ref() else {
        return Vec::new();
    };
    if ctx.is_empty() {
        return Vec::new();
    }
    let count = ctx.text.chars().count();
    let too_short = rule.min.is_some_and(|min| count < min);
    let too_long = rule.max.is_some_and(|max| count > max);
    if !too_short && !too_long {
        return vec![ValidationResult::pass()];
    }
    let message = rule.message.clone().unwrap_or_else(|| match (rule.min, rule.max) {
        (Some(min), Some(max)) => format!("must be between {min} and {max} characters"),
        (Some(min), None) => format!("must be at least {min} characters"),
        (None, Some(max)) => format!("must be at most {max} characters"),
        (None, None) => "invalid length".to_string(),
    });
    vec![ValidationResult::fail("length", message)]
}

fn range(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let Some(rule) = ctx.field.validation_options().range_data.as_ref() else {
        return Vec::new();
    };
    if ctx.is_empty() {
        return Vec::new();
    }
    let number = match ctx.value {
        Some(FieldValue::Number(number)) => Some(*number),
        _ => ctx.text.trim().parse::<f64>().ok(),
    };
    let Some(number) = number else {
        return vec![ValidationResult::fail("range", "must be a number")];
    };
    let below = rule.min.is_some_and(|min| number < min);
    let above = rule.max.is_some_and(|max| number > max);
    if !below && !above {
        return vec![ValidationResult::pass()];
    }
    let message = rule.message.clone().unwrap_or_else(|| match (rule.min, rule.max) {
        (Some(min), Some(max)) => format!(
            "must be between {} and {}",
            format_number(min),
            format_number(max)
        ),
        (Some(min), None) => format!("must be at least {}", format_number(min)),
        (None, Some(max)) => format!("must be at most {}", format_number(max)),
        (None, None) => "out of range".to_string(),
    });
    vec![ValidationResult::fail("range", message)]
}

fn pattern(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let patterns = &ctx.field.patterns;
    if patterns.is_empty() || ctx.is_empty() {
        return Vec::new();
    }
    patterns
        .iter()
        .map(|compiled| match &compiled.regex {
            Ok(regex) if regex.is_match(ctx.text) => ValidationResult::pass(),
            Ok(_) => ValidationResult::fail(
                "pattern",
                compiled
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("must match `{}`", compiled.source)),
            ),
            Err(err) => ValidationResult::fail(
                "pattern-invalid",
                format!("invalid pattern `{}`: {err}", compiled.source),
            ),
        })
        .collect()
}

fn format(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let (regex, label) = match ctx.field.field_type() {
        FieldType::Email => (&*EMAIL, "an email address"),
        FieldType::Url => (&*URL, "a URL"),
        FieldType::Tel => (&*TEL, "a phone number"),
        FieldType::Time => (&*TIME, "a time (hh:mm)"),
        _ => return Vec::new(),
    };
    if ctx.is_empty() {
        return Vec::new();
    }
    if regex.is_match(ctx.text.trim()) {
        vec![ValidationResult::pass()]
    } else {
        let message = ctx
            .field
            .validation_options()
            .format_message
            .clone()
            .unwrap_or_else(|| format!("must be {label}"));
        vec![ValidationResult::fail("format", message)]
    }
}

fn expected(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let Some(expected) = ctx.field.expected_value() else {
        return Vec::new();
    };
    if expected.is_null() {
        return Vec::new();
    }
    let wanted = match expected {
        Value::String(text) => text.clone(),
        Value::Number(number) => number
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| number.to_string()),
        other => other.to_string(),
    };
    let actual = match ctx.value {
        Some(FieldValue::Bool(flag)) => flag.to_string(),
        Some(FieldValue::Choice(id)) => id.clone(),
        _ => ctx.text.to_string(),
    };
    let matches = actual == wanted
        || ctx
            .field
            .selected_option()
            .is_some_and(|option| option.value == wanted);
    if matches {
        vec![ValidationResult::pass()]
    } else {
        let message = ctx
            .field
            .validation_options()
            .expected_message
            .clone()
            .unwrap_or_else(|| format!("expected `{wanted}`"));
        vec![ValidationResult::fail("expected", message)]
    }
}

fn schema(ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let Some(schema) = ctx.field.validation_options().schema.as_ref() else {
        return Vec::new();
    };
    if ctx.is_empty() {
        return Vec::new();
    }
    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(err) => {
            return vec![ValidationResult::fail(
                "schema-invalid",
                format!("invalid schema: {err}"),
            )];
        }
    };
    let instance = ctx.value.map(FieldValue::to_json).unwrap_or(Value::Null);
    match validator.iter_errors(&instance).next() {
        None => vec![ValidationResult::pass()],
        Some(error) => vec![ValidationResult::fail("schema", error.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::CompiledPattern;
    use crate::domain::{FieldDescriptor, FieldType, ValidationOptions};
    use crate::form::validation::ValidationResult;
    use crate::form::{Field, FormularOptions};
    use crate::time::ManualClock;
    use crate::tracking::Tracker;

    fn results(descriptor: FieldDescriptor) -> Vec<ValidationResult> {
        let clock = ManualClock::new();
        let options = FormularOptions::default()
            .with_clock(clock.shared())
            .with_tracker(Tracker::new());
        let mut field = Field::new(descriptor, &options).unwrap();
        field.validate();
        field.state().validation_results().to_vec()
    }

    fn codes(results: &[ValidationResult]) -> Vec<&str> {
        results
            .iter()
            .filter_map(|result| result.error_code.as_deref())
            .collect()
    }

    #[test]
    fn unchecked_checkbox_fails_required() {
        let results = results(
            FieldDescriptor::new("1", "agree")
                .with_type(FieldType::Checkbox)
                .with_value(json!(false))
                .with_validation(ValidationOptions::required()),
        );
        assert_eq!(codes(&results), vec!["required"]);
    }

    #[test]
    fn length_and_pattern_each_contribute() {
        let results = results(
            FieldDescriptor::new("1", "code")
                .with_value(json!("ab"))
                .with_validation(
                    ValidationOptions::default()
                        .with_length(Some(3), None)
                        .with_pattern("^[a-z]+$", None),
                ),
        );
        assert_eq!(results.len(), 2);
        assert_eq!(codes(&results), vec!["length"]);
    }

    #[test]
    fn empty_values_only_meet_required() {
        let results = results(
            FieldDescriptor::new("1", "code").with_validation(
                ValidationOptions::default()
                    .with_length(Some(3), None)
                    .with_pattern("^[a-z]+$", None),
            ),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn range_checks_numbers() {
        let results = results(
            FieldDescriptor::new("1", "age")
                .with_type(FieldType::Number)
                .with_value(json!(150))
                .with_validation(ValidationOptions::default().with_range(Some(0.0), Some(120.0))),
        );
        assert_eq!(codes(&results), vec!["range"]);
        assert_eq!(
            results[0].message.as_deref(),
            Some("must be between 0 and 120")
        );
    }

    #[test]
    fn email_format_is_implicit() {
        let bad = results(
            FieldDescriptor::new("1", "mail")
                .with_type(FieldType::Email)
                .with_value(json!("nobody")),
        );
        assert_eq!(codes(&bad), vec!["format"]);
        let good = results(
            FieldDescriptor::new("1", "mail")
                .with_type(FieldType::Email)
                .with_value(json!("ada@example.com")),
        );
        assert_eq!(good, vec![ValidationResult::pass()]);
    }

    #[test]
    fn patterns_compile_with_the_field() {
        let clock = ManualClock::new();
        let options = FormularOptions::default()
            .with_clock(clock.shared())
            .with_tracker(Tracker::new());
        let mut field = Field::new(
            FieldDescriptor::new("1", "code").with_validation(
                ValidationOptions::default()
                    .with_pattern("^[a-z]+$", None)
                    .with_pattern("(", None),
            ),
            &options,
        )
        .unwrap();
        let compiled: Vec<bool> = field
            .state()
            .patterns
            .iter()
            .map(|compiled: &CompiledPattern| compiled.regex.is_ok())
            .collect();
        assert_eq!(compiled, vec![true, false]);

        for text in ["abc", "ABC"] {
            field.set_value(text);
            field.validate();
        }
        assert_eq!(codes(field.state().validation_results()), vec!["pattern", "pattern-invalid"]);
    }

    #[test]
    fn invalid_user_pattern_reports_itself() {
        let results = results(
            FieldDescriptor::new("1", "code")
                .with_value(json!("x"))
                .with_validation(ValidationOptions::default().with_pattern("(", None)),
        );
        assert_eq!(codes(&results), vec!["pattern-invalid"]);
    }

    #[test]
    fn expected_value_compares_string_view() {
        let results = results(
            FieldDescriptor::new("1", "answer")
                .with_type(FieldType::Number)
                .with_value(json!(41))
                .with_expected_value(json!(42)),
        );
        assert_eq!(codes(&results), vec!["expected"]);
    }

    #[test]
    fn schema_fragment_is_enforced() {
        let results = results(
            FieldDescriptor::new("1", "count")
                .with_type(FieldType::Number)
                .with_value(json!(3))
                .with_validation(
                    ValidationOptions::default()
                        .with_schema(json!({"type": "integer", "multipleOf": 2})),
                ),
        );
        assert_eq!(codes(&results), vec!["schema"]);
    }
}
