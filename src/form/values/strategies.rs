use super::{ValuePurpose, ValueProperty, ValueStrategy};
use crate::domain::{FieldOption, ValueCategory};
use crate::error::{FormularError, Result};
use crate::form::field::FieldState;
use crate::form::field::FieldValue;
use crate::form::field::convert::{format_date, format_number, parse_bool, parse_date, parse_number};

pub fn default_value_strategies() -> Vec<ValueStrategy> {
    vec![
        ValueStrategy::for_category(
            "boolean",
            ValueCategory::Boolean,
            ValueProperty::Checked,
            get_boolean,
            set_boolean,
        ),
        ValueStrategy::for_category(
            "string",
            ValueCategory::String,
            ValueProperty::Value,
            get_string,
            set_string,
        ),
        ValueStrategy::for_category(
            "numeric",
            ValueCategory::Numeric,
            ValueProperty::Value,
            get_numeric,
            set_numeric,
        ),
        ValueStrategy::for_category(
            "date",
            ValueCategory::Date,
            ValueProperty::Value,
            get_date,
            set_date,
        ),
        ValueStrategy::for_category(
            "option",
            ValueCategory::Option,
            ValueProperty::SelectedOption,
            get_option,
            set_option,
        ),
    ]
}

fn get_boolean(field: &FieldState, _purpose: ValuePurpose) -> Option<FieldValue> {
    Some(FieldValue::Bool(field.value.as_bool().unwrap_or(false)))
}

fn set_boolean(field: &mut FieldState, value: FieldValue) -> Result<()> {
    let flag = match value {
        FieldValue::Bool(flag) => flag,
        FieldValue::Empty => false,
        FieldValue::Number(number) => number != 0.0,
        FieldValue::Text(text) => parse_bool(&text)
            .ok_or_else(|| FormularError::coercion(&field.id, format!("`{text}` is not a boolean")))?,
        other => {
            return Err(FormularError::coercion(
                &field.id,
                format!("`{other}` is not a boolean"),
            ));
        }
    };
    field.value = FieldValue::Bool(flag);
    Ok(())
}

fn get_string(field: &FieldState, _purpose: ValuePurpose) -> Option<FieldValue> {
    Some(match &field.value {
        FieldValue::Text(text) => FieldValue::Text(text.clone()),
        FieldValue::Empty => FieldValue::Text(String::new()),
        other => FieldValue::Text(other.to_string()),
    })
}

fn set_string(field: &mut FieldState, value: FieldValue) -> Result<()> {
    field.value = match value {
        FieldValue::Empty => FieldValue::Text(String::new()),
        FieldValue::Text(text) => FieldValue::Text(text),
        other => FieldValue::Text(other.to_string()),
    };
    Ok(())
}

fn get_numeric(field: &FieldState, purpose: ValuePurpose) -> Option<FieldValue> {
    match (&field.value, purpose) {
        (FieldValue::Number(number), ValuePurpose::Display) => {
            Some(FieldValue::Text(format_number(*number)))
        }
        (FieldValue::Number(number), _) => Some(FieldValue::Number(*number)),
        (_, ValuePurpose::Display) => Some(FieldValue::Text(String::new())),
        _ => Some(FieldValue::Empty),
    }
}

fn set_numeric(field: &mut FieldState, value: FieldValue) -> Result<()> {
    field.value = match value {
        FieldValue::Number(number) if number.is_finite() => FieldValue::Number(number),
        FieldValue::Empty => FieldValue::Empty,
        FieldValue::Text(text) if text.trim().is_empty() => FieldValue::Empty,
        FieldValue::Text(text) => parse_number(&text)
            .map(FieldValue::Number)
            .ok_or_else(|| FormularError::coercion(&field.id, format!("`{text}` is not a number")))?,
        other => {
            return Err(FormularError::coercion(
                &field.id,
                format!("`{other}` is not a number"),
            ));
        }
    };
    Ok(())
}

fn get_date(field: &FieldState, purpose: ValuePurpose) -> Option<FieldValue> {
    match (&field.value, purpose) {
        (FieldValue::Date(date), ValuePurpose::Display | ValuePurpose::Submission) => {
            Some(FieldValue::Text(format_date(*date)))
        }
        (FieldValue::Date(date), _) => Some(FieldValue::Date(*date)),
        _ => Some(FieldValue::Empty),
    }
}

fn set_date(field: &mut FieldState, value: FieldValue) -> Result<()> {
    field.value = match value {
        FieldValue::Date(date) => FieldValue::Date(date),
        FieldValue::Empty => FieldValue::Empty,
        FieldValue::Text(text) if text.trim().is_empty() => FieldValue::Empty,
        FieldValue::Text(text) => parse_date(&text).map(FieldValue::Date).ok_or_else(|| {
            FormularError::coercion(&field.id, format!("`{text}` is not a yyyy/mm/dd date"))
        })?,
        other => {
            return Err(FormularError::coercion(
                &field.id,
                format!("`{other}` is not a date"),
            ));
        }
    };
    Ok(())
}

fn get_option(field: &FieldState, purpose: ValuePurpose) -> Option<FieldValue> {
    let Some(option) = field.selected_option() else {
        return Some(FieldValue::Empty);
    };
    Some(match purpose {
        ValuePurpose::Display => FieldValue::Text(option.text.clone()),
        ValuePurpose::Submission => FieldValue::Text(option.value.clone()),
        ValuePurpose::Validation | ValuePurpose::All => FieldValue::Choice(option.id.clone()),
    })
}

fn set_option(field: &mut FieldState, value: FieldValue) -> Result<()> {
    let resolved = match &value {
        FieldValue::Empty => None,
        FieldValue::Text(key) if key.is_empty() => None,
        FieldValue::Choice(key) | FieldValue::Text(key) => Some(resolve_option(field, key)?),
        FieldValue::Number(number) => {
            let key = format_number(*number);
            Some(resolve_option(field, &key)?)
        }
        other => {
            return Err(FormularError::OptionNotFound {
                field: field.id.clone(),
                key: other.to_string(),
            });
        }
    };
    match resolved {
        Some((id, sequence_id)) => {
            field.value = FieldValue::Choice(id);
            field.selected_option_id = Some(sequence_id);
        }
        None => {
            field.value = FieldValue::Empty;
            field.selected_option_id = None;
        }
    }
    Ok(())
}

/// Looks the key up as an option id, then value, then sequence id.
fn resolve_option(field: &FieldState, key: &str) -> Result<(String, usize)> {
    let found: Option<&FieldOption> = field
        .option_by_id(key)
        .or_else(|| field.option_by_value(key))
        .or_else(|| {
            key.parse::<usize>()
                .ok()
                .and_then(|sequence_id| field.option_by_sequence_id(sequence_id))
        });
    found
        .map(|option| (option.id.clone(), option.sequence_id))
        .ok_or_else(|| FormularError::OptionNotFound {
            field: field.id.clone(),
            key: key.to_string(),
        })
}
