use chrono::NaiveDate;
use serde_json::{Number, Value};

pub(crate) const DATE_FORMAT: &str = "%Y/%m/%d";
const DATE_INPUT_FORMATS: [&str; 2] = [DATE_FORMAT, "%Y-%m-%d"];

pub(crate) fn parse_date(contents: &str) -> Option<NaiveDate> {
    let trimmed = contents.trim();
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_number(contents: &str) -> Option<f64> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

pub(crate) fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

pub(crate) fn number_to_json(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        Value::from(number as i64)
    } else {
        Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub(crate) fn parse_bool(contents: &str) -> Option<bool> {
    match contents.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" | "checked" => Some(true),
        "false" | "0" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}
