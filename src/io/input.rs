use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::DocumentFormat;
use crate::domain::FormDescriptor;

/// Parse structured data in any supported format into a `serde_json::Value`.
pub fn parse_document_str(contents: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str::<Value>(contents).with_context(|| "failed to parse JSON document")
        }
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => {
            serde_yaml::from_str::<Value>(contents).with_context(|| "failed to parse YAML document")
        }
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => toml::from_str::<toml::Table>(contents)
            .with_context(|| "failed to parse TOML document")
            .and_then(|value| {
                serde_json::to_value(value).context("failed to convert TOML to JSON")
            }),
    }
}

/// Parse a form document into a [`FormDescriptor`].
pub fn load_form_descriptor(contents: &str, format: DocumentFormat) -> Result<FormDescriptor> {
    let value = parse_document_str(contents, format)?;
    serde_json::from_value(value).with_context(|| format!("invalid {format} form descriptor"))
}

/// Read and parse a form document, picking the format from the extension.
pub fn load_form_descriptor_file(path: &Path) -> Result<FormDescriptor> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read form descriptor {}", path.display()))?;
    load_form_descriptor(&contents, DocumentFormat::from_path(path))
        .with_context(|| format!("while loading {}", path.display()))
}

/// JSON Schema describing the form descriptor document format.
pub fn descriptor_schema() -> Value {
    let schema = schemars::schema_for!(FormDescriptor);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}
