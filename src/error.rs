use crate::domain::FieldType;

/// Errors surfaced at the crate boundary.
///
/// Only construction and registration return these to callers; the field and
/// form cores otherwise log through the tracker and fall back to safe defaults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormularError {
    #[error("field descriptor is missing required `{0}`")]
    MissingDescriptorField(&'static str),
    #[error("{field}: {message}")]
    Coercion { field: String, message: String },
    #[error("{field}: no option matches `{key}`")]
    OptionNotFound { field: String, key: String },
    #[error("no value strategy handles field type `{0}`")]
    NoValueStrategy(FieldType),
    #[error("form `{0}` is already registered")]
    DuplicateForm(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

impl FormularError {
    pub(crate) fn coercion(field: &str, message: impl Into<String>) -> Self {
        Self::Coercion {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = FormularError> = std::result::Result<T, E>;
