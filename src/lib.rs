#![deny(rust_2018_idioms)]
//! Framework-agnostic form state: fields that translate native events into
//! typed notifications, debounce their validation and keep dirty/valid flags
//! consistent, aggregated into forms.
//!
//! Nothing here runs timers on its own. Every time-dependent piece reads an
//! injected [`Clock`] and the host performs due work with `tick()`, using
//! `next_deadline()` to know when.

pub mod domain;
pub mod error;
pub mod events;
pub mod form;
pub mod io;
pub mod notify;
pub mod time;
pub mod tracking;

pub use domain::{FieldDescriptor, FieldOption, FieldType, FormDescriptor, ValidationOptions};
pub use error::{FormularError, Result};
pub use events::{Event, EventTag, Payload, create_event};
pub use form::{
    Field, FieldValue, FormRegistry, FormSnapshot, Formular, FormularOptions, SubmitOutcome,
    ValidationManager, ValueManager, ValuePurpose,
};
pub use io::{
    DocumentFormat, OutputDestination, OutputOptions, descriptor_schema, load_form_descriptor,
    load_form_descriptor_file, parse_document_str,
};
pub use notify::{NotificationManager, Notifier, ObservableSubject};
pub use time::{Clock, ManualClock, SharedClock, SystemClock};
pub use tracking::{Severity, Tracker};

pub mod prelude {
    pub use super::{
        EventTag, Field, FieldDescriptor, FieldType, FieldValue, FormDescriptor, Formular,
        FormularOptions, ManualClock, Payload, SubmitOutcome, Tracker, ValidationOptions,
    };
}
