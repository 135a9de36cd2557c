mod field;
mod options;
mod registry;
mod state;
pub mod validation;
pub mod values;

pub use field::{
    AfterValidationHook, BeforeValidationHook, DomElement, DomManager, Drawer, Field, FieldCore,
    FieldFlags, FieldSnapshot, FieldState, FieldValue, MemoryDom, OpenState, StyleFlags,
};
pub use options::FormularOptions;
pub use registry::FormRegistry;
pub use state::{FormFlags, FormSnapshot, Formular, SubmitOutcome};
pub use validation::{
    ValidationContext, ValidationManager, ValidationResult, ValidationStrategy, ValidationSummary,
};
pub use values::{ValueManager, ValueProperty, ValuePurpose, ValueStrategy};
