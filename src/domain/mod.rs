mod descriptor;
mod validation;

pub use descriptor::{
    BatchDescriptor, FieldDescriptor, FieldOption, FieldType, FormDescriptor, OptionsDescriptor,
    ValueCategory,
};
pub use validation::{LengthRule, PatternRule, RangeRule, RequiredRule, ValidationOptions};
