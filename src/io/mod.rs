//! Document loading and output for form descriptors and snapshots.

mod format;
mod input;
mod output;

pub use format::DocumentFormat;
pub use input::{
    descriptor_schema, load_form_descriptor, load_form_descriptor_file, parse_document_str,
};
pub use output::{OutputDestination, OutputOptions, emit, render};
