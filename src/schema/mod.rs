//! Schema inference module
//!
//! Infers what the records of a test read look like.
//!
//! # Features
//!
//! - **Type Inference**: type unions per field, integers widened to number
//! - **Nullable Detection**: fields missing from some records become nullable
//! - **Nested Object Support**: objects and array items recurse
//! - **Datetime Formats**: the strftime format every value of a field parses with

mod datetime;
mod inference;
mod types;

pub use datetime::DatetimeFormatInferrer;
pub use inference::{infer_schema, SchemaInferrer};
pub use types::{FieldSchema, JsonType, SCHEMA_DRAFT};

#[cfg(test)]
mod tests;
