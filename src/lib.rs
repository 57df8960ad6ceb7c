//! protoc-gen-strata library
//!
//! This crate provides the code generation logic for deriving layered Go
//! types (domain, inbound and outbound) and the conversions between them from
//! Protocol Buffer wire messages.

#![deny(warnings)]
#![deny(missing_docs)]

pub mod codegen;
pub mod generator;
pub mod options;
pub mod render;
pub mod schema;
pub mod settings;
pub mod types;

use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use thiserror::Error;

/// Errors that can occur during code generation
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Failed to parse protobuf options/extensions
    #[error("Failed to parse options: {0}")]
    OptionsParseError(String),

    /// Encountered an unknown or unsupported field type
    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    /// Invalid plugin configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// General code generation failure
    #[error("Code generation failed: {0}")]
    CodeGenError(String),

    /// Failed to decode protobuf message
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Malformed or unresolvable descriptor reference
    #[error("Schema error in {message}: {reason}")]
    Schema {
        /// Offending message, field or method
        message: String,
        /// What is wrong with it
        reason: String,
    },

    /// Annotations on a field that contradict each other or the field's type
    #[error("Invalid annotation on {field}: {reason}")]
    Annotation {
        /// Offending field, as `Message.field`
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A rule, converter or package that could not be resolved
    #[error("Lookup failed: {0}")]
    Lookup(String),
}

impl GeneratorError {
    pub(crate) fn schema(message: impl Into<String>, reason: impl Into<String>) -> Self {
        GeneratorError::Schema {
            message: message.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn annotation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GeneratorError::Annotation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Generate layered Go code from a protobuf CodeGeneratorRequest
///
/// This is the main entry point for the code generator. Custom options are
/// read from `uninterpreted_option` only; use [`generate_from_bytes`] to keep
/// extension data.
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate(request)
}

/// Generate layered Go code from raw protobuf bytes
///
/// This entry point preserves extension data by using prost-reflect for decoding.
pub fn generate_from_bytes(bytes: &[u8]) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate_from_bytes(bytes, false)
}

/// Like [`generate_from_bytes`], forcing debug logging on when `debug` is set
pub fn generate_from_bytes_with_debug(
    bytes: &[u8],
    debug: bool,
) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate_from_bytes(bytes, debug)
}
