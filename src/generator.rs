//! Main code generator logic
//!
//! Drives one plugin invocation: settings from the parameter, then per file
//! to generate schema → context → rendered templates. Logging goes to stderr
//! for the duration of the run only.

use crate::codegen::Context;
use crate::options::{build_descriptor_pool, OptionsIndex, RawCodeGeneratorRequest};
use crate::render;
use crate::schema::Schema;
use crate::settings::Settings;
use crate::GeneratorError;
use prost::Message;
use prost_types::compiler::code_generator_response::Feature;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use tracing::{debug, Level};

/// Generate from an already decoded request
///
/// Extension data is lost when decoding into `prost_types`, so custom options
/// are only read from `uninterpreted_option` here.
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, GeneratorError> {
    generate_with_options(request, &OptionsIndex::default(), false)
}

/// Generate from the raw request bytes, keeping extension data
pub fn generate_from_bytes(
    bytes: &[u8],
    debug: bool,
) -> Result<CodeGeneratorResponse, GeneratorError> {
    let raw = RawCodeGeneratorRequest::decode(bytes)
        .map_err(|e| GeneratorError::DecodeError(format!("CodeGeneratorRequest: {}", e)))?;
    let pool = build_descriptor_pool(&raw.proto_file)?;
    let index = OptionsIndex::from_pool(&pool)?;

    let request = CodeGeneratorRequest::decode(bytes)
        .map_err(|e| GeneratorError::DecodeError(format!("CodeGeneratorRequest: {}", e)))?;
    generate_with_options(request, &index, debug)
}

/// Generate with custom options taken from `index`
///
/// `debug` forces debug logging on regardless of the `debug` parameter.
pub fn generate_with_options(
    request: CodeGeneratorRequest,
    index: &OptionsIndex,
    debug: bool,
) -> Result<CodeGeneratorResponse, GeneratorError> {
    let mut settings = Settings::from_parameter(request.parameter.as_deref())?;
    settings.debug |= debug;

    let level = if settings.debug {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || run(&request, index, &settings))
}

fn run(
    request: &CodeGeneratorRequest,
    index: &OptionsIndex,
    settings: &Settings,
) -> Result<CodeGeneratorResponse, GeneratorError> {
    if request.file_to_generate.is_empty() {
        return Err(GeneratorError::CodeGenError(
            "request names no files to generate".to_string(),
        ));
    }
    debug!(
        files = request.file_to_generate.len(),
        options = index.len(),
        "starting generation"
    );

    let mut files = Vec::new();
    for name in &request.file_to_generate {
        let file = request
            .proto_file
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| {
                GeneratorError::schema(name, "file to generate is missing from the request")
            })?;

        let schema = Schema::load(file, &request.proto_file, index, settings)?;
        let context = Context::build(&schema, settings)?;
        let rendered = render::render_all(&context)?;
        debug!(file = %name, outputs = rendered.len(), "generated");
        files.extend(rendered);
    }

    Ok(CodeGeneratorResponse {
        file: files,
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    })
}
