//! protoc-gen-strata - A protoc plugin for generating layered Go types
//!
//! This binary reads a CodeGeneratorRequest from stdin and writes a
//! CodeGeneratorResponse to stdout, following the protoc plugin protocol.

use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;
use std::io::{self, Read, Write};

fn main() {
    if let Err(e) = run() {
        eprintln!("protoc-gen-strata: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;

    // STRATA_DEBUG turns on debug logging in addition to the `debug` parameter
    let debug = std::env::var_os("STRATA_DEBUG").is_some();

    let response = protoc_gen_strata::generate_from_bytes_with_debug(&buf, debug)
        .unwrap_or_else(|e| CodeGeneratorResponse {
            error: Some(e.to_string()),
            ..Default::default()
        });

    let mut out = Vec::new();
    response.encode(&mut out)?;
    io::stdout().write_all(&out)?;

    Ok(())
}
