//! Build script for protoc-gen-strata
//!
//! This compiles proto/strata/options.proto to generate the Rust types
//! for the `(strata.field)`, `(strata.message)` and `(strata.method)` extensions.

use std::io::Result;

fn main() -> Result<()> {
    prost_build::Config::new().compile_protos(&["proto/strata/options.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/strata/options.proto");

    Ok(())
}
