//! Per-field resolvers for layered Go code
//!
//! Each submodule owns one concern: names, types, tags, conversion
//! expressions, validation calls and imports. [`context::Context`] composes
//! them into the read-only value the renderers consume.

pub mod column;
pub mod context;
pub mod convert;
pub mod imports;
pub mod layer;
pub mod naming;
pub mod tags;
pub mod validate;

pub use context::{Context, ResolvedField, ResolvedMessage, ResolvedMethod};
pub use imports::{Import, ImportResolver, ImportSet};

/// Quote `s` as a Go interpreted string literal
pub(crate) fn go_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && c.is_ascii() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_string_escapes() {
        assert_eq!(go_string("ROLE_"), r#""ROLE_""#);
        assert_eq!(go_string("a\"b\\c\n"), r#""a\"b\\c\n""#);
        assert_eq!(go_string("\u{1}"), r#""\x01""#);
        assert_eq!(go_string("a\u{85}b"), r#""a\u0085b""#);
        assert_eq!(go_string("\u{9f}"), r#""\u009f""#);
        assert_eq!(go_string("café"), r#""café""#);
    }
}
