//! Rust cross-translation of the domain layer
//!
//! Builds serde-derived structs with `quote` and pretty-prints them with
//! `prettyplease`.

use super::TemplateSpec;
use crate::codegen::context::{Context, ResolvedField};
use crate::types::{RustRenderer, TypeRef, TypeRenderer};
use crate::GeneratorError;
use heck::ToSnakeCase;
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try", "typeof",
    "unsized", "virtual", "yield",
];

/// `rust/domain`: one serde struct per domain message
pub fn render_domain(ctx: &Context, _spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut items = Vec::new();
    for message in ctx.domain_messages() {
        let name = format_ident!("{}", message.message.names.domain);
        let fields = message
            .fields
            .iter()
            .filter_map(|f| f.domain.as_ref().map(|d| (f, &d.ty)))
            .map(|(f, ty)| field_tokens(f, ty))
            .collect::<Result<Vec<_>, _>>()?;

        let doc = format!(
            " Domain form of `{}`.",
            message.message.names.wire
        );
        items.push(quote! {
            #[doc = #doc]
            #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
            pub struct #name {
                #(#fields),*
            }
        });
    }

    let tokens = quote! { #(#items)* };
    let file: syn::File = syn::parse2(tokens)
        .map_err(|e| GeneratorError::CodeGenError(format!("rust/domain: {}", e)))?;

    Ok(format!(
        "// Code generated by protoc-gen-strata. DO NOT EDIT.\n// source: {}\n\n{}",
        ctx.file_name,
        prettyplease::unparse(&file)
    ))
}

fn field_tokens(field: &ResolvedField, ty: &TypeRef) -> Result<TokenStream, GeneratorError> {
    let ident = field_ident(&field.names.domain);
    let rendered = RustRenderer.render(ty);
    let rust_type: syn::Type = syn::parse_str(&rendered).map_err(|e| {
        GeneratorError::CodeGenError(format!(
            "{}: cannot render `{}` as a Rust type: {}",
            field.field.path(),
            rendered,
            e
        ))
    })?;

    let key = &field.keys.domain;
    let allow_empty = field
        .field
        .options
        .domain
        .as_ref()
        .is_some_and(|d| d.allow_empty);

    let serde = if ty.is_pointer() && !allow_empty {
        quote! { #[serde(rename = #key, default, skip_serializing_if = "Option::is_none")] }
    } else {
        quote! { #[serde(rename = #key, default)] }
    };

    Ok(quote! {
        #serde
        pub #ident: #rust_type
    })
}

/// Snake-case field identifier, raw when it collides with a keyword
fn field_ident(name: &str) -> Ident {
    let snake = name.to_snake_case();
    match snake.as_str() {
        // `self`, `super` and `crate` cannot be raw identifiers
        "self" | "super" | "crate" | "Self" => format_ident!("{}_", snake),
        s if RUST_KEYWORDS.contains(&s) => Ident::new_raw(s, Span::call_site()),
        _ => format_ident!("{}", snake),
    }
}
