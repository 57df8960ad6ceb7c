//! Go templates
//!
//! Output is laid out the way gofmt would print it: tabs for indentation,
//! spaces to align struct fields and composite literal values.

use super::TemplateSpec;
use crate::codegen::context::{Context, ResolvedMessage};
use crate::codegen::{go_string, Import};
use crate::GeneratorError;
use heck::ToLowerCamelCase;
use std::collections::BTreeSet;

const GO_KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// A Go source file being assembled
struct GoFile {
    out: String,
}

impl GoFile {
    fn new(ctx: &Context, package: &str, imports: &[Import]) -> Self {
        let mut out = String::new();
        out.push_str("// Code generated by protoc-gen-strata. DO NOT EDIT.\n");
        out.push_str(&format!("// source: {}\n\n", ctx.file_name));
        out.push_str(&format!("package {}\n", package));
        if !imports.is_empty() {
            out.push_str("\nimport (\n");
            for import in imports {
                out.push_str(&format!("\t{}\n", import.render()));
            }
            out.push_str(")\n");
        }
        Self { out }
    }

    fn line(&mut self, depth: usize, text: &str) {
        if !text.is_empty() {
            for _ in 0..depth {
                self.out.push('\t');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn rows(&mut self, depth: usize, rows: &[Vec<String>]) {
        for row in aligned(rows) {
            self.line(depth, &row);
        }
    }

    /// `type Name struct { ... }`
    fn type_struct(&mut self, doc: &str, name: &str, fields: &[Vec<String>]) {
        self.blank();
        self.line(0, doc);
        if fields.is_empty() {
            self.line(0, &format!("type {} struct{{}}", name));
            return;
        }
        self.line(0, &format!("type {} struct {{", name));
        self.rows(1, fields);
        self.line(0, "}");
    }

    /// Nil-safe conversion method returning a composite literal
    fn conversion(
        &mut self,
        doc: &str,
        receiver: (&str, &str),
        method: &str,
        target: &str,
        values: &[Vec<String>],
    ) {
        let (var, ty) = receiver;
        self.blank();
        self.line(0, doc);
        self.line(0, &format!("func ({} *{}) {}() *{} {{", var, ty, method, target));
        self.line(1, &format!("if {} == nil {{", var));
        self.line(2, "return nil");
        self.line(1, "}");
        self.composite_return(1, target, values);
        self.line(0, "}");
    }

    fn composite_return(&mut self, depth: usize, target: &str, values: &[Vec<String>]) {
        if values.is_empty() {
            self.line(depth, &format!("return &{}{{}}", target));
            return;
        }
        self.line(depth, &format!("return &{}{{", target));
        self.rows(depth + 1, values);
        self.line(depth, "}");
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Pad every column but the last to a common width
fn aligned(rows: &[Vec<String>]) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(row.len().saturating_sub(1)) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                line.push_str(cell);
                if i + 1 < row.len() {
                    let pad = widths[i] - cell.chars().count() + 1;
                    line.push_str(&" ".repeat(pad));
                }
            }
            line
        })
        .collect()
}

/// `key: value,` rows of a composite literal
fn literal_row(key: &str, value: &str) -> Vec<String> {
    vec![format!("{}:", key), format!("{},", value)]
}

fn open(ctx: &Context, spec: &TemplateSpec) -> GoFile {
    GoFile::new(
        ctx,
        &ctx.module.go_name,
        ctx.template_imports(spec.group, spec.name),
    )
}

/// `go/enum`: string helpers for every enum
pub fn render_enums(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut file = open(ctx, spec);
    for e in &ctx.enums {
        file.blank();
        file.line(0, &format!("// {}ToString returns the protobuf name of v.", e.name));
        file.line(0, &format!("func {}ToString(v {}) string {{", e.name, e.name));
        file.line(1, "return v.String()");
        file.line(0, "}");
        file.blank();
        file.line(
            0,
            &format!(
                "// {}FromString parses a protobuf name; unknown names yield the zero value.",
                e.name
            ),
        );
        file.line(0, &format!("func {}FromString(s string) {} {{", e.name, e.name));
        file.line(1, &format!("return {}({}_value[s])", e.name, e.name));
        file.line(0, "}");
    }
    Ok(file.finish())
}

/// `go/domain`: domain structs plus custom code blocks
pub fn render_domain(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut file = open(ctx, spec);
    for message in ctx.domain_messages() {
        let names = &message.message.names;
        let fields: Vec<Vec<String>> = message
            .fields
            .iter()
            .filter_map(|f| {
                let domain = f.domain.as_ref()?;
                Some(vec![
                    f.names.domain.clone(),
                    domain.go.clone(),
                    format!("`{}`", f.tags.domain),
                ])
            })
            .collect();
        file.type_struct(
            &format!("// {} is the domain form of {}.", names.domain, names.wire),
            &names.domain,
            &fields,
        );
        for block in &message.message.options.custom_code {
            file.blank();
            for line in block.trim_end().lines() {
                file.line(0, line.trim_end());
            }
        }
    }
    Ok(file.finish())
}

/// `go/domain_convert`: `IntoDomain` and `IntoWire`
pub fn render_domain_convert(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut file = open(ctx, spec);
    for message in ctx.domain_messages() {
        let names = &message.message.names;
        let into_domain = rows(message, |f| {
            Some(literal_row(&f.names.domain, f.conversions.into_domain.as_deref()?))
        });
        file.conversion(
            "// IntoDomain converts w into its domain form.",
            ("w", names.wire.as_str()),
            "IntoDomain",
            &names.domain,
            &into_domain,
        );

        let into_wire = rows(message, |f| {
            Some(literal_row(&f.field.go_name, f.conversions.into_wire.as_deref()?))
        });
        file.conversion(
            "// IntoWire converts d into its wire form.",
            ("d", names.domain.as_str()),
            "IntoWire",
            &names.wire,
            &into_wire,
        );
    }
    Ok(file.finish())
}

/// `go/outbound`: outbound structs and `IntoOutboundOrNil`
pub fn render_outbound(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut file = open(ctx, spec);
    for message in ctx.outbound_messages() {
        let names = &message.message.names;
        let fields: Vec<Vec<String>> = message
            .outbound_fields()
            .filter_map(|f| {
                let outbound = f.outbound.as_ref()?;
                Some(vec![
                    f.names.outbound.clone(),
                    outbound.go.clone(),
                    format!("`{}`", f.tags.outbound),
                ])
            })
            .collect();
        file.type_struct(
            &format!("// {} is the response form of {}.", names.outbound, names.wire),
            &names.outbound,
            &fields,
        );

        let values = rows(message, |f| {
            Some(literal_row(&f.names.outbound, f.conversions.into_outbound.as_deref()?))
        });
        file.conversion(
            "// IntoOutboundOrNil converts w into its response form, or nil when w is nil.",
            ("w", names.wire.as_str()),
            "IntoOutboundOrNil",
            &names.outbound,
            &values,
        );
    }
    Ok(file.finish())
}

/// `go/inbound`: inbound structs, `Validate` and `IntoWireInput`
pub fn render_inbound(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut file = open(ctx, spec);
    for message in ctx.inbound_messages() {
        let names = &message.message.names;
        let fields: Vec<Vec<String>> = message
            .fields
            .iter()
            .filter_map(|f| {
                let inbound = f.inbound.as_ref()?;
                Some(vec![
                    f.names.domain.clone(),
                    inbound.go.clone(),
                    format!("`{}`", f.tags.inbound),
                ])
            })
            .collect();
        file.type_struct(
            &format!("// {} is the decoded form of {}.", names.inbound, names.wire),
            &names.inbound,
            &fields,
        );

        file.blank();
        file.line(0, "// Validate checks in against its declared rules.");
        file.line(0, &format!("func (in *{}) Validate() error {{", names.inbound));
        let calls: Vec<&str> = message.validations().map(|v| v.expression.as_str()).collect();
        if calls.is_empty() {
            file.line(1, "return nil");
        } else {
            file.line(1, "return validation.ValidateStruct(in,");
            for call in calls {
                file.line(2, &format!("{},", call));
            }
            file.line(1, ")");
        }
        file.line(0, "}");

        let values = rows(message, |f| {
            Some(literal_row(&f.field.go_name, f.conversions.into_wire_input.as_deref()?))
        });
        file.conversion(
            "// IntoWireInput converts in into its wire form.",
            ("in", names.inbound.as_str()),
            "IntoWireInput",
            &names.wire,
            &values,
        );
    }
    Ok(file.finish())
}

/// `go/http`: route patterns, auth modes and request decoders
pub fn render_http(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let mut file = open(ctx, spec);
    for resolved in &ctx.methods {
        let method = &resolved.method;
        let qualified = format!("{}.{}", resolved.service, method.name);

        file.blank();
        file.line(
            0,
            &format!("// {}Pattern is the route pattern of {}.", method.name, qualified),
        );
        file.line(
            0,
            &format!("const {}Pattern = {}", method.name, go_string(&resolved.pattern)),
        );
        file.blank();
        file.line(
            0,
            &format!("// {}Auth is the authentication mode of {}.", method.name, qualified),
        );
        file.line(
            0,
            &format!("const {}Auth = {}", method.name, go_string(&method.auth.as_label())),
        );

        file.blank();
        file.line(
            0,
            &format!("// Decode{} reads a {} from r.", method.name, resolved.inbound),
        );
        file.line(
            0,
            &format!(
                "func Decode{}(r *http.Request) (*{}, error) {{",
                method.name, resolved.inbound
            ),
        );
        file.line(1, &format!("in := &{}{{}}", resolved.inbound));
        for statement in resolved.body.iter().chain(&resolved.params) {
            file.line(1, &format!("if err := {}; err != nil {{", statement));
            file.line(2, "return nil, err");
            file.line(1, "}");
        }
        file.line(1, "return in, nil");
        file.line(0, "}");
    }
    Ok(file.finish())
}

/// `go/fixtures`: domain constructors for the external test package
pub fn render_fixtures(ctx: &Context, spec: &TemplateSpec) -> Result<String, GeneratorError> {
    let imports = ctx.template_imports(spec.group, spec.name);
    let qualifiers: BTreeSet<String> = imports
        .iter()
        .map(|i| {
            i.alias
                .clone()
                .unwrap_or_else(|| i.name.rsplit('/').next().unwrap_or(&i.name).to_string())
        })
        .collect();

    let package = &ctx.module.go_name;
    let mut file = GoFile::new(ctx, &format!("{}_test", package), imports);
    for message in ctx.domain_messages() {
        let domain = &message.message.names.domain;
        let target = format!("{}.{}", package, domain);

        let mut params = Vec::new();
        let mut values = Vec::new();
        for field in &message.fields {
            let Some(ty) = field.fixture.as_ref() else {
                continue;
            };
            let param = param_name(&field.names.domain, &qualifiers);
            params.push(format!("{} {}", param, ty));
            values.push(literal_row(&field.names.domain, &param));
        }

        file.blank();
        file.line(0, &format!("// New{} builds a {} for tests.", domain, target));
        file.line(
            0,
            &format!("func New{}({}) *{} {{", domain, params.join(", "), target),
        );
        file.composite_return(1, &target, &values);
        file.line(0, "}");
    }
    Ok(file.finish())
}

/// Rows for every field `row` yields one for
fn rows<F>(message: &ResolvedMessage, row: F) -> Vec<Vec<String>>
where
    F: Fn(&crate::codegen::ResolvedField) -> Option<Vec<String>>,
{
    message.fields.iter().filter_map(row).collect()
}

/// Parameter identifier for a field, clear of keywords and package names
fn param_name(field: &str, qualifiers: &BTreeSet<String>) -> String {
    let name = field.to_lower_camel_case();
    if GO_KEYWORDS.contains(&name.as_str()) || qualifiers.contains(&name) {
        format!("{}_", name)
    } else {
        name
    }
}
