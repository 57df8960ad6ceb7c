//! Template registry and rendering
//!
//! Templates are registered statically, keyed by `(group, name)`. Addons are
//! entries of a static table enabled by name through the `addons` parameter;
//! they only contribute templates, never code loaded at runtime.

pub mod go;
pub mod rust;

use crate::codegen::context::{Context, ImportScope};
use crate::settings::Settings;
use crate::GeneratorError;
use prost_types::compiler::code_generator_response::File;
use tracing::debug;

/// Renders one template against a context
pub type RenderFn = fn(&Context, &TemplateSpec) -> Result<String, GeneratorError>;

/// Decides whether a template has anything to render
pub type GateFn = fn(&Context) -> bool;

/// One registered template
pub struct TemplateSpec {
    /// Target language group, `go` or `rust`
    pub group: &'static str,
    /// Template name, unique within its group
    pub name: &'static str,
    /// Addon that must be enabled, if any
    pub addon: Option<&'static str>,
    /// Gate; templates without one only run with `strict=false`
    pub gate: Option<GateFn>,
    /// Where the template's imports are computed from
    pub scope: ImportScope,
    /// Qualifiers imported regardless of the context
    pub static_imports: &'static [&'static str],
    /// Renderer
    pub render: RenderFn,
}

impl TemplateSpec {
    /// Whether the template can run under `settings` at all
    pub fn available(&self, settings: &Settings) -> bool {
        match self.addon {
            Some(addon) => settings.addon_enabled(addon),
            None => true,
        }
    }

    /// Output path for a proto file, e.g. `acme/user.domain.strata.go`
    pub fn output_name(&self, proto_file: &str) -> String {
        let stem = proto_file.strip_suffix(".proto").unwrap_or(proto_file);
        match (self.group, self.scope) {
            ("rust", _) => format!("{}_{}.rs", stem, self.name),
            (_, ImportScope::Fixtures) => format!("{}.{}.strata_test.go", stem, self.name),
            _ => format!("{}.{}.strata.go", stem, self.name),
        }
    }
}

impl std::fmt::Debug for TemplateSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSpec")
            .field("group", &self.group)
            .field("name", &self.name)
            .field("addon", &self.addon)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

/// Every template, in output order
pub static TEMPLATES: &[TemplateSpec] = &[
    TemplateSpec {
        group: "go",
        name: "enum",
        addon: None,
        gate: Some(has_enums),
        scope: ImportScope::None,
        static_imports: &[],
        render: go::render_enums,
    },
    TemplateSpec {
        group: "go",
        name: "domain",
        addon: None,
        gate: Some(has_domain),
        scope: ImportScope::Domain,
        static_imports: &[],
        render: go::render_domain,
    },
    TemplateSpec {
        group: "go",
        name: "domain_convert",
        addon: None,
        gate: Some(has_domain),
        scope: ImportScope::DomainConvert,
        static_imports: &[],
        render: go::render_domain_convert,
    },
    TemplateSpec {
        group: "go",
        name: "outbound",
        addon: None,
        gate: Some(has_outbound),
        scope: ImportScope::Outbound,
        static_imports: &[],
        render: go::render_outbound,
    },
    TemplateSpec {
        group: "go",
        name: "inbound",
        addon: None,
        gate: Some(has_inbound),
        scope: ImportScope::Inbound,
        static_imports: &[],
        render: go::render_inbound,
    },
    TemplateSpec {
        group: "go",
        name: "http",
        addon: None,
        gate: Some(has_http),
        scope: ImportScope::Http,
        static_imports: &[],
        render: go::render_http,
    },
    TemplateSpec {
        group: "rust",
        name: "domain",
        addon: Some("rust"),
        gate: Some(has_domain),
        scope: ImportScope::None,
        static_imports: &[],
        render: rust::render_domain,
    },
    TemplateSpec {
        group: "go",
        name: "fixtures",
        addon: Some("fixtures"),
        gate: None,
        scope: ImportScope::Fixtures,
        static_imports: &[],
        render: go::render_fixtures,
    },
];

fn has_enums(ctx: &Context) -> bool {
    !ctx.enums.is_empty()
}

fn has_domain(ctx: &Context) -> bool {
    ctx.domain_messages().next().is_some()
}

fn has_outbound(ctx: &Context) -> bool {
    ctx.outbound_messages().next().is_some()
}

fn has_inbound(ctx: &Context) -> bool {
    ctx.inbound_messages().next().is_some()
}

fn has_http(ctx: &Context) -> bool {
    !ctx.methods.is_empty()
}

/// A statically registered addon
#[derive(Debug)]
pub struct AddonDescriptor {
    /// Name used in the `addons` parameter
    pub name: &'static str,
    /// What the addon contributes
    pub capabilities: &'static [&'static str],
    /// Templates it enables, as `(group, name)`
    pub templates: &'static [(&'static str, &'static str)],
}

/// Known addons
pub static ADDONS: &[AddonDescriptor] = &[
    AddonDescriptor {
        name: "rust",
        capabilities: &["rust-domain"],
        templates: &[("rust", "domain")],
    },
    AddonDescriptor {
        name: "fixtures",
        capabilities: &["go-test-fixtures"],
        templates: &[("go", "fixtures")],
    },
];

/// Find an addon by name
pub fn find_addon(name: &str) -> Option<&'static AddonDescriptor> {
    ADDONS.iter().find(|a| a.name == name)
}

/// Find a template by group and name
pub fn find_template(group: &str, name: &str) -> Option<&'static TemplateSpec> {
    TEMPLATES.iter().find(|t| t.group == group && t.name == name)
}

/// Whether `spec` runs for `ctx`
///
/// A template without a gate is skipped in strict mode.
pub fn should_execute(ctx: &Context, spec: &TemplateSpec) -> bool {
    if !spec.available(&ctx.settings) {
        return false;
    }
    match spec.gate {
        Some(gate) => gate(ctx),
        None => !ctx.settings.strict,
    }
}

/// Render every template that should run for `ctx`
pub fn render_all(ctx: &Context) -> Result<Vec<File>, GeneratorError> {
    let mut files = Vec::new();
    for spec in TEMPLATES {
        if !should_execute(ctx, spec) {
            debug!(template = %format!("{}/{}", spec.group, spec.name), "skipped");
            continue;
        }
        let name = spec.output_name(&ctx.file_name);
        let content = (spec.render)(ctx, spec)?;
        debug!(file = %name, bytes = content.len(), "rendered");
        files.push(File {
            name: Some(name),
            content: Some(content),
            ..Default::default()
        });
    }
    Ok(files)
}
