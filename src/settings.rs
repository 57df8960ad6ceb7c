//! Generator settings
//!
//! Settings are read from the protoc plugin parameter, a comma-separated list
//! of `key=value` pairs:
//!
//! ```text
//! protoc --strata_out=gen --strata_opt=db=mongo,rule=slug:github.com/acme/rules.Slug acme/user.proto
//! ```

use crate::types::QualifiedRef;
use crate::GeneratorError;
use once_cell::sync::Lazy;

/// Default import path of the common converters runtime package
pub const DEFAULT_CONVERTERS_PATH: &str = "github.com/strata-dev/strata/runtime/convert";

/// Database tag profile applied to domain structs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseKind {
    /// No database tags
    #[default]
    None,
    /// Document store (`bson` tags)
    Document,
    /// Relational ORM (`gorm` tags)
    Relational,
}

impl DatabaseKind {
    fn parse(value: &str) -> Result<Self, GeneratorError> {
        match value {
            "" | "none" => Ok(DatabaseKind::None),
            "mongo" | "document" => Ok(DatabaseKind::Document),
            "gorm" | "relational" => Ok(DatabaseKind::Relational),
            other => Err(GeneratorError::InvalidConfig(format!(
                "unknown db kind `{}` (expected none, mongo or gorm)",
                other
            ))),
        }
    }
}

/// Message name suffixes per architectural layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suffixes {
    /// Suffix marking wire messages
    pub wire: String,
    /// Suffix marking request (wire input) messages
    pub wire_input: String,
    /// Suffix marking response (wire output) messages
    pub wire_output: String,
    /// Suffix of generated domain types
    pub domain: String,
    /// Suffix of generated outbound types
    pub outbound: String,
    /// Suffix of generated inbound types
    pub inbound: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            wire: "Wire".to_string(),
            wire_input: "Request".to_string(),
            wire_output: "Response".to_string(),
            domain: "Domain".to_string(),
            outbound: "Outbound".to_string(),
            inbound: "Inbound".to_string(),
        }
    }
}

/// The Go package holding the common conversion helpers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertersPackage {
    /// Import path
    pub path: String,
    /// Package identifier used as the call qualifier
    pub name: String,
}

impl ConvertersPackage {
    fn from_path(path: &str) -> Self {
        let name = path
            .rsplit('/')
            .find(|segment| !is_version_segment(segment))
            .unwrap_or(path)
            .replace('-', "_");
        Self {
            path: path.to_string(),
            name,
        }
    }

    /// Render a call target for `helper`, e.g. `convert.MapSlice`
    pub fn call(&self, helper: &str) -> String {
        format!("{}.{}", self.name, helper)
    }
}

impl Default for ConvertersPackage {
    fn default() -> Self {
        Self::from_path(DEFAULT_CONVERTERS_PATH)
    }
}

/// A named validation rule usable from `(strata.field).validate.rules`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRule {
    /// Name referenced by annotations
    pub name: String,
    /// Go callee, e.g. `is.Email` or `rules.Slug`
    pub call: String,
    /// Fully qualified reference for custom rules
    pub reference: Option<String>,
    /// Whether the rule is a constructor that needs arguments
    pub requires_args: bool,
}

impl ValidationRule {
    fn builtin(name: &str, call: &str, requires_args: bool) -> Self {
        Self {
            name: name.to_string(),
            call: call.to_string(),
            reference: None,
            requires_args,
        }
    }

    /// Parse a `name:qualified.Ref[:args]` registration
    fn parse(spec: &str) -> Result<Self, GeneratorError> {
        let mut parts = spec.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        let reference = parts.next().unwrap_or_default().trim();
        let requires_args = match parts.next().map(str::trim) {
            None => false,
            Some("args") => true,
            Some(other) => {
                return Err(GeneratorError::InvalidConfig(format!(
                    "rule `{}`: unknown flag `{}` (expected `args`)",
                    name, other
                )))
            }
        };

        if name.is_empty() || reference.is_empty() {
            return Err(GeneratorError::InvalidConfig(format!(
                "rule `{}` must have the form name:qualified.Ref[:args]",
                spec
            )));
        }

        let qualified = QualifiedRef::parse(reference).ok_or_else(|| {
            GeneratorError::Lookup(format!(
                "rule `{}`: `{}` is not a fully qualified reference",
                name, reference
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            call: qualified.call(),
            reference: Some(reference.to_string()),
            requires_args,
        })
    }
}

/// Validation rules available without registration
static BUILTIN_RULES: Lazy<Vec<ValidationRule>> = Lazy::new(|| {
    vec![
        ValidationRule::builtin("email", "is.Email", false),
        ValidationRule::builtin("url", "is.URL", false),
        ValidationRule::builtin("uuid", "is.UUID", false),
        ValidationRule::builtin("alpha", "is.Alpha", false),
        ValidationRule::builtin("alphanumeric", "is.Alphanumeric", false),
        ValidationRule::builtin("digit", "is.Digit", false),
        ValidationRule::builtin("ip", "is.IP", false),
        ValidationRule::builtin("in", "validation.In", true),
        ValidationRule::builtin("not_in", "validation.NotIn", true),
    ]
});

/// Settings for one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Layer suffix conventions
    pub suffixes: Suffixes,
    /// Database tag profile
    pub database: DatabaseKind,
    /// Common converters package
    pub converters: ConvertersPackage,
    /// Registered validation rules, built-ins first
    pub rules: Vec<ValidationRule>,
    /// Skip templates that have no gate registered
    pub strict: bool,
    /// Enabled addons
    pub addons: Vec<String>,
    /// Emit debug logging
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            suffixes: Suffixes::default(),
            database: DatabaseKind::default(),
            converters: ConvertersPackage::default(),
            rules: BUILTIN_RULES.clone(),
            strict: true,
            addons: Vec::new(),
            debug: false,
        }
    }
}

impl Settings {
    /// Parse settings from the plugin parameter
    pub fn from_parameter(parameter: Option<&str>) -> Result<Self, GeneratorError> {
        let mut settings = Settings::default();
        let Some(parameter) = parameter else {
            return Ok(settings);
        };

        for part in parameter.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = match part.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (part, "true"),
            };

            match key {
                "wire_suffix" => settings.suffixes.wire = non_empty(key, value)?,
                "request_suffix" => settings.suffixes.wire_input = non_empty(key, value)?,
                "response_suffix" => settings.suffixes.wire_output = non_empty(key, value)?,
                "domain_suffix" => settings.suffixes.domain = non_empty(key, value)?,
                "outbound_suffix" => settings.suffixes.outbound = non_empty(key, value)?,
                "inbound_suffix" => settings.suffixes.inbound = non_empty(key, value)?,
                "db" => settings.database = DatabaseKind::parse(value)?,
                "converters" => {
                    settings.converters = ConvertersPackage::from_path(&non_empty(key, value)?)
                }
                "rule" => settings.register_rule(ValidationRule::parse(value)?),
                "strict" => settings.strict = parse_bool(key, value)?,
                "debug" => settings.debug = parse_bool(key, value)?,
                "addons" => {
                    for name in value.split('+').map(str::trim).filter(|n| !n.is_empty()) {
                        if crate::render::find_addon(name).is_none() {
                            return Err(GeneratorError::InvalidConfig(format!(
                                "unknown addon `{}`",
                                name
                            )));
                        }
                        if !settings.addons.iter().any(|a| a == name) {
                            settings.addons.push(name.to_string());
                        }
                    }
                }
                other => {
                    return Err(GeneratorError::InvalidConfig(format!(
                        "unknown parameter `{}`",
                        other
                    )))
                }
            }
        }

        Ok(settings)
    }

    /// Look up a validation rule by name
    pub fn rule(&self, name: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Whether the addon named `name` is enabled
    pub fn addon_enabled(&self, name: &str) -> bool {
        self.addons.iter().any(|a| a == name)
    }

    /// Custom registrations replace built-ins of the same name
    fn register_rule(&mut self, rule: ValidationRule) {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, GeneratorError> {
    if value.is_empty() {
        return Err(GeneratorError::InvalidConfig(format!(
            "`{}` must not be empty",
            key
        )));
    }
    Ok(value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, GeneratorError> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(GeneratorError::InvalidConfig(format!(
            "`{}` expects a boolean, got `{}`",
            key, other
        ))),
    }
}

/// Go module major-version path segments such as `v4`
pub(crate) fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
