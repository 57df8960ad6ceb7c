//! The resolved view of one proto file
//!
//! [`Context::build`] runs every per-field resolver once and precomputes the
//! imports of each available template. The result is read-only; renderers
//! only look things up.

use super::convert::{self, ConversionBuilder, Conversions};
use super::go_string;
use super::imports::{Import, ImportResolver, ImportSet};
use super::layer::TypeResolver;
use super::naming::{self, FieldNames};
use super::tags::{self, FieldKeys, FieldTags};
use super::validate::{self, ValidationCall};
use crate::render;
use crate::schema::{
    Enum, Field, FieldKind, Layer, Location, Message, MessageKind, Method, Module,
    ModuleRegistry, Schema,
};
use crate::settings::Settings;
use crate::types::{GoRenderer, QualifiedRef, TypeRef, TypeRenderer};
use crate::GeneratorError;
use heck::ToTrainCase;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Which part of the context a template's imports are computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportScope {
    /// Template needs no imports
    None,
    /// Domain struct field types
    Domain,
    /// Wire/domain conversion expressions
    DomainConvert,
    /// Outbound field types and conversion expressions
    Outbound,
    /// Inbound field types, conversions and validation calls
    Inbound,
    /// HTTP decode statements
    Http,
    /// Domain field types as seen from an external test package
    Fixtures,
}

/// A field type in one layer, structured and rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerType {
    /// Structured type
    pub ty: TypeRef,
    /// Go source form
    pub go: String,
}

impl LayerType {
    fn new(ty: TypeRef) -> Self {
        let go = GoRenderer.render(&ty);
        Self { ty, go }
    }
}

/// Everything the templates need about one field
#[derive(Debug, Clone)]
pub struct ResolvedField {
    /// Schema field
    pub field: Field,
    /// Identifiers per layer
    pub names: FieldNames,
    /// Serialized keys per layer
    pub keys: FieldKeys,
    /// Struct tags per layer
    pub tags: FieldTags,
    /// Wire type
    pub wire: LayerType,
    /// Domain type, for messages with a domain form
    pub domain: Option<LayerType>,
    /// Inbound type, for request messages
    pub inbound: Option<LayerType>,
    /// Outbound type, unless the message or the field has no outbound form
    pub outbound: Option<LayerType>,
    /// Domain type qualified for the external test package
    pub fixture: Option<String>,
    /// Conversion expressions
    pub conversions: Conversions,
    /// Validation call, for request messages
    pub validation: Option<ValidationCall>,
    /// Where an HTTP binding reads the field from
    pub location: Option<Location>,
}

/// A message and its resolved fields
#[derive(Debug, Clone)]
pub struct ResolvedMessage {
    /// Schema message
    pub message: Message,
    /// Resolved fields in declaration order
    pub fields: Vec<ResolvedField>,
}

impl ResolvedMessage {
    /// Fields present in the outbound struct
    pub fn outbound_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter().filter(|f| f.outbound.is_some())
    }

    /// Validation calls of the inbound struct
    pub fn validations(&self) -> impl Iterator<Item = &ValidationCall> {
        self.fields.iter().filter_map(|f| f.validation.as_ref())
    }
}

/// An HTTP-bound method with its decode plan
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    /// Schema method
    pub method: Method,
    /// Owning service
    pub service: String,
    /// Wire name of the request type
    pub request: String,
    /// Inbound name of the request type
    pub inbound: String,
    /// `net/http` mux pattern, e.g. `POST /v1/users/{id}`
    pub pattern: String,
    /// JSON body decode expression, if the binding has a body
    pub body: Option<String>,
    /// Path, query and header parse expressions, each returning an error
    pub params: Vec<String>,
}

/// Resolved view of one proto file
#[derive(Debug, Clone)]
pub struct Context {
    /// Proto file name
    pub file_name: String,
    /// Module being generated
    pub module: Module,
    /// Every module in the request
    pub registry: ModuleRegistry,
    /// Settings of this run
    pub settings: Settings,
    /// Messages with a known kind
    pub messages: Vec<ResolvedMessage>,
    /// Enums of the file
    pub enums: Vec<Enum>,
    /// HTTP-bound methods
    pub methods: Vec<ResolvedMethod>,
    imports: BTreeMap<(String, String), Vec<Import>>,
}

impl Context {
    /// Resolve every message, field and method of `schema`
    pub fn build(schema: &Schema, settings: &Settings) -> Result<Self, GeneratorError> {
        let (methods, locations) = bind_methods(schema, settings)?;

        let resolver = FieldResolver {
            settings,
            types: TypeResolver::new(&schema.module),
            conversions: ConversionBuilder::new(settings, &schema.module, &schema.registry),
            locations: &locations,
        };

        let mut messages = Vec::with_capacity(schema.messages.len());
        for message in &schema.messages {
            if message.kind == MessageKind::Unknown {
                debug!(message = %message.full_name, "no layer suffix, skipping");
                continue;
            }
            let fields = message
                .fields
                .iter()
                .map(|f| resolver.resolve(f, message))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                message = %message.full_name,
                kind = ?message.kind,
                fields = fields.len(),
                "resolved message"
            );
            messages.push(ResolvedMessage {
                message: message.clone(),
                fields,
            });
        }

        let mut context = Self {
            file_name: schema.file_name.clone(),
            module: schema.module.clone(),
            registry: schema.registry.clone(),
            settings: settings.clone(),
            messages,
            enums: schema.enums.clone(),
            methods,
            imports: BTreeMap::new(),
        };
        context.imports = context.resolve_imports()?;
        Ok(context)
    }

    /// Resolved imports of the template `group/name`
    pub fn template_imports(&self, group: &str, name: &str) -> &[Import] {
        self.imports
            .get(&(group.to_string(), name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Messages with a domain form
    pub fn domain_messages(&self) -> impl Iterator<Item = &ResolvedMessage> {
        self.messages.iter().filter(|m| m.message.has_domain())
    }

    /// Messages with an outbound form
    pub fn outbound_messages(&self) -> impl Iterator<Item = &ResolvedMessage> {
        self.messages.iter().filter(|m| m.message.has_outbound())
    }

    /// Messages with an inbound form
    pub fn inbound_messages(&self) -> impl Iterator<Item = &ResolvedMessage> {
        self.messages.iter().filter(|m| m.message.has_inbound())
    }

    /// Find a resolved message by fully qualified type name
    pub fn message(&self, type_name: &str) -> Option<&ResolvedMessage> {
        let name = type_name.trim_start_matches('.');
        self.messages.iter().find(|m| m.message.full_name == name)
    }

    fn resolve_imports(&self) -> Result<BTreeMap<(String, String), Vec<Import>>, GeneratorError> {
        let mut plain = ImportResolver::new(&self.module, &self.registry, &self.settings, false);
        let mut test = ImportResolver::new(&self.module, &self.registry, &self.settings, true);
        for field in self.messages.iter().flat_map(|m| &m.fields) {
            for reference in convert::custom_references(&field.field) {
                plain.register_reference(&reference);
                test.register_reference(&reference);
            }
            let rules = field.validation.iter().flat_map(|v| &v.references);
            for qualified in rules.filter_map(|r| QualifiedRef::parse(r)) {
                plain.register_package(&qualified);
            }
        }

        let mut out = BTreeMap::new();
        for spec in render::TEMPLATES.iter().filter(|s| s.available(&self.settings)) {
            let resolver = match spec.scope {
                ImportScope::Fixtures => &test,
                _ => &plain,
            };
            let mut set = self.collect(spec.scope, resolver)?;
            for qualifier in spec.static_imports {
                resolver.require(qualifier, &mut set)?;
            }
            out.insert(
                (spec.group.to_string(), spec.name.to_string()),
                set.into_sorted(),
            );
        }
        Ok(out)
    }

    fn collect(
        &self,
        scope: ImportScope,
        resolver: &ImportResolver,
    ) -> Result<ImportSet, GeneratorError> {
        let mut out = ImportSet::new();
        match scope {
            ImportScope::None => {}
            ImportScope::Domain => {
                for field in self.domain_messages().flat_map(|m| &m.fields) {
                    if let Some(domain) = &field.domain {
                        resolver.scan_type(&domain.go, &mut out)?;
                    }
                }
            }
            ImportScope::DomainConvert => {
                for field in self.domain_messages().flat_map(|m| &m.fields) {
                    let c = &field.conversions;
                    for expr in [&c.into_domain, &c.into_wire].into_iter().flatten() {
                        resolver.scan_expression(expr, &mut out)?;
                    }
                }
            }
            ImportScope::Outbound => {
                for field in self.outbound_messages().flat_map(|m| m.outbound_fields()) {
                    if let Some(outbound) = &field.outbound {
                        resolver.scan_type(&outbound.go, &mut out)?;
                    }
                    if let Some(expr) = &field.conversions.into_outbound {
                        resolver.scan_expression(expr, &mut out)?;
                    }
                }
            }
            ImportScope::Inbound => {
                for message in self.inbound_messages() {
                    for field in &message.fields {
                        if let Some(inbound) = &field.inbound {
                            resolver.scan_type(&inbound.go, &mut out)?;
                        }
                        if let Some(expr) = &field.conversions.into_wire_input {
                            resolver.scan_expression(expr, &mut out)?;
                        }
                    }
                    for call in message.validations() {
                        resolver.scan_expression(&call.expression, &mut out)?;
                    }
                    if message.validations().next().is_some() {
                        resolver.require("validation", &mut out)?;
                    }
                }
            }
            ImportScope::Http => {
                for method in &self.methods {
                    resolver.scan_type("*http.Request", &mut out)?;
                    for expr in method.body.iter().chain(&method.params) {
                        resolver.scan_expression(expr, &mut out)?;
                    }
                }
            }
            ImportScope::Fixtures => {
                for message in self.domain_messages() {
                    let ret = format!("*{}.{}", self.module.go_name, message.message.names.domain);
                    resolver.scan_type(&ret, &mut out)?;
                    for fixture in message.fields.iter().filter_map(|f| f.fixture.as_ref()) {
                        resolver.scan_type(fixture, &mut out)?;
                    }
                }
            }
        }
        Ok(out)
    }
}

struct FieldResolver<'a> {
    settings: &'a Settings,
    types: TypeResolver<'a>,
    conversions: ConversionBuilder<'a>,
    locations: &'a HashMap<(String, String), Location>,
}

impl FieldResolver<'_> {
    fn resolve(&self, field: &Field, message: &Message) -> Result<ResolvedField, GeneratorError> {
        let names = naming::resolve(field, message);
        let keys = tags::keys(field, &names, message);
        let tags = tags::build(field, &names, message, self.settings);

        let layer = |present: bool, layer: Layer| -> Result<Option<LayerType>, GeneratorError> {
            if !present {
                return Ok(None);
            }
            self.types.resolve(field, layer).map(|ty| Some(LayerType::new(ty)))
        };

        let domain = layer(message.has_domain(), Layer::Domain)?;
        let fixture = if message.has_domain() {
            let ty = self.types.test_mode().resolve(field, Layer::Domain)?;
            Some(GoRenderer.render(&ty))
        } else {
            None
        };

        let validation = if message.has_inbound() {
            validate::build(field, &names, message, self.settings)?
        } else {
            None
        };

        Ok(ResolvedField {
            wire: LayerType::new(self.types.resolve(field, Layer::Wire)?),
            domain,
            inbound: layer(message.has_inbound(), Layer::Inbound)?,
            outbound: layer(
                message.has_outbound() && !field.outbound_hidden(),
                Layer::Outbound,
            )?,
            fixture,
            conversions: self.conversions.build(field, &names, message)?,
            validation,
            location: self
                .locations
                .get(&(message.full_name.clone(), field.name.clone()))
                .copied(),
            field: field.clone(),
            names,
            keys,
            tags,
        })
    }
}

type Locations = HashMap<(String, String), Location>;

/// Resolve the HTTP binding of every annotated method
///
/// A request field keeps the location of the first method binding it.
fn bind_methods(
    schema: &Schema,
    settings: &Settings,
) -> Result<(Vec<ResolvedMethod>, Locations), GeneratorError> {
    let mut methods = Vec::new();
    let mut locations = Locations::new();

    for service in &schema.services {
        for method in &service.methods {
            let Some(endpoint) = method.endpoint.as_ref() else {
                continue;
            };
            let Some(request) = schema.message(&method.input_type) else {
                warn!(
                    method = %method.full_name,
                    request = %method.input_type,
                    "request message is declared in another file, skipping HTTP binding"
                );
                continue;
            };
            if !request.has_inbound() {
                return Err(GeneratorError::schema(
                    &method.full_name,
                    format!(
                        "request type {} has no inbound form; name it with the request suffix",
                        request.name
                    ),
                ));
            }

            let bindings = method.bind(request)?;

            let body = match endpoint.body.as_str() {
                "" => None,
                "*" => Some("json.NewDecoder(r.Body).Decode(in)".to_string()),
                selector => request.field(selector).map(|f| {
                    let names = naming::resolve(f, request);
                    format!("json.NewDecoder(r.Body).Decode(&in.{})", names.domain)
                }),
            };

            let mut params = Vec::new();
            for (name, location) in bindings {
                locations
                    .entry((request.full_name.clone(), name.clone()))
                    .or_insert(location);
                let Some(field) = request.field(&name) else {
                    continue;
                };
                let names = naming::resolve(field, request);
                if let Some(statement) = decode_statement(field, &names, location, settings) {
                    params.push(statement);
                }
            }

            methods.push(ResolvedMethod {
                method: method.clone(),
                service: service.name.clone(),
                request: request.names.wire.clone(),
                inbound: request.names.inbound.clone(),
                pattern: format!("{} {}", endpoint.verb, mux_path(&endpoint.path)),
                body,
                params,
            });
        }
    }
    Ok((methods, locations))
}

/// Parse expression filling `field` from its non-body location
///
/// Only scalar and enum values can be read from strings; other kinds are
/// left to the body.
fn decode_statement(
    field: &Field,
    names: &FieldNames,
    location: Location,
    settings: &Settings,
) -> Option<String> {
    if !matches!(field.kind, FieldKind::Scalar(_) | FieldKind::Enum { .. }) || field.is_map() {
        return None;
    }
    let target = format!("&in.{}", names.domain);
    let parse = settings.converters.call("Parse");
    let parse_all = settings.converters.call("ParseAll");

    let statement = match location {
        Location::Body => return None,
        Location::Path => format!("{}({}, r.PathValue({}))", parse, target, go_string(&field.name)),
        Location::Query if field.is_array() => format!(
            "{}({}, r.URL.Query()[{}])",
            parse_all,
            target,
            go_string(&names.inbound)
        ),
        Location::Query => format!(
            "{}({}, r.URL.Query().Get({}))",
            parse,
            target,
            go_string(&names.inbound)
        ),
        Location::Header if field.is_array() => format!(
            "{}({}, r.Header.Values({}))",
            parse_all,
            target,
            go_string(&field.name.to_train_case())
        ),
        Location::Header => format!(
            "{}({}, r.Header.Get({}))",
            parse,
            target,
            go_string(&field.name.to_train_case())
        ),
    };
    Some(statement)
}

/// Rewrite `{name=pattern}` segments to `net/http` wildcards
///
/// `{name=**}` becomes the remainder wildcard `{name...}`.
fn mux_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let inner = &rest[start + 1..start + len];
        match inner.split_once('=') {
            Some((name, "**")) => out.push_str(&format!("{{{}...}}", name.trim())),
            Some((name, _)) => out.push_str(&format!("{{{}}}", name.trim())),
            None => out.push_str(&format!("{{{}}}", inner.trim())),
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}
