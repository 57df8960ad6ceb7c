//! Normalized schema model
//!
//! Translates the raw descriptors of a `CodeGeneratorRequest` into messages,
//! fields, enums and services annotated with the facts the resolvers need:
//! architectural kind, cardinality, well-known types and cross-module origin.

pub mod field;
pub mod message;
pub mod service;

pub use field::{Cardinality, Field, FieldKind, MessageTarget, WellKnown};
pub use message::{Enum, EnumValue, LayerNames, Message, MessageKind, Naming};
pub use service::{Auth, Endpoint, Location, Method, Service};

use crate::options::{self, strata, OptionsIndex};
use crate::settings::{is_version_segment, Settings};
use crate::GeneratorError;
use prost_types::{DescriptorProto, FileDescriptorProto};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Architectural layer a type is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Transport type as generated by protoc-gen-go
    Wire,
    /// Business-logic representation
    Domain,
    /// Request representation decoded from clients
    Inbound,
    /// Response representation serialized to clients
    Outbound,
}

/// A protobuf package and its Go identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Protobuf package, e.g. `acme.user.v1`
    pub package: String,
    /// Go package identifier
    pub go_name: String,
    /// Go import path
    pub go_path: String,
}

impl Module {
    /// Derive the module of a file from its package and `go_package` option
    pub fn from_file(file: &FileDescriptorProto) -> Self {
        let package = file.package().to_string();
        let go_package = file
            .options
            .as_ref()
            .and_then(|o| o.go_package.as_deref())
            .filter(|p| !p.is_empty());

        let (go_path, go_name) = match go_package {
            Some(go_package) => match go_package.split_once(';') {
                Some((path, name)) => (path.to_string(), name.to_string()),
                None => (
                    go_package.to_string(),
                    go_package
                        .rsplit('/')
                        .next()
                        .unwrap_or(go_package)
                        .replace(['-', '.'], "_"),
                ),
            },
            None => (
                package.replace('.', "/"),
                package.rsplit('.').next().unwrap_or_default().to_string(),
            ),
        };

        Self {
            package,
            go_name,
            go_path,
        }
    }
}

/// Where a referenced type lives relative to the module being generated
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModulePackage {
    /// Protobuf package of the type, empty when unresolvable
    pub module: String,
    /// Go identifier of the type within its package
    pub local_name: String,
    /// Whether the type needs no package qualifier
    pub same_module: bool,
    /// Go identifier of the type's package
    pub go_name: String,
}

/// Every module present in one request
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    /// Sorted longest package first, so the first prefix match is the longest
    modules: Vec<Module>,
    /// Go qualifier per import path, unique across the request
    qualifiers: HashMap<String, String>,
}

impl ModuleRegistry {
    /// Collect the modules of all files, deduplicated by package
    pub fn from_files(files: &[FileDescriptorProto]) -> Self {
        let mut modules: Vec<Module> = Vec::new();
        for file in files {
            let module = Module::from_file(file);
            if !modules.iter().any(|m| m.package == module.package) {
                modules.push(module);
            }
        }
        modules.sort_by(|a, b| {
            b.package
                .len()
                .cmp(&a.package.len())
                .then_with(|| a.package.cmp(&b.package))
        });
        let qualifiers = assign_qualifiers(&modules);
        Self {
            modules,
            qualifiers,
        }
    }

    /// Qualifier other modules use for `module`
    ///
    /// This is the Go package name unless another import path in the request
    /// shares it, in which case it is an alias built from the path.
    pub fn qualifier<'m>(&'m self, module: &'m Module) -> &'m str {
        self.qualifiers
            .get(&module.go_path)
            .map(String::as_str)
            .unwrap_or(&module.go_name)
    }

    /// All known modules
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Find a module by protobuf package
    pub fn get(&self, package: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.package == package)
    }

    /// Locate a fully qualified type name (`.pkg.Outer.Inner`) relative to `current`
    ///
    /// Names with fewer than two segments are malformed and resolve to an
    /// empty, foreign module.
    pub fn module_package(&self, type_name: &str, current: &Module) -> ModulePackage {
        let name = type_name.trim_start_matches('.');
        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return ModulePackage {
                local_name: name.replace('.', "_"),
                ..Default::default()
            };
        }

        let known = self.modules.iter().find(|m| {
            !m.package.is_empty()
                && name.len() > m.package.len()
                && name.starts_with(&m.package)
                && name.as_bytes()[m.package.len()] == b'.'
        });

        let (module, local, go_name, go_path) = match known {
            Some(m) => (
                m.package.clone(),
                name[m.package.len() + 1..].replace('.', "_"),
                self.qualifier(m).to_string(),
                m.go_path.clone(),
            ),
            None => {
                let (module, local) = name.rsplit_once('.').unwrap_or(("", name));
                let go_name = module.rsplit('.').next().unwrap_or(module).to_string();
                (
                    module.to_string(),
                    local.to_string(),
                    go_name,
                    module.replace('.', "/"),
                )
            }
        };

        let same_module = module == current.package || go_path == current.go_path;
        ModulePackage {
            module,
            local_name: local,
            same_module,
            go_name,
        }
    }
}

/// Give every import path a distinct qualifier
///
/// Paths sharing a Go package name are all aliased, so none of them can be
/// confused with the module being generated.
fn assign_qualifiers(modules: &[Module]) -> HashMap<String, String> {
    let mut by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for module in modules {
        by_name
            .entry(module.go_name.as_str())
            .or_default()
            .insert(module.go_path.as_str());
    }

    let mut taken: BTreeSet<String> = by_name.keys().map(|n| n.to_string()).collect();
    let mut qualifiers = HashMap::new();
    for (name, paths) in &by_name {
        if paths.len() < 2 {
            for path in paths {
                qualifiers.insert(path.to_string(), name.to_string());
            }
            continue;
        }
        for path in paths {
            let alias = path_alias(path, name, &taken);
            debug!(path = %path, alias = %alias, "aliasing colliding Go package");
            taken.insert(alias.clone());
            qualifiers.insert(path.to_string(), alias);
        }
    }
    qualifiers
}

/// Shortest free identifier made of trailing path segments, e.g. `shippingcommon`
fn path_alias(path: &str, name: &str, taken: &BTreeSet<String>) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty() && !is_version_segment(s))
        .map(|s| {
            s.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|s| !s.is_empty())
        .collect();

    for len in 2..=segments.len() {
        let candidate = segments[segments.len() - len..].concat();
        let starts_with_letter = candidate
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic());
        if starts_with_letter && !taken.contains(&candidate) {
            return candidate;
        }
    }
    (2..)
        .map(|n| format!("{}{}", name, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Descriptor facts about every message in the request
pub(crate) struct SymbolTable<'a> {
    messages: HashMap<String, MessageSymbol<'a>>,
}

pub(crate) struct MessageSymbol<'a> {
    pub descriptor: &'a DescriptorProto,
    pub kind: MessageKind,
    pub outbound_hidden: bool,
}

impl<'a> SymbolTable<'a> {
    fn build(
        files: &'a [FileDescriptorProto],
        index: &OptionsIndex,
        settings: &Settings,
    ) -> Result<Self, GeneratorError> {
        let mut table = SymbolTable {
            messages: HashMap::new(),
        };
        for file in files {
            for message in &file.message_type {
                table.insert(file.package(), message, index, settings)?;
            }
        }
        Ok(table)
    }

    fn insert(
        &mut self,
        scope: &str,
        message: &'a DescriptorProto,
        index: &OptionsIndex,
        settings: &Settings,
    ) -> Result<(), GeneratorError> {
        let full_name = qualify(scope, message.name());
        let opts = options::parse_message_options(index, &full_name, message)?;
        let outbound_hidden = opts
            .as_ref()
            .and_then(|o| o.outbound.as_ref())
            .is_some_and(|o| o.hide);

        for nested in &message.nested_type {
            self.insert(&full_name, nested, index, settings)?;
        }

        self.messages.insert(
            format!(".{}", full_name),
            MessageSymbol {
                descriptor: message,
                kind: MessageKind::from_name(message.name(), &settings.suffixes),
                outbound_hidden,
            },
        );
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&MessageSymbol<'a>> {
        self.messages.get(type_name)
    }
}

/// Join a scope and a name with a dot, skipping an empty scope
pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// The schema of the file being generated
#[derive(Debug, Clone)]
pub struct Schema {
    /// Proto file name, e.g. `acme/user.proto`
    pub file_name: String,
    /// Module of the file
    pub module: Module,
    /// All modules in the request
    pub registry: ModuleRegistry,
    /// Messages in declaration order, nested messages after their parent
    pub messages: Vec<Message>,
    /// Enums in declaration order
    pub enums: Vec<Enum>,
    /// Services in declaration order
    pub services: Vec<Service>,
}

impl Schema {
    /// Load the schema of `file`, resolving references against `files`
    pub fn load(
        file: &FileDescriptorProto,
        files: &[FileDescriptorProto],
        index: &OptionsIndex,
        settings: &Settings,
    ) -> Result<Self, GeneratorError> {
        let file_name = file.name().to_string();
        let module = Module::from_file(file);
        if module.go_name.is_empty() {
            return Err(GeneratorError::schema(
                &file_name,
                "cannot resolve a module name: set `package` or `option go_package`",
            ));
        }

        let registry = ModuleRegistry::from_files(files);
        let symbols = SymbolTable::build(files, index, settings)?;

        let loader = Loader {
            module: &module,
            registry: &registry,
            symbols: &symbols,
            index,
            settings,
            proto3: file.syntax() != "proto2",
        };

        let mut messages = Vec::new();
        let mut enums = Vec::new();
        for message in &file.message_type {
            loader.load_message(file.package(), "", message, &mut messages, &mut enums)?;
        }
        for e in &file.enum_type {
            enums.push(Enum::from_descriptor(e, file.package(), ""));
        }

        let mut services = Vec::new();
        for service in &file.service {
            services.push(Service::from_descriptor(service, file.package(), index)?);
        }

        Ok(Self {
            file_name,
            module,
            registry,
            messages,
            enums,
            services,
        })
    }

    /// Find a message of this file by fully qualified type name
    pub fn message(&self, type_name: &str) -> Option<&Message> {
        let name = type_name.trim_start_matches('.');
        self.messages.iter().find(|m| m.full_name == name)
    }
}

/// Shared state while loading one file
pub(crate) struct Loader<'a> {
    pub module: &'a Module,
    pub registry: &'a ModuleRegistry,
    pub symbols: &'a SymbolTable<'a>,
    pub index: &'a OptionsIndex,
    pub settings: &'a Settings,
    pub proto3: bool,
}

impl Loader<'_> {
    fn load_message(
        &self,
        scope: &str,
        go_prefix: &str,
        desc: &DescriptorProto,
        messages: &mut Vec<Message>,
        enums: &mut Vec<Enum>,
    ) -> Result<(), GeneratorError> {
        if desc.options.as_ref().and_then(|o| o.map_entry) == Some(true) {
            return Ok(());
        }

        let message = Message::from_descriptor(self, scope, go_prefix, desc)?;
        let full_name = message.full_name.clone();
        let go_name = message.name.clone();
        messages.push(message);

        for nested in &desc.nested_type {
            self.load_message(&full_name, &format!("{}_", go_name), nested, messages, enums)?;
        }
        for e in &desc.enum_type {
            enums.push(Enum::from_descriptor(e, &full_name, &format!("{}_", go_name)));
        }
        Ok(())
    }

    pub fn field_options(
        &self,
        message_full_name: &str,
        field: &prost_types::FieldDescriptorProto,
    ) -> Result<Option<strata::FieldOptions>, GeneratorError> {
        options::parse_field_options(self.index, message_full_name, field)
    }
}
