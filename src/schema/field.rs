//! Fields and their derived predicates

use super::message::{LayerNames, MessageKind};
use super::{Loader, ModulePackage};
use crate::options::strata;
use crate::types::{map_scalar, Builtin};
use crate::GeneratorError;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::FieldDescriptorProto;
use tracing::warn;

/// Well-known protobuf types with special handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    /// `google.protobuf.Timestamp`
    Timestamp,
    /// `google.protobuf.Struct`
    Struct,
    /// `google.protobuf.Value`
    Value,
    /// One of the `google.protobuf.*Value` wrappers, by wrapped scalar
    Wrapper(Builtin),
}

impl WellKnown {
    /// Match a fully qualified type name exactly
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let wk = match type_name {
            ".google.protobuf.Timestamp" => WellKnown::Timestamp,
            ".google.protobuf.Struct" => WellKnown::Struct,
            ".google.protobuf.Value" => WellKnown::Value,
            ".google.protobuf.StringValue" => WellKnown::Wrapper(Builtin::String),
            ".google.protobuf.BoolValue" => WellKnown::Wrapper(Builtin::Bool),
            ".google.protobuf.Int32Value" => WellKnown::Wrapper(Builtin::Int32),
            ".google.protobuf.Int64Value" => WellKnown::Wrapper(Builtin::Int64),
            ".google.protobuf.UInt32Value" => WellKnown::Wrapper(Builtin::Uint32),
            ".google.protobuf.UInt64Value" => WellKnown::Wrapper(Builtin::Uint64),
            ".google.protobuf.FloatValue" => WellKnown::Wrapper(Builtin::Float32),
            ".google.protobuf.DoubleValue" => WellKnown::Wrapper(Builtin::Float64),
            ".google.protobuf.BytesValue" => WellKnown::Wrapper(Builtin::Bytes),
            _ => return None,
        };
        Some(wk)
    }

    /// Go name of a wrapper message, e.g. `StringValue`
    pub fn wrapper_name(scalar: Builtin) -> &'static str {
        match scalar {
            Builtin::String => "StringValue",
            Builtin::Bool => "BoolValue",
            Builtin::Int32 => "Int32Value",
            Builtin::Int64 => "Int64Value",
            Builtin::Uint32 => "UInt32Value",
            Builtin::Uint64 => "UInt64Value",
            Builtin::Float32 => "FloatValue",
            Builtin::Float64 => "DoubleValue",
            Builtin::Bytes | Builtin::Any => "BytesValue",
        }
    }
}

/// A referenced user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTarget {
    /// Fully qualified type name with leading dot
    pub type_name: String,
    /// Location relative to the current module
    pub package: ModulePackage,
    /// Kind of the referenced message
    pub kind: MessageKind,
    /// Layer names of the referenced message
    pub names: LayerNames,
    /// Whether the referenced message has no outbound form
    pub outbound_hidden: bool,
}

/// What a field (or a map field's value) holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Built-in scalar
    Scalar(Builtin),
    /// Enum, by type name
    Enum {
        /// Fully qualified type name with leading dot
        type_name: String,
        /// Location relative to the current module
        package: ModulePackage,
    },
    /// User message
    Message(MessageTarget),
    /// Well-known type
    WellKnown(WellKnown),
}

/// How many values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one
    Singular,
    /// Zero or one, with explicit presence
    Optional,
    /// Repeated
    Array,
    /// Map from a scalar key; the field kind describes the values
    Map {
        /// Key scalar
        key: Builtin,
    },
}

/// One protobuf field plus derived facts
#[derive(Debug, Clone)]
pub struct Field {
    /// Protobuf field name
    pub name: String,
    /// Field number
    pub number: i32,
    /// protoc-gen-go identifier, e.g. `CreatedAt`
    pub go_name: String,
    /// Element kind (value kind for maps)
    pub kind: FieldKind,
    /// Cardinality
    pub cardinality: Cardinality,
    /// Go name of the owning message
    pub message: String,
    /// Protobuf package of the owning message
    pub module: String,
    /// Field annotations
    pub options: strata::FieldOptions,
}

impl Field {
    pub(crate) fn from_descriptor(
        loader: &Loader<'_>,
        message: &str,
        message_full_name: &str,
        desc: &FieldDescriptorProto,
    ) -> Result<Self, GeneratorError> {
        let path = format!("{}.{}", message, desc.name());
        let options = loader
            .field_options(message_full_name, desc)?
            .unwrap_or_default();

        let map_entry = (desc.label() == Label::Repeated && desc.r#type() == Type::Message)
            .then(|| loader.symbols.get(desc.type_name()))
            .flatten()
            .filter(|s| s.descriptor.options.as_ref().and_then(|o| o.map_entry) == Some(true));

        let (kind, cardinality) = if let Some(entry) = map_entry {
            let key = entry.descriptor.field.iter().find(|f| f.number() == 1);
            let value = entry.descriptor.field.iter().find(|f| f.number() == 2);
            let (Some(key), Some(value)) = (key, value) else {
                return Err(GeneratorError::schema(&path, "malformed map entry"));
            };
            let key = map_scalar(key.r#type()).ok_or_else(|| {
                GeneratorError::UnknownFieldType(format!("{}: map key {:?}", path, key.r#type()))
            })?;
            (kind_of(loader, &path, value)?, Cardinality::Map { key })
        } else if desc.label() == Label::Repeated {
            (kind_of(loader, &path, desc)?, Cardinality::Array)
        } else if desc.proto3_optional()
            || (!loader.proto3
                && desc.label() == Label::Optional
                && desc.r#type() != Type::Message)
        {
            (kind_of(loader, &path, desc)?, Cardinality::Optional)
        } else {
            (kind_of(loader, &path, desc)?, Cardinality::Singular)
        };

        let field = Self {
            name: desc.name().to_string(),
            number: desc.number(),
            go_name: go_camel_case(desc.name()),
            kind,
            cardinality,
            message: message.to_string(),
            module: loader.module.package.clone(),
            options,
        };
        field.check_annotations()?;
        Ok(field)
    }

    /// Reject annotation combinations that can never render
    fn check_annotations(&self) -> Result<(), GeneratorError> {
        if let Some(bitflag) = self.bitflag() {
            if self.kind != FieldKind::Scalar(Builtin::Uint64) {
                return Err(GeneratorError::annotation(
                    self.path(),
                    "bitflag fields must be uint64",
                ));
            }
            if self.cardinality != Cardinality::Singular {
                return Err(GeneratorError::annotation(
                    self.path(),
                    "bitflag fields cannot be optional, repeated or maps",
                ));
            }
            if bitflag.r#enum.is_empty() {
                return Err(GeneratorError::annotation(
                    self.path(),
                    "bitflag requires the enum holding the flag values",
                ));
            }
        }

        for tag in &self.options.tags {
            if tag.name == "json" {
                return Err(GeneratorError::annotation(
                    self.path(),
                    "custom json tags are not allowed; json tags are generated from field names",
                ));
            }
            if tag.name.is_empty() {
                return Err(GeneratorError::annotation(self.path(), "custom tag without a name"));
            }
            if tag
                .name
                .chars()
                .any(|c| c == ':' || c == '"' || c == '`' || c.is_whitespace() || c.is_control())
            {
                return Err(GeneratorError::annotation(
                    self.path(),
                    format!("custom tag name `{}` is not a valid struct tag key", tag.name),
                ));
            }
            if tag.value.contains('"') || tag.value.contains('`') {
                return Err(GeneratorError::annotation(
                    self.path(),
                    format!("custom tag `{}` value cannot contain quotes or backticks", tag.name),
                ));
            }
        }
        Ok(())
    }

    /// `Message.field`, for diagnostics
    pub fn path(&self) -> String {
        format!("{}.{}", self.message, self.name)
    }

    /// Whether the field is repeated (maps excluded)
    pub fn is_array(&self) -> bool {
        self.cardinality == Cardinality::Array
    }

    /// Whether the field is a map
    pub fn is_map(&self) -> bool {
        matches!(self.cardinality, Cardinality::Map { .. })
    }

    /// Whether the field has explicit presence
    pub fn is_optional(&self) -> bool {
        self.cardinality == Cardinality::Optional
    }

    /// Whether the element kind is an enum
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, FieldKind::Enum { .. })
    }

    /// Whether the element kind is a user message (well-known types excluded)
    pub fn is_message(&self) -> bool {
        matches!(self.kind, FieldKind::Message(_))
    }

    /// Whether the element kind is `google.protobuf.Timestamp`
    pub fn is_timestamp(&self) -> bool {
        self.kind == FieldKind::WellKnown(WellKnown::Timestamp)
    }

    /// Whether the element kind is `google.protobuf.Struct`
    pub fn is_proto_struct(&self) -> bool {
        self.kind == FieldKind::WellKnown(WellKnown::Struct)
    }

    /// Whether the element kind is `google.protobuf.Value`
    pub fn is_proto_value(&self) -> bool {
        self.kind == FieldKind::WellKnown(WellKnown::Value)
    }

    /// Whether the element kind is a scalar wrapper
    pub fn is_protobuf_wrapper(&self) -> bool {
        matches!(self.kind, FieldKind::WellKnown(WellKnown::Wrapper(_)))
    }

    /// Whether the element kind is a message or enum from another module
    pub fn is_message_from_package(&self) -> bool {
        match &self.kind {
            FieldKind::Message(target) => !target.package.same_module,
            FieldKind::Enum { package, .. } => !package.same_module,
            _ => false,
        }
    }

    /// Module location of the element type, for messages and enums
    pub fn module_package(&self) -> Option<&ModulePackage> {
        match &self.kind {
            FieldKind::Message(target) => Some(&target.package),
            FieldKind::Enum { package, .. } => Some(package),
            _ => None,
        }
    }

    /// Outbound bitflag annotation
    pub fn bitflag(&self) -> Option<&strata::Bitflag> {
        self.options.outbound.as_ref()?.bitflag.as_ref()
    }

    /// Whether the field is left out of the outbound form
    pub fn outbound_hidden(&self) -> bool {
        self.options.outbound.as_ref().is_some_and(|o| o.hide)
    }
}

/// Go identifier protoc-gen-go derives for a proto name
///
/// Underscores survive before digits and upper case letters, existing
/// capitals are kept, and a leading underscore becomes `X`.
pub fn go_camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let lower_at = |i: usize| chars.get(i).is_some_and(char::is_ascii_lowercase);
    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' if lower_at(i + 1) => {}
            '.' => out.push('_'),
            '_' if i == 0 || chars[i - 1] == '.' => out.push('X'),
            '_' if lower_at(i + 1) => {}
            c if c.is_ascii_digit() => out.push(c),
            c => {
                out.push(c.to_ascii_uppercase());
                while lower_at(i + 1) {
                    i += 1;
                    out.push(chars[i]);
                }
            }
        }
        i += 1;
    }
    out
}

fn kind_of(
    loader: &Loader<'_>,
    path: &str,
    desc: &FieldDescriptorProto,
) -> Result<FieldKind, GeneratorError> {
    let type_name = desc.type_name();
    match desc.r#type() {
        Type::Enum => Ok(FieldKind::Enum {
            type_name: type_name.to_string(),
            package: loader.registry.module_package(type_name, loader.module),
        }),
        Type::Message | Type::Group => {
            if let Some(wk) = WellKnown::from_type_name(type_name) {
                return Ok(FieldKind::WellKnown(wk));
            }
            let symbol = loader.symbols.get(type_name).ok_or_else(|| {
                GeneratorError::UnknownFieldType(format!(
                    "{} references unknown message {}",
                    path, type_name
                ))
            })?;
            let package = loader.registry.module_package(type_name, loader.module);
            if symbol.kind == MessageKind::Unknown {
                warn!(
                    field = path,
                    target = type_name,
                    "field references a message without a layer suffix"
                );
            }
            Ok(FieldKind::Message(MessageTarget {
                type_name: type_name.to_string(),
                names: LayerNames::derive(
                    &package.local_name,
                    symbol.kind,
                    &loader.settings.suffixes,
                ),
                package,
                kind: symbol.kind,
                outbound_hidden: symbol.outbound_hidden,
            }))
        }
        other => map_scalar(other)
            .map(FieldKind::Scalar)
            .ok_or_else(|| GeneratorError::UnknownFieldType(format!("{}: {:?}", path, other))),
    }
}
