//! Messages and enums

use super::field::Field;
use super::{qualify, Layer, Loader};
use crate::options::{self, strata};
use crate::settings::Suffixes;
use crate::GeneratorError;
use prost_types::{DescriptorProto, EnumDescriptorProto};
use tracing::warn;

/// Architectural kind of a message, derived from its name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Transport message owning domain and outbound forms
    Wire,
    /// Request message owning an inbound form
    WireInput,
    /// Response message owning an outbound form
    WireOutput,
    /// Name matches no configured suffix
    Unknown,
}

impl MessageKind {
    /// Classify `name` against the configured suffixes
    ///
    /// A name equal to a suffix (e.g. `Wire`) has no base name and is `Unknown`.
    pub fn from_name(name: &str, suffixes: &Suffixes) -> Self {
        let matches = |suffix: &str| name.len() > suffix.len() && name.ends_with(suffix);
        if matches(&suffixes.wire) {
            MessageKind::Wire
        } else if matches(&suffixes.wire_input) {
            MessageKind::WireInput
        } else if matches(&suffixes.wire_output) {
            MessageKind::WireOutput
        } else {
            MessageKind::Unknown
        }
    }

    /// Name with this kind's suffix removed
    pub fn base_name<'n>(&self, name: &'n str, suffixes: &Suffixes) -> &'n str {
        let suffix = match self {
            MessageKind::Wire => &suffixes.wire,
            MessageKind::WireInput => &suffixes.wire_input,
            MessageKind::WireOutput => &suffixes.wire_output,
            MessageKind::Unknown => return name,
        };
        name.strip_suffix(suffix.as_str()).unwrap_or(name)
    }
}

/// Serialized key casing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Naming {
    /// `created_at`
    #[default]
    Snake,
    /// `createdAt`
    Camel,
}

impl From<strata::Naming> for Naming {
    fn from(naming: strata::Naming) -> Self {
        match naming {
            strata::Naming::CamelCase => Naming::Camel,
            strata::Naming::Unspecified | strata::Naming::SnakeCase => Naming::Snake,
        }
    }
}

/// Generated type names of one message, one per layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerNames {
    /// protoc-gen-go name, e.g. `UserWire`
    pub wire: String,
    /// e.g. `UserDomain`
    pub domain: String,
    /// e.g. `UserOutbound`
    pub outbound: String,
    /// e.g. `CreateUserInbound`
    pub inbound: String,
}

impl LayerNames {
    /// Derive layer names from a wire name and its kind
    pub fn derive(wire: &str, kind: MessageKind, suffixes: &Suffixes) -> Self {
        let base = kind.base_name(wire, suffixes);
        Self {
            wire: wire.to_string(),
            domain: format!("{}{}", base, suffixes.domain),
            outbound: format!("{}{}", base, suffixes.outbound),
            inbound: format!("{}{}", base, suffixes.inbound),
        }
    }
}

/// One protobuf message plus derived facts
#[derive(Debug, Clone)]
pub struct Message {
    /// Go name of the wire type (nested names joined by `_`)
    pub name: String,
    /// Fully qualified protobuf name, without leading dot
    pub full_name: String,
    /// Architectural kind
    pub kind: MessageKind,
    /// Generated names per layer
    pub names: LayerNames,
    /// Surfaced fields in declaration order
    pub fields: Vec<Field>,
    /// Message-level annotations
    pub options: strata::MessageOptions,
}

impl Message {
    pub(crate) fn from_descriptor(
        loader: &Loader<'_>,
        scope: &str,
        go_prefix: &str,
        desc: &DescriptorProto,
    ) -> Result<Self, GeneratorError> {
        let full_name = qualify(scope, desc.name());
        let name = format!("{}{}", go_prefix, desc.name());
        let kind = MessageKind::from_name(desc.name(), &loader.settings.suffixes);
        let names = LayerNames::derive(&name, kind, &loader.settings.suffixes);
        let options =
            options::parse_message_options(loader.index, &full_name, desc)?.unwrap_or_default();

        let mut fields = Vec::new();
        for field in &desc.field {
            // Real oneof members have no layer representation; synthetic
            // oneofs of proto3 `optional` fields are plain optional fields
            if field.oneof_index.is_some() && !field.proto3_optional() {
                warn!(
                    message = %full_name,
                    field = field.name(),
                    "skipping oneof member"
                );
                continue;
            }
            fields.push(Field::from_descriptor(loader, &name, &full_name, field)?);
        }

        Ok(Self {
            name,
            full_name,
            kind,
            names,
            fields,
            options,
        })
    }

    /// Serialized key casing for `layer`
    pub fn naming(&self, layer: Layer) -> Naming {
        let opts = match layer {
            Layer::Wire => None,
            Layer::Domain => self.options.domain.as_ref(),
            Layer::Inbound => self.options.inbound.as_ref(),
            Layer::Outbound => self.options.outbound.as_ref(),
        };
        opts.map(|o| o.naming().into()).unwrap_or_default()
    }

    /// Whether a domain type is generated
    pub fn has_domain(&self) -> bool {
        self.kind == MessageKind::Wire
    }

    /// Whether an outbound type is generated
    pub fn has_outbound(&self) -> bool {
        matches!(self.kind, MessageKind::Wire | MessageKind::WireOutput)
            && !self.outbound_hidden()
    }

    /// Whether an inbound type is generated
    pub fn has_inbound(&self) -> bool {
        self.kind == MessageKind::WireInput
    }

    /// Whether the message opted out of the outbound layer
    pub fn outbound_hidden(&self) -> bool {
        self.options.outbound.as_ref().is_some_and(|o| o.hide)
    }

    /// Find a field by protobuf name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One enum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Protobuf value name, e.g. `ROLE_ADMIN`
    pub name: String,
    /// Wire number
    pub number: i32,
}

/// One protobuf enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    /// Go name (nested names joined by `_`)
    pub name: String,
    /// Fully qualified protobuf name, without leading dot
    pub full_name: String,
    /// Values in declaration order
    pub values: Vec<EnumValue>,
}

impl Enum {
    pub(crate) fn from_descriptor(desc: &EnumDescriptorProto, scope: &str, go_prefix: &str) -> Self {
        Self {
            name: format!("{}{}", go_prefix, desc.name()),
            full_name: qualify(scope, desc.name()),
            values: desc
                .value
                .iter()
                .map(|v| EnumValue {
                    name: v.name().to_string(),
                    number: v.number(),
                })
                .collect(),
        }
    }
}
