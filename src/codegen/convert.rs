//! Conversion expressions between layers
//!
//! For every field and direction this builds the Go expression that turns the
//! source value into the target layer's value. Dispatch, first match wins:
//!
//! 1. outbound bitflag / custom converter
//! 2. enum
//! 3. `google.protobuf.Value`
//! 4. `google.protobuf.Timestamp`
//! 5. `google.protobuf.Struct`
//! 6. scalar wrappers
//! 7. user messages (the nested value's own conversion method)
//! 8. plain field access
//!
//! Arrays and maps run their elements through the same table and wrap the
//! element converter in `MapSlice`/`MapValues`.

use super::go_string;
use super::layer::TypeResolver;
use super::naming::FieldNames;
use crate::schema::{
    Cardinality, Field, FieldKind, Layer, Message, MessageKind, MessageTarget, Module,
    ModuleRegistry, WellKnown,
};
use crate::settings::Settings;
use crate::types::{GoRenderer, QualifiedRef, TypeRenderer};
use crate::GeneratorError;
use heck::ToShoutySnakeCase;

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Wire to domain (`IntoDomain`)
    WireToDomain,
    /// Domain to wire (`IntoWire`)
    DomainToWire,
    /// Wire to outbound (`IntoOutboundOrNil`)
    WireToOutbound,
    /// Inbound to wire (`IntoWireInput`)
    InboundToWire,
}

impl Direction {
    /// Receiver variable of the generated method
    pub fn receiver(self) -> &'static str {
        match self {
            Direction::WireToDomain | Direction::WireToOutbound => "w",
            Direction::DomainToWire => "d",
            Direction::InboundToWire => "in",
        }
    }

    /// Layer the value is read from
    pub fn source_layer(self) -> Layer {
        match self {
            Direction::WireToDomain | Direction::WireToOutbound => Layer::Wire,
            Direction::DomainToWire => Layer::Domain,
            Direction::InboundToWire => Layer::Inbound,
        }
    }

    /// Whether values move away from the wire layer
    fn from_wire(self) -> bool {
        matches!(self, Direction::WireToDomain | Direction::WireToOutbound)
    }
}

/// Converts one element value
#[derive(Debug, Clone, PartialEq, Eq)]
enum Converter {
    /// Value is used as is
    Identity,
    /// Plain function, e.g. `convert.TimestampToTime`
    Func(String),
    /// Method on the value's type, e.g. `(*ItemWire).IntoDomain`
    Method { owner: String, method: &'static str },
}

impl Converter {
    fn apply(&self, value: &str) -> String {
        match self {
            Converter::Identity => value.to_string(),
            Converter::Func(f) => format!("{}({})", f, value),
            Converter::Method { method, .. } => format!("{}.{}()", value, method),
        }
    }

    /// Function value form, for passing to the slice/map helpers
    fn as_func(&self) -> Option<String> {
        match self {
            Converter::Identity => None,
            Converter::Func(f) => Some(f.clone()),
            Converter::Method { owner, method } => Some(format!("({}).{}", owner, method)),
        }
    }
}

/// Conversion expressions of one field, per direction that applies to its message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversions {
    /// Wire messages: value for the domain struct
    pub into_domain: Option<String>,
    /// Wire messages: value for the wire struct, from the domain struct
    pub into_wire: Option<String>,
    /// Wire and response messages: value for the outbound struct
    pub into_outbound: Option<String>,
    /// Request messages: value for the wire struct, from the inbound struct
    pub into_wire_input: Option<String>,
}

impl Conversions {
    /// All present expressions
    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        [
            &self.into_domain,
            &self.into_wire,
            &self.into_outbound,
            &self.into_wire_input,
        ]
        .into_iter()
        .filter_map(|e| e.as_deref())
    }
}

/// Fail when `target` is never generated in the layer `direction` needs
fn check_target(
    field: &Field,
    target: &MessageTarget,
    direction: Direction,
) -> Result<(), GeneratorError> {
    let (generated, form) = match direction {
        Direction::WireToDomain | Direction::DomainToWire => {
            (target.kind == MessageKind::Wire, "domain")
        }
        Direction::WireToOutbound => (
            matches!(target.kind, MessageKind::Wire | MessageKind::WireOutput)
                && !target.outbound_hidden,
            "outbound",
        ),
        Direction::InboundToWire => (
            matches!(target.kind, MessageKind::Wire | MessageKind::WireInput),
            "inbound",
        ),
    };
    if generated {
        return Ok(());
    }
    Err(GeneratorError::schema(
        field.path(),
        format!(
            "references {} which has no {} form; rename it with a layer suffix or hide the field",
            target.names.wire, form
        ),
    ))
}

/// Builds conversion expressions for one module
pub struct ConversionBuilder<'a> {
    settings: &'a Settings,
    module: &'a Module,
    registry: &'a ModuleRegistry,
    types: TypeResolver<'a>,
}

impl<'a> ConversionBuilder<'a> {
    /// Builder for code living in `module`
    pub fn new(settings: &'a Settings, module: &'a Module, registry: &'a ModuleRegistry) -> Self {
        Self {
            settings,
            module,
            registry,
            types: TypeResolver::new(module),
        }
    }

    /// Build every conversion `message` needs for `field`
    pub fn build(
        &self,
        field: &Field,
        names: &FieldNames,
        message: &Message,
    ) -> Result<Conversions, GeneratorError> {
        let mut conversions = Conversions::default();
        if message.has_domain() {
            conversions.into_domain = Some(self.expression(field, names, Direction::WireToDomain)?);
            conversions.into_wire = Some(self.expression(field, names, Direction::DomainToWire)?);
        }
        if message.has_outbound() && !field.outbound_hidden() {
            conversions.into_outbound =
                Some(self.expression(field, names, Direction::WireToOutbound)?);
        }
        if message.has_inbound() {
            conversions.into_wire_input =
                Some(self.expression(field, names, Direction::InboundToWire)?);
        }
        Ok(conversions)
    }

    /// Expression converting `field` in `direction`
    pub fn expression(
        &self,
        field: &Field,
        names: &FieldNames,
        direction: Direction,
    ) -> Result<String, GeneratorError> {
        let source_name = match direction.source_layer() {
            Layer::Wire => &field.go_name,
            _ => &names.domain,
        };
        let src = format!("{}.{}", direction.receiver(), source_name);

        if direction == Direction::WireToOutbound {
            if let Some(expr) = self.bitflag(field, &src) {
                return Ok(expr);
            }
            if let Some(bind) = custom_bind(field)? {
                return Ok(self.wrap(field, &Converter::Func(bind.call()), &src));
            }
            if super::layer::custom_type(field)?.is_some() {
                return Err(GeneratorError::annotation(
                    field.path(),
                    "custom_type requires a custom_bind converter",
                ));
            }
        }
        if let FieldKind::Message(target) = &field.kind {
            check_target(field, target, direction)?;
        }

        let converter = self.element_converter(field, direction);
        Ok(self.wrap(field, &converter, &src))
    }

    /// Apply `converter` to `src` according to the field's cardinality
    fn wrap(&self, field: &Field, converter: &Converter, src: &str) -> String {
        let helper = |name: &str, f: String| {
            format!("{}({}, {})", self.settings.converters.call(name), src, f)
        };
        match field.cardinality {
            Cardinality::Map { .. } => match converter.as_func() {
                Some(f) => helper("MapValues", f),
                None => src.to_string(),
            },
            Cardinality::Array => match converter.as_func() {
                Some(f) => helper("MapSlice", f),
                None => src.to_string(),
            },
            Cardinality::Optional if field.is_enum() => match converter.as_func() {
                Some(f) => helper("MapPtr", f),
                None => src.to_string(),
            },
            _ => converter.apply(src),
        }
    }

    fn element_converter(&self, field: &Field, direction: Direction) -> Converter {
        let conv = |helper: &str| Converter::Func(self.settings.converters.call(helper));
        let optional = field.is_optional();

        match &field.kind {
            FieldKind::Enum { package, .. } => {
                let qualifier = if package.same_module || package.go_name.is_empty() {
                    String::new()
                } else {
                    format!("{}.", package.go_name)
                };
                let helper = if direction.from_wire() {
                    "ToString"
                } else {
                    "FromString"
                };
                Converter::Func(format!("{}{}{}", qualifier, package.local_name, helper))
            }
            FieldKind::WellKnown(WellKnown::Value) if direction.from_wire() => conv("ValueToAny"),
            FieldKind::WellKnown(WellKnown::Value) => conv("AnyToValue"),
            FieldKind::WellKnown(WellKnown::Timestamp) => match (direction.from_wire(), optional) {
                (true, true) => conv("TimestampToTimePtr"),
                (true, false) => conv("TimestampToTime"),
                (false, true) => conv("TimePtrToTimestamp"),
                (false, false) => conv("TimeToTimestamp"),
            },
            FieldKind::WellKnown(WellKnown::Struct) if direction.from_wire() => conv("StructToMap"),
            FieldKind::WellKnown(WellKnown::Struct) => conv("MapToStruct"),
            FieldKind::WellKnown(WellKnown::Wrapper(b)) => {
                let prefix = if direction.from_wire() { "From" } else { "To" };
                conv(&format!("{}{}", prefix, WellKnown::wrapper_name(*b)))
            }
            FieldKind::Message(target) => {
                let owner = GoRenderer.render(&self.types.element(field, direction.source_layer()));
                let method = match direction {
                    Direction::WireToDomain => "IntoDomain",
                    Direction::DomainToWire => "IntoWire",
                    Direction::WireToOutbound => "IntoOutboundOrNil",
                    Direction::InboundToWire if target.kind == MessageKind::WireInput => {
                        "IntoWireInput"
                    }
                    Direction::InboundToWire => "IntoWire",
                };
                Converter::Method { owner, method }
            }
            FieldKind::Scalar(_) => Converter::Identity,
        }
    }

    /// `convert.BitflagToStrings(src, Enum_name, "PREFIX_")` for bitflag fields
    fn bitflag(&self, field: &Field, src: &str) -> Option<String> {
        let bitflag = field.bitflag()?;
        let reference = bitflag.r#enum.trim_start_matches('.');

        let (qualifier, local) = if reference.contains('.') {
            let package = self
                .registry
                .module_package(&format!(".{}", reference), self.module);
            let qualifier = if package.same_module || package.go_name.is_empty() {
                String::new()
            } else {
                format!("{}.", package.go_name)
            };
            (qualifier, package.local_name)
        } else {
            (String::new(), reference.to_string())
        };

        let prefix = if bitflag.prefix.is_empty() {
            format!("{}_", local.to_shouty_snake_case())
        } else {
            bitflag.prefix.clone()
        };

        Some(format!(
            "{}({}, {}{}_name, {})",
            self.settings.converters.call("BitflagToStrings"),
            src,
            qualifier,
            local,
            go_string(&prefix)
        ))
    }
}

/// Outbound `custom_bind`, parsed
fn custom_bind(field: &Field) -> Result<Option<QualifiedRef>, GeneratorError> {
    let Some(reference) = field
        .options
        .outbound
        .as_ref()
        .map(|o| o.custom_bind.as_str())
        .filter(|b| !b.is_empty())
    else {
        return Ok(None);
    };
    QualifiedRef::parse(reference).map(Some).ok_or_else(|| {
        GeneratorError::Lookup(format!(
            "{}: custom_bind `{}` is not a fully qualified reference",
            field.path(),
            reference
        ))
    })
}

/// Fully qualified references a field's annotations pull into generated code
pub fn custom_references(field: &Field) -> Vec<String> {
    let Some(outbound) = field.options.outbound.as_ref() else {
        return Vec::new();
    };
    [&outbound.custom_type, &outbound.custom_bind]
        .into_iter()
        .filter(|r| !r.is_empty())
        .cloned()
        .collect()
}
