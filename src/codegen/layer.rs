//! Per-layer field types
//!
//! | kind       | wire                     | domain / inbound | outbound   |
//! |------------|--------------------------|------------------|------------|
//! | enum       | `Enum`                   | `string`         | `string`   |
//! | message    | `*XWire`                 | `*XDomain`       | `*XOutbound` |
//! | Timestamp  | `*timestamppb.Timestamp` | `time.Time`      | `time.Time` |
//! | Struct     | `*structpb.Struct`       | `map[string]any` | same       |
//! | Value      | `*structpb.Value`        | `any`            | same       |
//! | wrapper    | `*wrapperspb.XValue`     | `*scalar`        | same       |
//!
//! Inbound fields holding a request message use `*XInbound` instead.

use crate::schema::{
    Cardinality, Field, FieldKind, Layer, MessageKind, Module, ModulePackage, WellKnown,
};
use crate::types::{Builtin, QualifiedRef, TypeRef};
use crate::GeneratorError;

/// Resolves field types for one module
#[derive(Debug, Clone, Copy)]
pub struct TypeResolver<'a> {
    module: &'a Module,
    test_mode: bool,
}

impl<'a> TypeResolver<'a> {
    /// Resolver for code living in `module`
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            test_mode: false,
        }
    }

    /// Qualify types of the current module too, for code in an external test package
    pub fn test_mode(self) -> Self {
        Self {
            test_mode: true,
            ..self
        }
    }

    /// Type of `field` in `layer`
    pub fn resolve(&self, field: &Field, layer: Layer) -> Result<TypeRef, GeneratorError> {
        if layer == Layer::Outbound {
            if field.bitflag().is_some() {
                return Ok(TypeRef::Builtin(Builtin::String).slice());
            }
            if let Some(custom) = custom_type(field)? {
                return Ok(wrap(field.cardinality, custom.type_ref()));
            }
        }

        let element = self.element(field, layer);
        let ty = match field.cardinality {
            Cardinality::Optional if layer != Layer::Wire && is_structural(&field.kind) => element,
            cardinality => wrap(cardinality, element),
        };
        Ok(ty)
    }

    /// Type of one element of `field` in `layer` (the value type for maps)
    pub fn element(&self, field: &Field, layer: Layer) -> TypeRef {
        match &field.kind {
            FieldKind::Scalar(b) => TypeRef::Builtin(*b),
            FieldKind::Enum { package, .. } => match layer {
                Layer::Wire => self.named(package, &package.local_name),
                _ => TypeRef::Builtin(Builtin::String),
            },
            FieldKind::WellKnown(wk) => well_known(*wk, layer),
            FieldKind::Message(target) => {
                let name = match layer {
                    Layer::Wire => &target.names.wire,
                    Layer::Domain => &target.names.domain,
                    Layer::Inbound if target.kind == MessageKind::WireInput => {
                        &target.names.inbound
                    }
                    Layer::Inbound => &target.names.domain,
                    Layer::Outbound => &target.names.outbound,
                };
                self.named(&target.package, name).pointer()
            }
        }
    }

    fn named(&self, package: &ModulePackage, name: &str) -> TypeRef {
        if package.same_module && !self.test_mode {
            TypeRef::Named(name.to_string())
        } else if package.same_module {
            TypeRef::qualified(self.module.go_name.clone(), name)
        } else {
            TypeRef::qualified(package.go_name.clone(), name)
        }
    }
}

/// Outbound `custom_type`, parsed
pub(crate) fn custom_type(field: &Field) -> Result<Option<QualifiedRef>, GeneratorError> {
    let Some(reference) = field
        .options
        .outbound
        .as_ref()
        .map(|o| o.custom_type.as_str())
        .filter(|t| !t.is_empty())
    else {
        return Ok(None);
    };
    QualifiedRef::parse(reference).map(Some).ok_or_else(|| {
        GeneratorError::Lookup(format!(
            "{}: custom_type `{}` is not a fully qualified reference",
            field.path(),
            reference
        ))
    })
}

fn wrap(cardinality: Cardinality, element: TypeRef) -> TypeRef {
    match cardinality {
        Cardinality::Singular => element,
        Cardinality::Optional => element.pointer(),
        Cardinality::Array => element.slice(),
        Cardinality::Map { key } => TypeRef::Map(Box::new(TypeRef::Builtin(key)), Box::new(element)),
    }
}

/// Structural map/any types are never pointered outside the wire layer
fn is_structural(kind: &FieldKind) -> bool {
    matches!(
        kind,
        FieldKind::WellKnown(WellKnown::Struct) | FieldKind::WellKnown(WellKnown::Value)
    )
}

fn well_known(wk: WellKnown, layer: Layer) -> TypeRef {
    match (wk, layer) {
        (WellKnown::Timestamp, Layer::Wire) => {
            TypeRef::qualified("timestamppb", "Timestamp").pointer()
        }
        (WellKnown::Timestamp, _) => TypeRef::time(),
        (WellKnown::Struct, Layer::Wire) => TypeRef::qualified("structpb", "Struct").pointer(),
        (WellKnown::Struct, _) => TypeRef::generic_map(),
        (WellKnown::Value, Layer::Wire) => TypeRef::qualified("structpb", "Value").pointer(),
        (WellKnown::Value, _) => TypeRef::Builtin(Builtin::Any),
        (WellKnown::Wrapper(b), Layer::Wire) => {
            TypeRef::qualified("wrapperspb", WellKnown::wrapper_name(b)).pointer()
        }
        (WellKnown::Wrapper(b), _) => TypeRef::Builtin(b).pointer(),
    }
}
