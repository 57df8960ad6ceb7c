//! Type descriptors and their target-language renderings
//!
//! Resolvers build [`TypeRef`] values; text is only produced at the end by a
//! [`TypeRenderer`], one per output language.

use crate::settings::is_version_segment;
use prost_types::field_descriptor_proto::Type;

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Boolean
    Bool,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 32-bit integer
    Uint32,
    /// Unsigned 64-bit integer
    Uint64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// UTF-8 string
    String,
    /// Byte slice
    Bytes,
    /// Open type (`any`)
    Any,
}

impl Builtin {
    /// Whether values of this type are numbers
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Builtin::Bool | Builtin::String | Builtin::Bytes | Builtin::Any
        )
    }
}

/// A structured type reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Built-in scalar
    Builtin(Builtin),
    /// Type declared in the package being generated
    Named(String),
    /// Type from another package
    Qualified {
        /// Package identifier
        package: String,
        /// Type name within the package
        name: String,
    },
    /// Nullable indirection
    Pointer(Box<TypeRef>),
    /// Ordered list
    Slice(Box<TypeRef>),
    /// Map from key to value
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    /// Shorthand for a qualified type
    pub fn qualified(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeRef::Qualified {
            package: package.into(),
            name: name.into(),
        }
    }

    /// `time.Time`
    pub fn time() -> Self {
        TypeRef::qualified("time", "Time")
    }

    /// `map[string]any`
    pub fn generic_map() -> Self {
        TypeRef::Map(
            Box::new(TypeRef::Builtin(Builtin::String)),
            Box::new(TypeRef::Builtin(Builtin::Any)),
        )
    }

    /// Wrap in a pointer; pointers are never doubled
    pub fn pointer(self) -> Self {
        match self {
            TypeRef::Pointer(_) => self,
            other => TypeRef::Pointer(Box::new(other)),
        }
    }

    /// Wrap in a slice
    pub fn slice(self) -> Self {
        TypeRef::Slice(Box::new(self))
    }

    /// Whether the outermost layer is a pointer
    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeRef::Pointer(_))
    }
}

/// Map a protobuf scalar type to a built-in
///
/// Returns `None` for enum, message and group types.
pub fn map_scalar(ty: Type) -> Option<Builtin> {
    let builtin = match ty {
        Type::Double => Builtin::Float64,
        Type::Float => Builtin::Float32,
        Type::Int64 | Type::Sint64 | Type::Sfixed64 => Builtin::Int64,
        Type::Uint64 | Type::Fixed64 => Builtin::Uint64,
        Type::Int32 | Type::Sint32 | Type::Sfixed32 => Builtin::Int32,
        Type::Uint32 | Type::Fixed32 => Builtin::Uint32,
        Type::Bool => Builtin::Bool,
        Type::String => Builtin::String,
        Type::Bytes => Builtin::Bytes,
        Type::Enum | Type::Message | Type::Group => return None,
    };
    Some(builtin)
}

/// Renders type references as source text
pub trait TypeRenderer {
    /// Render one type
    fn render(&self, ty: &TypeRef) -> String;
}

/// Renders Go type expressions
#[derive(Debug, Clone, Copy, Default)]
pub struct GoRenderer;

impl TypeRenderer for GoRenderer {
    fn render(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Builtin(b) => match b {
                Builtin::Bool => "bool",
                Builtin::Int32 => "int32",
                Builtin::Int64 => "int64",
                Builtin::Uint32 => "uint32",
                Builtin::Uint64 => "uint64",
                Builtin::Float32 => "float32",
                Builtin::Float64 => "float64",
                Builtin::String => "string",
                Builtin::Bytes => "[]byte",
                Builtin::Any => "any",
            }
            .to_string(),
            TypeRef::Named(name) => name.clone(),
            TypeRef::Qualified { package, name } if package.is_empty() => name.clone(),
            TypeRef::Qualified { package, name } => format!("{}.{}", package, name),
            TypeRef::Pointer(inner) => format!("*{}", self.render(inner)),
            TypeRef::Slice(inner) => format!("[]{}", self.render(inner)),
            TypeRef::Map(key, value) => {
                format!("map[{}]{}", self.render(key), self.render(value))
            }
        }
    }
}

/// Renders Rust type paths for the domain cross-translation
#[derive(Debug, Clone, Copy, Default)]
pub struct RustRenderer;

impl TypeRenderer for RustRenderer {
    fn render(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Builtin(b) => match b {
                Builtin::Bool => "bool",
                Builtin::Int32 => "i32",
                Builtin::Int64 => "i64",
                Builtin::Uint32 => "u32",
                Builtin::Uint64 => "u64",
                Builtin::Float32 => "f32",
                Builtin::Float64 => "f64",
                Builtin::String => "String",
                Builtin::Bytes => "Vec<u8>",
                Builtin::Any => "serde_json::Value",
            }
            .to_string(),
            TypeRef::Named(name) => name.clone(),
            TypeRef::Qualified { package, name } if package == "time" && name == "Time" => {
                "chrono::DateTime<chrono::Utc>".to_string()
            }
            TypeRef::Qualified { package, name } if package.is_empty() => name.clone(),
            TypeRef::Qualified { package, name } => format!("{}::{}", package, name),
            // Named types are boxed so recursive messages stay sized
            TypeRef::Pointer(inner) => match inner.as_ref() {
                TypeRef::Named(_) => format!("Option<Box<{}>>", self.render(inner)),
                TypeRef::Qualified { package, .. } if package != "time" => {
                    format!("Option<Box<{}>>", self.render(inner))
                }
                _ => format!("Option<{}>", self.render(inner)),
            },
            TypeRef::Slice(inner) => format!("Vec<{}>", self.render(inner)),
            TypeRef::Map(key, value) => format!(
                "std::collections::HashMap<{}, {}>",
                self.render(key),
                self.render(value)
            ),
        }
    }
}

/// A fully qualified Go reference such as `github.com/acme/money.Format`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedRef {
    /// Import path of the package
    pub path: String,
    /// Package identifier
    pub package: String,
    /// Exported name within the package
    pub name: String,
}

impl QualifiedRef {
    /// Parse `import/path.Name`; the path must contain at least one `/`
    pub fn parse(reference: &str) -> Option<Self> {
        let (dir, last) = reference.rsplit_once('/')?;
        let (segment, name) = last.split_once('.')?;
        if dir.is_empty() || segment.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }

        let package = if is_version_segment(segment) {
            dir.rsplit('/').next().unwrap_or(segment)
        } else {
            segment
        };

        Some(Self {
            path: format!("{}/{}", dir, segment),
            package: package.replace('-', "_"),
            name: name.to_string(),
        })
    }

    /// Call target in source form, e.g. `money.Format`
    pub fn call(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }

    /// The referenced type
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::qualified(self.package.clone(), self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_scalar() {
        assert_eq!(map_scalar(Type::Sint64), Some(Builtin::Int64));
        assert_eq!(map_scalar(Type::Fixed32), Some(Builtin::Uint32));
        assert_eq!(map_scalar(Type::Bytes), Some(Builtin::Bytes));
        assert_eq!(map_scalar(Type::Message), None);
    }

    #[test]
    fn test_go_rendering() {
        let go = GoRenderer;
        let ty = TypeRef::Map(
            Box::new(TypeRef::Builtin(Builtin::String)),
            Box::new(TypeRef::qualified("common", "AddressDomain").pointer()),
        );
        assert_eq!(go.render(&ty), "map[string]*common.AddressDomain");
        assert_eq!(
            go.render(&TypeRef::Named("ItemWire".to_string()).pointer().slice()),
            "[]*ItemWire"
        );
        assert_eq!(go.render(&TypeRef::generic_map()), "map[string]any");
    }

    #[test]
    fn test_pointer_is_not_doubled() {
        let ty = TypeRef::time().pointer().pointer();
        assert_eq!(GoRenderer.render(&ty), "*time.Time");
        assert!(ty.is_pointer());
        assert_eq!(ty, TypeRef::time().pointer());
    }

    #[test]
    fn test_rust_rendering() {
        let rust = RustRenderer;
        assert_eq!(
            rust.render(&TypeRef::time().pointer()),
            "Option<chrono::DateTime<chrono::Utc>>"
        );
        assert_eq!(
            rust.render(&TypeRef::Named("UserDomain".to_string()).pointer()),
            "Option<Box<UserDomain>>"
        );
        assert_eq!(
            rust.render(&TypeRef::Builtin(Builtin::Bytes).slice()),
            "Vec<Vec<u8>>"
        );
    }

    #[test]
    fn test_qualified_ref() {
        let r = QualifiedRef::parse("github.com/shopspring/decimal.Decimal").unwrap();
        assert_eq!(r.path, "github.com/shopspring/decimal");
        assert_eq!(r.call(), "decimal.Decimal");

        let versioned = QualifiedRef::parse("github.com/acme/money/v2.Format").unwrap();
        assert_eq!(versioned.path, "github.com/acme/money/v2");
        assert_eq!(versioned.package, "money");

        assert!(QualifiedRef::parse("money.Format").is_none());
        assert!(QualifiedRef::parse("github.com/acme/money").is_none());
    }
}
