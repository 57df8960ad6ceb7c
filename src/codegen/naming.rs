//! Per-layer field names

use crate::schema::{Field, Layer, Message, Naming};
use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

/// Field identifiers per layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    /// Domain struct identifier (also used by the inbound struct)
    pub domain: String,
    /// Outbound struct identifier
    pub outbound: String,
    /// Inbound key, already case-folded
    pub inbound: String,
}

/// Resolve the names of `field` in every layer
pub fn resolve(field: &Field, message: &Message) -> FieldNames {
    let domain = field
        .options
        .domain
        .as_ref()
        .map(|d| d.name.as_str())
        .filter(|n| !n.is_empty())
        .map(|n| n.to_upper_camel_case())
        .unwrap_or_else(|| field.go_name.clone());

    let inbound_source = field
        .options
        .inbound
        .as_ref()
        .map(|i| i.name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(&domain);
    let inbound = serialized_key(inbound_source, message.naming(Layer::Inbound));

    FieldNames {
        outbound: field.go_name.clone(),
        inbound,
        domain,
    }
}

/// Case-fold `name` into a serialized key
pub fn serialized_key(name: &str, naming: Naming) -> String {
    match naming {
        Naming::Snake => name.to_snake_case(),
        Naming::Camel => name.to_lower_camel_case(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_key() {
        assert_eq!(serialized_key("CreatedAt", Naming::Snake), "created_at");
        assert_eq!(serialized_key("CreatedAt", Naming::Camel), "createdAt");
        assert_eq!(serialized_key("user_ref", Naming::Camel), "userRef");
        assert_eq!(serialized_key("Id", Naming::Snake), "id");
    }
}
