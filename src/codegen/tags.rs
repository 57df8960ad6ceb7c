//! Struct tags per layer

use super::column::{self, Column};
use super::naming::{serialized_key, FieldNames};
use crate::schema::{Field, Layer, Message};
use crate::settings::Settings;

/// Rendered struct tags (without backticks) per layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTags {
    /// Domain struct tag, including the database tag
    pub domain: String,
    /// Inbound struct tag
    pub inbound: String,
    /// Outbound struct tag
    pub outbound: String,
}

/// Serialized keys per layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    /// Domain key
    pub domain: String,
    /// Inbound key
    pub inbound: String,
    /// Outbound key
    pub outbound: String,
}

/// Serialized keys of `field` in each layer
pub fn keys(field: &Field, names: &FieldNames, message: &Message) -> FieldKeys {
    let outbound = field
        .options
        .outbound
        .as_ref()
        .map(|o| o.name.as_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| serialized_key(&names.outbound, message.naming(Layer::Outbound)));

    FieldKeys {
        domain: serialized_key(&names.domain, message.naming(Layer::Domain)),
        inbound: names.inbound.clone(),
        outbound,
    }
}

/// Build the tags of `field` in every layer
pub fn build(field: &Field, names: &FieldNames, message: &Message, settings: &Settings) -> FieldTags {
    let keys = keys(field, names, message);
    let opts = &field.options;

    let domain_allow_empty = opts.domain.as_ref().is_some_and(|d| d.allow_empty);
    let inbound_allow_empty = opts.inbound.as_ref().is_some_and(|i| i.allow_empty);
    let outbound_allow_empty = opts.outbound.as_ref().is_some_and(|o| o.allow_empty);

    let mut domain = vec![json_tag(&keys.domain, domain_allow_empty)];
    let db = column::tagger(settings.database).tag(&Column {
        key: &keys.domain,
        domain_name: &names.domain,
        options: opts.db.as_ref(),
        allow_empty: domain_allow_empty,
    });
    domain.extend(db);

    let mut inbound = vec![json_tag(&keys.inbound, inbound_allow_empty)];
    let mut outbound = vec![json_tag(&keys.outbound, outbound_allow_empty)];

    for tag in &opts.tags {
        let custom = format!(r#"{}:"{}""#, tag.name, tag.value);
        domain.push(custom.clone());
        inbound.push(custom.clone());
        outbound.push(custom);
    }

    FieldTags {
        domain: domain.join(" "),
        inbound: inbound.join(" "),
        outbound: outbound.join(" "),
    }
}

fn json_tag(key: &str, allow_empty: bool) -> String {
    if allow_empty {
        format!(r#"json:"{}""#, key)
    } else {
        format!(r#"json:"{},omitempty""#, key)
    }
}
