//! Options parsing for strata protobuf extensions
//!
//! This module handles parsing of `(strata.field)`, `(strata.message)` and
//! `(strata.method)` options from protobuf descriptors.
//!
//! Custom protobuf extensions are stored as extension fields in the options
//! messages, which prost drops when it decodes a `CodeGeneratorRequest`. The
//! plugin therefore decodes the raw request a second time with prost-reflect,
//! using a descriptor pool built from the request's own files, and records the
//! extension values in an [`OptionsIndex`]. When no extension data is present
//! the `uninterpreted_option` aggregates are parsed instead.

use crate::GeneratorError;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, ExtensionDescriptor, Value};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, MethodDescriptorProto, UninterpretedOption,
};
use std::collections::HashMap;

/// Generated option types from `proto/strata/options.proto`
///
/// These types represent the custom protobuf extensions used to annotate
/// fields, messages and methods with layer configuration.
#[allow(missing_docs)]
pub mod strata {
    include!(concat!(env!("OUT_DIR"), "/strata.rs"));
}

/// Extension name for field options
const FIELD_EXTENSION_NAME: &str = "strata.field";

/// Extension name for message options
const MESSAGE_EXTENSION_NAME: &str = "strata.message";

/// Extension name for method options
const METHOD_EXTENSION_NAME: &str = "strata.method";

/// The parts of a `CodeGeneratorRequest` needed to rebuild a descriptor pool.
///
/// `proto_file` is kept as raw bytes so that extension fields survive.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawCodeGeneratorRequest {
    /// Files protoc asked the plugin to generate
    #[prost(string, repeated, tag = "1")]
    pub file_to_generate: Vec<String>,
    /// Plugin parameter string
    #[prost(string, optional, tag = "2")]
    pub parameter: Option<String>,
    /// Encoded `FileDescriptorProto`s, dependencies first
    #[prost(bytes = "vec", repeated, tag = "15")]
    pub proto_file: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct RawFileDescriptorSet {
    #[prost(bytes = "vec", repeated, tag = "1")]
    file: Vec<Vec<u8>>,
}

/// Build a descriptor pool from the encoded files of a request
pub fn build_descriptor_pool(proto_files: &[Vec<u8>]) -> Result<DescriptorPool, GeneratorError> {
    let set = RawFileDescriptorSet {
        file: proto_files.to_vec(),
    };
    DescriptorPool::decode(set.encode_to_vec().as_slice())
        .map_err(|e| GeneratorError::DecodeError(format!("Failed to build descriptor pool: {}", e)))
}

/// Strata options recovered from extension data, keyed by descriptor name.
///
/// Message and method keys are fully qualified names without the leading dot;
/// field keys pair the owning message name with the field number.
#[derive(Debug, Clone, Default)]
pub struct OptionsIndex {
    messages: HashMap<String, strata::MessageOptions>,
    fields: HashMap<(String, i32), strata::FieldOptions>,
    methods: HashMap<String, strata::MethodOptions>,
}

impl OptionsIndex {
    /// Collect every strata extension value present in `pool`
    pub fn from_pool(pool: &DescriptorPool) -> Result<Self, GeneratorError> {
        let mut index = OptionsIndex::default();

        let field_ext = pool.get_extension_by_name(FIELD_EXTENSION_NAME);
        let message_ext = pool.get_extension_by_name(MESSAGE_EXTENSION_NAME);
        let method_ext = pool.get_extension_by_name(METHOD_EXTENSION_NAME);

        for message in pool.all_messages() {
            let full_name = message.full_name().to_string();

            if let Some(ext) = message_ext.as_ref() {
                if let Some(opts) = decode_extension(&message.options(), ext)? {
                    index.messages.insert(full_name.clone(), opts);
                }
            }

            if let Some(ext) = field_ext.as_ref() {
                for field in message.fields() {
                    if let Some(opts) = decode_extension(&field.options(), ext)? {
                        index
                            .fields
                            .insert((full_name.clone(), field.number() as i32), opts);
                    }
                }
            }
        }

        if let Some(ext) = method_ext.as_ref() {
            for service in pool.services() {
                for method in service.methods() {
                    if let Some(opts) = decode_extension(&method.options(), ext)? {
                        index.methods.insert(method.full_name().to_string(), opts);
                    }
                }
            }
        }

        Ok(index)
    }

    /// Record field options directly
    pub fn insert_field(&mut self, message: &str, number: i32, options: strata::FieldOptions) {
        self.fields.insert((message.to_string(), number), options);
    }

    /// Record method options directly
    pub fn insert_method(&mut self, full_name: &str, options: strata::MethodOptions) {
        self.methods.insert(full_name.to_string(), options);
    }

    /// Number of descriptors carrying strata options
    pub fn len(&self) -> usize {
        self.messages.len() + self.fields.len() + self.methods.len()
    }

    /// Whether no strata options were found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode_extension<T: Message + Default>(
    opts: &DynamicMessage,
    ext: &ExtensionDescriptor,
) -> Result<Option<T>, GeneratorError> {
    if !opts.has_extension(ext) {
        return Ok(None);
    }

    let val = opts.get_extension(ext);
    if let Value::Message(msg) = val.as_ref() {
        return T::decode(msg.encode_to_vec().as_slice())
            .map(Some)
            .map_err(|e| {
                GeneratorError::OptionsParseError(format!("{}: {}", ext.full_name(), e))
            });
    }

    Ok(None)
}

/// Parse strata message options for the message named `full_name`
pub fn parse_message_options(
    index: &OptionsIndex,
    full_name: &str,
    desc: &DescriptorProto,
) -> Result<Option<strata::MessageOptions>, GeneratorError> {
    if let Some(opts) = index.messages.get(full_name) {
        return Ok(Some(opts.clone()));
    }

    let Some(opts) = desc.options.as_ref() else {
        return Ok(None);
    };

    parse_uninterpreted(
        &opts.uninterpreted_option,
        MESSAGE_EXTENSION_NAME,
        apply_message_entry,
    )
    .map_err(|e| GeneratorError::OptionsParseError(format!("message {}: {}", full_name, e)))
}

/// Parse strata field options for a field of the message named `message_name`
pub fn parse_field_options(
    index: &OptionsIndex,
    message_name: &str,
    field: &FieldDescriptorProto,
) -> Result<Option<strata::FieldOptions>, GeneratorError> {
    let number = field.number.unwrap_or(0);
    if let Some(opts) = index.fields.get(&(message_name.to_string(), number)) {
        return Ok(Some(opts.clone()));
    }

    let Some(opts) = field.options.as_ref() else {
        return Ok(None);
    };

    parse_uninterpreted(
        &opts.uninterpreted_option,
        FIELD_EXTENSION_NAME,
        apply_field_entry,
    )
    .map_err(|e| {
        GeneratorError::OptionsParseError(format!(
            "field {}.{}: {}",
            message_name,
            field.name(),
            e
        ))
    })
}

/// Parse strata method options for the method named `full_name`
pub fn parse_method_options(
    index: &OptionsIndex,
    full_name: &str,
    method: &MethodDescriptorProto,
) -> Result<Option<strata::MethodOptions>, GeneratorError> {
    if let Some(opts) = index.methods.get(full_name) {
        return Ok(Some(opts.clone()));
    }

    let Some(opts) = method.options.as_ref() else {
        return Ok(None);
    };

    parse_uninterpreted(
        &opts.uninterpreted_option,
        METHOD_EXTENSION_NAME,
        apply_method_entry,
    )
    .map_err(|e| GeneratorError::OptionsParseError(format!("method {}: {}", full_name, e)))
}

// =============================================================================
// Fallback: Uninterpreted option parsing (for older protoc versions)
// =============================================================================

type Apply<T> = fn(&mut T, &str, &TextValue) -> Result<(), String>;

/// Merge every uninterpreted option named `extension_name` into one value
fn parse_uninterpreted<T: Default>(
    uninterpreted: &[UninterpretedOption],
    extension_name: &str,
    apply: Apply<T>,
) -> Result<Option<T>, String> {
    let mut result = T::default();
    let mut found = false;

    for opt in uninterpreted {
        if !is_extension_option(opt, extension_name) {
            continue;
        }
        found = true;
        for (key, value) in uninterpreted_entries(opt)? {
            apply(&mut result, &key, &value)?;
        }
    }

    Ok(found.then_some(result))
}

/// Check if an uninterpreted option matches our extension name
fn is_extension_option(opt: &UninterpretedOption, extension_name: &str) -> bool {
    // The name parts form a path like: (strata.field).domain.name
    // or just (strata.field) for aggregate values
    let Some(first) = opt.name.first() else {
        return false;
    };

    first.is_extension && first.name_part == extension_name
}

/// Turn one uninterpreted option into top-level `key: value` entries.
///
/// `(strata.field) = { domain: { name: "X" } }` yields the aggregate entries;
/// `(strata.field).domain.name = "X"` yields the same tree built from the path.
fn uninterpreted_entries(opt: &UninterpretedOption) -> Result<Vec<(String, TextValue)>, String> {
    let leaf = option_value(opt)?;
    let path: Vec<&str> = opt.name[1..].iter().map(|p| p.name_part.as_str()).collect();

    let Some((last, parents)) = path.split_last() else {
        return match leaf {
            TextValue::Message(entries) => Ok(entries),
            _ => Err("expected an aggregate value".to_string()),
        };
    };

    let mut entry = (last.to_string(), leaf);
    for parent in parents.iter().rev() {
        entry = (parent.to_string(), TextValue::Message(vec![entry]));
    }
    Ok(vec![entry])
}

/// The value carried by an uninterpreted option
fn option_value(opt: &UninterpretedOption) -> Result<TextValue, String> {
    if let Some(aggregate) = opt.aggregate_value.as_ref() {
        return parse_text_format(aggregate).map(TextValue::Message);
    }
    if let Some(ref s) = opt.string_value {
        return Ok(TextValue::Quoted(String::from_utf8_lossy(s).to_string()));
    }
    if let Some(ref s) = opt.identifier_value {
        return Ok(TextValue::Scalar(s.clone()));
    }
    if let Some(v) = opt.positive_int_value {
        return Ok(TextValue::Scalar(v.to_string()));
    }
    if let Some(v) = opt.negative_int_value {
        return Ok(TextValue::Scalar(v.to_string()));
    }
    if let Some(v) = opt.double_value {
        return Ok(TextValue::Scalar(v.to_string()));
    }
    Err("option has no value".to_string())
}

fn apply_field_entry(
    result: &mut strata::FieldOptions,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "domain" => apply_entries(
            result.domain.get_or_insert_with(Default::default),
            value,
            apply_domain_entry,
        ),
        "inbound" => apply_entries(
            result.inbound.get_or_insert_with(Default::default),
            value,
            apply_inbound_entry,
        ),
        "outbound" => apply_entries(
            result.outbound.get_or_insert_with(Default::default),
            value,
            apply_outbound_entry,
        ),
        "validate" => apply_entries(
            result.validate.get_or_insert_with(Default::default),
            value,
            apply_validate_entry,
        ),
        "db" => apply_entries(
            result.db.get_or_insert_with(Default::default),
            value,
            apply_column_entry,
        ),
        "tags" => push_messages(&mut result.tags, value, apply_tag_entry),
        other => Err(format!("unknown field option `{}`", other)),
    }
}

fn apply_domain_entry(
    result: &mut strata::DomainField,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "name" => result.name = value.as_string()?,
        "allow_empty" => result.allow_empty = value.as_bool()?,
        other => return Err(format!("unknown domain option `{}`", other)),
    }
    Ok(())
}

fn apply_inbound_entry(
    result: &mut strata::InboundField,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "name" => result.name = value.as_string()?,
        "allow_empty" => result.allow_empty = value.as_bool()?,
        other => return Err(format!("unknown inbound option `{}`", other)),
    }
    Ok(())
}

fn apply_outbound_entry(
    result: &mut strata::OutboundField,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "name" => result.name = value.as_string()?,
        "allow_empty" => result.allow_empty = value.as_bool()?,
        "hide" => result.hide = value.as_bool()?,
        "custom_type" => result.custom_type = value.as_string()?,
        "custom_bind" => result.custom_bind = value.as_string()?,
        "bitflag" => apply_entries(
            result.bitflag.get_or_insert_with(Default::default),
            value,
            apply_bitflag_entry,
        )?,
        other => return Err(format!("unknown outbound option `{}`", other)),
    }
    Ok(())
}

fn apply_bitflag_entry(
    result: &mut strata::Bitflag,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "enum" => result.r#enum = value.as_string()?,
        "prefix" => result.prefix = value.as_string()?,
        other => return Err(format!("unknown bitflag option `{}`", other)),
    }
    Ok(())
}

fn apply_validate_entry(
    result: &mut strata::ValidateRules,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "required" => result.required = value.as_bool()?,
        "required_if" => apply_entries(
            result.required_if.get_or_insert_with(Default::default),
            value,
            apply_condition_entry,
        )?,
        "required_if_not" => apply_entries(
            result.required_if_not.get_or_insert_with(Default::default),
            value,
            apply_condition_entry,
        )?,
        "required_with" => apply_entries(
            result.required_with.get_or_insert_with(Default::default),
            value,
            apply_condition_entry,
        )?,
        "required_without" => apply_entries(
            result.required_without.get_or_insert_with(Default::default),
            value,
            apply_condition_entry,
        )?,
        "min_len" => result.min_len = Some(value.as_i64()?),
        "max_len" => result.max_len = Some(value.as_i64()?),
        "min" => result.min = Some(value.as_i64()?),
        "max" => result.max = Some(value.as_i64()?),
        "dive" => result.dive = value.as_bool()?,
        "match" => apply_entries(
            result.r#match.get_or_insert_with(Default::default),
            value,
            apply_match_entry,
        )?,
        "rules" => push_messages(&mut result.rules, value, apply_named_rule_entry)?,
        other => return Err(format!("unknown validate option `{}`", other)),
    }
    Ok(())
}

fn apply_condition_entry(
    result: &mut strata::Condition,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "all" => push_messages(&mut result.all, value, apply_field_value_entry),
        "any" => push_messages(&mut result.any, value, apply_field_value_entry),
        other => Err(format!("unknown condition option `{}`", other)),
    }
}

fn apply_field_value_entry(
    result: &mut strata::FieldValue,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "field" => result.field = value.as_string()?,
        "value" => result.value = value.as_string()?,
        other => return Err(format!("unknown condition pair option `{}`", other)),
    }
    Ok(())
}

fn apply_match_entry(
    result: &mut strata::MatchRule,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "patterns" => {
            for item in value.items() {
                result.patterns.push(item.as_string()?);
            }
            Ok(())
        }
        other => Err(format!("unknown match option `{}`", other)),
    }
}

fn apply_named_rule_entry(
    result: &mut strata::NamedRule,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "name" => result.name = value.as_string()?,
        "args" => {
            for item in value.items() {
                result.args.push(item.as_string()?);
            }
        }
        other => return Err(format!("unknown rule option `{}`", other)),
    }
    Ok(())
}

fn apply_column_entry(
    result: &mut strata::ColumnOptions,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "column_name" => result.column_name = value.as_string()?,
        "primary_key" => result.primary_key = value.as_bool()?,
        "auto_increment" => result.auto_increment = value.as_bool()?,
        "unique" => result.unique = value.as_bool()?,
        "index" => result.index = value.as_bool()?,
        "ignore" => result.ignore = value.as_bool()?,
        other => return Err(format!("unknown db option `{}`", other)),
    }
    Ok(())
}

fn apply_tag_entry(result: &mut strata::Tag, key: &str, value: &TextValue) -> Result<(), String> {
    match key {
        "name" => result.name = value.as_string()?,
        "value" => result.value = value.as_string()?,
        other => return Err(format!("unknown tag option `{}`", other)),
    }
    Ok(())
}

fn apply_message_entry(
    result: &mut strata::MessageOptions,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "domain" => apply_entries(
            result.domain.get_or_insert_with(Default::default),
            value,
            apply_layer_entry,
        ),
        "outbound" => apply_entries(
            result.outbound.get_or_insert_with(Default::default),
            value,
            apply_layer_entry,
        ),
        "inbound" => apply_entries(
            result.inbound.get_or_insert_with(Default::default),
            value,
            apply_layer_entry,
        ),
        "custom_code" => {
            for item in value.items() {
                result.custom_code.push(item.as_string()?);
            }
            Ok(())
        }
        other => Err(format!("unknown message option `{}`", other)),
    }
}

fn apply_layer_entry(
    result: &mut strata::LayerOptions,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "naming" => result.naming = parse_naming(&value.as_string()?)? as i32,
        "hide" => result.hide = value.as_bool()?,
        other => return Err(format!("unknown layer option `{}`", other)),
    }
    Ok(())
}

fn apply_method_entry(
    result: &mut strata::MethodOptions,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "endpoint" => apply_entries(
            result.endpoint.get_or_insert_with(Default::default),
            value,
            apply_endpoint_entry,
        ),
        "auth" => apply_entries(
            result.auth.get_or_insert_with(Default::default),
            value,
            apply_auth_entry,
        ),
        other => Err(format!("unknown method option `{}`", other)),
    }
}

fn apply_endpoint_entry(
    result: &mut strata::Endpoint,
    key: &str,
    value: &TextValue,
) -> Result<(), String> {
    match key {
        "method" => result.method = value.as_string()?,
        "path" => result.path = value.as_string()?,
        "body" => result.body = value.as_string()?,
        "headers" => {
            for item in value.items() {
                result.headers.push(item.as_string()?);
            }
        }
        other => return Err(format!("unknown endpoint option `{}`", other)),
    }
    Ok(())
}

fn apply_auth_entry(result: &mut strata::Auth, key: &str, value: &TextValue) -> Result<(), String> {
    match key {
        "mode" => result.mode = parse_auth_mode(&value.as_string()?)? as i32,
        "custom" => result.custom = value.as_string()?,
        other => return Err(format!("unknown auth option `{}`", other)),
    }
    Ok(())
}

/// Parse a naming mode from its enum name or a short alias
fn parse_naming(s: &str) -> Result<strata::Naming, String> {
    match s {
        "NAMING_UNSPECIFIED" => Ok(strata::Naming::Unspecified),
        "NAMING_SNAKE_CASE" | "SNAKE_CASE" | "snake_case" | "snake" => {
            Ok(strata::Naming::SnakeCase)
        }
        "NAMING_CAMEL_CASE" | "CAMEL_CASE" | "camel_case" | "camel" => {
            Ok(strata::Naming::CamelCase)
        }
        other => Err(format!("unknown naming `{}`", other)),
    }
}

/// Parse an auth mode from its enum name or a short alias
fn parse_auth_mode(s: &str) -> Result<strata::AuthMode, String> {
    match s {
        "AUTH_MODE_UNSPECIFIED" => Ok(strata::AuthMode::Unspecified),
        "AUTH_MODE_PUBLIC" | "PUBLIC" | "public" => Ok(strata::AuthMode::Public),
        "AUTH_MODE_BEARER" | "BEARER" | "bearer" => Ok(strata::AuthMode::Bearer),
        "AUTH_MODE_CUSTOM" | "CUSTOM" | "custom" => Ok(strata::AuthMode::Custom),
        other => Err(format!("unknown auth mode `{}`", other)),
    }
}

/// Apply the entries of a message value to `target`
fn apply_entries<T>(target: &mut T, value: &TextValue, apply: Apply<T>) -> Result<(), String> {
    for (key, value) in value.as_entries()? {
        apply(target, key, value)?;
    }
    Ok(())
}

/// Append one message per item of `value` (a list or a single message)
fn push_messages<T: Default>(
    target: &mut Vec<T>,
    value: &TextValue,
    apply: Apply<T>,
) -> Result<(), String> {
    for item in value.items() {
        let mut entry = T::default();
        apply_entries(&mut entry, item, apply)?;
        target.push(entry);
    }
    Ok(())
}

// =============================================================================
// Text format
// =============================================================================

/// A parsed protobuf text-format value
#[derive(Debug, Clone, PartialEq)]
enum TextValue {
    /// Bare token: identifier, number or boolean
    Scalar(String),
    /// Quoted string, escapes resolved
    Quoted(String),
    Message(Vec<(String, TextValue)>),
    List(Vec<TextValue>),
}

impl TextValue {
    fn as_string(&self) -> Result<String, String> {
        match self {
            TextValue::Scalar(s) | TextValue::Quoted(s) => Ok(s.clone()),
            other => Err(format!("expected a string, found {:?}", other)),
        }
    }

    fn as_bool(&self) -> Result<bool, String> {
        match self {
            TextValue::Scalar(s) => match s.as_str() {
                "true" | "True" | "t" | "1" => Ok(true),
                "false" | "False" | "f" | "0" => Ok(false),
                other => Err(format!("expected a boolean, found `{}`", other)),
            },
            other => Err(format!("expected a boolean, found {:?}", other)),
        }
    }

    fn as_i64(&self) -> Result<i64, String> {
        match self {
            TextValue::Scalar(s) => s
                .parse::<i64>()
                .map_err(|_| format!("expected an integer, found `{}`", s)),
            other => Err(format!("expected an integer, found {:?}", other)),
        }
    }

    fn as_entries(&self) -> Result<&[(String, TextValue)], String> {
        match self {
            TextValue::Message(entries) => Ok(entries),
            other => Err(format!("expected a message, found {:?}", other)),
        }
    }

    fn items(&self) -> Vec<&TextValue> {
        match self {
            TextValue::List(items) => items.iter().collect(),
            single => vec![single],
        }
    }
}

/// Parse an aggregate value (text format) into top-level entries
///
/// Aggregate values look like: `domain: { name: "Id" } validate { required: true }`
fn parse_text_format(src: &str) -> Result<Vec<(String, TextValue)>, String> {
    let mut parser = TextParser {
        chars: src.chars().collect(),
        pos: 0,
    };
    parser.entries(None)
}

struct TextParser {
    chars: Vec<char>,
    pos: usize,
}

impl TextParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Skip whitespace, comments and the optional `,`/`;` separators
    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c == '#' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() || c == ',' || c == ';' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn entries(&mut self, close: Option<char>) -> Result<Vec<(String, TextValue)>, String> {
        let mut entries = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None if close.is_some() => return Err("unterminated message".to_string()),
                None => break,
                Some(c) if Some(c) == close => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }

            let key = self.identifier()?;
            self.skip_whitespace();
            if self.peek() == Some(':') {
                self.pos += 1;
                self.skip_whitespace();
            }
            let value = self.value()?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    fn value(&mut self) -> Result<TextValue, String> {
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.entries(Some('}')).map(TextValue::Message)
            }
            Some('<') => {
                self.pos += 1;
                self.entries(Some('>')).map(TextValue::Message)
            }
            Some('[') => {
                self.pos += 1;
                self.list()
            }
            Some('"') | Some('\'') => self.quoted().map(TextValue::Quoted),
            Some(_) => self.token().map(TextValue::Scalar),
            None => Err("expected a value".to_string()),
        }
    }

    fn list(&mut self) -> Result<TextValue, String> {
        let mut items = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None => return Err("unterminated list".to_string()),
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => items.push(self.value()?),
            }
        }
        Ok(TextValue::List(items))
    }

    fn identifier(&mut self) -> Result<String, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(format!(
                "expected a field name at offset {}, found {:?}",
                start,
                self.peek()
            ));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn token(&mut self) -> Result<String, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !",;}]>".contains(c))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(format!("expected a value at offset {}", start));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// Parse one or more adjacent quoted strings, concatenated
    fn quoted(&mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(quote) = self.peek().filter(|c| *c == '"' || *c == '\'') {
            self.pos += 1;
            loop {
                let Some(c) = self.peek() else {
                    return Err("unterminated string".to_string());
                };
                self.pos += 1;
                if c == quote {
                    break;
                }
                if c == '\\' {
                    let Some(escaped) = self.peek() else {
                        return Err("unterminated escape".to_string());
                    };
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                } else {
                    out.push(c);
                }
            }
            self.skip_whitespace();
        }
        Ok(out)
    }
}
