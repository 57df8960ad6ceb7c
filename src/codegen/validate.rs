//! Validation calls for inbound structs
//!
//! Renders `(strata.field).validate` as one ozzo-validation field rule:
//!
//! ```go
//! validation.Field(&in.Email, validation.Required, validation.Length(3, 254), is.Email)
//! ```

use super::go_string;
use super::naming::{self, FieldNames};
use crate::options::strata::{Condition, ValidateRules};
use crate::schema::{Field, FieldKind, Message};
use crate::settings::Settings;
use crate::types::{Builtin, GoRenderer, TypeRef, TypeRenderer};
use crate::GeneratorError;

/// A rendered field rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationCall {
    /// `validation.Field(...)` expression
    pub expression: String,
    /// Fully qualified custom rule references used by the expression
    pub references: Vec<String>,
}

/// Build the validation call for `field`, if it declares any rules
pub fn build(
    field: &Field,
    names: &FieldNames,
    message: &Message,
    settings: &Settings,
) -> Result<Option<ValidationCall>, GeneratorError> {
    let Some(rules) = field.options.validate.as_ref() else {
        return Ok(None);
    };

    let mut parts = Vec::new();
    if let Some(presence) = presence(field, rules, message)? {
        parts.push(presence);
    }

    let mut references = Vec::new();
    let content = content_rules(field, rules, settings, &mut references)?;

    if rules.dive {
        if !field.is_array() {
            return Err(GeneratorError::annotation(
                field.path(),
                "dive is only valid on repeated fields",
            ));
        }
        if !content.is_empty() {
            parts.push(format!("validation.Each({})", content.join(", ")));
        }
    } else {
        parts.extend(content);
    }

    if parts.is_empty() {
        return Ok(None);
    }

    Ok(Some(ValidationCall {
        expression: format!("validation.Field(&in.{}, {})", names.domain, parts.join(", ")),
        references,
    }))
}

/// The single presence rule, if any
fn presence(
    field: &Field,
    rules: &ValidateRules,
    message: &Message,
) -> Result<Option<String>, GeneratorError> {
    let declared: Vec<(&str, Option<&Condition>)> = [
        ("required", rules.required.then_some(None)),
        ("required_if", rules.required_if.as_ref().map(Some)),
        ("required_if_not", rules.required_if_not.as_ref().map(Some)),
        ("required_with", rules.required_with.as_ref().map(Some)),
        ("required_without", rules.required_without.as_ref().map(Some)),
    ]
    .into_iter()
    .filter_map(|(name, cond)| cond.map(|c| (name, c)))
    .collect();

    if declared.len() > 1 {
        let names: Vec<&str> = declared.iter().map(|(name, _)| *name).collect();
        return Err(GeneratorError::annotation(
            field.path(),
            format!("more than one presence rule set: {}", names.join(", ")),
        ));
    }

    let Some((kind, condition)) = declared.into_iter().next() else {
        return Ok(None);
    };
    let Some(condition) = condition else {
        return Ok(Some("validation.Required".to_string()));
    };

    let expr = render_condition(field, kind, condition, message)?;
    Ok(Some(format!("validation.Required.When({})", expr)))
}

fn render_condition(
    field: &Field,
    kind: &str,
    condition: &Condition,
    message: &Message,
) -> Result<String, GeneratorError> {
    let (pairs, joiner) = match (condition.all.is_empty(), condition.any.is_empty()) {
        (false, true) => (&condition.all, " && "),
        (true, false) => (&condition.any, " || "),
        (true, true) => {
            return Err(GeneratorError::annotation(
                field.path(),
                format!("{} needs at least one field", kind),
            ))
        }
        (false, false) => {
            return Err(GeneratorError::annotation(
                field.path(),
                format!("{} cannot combine `all` and `any`", kind),
            ))
        }
    };

    let mut terms = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let sibling = message.field(&pair.field).ok_or_else(|| {
            GeneratorError::schema(
                field.path(),
                format!("{} references unknown field `{}`", kind, pair.field),
            )
        })?;
        let target = format!("in.{}", naming::resolve(sibling, message).domain);

        let term = match kind {
            "required_with" => format!("!validation.IsEmpty({})", target),
            "required_without" => format!("validation.IsEmpty({})", target),
            _ => {
                let value = literal(field, sibling, &pair.value)?;
                let negate = kind == "required_if_not";
                match (sibling.is_optional(), negate) {
                    (false, false) => format!("{} == {}", target, value),
                    (false, true) => format!("{} != {}", target, value),
                    (true, false) => format!("{} != nil && *{} == {}", target, target, value),
                    (true, true) => format!("{} == nil || *{} != {}", target, target, value),
                }
            }
        };
        terms.push(term);
    }

    if terms.len() == 1 {
        return Ok(terms.remove(0));
    }
    Ok(terms
        .iter()
        .map(|t| format!("({})", t))
        .collect::<Vec<_>>()
        .join(joiner))
}

/// Go literal comparing against `sibling`'s inbound value
fn literal(field: &Field, sibling: &Field, value: &str) -> Result<String, GeneratorError> {
    if sibling.is_array() || sibling.is_map() {
        return Err(GeneratorError::annotation(
            field.path(),
            format!(
                "cannot compare repeated or map field `{}` with a value in a presence condition",
                sibling.name
            ),
        ));
    }
    match &sibling.kind {
        FieldKind::Enum { .. } | FieldKind::Scalar(Builtin::String) => Ok(go_string(value)),
        FieldKind::Scalar(Builtin::Bool) if value == "true" || value == "false" => {
            Ok(value.to_string())
        }
        FieldKind::Scalar(b) if b.is_numeric() && value.parse::<f64>().is_ok() => {
            Ok(value.to_string())
        }
        _ => Err(GeneratorError::annotation(
            field.path(),
            format!(
                "cannot compare field `{}` with `{}` in a presence condition",
                sibling.name, value
            ),
        )),
    }
}

/// Length, bounds, pattern and named rules, in that order
fn content_rules(
    field: &Field,
    rules: &ValidateRules,
    settings: &Settings,
    references: &mut Vec<String>,
) -> Result<Vec<String>, GeneratorError> {
    let mut out = Vec::new();

    if rules.min_len.is_some() || rules.max_len.is_some() {
        out.push(format!(
            "validation.Length({}, {})",
            rules.min_len.unwrap_or(0),
            rules.max_len.unwrap_or(0)
        ));
    }

    for (name, bound) in [("Min", rules.min), ("Max", rules.max)] {
        let Some(bound) = bound else {
            continue;
        };
        let FieldKind::Scalar(b) = &field.kind else {
            return Err(GeneratorError::annotation(
                field.path(),
                "min/max require a numeric field",
            ));
        };
        if !b.is_numeric() {
            return Err(GeneratorError::annotation(
                field.path(),
                "min/max require a numeric field",
            ));
        }
        if bound < 0 && matches!(b, Builtin::Uint32 | Builtin::Uint64) {
            return Err(GeneratorError::annotation(
                field.path(),
                format!("{} bound {} is negative on an unsigned field", name, bound),
            ));
        }
        let ty = GoRenderer.render(&TypeRef::Builtin(*b));
        out.push(format!("validation.{}({}({}))", name, ty, bound));
    }

    if let Some(rule) = rules.r#match.as_ref() {
        if rule.patterns.is_empty() {
            return Err(GeneratorError::annotation(
                field.path(),
                "match requires at least one pattern",
            ));
        }
        for pattern in &rule.patterns {
            out.push(format!(
                "validation.Match(regexp.MustCompile({}))",
                go_raw_string(pattern)
            ));
        }
    }

    for named in &rules.rules {
        let rule = settings.rule(&named.name).ok_or_else(|| {
            GeneratorError::Lookup(format!(
                "{}: validation rule `{}` is not registered",
                field.path(),
                named.name
            ))
        })?;

        if rule.requires_args && named.args.is_empty() {
            return Err(GeneratorError::annotation(
                field.path(),
                format!("rule `{}` requires arguments", named.name),
            ));
        }
        if !rule.requires_args && !named.args.is_empty() {
            return Err(GeneratorError::annotation(
                field.path(),
                format!("rule `{}` takes no arguments", named.name),
            ));
        }

        if rule.requires_args {
            let args: Vec<String> = named.args.iter().map(|a| rule_argument(a)).collect();
            out.push(format!("{}({})", rule.call, args.join(", ")));
        } else {
            out.push(rule.call.clone());
        }
        if let Some(reference) = rule.reference.as_ref() {
            if !references.contains(reference) {
                references.push(reference.clone());
            }
        }
    }

    Ok(out)
}

/// Numbers pass through; everything else is a string literal
fn rule_argument(arg: &str) -> String {
    if arg.parse::<f64>().is_ok() {
        arg.to_string()
    } else {
        go_string(arg)
    }
}

/// Raw string literal unless the pattern itself contains a backtick
fn go_raw_string(s: &str) -> String {
    if s.contains('`') {
        go_string(s)
    } else {
        format!("`{}`", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::strata::{self, FieldValue, MatchRule, NamedRule};
    use crate::schema::{Cardinality, LayerNames, MessageKind};
    use crate::settings::Suffixes;
    use heck::ToUpperCamelCase;

    fn scalar(name: &str, b: Builtin, cardinality: Cardinality) -> Field {
        Field {
            name: name.to_string(),
            number: 1,
            go_name: name.to_upper_camel_case(),
            kind: FieldKind::Scalar(b),
            cardinality,
            message: "CreateUserRequest".to_string(),
            module: "acme".to_string(),
            options: strata::FieldOptions::default(),
        }
    }

    fn message(fields: Vec<Field>) -> Message {
        Message {
            name: "CreateUserRequest".to_string(),
            full_name: "acme.CreateUserRequest".to_string(),
            kind: MessageKind::WireInput,
            names: LayerNames::derive(
                "CreateUserRequest",
                MessageKind::WireInput,
                &Suffixes::default(),
            ),
            fields,
            options: strata::MessageOptions::default(),
        }
    }

    fn with_rules(mut field: Field, rules: ValidateRules) -> Field {
        field.options.validate = Some(rules);
        field
    }

    fn condition(field: &str, value: &str) -> Condition {
        Condition {
            all: vec![FieldValue {
                field: field.to_string(),
                value: value.to_string(),
            }],
            any: Vec::new(),
        }
    }

    fn run(field: &Field, msg: &Message) -> Result<Option<ValidationCall>, GeneratorError> {
        let names = naming::resolve(field, msg);
        build(field, &names, msg, &Settings::default())
    }

    #[test]
    fn test_required_with_length_and_rule() {
        let email = with_rules(
            scalar("email", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required: true,
                min_len: Some(3),
                max_len: Some(254),
                rules: vec![NamedRule {
                    name: "email".to_string(),
                    args: Vec::new(),
                }],
                ..Default::default()
            },
        );
        let msg = message(vec![email.clone()]);
        let call = run(&email, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            "validation.Field(&in.Email, validation.Required, validation.Length(3, 254), is.Email)"
        );
        assert!(call.references.is_empty());
    }

    #[test]
    fn test_more_than_one_presence_rule() {
        let kind = scalar("kind", Builtin::String, Cardinality::Singular);
        let name = with_rules(
            scalar("name", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required_if: Some(condition("kind", "admin")),
                required_with: Some(condition("kind", "")),
                ..Default::default()
            },
        );
        let msg = message(vec![kind, name.clone()]);
        let err = run(&name, &msg).unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn test_single_conditional_presence() {
        let kind = scalar("kind", Builtin::String, Cardinality::Singular);
        let name = with_rules(
            scalar("name", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required_if: Some(condition("kind", "admin")),
                ..Default::default()
            },
        );
        let msg = message(vec![kind, name.clone()]);
        let call = run(&name, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            r#"validation.Field(&in.Name, validation.Required.When(in.Kind == "admin"))"#
        );
    }

    #[test]
    fn test_any_condition_on_optional_sibling() {
        let level = scalar("level", Builtin::Int32, Cardinality::Optional);
        let kind = scalar("kind", Builtin::String, Cardinality::Singular);
        let name = with_rules(
            scalar("name", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required_if_not: Some(Condition {
                    all: Vec::new(),
                    any: vec![
                        FieldValue {
                            field: "level".to_string(),
                            value: "3".to_string(),
                        },
                        FieldValue {
                            field: "kind".to_string(),
                            value: "guest".to_string(),
                        },
                    ],
                }),
                ..Default::default()
            },
        );
        let msg = message(vec![level, kind, name.clone()]);
        let call = run(&name, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            r#"validation.Field(&in.Name, validation.Required.When((in.Level == nil || *in.Level != 3) || (in.Kind != "guest")))"#
        );
    }

    #[test]
    fn test_condition_on_unknown_sibling() {
        let name = with_rules(
            scalar("name", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required_without: Some(condition("nickname", "")),
                ..Default::default()
            },
        );
        let msg = message(vec![name.clone()]);
        assert!(matches!(
            run(&name, &msg),
            Err(GeneratorError::Schema { .. })
        ));
    }

    #[test]
    fn test_dive_requires_array() {
        let rules = ValidateRules {
            dive: true,
            min_len: Some(1),
            ..Default::default()
        };
        let single = with_rules(
            scalar("tag", Builtin::String, Cardinality::Singular),
            rules.clone(),
        );
        let msg = message(vec![single.clone()]);
        assert!(run(&single, &msg).is_err());

        let tags = with_rules(scalar("tags", Builtin::String, Cardinality::Array), rules);
        let msg = message(vec![tags.clone()]);
        let call = run(&tags, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            "validation.Field(&in.Tags, validation.Each(validation.Length(1, 0)))"
        );
    }

    #[test]
    fn test_match_requires_pattern() {
        let code = with_rules(
            scalar("code", Builtin::String, Cardinality::Singular),
            ValidateRules {
                r#match: Some(MatchRule {
                    patterns: Vec::new(),
                }),
                ..Default::default()
            },
        );
        let msg = message(vec![code.clone()]);
        assert!(run(&code, &msg).is_err());

        let code = with_rules(
            scalar("code", Builtin::String, Cardinality::Singular),
            ValidateRules {
                r#match: Some(MatchRule {
                    patterns: vec![r"^\d{4}$".to_string()],
                }),
                ..Default::default()
            },
        );
        let msg = message(vec![code.clone()]);
        let call = run(&code, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            r"validation.Field(&in.Code, validation.Match(regexp.MustCompile(`^\d{4}$`)))"
        );
    }

    #[test]
    fn test_unregistered_and_argument_rules() {
        let slug = with_rules(
            scalar("slug", Builtin::String, Cardinality::Singular),
            ValidateRules {
                rules: vec![NamedRule {
                    name: "slug".to_string(),
                    args: Vec::new(),
                }],
                ..Default::default()
            },
        );
        let msg = message(vec![slug.clone()]);
        assert!(matches!(run(&slug, &msg), Err(GeneratorError::Lookup(_))));

        let role = with_rules(
            scalar("role", Builtin::String, Cardinality::Singular),
            ValidateRules {
                rules: vec![NamedRule {
                    name: "in".to_string(),
                    args: Vec::new(),
                }],
                ..Default::default()
            },
        );
        let msg = message(vec![role.clone()]);
        assert!(matches!(
            run(&role, &msg),
            Err(GeneratorError::Annotation { .. })
        ));
    }

    #[test]
    fn test_custom_rule_reference() {
        let settings =
            Settings::from_parameter(Some("rule=slug:github.com/acme/rules.Slug")).unwrap();
        let slug = with_rules(
            scalar("slug", Builtin::String, Cardinality::Singular),
            ValidateRules {
                rules: vec![NamedRule {
                    name: "slug".to_string(),
                    args: Vec::new(),
                }],
                ..Default::default()
            },
        );
        let msg = message(vec![slug.clone()]);
        let names = naming::resolve(&slug, &msg);
        let call = build(&slug, &names, &msg, &settings).unwrap().unwrap();
        assert_eq!(call.expression, "validation.Field(&in.Slug, rules.Slug)");
        assert_eq!(call.references, vec!["github.com/acme/rules.Slug".to_string()]);
    }

    #[test]
    fn test_numeric_bounds_are_typed() {
        let age = with_rules(
            scalar("age", Builtin::Int32, Cardinality::Singular),
            ValidateRules {
                min: Some(18),
                max: Some(130),
                ..Default::default()
            },
        );
        let msg = message(vec![age.clone()]);
        let call = run(&age, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            "validation.Field(&in.Age, validation.Min(int32(18)), validation.Max(int32(130)))"
        );
    }

    #[test]
    fn test_condition_compares_against_repeated_sibling() {
        let tags = scalar("tags", Builtin::String, Cardinality::Array);
        let name = with_rules(
            scalar("name", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required_if: Some(condition("tags", "admin")),
                ..Default::default()
            },
        );
        let msg = message(vec![tags, name.clone()]);
        let err = run(&name, &msg).unwrap_err();
        assert!(matches!(err, GeneratorError::Annotation { .. }));
        assert!(err.to_string().contains("`tags`"));
    }

    #[test]
    fn test_required_with_repeated_sibling_checks_emptiness() {
        let tags = scalar("tags", Builtin::String, Cardinality::Array);
        let name = with_rules(
            scalar("name", Builtin::String, Cardinality::Singular),
            ValidateRules {
                required_with: Some(condition("tags", "")),
                ..Default::default()
            },
        );
        let msg = message(vec![tags, name.clone()]);
        let call = run(&name, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            "validation.Field(&in.Name, validation.Required.When(!validation.IsEmpty(in.Tags)))"
        );
    }

    #[test]
    fn test_negative_bound_on_unsigned_field() {
        for b in [Builtin::Uint32, Builtin::Uint64] {
            let count = with_rules(
                scalar("count", b, Cardinality::Singular),
                ValidateRules {
                    min: Some(-1),
                    ..Default::default()
                },
            );
            let msg = message(vec![count.clone()]);
            let err = run(&count, &msg).unwrap_err();
            assert!(matches!(err, GeneratorError::Annotation { .. }));
        }

        let count = with_rules(
            scalar("count", Builtin::Uint32, Cardinality::Singular),
            ValidateRules {
                max: Some(10),
                ..Default::default()
            },
        );
        let msg = message(vec![count.clone()]);
        let call = run(&count, &msg).unwrap().unwrap();
        assert_eq!(
            call.expression,
            "validation.Field(&in.Count, validation.Max(uint32(10)))"
        );
    }
}
