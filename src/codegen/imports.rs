//! Import resolution for generated Go files
//!
//! Imports are inferred from the rendered type strings and conversion
//! expressions a template will emit: every `qualifier.Exported` fragment must
//! map to a known package, or generation fails. Receivers and the module's own
//! package name are ignored.

use crate::schema::{Module, ModuleRegistry};
use crate::settings::{is_version_segment, Settings};
use crate::types::QualifiedRef;
use crate::GeneratorError;
use std::collections::{BTreeMap, BTreeSet};

const TIMESTAMPPB: &str = "google.golang.org/protobuf/types/known/timestamppb";
const STRUCTPB: &str = "google.golang.org/protobuf/types/known/structpb";
const WRAPPERSPB: &str = "google.golang.org/protobuf/types/known/wrapperspb";
const OZZO_VALIDATION: &str = "github.com/go-ozzo/ozzo-validation/v4";
const OZZO_IS: &str = "github.com/go-ozzo/ozzo-validation/v4/is";

/// Receivers used by generated methods and functions
const RECEIVERS: &[&str] = &["w", "d", "in", "r"];

/// Fully qualified references with fewer segments are not treated as imports
const MIN_REFERENCE_SEGMENTS: usize = 5;

/// One import line
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Import {
    /// Explicit package alias
    pub alias: Option<String>,
    /// Import path
    pub name: String,
}

impl Import {
    fn plain(path: &str) -> Self {
        Self {
            alias: None,
            name: path.to_string(),
        }
    }

    /// Import `path` as `qualifier`, aliasing only when the path's last
    /// segment differs from the qualifier
    fn for_qualifier(qualifier: &str, path: &str) -> Self {
        let last = path
            .rsplit('/')
            .find(|s| !is_version_segment(s))
            .unwrap_or(path);
        Self {
            alias: (last != qualifier).then(|| qualifier.to_string()),
            name: path.to_string(),
        }
    }

    /// Go import spec, e.g. `validation "github.com/go-ozzo/ozzo-validation/v4"`
    pub fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} \"{}\"", alias, self.name),
            None => format!("\"{}\"", self.name),
        }
    }
}

/// Imports collected for one template, keyed by qualifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    entries: BTreeMap<String, Import>,
}

impl ImportSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the import for `key`
    pub fn insert(&mut self, key: impl Into<String>, import: Import) {
        self.entries.insert(key.into(), import);
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deduplicate by path and sort unaliased imports first, each group by
    /// alias-or-path
    pub fn into_sorted(self) -> Vec<Import> {
        let mut seen = BTreeSet::new();
        let mut imports: Vec<Import> = self
            .entries
            .into_values()
            .filter(|i| seen.insert(i.name.clone()))
            .collect();
        imports.sort_by(|a, b| {
            let key = |i: &Import| (i.alias.is_some(), i.alias.clone().unwrap_or_else(|| i.name.clone()));
            key(a).cmp(&key(b))
        });
        imports
    }
}

/// Maps call and type qualifiers to imports
#[derive(Debug, Clone)]
pub struct ImportResolver {
    ignore: BTreeSet<String>,
    known: BTreeMap<String, Import>,
}

impl ImportResolver {
    /// Resolver for code in `module`; in test mode the module itself is imported
    pub fn new(
        module: &Module,
        registry: &ModuleRegistry,
        settings: &Settings,
        test_mode: bool,
    ) -> Self {
        let mut known = BTreeMap::new();
        for (qualifier, path) in [
            ("time", "time"),
            ("regexp", "regexp"),
            ("json", "encoding/json"),
            ("http", "net/http"),
            ("timestamppb", TIMESTAMPPB),
            ("structpb", STRUCTPB),
            ("wrapperspb", WRAPPERSPB),
            ("is", OZZO_IS),
        ] {
            known.insert(qualifier.to_string(), Import::plain(path));
        }
        known.insert(
            "validation".to_string(),
            Import {
                alias: Some("validation".to_string()),
                name: OZZO_VALIDATION.to_string(),
            },
        );
        known.insert(
            settings.converters.name.clone(),
            Import::for_qualifier(&settings.converters.name, &settings.converters.path),
        );
        for other in registry.modules() {
            if other.go_name.is_empty() || other.go_path == module.go_path {
                continue;
            }
            let qualifier = registry.qualifier(other);
            known
                .entry(qualifier.to_string())
                .or_insert_with(|| Import::for_qualifier(qualifier, &other.go_path));
        }

        let mut ignore: BTreeSet<String> = RECEIVERS.iter().map(|r| r.to_string()).collect();
        if test_mode {
            known.insert(
                module.go_name.clone(),
                Import::for_qualifier(&module.go_name, &module.go_path),
            );
        } else {
            ignore.insert(module.go_name.clone());
        }

        Self { ignore, known }
    }

    /// Make the package of a fully qualified reference resolvable
    ///
    /// Only references spanning at least five `.`/`/` separated segments
    /// (`github.com/acme/money.Format`) count; shorter ones are left to fail
    /// resolution when used.
    pub fn register_reference(&mut self, reference: &str) {
        let segments = reference
            .split(['.', '/'])
            .filter(|s| !s.is_empty())
            .count();
        if segments < MIN_REFERENCE_SEGMENTS {
            return;
        }
        if let Some(qualified) = QualifiedRef::parse(reference) {
            self.register_package(&qualified);
        }
    }

    /// Make the package of an explicitly configured reference resolvable
    pub fn register_package(&mut self, qualified: &QualifiedRef) {
        if self.ignore.contains(&qualified.package) {
            return;
        }
        self.known.insert(
            qualified.package.clone(),
            Import::for_qualifier(&qualified.package, &qualified.path),
        );
    }

    /// Collect the imports a rendered Go type needs
    pub fn scan_type(&self, ty: &str, out: &mut ImportSet) -> Result<(), GeneratorError> {
        let mut rest = ty.trim();
        loop {
            if let Some(r) = rest.strip_prefix('*') {
                rest = r;
            } else if let Some(r) = rest.strip_prefix("[]") {
                rest = r;
            } else {
                break;
            }
        }

        if let Some(inner) = rest.strip_prefix("map[") {
            let mut depth = 1usize;
            for (i, c) in inner.char_indices() {
                match c {
                    '[' => depth += 1,
                    ']' => {
                        depth -= 1;
                        if depth == 0 {
                            self.scan_type(&inner[..i], out)?;
                            return self.scan_type(&inner[i + 1..], out);
                        }
                    }
                    _ => {}
                }
            }
            return Err(GeneratorError::CodeGenError(format!(
                "unbalanced map type `{}`",
                ty
            )));
        }

        match rest.split_once('.') {
            Some((qualifier, _)) => self.require(qualifier, out),
            None => Ok(()),
        }
    }

    /// Collect the imports a Go expression needs
    ///
    /// Every identifier followed by `.` and an upper-case letter is a package
    /// qualifier, unless it is itself part of a selector chain or sits inside
    /// a string literal.
    pub fn scan_expression(&self, expr: &str, out: &mut ImportSet) -> Result<(), GeneratorError> {
        let chars: Vec<char> = expr.chars().collect();
        let mut i = 0;
        let mut quote: Option<char> = None;

        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = quote {
                if c == '\\' && q == '"' {
                    i += 2;
                    continue;
                }
                if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            if c == '"' || c == '`' {
                quote = Some(c);
                i += 1;
                continue;
            }

            let starts_ident = (c.is_alphabetic() || c == '_')
                && (i == 0 || !(is_ident_char(chars[i - 1]) || chars[i - 1] == '.'));
            if !starts_ident {
                i += 1;
                continue;
            }

            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let followed_by_export = chars.get(i) == Some(&'.')
                && chars.get(i + 1).is_some_and(|n| n.is_uppercase());
            if followed_by_export {
                let qualifier: String = chars[start..i].iter().collect();
                self.require(&qualifier, out)?;
            }
        }
        Ok(())
    }

    /// Add the import behind `qualifier`; ignored names need none
    pub fn require(&self, qualifier: &str, out: &mut ImportSet) -> Result<(), GeneratorError> {
        if self.ignore.contains(qualifier) {
            return Ok(());
        }
        let import = self.known.get(qualifier).ok_or_else(|| {
            GeneratorError::Lookup(format!("no import known for package `{}`", qualifier))
        })?;
        out.insert(qualifier, import.clone());
        Ok(())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(package: &str, go_name: &str, go_path: &str) -> Module {
        Module {
            package: package.to_string(),
            go_name: go_name.to_string(),
            go_path: go_path.to_string(),
        }
    }

    fn resolver(test_mode: bool) -> ImportResolver {
        let own = module("acme", "acme", "github.com/acme/gen");
        let files = vec![
            prost_types::FileDescriptorProto {
                package: Some("acme".to_string()),
                options: Some(prost_types::FileOptions {
                    go_package: Some("github.com/acme/gen;acme".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            prost_types::FileDescriptorProto {
                package: Some("acme.common".to_string()),
                options: Some(prost_types::FileOptions {
                    go_package: Some("github.com/acme/gen/common;commonv1".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let registry = ModuleRegistry::from_files(&files);
        ImportResolver::new(&own, &registry, &Settings::default(), test_mode)
    }

    #[test]
    fn test_scan_types() {
        let r = resolver(false);
        let mut out = ImportSet::new();
        r.scan_type("map[string]*commonv1.AddressDomain", &mut out).unwrap();
        r.scan_type("[]time.Time", &mut out).unwrap();
        r.scan_type("*UserDomain", &mut out).unwrap();
        r.scan_type("map[string]any", &mut out).unwrap();
        let imports = out.into_sorted();
        assert_eq!(
            imports,
            vec![
                Import::plain("time"),
                Import {
                    alias: Some("commonv1".to_string()),
                    name: "github.com/acme/gen/common".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_scan_expressions_skip_receivers_and_strings() {
        let r = resolver(false);
        let mut out = ImportSet::new();
        r.scan_expression(
            r#"validation.Field(&in.Name, validation.Required.When(in.Kind == "x.Y"), validation.Match(regexp.MustCompile(`a.B`)))"#,
            &mut out,
        )
        .unwrap();
        r.scan_expression("convert.MapSlice(w.Items, (*ItemWire).IntoDomain)", &mut out)
            .unwrap();
        let names: Vec<String> = out.into_sorted().into_iter().map(|i| i.name).collect();
        assert_eq!(
            names,
            vec![
                "github.com/strata-dev/strata/runtime/convert".to_string(),
                "regexp".to_string(),
                OZZO_VALIDATION.to_string(),
            ]
        );
    }

    #[test]
    fn test_own_module_is_ignored_outside_test_mode() {
        let mut out = ImportSet::new();
        resolver(false).scan_type("*acme.UserDomain", &mut out).unwrap();
        assert!(out.is_empty());

        let mut out = ImportSet::new();
        resolver(true).scan_type("*acme.UserDomain", &mut out).unwrap();
        assert_eq!(
            out.into_sorted(),
            vec![Import {
                alias: Some("acme".to_string()),
                name: "github.com/acme/gen".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_qualifier_is_a_lookup_error() {
        let mut out = ImportSet::new();
        let err = resolver(false)
            .scan_expression("money.Format(w.Price)", &mut out)
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Lookup(_)));
    }

    #[test]
    fn test_register_reference_threshold() {
        let mut r = resolver(false);
        r.register_reference("github.com/acme/money.Format");
        r.register_reference("acme.io/x.Short");
        let mut out = ImportSet::new();
        r.scan_expression("money.Format(w.Price)", &mut out).unwrap();
        assert_eq!(out.into_sorted(), vec![Import::plain("github.com/acme/money")]);
        assert!(r
            .scan_expression("x.Short(w.Price)", &mut ImportSet::new())
            .is_err());
    }

    #[test]
    fn test_sort_is_alias_aware_and_deterministic() {
        let mut out = ImportSet::new();
        out.insert("b", Import::plain("b/pkg"));
        out.insert("validation", Import::for_qualifier("validation", OZZO_VALIDATION));
        out.insert("a", Import::plain("a/pkg"));
        out.insert("a2", Import::plain("a/pkg"));
        let sorted = out.clone().into_sorted();
        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted[0].name, "a/pkg");
        assert_eq!(sorted[1].name, "b/pkg");
        assert_eq!(sorted[2].alias.as_deref(), Some("validation"));
        assert_eq!(out.into_sorted(), sorted);
    }
}
