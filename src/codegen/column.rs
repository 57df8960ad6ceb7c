//! Database tag generation for domain structs
//!
//! Each database profile has its own tag vocabulary; the configured
//! [`DatabaseKind`] selects the strategy.

use crate::options::strata::ColumnOptions;
use crate::settings::DatabaseKind;
use heck::ToSnakeCase;

/// Inputs for one column tag
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    /// Serialized domain key, e.g. `created_at`
    pub key: &'a str,
    /// Domain struct identifier, e.g. `CreatedAt`
    pub domain_name: &'a str,
    /// `(strata.field).db` annotation
    pub options: Option<&'a ColumnOptions>,
    /// Keep zero values when serializing
    pub allow_empty: bool,
}

impl Column<'_> {
    fn ignored(&self) -> bool {
        self.options.is_some_and(|o| o.ignore)
    }

    fn column_name(&self) -> Option<&str> {
        self.options
            .map(|o| o.column_name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// Builds the database tag of a domain field
pub trait ColumnTagger {
    /// Render the tag, or `None` when the profile emits nothing
    fn tag(&self, column: &Column<'_>) -> Option<String>;
}

/// No database tags
pub struct NoTagger;

impl ColumnTagger for NoTagger {
    fn tag(&self, _column: &Column<'_>) -> Option<String> {
        None
    }
}

/// Document store: `bson:"name,omitempty"`, with `id` stored as `_id`
pub struct DocumentTagger;

impl ColumnTagger for DocumentTagger {
    fn tag(&self, column: &Column<'_>) -> Option<String> {
        if column.ignored() {
            return Some(r#"bson:"-""#.to_string());
        }
        let name = match column.column_name().unwrap_or(column.key) {
            "id" => "_id",
            other => other,
        };
        let omit = if column.allow_empty { "" } else { ",omitempty" };
        Some(format!(r#"bson:"{}{}""#, name, omit))
    }
}

/// Relational ORM: `gorm:"column:name;primaryKey;autoIncrement;unique;index"`
pub struct RelationalTagger;

impl ColumnTagger for RelationalTagger {
    fn tag(&self, column: &Column<'_>) -> Option<String> {
        if column.ignored() {
            return Some(r#"gorm:"-""#.to_string());
        }

        let name = column
            .column_name()
            .map(str::to_string)
            .unwrap_or_else(|| column.domain_name.to_snake_case());
        let mut parts = vec![format!("column:{}", name)];

        if let Some(opts) = column.options {
            if opts.primary_key {
                parts.push("primaryKey".to_string());
            }
            if opts.auto_increment {
                parts.push("autoIncrement".to_string());
            }
            if opts.unique {
                parts.push("unique".to_string());
            }
            if opts.index {
                parts.push("index".to_string());
            }
        }

        Some(format!(r#"gorm:"{}""#, parts.join(";")))
    }
}

/// Strategy for `kind`
pub fn tagger(kind: DatabaseKind) -> &'static dyn ColumnTagger {
    match kind {
        DatabaseKind::None => &NoTagger,
        DatabaseKind::Document => &DocumentTagger,
        DatabaseKind::Relational => &RelationalTagger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column<'a>(key: &'a str, options: Option<&'a ColumnOptions>) -> Column<'a> {
        Column {
            key,
            domain_name: "Id",
            options,
            allow_empty: false,
        }
    }

    #[test]
    fn test_document_id_convention() {
        assert_eq!(
            DocumentTagger.tag(&column("id", None)).as_deref(),
            Some(r#"bson:"_id,omitempty""#)
        );
        assert_eq!(
            DocumentTagger.tag(&column("email", None)).as_deref(),
            Some(r#"bson:"email,omitempty""#)
        );
    }

    #[test]
    fn test_document_allow_empty_and_ignore() {
        let mut c = column("count", None);
        c.allow_empty = true;
        assert_eq!(DocumentTagger.tag(&c).as_deref(), Some(r#"bson:"count""#));

        let ignored = ColumnOptions {
            ignore: true,
            ..Default::default()
        };
        assert_eq!(
            DocumentTagger.tag(&column("count", Some(&ignored))).as_deref(),
            Some(r#"bson:"-""#)
        );
    }

    #[test]
    fn test_relational_flags() {
        let opts = ColumnOptions {
            primary_key: true,
            auto_increment: true,
            ..Default::default()
        };
        assert_eq!(
            RelationalTagger.tag(&column("id", Some(&opts))).as_deref(),
            Some(r#"gorm:"column:id;primaryKey;autoIncrement""#)
        );

        let opts = ColumnOptions {
            column_name: "email_address".to_string(),
            unique: true,
            index: true,
            ..Default::default()
        };
        assert_eq!(
            RelationalTagger.tag(&column("email", Some(&opts))).as_deref(),
            Some(r#"gorm:"column:email_address;unique;index""#)
        );
    }

    #[test]
    fn test_no_tagger() {
        assert!(tagger(DatabaseKind::None).tag(&column("id", None)).is_none());
    }
}
