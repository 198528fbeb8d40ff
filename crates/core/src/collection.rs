//! Collection schema: which payload fields get their own storage column

use crate::error::Result;
use crate::validation::{Validator, RESERVED_COLUMNS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Column type of a declared payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Boolean,
    /// Arrays and objects, stored as JSON text
    Json,
}

impl FieldKind {
    /// SQLite column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Json => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
        }
    }

    /// Whether a JSON value fits this kind. `null` fits every kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Real, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Json, _) => true,
            _ => false,
        }
    }
}

/// A payload field with its own column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Name and declared fields of one entity collection
///
/// Fields that are not declared still round-trip; the store keeps them in
/// a JSON overflow column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl Default for CollectionSchema {
    fn default() -> Self {
        Self::new("entities")
    }
}

impl CollectionSchema {
    /// Create a schema with no declared fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style method to declare a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef::new(name, kind));
        self
    }

    /// Look up a declared field
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check that all names are usable as quoted SQL identifiers
    ///
    /// SQL keywords such as `order` are accepted; the store quotes every
    /// name it puts into a statement.
    pub fn validate(&self) -> Result<()> {
        let internal = self.name.to_ascii_lowercase().starts_with("sqlite_");
        let mut validator = Validator::new()
            .identifier("collection.name", &self.name)
            .custom("collection.name", || {
                internal.then(|| "Names starting with sqlite_ are reserved by SQLite".to_string())
            });

        let mut seen = HashSet::new();
        for field in &self.fields {
            let label = format!("collection.fields.{}", field.name);
            validator = validator
                .identifier(&label, &field.name)
                .not_reserved(&label, &field.name, RESERVED_COLUMNS);
            let duplicate = !seen.insert(field.name.to_ascii_lowercase());
            validator = validator.custom(&label, || {
                duplicate.then(|| "Field is declared more than once".to_string())
            });
        }

        validator.validate().to_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_accepts() {
        assert!(FieldKind::Text.accepts(&json!("A")));
        assert!(!FieldKind::Text.accepts(&json!(1)));
        assert!(FieldKind::Integer.accepts(&json!(450000)));
        assert!(!FieldKind::Integer.accepts(&json!(1.5)));
        assert!(FieldKind::Real.accepts(&json!(1)));
        assert!(FieldKind::Boolean.accepts(&json!(true)));
        assert!(FieldKind::Json.accepts(&json!({"a": [1, 2]})));
        assert!(FieldKind::Integer.accepts(&Value::Null));
    }

    #[test]
    fn test_valid_schema() {
        let schema = CollectionSchema::new("properties")
            .with_field("img_src", FieldKind::Text)
            .with_field("price", FieldKind::Integer);
        assert!(schema.validate().is_ok());
        assert_eq!(schema.field("price").map(|f| f.kind), Some(FieldKind::Integer));
    }

    #[test]
    fn test_rejects_reserved_and_duplicate_fields() {
        let reserved = CollectionSchema::new("properties").with_field("seq", FieldKind::Integer);
        assert!(reserved.validate().is_err());

        let duplicate = CollectionSchema::new("properties")
            .with_field("name", FieldKind::Text)
            .with_field("NAME", FieldKind::Text);
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_rejects_unsafe_collection_name() {
        let schema = CollectionSchema::new("props; DROP TABLE x");
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_keywords_are_valid_names() {
        let schema = CollectionSchema::new("group")
            .with_field("order", FieldKind::Integer)
            .with_field("select", FieldKind::Text);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_rejects_sqlite_internal_names() {
        assert!(CollectionSchema::new("sqlite_master").validate().is_err());
        assert!(CollectionSchema::new("SQLITE_stat1").validate().is_err());
    }

    #[test]
    fn test_schema_from_toml() {
        let schema: CollectionSchema = toml::from_str(
            r#"
            name = "properties"
            fields = [
                { name = "type", kind = "text" },
                { name = "price", kind = "integer" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[1].kind, FieldKind::Integer);
    }
}
