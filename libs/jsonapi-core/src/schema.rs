//! Per-type resource schemas: attributes, relationships and paging bounds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::plan::FilterOp;

pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;

/// Value kind of an attribute; decides legal filter operators and literal coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime => "datetime",
        }
    }

    /// Whether a JSON value is acceptable for this kind. `null` always is.
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldKind::Float, Value::Number(_)) => true,
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::DateTime, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "to-one")]
    ToOne,
    #[serde(rename = "to-many")]
    ToMany,
}

/// Payload member category; decides `/data/attributes/..` vs `/data/relationships/..`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldCategory {
    Attribute,
    Relationship,
}

impl FieldCategory {
    pub fn member(self) -> &'static str {
        match self {
            FieldCategory::Attribute => "attributes",
            FieldCategory::Relationship => "relationships",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attribute {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    /// Operators accepted by `filter[...]`; absent means all that fit `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookups: Option<Vec<FilterOp>>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            filterable: false,
            sortable: false,
            lookups: None,
        }
    }

    pub fn with_lookups(mut self, lookups: impl IntoIterator<Item = FilterOp>) -> Self {
        self.lookups = Some(lookups.into_iter().collect());
        self
    }

    pub fn allows_lookup(&self, op: FilterOp) -> bool {
        match &self.lookups {
            Some(ops) => ops.contains(&op),
            None => true,
        }
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    #[serde(default = "default_true")]
    pub includable: bool,
}

impl Relationship {
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToOne,
            includable: true,
        }
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::ToMany,
            ..Self::to_one(name, target)
        }
    }

    pub fn not_includable(mut self) -> Self {
        self.includable = false;
        self
    }
}

/// Schema of one resource type. Built once, then frozen inside a registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSchema {
    resource_type: String,
    attributes: HashMap<String, Attribute>,
    relationships: HashMap<String, Relationship>,
    default_page_size: u64,
    max_page_size: u64,
    default_include: Vec<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            relationships: HashMap::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            default_include: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn with_page_sizes(mut self, default: u64, max: u64) -> Self {
        self.default_page_size = default;
        self.max_page_size = max;
        self
    }

    pub fn with_default_include(mut self, path: impl Into<String>) -> Self {
        self.default_include.push(path.into());
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    pub fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    pub fn default_include(&self) -> &[String] {
        &self.default_include
    }

    pub fn category_of(&self, name: &str) -> Option<FieldCategory> {
        if self.attributes.contains_key(name) {
            Some(FieldCategory::Attribute)
        } else if self.relationships.contains_key(name) {
            Some(FieldCategory::Relationship)
        } else {
            None
        }
    }
}

/// Configuration form of a [`ResourceSchema`].
///
/// ```yaml
/// - type: articles
///   max_page_size: 50
///   attributes:
///     - { name: title, kind: string, filterable: true, sortable: true }
///   relationships:
///     - { name: author, target: people, cardinality: to-one }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub default_page_size: Option<u64>,
    #[serde(default)]
    pub max_page_size: Option<u64>,
    #[serde(default)]
    pub default_include: Vec<String>,
}

impl From<SchemaDecl> for ResourceSchema {
    fn from(decl: SchemaDecl) -> Self {
        let mut schema = ResourceSchema::new(decl.resource_type).with_page_sizes(
            decl.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            decl.max_page_size.unwrap_or(DEFAULT_MAX_PAGE_SIZE),
        );
        for attribute in decl.attributes {
            schema = schema.with_attribute(attribute);
        }
        for relationship in decl.relationships {
            schema = schema.with_relationship(relationship);
        }
        schema.default_include = decl.default_include;
        schema
    }
}
