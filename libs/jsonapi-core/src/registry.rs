//! Immutable registry of resource schemas.
//!
//! Schemas are collected on a [`SchemaRegistryBuilder`]; `build()` validates the
//! relationship graph and freezes it. The frozen registry is shared by `Arc`.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::plan::FilterOp;
use crate::schema::{ResourceSchema, SchemaDecl};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("resource type '{0}' is already registered")]
    DuplicateSchema(String),

    #[error("relationship '{relationship}' of '{resource_type}' targets unregistered type '{target}'")]
    DanglingRelationship {
        resource_type: String,
        relationship: String,
        target: String,
    },

    #[error("resource type '{resource_type}' has invalid page sizes (default {default}, max {max})")]
    InvalidPageSizes {
        resource_type: String,
        default: u64,
        max: u64,
    },

    #[error("default include '{path}' of '{resource_type}' is not a relationship path")]
    InvalidDefaultInclude { resource_type: String, path: String },

    #[error("lookup '{op}' of '{resource_type}.{attribute}' cannot be applied to a {kind} attribute")]
    InvalidLookup {
        resource_type: String,
        attribute: String,
        op: FilterOp,
        kind: &'static str,
    },
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ResourceSchema) -> Result<&mut Self, RegistryError> {
        let key = schema.resource_type().to_owned();
        if self.schemas.contains_key(&key) {
            return Err(RegistryError::DuplicateSchema(key));
        }
        self.schemas.insert(key, schema);
        Ok(self)
    }

    pub fn build(self) -> Result<SchemaRegistry, RegistryError> {
        for schema in self.schemas.values() {
            if schema.default_page_size() == 0
                || schema.default_page_size() > schema.max_page_size()
            {
                return Err(RegistryError::InvalidPageSizes {
                    resource_type: schema.resource_type().to_owned(),
                    default: schema.default_page_size(),
                    max: schema.max_page_size(),
                });
            }
            for attr in schema.attributes() {
                let Some(op) = attr
                    .lookups
                    .iter()
                    .flatten()
                    .find(|op| !op.applies_to(attr.kind))
                else {
                    continue;
                };
                return Err(RegistryError::InvalidLookup {
                    resource_type: schema.resource_type().to_owned(),
                    attribute: attr.name.clone(),
                    op: *op,
                    kind: attr.kind.as_str(),
                });
            }
            for rel in schema.relationships() {
                if !self.schemas.contains_key(&rel.target) {
                    return Err(RegistryError::DanglingRelationship {
                        resource_type: schema.resource_type().to_owned(),
                        relationship: rel.name.clone(),
                        target: rel.target.clone(),
                    });
                }
            }
        }

        // Relationship targets are known to exist from here on.
        for schema in self.schemas.values() {
            for path in schema.default_include() {
                if !walks_relationships(&self.schemas, schema, path) {
                    return Err(RegistryError::InvalidDefaultInclude {
                        resource_type: schema.resource_type().to_owned(),
                        path: path.clone(),
                    });
                }
            }
        }

        Ok(SchemaRegistry {
            schemas: self.schemas,
        })
    }
}

fn walks_relationships(
    schemas: &HashMap<String, ResourceSchema>,
    root: &ResourceSchema,
    path: &str,
) -> bool {
    let mut current = root;
    for segment in path.split('.') {
        let Some(next) = current
            .relationship(segment)
            .and_then(|rel| schemas.get(&rel.target))
        else {
            return false;
        };
        current = next;
    }
    true
}

#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    pub fn from_decls(decls: impl IntoIterator<Item = SchemaDecl>) -> Result<Self, RegistryError> {
        let mut builder = Self::builder();
        for decl in decls {
            builder.register(decl.into())?;
        }
        builder.build()
    }

    pub fn lookup(&self, resource_type: &str) -> Result<&ResourceSchema, ErrorKind> {
        self.schemas
            .get(resource_type)
            .ok_or_else(|| ErrorKind::UnknownResource {
                resource_type: resource_type.to_owned(),
            })
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.schemas.contains_key(resource_type)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
