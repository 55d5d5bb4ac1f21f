//! Resource objects as stored by repositories and rendered in documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Resource linkage: `null` or an identifier for to-one, an array for to-many.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    ToOne(Option<ResourceIdentifier>),
    ToMany(Vec<ResourceIdentifier>),
}

impl Linkage {
    pub fn identifiers(&self) -> &[ResourceIdentifier] {
        match self {
            Linkage::ToOne(Some(id)) => std::slice::from_ref(id),
            Linkage::ToOne(None) => &[],
            Linkage::ToMany(ids) => ids,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipData {
    pub data: Linkage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipData>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Map::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_to_one(
        mut self,
        name: impl Into<String>,
        target: Option<ResourceIdentifier>,
    ) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipData {
                data: Linkage::ToOne(target),
            },
        );
        self
    }

    pub fn with_to_many(
        mut self,
        name: impl Into<String>,
        targets: impl IntoIterator<Item = ResourceIdentifier>,
    ) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipData {
                data: Linkage::ToMany(targets.into_iter().collect()),
            },
        );
        self
    }

    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(&self.resource_type, &self.id)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn linkage(&self, name: &str) -> Option<&Linkage> {
        self.relationships.get(name).map(|r| &r.data)
    }
}
