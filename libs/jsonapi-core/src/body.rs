//! Validation of single-resource write documents (`POST`/`PATCH` bodies).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{ErrorKind, SourceError};
use crate::pointer::JsonPointer;
use crate::registry::SchemaRegistry;
use crate::resource::{Linkage, RelationshipData, Resource, ResourceIdentifier};
use crate::schema::{Cardinality, FieldCategory, ResourceSchema};

const DATA_MEMBERS: [&str; 6] = ["type", "id", "attributes", "relationships", "links", "meta"];
const RESERVED_FIELDS: [&str; 2] = ["id", "type"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// The accepted content of a write document.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourcePayload {
    pub resource_type: String,
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
    pub relationships: BTreeMap<String, Linkage>,
}

impl ResourcePayload {
    /// The stored form of an accepted payload; `None` until it has an id.
    pub fn into_resource(self) -> Option<Resource> {
        Some(Resource {
            resource_type: self.resource_type,
            id: self.id?,
            attributes: self.attributes,
            relationships: self
                .relationships
                .into_iter()
                .map(|(name, data)| (name, RelationshipData { data }))
                .collect(),
        })
    }
}

fn invalid(pointer: JsonPointer, reason: impl Into<String>) -> SourceError {
    SourceError::pointer(
        ErrorKind::InvalidDocument {
            reason: reason.into(),
        },
        pointer,
    )
}

fn field_error(name: &str, category: FieldCategory, reason: impl Into<String>) -> SourceError {
    SourceError::field(
        ErrorKind::FieldValidation {
            field: name.to_owned(),
            reason: reason.into(),
        },
        name,
        category,
    )
}

fn data_ptr() -> JsonPointer {
    JsonPointer::root().push("data")
}

/// Checks `body` as a write document for `resource_type`, collecting every problem.
pub fn validate_resource_document(
    registry: &SchemaRegistry,
    resource_type: &str,
    mode: WriteMode,
    body: &Value,
) -> Result<ResourcePayload, Vec<SourceError>> {
    let schema = registry
        .lookup(resource_type)
        .map_err(|kind| vec![SourceError::document(kind)])?;

    let Some(top) = body.as_object() else {
        return Err(vec![invalid(
            JsonPointer::root(),
            "the document must be a JSON object",
        )]);
    };
    if top.contains_key("errors") {
        return Err(vec![invalid(
            JsonPointer::root(),
            "a request document must not contain 'errors'",
        )]);
    }
    let data = match top.get("data") {
        Some(Value::Object(data)) => data,
        Some(_) => {
            return Err(vec![invalid(
                data_ptr(),
                "'data' must be a single resource object",
            )])
        }
        None => {
            return Err(vec![invalid(
                JsonPointer::root(),
                "the document must contain 'data'",
            )])
        }
    };

    let mut errors = Vec::new();

    for member in data.keys() {
        if !DATA_MEMBERS.contains(&member.as_str()) {
            errors.push(invalid(
                data_ptr().push(member),
                format!("'{member}' is not a resource object member"),
            ));
        }
    }

    match data.get("type") {
        Some(Value::String(given)) if given != resource_type => errors.push(SourceError::pointer(
            ErrorKind::ResourceTypeConflict {
                given: given.clone(),
                expected: resource_type.to_owned(),
            },
            data_ptr().push("type"),
        )),
        Some(Value::String(_)) => {}
        _ => errors.push(invalid(data_ptr().push("type"), "'type' must be a string")),
    }

    let id = match (mode, data.get("id")) {
        (WriteMode::Create, None) => None,
        (WriteMode::Create, Some(_)) => {
            errors.push(invalid(
                data_ptr().push("id"),
                "client-generated ids are not supported",
            ));
            None
        }
        (WriteMode::Update, Some(Value::String(id))) => Some(id.clone()),
        (WriteMode::Update, _) => {
            errors.push(invalid(data_ptr().push("id"), "'id' must be a string"));
            None
        }
    };

    if !data.contains_key("attributes") && !data.contains_key("relationships") {
        errors.push(invalid(
            data_ptr(),
            "a resource object needs 'attributes' or 'relationships'",
        ));
    }

    let attributes = match data.get("attributes") {
        None => Map::new(),
        Some(Value::Object(attrs)) => check_attributes(schema, attrs, &mut errors),
        Some(_) => {
            errors.push(invalid(
                data_ptr().push("attributes"),
                "'attributes' must be an object",
            ));
            Map::new()
        }
    };

    let relationships = match data.get("relationships") {
        None => BTreeMap::new(),
        Some(Value::Object(rels)) => check_relationships(schema, rels, &mut errors),
        Some(_) => {
            errors.push(invalid(
                data_ptr().push("relationships"),
                "'relationships' must be an object",
            ));
            BTreeMap::new()
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ResourcePayload {
        resource_type: resource_type.to_owned(),
        id,
        attributes,
        relationships,
    })
}

fn check_attributes(
    schema: &ResourceSchema,
    attrs: &Map<String, Value>,
    errors: &mut Vec<SourceError>,
) -> Map<String, Value> {
    let mut accepted = Map::new();
    for (name, value) in attrs {
        if RESERVED_FIELDS.contains(&name.as_str()) {
            errors.push(field_error(
                name,
                FieldCategory::Attribute,
                format!("'{name}' is reserved and cannot be an attribute"),
            ));
            continue;
        }
        let Some(attr) = schema.attribute(name) else {
            errors.push(field_error(
                name,
                FieldCategory::Attribute,
                format!("'{name}' is not an attribute of '{}'", schema.resource_type()),
            ));
            continue;
        };
        if !attr.kind.accepts(value) {
            errors.push(field_error(
                name,
                FieldCategory::Attribute,
                format!("expected a {} value", attr.kind.as_str()),
            ));
            continue;
        }
        accepted.insert(name.clone(), value.clone());
    }
    accepted
}

fn check_relationships(
    schema: &ResourceSchema,
    rels: &Map<String, Value>,
    errors: &mut Vec<SourceError>,
) -> BTreeMap<String, Linkage> {
    let mut accepted = BTreeMap::new();
    for (name, value) in rels {
        let Some(rel) = schema.relationship(name) else {
            errors.push(field_error(
                name,
                FieldCategory::Relationship,
                format!("'{name}' is not a relationship of '{}'", schema.resource_type()),
            ));
            continue;
        };
        let Some(data) = value.as_object().and_then(|o| o.get("data")) else {
            errors.push(field_error(
                name,
                FieldCategory::Relationship,
                "relationship must be an object with a 'data' member",
            ));
            continue;
        };

        let linkage = match (rel.cardinality, data) {
            (Cardinality::ToOne, Value::Null) => Ok(Linkage::ToOne(None)),
            (Cardinality::ToOne, Value::Object(_)) => {
                identifier(data, &rel.target).map(|id| Linkage::ToOne(Some(id)))
            }
            (Cardinality::ToMany, Value::Array(items)) => items
                .iter()
                .map(|item| identifier(item, &rel.target))
                .collect::<Result<Vec<_>, _>>()
                .map(Linkage::ToMany),
            (Cardinality::ToOne, _) => Err("to-one linkage must be null or an object".to_owned()),
            (Cardinality::ToMany, _) => Err("to-many linkage must be an array".to_owned()),
        };
        match linkage {
            Ok(linkage) => {
                accepted.insert(name.clone(), linkage);
            }
            Err(reason) => errors.push(field_error(name, FieldCategory::Relationship, reason)),
        }
    }
    accepted
}

fn identifier(value: &Value, target: &str) -> Result<ResourceIdentifier, String> {
    let (Some(Value::String(ty)), Some(Value::String(id))) = (value.get("type"), value.get("id"))
    else {
        return Err("resource identifiers need string 'type' and 'id'".to_owned());
    };
    if ty != target {
        return Err(format!("expected resources of type '{target}', got '{ty}'"));
    }
    Ok(ResourceIdentifier::new(ty, id))
}
