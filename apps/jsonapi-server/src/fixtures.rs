use anyhow::{anyhow, bail, Context, Result};
use jsonapi_core::{validate_resource_document, Resource, SchemaRegistry, WriteMode};
use jsonapi_errors::to_error_document;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Deserialize)]
struct FixtureDocument {
    data: Vec<Value>,
}

/// Reads `{"data": [resource, ...]}` and checks every entry against its schema.
///
/// Entries are validated like `PATCH` bodies, so each needs `type`, `id` and
/// attributes of the declared kinds.
pub fn load(path: &Path, registry: &SchemaRegistry) -> Result<Vec<Resource>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures '{}'", path.display()))?;
    parse(&raw, registry).with_context(|| format!("Invalid fixtures '{}'", path.display()))
}

fn parse(raw: &str, registry: &SchemaRegistry) -> Result<Vec<Resource>> {
    let doc: FixtureDocument = serde_json::from_str(raw)?;
    let mut resources = Vec::with_capacity(doc.data.len());
    for (index, item) in doc.data.into_iter().enumerate() {
        let Some(resource_type) = item.get("type").and_then(Value::as_str).map(str::to_owned)
        else {
            bail!("data[{index}] has no 'type'");
        };
        let payload =
            validate_resource_document(registry, &resource_type, WriteMode::Update, &json!({ "data": item }))
                .map_err(|errors| {
                    let doc = to_error_document(errors);
                    anyhow!(
                        "data[{index}] rejected: {}",
                        serde_json::to_string(&doc).unwrap_or_default()
                    )
                })?;
        let resource = payload
            .into_resource()
            .ok_or_else(|| anyhow!("data[{index}] has no 'id'"))?;
        resources.push(resource);
    }
    Ok(resources)
}
