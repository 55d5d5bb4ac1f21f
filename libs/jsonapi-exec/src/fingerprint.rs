//! Query fingerprints binding cursor tokens to the filters that produced them.

use jsonapi_core::FilterPredicate;
use sha2::{Digest, Sha256};

use crate::repository::SortOrder;

/// Stable textual form of the predicates, independent of parameter order.
#[must_use]
pub fn normalize_predicates(predicates: &[FilterPredicate]) -> String {
    let mut parts: Vec<String> = predicates
        .iter()
        .map(|p| format!("CMP({},{},{})", p.path, p.op.token().to_uppercase(), p.values.join("|")))
        .collect();
    parts.sort();
    parts.join(";")
}

/// 16 hex characters (64 bits) of SHA-256 over predicates and ordering.
#[must_use]
pub fn short_query_hash(predicates: &[FilterPredicate], ordering: &SortOrder) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_predicates(predicates).as_bytes());
    hasher.update(b"\n");
    hasher.update(ordering.to_signed_tokens().as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonapi_core::{
        Attribute, FieldKind, PathPurpose, PathResolver, ResourceSchema, SchemaRegistry, SortDir,
    };
    use jsonapi_core::FilterOp;

    fn predicate(registry: &SchemaRegistry, field: &str, op: FilterOp, value: &str) -> FilterPredicate {
        FilterPredicate {
            path: PathResolver::new(registry, 3)
                .resolve("people", field, PathPurpose::Filter)
                .unwrap(),
            op,
            values: vec![value.into()],
            parameter: format!("filter[{field}]"),
        }
    }

    #[test]
    fn hash_ignores_parameter_order_but_not_values() {
        let mut b = SchemaRegistry::builder();
        b.register(
            ResourceSchema::new("people")
                .with_attribute(Attribute::new("name", FieldKind::String).filterable())
                .with_attribute(Attribute::new("age", FieldKind::Integer).filterable()),
        )
        .unwrap();
        let registry = b.build().unwrap();

        let a = predicate(&registry, "name", FilterOp::Eq, "Ann");
        let g = predicate(&registry, "age", FilterOp::Gt, "30");
        let order = SortOrder::empty().ensure_tiebreaker(SortDir::Asc);

        let h1 = short_query_hash(&[a.clone(), g.clone()], &order);
        let h2 = short_query_hash(&[g.clone(), a.clone()], &order);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);

        let other = predicate(&registry, "age", FilterOp::Gt, "31");
        assert_ne!(h1, short_query_hash(&[a, other], &order));
        assert_ne!(h1, short_query_hash(&[g], &SortOrder::empty()));
    }
}
