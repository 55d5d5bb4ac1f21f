//! In-memory [`ResourceRepository`] used by the demo server and in tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset};
use jsonapi_core::{
    CursorV1, FieldKind, FilterOp, FilterPredicate, HopTarget, PagePosition, ResolvedPath,
    Resource, SchemaRegistry, SortDir,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::fingerprint::short_query_hash;
use crate::repository::{
    ConstraintViolation, FindResult, IncludedByPath, OrderField, PageMeta, RepositoryError,
    RepositoryQuery, ResourceRepository, SortOrder, ViolationTarget,
};

const CURSOR_PARAM: &str = "page[cursor]";

/* ---------- comparable values ---------- */

#[derive(Clone, Debug, PartialEq)]
enum Scalar {
    Num(BigDecimal),
    Str(String),
    Bool(bool),
    Time(DateTime<FixedOffset>),
}

impl Scalar {
    fn parse_literal(kind: FieldKind, raw: &str) -> Result<Self, String> {
        let bad = || format!("'{raw}' is not a valid {} literal", kind.as_str());
        match kind {
            FieldKind::String => Ok(Scalar::Str(raw.to_owned())),
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(|n| Scalar::Num(BigDecimal::from(n)))
                .map_err(|_| bad()),
            FieldKind::Float => BigDecimal::from_str(raw).map(Scalar::Num).map_err(|_| bad()),
            FieldKind::Boolean => raw.parse::<bool>().map(Scalar::Bool).map_err(|_| bad()),
            FieldKind::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(Scalar::Time)
                .map_err(|_| bad()),
        }
    }

    /// `None` for `null` and for values that do not fit `kind`.
    fn from_json(kind: FieldKind, value: &Value) -> Option<Self> {
        match (kind, value) {
            (FieldKind::String, Value::String(s)) => Some(Scalar::Str(s.clone())),
            (FieldKind::Integer | FieldKind::Float, Value::Number(n)) => {
                BigDecimal::from_str(&n.to_string()).ok().map(Scalar::Num)
            }
            (FieldKind::Boolean, Value::Bool(b)) => Some(Scalar::Bool(*b)),
            (FieldKind::DateTime, Value::String(s)) => {
                DateTime::parse_from_rfc3339(s).ok().map(Scalar::Time)
            }
            _ => None,
        }
    }

    /// Numeric ids order numerically, everything else lexically.
    fn id(id: &str) -> Self {
        match id.parse::<i64>() {
            Ok(n) => Scalar::Num(BigDecimal::from(n)),
            Err(_) => Scalar::Str(id.to_owned()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Scalar::Num(_) => 0,
            Scalar::Str(_) => 1,
            Scalar::Bool(_) => 2,
            Scalar::Time(_) => 3,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Num(a), Scalar::Num(b)) => a.cmp(b),
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Time(a), Scalar::Time(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Nulls first.
fn cmp_optional(a: &Option<Scalar>, b: &Option<Scalar>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn holds(op: FilterOp, value: &Scalar, literals: &[Scalar]) -> bool {
    let Some(first) = literals.first() else {
        return false;
    };
    let ord = value.total_cmp(first);
    match op {
        FilterOp::Eq | FilterOp::In => literals
            .iter()
            .any(|l| value.total_cmp(l) == Ordering::Equal),
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Ge => ord != Ordering::Less,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Le => ord != Ordering::Greater,
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
            match (value, first) {
                (Scalar::Str(v), Scalar::Str(l)) => match op {
                    FilterOp::Contains => v.contains(l.as_str()),
                    FilterOp::StartsWith => v.starts_with(l.as_str()),
                    _ => v.ends_with(l.as_str()),
                },
                _ => false,
            }
        }
        FilterOp::IExact | FilterOp::IContains | FilterOp::IStartsWith | FilterOp::IEndsWith => {
            match (value, first) {
                (Scalar::Str(v), Scalar::Str(l)) => {
                    let (v, l) = (v.to_lowercase(), l.to_lowercase());
                    match op {
                        FilterOp::IExact => v == l,
                        FilterOp::IContains => v.contains(&l),
                        FilterOp::IStartsWith => v.starts_with(&l),
                        _ => v.ends_with(&l),
                    }
                }
                _ => false,
            }
        }
        FilterOp::Ne | FilterOp::IsNull => false,
    }
}

/* ---------- traversal ---------- */

type TypeIndex<'s> = HashMap<&'s str, HashMap<&'s str, &'s Resource>>;

fn index(store: &HashMap<String, Vec<Resource>>) -> TypeIndex<'_> {
    store
        .iter()
        .map(|(ty, items)| {
            (
                ty.as_str(),
                items.iter().map(|r| (r.id.as_str(), r)).collect(),
            )
        })
        .collect()
}

/// Follows one relationship from every resource in `from`, in linkage order.
fn follow<'s>(
    idx: &TypeIndex<'s>,
    from: &[&'s Resource],
    relationship: &str,
    target: &str,
) -> Vec<&'s Resource> {
    let Some(targets) = idx.get(target) else {
        return Vec::new();
    };
    from.iter()
        .filter_map(|r| r.linkage(relationship))
        .flat_map(|l| l.identifiers().iter())
        .filter_map(|id| targets.get(id.id.as_str()).copied())
        .collect()
}

/// Attribute values at the end of `path`, across every related resource.
fn reach<'s>(idx: &TypeIndex<'s>, resource: &'s Resource, path: &ResolvedPath) -> Vec<&'s Value> {
    let mut frontier = vec![resource];
    for hop in path.relationship_hops() {
        let Some(target) = hop.target_type() else {
            return Vec::new();
        };
        frontier = follow(idx, &frontier, &hop.name, target);
    }
    match path.terminal() {
        Some(hop) if matches!(hop.target, HopTarget::Attribute { .. }) => frontier
            .iter()
            .filter_map(|r| r.attribute(&hop.name))
            .collect(),
        _ => Vec::new(),
    }
}

struct Compiled<'q> {
    predicate: &'q FilterPredicate,
    kind: FieldKind,
    literals: Vec<Scalar>,
}

impl Compiled<'_> {
    fn matches(&self, idx: &TypeIndex<'_>, resource: &Resource) -> bool {
        let values = reach(idx, resource, &self.predicate.path);
        match self.predicate.op {
            FilterOp::IsNull => {
                let want_null = self.predicate.values.first().is_some_and(|v| v == "true");
                let has_value = values.iter().any(|v| !v.is_null());
                want_null != has_value
            }
            FilterOp::Ne => !values
                .iter()
                .filter_map(|v| Scalar::from_json(self.kind, v))
                .any(|s| holds(FilterOp::Eq, &s, &self.literals)),
            op => values
                .iter()
                .filter_map(|v| Scalar::from_json(self.kind, v))
                .any(|s| holds(op, &s, &self.literals)),
        }
    }
}

fn compile(predicates: &[FilterPredicate]) -> Result<Vec<Compiled<'_>>, RepositoryError> {
    let mut compiled = Vec::with_capacity(predicates.len());
    let mut violations = Vec::new();
    for predicate in predicates {
        let Some(kind) = predicate.path.terminal_kind() else {
            violations.push(ConstraintViolation::parameter(
                &predicate.parameter,
                "filter path does not end in an attribute",
            ));
            continue;
        };
        if predicate.op == FilterOp::IsNull {
            compiled.push(Compiled {
                predicate,
                kind,
                literals: Vec::new(),
            });
            continue;
        }
        match predicate
            .values
            .iter()
            .map(|raw| Scalar::parse_literal(kind, raw))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(literals) => compiled.push(Compiled {
                predicate,
                kind,
                literals,
            }),
            Err(reason) => violations.push(ConstraintViolation::parameter(
                &predicate.parameter,
                reason,
            )),
        }
    }
    if violations.is_empty() {
        Ok(compiled)
    } else {
        Err(RepositoryError::Constraint(violations))
    }
}

fn sort_values(idx: &TypeIndex<'_>, resource: &Resource, ordering: &SortOrder) -> Vec<Option<Scalar>> {
    ordering
        .keys()
        .iter()
        .map(|key| match &key.field {
            OrderField::Id => Some(Scalar::id(&resource.id)),
            OrderField::Path(path) => {
                let kind = path.terminal_kind()?;
                reach(idx, resource, path)
                    .into_iter()
                    .find_map(|v| Scalar::from_json(kind, v))
            }
        })
        .collect()
}

/* ---------- repository ---------- */

/// Resources per type behind a read-write lock; lookups by id are indexed per call.
pub struct InMemoryRepository {
    registry: Arc<SchemaRegistry>,
    store: RwLock<HashMap<String, Vec<Resource>>>,
}

impl InMemoryRepository {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or replaces by (type, id).
    pub fn insert(&self, resource: Resource) -> Result<(), RepositoryError> {
        if !self.registry.contains(&resource.resource_type) {
            return Err(RepositoryError::Constraint(vec![ConstraintViolation {
                target: ViolationTarget::Document,
                detail: format!(
                    "resource type '{}' is not registered",
                    resource.resource_type
                ),
            }]));
        }
        let mut store = self.store.write();
        let items = store.entry(resource.resource_type.clone()).or_default();
        match items.iter_mut().find(|r| r.id == resource.id) {
            Some(existing) => *existing = resource,
            None => items.push(resource),
        }
        Ok(())
    }

    pub fn extend(
        &self,
        resources: impl IntoIterator<Item = Resource>,
    ) -> Result<usize, RepositoryError> {
        let mut count = 0;
        for resource in resources {
            self.insert(resource)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn count(&self, resource_type: &str) -> usize {
        self.store.read().get(resource_type).map_or(0, Vec::len)
    }

    fn find_sync(&self, query: &RepositoryQuery) -> Result<FindResult, RepositoryError> {
        let compiled = compile(&query.predicates)?;
        let order_tokens = query.ordering.to_signed_tokens();
        let fingerprint = short_query_hash(&query.predicates, &query.ordering);

        let offset = match &query.page.position {
            PagePosition::Cursor(token) => {
                let cursor = CursorV1::decode(token)
                    .and_then(|c| c.verify(&order_tokens, Some(fingerprint.as_str())).map(|_| c))
                    .map_err(|e| {
                        RepositoryError::Constraint(vec![ConstraintViolation::parameter(
                            CURSOR_PARAM,
                            e.to_string(),
                        )])
                    })?;
                cursor.position
            }
            _ => query.page.offset().unwrap_or(0),
        };

        let store = self.store.read();
        let idx = index(&store);
        let candidates: &[Resource] = store
            .get(&query.resource_type)
            .map_or(&[][..], Vec::as_slice);

        let mut rows: Vec<(Vec<Option<Scalar>>, &Resource)> = candidates
            .iter()
            .filter(|r| compiled.iter().all(|c| c.matches(&idx, r)))
            .map(|r| (sort_values(&idx, r, &query.ordering), r))
            .collect();

        let keys = query.ordering.keys();
        rows.sort_by(|(a, _), (b, _)| {
            keys.iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(key, (x, y))| {
                    let ord = cmp_optional(x, y);
                    if key.dir == SortDir::Desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let total = rows.len() as u64;
        let size = query.page.size.max(1);
        let end = offset.saturating_add(size);
        let items: Vec<Resource> = rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(size).unwrap_or(usize::MAX))
            .map(|(_, r)| r.clone())
            .collect();

        let next_cursor = (end < total).then(|| {
            CursorV1 {
                position: end,
                order: order_tokens.clone(),
                fingerprint: Some(fingerprint.clone()),
            }
            .encode()
        });

        debug!(
            resource_type = %query.resource_type,
            matched = total,
            offset,
            returned = items.len(),
            "in-memory find"
        );

        let is_cursor = matches!(query.page.position, PagePosition::Cursor(_));
        Ok(FindResult {
            items,
            page: PageMeta {
                total: (!is_cursor).then_some(total),
                has_more: Some(end < total),
                has_previous: Some(offset > 0),
                next_cursor,
            },
        })
    }

    fn find_included_sync(
        &self,
        roots: &[Resource],
        include: &[ResolvedPath],
    ) -> IncludedByPath {
        let store = self.store.read();
        let idx = index(&store);

        let mut ordered: Vec<&ResolvedPath> = include.iter().collect();
        ordered.sort_by_key(|p| p.len());

        let root_refs: Vec<&Resource> = roots.iter().collect();
        let mut frontiers: HashMap<String, Vec<&Resource>> = HashMap::new();
        let mut out = IncludedByPath::new();

        for path in ordered {
            let Some(hop) = path.terminal() else {
                continue;
            };
            let Some(target) = hop.target_type() else {
                continue;
            };
            let parents: &[&Resource] = if path.len() == 1 {
                &root_refs
            } else {
                frontiers
                    .get(&path.prefix(path.len() - 1).dotted())
                    .map_or(&[][..], Vec::as_slice)
            };

            let mut seen = HashSet::new();
            let related: Vec<&Resource> = follow(&idx, parents, &hop.name, target)
                .into_iter()
                .filter(|r| seen.insert(r.id.as_str()))
                .collect();
            debug!(path = %path, parents = parents.len(), related = related.len(), "include hop");

            out.insert(path.dotted(), related.iter().map(|r| (*r).clone()).collect());
            frontiers.insert(path.dotted(), related);
        }
        out
    }
}

#[async_trait]
impl ResourceRepository for InMemoryRepository {
    #[instrument(name = "jsonapi.memory.find", skip(self, query), fields(resource_type = %query.resource_type))]
    async fn find(&self, query: &RepositoryQuery) -> Result<FindResult, RepositoryError> {
        self.find_sync(query)
    }

    async fn find_included(
        &self,
        roots: &[Resource],
        include: &[ResolvedPath],
    ) -> Result<IncludedByPath, RepositoryError> {
        Ok(self.find_included_sync(roots, include))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_parsing_by_kind() {
        assert_eq!(
            Scalar::parse_literal(FieldKind::Integer, "42"),
            Ok(Scalar::Num(BigDecimal::from(42)))
        );
        assert!(Scalar::parse_literal(FieldKind::Integer, "4.2").is_err());
        assert!(Scalar::parse_literal(FieldKind::Float, "4.2").is_ok());
        assert!(Scalar::parse_literal(FieldKind::Boolean, "yes").is_err());
        assert!(Scalar::parse_literal(FieldKind::DateTime, "2024-05-01T00:00:00+02:00").is_ok());
    }

    #[test]
    fn numbers_compare_exactly() {
        let a = Scalar::from_json(FieldKind::Float, &serde_json::json!(0.30000000000000004)).unwrap();
        let b = Scalar::parse_literal(FieldKind::Float, "0.3").unwrap();
        assert_eq!(a.total_cmp(&b), Ordering::Greater);
        let int = Scalar::from_json(FieldKind::Float, &serde_json::json!(3)).unwrap();
        let lit = Scalar::parse_literal(FieldKind::Float, "3.0").unwrap();
        assert_eq!(int.total_cmp(&lit), Ordering::Equal);
    }

    #[test]
    fn ids_sort_numerically() {
        assert_eq!(Scalar::id("9").total_cmp(&Scalar::id("10")), Ordering::Less);
        assert_eq!(Scalar::id("b").total_cmp(&Scalar::id("a")), Ordering::Greater);
    }

    #[test]
    fn string_operators() {
        let v = Scalar::Str("Hello world".into());
        let lit = |s: &str| vec![Scalar::Str(s.into())];
        assert!(holds(FilterOp::Contains, &v, &lit("lo w")));
        assert!(holds(FilterOp::StartsWith, &v, &lit("Hell")));
        assert!(!holds(FilterOp::EndsWith, &v, &lit("World")));
        assert!(holds(FilterOp::In, &v, &[Scalar::Str("x".into()), v.clone()]));
    }

    #[test]
    fn case_insensitive_string_operators() {
        let v = Scalar::Str("Hello World".into());
        let lit = |s: &str| vec![Scalar::Str(s.into())];
        assert!(holds(FilterOp::IExact, &v, &lit("hello world")));
        assert!(!holds(FilterOp::IExact, &v, &lit("hello")));
        assert!(holds(FilterOp::IContains, &v, &lit("LO WO")));
        assert!(holds(FilterOp::IStartsWith, &v, &lit("hELL")));
        assert!(holds(FilterOp::IEndsWith, &v, &lit("WORLD")));
        assert!(!holds(FilterOp::EndsWith, &v, &lit("WORLD")));
        assert!(!holds(FilterOp::IContains, &Scalar::Bool(true), &lit("true")));
    }
}
