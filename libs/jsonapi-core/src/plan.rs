//! Validated, immutable query plan produced by the parser.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::ResolvedPath;
use crate::schema::FieldKind;

/// Lookup operator of a `filter[...]` value; serialized as its query token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    #[serde(rename = "gte")]
    Ge,
    Lt,
    #[serde(rename = "lte")]
    Le,
    In,
    IsNull,
    Contains,
    StartsWith,
    EndsWith,
    IExact,
    IContains,
    IStartsWith,
    IEndsWith,
}

impl FilterOp {
    pub fn token(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Ge => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Le => "lte",
            FilterOp::In => "in",
            FilterOp::IsNull => "isnull",
            FilterOp::Contains => "contains",
            FilterOp::StartsWith => "startswith",
            FilterOp::EndsWith => "endswith",
            FilterOp::IExact => "iexact",
            FilterOp::IContains => "icontains",
            FilterOp::IStartsWith => "istartswith",
            FilterOp::IEndsWith => "iendswith",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Ge,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Le,
            "in" => FilterOp::In,
            "isnull" => FilterOp::IsNull,
            "contains" => FilterOp::Contains,
            "startswith" => FilterOp::StartsWith,
            "endswith" => FilterOp::EndsWith,
            "iexact" => FilterOp::IExact,
            "icontains" => FilterOp::IContains,
            "istartswith" => FilterOp::IStartsWith,
            "iendswith" => FilterOp::IEndsWith,
            _ => return None,
        })
    }

    pub fn applies_to(self, kind: FieldKind) -> bool {
        match self {
            FilterOp::Eq | FilterOp::Ne | FilterOp::In | FilterOp::IsNull => true,
            FilterOp::Gt | FilterOp::Ge | FilterOp::Lt | FilterOp::Le => {
                kind != FieldKind::Boolean
            }
            FilterOp::Contains
            | FilterOp::StartsWith
            | FilterOp::EndsWith
            | FilterOp::IExact
            | FilterOp::IContains
            | FilterOp::IStartsWith
            | FilterOp::IEndsWith => kind == FieldKind::String,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One `filter[...]` entry. `values` holds one literal, except for `in`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPredicate {
    pub path: ResolvedPath,
    pub op: FilterOp,
    pub values: Vec<String>,
    /// Raw query parameter name this predicate came from.
    pub parameter: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn sign(self) -> char {
        match self {
            SortDir::Asc => '+',
            SortDir::Desc => '-',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub path: ResolvedPath,
    pub dir: SortDir,
}

/// Requested includes keyed by dotted path. Ancestors are always present, and
/// iteration yields parents before children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncludeSet {
    paths: BTreeMap<String, ResolvedPath>,
}

impl IncludeSet {
    /// Adds `path` and every ancestor of it.
    pub fn insert(&mut self, path: ResolvedPath) {
        for ancestor in path.ancestors() {
            self.paths.entry(ancestor.dotted()).or_insert(ancestor);
        }
        self.paths.entry(path.dotted()).or_insert(path);
    }

    pub fn contains(&self, dotted: &str) -> bool {
        self.paths.contains_key(dotted)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &ResolvedPath> {
        self.paths.values()
    }

    pub fn dotted(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Paths that no other included path extends.
    pub fn leaves(&self) -> impl Iterator<Item = &ResolvedPath> {
        self.paths.iter().filter_map(move |(key, path)| {
            let prefix = format!("{key}.");
            let extended = self
                .paths
                .range::<String, _>(prefix.clone()..)
                .next()
                .is_some_and(|(next, _)| next.starts_with(&prefix));
            (!extended).then_some(path)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PagePosition {
    /// 1-based page number.
    Number(u64),
    Offset(u64),
    /// Opaque repository token, passed through untouched.
    Cursor(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageDescriptor {
    pub size: u64,
    pub position: PagePosition,
}

impl PageDescriptor {
    pub fn first(size: u64) -> Self {
        Self {
            size,
            position: PagePosition::Number(1),
        }
    }

    /// Row offset for number/offset style; `None` for cursors.
    pub fn offset(&self) -> Option<u64> {
        match &self.position {
            PagePosition::Number(n) => Some(n.saturating_sub(1).saturating_mul(self.size)),
            PagePosition::Offset(o) => Some(*o),
            PagePosition::Cursor(_) => None,
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        match &self.position {
            PagePosition::Cursor(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    resource_type: String,
    filters: Vec<FilterPredicate>,
    sort: Vec<SortKey>,
    include: IncludeSet,
    page: PageDescriptor,
}

impl QueryPlan {
    pub(crate) fn new(
        resource_type: String,
        filters: Vec<FilterPredicate>,
        sort: Vec<SortKey>,
        include: IncludeSet,
        page: PageDescriptor,
    ) -> Self {
        Self {
            resource_type,
            filters,
            sort,
            include,
            page,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn filters(&self) -> &[FilterPredicate] {
        &self.filters
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn include(&self) -> &IncludeSet {
        &self.include
    }

    pub fn page(&self) -> &PageDescriptor {
        &self.page
    }

    /// Sort keys as `"-created,+author.name"`.
    pub fn sort_tokens(&self) -> String {
        self.sort
            .iter()
            .map(|k| format!("{}{}", k.dir.sign(), k.path))
            .collect::<Vec<_>>()
            .join(",")
    }
}
