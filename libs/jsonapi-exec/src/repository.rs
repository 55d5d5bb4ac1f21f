//! Port to the resource data source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use jsonapi_core::{
    ErrorKind, FilterPredicate, JsonPointer, PageDescriptor, ResolvedPath, Resource,
    ResourceSchema, SortDir, SortKey, SourceError,
};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderField {
    /// The resource `id` member.
    Id,
    Path(ResolvedPath),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: OrderField,
    pub dir: SortDir,
}

/// Repository-facing ordering; may carry an `id` tiebreaker the client never asked for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortOrder(pub Vec<OrderKey>);

impl SortOrder {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }

    pub fn from_keys(keys: &[SortKey]) -> Self {
        Self(
            keys.iter()
                .map(|k| OrderKey {
                    field: OrderField::Path(k.path.clone()),
                    dir: k.dir,
                })
                .collect(),
        )
    }

    /// Appends `id` in `dir` unless an `id` key is already present.
    pub fn ensure_tiebreaker(mut self, dir: SortDir) -> Self {
        if !self.0.iter().any(|k| k.field == OrderField::Id) {
            self.0.push(OrderKey {
                field: OrderField::Id,
                dir,
            });
        }
        self
    }

    /// `"-created,+author.name,+id"`
    pub fn to_signed_tokens(&self) -> String {
        self.0
            .iter()
            .map(|k| match &k.field {
                OrderField::Id => format!("{}id", k.dir.sign()),
                OrderField::Path(p) => format!("{}{}", k.dir.sign(), p),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Everything a repository needs to answer one primary-data request.
#[derive(Clone, Debug)]
pub struct RepositoryQuery {
    pub resource_type: String,
    pub predicates: Vec<FilterPredicate>,
    pub ordering: SortOrder,
    pub page: PageDescriptor,
    /// Deepest include paths; ancestors are implied.
    pub prefetch: Vec<ResolvedPath>,
}

/// What the repository knows about the page it returned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub total: Option<u64>,
    pub has_more: Option<bool>,
    /// Whether rows precede this page; `None` when the source cannot tell.
    pub has_previous: Option<bool>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FindResult {
    pub items: Vec<Resource>,
    pub page: PageMeta,
}

/// Related resources keyed by dotted include path.
pub type IncludedByPath = BTreeMap<String, Vec<Resource>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationTarget {
    Parameter(String),
    Field(String),
    Document,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub target: ViolationTarget,
    pub detail: String,
}

impl ConstraintViolation {
    pub fn parameter(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            target: ViolationTarget::Parameter(name.into()),
            detail: detail.into(),
        }
    }

    pub fn field(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            target: ViolationTarget::Field(name.into()),
            detail: detail.into(),
        }
    }

    fn into_source_error(self, schema: &ResourceSchema) -> SourceError {
        let kind = ErrorKind::RepositoryConstraintViolation {
            reason: self.detail,
        };
        match self.target {
            ViolationTarget::Parameter(name) => SourceError::parameter(kind, name),
            ViolationTarget::Field(name) => match schema.category_of(&name) {
                Some(category) => SourceError::field(kind, name, category),
                None => SourceError::pointer(kind, JsonPointer::root().push("data").push(&name)),
            },
            ViolationTarget::Document => SourceError::document(kind),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{} constraint violation(s)", .0.len())]
    Constraint(Vec<ConstraintViolation>),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Unavailability becomes a single fatal error; every violation is kept.
    pub fn into_source_errors(self, schema: &ResourceSchema) -> Vec<SourceError> {
        match self {
            RepositoryError::Unavailable(reason) => vec![SourceError::document(
                ErrorKind::RepositoryUnavailable { reason },
            )],
            RepositoryError::Constraint(violations) => violations
                .into_iter()
                .map(|v| v.into_source_error(schema))
                .collect(),
        }
    }
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Primary data for one page.
    async fn find(&self, query: &RepositoryQuery) -> Result<FindResult, RepositoryError>;

    /// Related resources for every path in `include` (parents before children),
    /// reachable from `roots`. Implementations should batch per hop.
    async fn find_included(
        &self,
        roots: &[Resource],
        include: &[ResolvedPath],
    ) -> Result<IncludedByPath, RepositoryError>;
}
