//! Runs a [`QueryPlan`] against a [`ResourceRepository`].

use std::collections::HashSet;
use std::sync::Arc;

use jsonapi_core::{
    PageDescriptor, PagePosition, QueryConfig, QueryPlan, ResolvedPath, Resource,
    ResourceIdentifier, SchemaRegistry, SortDir, SourceError,
};
use tracing::{debug, instrument, warn};

use crate::repository::{IncludedByPath, PageMeta, RepositoryQuery, ResourceRepository, SortOrder};

/// Navigation state of the returned page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub size: u64,
    pub position: PagePosition,
    pub total: Option<u64>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub first: Option<PagePosition>,
    pub prev: Option<PagePosition>,
    pub next: Option<PagePosition>,
    pub last: Option<PagePosition>,
    /// Repository token for continuing from this page, whatever style was requested.
    pub next_cursor: Option<String>,
}

impl Pagination {
    pub fn compute(page: &PageDescriptor, meta: &PageMeta) -> Self {
        let size = page.size.max(1);
        let mut out = Pagination {
            size,
            position: page.position.clone(),
            total: meta.total,
            has_next_page: false,
            has_previous_page: false,
            first: None,
            prev: None,
            next: None,
            last: None,
            next_cursor: meta.next_cursor.clone(),
        };

        let has_more = |offset: u64| {
            meta.total
                .map(|total| offset.saturating_add(size) < total)
                .or(meta.has_more)
                .unwrap_or(false)
        };

        match page.position {
            PagePosition::Number(number) => {
                let last = meta.total.map(|total| total.div_ceil(size).max(1));
                let following = number.checked_add(1);
                out.has_next_page = following.is_some() && has_more(page.offset().unwrap_or(0));
                out.has_previous_page = number > 1;
                out.first = Some(PagePosition::Number(1));
                out.last = last.map(PagePosition::Number);
                out.next = following
                    .filter(|_| out.has_next_page)
                    .map(PagePosition::Number);
                out.prev = out.has_previous_page.then(|| {
                    PagePosition::Number(last.map_or(number - 1, |l| (number - 1).min(l)))
                });
            }
            PagePosition::Offset(offset) => {
                let following = offset.checked_add(size);
                out.has_next_page = following.is_some() && has_more(offset);
                out.has_previous_page = offset > 0;
                out.first = Some(PagePosition::Offset(0));
                out.last = meta
                    .total
                    .map(|total| PagePosition::Offset(total.saturating_sub(size)));
                out.next = following
                    .filter(|_| out.has_next_page)
                    .map(PagePosition::Offset);
                out.prev = out
                    .has_previous_page
                    .then(|| PagePosition::Offset(offset.saturating_sub(size)));
            }
            PagePosition::Cursor(_) => {
                out.has_next_page = meta.next_cursor.is_some() || meta.has_more.unwrap_or(false);
                out.has_previous_page = meta.has_previous.unwrap_or(false);
                out.next = meta.next_cursor.clone().map(PagePosition::Cursor);
            }
        }
        out
    }
}

/// Primary data, deduplicated included resources and pagination.
#[derive(Clone, Debug)]
pub struct Execution {
    pub data: Vec<Resource>,
    pub included: Vec<Resource>,
    pub pagination: Pagination,
}

pub struct Executor {
    registry: Arc<SchemaRegistry>,
    append_tiebreaker: bool,
}

impl Executor {
    pub fn new(registry: Arc<SchemaRegistry>, config: &QueryConfig) -> Self {
        Self {
            registry,
            append_tiebreaker: config.append_tiebreaker,
        }
    }

    #[instrument(
        name = "jsonapi.executor.execute",
        skip(self, plan, repository),
        fields(resource_type = %plan.resource_type())
    )]
    pub async fn execute(
        &self,
        plan: &QueryPlan,
        repository: &dyn ResourceRepository,
    ) -> Result<Execution, Vec<SourceError>> {
        let schema = self
            .registry
            .lookup(plan.resource_type())
            .map_err(|kind| vec![SourceError::document(kind)])?;

        let mut ordering = SortOrder::from_keys(plan.sort());
        if self.append_tiebreaker {
            ordering = ordering.ensure_tiebreaker(SortDir::Asc);
        }

        let query = RepositoryQuery {
            resource_type: plan.resource_type().to_owned(),
            predicates: plan.filters().to_vec(),
            ordering,
            page: plan.page().clone(),
            prefetch: plan.include().leaves().cloned().collect(),
        };

        let found = repository.find(&query).await.map_err(|e| {
            warn!(error = %e, "repository find failed");
            e.into_source_errors(schema)
        })?;

        let included = if plan.include().is_empty() || found.items.is_empty() {
            Vec::new()
        } else {
            let paths: Vec<ResolvedPath> = plan.include().paths().cloned().collect();
            let by_path = repository
                .find_included(&found.items, &paths)
                .await
                .map_err(|e| {
                    warn!(error = %e, "repository find_included failed");
                    e.into_source_errors(schema)
                })?;
            merge_included(&found.items, by_path)
        };

        let pagination = Pagination::compute(plan.page(), &found.page);
        debug!(
            items = found.items.len(),
            included = included.len(),
            total = ?pagination.total,
            "query executed"
        );

        Ok(Execution {
            data: found.items,
            included,
            pagination,
        })
    }
}

/// Flattens per-path results, dropping repeats and anything already primary.
fn merge_included(primary: &[Resource], by_path: IncludedByPath) -> Vec<Resource> {
    let mut seen: HashSet<ResourceIdentifier> = primary.iter().map(Resource::identifier).collect();
    let mut out = Vec::new();
    for resources in by_path.into_values() {
        for resource in resources {
            if seen.insert(resource.identifier()) {
                out.push(resource);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(total: Option<u64>) -> PageMeta {
        PageMeta {
            total,
            ..PageMeta::default()
        }
    }

    #[test]
    fn number_style_links() {
        let page = PageDescriptor {
            size: 10,
            position: PagePosition::Number(2),
        };
        let p = Pagination::compute(&page, &meta(Some(35)));
        assert!(p.has_next_page && p.has_previous_page);
        assert_eq!(p.first, Some(PagePosition::Number(1)));
        assert_eq!(p.prev, Some(PagePosition::Number(1)));
        assert_eq!(p.next, Some(PagePosition::Number(3)));
        assert_eq!(p.last, Some(PagePosition::Number(4)));

        let empty = Pagination::compute(&PageDescriptor::first(10), &meta(Some(0)));
        assert!(!empty.has_next_page && !empty.has_previous_page);
        assert_eq!(empty.last, Some(PagePosition::Number(1)));
    }

    #[test]
    fn offset_style_links() {
        let page = PageDescriptor {
            size: 10,
            position: PagePosition::Offset(25),
        };
        let p = Pagination::compute(&page, &meta(Some(30)));
        assert!(!p.has_next_page);
        assert!(p.has_previous_page);
        assert_eq!(p.prev, Some(PagePosition::Offset(15)));
        assert_eq!(p.last, Some(PagePosition::Offset(20)));
        assert_eq!(p.next, None);
    }

    #[test]
    fn has_more_without_total() {
        let page = PageDescriptor::first(5);
        let p = Pagination::compute(
            &page,
            &PageMeta {
                has_more: Some(true),
                ..PageMeta::default()
            },
        );
        assert!(p.has_next_page);
        assert_eq!(p.last, None);
        assert_eq!(p.next, Some(PagePosition::Number(2)));
    }

    #[test]
    fn cursor_passes_through() {
        let page = PageDescriptor {
            size: 5,
            position: PagePosition::Cursor("abc".into()),
        };
        let p = Pagination::compute(
            &page,
            &PageMeta {
                next_cursor: Some("def".into()),
                ..PageMeta::default()
            },
        );
        assert_eq!(p.position, PagePosition::Cursor("abc".into()));
        assert_eq!(p.next, Some(PagePosition::Cursor("def".into())));
        assert!(p.has_next_page);
        assert!(!p.has_previous_page);

        let later = Pagination::compute(
            &page,
            &PageMeta {
                has_previous: Some(true),
                ..PageMeta::default()
            },
        );
        assert!(later.has_previous_page);
        assert!(!later.has_next_page);
        assert_eq!(later.next, None);
    }

    #[test]
    fn last_representable_page_has_no_next() {
        let more = PageMeta {
            has_more: Some(true),
            ..PageMeta::default()
        };

        let by_number = PageDescriptor {
            size: 5,
            position: PagePosition::Number(u64::MAX),
        };
        let p = Pagination::compute(&by_number, &more);
        assert!(!p.has_next_page);
        assert_eq!(p.next, None);
        assert_eq!(p.prev, Some(PagePosition::Number(u64::MAX - 1)));

        let by_offset = PageDescriptor {
            size: 5,
            position: PagePosition::Offset(u64::MAX - 2),
        };
        let p = Pagination::compute(&by_offset, &more);
        assert!(!p.has_next_page);
        assert_eq!(p.next, None);
        assert!(p.has_previous_page);
    }

    #[test]
    fn merge_drops_primary_and_repeats() {
        let primary = vec![Resource::new("people", "1")];
        let mut by_path = IncludedByPath::new();
        by_path.insert(
            "author".into(),
            vec![Resource::new("people", "1"), Resource::new("people", "2")],
        );
        by_path.insert(
            "comments.author".into(),
            vec![Resource::new("people", "2"), Resource::new("people", "3")],
        );
        let merged: Vec<String> = merge_included(&primary, by_path)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(merged, vec!["2", "3"]);
    }
}
