//! Raw query pairs -> [`QueryPlan`].
//!
//! Every parameter is examined even after a failure so the client gets the full
//! list of problems in one response. A plan is only returned when nothing failed.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::{PageSizePolicy, QueryConfig};
use crate::error::{ErrorKind, SourceError};
use crate::path::{PathPurpose, PathResolver, ResolvedPath};
use crate::plan::{
    FilterOp, FilterPredicate, IncludeSet, PageDescriptor, PagePosition, QueryPlan, SortDir,
    SortKey,
};
use crate::registry::SchemaRegistry;
use crate::schema::ResourceSchema;

const INCLUDE: &str = "include";
const SORT: &str = "sort";

enum Family<'a> {
    Filter(&'a str),
    Page(&'a str),
    Include,
    Sort,
}

fn malformed(name: &str, reason: impl Into<String>) -> SourceError {
    SourceError::parameter(
        ErrorKind::MalformedParameter {
            name: name.to_owned(),
            reason: reason.into(),
        },
        name,
    )
}

fn unsupported(name: &str) -> SourceError {
    SourceError::parameter(
        ErrorKind::UnsupportedParameter {
            name: name.to_owned(),
        },
        name,
    )
}

/// Splits `family[inner]`. `Ok(None)` when `name` is not of this family at all.
fn bracketed<'a>(name: &'a str, family: &str) -> Result<Option<&'a str>, SourceError> {
    let Some(rest) = name.strip_prefix(family) else {
        return Ok(None);
    };
    if !rest.is_empty() && !rest.starts_with('[') {
        return Ok(None);
    }
    let inner = rest
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .filter(|inner| !inner.contains(['[', ']']));
    match inner {
        Some(inner) => Ok(Some(inner)),
        None => Err(malformed(name, format!("expected {family}[<name>]"))),
    }
}

fn classify(name: &str) -> Result<Family<'_>, SourceError> {
    match name {
        INCLUDE => return Ok(Family::Include),
        SORT => return Ok(Family::Sort),
        _ => {}
    }
    if let Some(inner) = bracketed(name, "filter")? {
        return Ok(Family::Filter(inner));
    }
    if let Some(inner) = bracketed(name, "page")? {
        return Ok(Family::Page(inner));
    }
    Err(unsupported(name))
}

/// `"gt:5"` -> (Gt, "5"); anything without a known operator prefix is an equality literal.
fn split_operator(raw: &str) -> (FilterOp, &str) {
    raw.split_once(':')
        .and_then(|(head, tail)| FilterOp::from_token(head).map(|op| (op, tail)))
        .unwrap_or((FilterOp::Eq, raw))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PageKey {
    Size,
    Limit,
    Number,
    Offset,
    Cursor,
}

impl PageKey {
    fn from_inner(inner: &str) -> Option<Self> {
        Some(match inner {
            "size" => PageKey::Size,
            "limit" => PageKey::Limit,
            "number" => PageKey::Number,
            "offset" => PageKey::Offset,
            "cursor" => PageKey::Cursor,
            _ => return None,
        })
    }

    fn is_position(self) -> bool {
        matches!(self, PageKey::Number | PageKey::Offset | PageKey::Cursor)
    }
}

struct PageParam {
    key: PageKey,
    name: String,
    value: String,
}

/// Per-request accumulator; discarded once the plan (or the error list) is produced.
struct Draft<'a> {
    registry: &'a SchemaRegistry,
    schema: &'a ResourceSchema,
    resolver: PathResolver<'a>,
    cfg: &'a QueryConfig,
    errors: Vec<SourceError>,
    filters: Vec<FilterPredicate>,
    sort: Vec<SortKey>,
    sort_seen: HashSet<String>,
    sort_tokens: usize,
    include_requested: Vec<String>,
    include_given: bool,
    page: Vec<PageParam>,
}

impl<'a> Draft<'a> {
    fn new(registry: &'a SchemaRegistry, schema: &'a ResourceSchema, cfg: &'a QueryConfig) -> Self {
        Self {
            registry,
            schema,
            resolver: PathResolver::new(registry, cfg.max_path_depth),
            cfg,
            errors: Vec::new(),
            filters: Vec::new(),
            sort: Vec::new(),
            sort_seen: HashSet::new(),
            sort_tokens: 0,
            include_requested: Vec::new(),
            include_given: false,
            page: Vec::new(),
        }
    }

    fn root(&self) -> &'a str {
        self.schema.resource_type()
    }

    fn filter(&mut self, name: &str, inner: &str, raw: &str) {
        if inner.is_empty() || inner.split('.').any(str::is_empty) {
            self.errors.push(malformed(name, "filter path is empty"));
            return;
        }
        match self.resolver.resolve(self.root(), inner, PathPurpose::Filter) {
            Ok(path) => self.predicate(name, inner, path, raw),
            Err(kind) => self.errors.push(SourceError::parameter(kind, name)),
        }
    }

    fn predicate(&mut self, name: &str, inner: &str, path: ResolvedPath, raw: &str) {
        let Some(kind) = path.terminal_kind() else {
            self.errors.push(malformed(
                name,
                format!("filter path '{inner}' does not end in an attribute"),
            ));
            return;
        };

        let (op, literal) = split_operator(raw);
        if !op.applies_to(kind) {
            self.errors.push(malformed(
                name,
                format!(
                    "operator '{op}' cannot be applied to {} attribute '{inner}'",
                    kind.as_str()
                ),
            ));
            return;
        }
        let declared = self
            .registry
            .lookup(path.terminal_owner())
            .ok()
            .and_then(|owner| owner.attribute(&path.terminal()?.name));
        if declared.is_some_and(|attr| !attr.allows_lookup(op)) {
            self.errors.push(malformed(
                name,
                format!("unsupported lookup operator '{op}' for '{inner}'"),
            ));
            return;
        }

        let values = match op {
            FilterOp::In => {
                let items: Vec<String> = literal.split(',').map(|s| s.trim().to_owned()).collect();
                if items.iter().any(String::is_empty) {
                    self.errors
                        .push(malformed(name, "'in' requires a non-empty comma list"));
                    return;
                }
                items
            }
            FilterOp::IsNull => {
                if literal != "true" && literal != "false" {
                    self.errors
                        .push(malformed(name, "'isnull' expects 'true' or 'false'"));
                    return;
                }
                vec![literal.to_owned()]
            }
            _ => vec![literal.to_owned()],
        };

        self.filters.push(FilterPredicate {
            path,
            op,
            values,
            parameter: name.to_owned(),
        });
    }

    fn include(&mut self, raw: &str) {
        self.include_given = true;
        // `include=` explicitly asks for nothing, overriding defaults.
        if raw.is_empty() {
            return;
        }
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() || token.split('.').any(str::is_empty) {
                self.errors
                    .push(malformed(INCLUDE, "include paths must not be empty"));
                continue;
            }
            if !self.include_requested.iter().any(|p| p == token) {
                self.include_requested.push(token.to_owned());
            }
        }
    }

    fn sort(&mut self, raw: &str) {
        for token in raw.split(',') {
            let token = token.trim();
            self.sort_tokens += 1;
            let (dir, dotted) = match token.strip_prefix('-') {
                Some(rest) => (SortDir::Desc, rest),
                None => (SortDir::Asc, token),
            };
            if dotted.is_empty() || dotted.split('.').any(str::is_empty) {
                self.errors.push(malformed(SORT, "sort keys must not be empty"));
                continue;
            }
            if !self.sort_seen.insert(dotted.to_owned()) {
                self.errors.push(SourceError::parameter(
                    ErrorKind::DuplicateSortKey {
                        path: dotted.to_owned(),
                    },
                    SORT,
                ));
                continue;
            }
            match self.resolver.resolve(self.root(), dotted, PathPurpose::Sort) {
                Ok(path) => self.sort.push(SortKey { path, dir }),
                Err(kind) => self.errors.push(SourceError::parameter(kind, SORT)),
            }
        }
    }

    fn page(&mut self, name: &str, inner: &str, raw: &str) {
        let Some(key) = PageKey::from_inner(inner) else {
            self.errors.push(unsupported(name));
            return;
        };
        if self.page.iter().any(|p| p.key == key) {
            self.errors.push(malformed(name, "given more than once"));
            return;
        }
        self.page.push(PageParam {
            key,
            name: name.to_owned(),
            value: raw.to_owned(),
        });
    }

    fn finish_include(&mut self) -> IncludeSet {
        let mut set = IncludeSet::default();
        if !self.include_given {
            for dotted in self.schema.default_include() {
                match self
                    .resolver
                    .resolve(self.root(), dotted, PathPurpose::Include)
                {
                    Ok(path) => set.insert(path),
                    Err(kind) => {
                        warn!(resource_type = self.root(), path = %dotted, error = %kind, "skipping default include")
                    }
                }
            }
            return set;
        }

        if self.include_requested.len() > self.cfg.max_include_paths {
            self.errors.push(SourceError::parameter(
                ErrorKind::LimitExceeded {
                    family: INCLUDE.to_owned(),
                    count: self.include_requested.len(),
                    max: self.cfg.max_include_paths,
                },
                INCLUDE,
            ));
            return set;
        }
        let requested = std::mem::take(&mut self.include_requested);
        for dotted in &requested {
            match self
                .resolver
                .resolve(self.root(), dotted, PathPurpose::Include)
            {
                Ok(path) => set.insert(path),
                Err(kind) => self.errors.push(SourceError::parameter(kind, INCLUDE)),
            }
        }
        set
    }

    fn finish_sort(&mut self) {
        if self.sort_tokens > self.cfg.max_sort_keys {
            self.errors.push(SourceError::parameter(
                ErrorKind::LimitExceeded {
                    family: SORT.to_owned(),
                    count: self.sort_tokens,
                    max: self.cfg.max_sort_keys,
                },
                SORT,
            ));
        }
    }

    fn finish_page(&mut self) -> PageDescriptor {
        let mut page = PageDescriptor::first(self.schema.default_page_size());
        let params = std::mem::take(&mut self.page);

        let sizes: Vec<&PageParam> = params
            .iter()
            .filter(|p| matches!(p.key, PageKey::Size | PageKey::Limit))
            .collect();
        if let [first, second, ..] = sizes.as_slice() {
            self.errors.push(conflict(first, second));
        } else if let Some(size) = sizes.first() {
            if let Some(n) = self.parse_positive(size) {
                page.size = self.bound_size(size, n);
            }
        }

        let positions: Vec<&PageParam> = params.iter().filter(|p| p.key.is_position()).collect();
        if let [first, second, ..] = positions.as_slice() {
            self.errors.push(conflict(first, second));
            return page;
        }
        if let Some(param) = positions.first() {
            match param.key {
                PageKey::Number => {
                    if let Some(n) = self.parse_positive(param) {
                        page.position = PagePosition::Number(n);
                    }
                }
                PageKey::Offset => match param.value.parse::<u64>() {
                    Ok(o) => page.position = PagePosition::Offset(o),
                    Err(_) => self.errors.push(malformed(
                        &param.name,
                        "expected a non-negative integer",
                    )),
                },
                PageKey::Cursor if param.value.is_empty() => {
                    self.errors
                        .push(malformed(&param.name, "cursor must not be empty"));
                }
                PageKey::Cursor => page.position = PagePosition::Cursor(param.value.clone()),
                PageKey::Size | PageKey::Limit => {}
            }
        }
        page
    }

    fn parse_positive(&mut self, param: &PageParam) -> Option<u64> {
        match param.value.parse::<u64>() {
            Ok(n) if n > 0 => Some(n),
            _ => {
                self.errors
                    .push(malformed(&param.name, "expected a positive integer"));
                None
            }
        }
    }

    fn bound_size(&mut self, param: &PageParam, requested: u64) -> u64 {
        let max = self.schema.max_page_size();
        if requested <= max {
            return requested;
        }
        match self.cfg.page_size_policy {
            PageSizePolicy::Clamp => {
                debug!(requested, max, "clamping page size");
                max
            }
            PageSizePolicy::Reject => {
                self.errors.push(SourceError::parameter(
                    ErrorKind::PageSizeExceeded { requested, max },
                    &param.name,
                ));
                max
            }
        }
    }
}

fn conflict(first: &PageParam, second: &PageParam) -> SourceError {
    SourceError::parameter(
        ErrorKind::ConflictingPageParams {
            first: first.name.clone(),
            second: second.name.clone(),
        },
        second.name.clone(),
    )
}

/// Turns raw query pairs into a validated [`QueryPlan`] for one resource type.
#[derive(Clone, Debug)]
pub struct QueryParser {
    registry: Arc<SchemaRegistry>,
    config: QueryConfig,
}

impl QueryParser {
    pub fn new(registry: Arc<SchemaRegistry>, config: QueryConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Parses `raw` (in URL order, names case-sensitive) for `resource_type`.
    #[instrument(name = "jsonapi.parser.parse", skip(self, raw), fields(resource_type = %resource_type))]
    pub fn parse<K, V>(
        &self,
        resource_type: &str,
        raw: impl IntoIterator<Item = (K, V)>,
    ) -> Result<QueryPlan, Vec<SourceError>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let schema = self
            .registry
            .lookup(resource_type)
            .map_err(|kind| vec![SourceError::document(kind)])?;

        let mut draft = Draft::new(&self.registry, schema, &self.config);

        for (name, value) in raw {
            let (name, value) = (name.as_ref(), value.as_ref());
            match classify(name) {
                Ok(Family::Filter(inner)) => draft.filter(name, inner, value),
                Ok(Family::Page(inner)) => draft.page(name, inner, value),
                Ok(Family::Include) => draft.include(value),
                Ok(Family::Sort) => draft.sort(value),
                Err(e) => draft.errors.push(e),
            }
        }

        let include = draft.finish_include();
        draft.finish_sort();
        let page = draft.finish_page();

        if !draft.errors.is_empty() {
            debug!(errors = draft.errors.len(), "query rejected");
            return Err(draft.errors);
        }

        debug!(
            filters = draft.filters.len(),
            sort = draft.sort.len(),
            include = include.len(),
            page_size = page.size,
            "query plan built"
        );
        Ok(QueryPlan::new(
            resource_type.to_owned(),
            draft.filters,
            draft.sort,
            include,
            page,
        ))
    }
}
