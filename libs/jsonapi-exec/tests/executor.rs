use std::sync::Arc;

use async_trait::async_trait;
use jsonapi_core::{
    Attribute, ErrorKind, FieldKind, PagePosition, QueryConfig, QueryParser, Relationship,
    ResolvedPath, Resource, ResourceIdentifier, ResourceSchema, SchemaRegistry, SourceLocator,
};
use jsonapi_exec::{
    Executor, FindResult, InMemoryRepository, IncludedByPath, RepositoryError, RepositoryQuery,
    ResourceRepository,
};
use parking_lot::Mutex;

fn registry() -> Arc<SchemaRegistry> {
    let mut builder = SchemaRegistry::builder();
    builder
        .register(
            ResourceSchema::new("articles")
                .with_attribute(Attribute::new("title", FieldKind::String).filterable().sortable())
                .with_attribute(Attribute::new("body", FieldKind::String))
                .with_attribute(Attribute::new("rating", FieldKind::Integer).filterable().sortable())
                .with_relationship(Relationship::to_one("author", "people"))
                .with_relationship(Relationship::to_many("comments", "comments"))
                .with_page_sizes(2, 10),
        )
        .unwrap()
        .register(
            ResourceSchema::new("people")
                .with_attribute(Attribute::new("name", FieldKind::String).filterable().sortable())
                .with_relationship(Relationship::to_one("country", "countries")),
        )
        .unwrap()
        .register(
            ResourceSchema::new("countries")
                .with_attribute(Attribute::new("code", FieldKind::String).filterable().sortable()),
        )
        .unwrap()
        .register(
            ResourceSchema::new("comments")
                .with_attribute(Attribute::new("text", FieldKind::String))
                .with_relationship(Relationship::to_one("author", "people")),
        )
        .unwrap();
    Arc::new(builder.build().unwrap())
}

fn person(id: &str) -> ResourceIdentifier {
    ResourceIdentifier::new("people", id)
}

fn seeded(registry: &Arc<SchemaRegistry>) -> InMemoryRepository {
    let repo = InMemoryRepository::new(registry.clone());
    repo.extend([
        Resource::new("countries", "nl").with_attribute("code", "NL"),
        Resource::new("countries", "be").with_attribute("code", "BE"),
        Resource::new("people", "1")
            .with_attribute("name", "Ann")
            .with_to_one("country", Some(ResourceIdentifier::new("countries", "nl"))),
        Resource::new("people", "2")
            .with_attribute("name", "Bob")
            .with_to_one("country", Some(ResourceIdentifier::new("countries", "be"))),
        Resource::new("people", "3").with_attribute("name", "Cid"),
        Resource::new("comments", "c1")
            .with_attribute("text", "nice")
            .with_to_one("author", Some(person("3"))),
        Resource::new("comments", "c2")
            .with_attribute("text", "meh")
            .with_to_one("author", Some(person("1"))),
        Resource::new("articles", "10")
            .with_attribute("title", "Rust")
            .with_attribute("rating", 5)
            .with_to_one("author", Some(person("1")))
            .with_to_many(
                "comments",
                [
                    ResourceIdentifier::new("comments", "c1"),
                    ResourceIdentifier::new("comments", "c2"),
                ],
            ),
        Resource::new("articles", "11")
            .with_attribute("title", "Go")
            .with_attribute("rating", 3)
            .with_to_one("author", Some(person("2"))),
        Resource::new("articles", "12")
            .with_attribute("title", "Zig")
            .with_attribute("rating", 4)
            .with_to_one("author", Some(person("1"))),
        Resource::new("articles", "9")
            .with_attribute("title", "C")
            .with_attribute("rating", serde_json::Value::Null)
            .with_to_one("author", None),
    ])
    .unwrap();
    repo
}

fn ids(resources: &[Resource]) -> Vec<&str> {
    resources.iter().map(|r| r.id.as_str()).collect()
}

struct Harness {
    parser: QueryParser,
    executor: Executor,
    repo: InMemoryRepository,
}

impl Harness {
    fn new() -> Self {
        let registry = registry();
        let cfg = QueryConfig::default();
        Self {
            parser: QueryParser::new(registry.clone(), cfg.clone()),
            executor: Executor::new(registry.clone(), &cfg),
            repo: seeded(&registry),
        }
    }

    async fn run(
        &self,
        pairs: &[(&str, &str)],
    ) -> Result<jsonapi_exec::Execution, Vec<jsonapi_core::SourceError>> {
        let plan = self
            .parser
            .parse("articles", pairs.iter().copied())
            .expect("valid query");
        self.executor.execute(&plan, &self.repo).await
    }
}

#[tokio::test]
async fn empty_repository_yields_empty_result() {
    let registry = registry();
    let cfg = QueryConfig::default();
    let parser = QueryParser::new(registry.clone(), cfg.clone());
    let executor = Executor::new(registry.clone(), &cfg);
    let repo = InMemoryRepository::new(registry);

    let plan = parser
        .parse(
            "articles",
            [
                ("filter[title]", "eq:Foo"),
                ("sort", "-author.name"),
                ("include", "author"),
                ("page[size]", "5"),
            ],
        )
        .unwrap();
    let out = executor.execute(&plan, &repo).await.unwrap();
    assert!(out.data.is_empty());
    assert!(out.included.is_empty());
    assert_eq!(out.pagination.total, Some(0));
    assert!(!out.pagination.has_next_page);
}

#[tokio::test]
async fn filters_across_relationships() {
    let h = Harness::new();
    let out = h
        .run(&[("filter[author.country.code]", "NL"), ("page[size]", "10")])
        .await
        .unwrap();
    assert_eq!(ids(&out.data), vec!["10", "12"]);

    let out = h
        .run(&[
            ("filter[author.country.code]", "iexact:nl"),
            ("page[size]", "10"),
        ])
        .await
        .unwrap();
    assert_eq!(ids(&out.data), vec!["10", "12"]);

    let out = h
        .run(&[("filter[rating]", "gte:4"), ("sort", "-rating")])
        .await
        .unwrap();
    assert_eq!(ids(&out.data), vec!["10", "12"]);

    let out = h.run(&[("filter[rating]", "isnull:true")]).await.unwrap();
    assert_eq!(ids(&out.data), vec!["9"]);

    let out = h
        .run(&[("filter[title]", "in:Go,Zig"), ("filter[author.name]", "ne:Bob")])
        .await
        .unwrap();
    assert_eq!(ids(&out.data), vec!["12"]);
}

#[tokio::test]
async fn sorts_with_tiebreaker_and_paginates() {
    let h = Harness::new();
    let out = h
        .run(&[("sort", "author.name"), ("page[number]", "1")])
        .await
        .unwrap();
    // null author first, then Ann (10, 12 by id), then Bob.
    assert_eq!(ids(&out.data), vec!["9", "10"]);
    assert_eq!(out.pagination.total, Some(4));
    assert_eq!(out.pagination.next, Some(PagePosition::Number(2)));
    assert_eq!(out.pagination.last, Some(PagePosition::Number(2)));

    let second = h
        .run(&[("sort", "author.name"), ("page[number]", "2")])
        .await
        .unwrap();
    assert_eq!(ids(&second.data), vec!["12", "11"]);
    assert!(!second.pagination.has_next_page);
    assert!(second.pagination.has_previous_page);
}

#[tokio::test]
async fn cursor_continues_the_same_query() {
    let h = Harness::new();
    let first = h.run(&[("sort", "-rating")]).await.unwrap();
    assert_eq!(ids(&first.data), vec!["10", "12"]);
    let token = first.pagination.next_cursor.clone().expect("more rows");

    let next = h
        .run(&[("sort", "-rating"), ("page[cursor]", token.as_str())])
        .await
        .unwrap();
    assert_eq!(ids(&next.data), vec!["11", "9"]);
    assert!(next.pagination.next_cursor.is_none());
    assert!(!first.pagination.has_previous_page);
    assert!(next.pagination.has_previous_page);
    assert_eq!(next.pagination.total, None);

    let errs = h
        .run(&[("sort", "title"), ("page[cursor]", token.as_str())])
        .await
        .unwrap_err();
    assert_eq!(
        errs[0].locator,
        SourceLocator::Parameter("page[cursor]".into())
    );
    assert!(matches!(
        errs[0].kind,
        ErrorKind::RepositoryConstraintViolation { .. }
    ));
}

#[tokio::test]
async fn includes_are_deduplicated() {
    let h = Harness::new();
    let out = h
        .run(&[
            ("include", "author.country,comments.author"),
            ("filter[author.name]", "Ann"),
            ("page[size]", "10"),
        ])
        .await
        .unwrap();
    assert_eq!(ids(&out.data), vec!["10", "12"]);

    let mut included: Vec<(String, String)> = out
        .included
        .iter()
        .map(|r| (r.resource_type.clone(), r.id.clone()))
        .collect();
    included.sort();
    assert_eq!(
        included,
        vec![
            ("comments".to_string(), "c1".to_string()),
            ("comments".to_string(), "c2".to_string()),
            ("countries".to_string(), "nl".to_string()),
            ("people".to_string(), "1".to_string()),
            ("people".to_string(), "3".to_string()),
        ]
    );
}

#[tokio::test]
async fn literal_type_errors_point_at_parameter() {
    let h = Harness::new();
    let errs = h
        .run(&[("filter[rating]", "gt:lots"), ("filter[title]", "x")])
        .await
        .unwrap_err();
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs[0].locator,
        SourceLocator::Parameter("filter[rating]".into())
    );
}

/// Records calls and optionally fails.
#[derive(Default)]
struct ScriptedRepository {
    fail: Option<RepositoryError>,
    prefetch_seen: Mutex<Vec<Vec<String>>>,
    include_calls: Mutex<usize>,
}

#[async_trait]
impl ResourceRepository for ScriptedRepository {
    async fn find(&self, query: &RepositoryQuery) -> Result<FindResult, RepositoryError> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        self.prefetch_seen
            .lock()
            .push(query.prefetch.iter().map(|p| p.dotted()).collect());
        assert_eq!(query.ordering.to_signed_tokens(), "+id");
        Ok(FindResult {
            items: vec![Resource::new("articles", "1").with_to_one("author", Some(person("7")))],
            page: Default::default(),
        })
    }

    async fn find_included(
        &self,
        _roots: &[Resource],
        include: &[ResolvedPath],
    ) -> Result<IncludedByPath, RepositoryError> {
        *self.include_calls.lock() += 1;
        assert_eq!(include.len(), 2);
        Ok(IncludedByPath::new())
    }
}

#[tokio::test]
async fn one_batched_include_call_with_leaf_prefetch() {
    let registry = registry();
    let cfg = QueryConfig::default();
    let plan = QueryParser::new(registry.clone(), cfg.clone())
        .parse("articles", [("include", "author.country")])
        .unwrap();
    let repo = ScriptedRepository::default();

    Executor::new(registry, &cfg)
        .execute(&plan, &repo)
        .await
        .unwrap();

    assert_eq!(
        *repo.prefetch_seen.lock(),
        vec![vec!["author.country".to_string()]]
    );
    assert_eq!(*repo.include_calls.lock(), 1);
}

#[tokio::test]
async fn unavailable_repository_short_circuits() {
    let registry = registry();
    let cfg = QueryConfig::default();
    let plan = QueryParser::new(registry.clone(), cfg.clone())
        .parse("articles", Vec::<(&str, &str)>::new())
        .unwrap();
    let repo = ScriptedRepository {
        fail: Some(RepositoryError::unavailable("connection refused")),
        ..Default::default()
    };

    let errs = Executor::new(registry, &cfg)
        .execute(&plan, &repo)
        .await
        .unwrap_err();
    assert_eq!(errs.len(), 1);
    assert!(matches!(
        errs[0].kind,
        ErrorKind::RepositoryUnavailable { .. }
    ));
}
