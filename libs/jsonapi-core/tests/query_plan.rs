use std::sync::Arc;

use jsonapi_core::{
    Attribute, ErrorKind, FieldKind, FilterOp, PagePosition, PathPurpose, PathResolver,
    QueryConfig, QueryParser, Relationship, ResourceSchema, SchemaRegistry, SortDir,
    SourceLocator,
};

fn article_person() -> Arc<SchemaRegistry> {
    let mut builder = SchemaRegistry::builder();
    builder
        .register(
            ResourceSchema::new("Article")
                .with_attribute(Attribute::new("title", FieldKind::String).filterable())
                .with_attribute(Attribute::new("body", FieldKind::String))
                .with_relationship(Relationship::to_one("author", "Person")),
        )
        .unwrap()
        .register(
            ResourceSchema::new("Person")
                .with_attribute(Attribute::new("name", FieldKind::String).sortable())
                .with_relationship(Relationship::to_many("articles", "Article")),
        )
        .unwrap();
    Arc::new(builder.build().unwrap())
}

#[test]
fn article_example_parses_to_expected_plan() {
    let parser = QueryParser::new(article_person(), QueryConfig::default());
    let plan = parser
        .parse(
            "Article",
            [
                ("filter[title]", "eq:Foo"),
                ("sort", "-author.name"),
                ("include", "author"),
                ("page[size]", "5"),
            ],
        )
        .unwrap();

    assert_eq!(plan.resource_type(), "Article");

    let [predicate] = plan.filters() else {
        panic!("expected one predicate, got {:?}", plan.filters());
    };
    assert_eq!(predicate.path.dotted(), "title");
    assert_eq!(predicate.op, FilterOp::Eq);
    assert_eq!(predicate.values, vec!["Foo".to_string()]);

    let [key] = plan.sort() else {
        panic!("expected one sort key");
    };
    assert_eq!(key.path.dotted(), "author.name");
    assert_eq!(key.dir, SortDir::Desc);

    assert_eq!(plan.include().dotted().collect::<Vec<_>>(), vec!["author"]);
    assert_eq!(plan.page().size, 5);
    assert_eq!(plan.page().position, PagePosition::Number(1));
}

#[test]
fn body_is_not_filterable() {
    let parser = QueryParser::new(article_person(), QueryConfig::default());
    let errs = parser
        .parse("Article", [("filter[body]", "x"), ("filter[bogus.path]", "1")])
        .unwrap_err();

    assert_eq!(errs.len(), 2);
    assert!(matches!(errs[0].kind, ErrorKind::FieldNotFilterable { .. }));
    assert_eq!(
        errs[1].locator,
        SourceLocator::Parameter("filter[bogus.path]".into())
    );
}

#[test]
fn cyclic_schemas_stay_bounded() {
    let registry = article_person();
    let resolver = PathResolver::new(&registry, 3);

    let ok = resolver
        .resolve("Article", "author.articles.author", PathPurpose::Include)
        .unwrap();
    assert_eq!(ok.len(), 3);

    let err = resolver
        .resolve(
            "Article",
            "author.articles.author.articles",
            PathPurpose::Include,
        )
        .unwrap_err();
    assert!(matches!(err, ErrorKind::PathTooDeep { max_depth: 3, .. }));
}
