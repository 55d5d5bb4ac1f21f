use crate::registry::SchemaRegistry;
use crate::schema::{Attribute, FieldKind, Relationship, ResourceSchema};

/// articles -> author (people) -> country (countries), plus comments and tags.
pub(crate) fn blog_registry() -> SchemaRegistry {
    let mut builder = SchemaRegistry::builder();
    builder
        .register(
            ResourceSchema::new("articles")
                .with_attribute(Attribute::new("title", FieldKind::String).filterable().sortable())
                .with_attribute(Attribute::new("body", FieldKind::String))
                .with_attribute(
                    Attribute::new("created", FieldKind::DateTime)
                        .filterable()
                        .sortable(),
                )
                .with_attribute(Attribute::new("rating", FieldKind::Integer).filterable().sortable())
                .with_attribute(Attribute::new("published", FieldKind::Boolean).filterable())
                .with_relationship(Relationship::to_one("author", "people"))
                .with_relationship(Relationship::to_many("comments", "comments").not_includable())
                .with_relationship(Relationship::to_many("tags", "tags"))
                .with_page_sizes(10, 50),
        )
        .unwrap()
        .register(
            ResourceSchema::new("people")
                .with_attribute(Attribute::new("name", FieldKind::String).filterable().sortable())
                .with_attribute(Attribute::new("email", FieldKind::String).filterable())
                .with_attribute(Attribute::new("age", FieldKind::Integer).filterable().sortable())
                .with_relationship(Relationship::to_one("country", "countries")),
        )
        .unwrap()
        .register(
            ResourceSchema::new("countries")
                .with_attribute(Attribute::new("name", FieldKind::String).filterable().sortable())
                .with_attribute(Attribute::new("code", FieldKind::String).filterable()),
        )
        .unwrap()
        .register(
            ResourceSchema::new("comments")
                .with_attribute(Attribute::new("body", FieldKind::String))
                .with_relationship(Relationship::to_one("author", "people")),
        )
        .unwrap()
        .register(
            ResourceSchema::new("tags")
                .with_attribute(Attribute::new("label", FieldKind::String).filterable().sortable())
                .with_relationship(Relationship::to_many("articles", "articles"))
                .with_default_include("articles"),
        )
        .unwrap();
    builder.build().unwrap()
}
