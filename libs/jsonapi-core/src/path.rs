//! Dotted relationship path resolution (`author.country.name`).

use std::fmt;

use crate::error::ErrorKind;
use crate::registry::SchemaRegistry;
use crate::schema::{Cardinality, FieldKind, Relationship, ResourceSchema};

/// What the resolved path will be used for; decides the rule for the final segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathPurpose {
    Filter,
    Sort,
    Include,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HopTarget {
    Relationship {
        resource_type: String,
        cardinality: Cardinality,
    },
    Attribute {
        kind: FieldKind,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hop {
    pub name: String,
    pub target: HopTarget,
}

impl Hop {
    fn relationship(rel: &Relationship) -> Self {
        Self {
            name: rel.name.clone(),
            target: HopTarget::Relationship {
                resource_type: rel.target.clone(),
                cardinality: rel.cardinality,
            },
        }
    }

    /// Target type when this hop is a relationship.
    pub fn target_type(&self) -> Option<&str> {
        match &self.target {
            HopTarget::Relationship { resource_type, .. } => Some(resource_type),
            HopTarget::Attribute { .. } => None,
        }
    }
}

/// A validated path. Every hop except the last is a relationship; never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    root: String,
    hops: Vec<Hop>,
}

impl ResolvedPath {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn terminal(&self) -> Option<&Hop> {
        self.hops.last()
    }

    /// Attribute kind of the last hop; `None` for relationship paths.
    pub fn terminal_kind(&self) -> Option<FieldKind> {
        match self.terminal()?.target {
            HopTarget::Attribute { kind } => Some(kind),
            HopTarget::Relationship { .. } => None,
        }
    }

    /// Relationship hops leading to the terminal segment.
    pub fn relationship_hops(&self) -> &[Hop] {
        match self.terminal() {
            Some(Hop {
                target: HopTarget::Attribute { .. },
                ..
            }) => &self.hops[..self.hops.len() - 1],
            _ => &self.hops,
        }
    }

    /// Resource type that declares the terminal segment.
    pub fn terminal_owner(&self) -> &str {
        let hops = match self.terminal() {
            Some(Hop {
                target: HopTarget::Attribute { .. },
                ..
            }) => self.relationship_hops(),
            _ => &self.hops[..self.hops.len().saturating_sub(1)],
        };
        hops.last()
            .and_then(Hop::target_type)
            .unwrap_or(self.root.as_str())
    }

    pub fn dotted(&self) -> String {
        self.to_string()
    }

    /// The first `len` hops as a path of their own.
    pub fn prefix(&self, len: usize) -> ResolvedPath {
        ResolvedPath {
            root: self.root.clone(),
            hops: self.hops[..len.min(self.hops.len())].to_vec(),
        }
    }

    /// Strict prefixes, shortest first.
    pub fn ancestors(&self) -> impl Iterator<Item = ResolvedPath> + '_ {
        (1..self.hops.len()).map(|len| self.prefix(len))
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hop) in self.hops.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&hop.name)?;
        }
        Ok(())
    }
}

/// Walks dotted paths against a registry. Pure; share freely.
#[derive(Clone, Copy, Debug)]
pub struct PathResolver<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
}

impl<'r> PathResolver<'r> {
    pub fn new(registry: &'r SchemaRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn resolve(
        &self,
        root: &str,
        dotted: &str,
        purpose: PathPurpose,
    ) -> Result<ResolvedPath, ErrorKind> {
        let mut schema = self.registry.lookup(root)?;
        let segments: Vec<&str> = dotted.split('.').collect();
        let last = segments.len() - 1;
        let mut hops = Vec::with_capacity(segments.len());

        for (depth, segment) in segments.iter().copied().enumerate() {
            if depth >= self.max_depth {
                return Err(ErrorKind::PathTooDeep {
                    path: dotted.to_owned(),
                    max_depth: self.max_depth,
                });
            }

            if depth < last || purpose == PathPurpose::Include {
                let rel = schema
                    .relationship(segment)
                    .ok_or_else(|| ErrorKind::InvalidRelationshipPath {
                        path: dotted.to_owned(),
                        segment: segment.to_owned(),
                        resource_type: schema.resource_type().to_owned(),
                    })?;
                if depth == last && !rel.includable {
                    return Err(ErrorKind::FieldNotIncludable {
                        path: dotted.to_owned(),
                        field: segment.to_owned(),
                        resource_type: schema.resource_type().to_owned(),
                    });
                }
                hops.push(Hop::relationship(rel));
                if depth < last {
                    schema = self.registry.lookup(&rel.target)?;
                }
                continue;
            }

            hops.push(terminal_attribute(schema, dotted, segment, purpose)?);
        }

        Ok(ResolvedPath {
            root: root.to_owned(),
            hops,
        })
    }
}

fn terminal_attribute(
    schema: &ResourceSchema,
    dotted: &str,
    segment: &str,
    purpose: PathPurpose,
) -> Result<Hop, ErrorKind> {
    let attr = schema.attribute(segment);
    let allowed = match purpose {
        PathPurpose::Filter => attr.filter(|a| a.filterable),
        PathPurpose::Sort => attr.filter(|a| a.sortable),
        PathPurpose::Include => None,
    };
    match allowed {
        Some(a) => Ok(Hop {
            name: a.name.clone(),
            target: HopTarget::Attribute { kind: a.kind },
        }),
        None => {
            let path = dotted.to_owned();
            let field = segment.to_owned();
            let resource_type = schema.resource_type().to_owned();
            Err(match purpose {
                PathPurpose::Sort => ErrorKind::FieldNotSortable {
                    path,
                    field,
                    resource_type,
                },
                _ => ErrorKind::FieldNotFilterable {
                    path,
                    field,
                    resource_type,
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::blog_registry;

    #[test]
    fn resolves_within_depth() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 3);

        let path = resolver
            .resolve("articles", "author.country.name", PathPurpose::Filter)
            .unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.dotted(), "author.country.name");
        assert_eq!(path.terminal_kind(), Some(FieldKind::String));
        assert_eq!(path.relationship_hops().len(), 2);
        assert_eq!(path.hops()[1].target_type(), Some("countries"));
    }

    #[test]
    fn include_path_ends_in_relationship() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 3);

        let path = resolver
            .resolve("articles", "author.country", PathPurpose::Include)
            .unwrap();
        assert_eq!(path.terminal_kind(), None);
        assert_eq!(path.relationship_hops().len(), 2);
        let ancestors: Vec<String> = path.ancestors().map(|p| p.dotted()).collect();
        assert_eq!(ancestors, vec!["author".to_string()]);

        let err = resolver
            .resolve("articles", "title", PathPurpose::Include)
            .unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidRelationshipPath { ref segment, .. } if segment == "title"));
    }

    #[test]
    fn terminal_owner_is_the_declaring_type() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 3);

        let owner = |dotted: &str, purpose| {
            resolver
                .resolve("articles", dotted, purpose)
                .unwrap()
                .terminal_owner()
                .to_owned()
        };
        assert_eq!(owner("title", PathPurpose::Filter), "articles");
        assert_eq!(owner("author.country.code", PathPurpose::Filter), "countries");
        assert_eq!(owner("author", PathPurpose::Include), "articles");
        assert_eq!(owner("author.country", PathPurpose::Include), "people");
    }

    #[test]
    fn zero_depth_rejects_every_path() {
        let registry = blog_registry();
        let err = PathResolver::new(&registry, 0)
            .resolve("articles", "title", PathPurpose::Filter)
            .unwrap_err();
        assert!(matches!(err, ErrorKind::PathTooDeep { max_depth: 0, .. }));
    }

    #[test]
    fn names_the_offending_segment() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 3);

        let err = resolver
            .resolve("articles", "author.planet.name", PathPurpose::Filter)
            .unwrap_err();
        assert_eq!(
            err,
            ErrorKind::InvalidRelationshipPath {
                path: "author.planet.name".into(),
                segment: "planet".into(),
                resource_type: "people".into(),
            }
        );
    }

    #[test]
    fn terminal_flags_are_checked() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 3);

        assert!(matches!(
            resolver.resolve("articles", "body", PathPurpose::Filter),
            Err(ErrorKind::FieldNotFilterable { ref field, .. }) if field == "body"
        ));
        assert!(matches!(
            resolver.resolve("people", "email", PathPurpose::Sort),
            Err(ErrorKind::FieldNotSortable { ref field, .. }) if field == "email"
        ));
        assert!(matches!(
            resolver.resolve("articles", "comments", PathPurpose::Include),
            Err(ErrorKind::FieldNotIncludable { ref field, .. }) if field == "comments"
        ));
    }

    #[test]
    fn depth_is_bounded() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 2);

        assert!(resolver
            .resolve("articles", "author.name", PathPurpose::Sort)
            .is_ok());
        assert_eq!(
            resolver
                .resolve("articles", "author.country.name", PathPurpose::Sort)
                .unwrap_err(),
            ErrorKind::PathTooDeep {
                path: "author.country.name".into(),
                max_depth: 2,
            }
        );
    }

    #[test]
    fn unknown_root() {
        let registry = blog_registry();
        let resolver = PathResolver::new(&registry, 3);
        assert!(matches!(
            resolver.resolve("robots", "name", PathPurpose::Filter),
            Err(ErrorKind::UnknownResource { .. })
        ));
    }
}
