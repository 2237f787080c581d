//! Maps dotted property paths onto attribute chains of a root entity.
//!
//! Resolution order for a path:
//! 1. exact match in the bean-property map
//! 2. exact match in the alias map
//! 3. the literal path
//!
//! The mapped (or literal) path is then split on `.` and walked segment by
//! segment starting at the root entity. `count(...)` wrappers are stripped and
//! recorded as [`AggregateFunction::Count`].

use std::collections::HashMap;
use std::fmt;

use super::errors::PropertyResolutionError;
use super::metamodel::{Attribute, AttributeKind, ManagedType, MetadataProvider, ScalarType};

const COUNT_OPEN: &str = "count(";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "count"),
        }
    }
}

/// One navigation step: the attribute `name` declared on `owner`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    pub owner: String,
    pub attribute: Attribute,
}

impl PathSegment {
    pub fn is_collection(&self) -> bool {
        self.attribute.is_collection()
    }

    pub fn is_element_collection(&self) -> bool {
        self.attribute.is_element_collection()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// Path as written in the query, before alias substitution
    pub original: String,
    /// Dotted path actually walked, including unwrapped embeddables
    pub real_path: String,
    pub segments: Vec<PathSegment>,
    pub aggregate: Option<AggregateFunction>,
}

impl ResolvedPath {
    pub fn terminal(&self) -> &PathSegment {
        // resolve() never produces an empty chain
        &self.segments[self.segments.len() - 1]
    }

    /// Segments leading up to (not including) the terminal attribute
    pub fn prefix(&self) -> &[PathSegment] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn is_collection(&self) -> bool {
        self.terminal().is_collection()
    }

    /// True when the comparison is against a collection's size rather than its values.
    ///
    /// Entity collections are always compared by size; element collections only
    /// when wrapped in `count()`.
    pub fn is_cardinality_check(&self) -> bool {
        self.aggregate.is_some()
            || matches!(self.terminal().attribute.kind, AttributeKind::OneToMany { .. })
    }

    /// Type a literal compared against this path is coerced to.
    pub fn comparison_type(&self) -> ScalarType {
        if self.is_cardinality_check() {
            return ScalarType::Long;
        }
        self.terminal()
            .attribute
            .scalar_type()
            .cloned()
            .unwrap_or(ScalarType::String)
    }

    /// Whether any step of the path crosses a to-many relationship
    pub fn crosses_collection(&self) -> bool {
        self.segments.iter().any(|s| s.is_collection())
    }
}

pub struct PropertyResolver<'a> {
    metadata: &'a dyn MetadataProvider,
    root: &'a ManagedType,
    bean_properties: Option<&'a HashMap<String, String>>,
    aliases: Option<&'a HashMap<String, String>>,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(
        metadata: &'a dyn MetadataProvider,
        root: &str,
    ) -> Result<Self, PropertyResolutionError> {
        let root = metadata
            .entity(root)
            .map_err(|_| PropertyResolutionError::UnknownRoot {
                root: root.to_string(),
            })?;
        Ok(PropertyResolver {
            metadata,
            root,
            bean_properties: None,
            aliases: None,
        })
    }

    pub fn with_bean_properties(mut self, map: &'a HashMap<String, String>) -> Self {
        self.bean_properties = Some(map);
        self
    }

    pub fn with_aliases(mut self, map: &'a HashMap<String, String>) -> Self {
        self.aliases = Some(map);
        self
    }

    pub fn root(&self) -> &ManagedType {
        self.root
    }

    /// Resolve a path that may be wrapped in `count(...)`.
    pub fn resolve(&self, path: &str) -> Result<ResolvedPath, PropertyResolutionError> {
        let trimmed = path.trim();
        match trimmed.strip_prefix(COUNT_OPEN) {
            Some(rest) => {
                let inner = rest.strip_suffix(')').ok_or_else(|| {
                    PropertyResolutionError::MalformedPath {
                        path: path.to_string(),
                    }
                })?;
                self.resolve_with(inner.trim(), Some(AggregateFunction::Count), path)
            }
            None => self.resolve_with(trimmed, None, path),
        }
    }

    /// Resolve an already unwrapped path, optionally under an aggregate.
    pub fn resolve_path(
        &self,
        path: &str,
        aggregate: Option<AggregateFunction>,
    ) -> Result<ResolvedPath, PropertyResolutionError> {
        let original = match aggregate {
            Some(function) => format!("{}({})", function, path),
            None => path.to_string(),
        };
        self.resolve_with(path, aggregate, &original)
    }

    /// Mapped real path for `name`, if a bean-property or alias entry exists.
    pub fn mapped_path(&self, name: &str) -> Option<&'a str> {
        self.bean_properties
            .and_then(|m| m.get(name))
            .or_else(|| self.aliases.and_then(|m| m.get(name)))
            .map(String::as_str)
    }

    /// Resolve a navigation path used for joins; the terminal may be any
    /// relationship or embeddable and is not unwrapped.
    pub fn resolve_join_path(&self, path: &str) -> Result<ResolvedPath, PropertyResolutionError> {
        let trimmed = path.trim();
        let segments = self.walk(trimmed, path)?;
        let terminal = &segments[segments.len() - 1].attribute;
        if !matches!(
            terminal.kind,
            AttributeKind::ManyToOne { .. }
                | AttributeKind::OneToMany { .. }
                | AttributeKind::ElementCollection { .. }
        ) {
            return Err(PropertyResolutionError::NotNavigable {
                path: path.to_string(),
                segment: terminal.name.clone(),
            });
        }
        Ok(ResolvedPath {
            original: path.to_string(),
            real_path: join_names(&segments),
            segments,
            aggregate: None,
        })
    }

    fn walk(
        &self,
        path: &str,
        original: &str,
    ) -> Result<Vec<PathSegment>, PropertyResolutionError> {
        let malformed = || PropertyResolutionError::MalformedPath {
            path: original.to_string(),
        };
        if path.is_empty() {
            return Err(malformed());
        }
        let real = self.mapped_path(path).unwrap_or(path);

        let names: Vec<&str> = real.split('.').collect();
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(malformed());
        }

        let mut segments = Vec::with_capacity(names.len());
        let mut owner = self.root;
        for (i, name) in names.iter().enumerate() {
            let attribute =
                owner
                    .attribute(name)
                    .ok_or_else(|| PropertyResolutionError::UnknownSegment {
                        path: original.to_string(),
                        segment: name.to_string(),
                        owner: owner.name.clone(),
                    })?;
            segments.push(PathSegment {
                name: name.to_string(),
                owner: owner.name.clone(),
                attribute: attribute.clone(),
            });
            if i + 1 < names.len() {
                owner = self.navigate(owner, attribute, original)?;
            }
        }
        Ok(segments)
    }

    fn resolve_with(
        &self,
        path: &str,
        aggregate: Option<AggregateFunction>,
        original: &str,
    ) -> Result<ResolvedPath, PropertyResolutionError> {
        let mut segments = self.walk(path, original)?;

        // A lone-attribute embeddable stands in for its only attribute
        loop {
            let terminal = &segments[segments.len() - 1];
            let AttributeKind::Embedded { embeddable } = &terminal.attribute.kind else {
                break;
            };
            match self.metadata.managed_type(embeddable) {
                Some(t) if t.attributes.len() == 1 => {
                    let only = t.attributes[0].clone();
                    segments.push(PathSegment {
                        name: only.name.clone(),
                        owner: t.name.clone(),
                        attribute: only,
                    });
                }
                _ => break,
            }
        }

        let terminal = &segments[segments.len() - 1].attribute;
        if aggregate.is_some() && !terminal.is_collection() {
            return Err(PropertyResolutionError::AggregateOnSingular {
                path: original.to_string(),
            });
        }
        if terminal.scalar_type().is_none() && !terminal.is_collection() {
            return Err(PropertyResolutionError::NotComparable {
                path: original.to_string(),
            });
        }

        let real_path = join_names(&segments);
        log::debug!("Resolved property `{}` to `{}`", original, real_path);

        Ok(ResolvedPath {
            original: original.to_string(),
            real_path,
            segments,
            aggregate,
        })
    }

    fn navigate(
        &self,
        owner: &ManagedType,
        attribute: &Attribute,
        original: &str,
    ) -> Result<&'a ManagedType, PropertyResolutionError> {
        attribute
            .target_type()
            .and_then(|target| self.metadata.managed_type(target))
            .ok_or_else(|| PropertyResolutionError::NotNavigable {
                path: original.to_string(),
                segment: format!("{}.{}", owner.name, attribute.name),
            })
    }
}

fn join_names(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
