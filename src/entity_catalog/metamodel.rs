use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::errors::EntityCatalogError;

/// Scalar value types an attribute (or collection element) can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ScalarType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Date,
    DateTime,
    Time,
    /// Enumerated constants, matched exactly and then case-insensitively
    Enum { values: Vec<String> },
}

impl ScalarType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Integer | ScalarType::Long | ScalarType::Double
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ScalarType::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarType::Date | ScalarType::DateTime | ScalarType::Time
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::String => write!(f, "string"),
            ScalarType::Integer => write!(f, "integer"),
            ScalarType::Long => write!(f, "long"),
            ScalarType::Double => write!(f, "double"),
            ScalarType::Boolean => write!(f, "boolean"),
            ScalarType::Date => write!(f, "date"),
            ScalarType::DateTime => write!(f, "datetime"),
            ScalarType::Time => write!(f, "time"),
            ScalarType::Enum { values } => write!(f, "enum[{}]", values.join("|")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Scalar column on the owner's table
    Basic { column: String, scalar: ScalarType },
    /// Value object whose columns live on the owner's table
    Embedded { embeddable: String },
    /// To-one reference; `join_column` is on the owner's table and holds the target id
    ManyToOne { target: String, join_column: String },
    /// To-many reference; `mapped_by` is the target's many-to-one attribute pointing back
    OneToMany { target: String, mapped_by: String },
    /// Collection of scalars stored in a side table keyed by the owner id
    ElementCollection {
        table: String,
        join_column: String,
        column: String,
        scalar: ScalarType,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn basic(name: &str, column: &str, scalar: ScalarType) -> Self {
        Attribute {
            name: name.to_string(),
            kind: AttributeKind::Basic {
                column: column.to_string(),
                scalar,
            },
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self.kind,
            AttributeKind::OneToMany { .. } | AttributeKind::ElementCollection { .. }
        )
    }

    pub fn is_element_collection(&self) -> bool {
        matches!(self.kind, AttributeKind::ElementCollection { .. })
    }

    /// Scalar type of the attribute itself, or of its elements for element collections
    pub fn scalar_type(&self) -> Option<&ScalarType> {
        match &self.kind {
            AttributeKind::Basic { scalar, .. }
            | AttributeKind::ElementCollection { scalar, .. } => Some(scalar),
            _ => None,
        }
    }

    /// Managed type reached by navigating through this attribute
    pub fn target_type(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Embedded { embeddable } => Some(embeddable),
            AttributeKind::ManyToOne { target, .. } | AttributeKind::OneToMany { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagedKind {
    Entity,
    Embeddable,
}

/// An entity (own table) or an embeddable (columns borrowed from its owner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedType {
    pub name: String,
    pub kind: ManagedKind,
    /// Backing table; `None` for embeddables
    pub table: Option<String>,
    /// Name of the id attribute; `None` for embeddables
    pub id_attribute: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl ManagedType {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_entity(&self) -> bool {
        self.kind == ManagedKind::Entity
    }

    /// Column holding the entity id
    pub fn id_column(&self) -> Option<&str> {
        let id = self.id_attribute.as_deref()?;
        match &self.attribute(id)?.kind {
            AttributeKind::Basic { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// Entity metadata consumed by the property resolver and the criteria visitor.
pub trait MetadataProvider {
    /// Looks up an entity or embeddable by name.
    fn managed_type(&self, name: &str) -> Option<&ManagedType>;

    /// Looks up an attribute declared on `owner`.
    fn attribute(&self, owner: &str, name: &str) -> Option<&Attribute> {
        self.managed_type(owner)?.attribute(name)
    }

    /// Looks up an entity, failing for embeddables and unknown names.
    fn entity(&self, name: &str) -> Result<&ManagedType, EntityCatalogError> {
        match self.managed_type(name) {
            Some(t) if t.is_entity() => Ok(t),
            _ => Err(EntityCatalogError::UnknownType {
                type_name: name.to_string(),
            }),
        }
    }
}

/// In-memory metamodel built from an [`EntitySchemaConfig`](super::config::EntitySchemaConfig).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metamodel {
    pub name: Option<String>,
    types: HashMap<String, ManagedType>,
}

impl Metamodel {
    pub fn new(name: Option<String>) -> Self {
        Metamodel {
            name,
            types: HashMap::new(),
        }
    }

    pub fn insert(&mut self, managed_type: ManagedType) {
        self.types.insert(managed_type.name.clone(), managed_type);
    }

    pub fn entities(&self) -> impl Iterator<Item = &ManagedType> {
        self.types.values().filter(|t| t.is_entity())
    }

    /// Checks cross-type references once every type is registered.
    pub fn validate(&self) -> Result<(), EntityCatalogError> {
        for managed in self.types.values() {
            if managed.is_entity() {
                let id = managed.id_attribute.as_deref().unwrap_or_default();
                if managed.id_column().is_none() {
                    return Err(EntityCatalogError::attribute_error(
                        &managed.name,
                        id,
                        "id attribute must be a basic attribute",
                    ));
                }
            }
            for attribute in &managed.attributes {
                self.validate_attribute(managed, attribute)?;
            }
        }
        self.check_embedding_cycles()
    }

    /// Rejects embeddables that contain themselves, directly or through other embeddables.
    fn check_embedding_cycles(&self) -> Result<(), EntityCatalogError> {
        let mut done: HashSet<&str> = HashSet::new();
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        for name in names {
            let mut stack = Vec::new();
            self.visit_embeddings(name, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn visit_embeddings<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), EntityCatalogError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|n| *n == name) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(name);
            return Err(EntityCatalogError::InvalidDefinition {
                message: format!("embeddable cycle: {}", cycle.join(" -> ")),
            });
        }
        let Some(managed) = self.types.get(name) else {
            return Ok(());
        };
        stack.push(name);
        for attribute in &managed.attributes {
            if let AttributeKind::Embedded { embeddable } = &attribute.kind {
                self.visit_embeddings(embeddable, stack, done)?;
            }
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    fn validate_attribute(
        &self,
        owner: &ManagedType,
        attribute: &Attribute,
    ) -> Result<(), EntityCatalogError> {
        match &attribute.kind {
            AttributeKind::Basic { .. } => Ok(()),
            AttributeKind::Embedded { embeddable } => match self.types.get(embeddable) {
                Some(t) if !t.is_entity() => Ok(()),
                _ => Err(EntityCatalogError::attribute_error(
                    &owner.name,
                    &attribute.name,
                    format!("`{}` is not a declared embeddable", embeddable),
                )),
            },
            AttributeKind::ManyToOne { target, .. } => self
                .entity(target)
                .map(|_| ())
                .map_err(|_| {
                    EntityCatalogError::attribute_error(
                        &owner.name,
                        &attribute.name,
                        format!("`{}` is not a declared entity", target),
                    )
                }),
            AttributeKind::OneToMany { target, mapped_by } => {
                if !owner.is_entity() {
                    return Err(EntityCatalogError::attribute_error(
                        &owner.name,
                        &attribute.name,
                        "one_to_many is only supported on entities",
                    ));
                }
                let target_type = self.entity(target).map_err(|_| {
                    EntityCatalogError::attribute_error(
                        &owner.name,
                        &attribute.name,
                        format!("`{}` is not a declared entity", target),
                    )
                })?;
                match target_type.attribute(mapped_by).map(|a| &a.kind) {
                    Some(AttributeKind::ManyToOne { target: back, .. }) if back == &owner.name => {
                        Ok(())
                    }
                    _ => Err(EntityCatalogError::attribute_error(
                        &owner.name,
                        &attribute.name,
                        format!(
                            "mapped_by `{}` must be a many_to_one on `{}` targeting `{}`",
                            mapped_by, target, owner.name
                        ),
                    )),
                }
            }
            AttributeKind::ElementCollection { .. } => {
                if owner.is_entity() {
                    Ok(())
                } else {
                    Err(EntityCatalogError::attribute_error(
                        &owner.name,
                        &attribute.name,
                        "element_collection is only supported on entities",
                    ))
                }
            }
        }
    }
}

impl MetadataProvider for Metamodel {
    fn managed_type(&self, name: &str) -> Option<&ManagedType> {
        self.types.get(name)
    }
}
