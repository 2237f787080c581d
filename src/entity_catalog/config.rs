use super::errors::EntityCatalogError;
use super::metamodel::{Attribute, AttributeKind, ManagedKind, ManagedType, Metamodel, ScalarType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Entity schemas are defined in YAML with the following structure:
///
/// ```yaml
/// name: library                 # Optional schema name
/// entities:
///   - name: Book                # Entity name used as query root
///     table: books              # Backing table
///     id: id                    # Id attribute (must be basic)
///     attributes:
///       - name: id
///         type: integer         # Column defaults to the attribute name
///       - name: bookTitle
///         type: string
///         column: book_title
///       - name: address
///         embedded: OwnerAddress
///       - name: library
///         many_to_one: Library
///         join_column: library_id
///       - name: reviews
///         one_to_many: BookReview
///         mapped_by: book
///       - name: authors
///         element_collection: string
///         table: book_authors
///         join_column: book_id
///         column: author
/// embeddables:
///   - name: OwnerAddress
///     attributes:
///       - name: street
///         type: string
///         column: address_street
/// ```
///
/// Each attribute declares exactly one of `type`, `embedded`, `many_to_one`,
/// `one_to_many` or `element_collection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchemaConfig {
    /// Optional schema name
    #[serde(default)]
    pub name: Option<String>,
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub embeddables: Vec<EmbeddableDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub table: String,
    /// Id attribute name
    #[serde(default = "default_id")]
    pub id: String,
    pub attributes: Vec<AttributeDefinition>,
}

fn default_id() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddableDefinition {
    pub name: String,
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    /// Scalar type for basic attributes
    #[serde(rename = "type", default)]
    pub scalar: Option<String>,
    /// Column name; defaults to the attribute name
    #[serde(default)]
    pub column: Option<String>,
    /// Constants for `enum` scalars
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub embedded: Option<String>,
    #[serde(default)]
    pub many_to_one: Option<String>,
    #[serde(default)]
    pub join_column: Option<String>,
    #[serde(default)]
    pub one_to_many: Option<String>,
    #[serde(default)]
    pub mapped_by: Option<String>,
    /// Element scalar type for element collections
    #[serde(default)]
    pub element_collection: Option<String>,
    /// Side table for element collections
    #[serde(default)]
    pub table: Option<String>,
}

impl AttributeDefinition {
    fn to_attribute(&self, owner: &str) -> Result<Attribute, EntityCatalogError> {
        let declared = [
            self.scalar.is_some(),
            self.embedded.is_some(),
            self.many_to_one.is_some(),
            self.one_to_many.is_some(),
            self.element_collection.is_some(),
        ]
        .iter()
        .filter(|d| **d)
        .count();
        if declared != 1 {
            return Err(EntityCatalogError::attribute_error(
                owner,
                &self.name,
                "exactly one of type, embedded, many_to_one, one_to_many, element_collection is required",
            ));
        }

        let column = || self.column.clone().unwrap_or_else(|| self.name.clone());
        let require = |value: &Option<String>, field: &str| {
            value.clone().ok_or_else(|| {
                let message = format!("missing `{}`", field);
                EntityCatalogError::attribute_error(owner, &self.name, message)
            })
        };

        let kind = if let Some(scalar) = &self.scalar {
            AttributeKind::Basic {
                column: column(),
                scalar: parse_scalar(scalar, &self.values)
                    .map_err(|msg| EntityCatalogError::attribute_error(owner, &self.name, msg))?,
            }
        } else if let Some(embeddable) = &self.embedded {
            AttributeKind::Embedded {
                embeddable: embeddable.clone(),
            }
        } else if let Some(target) = &self.many_to_one {
            AttributeKind::ManyToOne {
                target: target.clone(),
                join_column: self
                    .join_column
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", self.name)),
            }
        } else if let Some(target) = &self.one_to_many {
            AttributeKind::OneToMany {
                target: target.clone(),
                mapped_by: require(&self.mapped_by, "mapped_by")?,
            }
        } else {
            let element = self.element_collection.as_deref().unwrap_or_default();
            AttributeKind::ElementCollection {
                table: require(&self.table, "table")?,
                join_column: require(&self.join_column, "join_column")?,
                column: column(),
                scalar: parse_scalar(element, &self.values)
                    .map_err(|msg| EntityCatalogError::attribute_error(owner, &self.name, msg))?,
            }
        };

        Ok(Attribute {
            name: self.name.clone(),
            kind,
        })
    }
}

fn parse_scalar(name: &str, values: &[String]) -> Result<ScalarType, String> {
    let scalar = match name.to_ascii_lowercase().as_str() {
        "string" => ScalarType::String,
        "integer" | "int" => ScalarType::Integer,
        "long" => ScalarType::Long,
        "double" | "float" => ScalarType::Double,
        "boolean" | "bool" => ScalarType::Boolean,
        "date" => ScalarType::Date,
        "datetime" | "timestamp" => ScalarType::DateTime,
        "time" => ScalarType::Time,
        "enum" => {
            if values.is_empty() {
                return Err("enum type requires `values`".to_string());
            }
            ScalarType::Enum {
                values: values.to_vec(),
            }
        }
        other => return Err(format!("unknown scalar type `{}`", other)),
    };
    Ok(scalar)
}

impl EntitySchemaConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, EntityCatalogError> {
        let contents = fs::read_to_string(path).map_err(|e| EntityCatalogError::ConfigReadError {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, EntityCatalogError> {
        serde_yaml::from_str(contents).map_err(|e| EntityCatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Basic structural checks that do not need cross-type lookups
    pub fn validate(&self) -> Result<(), EntityCatalogError> {
        if self.entities.is_empty() {
            return Err(EntityCatalogError::InvalidDefinition {
                message: "schema declares no entities".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        let names = self
            .entities
            .iter()
            .map(|e| &e.name)
            .chain(self.embeddables.iter().map(|e| &e.name));
        for name in names {
            if !seen.insert(name) {
                return Err(EntityCatalogError::InvalidDefinition {
                    message: format!("type `{}` is declared more than once", name),
                });
            }
        }
        Ok(())
    }

    /// Build the metamodel, validating every cross-reference
    pub fn to_metamodel(&self) -> Result<Metamodel, EntityCatalogError> {
        self.validate()?;
        let mut model = Metamodel::new(self.name.clone());

        for entity in &self.entities {
            let attributes = entity
                .attributes
                .iter()
                .map(|a| a.to_attribute(&entity.name))
                .collect::<Result<Vec<_>, _>>()?;
            model.insert(ManagedType {
                name: entity.name.clone(),
                kind: ManagedKind::Entity,
                table: Some(entity.table.clone()),
                id_attribute: Some(entity.id.clone()),
                attributes,
            });
        }
        for embeddable in &self.embeddables {
            let attributes = embeddable
                .attributes
                .iter()
                .map(|a| a.to_attribute(&embeddable.name))
                .collect::<Result<Vec<_>, _>>()?;
            model.insert(ManagedType {
                name: embeddable.name.clone(),
                kind: ManagedKind::Embeddable,
                table: None,
                id_attribute: None,
                attributes,
            });
        }

        model.validate()?;
        log::info!(
            "Loaded entity schema {:?}: {} entities, {} embeddables",
            self.name,
            self.entities.len(),
            self.embeddables.len()
        );
        Ok(model)
    }
}
