//! Query-building session for one root entity.
//!
//! Joins are memoized per navigation path (`reviews`, `reviews.authors`, ...)
//! for the lifetime of the builder, so two conditions reaching the same
//! nested collection share one join instead of multiplying rows.

use std::collections::HashMap;

use super::errors::CriteriaBuildError;
use super::{ColumnRef, Expression, Join, JoinItems, Root, SelectItem};
use crate::entity_catalog::{
    AttributeKind, EntityCatalogError, ManagedType, MetadataProvider, PathSegment,
    PropertyResolutionError, ResolvedPath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Create any join the path needs
    Create,
    /// Reuse existing joins; a missing to-many join is an error
    Existing,
}

/// Alias and entity a path prefix is bound to.
struct Binding<'m> {
    alias: String,
    entity: &'m ManagedType,
}

pub struct CriteriaBuilder<'m> {
    metadata: &'m dyn MetadataProvider,
    root_type: &'m ManagedType,
    root: Root,
    joins: Vec<Join>,
    join_cache: HashMap<String, usize>,
}

impl<'m> CriteriaBuilder<'m> {
    pub fn new(
        metadata: &'m dyn MetadataProvider,
        entity: &str,
    ) -> Result<Self, CriteriaBuildError> {
        let root_type = metadata.entity(entity)?;
        let root = Root {
            entity: root_type.name.clone(),
            table: table_of(root_type)?,
            alias: root_alias(&root_type.name),
            id_column: id_column_of(root_type)?,
        };
        Ok(CriteriaBuilder {
            metadata,
            root_type,
            root,
            joins: Vec::new(),
            join_cache: HashMap::new(),
        })
    }

    pub fn metadata(&self) -> &'m dyn MetadataProvider {
        self.metadata
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn root_type(&self) -> &'m ManagedType {
        self.root_type
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn join_items(&self) -> JoinItems {
        JoinItems(self.joins.clone())
    }

    pub fn has_collection_joins(&self) -> bool {
        self.joins.iter().any(|j| j.collection)
    }

    /// Expression for the terminal attribute of `path`.
    ///
    /// Cardinality paths yield a collection size; element collections compared
    /// by value are joined and yield the element column.
    pub fn attribute_expression(
        &mut self,
        path: &ResolvedPath,
        policy: JoinPolicy,
    ) -> Result<Expression, CriteriaBuildError> {
        if path.is_cardinality_check() {
            return self.collection_size(path, policy);
        }
        let binding = self.bind(path, path.segments.len() - 1, policy)?;
        let terminal = path.terminal();
        match &terminal.attribute.kind {
            AttributeKind::Basic { column, .. }
            | AttributeKind::ManyToOne {
                join_column: column,
                ..
            } => Ok(Expression::Column(ColumnRef::new(&binding.alias, column))),
            AttributeKind::ElementCollection {
                table,
                join_column,
                column,
                ..
            } => {
                let alias = self.ensure_join(
                    &path.real_path,
                    &terminal.name,
                    table,
                    ColumnRef::new(&binding.alias, &id_column_of(binding.entity)?),
                    join_column,
                    true,
                    policy,
                )?;
                Ok(Expression::Column(ColumnRef::new(&alias, column)))
            }
            AttributeKind::OneToMany { .. } | AttributeKind::Embedded { .. } => {
                Err(PropertyResolutionError::NotComparable {
                    path: path.original.clone(),
                }
                .into())
            }
        }
    }

    /// Size of the collection `path` ends in, counted per row of its owner.
    pub fn collection_size(
        &mut self,
        path: &ResolvedPath,
        policy: JoinPolicy,
    ) -> Result<Expression, CriteriaBuildError> {
        let binding = self.bind(path, path.segments.len() - 1, policy)?;
        let owner = ColumnRef::new(&binding.alias, &id_column_of(binding.entity)?);
        match &path.terminal().attribute.kind {
            AttributeKind::OneToMany { target, mapped_by } => {
                let target_type = self.metadata.entity(target)?;
                Ok(Expression::CollectionSize {
                    table: table_of(target_type)?,
                    foreign_key: back_reference_column(target_type, mapped_by)?,
                    owner,
                })
            }
            AttributeKind::ElementCollection {
                table, join_column, ..
            } => Ok(Expression::CollectionSize {
                table: table.clone(),
                foreign_key: join_column.clone(),
                owner,
            }),
            _ => Err(PropertyResolutionError::AggregateOnSingular {
                path: path.original.clone(),
            }
            .into()),
        }
    }

    /// Joins every relationship along `path`, including its terminal.
    pub fn join_path(&mut self, path: &ResolvedPath) -> Result<(), CriteriaBuildError> {
        let binding = self.bind(path, path.segments.len() - 1, JoinPolicy::Create)?;
        let terminal = path.terminal();
        let key = &path.real_path;
        match &terminal.attribute.kind {
            AttributeKind::ElementCollection {
                table, join_column, ..
            } => {
                let source = ColumnRef::new(&binding.alias, &id_column_of(binding.entity)?);
                self.ensure_join(
                    key,
                    &terminal.name,
                    table,
                    source,
                    join_column,
                    true,
                    JoinPolicy::Create,
                )?;
            }
            _ => {
                self.bind_segment(&binding, terminal, key, JoinPolicy::Create)?;
            }
        }
        Ok(())
    }

    /// Basic, embedded and to-one columns of the root entity, named by attribute path.
    pub fn entity_items(&self) -> Vec<SelectItem> {
        let mut items = Vec::new();
        self.collect_items(self.root_type, "", &mut items);
        items
    }

    fn collect_items(&self, managed: &ManagedType, prefix: &str, items: &mut Vec<SelectItem>) {
        for attribute in &managed.attributes {
            let name = if prefix.is_empty() {
                attribute.name.clone()
            } else {
                format!("{}.{}", prefix, attribute.name)
            };
            match &attribute.kind {
                AttributeKind::Basic { column, .. } => items.push(SelectItem {
                    name,
                    expression: Expression::Column(ColumnRef::new(&self.root.alias, column)),
                }),
                AttributeKind::Embedded { embeddable } => {
                    if let Some(embedded) = self.metadata.managed_type(embeddable) {
                        self.collect_items(embedded, &name, items);
                    }
                }
                AttributeKind::ManyToOne {
                    target,
                    join_column,
                } => {
                    let id = self
                        .metadata
                        .managed_type(target)
                        .and_then(|t| t.id_attribute.clone())
                        .unwrap_or_else(|| "id".to_string());
                    items.push(SelectItem {
                        name: format!("{}.{}", name, id),
                        expression: Expression::Column(ColumnRef::new(
                            &self.root.alias,
                            join_column,
                        )),
                    });
                }
                AttributeKind::OneToMany { .. } | AttributeKind::ElementCollection { .. } => {}
            }
        }
    }

    /// Binds the first `upto` segments of `path`, joining relationships on the way.
    fn bind(
        &mut self,
        path: &ResolvedPath,
        upto: usize,
        policy: JoinPolicy,
    ) -> Result<Binding<'m>, CriteriaBuildError> {
        let mut binding = Binding {
            alias: self.root.alias.clone(),
            entity: self.root_type,
        };
        let mut key = String::new();
        for segment in &path.segments[..upto] {
            if !key.is_empty() {
                key.push('.');
            }
            key.push_str(&segment.name);
            binding = match self.bind_segment(&binding, segment, &key, policy)? {
                Some(next) => next,
                None => {
                    return Err(PropertyResolutionError::NotNavigable {
                        path: path.original.clone(),
                        segment: segment.name.clone(),
                    }
                    .into())
                }
            };
        }
        Ok(binding)
    }

    fn bind_segment(
        &mut self,
        binding: &Binding<'m>,
        segment: &PathSegment,
        key: &str,
        policy: JoinPolicy,
    ) -> Result<Option<Binding<'m>>, CriteriaBuildError> {
        match &segment.attribute.kind {
            // Embeddable columns live on the owner's table
            AttributeKind::Embedded { .. } => Ok(Some(Binding {
                alias: binding.alias.clone(),
                entity: binding.entity,
            })),
            AttributeKind::ManyToOne {
                target,
                join_column,
            } => {
                let target_type = self.metadata.entity(target)?;
                let alias = self.ensure_join(
                    key,
                    &segment.name,
                    &table_of(target_type)?,
                    ColumnRef::new(&binding.alias, join_column),
                    &id_column_of(target_type)?,
                    false,
                    policy,
                )?;
                Ok(Some(Binding {
                    alias,
                    entity: target_type,
                }))
            }
            AttributeKind::OneToMany { target, mapped_by } => {
                let target_type = self.metadata.entity(target)?;
                let alias = self.ensure_join(
                    key,
                    &segment.name,
                    &table_of(target_type)?,
                    ColumnRef::new(&binding.alias, &id_column_of(binding.entity)?),
                    &back_reference_column(target_type, mapped_by)?,
                    true,
                    policy,
                )?;
                Ok(Some(Binding {
                    alias,
                    entity: target_type,
                }))
            }
            AttributeKind::Basic { .. } | AttributeKind::ElementCollection { .. } => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn ensure_join(
        &mut self,
        key: &str,
        attribute: &str,
        table: &str,
        source: ColumnRef,
        target_column: &str,
        collection: bool,
        policy: JoinPolicy,
    ) -> Result<String, CriteriaBuildError> {
        if let Some(&idx) = self.join_cache.get(key) {
            return Ok(self.joins[idx].table_alias.clone());
        }
        if collection && policy == JoinPolicy::Existing {
            return Err(CriteriaBuildError::UndeclaredJoin {
                path: key.to_string(),
            });
        }

        let alias = format!("{}{}", initial(attribute), self.joins.len() + 1);
        log::debug!("Joining `{}` as {} AS {}", key, table, alias);
        self.joins.push(Join {
            path: key.to_string(),
            table_name: table.to_string(),
            table_alias: alias.clone(),
            source,
            target_column: target_column.to_string(),
            collection,
        });
        self.join_cache.insert(key.to_string(), self.joins.len() - 1);
        Ok(alias)
    }
}

fn initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_else(|| "j".to_string())
}

fn root_alias(entity: &str) -> String {
    initial(entity)
}

fn table_of(entity: &ManagedType) -> Result<String, CriteriaBuildError> {
    entity.table.clone().ok_or_else(|| {
        EntityCatalogError::InvalidDefinition {
            message: format!("entity `{}` has no table", entity.name),
        }
        .into()
    })
}

fn id_column_of(entity: &ManagedType) -> Result<String, CriteriaBuildError> {
    entity.id_column().map(str::to_string).ok_or_else(|| {
        EntityCatalogError::InvalidDefinition {
            message: format!("entity `{}` has no id column", entity.name),
        }
        .into()
    })
}

/// Join column of the many-to-one `mapped_by` attribute on the collection's target.
fn back_reference_column(
    target: &ManagedType,
    mapped_by: &str,
) -> Result<String, CriteriaBuildError> {
    match target.attribute(mapped_by).map(|a| &a.kind) {
        Some(AttributeKind::ManyToOne { join_column, .. }) => Ok(join_column.clone()),
        _ => Err(EntityCatalogError::attribute_error(
            &target.name,
            mapped_by,
            "mapped_by must name a many_to_one attribute",
        )
        .into()),
    }
}
