//! Schema composition.
//!
//! Expands a template into a concrete column set for one account,
//! binding formula-sourced entries to resolved definitions, and handles
//! post-hoc column addition and deletion.

use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::engine::RecomputeTrigger;
use crate::errors::Result;
use crate::formulas::{
    new_entity_id, DependencyPolicy, FormulaDefinitionServiceTrait, FormulaError,
    SystemIdentifierRegistry,
};
use crate::holdings::AssetType;
use crate::utils::slugify_identifier;

use super::constraints::{master_constraints_for, merge_constraints};
use super::schema_errors::SchemaError;
use super::schema_model::{
    ColumnSource, DataType, Schema, SchemaColumn, SchemaColumnTemplate, SchemaComposeContext,
    SchemaTemplate, TemplateColumnSource,
};
use super::schema_traits::{ColumnValueRepositoryTrait, SchemaRepositoryTrait};

#[derive(Clone)]
pub struct SchemaComposer {
    schemas: Arc<dyn SchemaRepositoryTrait>,
    values: Arc<dyn ColumnValueRepositoryTrait>,
    definitions: Arc<dyn FormulaDefinitionServiceTrait>,
    registry: Arc<SystemIdentifierRegistry>,
}

impl SchemaComposer {
    pub fn new(
        schemas: Arc<dyn SchemaRepositoryTrait>,
        values: Arc<dyn ColumnValueRepositoryTrait>,
        definitions: Arc<dyn FormulaDefinitionServiceTrait>,
        registry: Arc<SystemIdentifierRegistry>,
    ) -> Self {
        Self {
            schemas,
            values,
            definitions,
            registry,
        }
    }

    /// Instantiates one schema column per template entry for the given
    /// context.
    ///
    /// Formula entries resolve through the definition resolver here, at
    /// composition time, binding the column to a concrete formula
    /// rather than a bare identifier. Under the strict dependency
    /// policy a formula dependency with no column in the composed
    /// schema fails composition; under auto-expand it is synthesized as
    /// an editable custom decimal column.
    pub fn compose(
        &self,
        template: &SchemaTemplate,
        context: &SchemaComposeContext,
    ) -> Result<Schema> {
        let schema_id = new_entity_id();
        let mut columns: Vec<SchemaColumn> = Vec::new();
        let mut identifiers: BTreeSet<String> = BTreeSet::new();

        for entry in &template.columns {
            if !identifiers.insert(entry.identifier.clone()) {
                return Err(SchemaError::DuplicateColumn(entry.identifier.clone()).into());
            }
            let column = self.instantiate(
                &schema_id,
                entry,
                template.asset_type,
                context.owner.as_deref(),
                columns.len() as u32 + 1,
            )?;
            columns.push(column);
        }

        // Second pass: check formula dependencies against the composed
        // column set and apply the definition's dependency policy.
        let mut synthesized: Vec<SchemaColumn> = Vec::new();
        for column in &columns {
            let ColumnSource::Formula { definition_id } = &column.source else {
                continue;
            };
            let definition = self.definitions.get_definition(definition_id)?;
            let formula = self.definitions.formula_for(&definition)?;

            let mut missing: Vec<String> = Vec::new();
            for dependency in &formula.dependencies {
                if self.registry.is_implicit(dependency) {
                    continue;
                }
                let present = identifiers.contains(dependency)
                    || synthesized.iter().any(|c| &c.identifier == dependency);
                if !present {
                    missing.push(dependency.clone());
                }
            }

            if missing.is_empty() {
                continue;
            }

            match definition.dependency_policy {
                DependencyPolicy::Strict => {
                    return Err(FormulaError::MissingDependency {
                        formula: formula.identifier.clone(),
                        identifiers: missing,
                    }
                    .into());
                }
                DependencyPolicy::AutoExpand => {
                    for identifier in missing {
                        debug!(
                            "synthesizing column '{}' for formula '{}'",
                            identifier, formula.identifier
                        );
                        let order = (columns.len() + synthesized.len()) as u32 + 1;
                        synthesized.push(SchemaColumn {
                            id: new_entity_id(),
                            schema_id: schema_id.clone(),
                            title: titleize(&identifier),
                            identifier,
                            data_type: DataType::Decimal,
                            source: ColumnSource::Custom,
                            constraints: master_constraints_for(DataType::Decimal),
                            is_editable: true,
                            is_deletable: true,
                            is_system: false,
                            display_order: order,
                        });
                    }
                }
            }
        }
        columns.extend(synthesized);

        let schema = Schema {
            id: schema_id,
            account_id: context.account_id.clone(),
            asset_type: template.asset_type,
            owner: context.owner.clone(),
            columns,
        };

        self.schemas.insert_schema(schema)
    }

    fn instantiate(
        &self,
        schema_id: &str,
        entry: &SchemaColumnTemplate,
        asset_type: AssetType,
        owner: Option<&str>,
        display_order: u32,
    ) -> Result<SchemaColumn> {
        let (source, is_editable) = match &entry.source {
            TemplateColumnSource::Holding { field } => (
                ColumnSource::Holding {
                    field: field.clone(),
                },
                entry.is_editable,
            ),
            TemplateColumnSource::Asset { field } => (
                ColumnSource::Asset {
                    field: field.clone(),
                },
                entry.is_editable,
            ),
            TemplateColumnSource::Formula => {
                let definition =
                    self.definitions
                        .resolve(&entry.identifier, asset_type, owner)?;
                // Computed cells are never directly editable; only the
                // override mechanism may substitute a value.
                (
                    ColumnSource::Formula {
                        definition_id: definition.id,
                    },
                    false,
                )
            }
            TemplateColumnSource::Custom => (ColumnSource::Custom, entry.is_editable),
        };

        Ok(SchemaColumn {
            id: new_entity_id(),
            schema_id: schema_id.to_string(),
            title: entry.title.clone(),
            identifier: entry.identifier.clone(),
            data_type: entry.data_type,
            source,
            constraints: merge_constraints(entry.data_type, &entry.constraints),
            is_editable,
            is_deletable: entry.is_deletable,
            is_system: entry.is_system,
            display_order,
        })
    }

    /// Adds a user-defined custom column to an existing schema.
    ///
    /// The identifier is generated from the title; duplicates within
    /// the schema are rejected. Registers the structural change with
    /// the orchestrator so dependent column values get created.
    pub fn add_custom_column(
        &self,
        schema_id: &str,
        title: &str,
        data_type: DataType,
        trigger: &dyn RecomputeTrigger,
    ) -> Result<SchemaColumn> {
        let schema = self
            .schemas
            .get_schema(schema_id)?
            .ok_or_else(|| SchemaError::SchemaNotFound(schema_id.to_string()))?;

        let identifier = slugify_identifier(title);
        if schema.column_by_identifier(&identifier).is_some() {
            return Err(SchemaError::DuplicateColumn(identifier).into());
        }

        let max_order = schema
            .columns
            .iter()
            .map(|c| c.display_order)
            .max()
            .unwrap_or(0);

        let column = SchemaColumn {
            id: new_entity_id(),
            schema_id: schema_id.to_string(),
            title: title.to_string(),
            identifier,
            data_type,
            source: ColumnSource::Custom,
            constraints: master_constraints_for(data_type),
            is_editable: true,
            is_deletable: true,
            is_system: false,
            display_order: max_order + 1,
        };

        let column = self.schemas.add_column(schema_id, column)?;
        trigger.schema_changed(schema_id)?;
        Ok(column)
    }

    /// Removes a column and its stored values.
    pub fn delete_column(
        &self,
        schema_id: &str,
        column_id: &str,
        trigger: &dyn RecomputeTrigger,
    ) -> Result<()> {
        let column = self
            .schemas
            .get_column(column_id)?
            .ok_or_else(|| SchemaError::ColumnNotFound(column_id.to_string()))?;

        if !column.is_deletable {
            return Err(SchemaError::NotDeletable(column.identifier).into());
        }

        self.schemas.remove_column(schema_id, column_id)?;
        self.values.delete_for_column(column_id)?;
        trigger.schema_changed(schema_id)?;
        Ok(())
    }
}

fn titleize(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
