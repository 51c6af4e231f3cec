//! Table and column configuration.
//!
//! Each entity type maps to two auxiliary tables: a definition table holding
//! `(id, item_id, type, name)` and a value table holding
//! `(attribute_id, value)`. Names default from the entity table name and are
//! overridable per entity type; a built [`TableConfig`] is immutable and
//! cached for the life of the process.

use crate::error::ConfigError;
use crate::inflect::singularize;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

// ============================================================================
// COLUMN MAPS
// ============================================================================

/// Which of the two auxiliary tables a column selector refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TablePart {
    Attribute,
    Value,
}

impl fmt::Display for TablePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TablePart::Attribute => f.write_str("attribute"),
            TablePart::Value => f.write_str("value"),
        }
    }
}

/// Column names of the definition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeColumns {
    /// Primary key column
    pub id: String,
    /// FK column referencing the entity's primary key
    pub item_id: String,
    /// Column storing the value's type tag
    pub type_tag: String,
    /// Column storing the attribute name
    pub name: String,
}

/// Column names of the value table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueColumns {
    /// FK column referencing the definition table's primary key
    pub attribute_id: String,
    /// Column storing the encoded value text
    pub value: String,
}

// ============================================================================
// TABLE CONFIG
// ============================================================================

/// Resolved physical names for one entity type's attribute storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Host-owned entity table
    pub entity_table: String,
    /// Entity primary key column
    pub primary_key: String,
    /// Definition table name
    pub attribute_table: String,
    /// Value table name
    pub value_table: String,
    pub attribute_columns: AttributeColumns,
    pub value_columns: ValueColumns,
}

impl TableConfig {
    /// Start a builder; unset fields fall back to conventions at build time.
    pub fn builder(entity_table: impl Into<String>) -> TableConfigBuilder {
        TableConfigBuilder::new(entity_table)
    }

    /// Convention-only configuration for an entity table.
    pub fn for_entity_table(entity_table: impl Into<String>) -> Self {
        TableConfigBuilder::new(entity_table).build()
    }

    /// Resolve a column selector against one of the two table partitions.
    ///
    /// Selectors outside the partition's column set are a [`ConfigError`];
    /// this is a deliberate local validation, not a storage failure.
    pub fn column(&self, part: TablePart, key: &str) -> Result<&str, ConfigError> {
        match (part, key) {
            (TablePart::Attribute, "id") => Ok(&self.attribute_columns.id),
            (TablePart::Attribute, "item_id") => Ok(&self.attribute_columns.item_id),
            (TablePart::Attribute, "type") => Ok(&self.attribute_columns.type_tag),
            (TablePart::Attribute, "name") => Ok(&self.attribute_columns.name),
            (TablePart::Value, "attribute_id") => Ok(&self.value_columns.attribute_id),
            (TablePart::Value, "value") => Ok(&self.value_columns.value),
            _ => Err(ConfigError::InvalidColumn {
                part,
                column: key.to_string(),
            }),
        }
    }
}

/// Builder for [`TableConfig`].
///
/// Every field is optional; `build` fills the gaps from the entity table
/// name. Overrides set here are final for the life of the process once the
/// config is registered.
#[derive(Debug, Clone, Default)]
pub struct TableConfigBuilder {
    entity_table: String,
    primary_key: Option<String>,
    attribute_table: Option<String>,
    value_table: Option<String>,
    id_column: Option<String>,
    item_id_column: Option<String>,
    type_column: Option<String>,
    name_column: Option<String>,
    attribute_id_column: Option<String>,
    value_column: Option<String>,
}

impl TableConfigBuilder {
    fn new(entity_table: impl Into<String>) -> Self {
        Self {
            entity_table: entity_table.into(),
            ..Default::default()
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn attribute_table(mut self, table: impl Into<String>) -> Self {
        self.attribute_table = Some(table.into());
        self
    }

    pub fn value_table(mut self, table: impl Into<String>) -> Self {
        self.value_table = Some(table.into());
        self
    }

    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn item_id_column(mut self, column: impl Into<String>) -> Self {
        self.item_id_column = Some(column.into());
        self
    }

    pub fn type_column(mut self, column: impl Into<String>) -> Self {
        self.type_column = Some(column.into());
        self
    }

    pub fn name_column(mut self, column: impl Into<String>) -> Self {
        self.name_column = Some(column.into());
        self
    }

    pub fn attribute_id_column(mut self, column: impl Into<String>) -> Self {
        self.attribute_id_column = Some(column.into());
        self
    }

    pub fn value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }

    /// Apply conventions to every unset field and freeze the configuration.
    pub fn build(self) -> TableConfig {
        let entity_table = self.entity_table;
        let attribute_table = self
            .attribute_table
            .unwrap_or_else(|| format!("{}_attributes", entity_table));
        let value_table = self
            .value_table
            .unwrap_or_else(|| format!("{}_attribute_values", entity_table));
        let item_id = self
            .item_id_column
            .unwrap_or_else(|| format!("{}_id", singularize(&entity_table)));
        let attribute_id = self
            .attribute_id_column
            .unwrap_or_else(|| format!("{}_id", singularize(&attribute_table)));

        TableConfig {
            primary_key: self.primary_key.unwrap_or_else(|| "id".to_string()),
            attribute_columns: AttributeColumns {
                id: self.id_column.unwrap_or_else(|| "id".to_string()),
                item_id,
                type_tag: self.type_column.unwrap_or_else(|| "type".to_string()),
                name: self.name_column.unwrap_or_else(|| "name".to_string()),
            },
            value_columns: ValueColumns {
                attribute_id,
                value: self.value_column.unwrap_or_else(|| "value".to_string()),
            },
            entity_table,
            attribute_table,
            value_table,
        }
    }
}

// ============================================================================
// ENTITY REGISTRY
// ============================================================================

/// Implemented by entity types that carry dynamic attributes.
///
/// The host record type names its table and may adjust the derived
/// configuration; everything else is convention.
pub trait EavEntity: 'static {
    /// Name of the host-owned entity table.
    fn entity_table() -> &'static str;

    /// Hook for overriding derived names. The default keeps conventions.
    fn configure(builder: TableConfigBuilder) -> TableConfigBuilder {
        builder
    }
}

static CONFIG_REGISTRY: Lazy<RwLock<HashMap<TypeId, &'static TableConfig>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolved configuration for an entity type, built once per process.
///
/// The first call for a type builds and leaks the config; later calls return
/// the same reference. Registration replaces the original design's
/// dynamically-named model factory with a compile-time-typed lookup.
pub fn config_for<E: EavEntity>() -> &'static TableConfig {
    let key = TypeId::of::<E>();
    if let Some(config) = CONFIG_REGISTRY.read().unwrap().get(&key) {
        return config;
    }

    let built: &'static TableConfig =
        Box::leak(Box::new(E::configure(TableConfig::builder(E::entity_table())).build()));
    *CONFIG_REGISTRY.write().unwrap().entry(key).or_insert(built)
}

// ============================================================================
// TESTS
// ============================================================================
