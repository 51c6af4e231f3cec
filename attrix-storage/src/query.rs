//! Attribute-filtered entity queries.
//!
//! An [`EavQuery`] collects `where_attr` filters (AND semantics) and renders
//! the batch-fetch statement; an [`EntityHit`] is one result row decoded
//! back into an entity id plus a loaded attribute bag.

use crate::bag::AttributeBag;
use crate::sql::{self, Statement};
use crate::AttributeStore;
use attrix_core::{
    config_for, AttributeFilter, AttributeRecord, AttrixResult, DecodeError, EavEntity,
    FilterOperator, TableConfig, TypeTag, Value,
};

/// Composable attribute query against one entity type.
#[derive(Debug, Clone)]
pub struct EavQuery {
    config: TableConfig,
    filters: Vec<AttributeFilter>,
    item_id: Option<i64>,
}

impl EavQuery {
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
            item_id: None,
        }
    }

    /// Query the registered configuration of an entity type.
    pub fn for_entity<E: EavEntity>() -> Self {
        Self::new(config_for::<E>().clone())
    }

    /// Add an attribute comparison. Filters on distinct names intersect.
    pub fn where_attr(
        mut self,
        name: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(AttributeFilter::new(name, operator, value));
        self
    }

    /// Pin the query to a single entity row.
    pub fn with_item(mut self, item_id: i64) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn filters(&self) -> &[AttributeFilter] {
        &self.filters
    }

    pub fn item_id(&self) -> Option<i64> {
        self.item_id
    }

    /// Render the batch-fetch statement for this query.
    pub fn statement(&self) -> Statement {
        sql::select_with_attributes(&self.config, &self.filters, self.item_id)
    }

    /// Run the query, returning every matching entity with its attributes.
    pub async fn fetch_all<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
    ) -> AttrixResult<Vec<EntityHit>> {
        store.fetch_all(self).await
    }

    /// Run the query, returning the first matching entity.
    pub async fn fetch_one<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
    ) -> AttrixResult<Option<EntityHit>> {
        Ok(store.fetch_all(self).await?.into_iter().next())
    }
}

/// One batch-fetch result: an entity id and its attributes, already loaded.
#[derive(Debug, Clone)]
pub struct EntityHit {
    pub item_id: i64,
    pub attributes: AttributeBag,
}

impl EntityHit {
    /// Decode the aggregated JSON projection for one entity row.
    ///
    /// The projection is an array of `{id, name, type, value}` objects. A
    /// JSON-null value (a definition row with no paired value row) decodes
    /// as [`Value::Null`].
    pub fn from_projection(item_id: i64, projection: &serde_json::Value) -> AttrixResult<Self> {
        let rows = projection
            .as_array()
            .ok_or_else(|| DecodeError::MalformedProjection {
                reason: "expected a JSON array of attribute objects".to_string(),
            })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(decode_projection_row(item_id, row)?);
        }

        Ok(Self {
            item_id,
            attributes: AttributeBag::from_records(records),
        })
    }
}

fn decode_projection_row(
    item_id: i64,
    row: &serde_json::Value,
) -> AttrixResult<AttributeRecord> {
    let object = row
        .as_object()
        .ok_or_else(|| DecodeError::MalformedProjection {
            reason: "attribute entry is not an object".to_string(),
        })?;

    let id = object
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| DecodeError::MalformedProjection {
            reason: "missing or non-integer 'id'".to_string(),
        })?;
    let name = object
        .get("name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| DecodeError::MalformedProjection {
            reason: "missing 'name'".to_string(),
        })?;
    let tag = object
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| DecodeError::MalformedProjection {
            reason: "missing 'type'".to_string(),
        })?;
    let tag = TypeTag::parse(tag)?;

    let value = match object.get("value") {
        None | Some(serde_json::Value::Null) => Value::Null,
        Some(serde_json::Value::String(raw)) => Value::decode(tag, raw)?,
        Some(other) => {
            return Err(DecodeError::MalformedProjection {
                reason: format!("'value' must be text, got {}", other),
            }
            .into())
        }
    };

    Ok(AttributeRecord::loaded(id, item_id, name, value))
}

// ============================================================================
// TESTS
// ============================================================================
