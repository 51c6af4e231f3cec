//! PostgreSQL implementation of the attribute store.
//!
//! Renders statements from `attrix_storage::sql` and executes them over a
//! deadpool connection pool. Each paired definition/value write runs in one
//! transaction so a failure between the two rows leaves neither behind.
//! Backend errors are wrapped, never translated, and never retried.

use crate::config::PgConfig;
use async_trait::async_trait;
use attrix_core::{
    AttributeRecord, AttrixResult, StorageError, TableConfig, TypeTag, Value,
};
use attrix_storage::{sql, AttributeStore, EavQuery, EntityHit, Statement};
use deadpool_postgres::Pool;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tracing::debug;

// ============================================================================
// PARAMETER BINDING
// ============================================================================

/// Adapter binding a [`Value`] as a SQL parameter by delegating to the
/// native encoding of the inner variant.
#[derive(Debug)]
struct PgValue<'a>(&'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut tokio_postgres::types::private::BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Boolean(b) => b.to_sql(ty, out),
            Value::Integer(i) => i.to_sql(ty, out),
            Value::Float(f) => f.to_sql(ty, out),
            Value::Text(s) => s.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

fn bind(params: &[Value]) -> Vec<PgValue<'_>> {
    params.iter().map(PgValue).collect()
}

fn as_sql_refs<'a>(bound: &'a [PgValue<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn backend_error(err: tokio_postgres::Error) -> StorageError {
    StorageError::Backend {
        reason: err.to_string(),
    }
}

fn transaction_error(err: tokio_postgres::Error) -> StorageError {
    StorageError::TransactionFailed {
        reason: err.to_string(),
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Attribute store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &PgConfig) -> AttrixResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn client(&self) -> AttrixResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            StorageError::Pool {
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn execute_paired(
        &self,
        first: &Statement,
        second: &Statement,
    ) -> AttrixResult<(u64, u64)> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(transaction_error)?;

        let first_bound = bind(&first.params);
        let first_count = tx
            .execute(&first.sql, &as_sql_refs(&first_bound))
            .await
            .map_err(backend_error)?;

        let second_bound = bind(&second.params);
        let second_count = tx
            .execute(&second.sql, &as_sql_refs(&second_bound))
            .await
            .map_err(backend_error)?;

        tx.commit().await.map_err(transaction_error)?;
        Ok((first_count, second_count))
    }
}

#[async_trait]
impl AttributeStore for PgStore {
    async fn load_attributes(
        &self,
        config: &TableConfig,
        item_id: i64,
    ) -> AttrixResult<Vec<AttributeRecord>> {
        let stmt = sql::load_attributes(config, item_id);
        debug!(table = %config.attribute_table, item_id, "loading attributes");

        let client = self.client().await?;
        let bound = bind(&stmt.params);
        let rows = client
            .query(&stmt.sql, &as_sql_refs(&bound))
            .await
            .map_err(backend_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let name: String = row.get("name");
            let tag: String = row.get("type");
            let raw: String = row.get("value");

            let tag = TypeTag::parse(&tag)?;
            let value = Value::decode(tag, &raw)?;
            records.push(AttributeRecord::loaded(id, item_id, name, value));
        }
        Ok(records)
    }

    async fn insert_attribute(
        &self,
        config: &TableConfig,
        record: &AttributeRecord,
    ) -> AttrixResult<i64> {
        debug!(table = %config.attribute_table, name = %record.name, "inserting attribute");

        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(transaction_error)?;

        let definition = sql::insert_definition(config, record);
        let bound = bind(&definition.params);
        let row = tx
            .query_one(&definition.sql, &as_sql_refs(&bound))
            .await
            .map_err(|e| StorageError::InsertFailed {
                name: record.name.clone(),
                reason: e.to_string(),
            })?;
        let id: i64 = row.get(0);

        let value = sql::insert_value(config, id, &record.value);
        let bound = bind(&value.params);
        tx.execute(&value.sql, &as_sql_refs(&bound))
            .await
            .map_err(|e| StorageError::InsertFailed {
                name: record.name.clone(),
                reason: e.to_string(),
            })?;

        tx.commit().await.map_err(transaction_error)?;
        Ok(id)
    }

    async fn update_attribute(
        &self,
        config: &TableConfig,
        id: i64,
        record: &AttributeRecord,
    ) -> AttrixResult<()> {
        debug!(table = %config.attribute_table, id, "updating attribute");

        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(transaction_error)?;

        // Row counts are checked before commit; a miss on either table rolls
        // the whole pair back.
        let definition = sql::update_definition(config, id, record);
        let bound = bind(&definition.params);
        let definition_count = tx
            .execute(&definition.sql, &as_sql_refs(&bound))
            .await
            .map_err(backend_error)?;
        if definition_count == 0 {
            return Err(StorageError::UpdateFailed {
                id,
                reason: "no definition row".to_string(),
            }
            .into());
        }

        let value = sql::update_value(config, id, &record.value);
        let bound = bind(&value.params);
        let value_count = tx
            .execute(&value.sql, &as_sql_refs(&bound))
            .await
            .map_err(backend_error)?;
        if value_count == 0 {
            return Err(StorageError::UpdateFailed {
                id,
                reason: "no value row".to_string(),
            }
            .into());
        }

        tx.commit().await.map_err(transaction_error)?;
        Ok(())
    }

    async fn delete_attributes(
        &self,
        config: &TableConfig,
        item_id: i64,
        name: Option<&str>,
    ) -> AttrixResult<u64> {
        debug!(table = %config.attribute_table, item_id, name = ?name, "deleting attributes");

        // Value rows first; the sub-select that finds them needs the
        // definition rows still present.
        let values = sql::delete_values(config, item_id, name);
        let definitions = sql::delete_definitions(config, item_id, name);
        let (_, definition_count) = self.execute_paired(&values, &definitions).await?;
        Ok(definition_count)
    }

    async fn fetch_all(&self, query: &EavQuery) -> AttrixResult<Vec<EntityHit>> {
        let stmt = query.statement();
        debug!(table = %query.config().entity_table, filters = query.filters().len(), "fetching entities");

        let client = self.client().await?;
        let bound = bind(&stmt.params);
        let rows = client
            .query(&stmt.sql, &as_sql_refs(&bound))
            .await
            .map_err(backend_error)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let item_id: i64 = row.get("item_id");
            let projection: serde_json::Value = row.get("attributes");
            hits.push(EntityHit::from_projection(item_id, &projection)?);
        }
        Ok(hits)
    }
}
