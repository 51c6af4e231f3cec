//! ATTRIX Storage - Storage Trait and Mock Implementation
//!
//! Defines the storage abstraction for dynamic entity attributes: the
//! [`AttributeStore`] trait is the seam to the relational engine, [`sql`]
//! builds every statement a real backend executes, and [`MockStore`] is an
//! in-memory implementation with operation counters for tests. The actual
//! PostgreSQL backend lives in `attrix-pg`.

pub mod bag;
pub mod mapper;
pub mod query;
pub mod sql;

pub use bag::AttributeBag;
pub use mapper::EavMapper;
pub use query::{EavQuery, EntityHit};
pub use sql::Statement;

use async_trait::async_trait;
use attrix_core::{
    AttributeFilter, AttributeRecord, AttrixResult, FilterOperator, StorageError, TableConfig,
    TypeTag, Value,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage seam for dynamic attributes.
///
/// Implementations provide the relational engine side of the layer: the
/// lazy-load join, the paired definition/value writes, deletion and the
/// composed filter query. Paired writes MUST be atomic - a failure between
/// the definition row and the value row may not leave either orphaned.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Load every attribute of an entity, in definition-id order.
    async fn load_attributes(
        &self,
        config: &TableConfig,
        item_id: i64,
    ) -> AttrixResult<Vec<AttributeRecord>>;

    /// Insert the definition and value rows for a never-persisted record.
    /// Returns the generated definition id.
    async fn insert_attribute(
        &self,
        config: &TableConfig,
        record: &AttributeRecord,
    ) -> AttrixResult<i64>;

    /// Update the definition row (every column except the id) and its
    /// paired value row.
    async fn update_attribute(
        &self,
        config: &TableConfig,
        id: i64,
        record: &AttributeRecord,
    ) -> AttrixResult<()>;

    /// Delete one named attribute of an entity, or all of them. Value rows
    /// are removed with their definitions. Returns the number of deleted
    /// definition rows.
    async fn delete_attributes(
        &self,
        config: &TableConfig,
        item_id: i64,
        name: Option<&str>,
    ) -> AttrixResult<u64>;

    /// Run a composed query, returning every matching entity with a loaded
    /// attribute bag.
    async fn fetch_all(&self, query: &EavQuery) -> AttrixResult<Vec<EntityHit>>;
}

// ============================================================================
// MOCK STORE
// ============================================================================

#[derive(Debug, Clone)]
struct DefinitionRow {
    id: i64,
    item_id: i64,
    type_tag: String,
    name: String,
}

#[derive(Debug, Clone)]
struct ValueRow {
    attribute_id: i64,
    value: String,
}

#[derive(Debug, Default)]
struct MockTables {
    entities: BTreeSet<i64>,
    definitions: Vec<DefinitionRow>,
    values: Vec<ValueRow>,
    next_id: i64,
}

/// In-memory store for testing.
///
/// Models one entity type's pair of auxiliary tables plus the entity rows
/// themselves, storing tags and values as text exactly like the database
/// would. Counts every operation so tests can assert statement traffic, not
/// just end state.
#[derive(Debug, Default)]
pub struct MockStore {
    tables: RwLock<MockTables>,
    load_queries: AtomicU64,
    definition_inserts: AtomicU64,
    value_inserts: AtomicU64,
    definition_updates: AtomicU64,
    value_updates: AtomicU64,
    deletes: AtomicU64,
}

impl MockStore {
    /// Create a new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity row (the host table is out of scope for the real
    /// backends, but the mock stands in for the whole engine).
    pub fn entity_insert(&self, item_id: i64) {
        self.tables.write().unwrap().entities.insert(item_id);
    }

    /// Seed an attribute directly, bypassing counters. `type_tag` and
    /// `value` are raw storage text, so tests can plant corrupt rows.
    pub fn seed_attribute(&self, item_id: i64, name: &str, type_tag: &str, value: &str) -> i64 {
        let mut tables = self.tables.write().unwrap();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.definitions.push(DefinitionRow {
            id,
            item_id,
            type_tag: type_tag.to_string(),
            name: name.to_string(),
        });
        tables.values.push(ValueRow {
            attribute_id: id,
            value: value.to_string(),
        });
        id
    }

    /// Clear all stored data and counters.
    pub fn clear(&self) {
        *self.tables.write().unwrap() = MockTables::default();
        self.load_queries.store(0, Ordering::SeqCst);
        self.definition_inserts.store(0, Ordering::SeqCst);
        self.value_inserts.store(0, Ordering::SeqCst);
        self.definition_updates.store(0, Ordering::SeqCst);
        self.value_updates.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    pub fn load_query_count(&self) -> u64 {
        self.load_queries.load(Ordering::SeqCst)
    }

    pub fn definition_insert_count(&self) -> u64 {
        self.definition_inserts.load(Ordering::SeqCst)
    }

    pub fn value_insert_count(&self) -> u64 {
        self.value_inserts.load(Ordering::SeqCst)
    }

    pub fn definition_update_count(&self) -> u64 {
        self.definition_updates.load(Ordering::SeqCst)
    }

    pub fn value_update_count(&self) -> u64 {
        self.value_updates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of definition rows currently stored.
    pub fn definition_count(&self) -> usize {
        self.tables.read().unwrap().definitions.len()
    }

    /// Number of value rows currently stored.
    pub fn value_count(&self) -> usize {
        self.tables.read().unwrap().values.len()
    }

    fn decode_rows(tables: &MockTables, item_id: i64) -> AttrixResult<Vec<AttributeRecord>> {
        let mut definitions: Vec<&DefinitionRow> = tables
            .definitions
            .iter()
            .filter(|d| d.item_id == item_id)
            .collect();
        definitions.sort_by_key(|d| d.id);

        let mut records = Vec::with_capacity(definitions.len());
        for definition in definitions {
            // Inner-join semantics: definitions without a value row are
            // invisible to the load path.
            let Some(value_row) = tables
                .values
                .iter()
                .find(|v| v.attribute_id == definition.id)
            else {
                continue;
            };
            let tag = TypeTag::parse(&definition.type_tag)?;
            let value = Value::decode(tag, &value_row.value)?;
            records.push(AttributeRecord::loaded(
                definition.id,
                definition.item_id,
                definition.name.clone(),
                value,
            ));
        }
        Ok(records)
    }

    fn matching_items(tables: &MockTables, filter: &AttributeFilter) -> BTreeSet<i64> {
        let mut matched = BTreeSet::new();
        for definition in tables
            .definitions
            .iter()
            .filter(|d| d.name == filter.name)
        {
            let Some(value_row) = tables
                .values
                .iter()
                .find(|v| v.attribute_id == definition.id)
            else {
                continue;
            };
            if filter_matches(filter, &value_row.value) {
                matched.insert(definition.item_id);
            }
        }
        matched
    }
}

#[async_trait]
impl AttributeStore for MockStore {
    async fn load_attributes(
        &self,
        _config: &TableConfig,
        item_id: i64,
    ) -> AttrixResult<Vec<AttributeRecord>> {
        self.load_queries.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().unwrap();
        Self::decode_rows(&tables, item_id)
    }

    async fn insert_attribute(
        &self,
        _config: &TableConfig,
        record: &AttributeRecord,
    ) -> AttrixResult<i64> {
        let mut tables = self.tables.write().unwrap();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.definitions.push(DefinitionRow {
            id,
            item_id: record.item_id,
            type_tag: record.type_tag().as_str().to_string(),
            name: record.name.clone(),
        });
        tables.values.push(ValueRow {
            attribute_id: id,
            value: record.value.to_storage_text(),
        });
        self.definition_inserts.fetch_add(1, Ordering::SeqCst);
        self.value_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update_attribute(
        &self,
        _config: &TableConfig,
        id: i64,
        record: &AttributeRecord,
    ) -> AttrixResult<()> {
        let mut tables = self.tables.write().unwrap();

        let definition = tables
            .definitions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StorageError::UpdateFailed {
                id,
                reason: "no definition row".to_string(),
            })?;
        definition.item_id = record.item_id;
        definition.type_tag = record.type_tag().as_str().to_string();
        definition.name = record.name.clone();

        let value_row = tables
            .values
            .iter_mut()
            .find(|v| v.attribute_id == id)
            .ok_or_else(|| StorageError::UpdateFailed {
                id,
                reason: "no value row".to_string(),
            })?;
        value_row.value = record.value.to_storage_text();

        self.definition_updates.fetch_add(1, Ordering::SeqCst);
        self.value_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_attributes(
        &self,
        _config: &TableConfig,
        item_id: i64,
        name: Option<&str>,
    ) -> AttrixResult<u64> {
        let mut tables = self.tables.write().unwrap();
        let doomed: BTreeSet<i64> = tables
            .definitions
            .iter()
            .filter(|d| d.item_id == item_id && name.map_or(true, |n| d.name == n))
            .map(|d| d.id)
            .collect();
        tables.values.retain(|v| !doomed.contains(&v.attribute_id));
        tables.definitions.retain(|d| !doomed.contains(&d.id));
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(doomed.len() as u64)
    }

    async fn fetch_all(&self, query: &EavQuery) -> AttrixResult<Vec<EntityHit>> {
        let tables = self.tables.read().unwrap();

        let mut candidates: BTreeSet<i64> = match query.item_id() {
            Some(pin) => tables
                .entities
                .contains(&pin)
                .then_some(pin)
                .into_iter()
                .collect(),
            None => tables.entities.iter().copied().collect(),
        };

        for filter in query.filters() {
            let matched = Self::matching_items(&tables, filter);
            candidates = candidates.intersection(&matched).copied().collect();
        }

        let mut hits = Vec::with_capacity(candidates.len());
        for item_id in candidates {
            let records = Self::decode_rows(&tables, item_id)?;
            hits.push(EntityHit {
                item_id,
                attributes: AttributeBag::from_records(records),
            });
        }
        Ok(hits)
    }
}

/// Evaluate one filter against stored value text, mirroring the SQL the real
/// backends run: numeric comparands compare under a numeric cast, everything
/// else as text.
fn filter_matches(filter: &AttributeFilter, stored: &str) -> bool {
    use FilterOperator::*;

    if filter.is_numeric() {
        let Ok(lhs) = stored.parse::<f64>() else {
            return false;
        };
        let Some(rhs) = filter.value.as_f64() else {
            return false;
        };
        match filter.operator {
            Eq => lhs == rhs,
            Ne => lhs != rhs,
            Gt => lhs > rhs,
            Lt => lhs < rhs,
            Gte => lhs >= rhs,
            Lte => lhs <= rhs,
            Like => false,
        }
    } else {
        let rhs = filter.value.to_storage_text();
        match filter.operator {
            Eq => stored == rhs,
            Ne => stored != rhs,
            Gt => stored > rhs.as_str(),
            Lt => stored < rhs.as_str(),
            Gte => stored >= rhs.as_str(),
            Lte => stored <= rhs.as_str(),
            Like => like_matches(stored, &rhs),
        }
    }
}

/// `%`-wildcard LIKE matching.
fn like_matches(text: &str, pattern: &str) -> bool {
    if !pattern.contains('%') {
        return text == pattern;
    }
    let segments: Vec<&str> = pattern.split('%').collect();
    let last = segments.len() - 1;
    let mut rest = text;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use attrix_core::EavEntity;
    use proptest::prelude::*;

    struct PropEntity;

    impl EavEntity for PropEntity {
        fn entity_table() -> &'static str {
            "prop_entities"
        }
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Boolean),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e12f64..1.0e12f64).prop_map(Value::Float),
            "[a-zA-Z0-9 ,;%_=-]{0,32}".prop_map(Value::Text),
        ]
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Set, save, reload: the value and its runtime type survive the
        /// storage text round trip, separator-looking text included.
        #[test]
        fn prop_set_save_reload_round_trip(value in value_strategy()) {
            block_on(async {
                let store = MockStore::new();
                store.entity_insert(1);

                let mut m = EavMapper::<MockStore>::for_entity::<PropEntity>(&store, 1);
                m.set("subject", value.clone()).await.unwrap();
                m.save().await.unwrap();

                let mut reloaded = EavMapper::<MockStore>::for_entity::<PropEntity>(&store, 1);
                let loaded = reloaded.get("subject").await.unwrap().cloned();
                prop_assert_eq!(loaded, Some(value));
                Ok(())
            })?;
        }

        /// A loaded-then-saved bag never writes again without a mutation.
        #[test]
        fn prop_clean_save_writes_nothing(value in value_strategy()) {
            block_on(async {
                let store = MockStore::new();
                store.entity_insert(1);

                let mut m = EavMapper::<MockStore>::for_entity::<PropEntity>(&store, 1);
                m.set("subject", value).await.unwrap();
                m.save().await.unwrap();

                let inserts = store.definition_insert_count();
                m.save().await.unwrap();
                prop_assert_eq!(store.definition_insert_count(), inserts);
                prop_assert_eq!(store.definition_update_count(), 0);
                Ok(())
            })?;
        }

        /// Filter aliases are deterministic, distinct per name, and legal
        /// SQL identifiers.
        #[test]
        fn prop_filter_alias_shape(name in "[a-z_]{1,16}", other in "[a-z_]{1,16}") {
            let alias = sql::filter_alias(&name);
            prop_assert_eq!(alias.clone(), sql::filter_alias(&name));
            prop_assert!(alias.starts_with("f_"));
            prop_assert_eq!(alias.len(), 10);
            if name != other {
                prop_assert_ne!(alias, sql::filter_alias(&other));
            }
        }
    }
}
