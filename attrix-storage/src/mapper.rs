//! The entity-side attribute capability.
//!
//! An [`EavMapper`] is what a host record owns: it pairs the in-memory bag
//! with a store reference and drives lazy loading, the save cascade and
//! attribute deletion. One mapper per entity instance; nothing is shared
//! across instances.

use crate::bag::AttributeBag;
use crate::AttributeStore;
use attrix_core::{config_for, AttrixResult, AttributeRecord, EavEntity, TableConfig, Value};

pub struct EavMapper<'a, S: AttributeStore + ?Sized> {
    store: &'a S,
    config: &'static TableConfig,
    item_id: i64,
    bag: AttributeBag,
}

impl<'a, S: AttributeStore + ?Sized> EavMapper<'a, S> {
    /// Mapper over an explicit configuration.
    pub fn new(store: &'a S, config: &'static TableConfig, item_id: i64) -> Self {
        Self {
            store,
            config,
            item_id,
            bag: AttributeBag::new(),
        }
    }

    /// Mapper for a registered entity type.
    pub fn for_entity<E: EavEntity>(store: &'a S, item_id: i64) -> Self {
        Self::new(store, config_for::<E>(), item_id)
    }

    pub fn item_id(&self) -> i64 {
        self.item_id
    }

    pub fn config(&self) -> &'static TableConfig {
        self.config
    }

    /// The underlying bag; read-only view of current in-memory state.
    pub fn bag(&self) -> &AttributeBag {
        &self.bag
    }

    /// Load once per mapper instance; later calls are no-ops.
    async fn ensure_loaded(&mut self) -> AttrixResult<()> {
        if self.bag.is_loaded() {
            return Ok(());
        }
        let records = self.store.load_attributes(self.config, self.item_id).await?;
        self.bag.hydrate(records);
        Ok(())
    }

    /// Value of a named attribute. Absent names are `None`, never an error.
    pub async fn get(&mut self, name: &str) -> AttrixResult<Option<&Value>> {
        self.ensure_loaded().await?;
        Ok(self.bag.get(name))
    }

    /// Set an attribute. Every call is a mutation, including falsy values;
    /// removal is only ever the explicit [`unset`](Self::unset).
    pub async fn set(&mut self, name: &str, value: impl Into<Value>) -> AttrixResult<()> {
        self.ensure_loaded().await?;
        self.bag.set(self.item_id, name, value.into());
        Ok(())
    }

    /// All records, in attribute-name order.
    pub async fn records(&mut self) -> AttrixResult<Vec<&AttributeRecord>> {
        self.ensure_loaded().await?;
        Ok(self.bag.iter().collect())
    }

    /// Persist pending changes: insert records that were never stored,
    /// update dirty ones, skip clean ones. A mapper that never loaded has
    /// nothing to write and issues no statements.
    pub async fn save(&mut self) -> AttrixResult<()> {
        if !self.bag.is_loaded() {
            return Ok(());
        }
        for record in self.bag.iter_mut() {
            match record.id {
                None => {
                    let id = self.store.insert_attribute(self.config, record).await?;
                    record.mark_inserted(id);
                }
                Some(id) if record.is_modified() => {
                    self.store.update_attribute(self.config, id, record).await?;
                    record.mark_clean();
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Remove one attribute, deleting its rows if it was ever persisted.
    /// Returns whether the attribute existed.
    pub async fn unset(&mut self, name: &str) -> AttrixResult<bool> {
        self.ensure_loaded().await?;
        match self.bag.remove(name) {
            None => Ok(false),
            Some(record) => {
                if record.id.is_some() {
                    self.store
                        .delete_attributes(self.config, self.item_id, Some(name))
                        .await?;
                }
                Ok(true)
            }
        }
    }

    /// Remove every attribute of this entity. Returns the number of
    /// definition rows deleted.
    pub async fn unset_all(&mut self) -> AttrixResult<u64> {
        let deleted = self
            .store
            .delete_attributes(self.config, self.item_id, None)
            .await?;
        self.bag.clear();
        Ok(deleted)
    }
}
