//! The in-memory attribute bag.
//!
//! One bag per entity instance. It holds the name-keyed records and the
//! loaded-once flag; all storage traffic is orchestrated by the mapper.

use attrix_core::{AttributeRecord, Value};
use std::collections::BTreeMap;

/// Ordered mapping from attribute name to record, plus the lazy-load flag.
///
/// Names are unique per entity: hydration keeps the last record in row order
/// when storage happens to contain duplicates, and `set` always overwrites
/// in place.
#[derive(Debug, Clone, Default)]
pub struct AttributeBag {
    records: BTreeMap<String, AttributeRecord>,
    loaded: bool,
}

impl AttributeBag {
    /// Empty, not-yet-loaded bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag built from already-fetched records (batch fetch path).
    pub fn from_records(records: Vec<AttributeRecord>) -> Self {
        let mut bag = Self::new();
        bag.hydrate(records);
        bag
    }

    /// Whether the lazy load has happened for this bag.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Install loaded records and set the loaded flag.
    pub(crate) fn hydrate(&mut self, records: Vec<AttributeRecord>) {
        for record in records {
            self.records.insert(record.name.clone(), record);
        }
        self.loaded = true;
    }

    /// Value of a named attribute, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.records.get(name).map(|r| &r.value)
    }

    /// Full record of a named attribute, if present.
    pub fn record(&self, name: &str) -> Option<&AttributeRecord> {
        self.records.get(name)
    }

    /// Set an attribute: overwrite an existing record's value (dirtying it)
    /// or create a fresh insert-pending record.
    pub fn set(&mut self, item_id: i64, name: &str, value: Value) {
        match self.records.get_mut(name) {
            Some(record) => record.set_value(value),
            None => {
                self.records
                    .insert(name.to_string(), AttributeRecord::new(item_id, name, value));
            }
        }
    }

    /// Remove an attribute from the bag, returning its record.
    pub fn remove(&mut self, name: &str) -> Option<AttributeRecord> {
        self.records.remove(name)
    }

    /// Drop every record. The bag stays loaded; an empty loaded bag is an
    /// accurate mirror of storage after a bulk delete.
    pub fn clear(&mut self) {
        self.records.clear();
        self.loaded = true;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in attribute-name order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeRecord> {
        self.records.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut AttributeRecord> {
        self.records.values_mut()
    }
}
