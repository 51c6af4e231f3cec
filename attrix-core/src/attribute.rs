//! In-memory attribute records.

use crate::value::{TypeTag, Value};
use serde::{Deserialize, Serialize};

/// One name/value pair plus its storage metadata.
///
/// A record merges a definition row and its value row. It is created either
/// by a load (mirrors database state, clean) or by a set on the owning
/// entity (unsaved, dirty, no id until persisted). Records have no lifetime
/// of their own; they live and die with the owning entity's attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Definition row id; `None` until the record has been persisted.
    pub id: Option<i64>,
    /// Primary key of the owning entity row.
    pub item_id: i64,
    /// Attribute name, unique per entity.
    pub name: String,
    /// Current value; its tag is what the `type` column stores.
    pub value: Value,
    modified: bool,
}

impl AttributeRecord {
    /// Record hydrated from storage. Clean until mutated.
    pub fn loaded(id: i64, item_id: i64, name: impl Into<String>, value: Value) -> Self {
        Self {
            id: Some(id),
            item_id,
            name: name.into(),
            value,
            modified: false,
        }
    }

    /// Record created in memory by a set; insert-pending.
    pub fn new(item_id: i64, name: impl Into<String>, value: Value) -> Self {
        Self {
            id: None,
            item_id,
            name: name.into(),
            value,
            modified: true,
        }
    }

    /// Replace the value, marking the record dirty.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.modified = true;
    }

    /// Tag recorded in the definition row's `type` column.
    pub fn type_tag(&self) -> TypeTag {
        self.value.tag()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Never persisted: save must insert into both tables.
    pub fn needs_insert(&self) -> bool {
        self.id.is_none()
    }

    /// Persisted and dirty: save must update both rows.
    pub fn needs_update(&self) -> bool {
        self.modified && self.id.is_some()
    }

    /// Record the id generated by the definition insert and mark clean.
    pub fn mark_inserted(&mut self, id: i64) {
        self.id = Some(id);
        self.modified = false;
    }

    /// Mark clean after a successful update.
    pub fn mark_clean(&mut self) {
        self.modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_record_is_clean() {
        let rec = AttributeRecord::loaded(7, 1, "color", Value::from("red"));
        assert!(!rec.is_modified());
        assert!(!rec.needs_insert());
        assert!(!rec.needs_update());
    }

    #[test]
    fn test_new_record_needs_insert() {
        let rec = AttributeRecord::new(1, "color", Value::from("red"));
        assert!(rec.needs_insert());
        assert!(rec.is_modified());
        // Insert wins over update while there is no id.
        assert!(!rec.needs_update());
    }

    #[test]
    fn test_set_value_dirties_loaded_record() {
        let mut rec = AttributeRecord::loaded(7, 1, "count", Value::from(2));
        rec.set_value(Value::from(3));
        assert!(rec.needs_update());
        assert_eq!(rec.type_tag(), TypeTag::Integer);
    }

    #[test]
    fn test_mark_inserted_transitions_to_clean() {
        let mut rec = AttributeRecord::new(1, "count", Value::from(2));
        rec.mark_inserted(11);
        assert_eq!(rec.id, Some(11));
        assert!(!rec.needs_insert());
        assert!(!rec.needs_update());
    }

    #[test]
    fn test_falsy_values_still_dirty() {
        // Setting 0, "" or false is a real mutation, not a no-op.
        for value in [
            Value::Integer(0),
            Value::Text(String::new()),
            Value::Boolean(false),
        ] {
            let mut rec = AttributeRecord::loaded(7, 1, "flag", Value::from(true));
            rec.set_value(value);
            assert!(rec.needs_update());
        }
    }
}
