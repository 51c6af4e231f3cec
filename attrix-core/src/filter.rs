//! Attribute filter expressions.
//!
//! A filter names an attribute, an operator and a comparand; the storage
//! layer turns each one into a derived sub-query joined against the entity
//! table. Multiple filters on one query AND together.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Filter operator for attribute comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// SQL LIKE pattern match (text only)
    Like,
}

impl FilterOperator {
    /// SQL rendering of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "<>",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::Like => "LIKE",
        }
    }
}

/// One attribute comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Attribute name to filter on
    pub name: String,
    /// Operator to apply
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: Value,
}

impl AttributeFilter {
    /// Create a new attribute filter.
    pub fn new(name: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            operator,
            value: value.into(),
        }
    }

    /// Create an equality filter.
    pub fn eq(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, FilterOperator::Eq, value)
    }

    /// Create a LIKE filter.
    pub fn like(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, FilterOperator::Like, Value::Text(pattern.into()))
    }

    /// Whether the comparand calls for a numeric comparison of stored text.
    pub fn is_numeric(&self) -> bool {
        matches!(self.value, Value::Integer(_) | Value::Float(_))
    }
}
