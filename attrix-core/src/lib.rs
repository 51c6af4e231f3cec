//! ATTRIX Core - Attribute Data Types
//!
//! Pure data structures for the dynamic attribute layer: typed values,
//! in-memory attribute records, filter expressions, and table configuration.
//! No I/O here - the storage trait and SQL assembly live in `attrix-storage`.

pub mod attribute;
pub mod error;
pub mod filter;
pub mod inflect;
pub mod schema;
pub mod value;

pub use attribute::AttributeRecord;
pub use error::{AttrixError, AttrixResult, ConfigError, DecodeError, StorageError};
pub use filter::{AttributeFilter, FilterOperator};
pub use inflect::singularize;
pub use schema::{
    config_for, AttributeColumns, EavEntity, TableConfig, TableConfigBuilder, TablePart,
    ValueColumns,
};
pub use value::{TypeTag, Value};
