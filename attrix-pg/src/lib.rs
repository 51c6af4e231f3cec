//! ATTRIX PostgreSQL Backend
//!
//! Client-side PostgreSQL implementation of the attribute store over a
//! deadpool connection pool. Statement text comes from `attrix-storage`;
//! this crate only binds parameters, runs transactions, and decodes rows.
//!
//! Integration tests that need a live database are gated behind the
//! `db-tests` feature; connection settings come from `ATTRIX_DB_*`
//! environment variables.

pub mod config;
pub mod store;

pub use config::PgConfig;
pub use store::PgStore;
