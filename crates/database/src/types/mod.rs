//! Shared error and result types for the database layer

pub mod errors;

pub use errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;
