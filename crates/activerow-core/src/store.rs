//! The store contract: what the engine requires from a backing store.
//!
//! Implemented by driver crates (`activerow-sqlite`); the core never talks
//! to a database any other way. The trait is object-safe so classes can
//! share an `Arc<dyn Store>`.

use std::collections::BTreeMap;

use crate::criteria::{Criteria, QueryOptions};
use crate::error::Result;
use crate::row::Row;
use crate::types::AttrType;
use crate::value::Value;

/// A backing store that executes statements, manages transactions, and
/// reports column metadata.
///
/// All interaction is blocking; concurrent callers against the same store
/// must be serialized by the adapter. Nested `transaction_do` calls are
/// unsupported.
pub trait Store: Send + Sync {
    /// Create `table` with the given columns. With `force`, an existing
    /// table is dropped first.
    fn create_table(&self, table: &str, columns: &[(String, AttrType)], force: bool)
    -> Result<()>;

    /// Drop `table`. Fails when the table does not exist; callers that
    /// tolerate absence probe with [`Store::column_types`] first.
    fn drop_table(&self, table: &str) -> Result<()>;

    /// Add a column to an existing table.
    fn add_column(&self, table: &str, column: &str, ty: AttrType) -> Result<()>;

    /// Report the table's columns and their types. A missing table is a
    /// `StoreErrorKind::MissingTable` error, which doubles as the existence
    /// probe.
    fn column_types(&self, table: &str) -> Result<BTreeMap<String, AttrType>>;

    /// Insert one row; returns the new row's id.
    fn insert(&self, table: &str, values: &[(String, Value)]) -> Result<i64>;

    /// Update matching rows; returns the number of rows changed.
    fn update(&self, table: &str, values: &[(String, Value)], criteria: &Criteria)
    -> Result<u64>;

    /// Delete matching rows; returns the number of rows removed.
    fn delete(&self, table: &str, criteria: &Criteria) -> Result<u64>;

    /// Fetch all matching rows (finite, single pass).
    fn find(&self, table: &str, criteria: &Criteria, options: &QueryOptions) -> Result<Vec<Row>>;

    /// Fetch the first matching row, if any.
    fn first(
        &self,
        table: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> Result<Option<Row>>;

    /// Count matching rows.
    fn count(&self, table: &str, criteria: &Criteria, options: &QueryOptions) -> Result<i64>;

    /// Run `body` inside a transaction: commit when it returns `Ok`, roll
    /// back and re-surface the error when it returns `Err`.
    fn transaction_do(&self, body: &mut dyn FnMut() -> Result<()>) -> Result<()>;

    /// Store-specific string-literal escaping.
    fn escape(&self, s: &str) -> String;
}
