//! Criteria-to-SQL compiler for activerow.
//!
//! This crate is the pure half of the query path: it turns the shared
//! query-description types from `activerow-core` ([`Criteria`],
//! [`QueryOptions`]) into SQL text. It holds no state and performs no I/O;
//! store adapters call into it and execute the result.
//!
//! [`Criteria`]: activerow_core::Criteria
//! [`QueryOptions`]: activerow_core::QueryOptions

pub mod compile;

pub use compile::{count_sql, delete_sql, insert_sql, literal, select_sql, update_sql, where_clause};

/// String-literal escaping, supplied by the store whose dialect the
/// statement targets.
///
/// Store adapters implement this next to their `Store` impl (typically by
/// delegating to `Store::escape`); compiler unit tests substitute a trivial
/// implementation instead of a full adapter.
pub trait Escape {
    /// Escape the contents of a string literal (quoting is the compiler's
    /// job).
    fn escape(&self, s: &str) -> String;
}
