//! Core types and the store contract for activerow.
//!
//! `activerow-core` is the foundation layer of the workspace. It defines the
//! data model the other crates exchange and the contract the engine demands
//! from a backing store.
//!
//! # Role In The Architecture
//!
//! - **Data model**: [`Value`], [`Row`], and [`AttrType`] represent attribute
//!   state, query results, and declared column types.
//! - **Query description**: [`Criteria`], [`Term`], and [`QueryOptions`] are
//!   the input of the criteria compiler in `activerow-query` and the
//!   vocabulary of the [`Store`] contract.
//! - **Contract layer**: [`Store`] is implemented by driver crates such as
//!   `activerow-sqlite`; the class/record engine in `activerow` talks to
//!   storage only through it.
//! - **Errors**: one layered [`Error`] type shared by every crate.
//!
//! Most applications should depend on the `activerow` facade; reach for
//! `activerow-core` directly when writing a store adapter.

pub mod criteria;
pub mod error;
pub mod row;
pub mod store;
pub mod types;
pub mod value;

pub use criteria::{Criteria, Join, QueryOptions, Term};
pub use error::{
    ConfigurationError, ConversionError, Error, FrozenObjectError, Result, StoreError,
    StoreErrorKind, UnknownAttributeError,
};
pub use row::Row;
pub use store::Store;
pub use types::AttrType;
pub use value::Value;
