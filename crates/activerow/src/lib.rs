//! activerow — an object-relational persistence engine.
//!
//! Record "classes" are declared at runtime, mapped onto backing-store
//! tables, and kept in sync additively: registering a class creates its
//! table when absent and adds any missing columns. Instances track local
//! (uncommitted) attribute state against persisted state, and classes
//! declare relationships — belongs-to, has-one, holds-one, has-many,
//! many-to-many — whose referential consistency on deletion is maintained
//! through per-class hook lists.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use activerow::prelude::*;
//! use activerow_sqlite::SqliteStore;
//!
//! let store: Arc<dyn Store> = Arc::new(SqliteStore::open("app.db")?);
//!
//! let team = Class::define("Team")
//!     .attribute("name", AttrType::String)
//!     .store(store.clone())
//!     .register()?;
//! let player = Class::define("Player")
//!     .attribute("name", AttrType::String)
//!     .store(store.clone())
//!     .register()?;
//!
//! team.has_many(&player, AssociationOptions::new().dependency(Dependency::Destroy))?;
//!
//! let rockets = team.create([("name", Value::from("Rockets"))])?;
//! let ada = player.create([("name", Value::from("Ada"))])?;
//! rockets.add_related("players", &ada)?;
//! ```
//!
//! # Crate layout
//!
//! - `activerow-core` — value/row/criteria data model, the [`Store`]
//!   contract, errors.
//! - `activerow-query` — the criteria-to-SQL compiler.
//! - `activerow-sqlite` — a `rusqlite`-backed store adapter.
//! - this crate — class registry and schema sync ([`class`]), record
//!   lifecycle ([`record`]), hook dispatch ([`hooks`]), and the
//!   association engine ([`association`]).

pub mod association;
pub mod class;
pub mod hooks;
pub mod record;

pub use association::{AssociationOptions, Dependency, NO_REFERENCE};
pub use class::{Class, ClassBuilder};
pub use hooks::{
    AFTER_DESTROY, AFTER_SELFDESTRUCT, BEFORE_DESTROY, BEFORE_SELFDESTRUCT, HookFn, Hooks,
};
pub use record::Record;

// Re-export the foundation layer so applications need only this crate.
pub use activerow_core::{
    AttrType, ConfigurationError, ConversionError, Criteria, Error, FrozenObjectError, Join,
    QueryOptions, Result, Row, Store, StoreError, StoreErrorKind, Term, UnknownAttributeError,
    Value,
};

/// Common imports for applications.
pub mod prelude {
    pub use crate::association::{AssociationOptions, Dependency};
    pub use crate::class::Class;
    pub use crate::record::Record;
    pub use activerow_core::{
        AttrType, Criteria, Error, Join, QueryOptions, Result, Row, Store, Term, Value,
    };
}
