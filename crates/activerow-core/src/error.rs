//! Error types shared across the activerow crates.
//!
//! Each failure domain gets its own payload struct so callers can match on
//! the domain without string-sniffing, mirroring the layering of the store
//! adapters: configuration problems are permanent caller bugs, store errors
//! carry a `StoreErrorKind` that the class layer inspects for its
//! retry-on-schema-change policy.

use std::fmt;

/// Convenient result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for all activerow operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid class/association declaration or misuse of a declared schema.
    Configuration(ConfigurationError),
    /// Get/set on an attribute the class never declared.
    UnknownAttribute(UnknownAttributeError),
    /// Mutation attempted on a record after destroy/freeze.
    FrozenObject(FrozenObjectError),
    /// A value could not be rendered into the query language.
    Conversion(ConversionError),
    /// Failure reported by the underlying store adapter.
    Store(StoreError),
}

impl Error {
    /// Build a [`ConfigurationError`] with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(ConfigurationError {
            message: message.into(),
        })
    }

    /// Build an [`UnknownAttributeError`] for `class.attribute`.
    pub fn unknown_attribute(class: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::UnknownAttribute(UnknownAttributeError {
            class: class.into(),
            attribute: attribute.into(),
        })
    }

    /// Build a [`FrozenObjectError`] for an instance of `class`.
    pub fn frozen(class: impl Into<String>, id: Option<i64>) -> Self {
        Error::FrozenObject(FrozenObjectError {
            class: class.into(),
            id,
        })
    }

    /// Build a [`ConversionError`] with the given message.
    pub fn conversion(message: impl Into<String>) -> Self {
        Error::Conversion(ConversionError {
            message: message.into(),
        })
    }

    /// Build a [`StoreError`] of the given kind.
    pub fn store(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Error::Store(StoreError {
            kind,
            message: message.into(),
        })
    }

    /// True when the underlying store reported a concurrent schema change.
    ///
    /// The class layer invalidates its column-type cache and retries the
    /// statement exactly once when this holds.
    #[must_use]
    pub fn is_schema_changed(&self) -> bool {
        matches!(
            self,
            Error::Store(StoreError {
                kind: StoreErrorKind::SchemaChanged,
                ..
            })
        )
    }

    /// True when the store reported that the addressed table does not exist.
    #[must_use]
    pub fn is_missing_table(&self) -> bool {
        matches!(
            self,
            Error::Store(StoreError {
                kind: StoreErrorKind::MissingTable,
                ..
            })
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "configuration error: {}", e.message),
            Error::UnknownAttribute(e) => {
                write!(f, "unknown attribute `{}` on class `{}`", e.attribute, e.class)
            }
            Error::FrozenObject(e) => match e.id {
                Some(id) => write!(f, "frozen object: `{}` id {}", e.class, id),
                None => write!(f, "frozen object: `{}`", e.class),
            },
            Error::Conversion(e) => write!(f, "conversion error: {}", e.message),
            Error::Store(e) => write!(f, "store error ({}): {}", e.kind, e.message),
        }
    }
}

impl std::error::Error for Error {}

/// Invalid declaration: missing class name, type conflict on redeclaration,
/// missing join `on` clause, id reassignment, absent store binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    /// Human-readable description of the misconfiguration.
    pub message: String,
}

/// Attribute access on a name the class never declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttributeError {
    /// Class name.
    pub class: String,
    /// The offending attribute name.
    pub attribute: String,
}

/// Mutation attempted after the record was destroyed/frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenObjectError {
    /// Class name.
    pub class: String,
    /// Primary key, when the record ever had one.
    pub id: Option<i64>,
}

/// A value that cannot be rendered into the query language, including the
/// empty IN-set (no predicate can represent "IN nothing").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// Human-readable description of the conversion failure.
    pub message: String,
}

/// Failure surfaced by a store adapter, classified for retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// Classification used by callers; everything else is in `message`.
    pub kind: StoreErrorKind,
    /// Adapter-provided detail, surfaced verbatim.
    pub message: String,
}

/// Classification of store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The addressed table does not exist. Doubles as the existence probe
    /// result of `Store::column_types`.
    MissingTable,
    /// Table creation collided with an existing table.
    DuplicateTable,
    /// The schema changed underneath a prepared statement.
    SchemaChanged,
    /// The store is busy/locked; retrying is the adapter's business.
    Busy,
    /// Any other execution failure.
    Execute,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreErrorKind::MissingTable => "missing table",
            StoreErrorKind::DuplicateTable => "duplicate table",
            StoreErrorKind::SchemaChanged => "schema changed",
            StoreErrorKind::Busy => "busy",
            StoreErrorKind::Execute => "execute",
        };
        f.write_str(s)
    }
}
