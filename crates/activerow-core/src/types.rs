//! Declared attribute types and their store-level type names.

/// The type tag of a declared attribute.
///
/// These are the only column types a class may declare. The store adapter
/// maps them to its native column types via [`AttrType::sql_name`] and maps
/// reported column metadata back via [`AttrType::parse`]; schema sync
/// compares the two with strict equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttrType {
    /// Auto-assigned integer primary key. Every class gets exactly one,
    /// named `id`.
    PrimaryKey,
    /// Short string.
    String,
    /// Unbounded text.
    Text,
    /// Signed integer, also used for all foreign keys.
    Integer,
    /// Floating point.
    Float,
    /// Fixed-point decimal; precision/rounding are the store's business.
    Decimal,
    /// Point in time, driver-native encoding.
    Timestamp,
    /// Calendar date, driver-native encoding.
    Date,
    /// Raw bytes.
    Binary,
    /// Boolean, stored as 0/1 where the store lacks a native boolean.
    Boolean,
}

impl AttrType {
    /// The SQL column type emitted into DDL for this attribute type.
    #[must_use]
    pub const fn sql_name(&self) -> &'static str {
        match self {
            AttrType::PrimaryKey => "INTEGER PRIMARY KEY",
            AttrType::String => "VARCHAR(255)",
            AttrType::Text => "TEXT",
            AttrType::Integer => "INTEGER",
            AttrType::Float => "FLOAT",
            AttrType::Decimal => "DECIMAL",
            AttrType::Timestamp => "TIMESTAMP",
            AttrType::Date => "DATE",
            AttrType::Binary => "BLOB",
            AttrType::Boolean => "BOOLEAN",
        }
    }

    /// Parse a store-reported native column type back into a type tag.
    ///
    /// Accepts the common spellings stores use for each family; returns
    /// `None` for anything unrecognized so adapters can pick a fallback.
    #[must_use]
    pub fn parse(native: &str) -> Option<Self> {
        let upper = native.trim().to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "VARCHAR" | "CHARACTER" | "CHAR" => Some(AttrType::String),
            "TEXT" | "CLOB" => Some(AttrType::Text),
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => Some(AttrType::Integer),
            "FLOAT" | "REAL" | "DOUBLE" => Some(AttrType::Float),
            "DECIMAL" | "NUMERIC" => Some(AttrType::Decimal),
            "TIMESTAMP" | "DATETIME" => Some(AttrType::Timestamp),
            "DATE" => Some(AttrType::Date),
            "BLOB" | "BINARY" | "VARBINARY" => Some(AttrType::Binary),
            "BOOLEAN" | "BOOL" => Some(AttrType::Boolean),
            _ => None,
        }
    }
}
