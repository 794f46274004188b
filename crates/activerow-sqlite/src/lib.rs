//! SQLite store adapter for activerow.
//!
//! [`SqliteStore`] implements the [`Store`] contract over a single `rusqlite`
//! connection. Statements are rendered by `activerow-query` and executed as
//! literal SQL; column metadata comes from `PRAGMA table_info`, which doubles
//! as the table-existence probe (a missing table reports zero columns and is
//! surfaced as `StoreErrorKind::MissingTable`).
//!
//! The connection sits behind a `Mutex`: callers against the same store are
//! serialized here, as the core's concurrency model requires. The lock is
//! never held across a `transaction_do` body, so the body is free to issue
//! further statements through the same store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use activerow_core::{
    AttrType, Criteria, Error, QueryOptions, Result, Row, Store, StoreErrorKind, Value,
};
use activerow_query::{Escape, count_sql, delete_sql, insert_sql, select_sql, update_sql};

/// A [`Store`] backed by one SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(map_sqlite_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn).map_err(map_sqlite_err)
    }

    fn execute_sql(&self, sql: &str) -> Result<u64> {
        tracing::debug!(sql = %sql, "execute");
        self.with_conn(|conn| conn.execute(sql, []))
            .map(|changed| changed as u64)
    }
}

/// Classify a rusqlite failure into the store error kinds the engine's
/// retry policy understands.
fn map_sqlite_err(err: rusqlite::Error) -> Error {
    let kind = match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::SchemaChanged) => StoreErrorKind::SchemaChanged,
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
            StoreErrorKind::Busy
        }
        _ => {
            let message = err.to_string();
            if message.contains("no such table") {
                StoreErrorKind::MissingTable
            } else if message.contains("already exists") {
                StoreErrorKind::DuplicateTable
            } else {
                StoreErrorKind::Execute
            }
        }
    };
    Error::store(kind, err.to_string())
}

impl Escape for SqliteStore {
    fn escape(&self, s: &str) -> String {
        Store::escape(self, s)
    }
}

/// Decode one result cell into a [`Value`].
fn decode(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

impl Store for SqliteStore {
    fn create_table(
        &self,
        table: &str,
        columns: &[(String, AttrType)],
        force: bool,
    ) -> Result<()> {
        if force && self.column_types(table).is_ok() {
            self.drop_table(table)?;
        }
        let defs: Vec<String> = columns
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty.sql_name()))
            .collect();
        let sql = format!("CREATE TABLE {} ({})", table, defs.join(", "));
        self.execute_sql(&sql).map(|_| ())
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        self.execute_sql(&format!("DROP TABLE {table}")).map(|_| ())
    }

    fn add_column(&self, table: &str, column: &str, ty: AttrType) -> Result<()> {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, ty.sql_name());
        self.execute_sql(&sql).map(|_| ())
    }

    fn column_types(&self, table: &str) -> Result<BTreeMap<String, AttrType>> {
        let columns = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(5)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        if columns.is_empty() {
            return Err(Error::store(
                StoreErrorKind::MissingTable,
                format!("no such table: {table}"),
            ));
        }

        let mut types = BTreeMap::new();
        for (name, native, pk) in columns {
            let ty = if pk == 1 && AttrType::parse(&native) == Some(AttrType::Integer) {
                AttrType::PrimaryKey
            } else {
                AttrType::parse(&native).unwrap_or_else(|| {
                    tracing::debug!(table, column = %name, native = %native, "unrecognized column type, treating as TEXT");
                    AttrType::Text
                })
            };
            types.insert(name, ty);
        }
        Ok(types)
    }

    fn insert(&self, table: &str, values: &[(String, Value)]) -> Result<i64> {
        let sql = insert_sql(table, values, self)?;
        self.with_conn(|conn| {
            conn.execute(&sql, [])?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn update(
        &self,
        table: &str,
        values: &[(String, Value)],
        criteria: &Criteria,
    ) -> Result<u64> {
        let sql = update_sql(table, values, criteria, self)?;
        self.execute_sql(&sql)
    }

    fn delete(&self, table: &str, criteria: &Criteria) -> Result<u64> {
        let sql = delete_sql(table, criteria, self)?;
        self.execute_sql(&sql)
    }

    fn find(&self, table: &str, criteria: &Criteria, options: &QueryOptions) -> Result<Vec<Row>> {
        let sql = select_sql(table, criteria, options, self)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut decoded = Row::new();
                for (idx, name) in names.iter().enumerate() {
                    decoded.push(name.clone(), decode(row.get_ref(idx)?));
                }
                out.push(decoded);
            }
            Ok(out)
        })
    }

    fn first(
        &self,
        table: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> Result<Option<Row>> {
        let mut options = options.clone();
        options.limit = Some(1);
        options.offset = None;
        Ok(self.find(table, criteria, &options)?.into_iter().next())
    }

    fn count(&self, table: &str, criteria: &Criteria, options: &QueryOptions) -> Result<i64> {
        let sql = count_sql(table, criteria, options, self)?;
        self.with_conn(|conn| conn.query_row(&sql, [], |row| row.get::<_, i64>(0)))
    }

    fn transaction_do(&self, body: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        self.execute_sql("BEGIN")?;
        match body() {
            Ok(()) => self.execute_sql("COMMIT").map(|_| ()),
            Err(err) => {
                // The rollback result must never mask the body's error.
                if let Err(rollback_err) = self.execute_sql("ROLLBACK") {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn escape(&self, s: &str) -> String {
        s.replace('\'', "''")
    }
}
