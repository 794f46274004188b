//! Record instances: the two-tier attribute model and lifecycle.
//!
//! A record keeps two maps: `persisted` mirrors the last known store state,
//! `local` holds uncommitted mutations. Reads overlay local on persisted;
//! a successful save promotes the written keys from local to persisted.
//! State machine: Transient (no id) → Persisted ⇄ Dirty-Persisted →
//! Frozen (terminal, via destroy).

use std::collections::BTreeMap;

use activerow_core::{Criteria, Error, QueryOptions, Result, Term, Value};

use crate::class::Class;

/// An instance of a [`Class`].
#[derive(Debug, Clone)]
pub struct Record {
    class: Class,
    persisted: BTreeMap<String, Value>,
    local: BTreeMap<String, Value>,
    frozen: bool,
}

impl Record {
    pub(crate) fn transient(class: Class, local: BTreeMap<String, Value>) -> Self {
        Self {
            class,
            persisted: BTreeMap::new(),
            local,
            frozen: false,
        }
    }

    pub(crate) fn persisted(class: Class, persisted: BTreeMap<String, Value>) -> Self {
        Self {
            class,
            persisted,
            local: BTreeMap::new(),
            frozen: false,
        }
    }

    /// The class this record belongs to.
    #[must_use]
    pub fn class(&self) -> &Class {
        &self.class
    }

    /// The primary key, once the record has been created.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.persisted.get("id").and_then(Value::as_int)
    }

    // ------------------------------------------------------------------
    // Attribute access
    // ------------------------------------------------------------------

    /// Read an attribute: local value if present, else persisted, else
    /// `Null` for a declared-but-unset attribute. A name that is neither
    /// declared nor present is an unknown-attribute error.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(v) = self.local.get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.persisted.get(name) {
            return Ok(v.clone());
        }
        if self.class.is_declared(name) {
            return Ok(Value::Null);
        }
        Err(Error::unknown_attribute(self.class.name(), name))
    }

    /// Write an attribute into the local (uncommitted) tier.
    ///
    /// Fails on a frozen record, on an undeclared name, and on an attempt
    /// to reassign the primary key once it exists.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.frozen {
            return Err(Error::frozen(self.class.name(), self.id()));
        }
        if name == "id" && self.id().is_some() {
            return Err(Error::configuration(format!(
                "primary key of `{}` is immutable once assigned",
                self.class.name()
            )));
        }
        if !self.class.is_declared(name) {
            return Err(Error::unknown_attribute(self.class.name(), name));
        }
        self.local.insert(name.to_string(), value.into());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    /// True once the record has a store-assigned id.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.id().is_some()
    }

    /// Dirty iff never created, or uncommitted local values exist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.id().is_none() || !self.local.is_empty()
    }

    /// Re-check existence against the store by id count.
    pub fn is_present(&self) -> Result<bool> {
        match self.id() {
            Some(id) => Ok(self.class.count(&Criteria::Id(id))? > 0),
            None => Ok(false),
        }
    }

    /// True once the record was destroyed or explicitly frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Permanently forbid further mutation.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write local values to the store.
    ///
    /// Without an id this is an insert: local values whose keys are known
    /// store columns are written, the assigned id captured, and the written
    /// keys promoted from local to persisted — unknown local keys stay
    /// behind as ordinary in-memory fields. With an id it is an update of
    /// the same filtered set.
    pub fn save(&mut self) -> Result<()> {
        if self.frozen {
            return Err(Error::frozen(self.class.name(), self.id()));
        }
        let class = self.class.clone();
        let local = self.local.clone();

        match self.id() {
            None => {
                let (new_id, written) = class.with_schema_retry(|| {
                    let known = class.known_columns()?;
                    let values: Vec<(String, Value)> = local
                        .iter()
                        .filter(|(k, _)| k.as_str() != "id" && known.contains_key(k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    let id = class.store().insert(class.table_name(), &values)?;
                    let keys: Vec<String> = values.into_iter().map(|(k, _)| k).collect();
                    Ok((id, keys))
                })?;
                self.promote(&written);
                self.persisted.insert("id".to_string(), Value::Int(new_id));
            }
            Some(id) => {
                let written = class.with_schema_retry(|| {
                    let known = class.known_columns()?;
                    let values: Vec<(String, Value)> = local
                        .iter()
                        .filter(|(k, _)| k.as_str() != "id" && known.contains_key(k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if values.is_empty() {
                        return Ok(Vec::new());
                    }
                    class
                        .store()
                        .update(class.table_name(), &values, &Criteria::Id(id))?;
                    Ok(values.into_iter().map(|(k, _)| k).collect())
                })?;
                self.promote(&written);
            }
        }
        Ok(())
    }

    fn promote(&mut self, written: &[String]) {
        for key in written {
            if let Some(v) = self.local.remove(key) {
                self.persisted.insert(key.clone(), v);
            }
        }
    }

    /// Re-read the row by id. Returns `Ok(true)` when the record was
    /// reloaded (persisted state replaced, local mutations discarded) and
    /// `Ok(false)` when the row is gone — or when the record was never
    /// created, in which case no query is issued.
    pub fn refresh(&mut self) -> Result<bool> {
        let Some(id) = self.id() else {
            return Ok(false);
        };
        let row = self
            .class
            .first(&Criteria::Id(id), &QueryOptions::default())?;
        match row {
            Some(fresh) => {
                self.persisted = fresh.persisted;
                self.local.clear();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete the row, fire the class's destroy hooks, and freeze.
    ///
    /// A second call on an already-frozen record is a no-op: no delete is
    /// attempted and no error raised.
    pub fn destroy(&mut self) -> Result<()> {
        if self.frozen {
            return Ok(());
        }
        if let Some(id) = self.id() {
            self.class.destroy_by_id(id)?;
        }
        self.frozen = true;
        Ok(())
    }

    /// JSON snapshot of the effective attribute state (persisted overlaid
    /// with local).
    #[must_use]
    pub fn dump(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.persisted {
            map.insert(k.clone(), v.to_json());
        }
        for (k, v) in &self.local {
            map.insert(k.clone(), v.to_json());
        }
        serde_json::Value::Object(map)
    }
}

/// A record reference renders as its id in criteria and attribute values;
/// an unsaved record renders as `Null`.
impl From<&Record> for Value {
    fn from(record: &Record) -> Self {
        record.id().map_or(Value::Null, Value::Int)
    }
}

impl From<&Record> for Term {
    fn from(record: &Record) -> Self {
        Term::Value(Value::from(record))
    }
}
