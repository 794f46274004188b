//! Runtime-defined record classes and schema synchronization.
//!
//! A [`Class`] binds a name, a table, a declared attribute set, hook lists,
//! and association descriptors to one shared [`Store`]. Registration
//! reconciles the declared attributes against the store's actual columns:
//! the table is created when absent, missing columns are added, and a type
//! conflict between a redeclaration and an existing column is fatal. After
//! the first sync the attribute set only ever grows, until the explicit
//! destructive drop in [`Class::self_destruct`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use activerow_core::{
    AttrType, Criteria, Error, QueryOptions, Result, Row, Store, Term, Value,
};

use crate::association::Association;
use crate::hooks::{AFTER_DESTROY, AFTER_SELFDESTRUCT, BEFORE_DESTROY, BEFORE_SELFDESTRUCT, HookFn, Hooks};
use crate::record::Record;

/// Derive a table/column identifier from a class name: `ClubMember`
/// becomes `club_member`.
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub(crate) struct ClassInner {
    pub(crate) name: String,
    pub(crate) table_name: String,
    pub(crate) store: Arc<dyn Store>,
    /// Declared attribute set; monotonically additive after registration.
    pub(crate) attributes: RwLock<BTreeMap<String, AttrType>>,
    /// Store-reported column types; `None` after invalidation.
    pub(crate) columns: RwLock<Option<BTreeMap<String, AttrType>>>,
    pub(crate) hooks: Hooks,
    pub(crate) associations: RwLock<BTreeMap<String, Association>>,
}

/// A runtime-defined record type bound to a store table.
///
/// `Class` is a cheap-clone handle; every clone shares the same attribute
/// set, hooks, and associations. All instances of the class share the
/// class's store.
#[derive(Clone)]
pub struct Class {
    pub(crate) inner: Arc<ClassInner>,
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.inner.name)
            .field("table_name", &self.inner.table_name)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`Class::define`].
pub struct ClassBuilder {
    name: String,
    table_name: Option<String>,
    attributes: Vec<(String, AttrType)>,
    store: Option<Arc<dyn Store>>,
    parent: Option<Class>,
}

impl ClassBuilder {
    /// Declare a column-backed attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, ty: AttrType) -> Self {
        self.attributes.push((name.into(), ty));
        self
    }

    /// Override the table name derived from the class name.
    #[must_use]
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Inherit the parent class's declared attributes.
    #[must_use]
    pub fn inherits(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Bind the class to a store. Required; there is no implicit default.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Synchronize the schema and return the registered class.
    ///
    /// Creates the table when the store's metadata probe says it is absent,
    /// adds every declared column the store does not have yet, and fails
    /// with a configuration error when a declared type conflicts with an
    /// existing column.
    pub fn register(self) -> Result<Class> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("class name must not be empty"));
        }
        let store = self.store.ok_or_else(|| {
            Error::configuration(format!("class `{}` has no store binding", self.name))
        })?;
        let table_name = self
            .table_name
            .unwrap_or_else(|| snake_case(&self.name));

        // Ordered column list: implicit primary key first, inherited
        // attributes next, own declarations last. Later declarations of the
        // same name win.
        let mut ordered: Vec<(String, AttrType)> =
            vec![("id".to_string(), AttrType::PrimaryKey)];
        let mut seen: BTreeSet<String> = BTreeSet::from(["id".to_string()]);
        let inherited = self
            .parent
            .iter()
            .flat_map(|p| p.declared_attributes().into_iter());
        for (name, ty) in inherited.chain(self.attributes) {
            if seen.insert(name.clone()) {
                ordered.push((name, ty));
            } else if name != "id" {
                if let Some(slot) = ordered.iter_mut().find(|(n, _)| *n == name) {
                    slot.1 = ty;
                }
            }
        }

        let mut columns = match store.column_types(&table_name) {
            Ok(cols) => cols,
            Err(err) if err.is_missing_table() => {
                tracing::debug!(class = %self.name, table = %table_name, "creating table");
                store.create_table(&table_name, &ordered, false)?;
                store.column_types(&table_name)?
            }
            Err(err) => return Err(err),
        };

        for (attr, ty) in &ordered {
            match columns.get(attr) {
                Some(stored) if stored == ty => {}
                Some(stored) => {
                    return Err(Error::configuration(format!(
                        "attribute `{attr}` on class `{}` declared as {ty:?} but stored as {stored:?}",
                        self.name
                    )));
                }
                None => {
                    tracing::debug!(class = %self.name, column = %attr, "adding column");
                    store.add_column(&table_name, attr, *ty)?;
                    columns.insert(attr.clone(), *ty);
                }
            }
        }

        tracing::debug!(class = %self.name, table = %table_name, attributes = ordered.len(), "registered class");
        Ok(Class {
            inner: Arc::new(ClassInner {
                name: self.name,
                table_name,
                store,
                attributes: RwLock::new(ordered.into_iter().collect()),
                columns: RwLock::new(Some(columns)),
                hooks: Hooks::default(),
                associations: RwLock::new(BTreeMap::new()),
            }),
        })
    }
}

impl Class {
    /// Start declaring a class with the given name.
    pub fn define(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            table_name: None,
            attributes: Vec::new(),
            store: None,
            parent: None,
        }
    }

    pub(crate) fn from_inner(inner: Arc<ClassInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ClassInner> {
        Arc::downgrade(&self.inner)
    }

    /// The class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The backing-store table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    /// The store this class is bound to.
    #[must_use]
    pub fn store(&self) -> Arc<dyn Store> {
        self.inner.store.clone()
    }

    /// Snapshot of the declared attribute set.
    #[must_use]
    pub fn declared_attributes(&self) -> BTreeMap<String, AttrType> {
        self.inner
            .attributes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn is_declared(&self, name: &str) -> bool {
        self.inner
            .attributes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    // ------------------------------------------------------------------
    // Schema sync
    // ------------------------------------------------------------------

    /// Declare one more attribute after registration.
    ///
    /// When the store already has the column, the declared type must equal
    /// the stored type; otherwise the column is added.
    pub fn add_attribute(&self, name: impl Into<String>, ty: AttrType) -> Result<()> {
        let name = name.into();
        let columns = self.known_columns()?;
        match columns.get(&name) {
            Some(stored) if *stored == ty => {}
            Some(stored) => {
                return Err(Error::configuration(format!(
                    "attribute `{name}` on class `{}` declared as {ty:?} but stored as {stored:?}",
                    self.name()
                )));
            }
            None => {
                tracing::debug!(class = %self.name(), column = %name, "adding column");
                self.inner
                    .store
                    .add_column(self.table_name(), &name, ty)?;
                let mut cache = self
                    .inner
                    .columns
                    .write()
                    .unwrap_or_else(|e| e.into_inner());
                if let Some(map) = cache.as_mut() {
                    map.insert(name.clone(), ty);
                }
            }
        }
        self.inner
            .attributes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, ty);
        Ok(())
    }

    /// The store-reported type of a column, when it exists.
    ///
    /// Used both for redeclaration validation and for filtering unknown
    /// keys out of bulk writes.
    pub fn has_attribute(&self, name: &str) -> Result<Option<AttrType>> {
        Ok(self.known_columns()?.get(name).copied())
    }

    /// The cached store column set, loading it on first use.
    pub(crate) fn known_columns(&self) -> Result<BTreeMap<String, AttrType>> {
        {
            let cache = self
                .inner
                .columns
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(map) = cache.as_ref() {
                return Ok(map.clone());
            }
        }
        let fresh = self.inner.store.column_types(self.table_name())?;
        let mut cache = self
            .inner
            .columns
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *cache = Some(fresh.clone());
        Ok(fresh)
    }

    pub(crate) fn invalidate_columns(&self) {
        let mut cache = self
            .inner
            .columns
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    /// Run a store operation, retrying exactly once after invalidating the
    /// column cache when the store reports a concurrent schema change.
    pub(crate) fn with_schema_retry<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        match op() {
            Err(err) if err.is_schema_changed() => {
                tracing::debug!(class = %self.name(), "schema changed underneath statement, retrying once");
                self.invalidate_columns();
                op()
            }
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    /// Register a hook under `tag`; returns the removal handle.
    pub fn add_hook<F>(&self, tag: &str, f: F) -> HookFn
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.hooks.on(tag, f)
    }

    /// Remove the first hook under `tag` matching the handle.
    pub fn remove_hook(&self, tag: &str, handle: &HookFn) -> bool {
        self.inner.hooks.remove(tag, handle)
    }

    /// Invoke every hook under `tag` in registration order, fail-fast.
    pub fn call_hook(&self, tag: &str, args: &[Value]) -> Result<()> {
        self.inner.hooks.call(tag, args)
    }

    // ------------------------------------------------------------------
    // Lifecycle entry points
    // ------------------------------------------------------------------

    /// Build an unsaved record with the given local values.
    pub fn new_record<I, K, V>(&self, attrs: I) -> Record
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Record::transient(
            self.clone(),
            attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// `new_record` followed by `save`.
    pub fn create<I, K, V>(&self, attrs: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = self.new_record(attrs);
        record.save()?;
        Ok(record)
    }

    /// Build a record assumed already persisted, from a raw store row.
    #[must_use]
    pub fn instantiate(&self, row: Row) -> Record {
        Record::persisted(
            self.clone(),
            row.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        )
    }

    /// Fetch all matching records.
    pub fn find(&self, criteria: &Criteria, options: &QueryOptions) -> Result<Vec<Record>> {
        let rows = self.with_schema_retry(|| {
            self.inner.store.find(self.table_name(), criteria, options)
        })?;
        Ok(rows.into_iter().map(|row| self.instantiate(row)).collect())
    }

    /// Fetch the first matching record, if any.
    pub fn first(&self, criteria: &Criteria, options: &QueryOptions) -> Result<Option<Record>> {
        let row = self.with_schema_retry(|| {
            self.inner.store.first(self.table_name(), criteria, options)
        })?;
        Ok(row.map(|row| self.instantiate(row)))
    }

    /// Count matching rows.
    pub fn count(&self, criteria: &Criteria) -> Result<i64> {
        self.with_schema_retry(|| {
            self.inner
                .store
                .count(self.table_name(), criteria, &QueryOptions::default())
        })
    }

    /// Bulk column assignment, bypassing hooks.
    ///
    /// Like [`Class::delete_all`], this is an escape hatch: it does not run
    /// hooks, so it can break the referential consistency associations
    /// maintain.
    pub fn update_all(&self, values: &[(String, Value)], criteria: &Criteria) -> Result<u64> {
        self.with_schema_retry(|| self.inner.store.update(self.table_name(), values, criteria))
    }

    /// Bulk delete, bypassing hooks entirely.
    pub fn delete_all(&self, criteria: &Criteria) -> Result<u64> {
        self.with_schema_retry(|| self.inner.store.delete(self.table_name(), criteria))
    }

    /// Destroy all matching rows with hook dispatch.
    ///
    /// Resolves the matching id set first, then fires every `before-destroy`
    /// hook (ascending id order) strictly before one bulk delete, strictly
    /// before every `after-destroy` hook: a before-hook may still read the
    /// rows the delete is about to remove.
    pub fn destroy_all(&self, criteria: &Criteria) -> Result<u64> {
        let rows = self.with_schema_retry(|| {
            self.inner.store.find(
                self.table_name(),
                criteria,
                &QueryOptions::default().select("id").order("id"),
            )
        })?;
        let ids: Vec<i64> = rows.iter().filter_map(Row::id).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        for id in &ids {
            self.call_hook(BEFORE_DESTROY, &[Value::Int(*id)])?;
        }
        let removed = self.with_schema_retry(|| {
            self.inner.store.delete(
                self.table_name(),
                &Criteria::field("id", Term::In(ids.iter().map(|id| Value::Int(*id)).collect())),
            )
        })?;
        for id in &ids {
            self.call_hook(AFTER_DESTROY, &[Value::Int(*id)])?;
        }
        Ok(removed)
    }

    /// Destroy one row by id with hook dispatch. Used by `Record::destroy`
    /// and by cascade hooks.
    pub(crate) fn destroy_by_id(&self, id: i64) -> Result<()> {
        self.call_hook(BEFORE_DESTROY, &[Value::Int(id)])?;
        self.with_schema_retry(|| self.inner.store.delete(self.table_name(), &Criteria::Id(id)))?;
        self.call_hook(AFTER_DESTROY, &[Value::Int(id)])?;
        Ok(())
    }

    /// Drop the class's table.
    ///
    /// Fires `before-selfdestruct`, drops the table when the metadata probe
    /// says it exists (an already-absent table is tolerated), clears the
    /// column cache, fires `after-selfdestruct`.
    pub fn self_destruct(&self) -> Result<()> {
        self.call_hook(BEFORE_SELFDESTRUCT, &[])?;
        match self.inner.store.column_types(self.table_name()) {
            Ok(_) => self.inner.store.drop_table(self.table_name())?,
            Err(err) if err.is_missing_table() => {
                tracing::debug!(class = %self.name(), "table already gone, skipping drop");
            }
            Err(err) => return Err(err),
        }
        self.invalidate_columns();
        self.call_hook(AFTER_SELFDESTRUCT, &[])
    }

    /// Run `f` inside a store transaction: commit on success, roll back and
    /// re-surface the error on failure. Nested calls are unsupported.
    pub fn transaction_do<F>(&self, f: F) -> Result<()>
    where
        F: FnMut() -> Result<()>,
    {
        let mut f = f;
        self.inner.store.transaction_do(&mut f)
    }

    pub(crate) fn association(&self, name: &str) -> Option<Association> {
        self.inner
            .associations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub(crate) fn put_association(&self, name: String, association: Association) {
        self.inner
            .associations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, association);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Person"), "person");
        assert_eq!(snake_case("ClubMember"), "club_member");
        assert_eq!(snake_case("plain"), "plain");
    }
}
