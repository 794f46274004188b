//! Declarative relationships between classes.
//!
//! All five kinds share one pattern: place an integer foreign-key attribute
//! on one side, record a traversal descriptor under the association's
//! attribute name, and register destroy hooks that keep references
//! consistent — either by clearing foreign keys to the integer sentinel
//! [`NO_REFERENCE`] (nullify) or by destroying dependents (cascade). The
//! lifecycle code never sees any of this; it only fires hooks.
//!
//! The sentinel is `0`, deliberately distinct from SQL NULL: getters treat
//! it as "no reference" and nullify writes it, so a cleared foreign key
//! always reads back as an integer.

use activerow_core::{AttrType, Criteria, Error, Join, QueryOptions, Result, Value};

use crate::class::{Class, snake_case};
use crate::hooks::{AFTER_SELFDESTRUCT, BEFORE_DESTROY};
use crate::record::Record;

/// The integer foreign-key sentinel meaning "no reference".
pub const NO_REFERENCE: i64 = 0;

/// What happens to dependents when the referenced row is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dependency {
    /// Clear dependents' foreign keys to the sentinel `0`.
    #[default]
    Nullify,
    /// Destroy dependents too, running their own hooks.
    Destroy,
}

/// Declaration-time configuration for one association.
#[derive(Debug, Clone, Default)]
pub struct AssociationOptions {
    /// Override the foreign-key column name derived from the class names.
    pub foreign_key: Option<String>,
    /// Override the traversal attribute name derived from the target name.
    pub attribute: Option<String>,
    /// Dependency policy, read once at declaration time.
    pub dependency: Dependency,
}

impl AssociationOptions {
    /// Defaults: derived names, nullify policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the foreign-key column name.
    #[must_use]
    pub fn foreign_key(mut self, name: impl Into<String>) -> Self {
        self.foreign_key = Some(name.into());
        self
    }

    /// Override the traversal attribute name.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }

    /// Select the dependency policy.
    #[must_use]
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependency = dependency;
        self
    }
}

#[derive(Clone)]
pub(crate) enum AssociationKind {
    BelongsTo,
    HasOne,
    HoldsOne,
    HasMany,
    HasAndBelongsToMany,
}

/// A registered association, looked up by attribute name at traversal time.
#[derive(Clone)]
pub(crate) struct Association {
    pub(crate) kind: AssociationKind,
    pub(crate) target: Class,
    pub(crate) foreign_key: String,
    pub(crate) dependency: Dependency,
    /// Join bookkeeping, present only for many-to-many.
    pub(crate) join: Option<JoinTable>,
}

#[derive(Clone)]
pub(crate) struct JoinTable {
    pub(crate) class: Class,
    pub(crate) own_key: String,
    pub(crate) target_key: String,
}

/// Join table name for a many-to-many pair: endpoint class names in fixed
/// lexicographic order, so both declaring directions agree.
fn join_table_name(a: &str, b: &str) -> String {
    let mut names = [a, b];
    names.sort_unstable();
    format!("{}_{}", snake_case(names[0]), snake_case(names[1]))
}

/// Synthesized join class name for the same pair.
fn join_class_name(a: &str, b: &str) -> String {
    let mut names = [a, b];
    names.sort_unstable();
    format!("{}{}", names[0], names[1])
}

/// Register the shared "on host destroy, fix dependents" hook: rows of
/// `dependents` whose `foreign_key` matches the destroyed id are nullified
/// or cascade-destroyed.
///
/// The nullify hook captures only the dependents' store handle and names;
/// the cascade hook needs the dependents' hook lists and captures the class
/// weakly, so an association never keeps a dropped class alive (hooks are
/// scoped to class lifetime).
fn register_dependents_hook(host: &Class, dependents: &Class, foreign_key: &str, dependency: Dependency) {
    match dependency {
        Dependency::Nullify => {
            let store = dependents.store();
            let table = dependents.table_name().to_string();
            let fk = foreign_key.to_string();
            host.add_hook(BEFORE_DESTROY, move |args| {
                let Some(id) = args.first().and_then(Value::as_int) else {
                    return Ok(());
                };
                store.update(
                    &table,
                    &[(fk.clone(), Value::Int(NO_REFERENCE))],
                    &Criteria::field(fk.clone(), id),
                )?;
                Ok(())
            });
        }
        Dependency::Destroy => {
            let dependents = dependents.downgrade();
            let fk = foreign_key.to_string();
            host.add_hook(BEFORE_DESTROY, move |args| {
                let Some(id) = args.first().and_then(Value::as_int) else {
                    return Ok(());
                };
                let Some(inner) = dependents.upgrade() else {
                    return Ok(());
                };
                Class::from_inner(inner).destroy_all(&Criteria::field(fk.clone(), id))?;
                Ok(())
            });
        }
    }
}

impl Class {
    /// Declare that each record of this class references one record of
    /// `target` through a foreign key on **this** class.
    ///
    /// On target destroy, dependents here are nullified or destroyed per
    /// the policy.
    pub fn belongs_to(&self, target: &Class, options: AssociationOptions) -> Result<()> {
        let foreign_key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", snake_case(target.name())));
        let attribute = options
            .attribute
            .unwrap_or_else(|| snake_case(target.name()));
        self.add_attribute(&foreign_key, AttrType::Integer)?;

        register_dependents_hook(target, self, &foreign_key, options.dependency);

        tracing::debug!(class = %self.name(), target = %target.name(), attribute = %attribute, "belongs_to");
        self.put_association(
            attribute,
            Association {
                kind: AssociationKind::BelongsTo,
                target: target.clone(),
                foreign_key,
                dependency: options.dependency,
                join: None,
            },
        );
        Ok(())
    }

    /// Declare that each record of this class owns at most one record of
    /// `target`, through a foreign key on the **target** class.
    ///
    /// On self destroy, the dependent target row is nullified or destroyed
    /// per the policy.
    pub fn has_one(&self, target: &Class, options: AssociationOptions) -> Result<()> {
        let foreign_key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", snake_case(self.name())));
        let attribute = options
            .attribute
            .unwrap_or_else(|| snake_case(target.name()));
        target.add_attribute(&foreign_key, AttrType::Integer)?;

        register_dependents_hook(self, target, &foreign_key, options.dependency);

        tracing::debug!(class = %self.name(), target = %target.name(), attribute = %attribute, "has_one");
        self.put_association(
            attribute,
            Association {
                kind: AssociationKind::HasOne,
                target: target.clone(),
                foreign_key,
                dependency: options.dependency,
                join: None,
            },
        );
        Ok(())
    }

    /// Declare that each record of this class holds a reference to one
    /// record of `target` through a foreign key on **this** class, with
    /// has-one-style destroy behavior.
    ///
    /// Getter and setter work like `belongs_to`, except the sentinel `0`
    /// reads as "no reference" and, under the destroy policy, reassignment
    /// destroys the previously held target. On self destroy the held target
    /// is destroyed under the destroy policy; on target destroy, holders'
    /// foreign keys are always nullified regardless of policy.
    pub fn holds_one(&self, target: &Class, options: AssociationOptions) -> Result<()> {
        let foreign_key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", snake_case(target.name())));
        let attribute = options
            .attribute
            .unwrap_or_else(|| snake_case(target.name()));
        self.add_attribute(&foreign_key, AttrType::Integer)?;

        if options.dependency == Dependency::Destroy {
            // The destroyed record's row must be read before the delete
            // removes it, so this runs as a before-destroy hook.
            let own_store = self.store();
            let own_table = self.table_name().to_string();
            let fk = foreign_key.clone();
            let held = target.downgrade();
            self.add_hook(BEFORE_DESTROY, move |args| {
                let Some(id) = args.first().and_then(Value::as_int) else {
                    return Ok(());
                };
                let Some(inner) = held.upgrade() else {
                    return Ok(());
                };
                let row =
                    own_store.first(&own_table, &Criteria::Id(id), &QueryOptions::default())?;
                let Some(row) = row else {
                    return Ok(());
                };
                let held_id = row.get(&fk).and_then(Value::as_int).unwrap_or(NO_REFERENCE);
                if held_id != NO_REFERENCE {
                    Class::from_inner(inner).destroy_all(&Criteria::Id(held_id))?;
                }
                Ok(())
            });
        }

        // Holders are always nullified when the held row goes away.
        {
            let store = self.store();
            let table = self.table_name().to_string();
            let fk = foreign_key.clone();
            target.add_hook(BEFORE_DESTROY, move |args| {
                let Some(id) = args.first().and_then(Value::as_int) else {
                    return Ok(());
                };
                store.update(
                    &table,
                    &[(fk.clone(), Value::Int(NO_REFERENCE))],
                    &Criteria::field(fk.clone(), id),
                )?;
                Ok(())
            });
        }

        tracing::debug!(class = %self.name(), target = %target.name(), attribute = %attribute, "holds_one");
        self.put_association(
            attribute,
            Association {
                kind: AssociationKind::HoldsOne,
                target: target.clone(),
                foreign_key,
                dependency: options.dependency,
                join: None,
            },
        );
        Ok(())
    }

    /// Declare that each record of this class owns many records of
    /// `target`, through a foreign key on the **target** class.
    pub fn has_many(&self, target: &Class, options: AssociationOptions) -> Result<()> {
        let foreign_key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", snake_case(self.name())));
        let attribute = options
            .attribute
            .unwrap_or_else(|| format!("{}s", snake_case(target.name())));
        target.add_attribute(&foreign_key, AttrType::Integer)?;

        register_dependents_hook(self, target, &foreign_key, options.dependency);

        tracing::debug!(class = %self.name(), target = %target.name(), attribute = %attribute, "has_many");
        self.put_association(
            attribute,
            Association {
                kind: AssociationKind::HasMany,
                target: target.clone(),
                foreign_key,
                dependency: options.dependency,
                join: None,
            },
        );
        Ok(())
    }

    /// Declare a many-to-many relationship through a synthesized join
    /// class.
    ///
    /// The join table holds two integer foreign keys and is named from the
    /// endpoint class names in fixed lexicographic order, so declaring the
    /// relationship from either side lands on the same table. Destroying a
    /// row here deletes its join rows (never the far side; the `dependency`
    /// option is accepted but has no effect). When either endpoint class is
    /// `self_destruct`ed, the join table is dropped too.
    pub fn has_and_belongs_to_many(
        &self,
        target: &Class,
        options: AssociationOptions,
    ) -> Result<()> {
        let attribute = options
            .attribute
            .unwrap_or_else(|| format!("{}s", snake_case(target.name())));
        let own_key = format!("{}_id", snake_case(self.name()));
        let target_key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", snake_case(target.name())));

        let join_class = Class::define(join_class_name(self.name(), target.name()))
            .table_name(join_table_name(self.name(), target.name()))
            .attribute(own_key.clone(), AttrType::Integer)
            .attribute(target_key.clone(), AttrType::Integer)
            .store(self.store())
            .register()?;

        // Row-level cleanup: a destroyed record takes its join rows along.
        {
            let store = join_class.store();
            let table = join_class.table_name().to_string();
            let key = own_key.clone();
            self.add_hook(BEFORE_DESTROY, move |args| {
                let Some(id) = args.first().and_then(Value::as_int) else {
                    return Ok(());
                };
                store.delete(&table, &Criteria::field(key.clone(), id))?;
                Ok(())
            });
        }

        // Schema-level cleanup: the join table dies with either endpoint.
        for endpoint in [self, target] {
            let store = join_class.store();
            let table = join_class.table_name().to_string();
            endpoint.add_hook(AFTER_SELFDESTRUCT, move |_args| {
                match store.column_types(&table) {
                    Ok(_) => {
                        store.drop_table(&table)?;
                        Ok(())
                    }
                    Err(err) if err.is_missing_table() => Ok(()),
                    Err(err) => Err(err),
                }
            });
        }

        tracing::debug!(
            class = %self.name(),
            target = %target.name(),
            join_table = %join_class.table_name(),
            attribute = %attribute,
            "has_and_belongs_to_many"
        );
        self.put_association(
            attribute,
            Association {
                kind: AssociationKind::HasAndBelongsToMany,
                target: target.clone(),
                foreign_key: own_key.clone(),
                dependency: options.dependency,
                join: Some(JoinTable {
                    class: join_class,
                    own_key,
                    target_key,
                }),
            },
        );
        Ok(())
    }
}

fn require_id(record: &Record) -> Result<i64> {
    record.id().ok_or_else(|| {
        Error::configuration(format!(
            "record of class `{}` must be saved before it can be referenced",
            record.class().name()
        ))
    })
}

impl Record {
    fn association(&self, name: &str) -> Result<Association> {
        self.class()
            .association(name)
            .ok_or_else(|| Error::unknown_attribute(self.class().name(), name))
    }

    /// Traverse a single-record association (`belongs_to`, `has_one`,
    /// `holds_one`).
    pub fn related(&self, name: &str) -> Result<Option<Record>> {
        let assoc = self.association(name)?;
        match assoc.kind {
            AssociationKind::BelongsTo => match self.get(&assoc.foreign_key)?.as_int() {
                Some(fk) => assoc.target.first(&Criteria::Id(fk), &QueryOptions::default()),
                None => Ok(None),
            },
            AssociationKind::HoldsOne => {
                let fk = self
                    .get(&assoc.foreign_key)?
                    .as_int()
                    .unwrap_or(NO_REFERENCE);
                if fk == NO_REFERENCE {
                    Ok(None)
                } else {
                    assoc.target.first(&Criteria::Id(fk), &QueryOptions::default())
                }
            }
            AssociationKind::HasOne => {
                let Some(id) = self.id() else {
                    return Ok(None);
                };
                assoc.target.first(
                    &Criteria::field(assoc.foreign_key.clone(), id),
                    &QueryOptions::default(),
                )
            }
            _ => Err(Error::configuration(format!(
                "association `{name}` is a collection; use related_all"
            ))),
        }
    }

    /// Traverse a collection association (`has_many`,
    /// `has_and_belongs_to_many`).
    pub fn related_all(&self, name: &str) -> Result<Vec<Record>> {
        let assoc = self.association(name)?;
        match assoc.kind {
            AssociationKind::HasMany => {
                let Some(id) = self.id() else {
                    return Ok(Vec::new());
                };
                assoc.target.find(
                    &Criteria::field(assoc.foreign_key.clone(), id),
                    &QueryOptions::default(),
                )
            }
            AssociationKind::HasAndBelongsToMany => {
                let Some(id) = self.id() else {
                    return Ok(Vec::new());
                };
                let join = assoc
                    .join
                    .as_ref()
                    .ok_or_else(|| Error::configuration("many-to-many without join table"))?;
                let target_table = assoc.target.table_name().to_string();
                let join_table = join.class.table_name().to_string();
                let options = QueryOptions::default()
                    .select(format!("{target_table}.*"))
                    .join(Join::new(
                        join_table.clone(),
                        [(
                            format!("{target_table}.id"),
                            format!("{join_table}.{}", join.target_key),
                        )],
                    ));
                let criteria = Criteria::field(format!("{join_table}.{}", join.own_key), id);
                assoc.target.find(&criteria, &options)
            }
            _ => Err(Error::configuration(format!(
                "association `{name}` is single-record; use related"
            ))),
        }
    }

    /// Point a single-record association at `target`.
    ///
    /// `belongs_to` and `holds_one` write this record's foreign key (locally,
    /// no autosave); `has_one` writes the target's foreign key in the store,
    /// first nullifying or destroying a different previous target per the
    /// policy.
    pub fn set_related(&mut self, name: &str, target: &Record) -> Result<()> {
        let assoc = self.association(name)?;
        match assoc.kind {
            AssociationKind::BelongsTo => {
                let tid = require_id(target)?;
                self.set(&assoc.foreign_key, tid)
            }
            AssociationKind::HoldsOne => {
                let tid = require_id(target)?;
                let old = self
                    .get(&assoc.foreign_key)?
                    .as_int()
                    .unwrap_or(NO_REFERENCE);
                if assoc.dependency == Dependency::Destroy && old != NO_REFERENCE && old != tid {
                    assoc.target.destroy_all(&Criteria::Id(old))?;
                }
                self.set(&assoc.foreign_key, tid)
            }
            AssociationKind::HasOne => {
                let tid = require_id(target)?;
                let sid = require_id(self)?;
                let fk = assoc.foreign_key.clone();
                let previous = assoc
                    .target
                    .first(&Criteria::field(fk.clone(), sid), &QueryOptions::default())?;
                if let Some(mut prev) = previous {
                    if let Some(pid) = prev.id() {
                        if pid != tid {
                            match assoc.dependency {
                                Dependency::Nullify => {
                                    assoc.target.update_all(
                                        &[(fk.clone(), Value::Int(NO_REFERENCE))],
                                        &Criteria::Id(pid),
                                    )?;
                                }
                                Dependency::Destroy => prev.destroy()?,
                            }
                        }
                    }
                }
                assoc
                    .target
                    .update_all(&[(fk, Value::Int(sid))], &Criteria::Id(tid))?;
                Ok(())
            }
            _ => Err(Error::configuration(format!(
                "association `{name}` is a collection; use add_related"
            ))),
        }
    }

    /// Add `target` to a collection association.
    ///
    /// `has_many` points the target's foreign key at this record (single
    /// record, no existence check). `has_and_belongs_to_many` inserts a join
    /// row only when the identical pair is not already present.
    pub fn add_related(&self, name: &str, target: &Record) -> Result<()> {
        let assoc = self.association(name)?;
        match assoc.kind {
            AssociationKind::HasMany => {
                let tid = require_id(target)?;
                let sid = require_id(self)?;
                assoc.target.update_all(
                    &[(assoc.foreign_key.clone(), Value::Int(sid))],
                    &Criteria::Id(tid),
                )?;
                Ok(())
            }
            AssociationKind::HasAndBelongsToMany => {
                let tid = require_id(target)?;
                let sid = require_id(self)?;
                let join = assoc
                    .join
                    .as_ref()
                    .ok_or_else(|| Error::configuration("many-to-many without join table"))?;
                let pair = Criteria::fields([
                    (join.own_key.clone(), Value::Int(sid)),
                    (join.target_key.clone(), Value::Int(tid)),
                ]);
                if join.class.count(&pair)? == 0 {
                    join.class.create([
                        (join.own_key.clone(), Value::Int(sid)),
                        (join.target_key.clone(), Value::Int(tid)),
                    ])?;
                }
                Ok(())
            }
            _ => Err(Error::configuration(format!(
                "association `{name}` is single-record; use set_related"
            ))),
        }
    }
}
