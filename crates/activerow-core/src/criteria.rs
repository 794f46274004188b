//! Criteria and query options: the shared query-description types.
//!
//! These types are the input half of the criteria compiler and the vocabulary
//! of the [`Store`](crate::store::Store) contract. They are plain data; all
//! rendering lives in `activerow-query`.

use std::collections::BTreeMap;

use crate::value::Value;

/// One predicate term in a [`Criteria::Fields`] mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Plain equality against a single value.
    Value(Value),
    /// Membership in an ordered collection. A single-element collection
    /// compiles to plain equality; an empty one is a conversion error.
    In(Vec<Value>),
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Value(v)
    }
}

impl From<bool> for Term {
    fn from(v: bool) -> Self {
        Term::Value(Value::Bool(v))
    }
}

impl From<i32> for Term {
    fn from(v: i32) -> Self {
        Term::Value(Value::Int(i64::from(v)))
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        Term::Value(Value::Int(v))
    }
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Term::Value(Value::Float(v))
    }
}

impl From<&str> for Term {
    fn from(v: &str) -> Self {
        Term::Value(Value::Text(v.to_string()))
    }
}

impl From<String> for Term {
    fn from(v: String) -> Self {
        Term::Value(Value::Text(v))
    }
}

/// A collection converts to a membership predicate.
impl From<Vec<Value>> for Term {
    fn from(values: Vec<Value>) -> Self {
        Term::In(values)
    }
}

/// A row-selection predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Criteria {
    /// No predicate; matches every row.
    #[default]
    All,
    /// Shorthand for `id = value`.
    Id(i64),
    /// A raw predicate string, passed through verbatim.
    Raw(String),
    /// AND of equality/membership predicates, emitted in key order.
    Fields(BTreeMap<String, Term>),
}

impl Criteria {
    /// Predicate on a single attribute.
    pub fn field(name: impl Into<String>, term: impl Into<Term>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(name.into(), term.into());
        Criteria::Fields(map)
    }

    /// Predicate from several attribute terms.
    pub fn fields<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Term>,
    {
        Criteria::Fields(
            entries
                .into_iter()
                .map(|(k, t)| (k.into(), t.into()))
                .collect(),
        )
    }

    /// Verbatim predicate string.
    pub fn raw(predicate: impl Into<String>) -> Self {
        Criteria::Raw(predicate.into())
    }

    /// Add another attribute term to a `Fields` predicate. Any other
    /// variant is first converted: `All` becomes an empty mapping, `Id`
    /// becomes an `id` term, `Raw` is left untouched (raw predicates do
    /// not compose).
    #[must_use]
    pub fn and_field(self, name: impl Into<String>, term: impl Into<Term>) -> Self {
        let mut map = match self {
            Criteria::Fields(map) => map,
            Criteria::All => BTreeMap::new(),
            Criteria::Id(id) => {
                let mut map = BTreeMap::new();
                map.insert("id".to_string(), Term::Value(Value::Int(id)));
                map
            }
            raw @ Criteria::Raw(_) => return raw,
        };
        map.insert(name.into(), term.into());
        Criteria::Fields(map)
    }
}

/// A join clause: target table plus local-column → foreign-column pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Table being joined in.
    pub table: String,
    /// Equality pairs for the `ON` clause; must be non-empty.
    pub on: Vec<(String, String)>,
}

impl Join {
    /// Create a join on the given column pairs.
    pub fn new<I, L, R>(table: impl Into<String>, on: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        Self {
            table: table.into(),
            on: on.into_iter().map(|(l, r)| (l.into(), r.into())).collect(),
        }
    }
}

/// Options shaping the non-WHERE clauses of a select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Select list; defaults to `*`.
    pub select: Option<String>,
    /// From clause; defaults to the queried table. Supports pre-aliased
    /// from clauses for joins.
    pub from: Option<String>,
    /// Optional join clause.
    pub join: Option<Join>,
    /// Verbatim ORDER BY body.
    pub order: Option<String>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Row offset; only emitted when `limit` is present.
    pub offset: Option<u64>,
}

impl QueryOptions {
    /// Set the select list.
    #[must_use]
    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    /// Set the from clause.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the join clause.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.join = Some(join);
        self
    }

    /// Set the ORDER BY body.
    #[must_use]
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Set the row limit.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset (ignored unless a limit is set too).
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}
