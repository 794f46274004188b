//! Statement rendering.
//!
//! Pure translation from (table, criteria, options) to SQL text. Clauses are
//! applied in a fixed order — SELECT list, FROM, JOIN, WHERE, ORDER BY,
//! LIMIT/OFFSET — and `Fields` criteria are emitted in key order, so equal
//! inputs always render equal statements.

use activerow_core::{Criteria, Error, QueryOptions, Result, Term, Value};

use crate::Escape;

/// Render a single value as a SQL literal.
///
/// Integers and finite floats render as-is, booleans as 1/0, strings are
/// store-escaped and quoted, byte strings become hex blob literals, and
/// `Null` becomes the NULL keyword. Non-finite floats cannot be represented
/// and fail with a conversion error.
pub fn literal(value: &Value, esc: &dyn Escape) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => {
            if f.is_finite() {
                Ok(f.to_string())
            } else {
                Err(Error::conversion(format!(
                    "cannot render non-finite float {f} as a SQL literal"
                )))
            }
        }
        Value::Text(s) => Ok(format!("'{}'", esc.escape(s))),
        Value::Bytes(b) => {
            let mut hex = String::with_capacity(b.len() * 2 + 3);
            hex.push_str("X'");
            for byte in b {
                hex.push_str(&format!("{byte:02X}"));
            }
            hex.push('\'');
            Ok(hex)
        }
    }
}

/// Render one column predicate from a criteria term.
///
/// `In` collections collapse to plain equality when they hold exactly one
/// value; an empty collection has no SQL representation and is rejected.
fn term_predicate(column: &str, term: &Term, esc: &dyn Escape) -> Result<String> {
    match term {
        Term::Value(v) => Ok(format!("{} = {}", column, literal(v, esc)?)),
        Term::In(values) => match values.as_slice() {
            [] => Err(Error::conversion(format!(
                "empty IN-set for column `{column}`"
            ))),
            [single] => Ok(format!("{} = {}", column, literal(single, esc)?)),
            many => {
                let rendered: Result<Vec<String>> =
                    many.iter().map(|v| literal(v, esc)).collect();
                Ok(format!("{} IN ({})", column, rendered?.join(", ")))
            }
        },
    }
}

/// Render the WHERE clause body for a criteria, or `None` for `All`.
pub fn where_clause(criteria: &Criteria, esc: &dyn Escape) -> Result<Option<String>> {
    match criteria {
        Criteria::All => Ok(None),
        Criteria::Id(id) => Ok(Some(format!("id = {id}"))),
        Criteria::Raw(predicate) => Ok(Some(predicate.clone())),
        Criteria::Fields(map) => {
            let mut parts = Vec::with_capacity(map.len());
            for (column, term) in map {
                parts.push(term_predicate(column, term, esc)?);
            }
            Ok(Some(parts.join(" AND ")))
        }
    }
}

/// Render the JOIN clause, validating that the `on` mapping is non-empty.
fn join_clause(options: &QueryOptions) -> Result<Option<String>> {
    let Some(join) = &options.join else {
        return Ok(None);
    };
    if join.on.is_empty() {
        return Err(Error::configuration(format!(
            "join on `{}` has an empty `on` mapping",
            join.table
        )));
    }
    let pairs: Vec<String> = join
        .on
        .iter()
        .map(|(local, foreign)| format!("{local} = {foreign}"))
        .collect();
    Ok(Some(format!("JOIN {} ON {}", join.table, pairs.join(" AND "))))
}

/// Build a SELECT statement.
pub fn select_sql(
    table: &str,
    criteria: &Criteria,
    options: &QueryOptions,
    esc: &dyn Escape,
) -> Result<String> {
    let select = options.select.as_deref().unwrap_or("*");
    let from = options.from.as_deref().unwrap_or(table);

    let mut sql = format!("SELECT {select} FROM {from}");
    if let Some(join) = join_clause(options)? {
        sql.push(' ');
        sql.push_str(&join);
    }
    if let Some(body) = where_clause(criteria, esc)? {
        sql.push_str(" WHERE ");
        sql.push_str(&body);
    }
    if let Some(order) = &options.order {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = options.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    tracing::debug!(sql = %sql, "built select");
    Ok(sql)
}

/// Build a `SELECT COUNT(*)` statement. Order and limit do not apply to a
/// cardinality query and are ignored.
pub fn count_sql(
    table: &str,
    criteria: &Criteria,
    options: &QueryOptions,
    esc: &dyn Escape,
) -> Result<String> {
    let from = options.from.as_deref().unwrap_or(table);

    let mut sql = format!("SELECT COUNT(*) FROM {from}");
    if let Some(join) = join_clause(options)? {
        sql.push(' ');
        sql.push_str(&join);
    }
    if let Some(body) = where_clause(criteria, esc)? {
        sql.push_str(" WHERE ");
        sql.push_str(&body);
    }
    Ok(sql)
}

/// Build an INSERT statement. A row with no known columns still inserts
/// (the primary key is store-assigned), rendered as DEFAULT VALUES.
pub fn insert_sql(table: &str, values: &[(String, Value)], esc: &dyn Escape) -> Result<String> {
    if values.is_empty() {
        let sql = format!("INSERT INTO {table} DEFAULT VALUES");
        tracing::debug!(sql = %sql, "built insert");
        return Ok(sql);
    }

    let columns: Vec<&str> = values.iter().map(|(name, _)| name.as_str()).collect();
    let rendered: Result<Vec<String>> = values.iter().map(|(_, v)| literal(v, esc)).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        rendered?.join(", ")
    );
    tracing::debug!(sql = %sql, "built insert");
    Ok(sql)
}

/// Build an UPDATE statement.
pub fn update_sql(
    table: &str,
    values: &[(String, Value)],
    criteria: &Criteria,
    esc: &dyn Escape,
) -> Result<String> {
    let mut sets = Vec::with_capacity(values.len());
    for (column, value) in values {
        sets.push(format!("{} = {}", column, literal(value, esc)?));
    }

    let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
    if let Some(body) = where_clause(criteria, esc)? {
        sql.push_str(" WHERE ");
        sql.push_str(&body);
    }
    tracing::debug!(sql = %sql, "built update");
    Ok(sql)
}

/// Build a DELETE statement.
pub fn delete_sql(table: &str, criteria: &Criteria, esc: &dyn Escape) -> Result<String> {
    let mut sql = format!("DELETE FROM {table}");
    if let Some(body) = where_clause(criteria, esc)? {
        sql.push_str(" WHERE ");
        sql.push_str(&body);
    }
    tracing::debug!(sql = %sql, "built delete");
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use activerow_core::Join;

    /// Doubles single quotes, SQLite style.
    struct Quoter;

    impl Escape for Quoter {
        fn escape(&self, s: &str) -> String {
            s.replace('\'', "''")
        }
    }

    fn q() -> Quoter {
        Quoter
    }

    #[test]
    fn test_select_defaults() {
        let sql = select_sql("people", &Criteria::All, &QueryOptions::default(), &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people");
    }

    #[test]
    fn test_select_id_shorthand() {
        let sql = select_sql("people", &Criteria::Id(7), &QueryOptions::default(), &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE id = 7");
    }

    #[test]
    fn test_select_raw_passthrough() {
        let sql = select_sql(
            "people",
            &Criteria::raw("age > 21"),
            &QueryOptions::default(),
            &q(),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE age > 21");
    }

    #[test]
    fn test_fields_emitted_in_key_order() {
        let criteria = Criteria::field("name", "Ada").and_field("age", 36);
        let sql = select_sql("people", &criteria, &QueryOptions::default(), &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE age = 36 AND name = 'Ada'");
    }

    #[test]
    fn test_in_set_compilation() {
        let single = Criteria::field("age", Term::In(vec![Value::Int(21)]));
        let sql = select_sql("people", &single, &QueryOptions::default(), &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE age = 21");

        let many = Criteria::field(
            "age",
            Term::In(vec![Value::Int(21), Value::Int(22), Value::Int(23)]),
        );
        let sql = select_sql("people", &many, &QueryOptions::default(), &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE age IN (21, 22, 23)");
    }

    #[test]
    fn test_empty_in_set_rejected() {
        let empty = Criteria::field("age", Term::In(vec![]));
        let err = select_sql("people", &empty, &QueryOptions::default(), &q()).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)), "{err:?}");
    }

    #[test]
    fn test_clause_order_with_all_options() {
        let options = QueryOptions::default()
            .select("people.*")
            .from("people")
            .join(Join::new("memberships", [("people.id", "memberships.person_id")]))
            .order("people.id")
            .limit(10)
            .offset(20);
        let sql = select_sql(
            "people",
            &Criteria::field("memberships.club_id", 3),
            &options,
            &q(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT people.* FROM people \
             JOIN memberships ON people.id = memberships.person_id \
             WHERE memberships.club_id = 3 \
             ORDER BY people.id LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_offset_requires_limit() {
        let options = QueryOptions::default().offset(20);
        let sql = select_sql("people", &Criteria::All, &options, &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people");
    }

    #[test]
    fn test_join_without_on_rejected() {
        let options = QueryOptions::default().join(Join {
            table: "memberships".into(),
            on: vec![],
        });
        let err = select_sql("people", &Criteria::All, &options, &q()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err:?}");
    }

    #[test]
    fn test_string_literal_escaped() {
        let criteria = Criteria::field("name", "O'Hara");
        let sql = select_sql("people", &criteria, &QueryOptions::default(), &q()).unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE name = 'O''Hara'");
    }

    #[test]
    fn test_null_and_bool_literals() {
        assert_eq!(literal(&Value::Null, &q()).unwrap(), "NULL");
        assert_eq!(literal(&Value::Bool(true), &q()).unwrap(), "1");
        assert_eq!(literal(&Value::Bool(false), &q()).unwrap(), "0");
    }

    #[test]
    fn test_bytes_render_as_hex_blob() {
        assert_eq!(
            literal(&Value::Bytes(vec![0xDE, 0xAD]), &q()).unwrap(),
            "X'DEAD'"
        );
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = literal(&Value::Float(f64::NAN), &q()).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)), "{err:?}");
    }

    #[test]
    fn test_insert_sql() {
        let values = vec![
            ("name".to_string(), Value::Text("Ada".into())),
            ("age".to_string(), Value::Int(36)),
        ];
        let sql = insert_sql("people", &values, &q()).unwrap();
        assert_eq!(sql, "INSERT INTO people (name, age) VALUES ('Ada', 36)");
    }

    #[test]
    fn test_update_sql() {
        let values = vec![("age".to_string(), Value::Int(37))];
        let sql = update_sql("people", &values, &Criteria::Id(1), &q()).unwrap();
        assert_eq!(sql, "UPDATE people SET age = 37 WHERE id = 1");
    }

    #[test]
    fn test_delete_sql_bulk_ids() {
        let criteria = Criteria::field(
            "id",
            Term::In(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );
        let sql = delete_sql("people", &criteria, &q()).unwrap();
        assert_eq!(sql, "DELETE FROM people WHERE id IN (1, 2, 3)");
    }

    #[test]
    fn test_count_sql_ignores_order_and_limit() {
        let options = QueryOptions::default().order("id").limit(5);
        let sql = count_sql("people", &Criteria::All, &options, &q()).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM people");
    }
}
