//! Class registration and schema reconciliation against the SQLite adapter.

use std::sync::{Arc, Mutex};

use activerow::prelude::*;
use activerow::{AFTER_SELFDESTRUCT, BEFORE_SELFDESTRUCT};
use activerow_sqlite::SqliteStore;

fn mem() -> Arc<dyn Store> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

#[test]
fn register_creates_table_with_implicit_id() {
    let store = mem();
    let doc = Class::define("Document")
        .attribute("title", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap();

    assert_eq!(doc.table_name(), "document");
    let columns = store.column_types("document").unwrap();
    assert_eq!(columns["id"], AttrType::PrimaryKey);
    assert_eq!(columns["title"], AttrType::String);
}

#[test]
fn register_requires_a_name_and_a_store() {
    let err = Class::define("").store(mem()).register().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");

    let err = Class::define("Nameless").register().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");
}

#[test]
fn reregistration_tolerates_existing_table_and_adds_columns() {
    let store = mem();
    let first = Class::define("Document")
        .attribute("title", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap();
    first.create([("title", Value::from("draft"))]).unwrap();

    // Second registration: same table, one more attribute.
    let second = Class::define("Document")
        .attribute("title", AttrType::String)
        .attribute("pages", AttrType::Integer)
        .store(store.clone())
        .register()
        .unwrap();

    let columns = store.column_types("document").unwrap();
    assert_eq!(columns["pages"], AttrType::Integer);

    // Data written through the first registration is still there.
    assert_eq!(second.count(&Criteria::All).unwrap(), 1);
}

#[test]
fn redeclaration_with_conflicting_type_fails() {
    let store = mem();
    Class::define("Document")
        .attribute("size", AttrType::Integer)
        .store(store.clone())
        .register()
        .unwrap();

    let err = Class::define("Document")
        .attribute("size", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");
}

#[test]
fn table_name_override_is_honored() {
    let store = mem();
    let doc = Class::define("Document")
        .table_name("docs")
        .attribute("title", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap();

    assert_eq!(doc.table_name(), "docs");
    assert!(store.column_types("docs").is_ok());
    assert!(store.column_types("document").unwrap_err().is_missing_table());
}

#[test]
fn inherits_copies_parent_attributes() {
    let store = mem();
    let person = Class::define("Person")
        .attribute("name", AttrType::String)
        .attribute("age", AttrType::Integer)
        .store(store.clone())
        .register()
        .unwrap();

    let employee = Class::define("Employee")
        .inherits(&person)
        .attribute("salary", AttrType::Integer)
        .store(store.clone())
        .register()
        .unwrap();

    let columns = store.column_types("employee").unwrap();
    assert_eq!(columns["name"], AttrType::String);
    assert_eq!(columns["age"], AttrType::Integer);
    assert_eq!(columns["salary"], AttrType::Integer);

    let rec = employee
        .create([("name", Value::from("Ada")), ("salary", Value::from(1000))])
        .unwrap();
    assert_eq!(rec.get("name").unwrap(), Value::Text("Ada".into()));
}

#[test]
fn add_attribute_is_additive_and_validates_types() {
    let store = mem();
    let doc = Class::define("Document")
        .attribute("title", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap();

    doc.add_attribute("pages", AttrType::Integer).unwrap();
    assert_eq!(
        doc.has_attribute("pages").unwrap(),
        Some(AttrType::Integer)
    );

    // Redeclaring an existing column with the same type is fine...
    doc.add_attribute("title", AttrType::String).unwrap();
    // ...but a conflicting type is fatal.
    let err = doc.add_attribute("title", AttrType::Integer).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err:?}");
}

#[test]
fn has_attribute_reports_store_columns() {
    let store = mem();
    let doc = Class::define("Document")
        .attribute("title", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap();

    assert_eq!(doc.has_attribute("title").unwrap(), Some(AttrType::String));
    assert_eq!(doc.has_attribute("id").unwrap(), Some(AttrType::PrimaryKey));
    assert_eq!(doc.has_attribute("missing").unwrap(), None);
}

#[test]
fn self_destruct_drops_table_and_fires_hooks() {
    let store = mem();
    let doc = Class::define("Document")
        .attribute("title", AttrType::String)
        .store(store.clone())
        .register()
        .unwrap();

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let l = log.clone();
    doc.add_hook(BEFORE_SELFDESTRUCT, move |_| {
        l.lock().unwrap().push("before");
        Ok(())
    });
    let l = log.clone();
    doc.add_hook(AFTER_SELFDESTRUCT, move |_| {
        l.lock().unwrap().push("after");
        Ok(())
    });

    doc.self_destruct().unwrap();
    assert!(store.column_types("document").unwrap_err().is_missing_table());
    assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);

    // A second self destruct tolerates the missing table and still fires
    // both hooks.
    doc.self_destruct().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["before", "after", "before", "after"]);
}

#[test]
fn classes_may_use_distinct_stores() {
    let store_a = mem();
    let store_b = mem();

    let a = Class::define("Thing")
        .attribute("name", AttrType::String)
        .store(store_a.clone())
        .register()
        .unwrap();
    let b = Class::define("Thing")
        .attribute("name", AttrType::String)
        .store(store_b.clone())
        .register()
        .unwrap();

    a.create([("name", Value::from("only in a"))]).unwrap();
    assert_eq!(a.count(&Criteria::All).unwrap(), 1);
    assert_eq!(b.count(&Criteria::All).unwrap(), 0);
}
