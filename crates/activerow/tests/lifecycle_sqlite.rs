//! Record lifecycle against the SQLite adapter: round-trips, dirty
//! tracking, destroy semantics, bulk operations, transactions.

use std::sync::{Arc, Mutex};

use activerow::prelude::*;
use activerow::{BEFORE_DESTROY, Record};
use activerow_sqlite::SqliteStore;

fn mem() -> Arc<dyn Store> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

fn people(store: &Arc<dyn Store>) -> Class {
    Class::define("Person")
        .attribute("name", AttrType::String)
        .attribute("age", AttrType::Integer)
        .store(store.clone())
        .register()
        .expect("register Person")
}

#[test]
fn create_then_first_round_trips_attributes() {
    let store = mem();
    let person = people(&store);

    let ada = person
        .create([("name", Value::from("Ada")), ("age", Value::from(36))])
        .unwrap();
    let id = ada.id().expect("assigned id");

    let found = person
        .first(&Criteria::Id(id), &QueryOptions::default())
        .unwrap()
        .expect("row exists");
    assert_eq!(found.get("name").unwrap(), Value::Text("Ada".into()));
    assert_eq!(found.get("age").unwrap(), Value::Int(36));
}

#[test]
fn dirty_tracking_across_save() {
    let store = mem();
    let person = people(&store);

    let mut ada = person.new_record([("name", Value::from("Ada"))]);
    assert!(ada.is_dirty());
    assert!(!ada.is_created());

    ada.save().unwrap();
    assert!(!ada.is_dirty());
    assert!(ada.is_created());

    ada.set("age", 37).unwrap();
    assert!(ada.is_dirty());
    ada.save().unwrap();
    assert!(!ada.is_dirty());

    let found = person
        .first(&Criteria::Id(ada.id().unwrap()), &QueryOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(found.get("age").unwrap(), Value::Int(37));
}

#[test]
fn unknown_local_keys_survive_save_in_memory_only() {
    let store = mem();
    let person = people(&store);

    let mut ada = person.new_record([
        ("name", Value::from("Ada")),
        ("nickname", Value::from("The Countess")),
    ]);
    ada.save().unwrap();

    // The unknown key was not written, but stays readable on the instance.
    assert_eq!(
        ada.get("nickname").unwrap(),
        Value::Text("The Countess".into())
    );
    assert!(ada.is_dirty());

    let found = person
        .first(&Criteria::Id(ada.id().unwrap()), &QueryOptions::default())
        .unwrap()
        .unwrap();
    assert!(found.get("nickname").is_err());
}

#[test]
fn get_and_set_reject_undeclared_attributes() {
    let store = mem();
    let person = people(&store);

    let mut ada = person.new_record([("name", Value::from("Ada"))]);
    assert!(matches!(
        ada.get("shoe_size"),
        Err(Error::UnknownAttribute(_))
    ));
    assert!(matches!(
        ada.set("shoe_size", 43),
        Err(Error::UnknownAttribute(_))
    ));
    // Declared but unset reads as Null.
    assert_eq!(ada.get("age").unwrap(), Value::Null);
}

#[test]
fn primary_key_is_immutable_once_assigned() {
    let store = mem();
    let person = people(&store);

    let mut ada = person.create([("name", Value::from("Ada"))]).unwrap();
    assert!(matches!(ada.set("id", 99), Err(Error::Configuration(_))));
}

#[test]
fn destroy_is_idempotent_and_freezes() {
    let store = mem();
    let person = people(&store);

    let deletes = Arc::new(Mutex::new(0));
    let counter = deletes.clone();
    person.add_hook(BEFORE_DESTROY, move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    let mut ada = person.create([("name", Value::from("Ada"))]).unwrap();
    ada.destroy().unwrap();
    assert!(ada.is_frozen());
    assert_eq!(person.count(&Criteria::All).unwrap(), 0);

    // Second destroy: no second delete attempt, no error.
    ada.destroy().unwrap();
    assert_eq!(*deletes.lock().unwrap(), 1);
}

#[test]
fn frozen_record_rejects_mutation_and_save() {
    let store = mem();
    let person = people(&store);

    let mut ada = person.create([("name", Value::from("Ada"))]).unwrap();
    ada.freeze();

    assert!(matches!(ada.set("age", 1), Err(Error::FrozenObject(_))));
    assert!(matches!(ada.save(), Err(Error::FrozenObject(_))));

    // The persisted row is unaffected.
    assert_eq!(person.count(&Criteria::All).unwrap(), 1);
}

#[test]
fn refresh_reloads_and_reports_missing_rows() {
    let store = mem();
    let person = people(&store);

    let mut ada = person
        .create([("name", Value::from("Ada")), ("age", Value::from(36))])
        .unwrap();
    let id = ada.id().unwrap();

    // Change the row out from under the instance.
    person
        .update_all(&[("age".to_string(), Value::Int(40))], &Criteria::Id(id))
        .unwrap();
    ada.set("name", "scratch").unwrap();

    assert!(ada.refresh().unwrap());
    assert_eq!(ada.get("age").unwrap(), Value::Int(40));
    // Uncommitted mutations were discarded by the reload.
    assert_eq!(ada.get("name").unwrap(), Value::Text("Ada".into()));

    person.delete_all(&Criteria::Id(id)).unwrap();
    assert!(!ada.refresh().unwrap());

    // A never-saved record reports missing without querying.
    let mut ghost = person.new_record([("name", Value::from("Ghost"))]);
    assert!(!ghost.refresh().unwrap());
}

#[test]
fn is_present_rechecks_the_store() {
    let store = mem();
    let person = people(&store);

    let ada = person.create([("name", Value::from("Ada"))]).unwrap();
    assert!(ada.is_present().unwrap());

    person.delete_all(&Criteria::Id(ada.id().unwrap())).unwrap();
    assert!(!ada.is_present().unwrap());

    let ghost = person.new_record([("name", Value::from("Ghost"))]);
    assert!(!ghost.is_present().unwrap());
}

#[test]
fn destroy_all_fires_hooks_around_one_bulk_delete() {
    let store = mem();
    let person = people(&store);

    for (name, age) in [("Ada", 36), ("Grace", 45), ("Edsger", 40)] {
        person
            .create([("name", Value::from(name)), ("age", Value::from(age))])
            .unwrap();
    }

    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    let probe_store = store.clone();
    person.add_hook(BEFORE_DESTROY, move |args| {
        let id = args[0].as_int().unwrap();
        // Before-hooks must observe pre-delete state.
        let still_there = probe_store
            .count("person", &Criteria::Id(id), &QueryOptions::default())
            .unwrap();
        l.lock().unwrap().push(format!("before:{id}:{still_there}"));
        Ok(())
    });
    let l = log.clone();
    person.add_hook(activerow::AFTER_DESTROY, move |args| {
        let id = args[0].as_int().unwrap();
        l.lock().unwrap().push(format!("after:{id}"));
        Ok(())
    });

    let removed = person
        .destroy_all(&Criteria::raw("age >= 40"))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(person.count(&Criteria::All).unwrap(), 1);

    // All before-hooks (in id order, each seeing the live row) strictly
    // precede all after-hooks.
    let log = log.lock().unwrap();
    let ids: Vec<i64> = (2..=3).collect();
    let expected: Vec<String> = ids
        .iter()
        .map(|id| format!("before:{id}:1"))
        .chain(ids.iter().map(|id| format!("after:{id}")))
        .collect();
    assert_eq!(*log, expected);
}

#[test]
fn destroy_all_with_no_matches_skips_hooks() {
    let store = mem();
    let person = people(&store);

    let fired = Arc::new(Mutex::new(false));
    let f = fired.clone();
    person.add_hook(BEFORE_DESTROY, move |_| {
        *f.lock().unwrap() = true;
        Ok(())
    });

    let removed = person.destroy_all(&Criteria::field("age", 999)).unwrap();
    assert_eq!(removed, 0);
    assert!(!*fired.lock().unwrap());
}

#[test]
fn delete_all_bypasses_hooks() {
    let store = mem();
    let person = people(&store);
    person.create([("name", Value::from("Ada"))]).unwrap();

    let fired = Arc::new(Mutex::new(false));
    let f = fired.clone();
    person.add_hook(BEFORE_DESTROY, move |_| {
        *f.lock().unwrap() = true;
        Ok(())
    });

    assert_eq!(person.delete_all(&Criteria::All).unwrap(), 1);
    assert!(!*fired.lock().unwrap());
}

#[test]
fn destroy_hooks_run_in_order_and_fail_fast() {
    let store = mem();
    let person = people(&store);

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let l = log.clone();
    person.add_hook(BEFORE_DESTROY, move |_| {
        l.lock().unwrap().push("h1");
        Ok(())
    });
    let l = log.clone();
    person.add_hook(BEFORE_DESTROY, move |_| {
        l.lock().unwrap().push("h2");
        Ok(())
    });

    let mut ada = person.create([("name", Value::from("Ada"))]).unwrap();
    ada.destroy().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["h1", "h2"]);

    // Now a failing first hook: the second must not run, the delete must
    // not happen, and the record stays unfrozen.
    let grace_class = people(&store);
    grace_class.add_hook(BEFORE_DESTROY, |_| Err(Error::conversion("h1 fails")));
    let fired = Arc::new(Mutex::new(false));
    let f = fired.clone();
    grace_class.add_hook(BEFORE_DESTROY, move |_| {
        *f.lock().unwrap() = true;
        Ok(())
    });

    let mut grace = grace_class.create([("name", Value::from("Grace"))]).unwrap();
    assert!(grace.destroy().is_err());
    assert!(!*fired.lock().unwrap());
    assert!(!grace.is_frozen());
    assert!(grace.is_present().unwrap());
}

#[test]
fn removed_hook_no_longer_fires() {
    let store = mem();
    let person = people(&store);

    let fired = Arc::new(Mutex::new(false));
    let f = fired.clone();
    let handle = person.add_hook(BEFORE_DESTROY, move |_| {
        *f.lock().unwrap() = true;
        Ok(())
    });
    assert!(person.remove_hook(BEFORE_DESTROY, &handle));

    let mut ada = person.create([("name", Value::from("Ada"))]).unwrap();
    ada.destroy().unwrap();
    assert!(!*fired.lock().unwrap());
}

#[test]
fn transaction_do_commits_and_rolls_back() {
    let store = mem();
    let person = people(&store);

    person
        .transaction_do(|| {
            person.create([("name", Value::from("Ada"))])?;
            Ok(())
        })
        .unwrap();
    assert_eq!(person.count(&Criteria::All).unwrap(), 1);

    let result = person.transaction_do(|| {
        person.create([("name", Value::from("Grace"))])?;
        Err(Error::conversion("abort"))
    });
    assert!(matches!(result, Err(Error::Conversion(_))));
    assert_eq!(person.count(&Criteria::All).unwrap(), 1);
}

#[test]
fn dump_overlays_local_on_persisted() {
    let store = mem();
    let person = people(&store);

    let mut ada = person
        .create([("name", Value::from("Ada")), ("age", Value::from(36))])
        .unwrap();
    ada.set("age", 37).unwrap();

    let dump = ada.dump();
    assert_eq!(dump["name"], serde_json::json!("Ada"));
    assert_eq!(dump["age"], serde_json::json!(37));
    assert_eq!(dump["id"], serde_json::json!(ada.id().unwrap()));
}

#[test]
fn instantiate_builds_persisted_records_from_rows() {
    let store = mem();
    let person = people(&store);
    person
        .create([("name", Value::from("Ada")), ("age", Value::from(36))])
        .unwrap();

    let rows = store
        .find("person", &Criteria::All, &QueryOptions::default())
        .unwrap();
    let record: Record = person.instantiate(rows[0].clone());
    assert!(record.is_created());
    assert!(!record.is_dirty());
    assert_eq!(record.get("name").unwrap(), Value::Text("Ada".into()));
}

#[test]
fn find_respects_order_limit_and_offset() {
    let store = mem();
    let person = people(&store);
    for age in [30, 31, 32, 33] {
        person
            .create([("name", Value::from("p")), ("age", Value::from(age))])
            .unwrap();
    }

    let page = person
        .find(
            &Criteria::All,
            &QueryOptions::default().order("age DESC").limit(2).offset(1),
        )
        .unwrap();
    let ages: Vec<i64> = page
        .iter()
        .map(|r| r.get("age").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(ages, vec![32, 31]);
}
