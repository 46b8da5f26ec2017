//! Integration tests for locked reads and refresh-under-lock.

use recordflow_core::prelude::*;
use recordflow_store::{IsolationLevel, LockMode, Order, Predicate, Query, RecordStore, Value};
use recordflow_testkit::prelude::*;

#[test]
fn locked_find_flags_the_record() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");

    db.transaction(Some(IsolationLevel::Serializable), |db| {
        let locked = Member::find_one(db, &row([("id", id)]), LockMode::ForUpdate)?
            .expect("member exists");
        assert!(locked.record().already_locked_for_update());
        assert_eq!(store.held_locks(), 1);

        let plain = Member::find_one(db, &row([("id", id)]), LockMode::None)?
            .expect("member exists");
        assert!(!plain.record().already_locked_for_update());

        let shared = Member::find_one(db, &row([("id", id)]), LockMode::Share)?
            .expect("member exists");
        assert!(!shared.record().already_locked_for_update());
        Ok(())
    })
    .unwrap();

    assert_eq!(store.held_locks(), 0);
}

#[test]
fn refresh_locks_only_once() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");

    db.transaction(None, |db| {
        let mut member = Member::find_one(db, &row([("id", id)]), LockMode::None)?
            .expect("member exists");
        assert!(member.refresh_for_update(None, false)?);
        assert!(member.refresh_for_update(None, false)?);
        assert_eq!(locked_queries(&store), 1);

        assert!(member.refresh_for_update(None, true)?);
        assert_eq!(locked_queries(&store), 2);
        Ok(())
    })
    .unwrap();
}

#[test]
fn refresh_after_locked_find_is_free() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");

    db.transaction(None, |db| {
        let mut member = Member::find_one(db, &row([("id", id)]), LockMode::ForUpdate)?
            .expect("member exists");
        assert!(member.refresh_for_update(None, false)?);
        assert_eq!(locked_queries(&store), 1);
        Ok(())
    })
    .unwrap();
}

#[test]
fn lock_from_an_earlier_transaction_is_retaken() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");

    let mut member = db
        .transaction(None, |db| {
            let member = Member::find_one(db, &row([("id", id)]), LockMode::ForUpdate)?
                .expect("member exists");
            assert!(member.record().already_locked_for_update());
            Ok(member)
        })
        .unwrap();
    assert!(!member.record().already_locked_for_update());

    db.transaction(None, |_| {
        assert!(!member.record().already_locked_for_update());
        assert!(member.refresh_for_update(None, false)?);
        assert_eq!(locked_queries(&store), 2);
        assert_eq!(store.held_locks(), 1);
        assert!(member.record().already_locked_for_update());
        Ok(())
    })
    .unwrap();
}

#[test]
fn refresh_after_rolled_back_lock_is_retaken() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");
    let mut member = Member::find_one(&db, &row([("id", id)]), LockMode::None)
        .unwrap()
        .unwrap();

    let err = db
        .transaction(None, |_| {
            member.refresh_for_update(None, false)?;
            Err::<(), _>(LifecycleError::domain("abandoned"))
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "domain error: abandoned");

    db.transaction(None, |_| member.refresh_for_update(None, false))
        .unwrap();
    assert_eq!(locked_queries(&store), 2);
}

#[test]
fn refresh_of_new_record_is_a_config_fault() {
    let (_store, db) = test_db();
    let mut member = Member::new(&db);

    let err = db
        .transaction(None, |_| member.refresh_for_update(None, false))
        .unwrap_err();

    assert_eq!(
        err.config_fault(),
        Some(&ConfigFault::LockNewRecord {
            table: "members".into()
        })
    );
}

#[test]
fn refresh_outside_transaction_is_a_config_fault() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");
    let mut member = Member::find_one(&db, &row([("id", id)]), LockMode::None)
        .unwrap()
        .unwrap();

    let err = member.refresh_for_update(None, false).unwrap_err();

    assert_eq!(
        err.config_fault(),
        Some(&ConfigFault::LockOutsideTransaction {
            table: "members".into()
        })
    );
    assert_eq!(locked_queries(&store), 0);
}

#[test]
fn refresh_keeps_in_flight_edits() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");
    let mut member = Member::find_one(&db, &row([("id", id)]), LockMode::None)
        .unwrap()
        .unwrap();
    member.set("name", "Countess");
    store
        .update(
            "members",
            &row([("id", id)]),
            &row([("email", "ada@lovelace.org"), ("name", "Augusta")]),
        )
        .unwrap();

    db.transaction(None, |_| member.refresh_for_update(None, false))
        .unwrap();

    assert_eq!(member.get("email"), Some(&Value::from("ada@lovelace.org")));
    assert_eq!(member.get("name"), Some(&Value::from("Countess")));
    assert_eq!(
        member.record().old_attribute("name"),
        Some(&Value::from("Augusta"))
    );
    assert!(member.record().is_dirty("name"));
    assert!(!member.record().is_dirty("email"));
}

#[test]
fn refresh_of_selected_fields() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");
    let mut member = Member::find_one(&db, &row([("id", id)]), LockMode::None)
        .unwrap()
        .unwrap();
    store
        .update(
            "members",
            &row([("id", id)]),
            &row([("email", "ada@lovelace.org"), ("name", "Augusta")]),
        )
        .unwrap();

    db.transaction(None, |_| member.refresh_for_update(Some(&["name"]), false))
        .unwrap();

    assert_eq!(member.get("name"), Some(&Value::from("Augusta")));
    assert_eq!(member.get("email"), Some(&Value::from("ada@example.com")));
}

#[test]
fn refresh_of_vanished_row() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");
    let mut member = Member::find_one(&db, &row([("id", id)]), LockMode::None)
        .unwrap()
        .unwrap();
    store.delete("members", &row([("id", id)])).unwrap();

    let refreshed = db
        .transaction(None, |_| member.refresh_for_update(None, false))
        .unwrap();

    assert!(!refreshed);
    assert!(!member.record().already_locked_for_update());
}

#[test]
fn refresh_inside_the_lifecycle_transaction() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");
    let mut member = Member::find_one(&db, &row([("id", id)]), LockMode::None)
        .unwrap()
        .unwrap();
    member.behavior = MemberBehavior {
        refresh_in_before_save: true,
        ..MemberBehavior::isolated(TransactionIsolation::Serializable)
    };
    member.set("name", "Countess");

    assert!(member.save(true).unwrap().is_success());

    assert!(member.hooks.contains(&"refreshed(true)".to_string()));
    assert_eq!(locked_queries(&store), 1);
    assert!(!member.record().already_locked_for_update());
    assert_eq!(
        store.rows("members")[0].get("name"),
        Some(&Value::from("Countess"))
    );
}

#[test]
fn find_all_by_query_orders_rows() {
    let (store, db) = test_db();
    seed_member(&store, "b@example.com", "Bea");
    seed_member(&store, "a@example.com", "Abe");
    seed_member(&store, "c@example.com", "Cy");

    let query = Query::table("members")
        .filter(Predicate::ne("name", "Cy"))
        .order_by("name", Order::Asc);
    let members = Member::find_all_by_query(&db, query, LockMode::None).unwrap();

    let names: Vec<_> = members
        .iter()
        .filter_map(|m| m.get("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, ["Abe", "Bea"]);
    assert!(members.iter().all(|m| !m.record().is_new_record()));
}

#[test]
fn find_one_by_query_limits_to_one() {
    let (store, db) = test_db();
    seed_member(&store, "a@example.com", "Abe");
    seed_member(&store, "b@example.com", "Bea");

    let query = Query::table("members").order_by("id", Order::Desc);
    let member = Member::find_one_by_query(&db, query, LockMode::None)
        .unwrap()
        .unwrap();

    assert_eq!(member.id(), Some(2));
}

#[test]
fn find_all_by_condition() {
    let (store, db) = test_db();
    seed_member(&store, "a@example.com", "Twin");
    seed_member(&store, "b@example.com", "Twin");
    seed_member(&store, "c@example.com", "Solo");

    let twins = Member::find_all(&db, &row([("name", "Twin")]), LockMode::None).unwrap();
    assert_eq!(twins.len(), 2);

    let missing = Member::find_one(&db, &row([("name", "Nobody")]), LockMode::None).unwrap();
    assert!(missing.is_none());
}

#[test]
fn foreign_query_is_rejected() {
    let (_store, db) = test_db();

    let err = Member::find_all_by_query(&db, Query::table("invoices"), LockMode::None).unwrap_err();

    assert_eq!(
        err.config_fault(),
        Some(&ConfigFault::ForeignQuery {
            expected: "members".into(),
            found: "invoices".into(),
        })
    );
}

#[test]
fn locked_read_outside_transaction_still_reads() {
    let (store, db) = test_db();
    let id = seed_member(&store, "ada@example.com", "Ada");

    let member = Member::find_one(&db, &row([("id", id)]), LockMode::ForUpdate).unwrap();

    assert!(member.is_some());
    assert!(!member.unwrap().record().already_locked_for_update());
    assert_eq!(store.held_locks(), 0);
}

#[test]
fn null_condition_matches_null_columns() {
    let (store, db) = test_db();
    seed_member(&store, "ada@example.com", "Ada");
    store
        .insert(
            "members",
            &row([("email", Value::from("anon@example.com")), ("name", Value::Null)]),
        )
        .unwrap();

    let anonymous = Member::find_one(&db, &row([("name", Value::Null)]), LockMode::None)
        .unwrap()
        .expect("member without a name");
    assert_eq!(anonymous.get("email"), Some(&Value::from("anon@example.com")));

    let all = Member::find_all(&db, &row([("name", Value::Null)]), LockMode::None).unwrap();
    assert_eq!(all.len(), 1);
}
