use rusqlite::Connection;
use spacestore_core::db::migrations::latest_version;
use spacestore_core::db::open_db_in_memory;
use spacestore_core::{
    RequestContext, Space, SpaceLifecycle, SpaceRepoError, SpaceStore, SpaceType,
    SpaceValidationError, SqliteSpaceStore,
};

fn add(
    conn: &Connection,
    store: &SqliteSpaceStore<'_>,
    ctx: &RequestContext,
    space: &Space,
) -> Space {
    let tx = conn.unchecked_transaction().unwrap();
    let stored = store.add(&tx, ctx, space).unwrap();
    tx.commit().unwrap();
    stored
}

fn space(ref_id: &str, org_id: &str, name: &str, kind: SpaceType) -> Space {
    Space::with_ref_id(ref_id, org_id, name, kind).unwrap()
}

#[test]
fn add_then_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    let mut input = space("s1", "org1", "Handbook", SpaceType::Private);
    input.lifecycle = SpaceLifecycle::Draft;
    input.likes = 4;
    let stored = add(&conn, &store, &ctx, &input);

    assert!(stored.id > 0);
    assert_eq!(stored.user_id, "u1");
    assert!(stored.created > 0);
    assert!(stored.revised >= stored.created);

    let loaded = store.get(&ctx, "s1").unwrap();
    assert_eq!(loaded, stored);
    assert_eq!(loaded.name, "Handbook");
    assert_eq!(loaded.kind, SpaceType::Private);
    assert_eq!(loaded.lifecycle, SpaceLifecycle::Draft);
    assert_eq!(loaded.likes, 4);
}

#[test]
fn add_overrides_owner_and_timestamps_from_context() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    let mut input = space("s1", "org1", "Handbook", SpaceType::Public);
    input.user_id = "someone-else".to_string();
    input.created = 5;
    input.revised = 5;
    let stored = add(&conn, &store, &ctx, &input);

    assert_eq!(stored.user_id, "u1");
    assert_ne!(stored.created, 5);
    assert_eq!(stored.created, stored.revised);
}

#[test]
fn add_duplicate_ref_id_returns_conflict() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");
    add(&conn, &store, &ctx, &space("s1", "org1", "First", SpaceType::Public));

    let tx = conn.unchecked_transaction().unwrap();
    let err = store
        .add(&tx, &ctx, &space("s1", "org1", "Second", SpaceType::Public))
        .unwrap_err();
    assert!(matches!(
        err,
        SpaceRepoError::Conflict { ref org_id, ref ref_id } if org_id == "org1" && ref_id == "s1"
    ));
}

#[test]
fn same_ref_id_may_exist_in_two_orgs() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let org1 = RequestContext::new("org1", "u1");
    let org2 = RequestContext::new("org2", "u2");

    add(&conn, &store, &org1, &space("shared", "org1", "One", SpaceType::Public));
    add(&conn, &store, &org2, &space("shared", "org2", "Two", SpaceType::Public));

    assert_eq!(store.get(&org1, "shared").unwrap().name, "One");
    assert_eq!(store.get(&org2, "shared").unwrap().name, "Two");
}

#[test]
fn add_rejects_space_of_another_org() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    let tx = conn.unchecked_transaction().unwrap();
    let err = store
        .add(&tx, &ctx, &space("s1", "org2", "Foreign", SpaceType::Public))
        .unwrap_err();
    assert!(matches!(err, SpaceRepoError::OrganizationMismatch { .. }));
}

#[test]
fn add_validation_failure_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    let mut invalid = space("s1", "org1", "Docs", SpaceType::Public);
    invalid.name = "   ".to_string();
    let tx = conn.unchecked_transaction().unwrap();
    let err = store.add(&tx, &ctx, &invalid).unwrap_err();
    assert!(matches!(
        err,
        SpaceRepoError::Validation(SpaceValidationError::EmptyName)
    ));
    tx.commit().unwrap();

    assert!(store.get_all(&ctx).unwrap().is_empty());
}

// Single-row reads surface absence as an error while listings return an
// empty vector. Callers rely on both behaviours.
#[test]
fn get_missing_space_is_not_found_but_listing_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    let err = store.get(&ctx, "missing").unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        SpaceRepoError::NotFound { ref org_id, ref ref_id } if org_id == "org1" && ref_id == "missing"
    ));

    assert!(store.get_all(&ctx).unwrap().is_empty());
    assert!(store.get_viewable(&ctx).unwrap().is_empty());
    assert!(store.public_spaces(&ctx, "org1").unwrap().is_empty());
}

#[test]
fn get_never_crosses_organizations() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let org1 = RequestContext::new("org1", "u1");
    add(&conn, &store, &org1, &space("s1", "org1", "Docs", SpaceType::Public));

    let org2 = RequestContext::new("org2", "u1");
    assert!(store.get(&org2, "s1").unwrap_err().is_not_found());
}

#[test]
fn update_changes_only_mutable_fields_and_advances_revised() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");
    let original = add(&conn, &store, &ctx, &space("s1", "org1", "Draft", SpaceType::Private));

    let mut changed = original.clone();
    changed.name = "Published".to_string();
    changed.kind = SpaceType::Public;
    changed.lifecycle = SpaceLifecycle::Archived;
    changed.user_id = "u2".to_string();
    changed.likes = 9;
    changed.id = 999;
    changed.created = original.created + 1;
    changed.revised = original.created + 1;

    let tx = conn.unchecked_transaction().unwrap();
    let updated = store.update(&tx, &ctx, &changed).unwrap();
    tx.commit().unwrap();

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.ref_id, original.ref_id);
    assert_eq!(updated.org_id, original.org_id);
    assert_eq!(updated.created, original.created);
    assert!(updated.revised > original.revised);
    assert_eq!(updated.name, "Published");
    assert_eq!(updated.kind, SpaceType::Public);
    assert_eq!(updated.lifecycle, SpaceLifecycle::Archived);
    assert_eq!(updated.user_id, "u2");
    assert_eq!(updated.likes, 9);

    assert_eq!(store.get(&ctx, "s1").unwrap(), updated);
}

#[test]
fn back_to_back_updates_strictly_increase_revised() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");
    let mut current = add(&conn, &store, &ctx, &space("s1", "org1", "Docs", SpaceType::Public));

    for likes in 1..=5 {
        let mut next = current.clone();
        next.likes = likes;
        let tx = conn.unchecked_transaction().unwrap();
        let updated = store.update(&tx, &ctx, &next).unwrap();
        tx.commit().unwrap();

        assert!(updated.revised > current.revised);
        current = updated;
    }
}

#[test]
fn update_missing_space_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    let mut ghost = space("ghost", "org1", "Ghost", SpaceType::Public);
    ghost.user_id = "u1".to_string();
    let tx = conn.unchecked_transaction().unwrap();
    let err = store.update(&tx, &ctx, &ghost).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn update_rolled_back_with_caller_transaction() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");
    let original = add(&conn, &store, &ctx, &space("s1", "org1", "Before", SpaceType::Public));

    let mut changed = original.clone();
    changed.name = "After".to_string();
    let tx = conn.unchecked_transaction().unwrap();
    store.update(&tx, &ctx, &changed).unwrap();
    tx.rollback().unwrap();

    assert_eq!(store.get(&ctx, "s1").unwrap(), original);
}

#[test]
fn update_rejects_blank_owner_and_keeps_row() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");
    let original = add(&conn, &store, &ctx, &space("s1", "org1", "Docs", SpaceType::Public));

    for owner in ["", "   "] {
        let mut changed = original.clone();
        changed.name = "Renamed".to_string();
        changed.user_id = owner.to_string();

        let tx = conn.unchecked_transaction().unwrap();
        let err = store.update(&tx, &ctx, &changed).unwrap_err();
        tx.commit().unwrap();
        assert!(matches!(
            err,
            SpaceRepoError::Validation(SpaceValidationError::EmptyOwner)
        ));
    }

    assert_eq!(store.get(&ctx, "s1").unwrap(), original);
}

#[test]
fn delete_removes_only_matching_org_row_and_reports_count() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let org1 = RequestContext::new("org1", "u1");
    let org2 = RequestContext::new("org2", "u2");
    add(&conn, &store, &org1, &space("shared", "org1", "One", SpaceType::Public));
    add(&conn, &store, &org2, &space("shared", "org2", "Two", SpaceType::Public));

    let tx = conn.unchecked_transaction().unwrap();
    assert_eq!(store.delete(&tx, &org1, "shared").unwrap(), 1);
    assert_eq!(store.delete(&tx, &org1, "shared").unwrap(), 0);
    tx.commit().unwrap();

    assert!(store.get(&org1, "shared").unwrap_err().is_not_found());
    assert_eq!(store.get(&org2, "shared").unwrap().name, "Two");
}

#[test]
fn invalid_persisted_type_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO space (ref_id, name, org_id, user_id, type, lifecycle, likes, created, revised)
         VALUES ('bad', 'Bad', 'org1', 'u1', 42, 1, 0, 1, 1);",
        [],
    )
    .unwrap();
    let store = SqliteSpaceStore::try_new(&conn).unwrap();
    let ctx = RequestContext::new("org1", "u1");

    assert!(matches!(
        store.get(&ctx, "bad").unwrap_err(),
        SpaceRepoError::InvalidData(_)
    ));
    assert!(matches!(
        store.get_all(&ctx).unwrap_err(),
        SpaceRepoError::InvalidData(_)
    ));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteSpaceStore::try_new(&conn) {
        Err(SpaceRepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_space_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteSpaceStore::try_new(&conn),
        Err(SpaceRepoError::MissingRequiredTable("space"))
    ));
}

#[test]
fn repository_rejects_connection_missing_space_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE space (
            id INTEGER PRIMARY KEY,
            ref_id TEXT NOT NULL,
            name TEXT NOT NULL,
            org_id TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteSpaceStore::try_new(&conn),
        Err(SpaceRepoError::MissingRequiredColumn {
            table: "space",
            column: "user_id"
        })
    ));
}
