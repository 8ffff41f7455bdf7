use catdb_core::db::open_db_in_memory;
use catdb_core::{
    Cat, CatProfile, CatService, DriverError, InitStatus, NewCat, SqliteDriver, StoreError,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn ready_connection() -> Connection {
    let conn = open_db_in_memory().unwrap();
    let service = CatService::new(SqliteDriver::new(&conn));
    assert_eq!(service.initialize_store().unwrap(), InitStatus::Ok);
    conn
}

fn seed_cats(service: &CatService<SqliteDriver<'_>>) -> Vec<Cat> {
    [
        NewCat::new("Tom", 5, "Siamese"),
        NewCat::new("Whiskers", 3, "Tabby"),
        NewCat::new("Whitey", 1, "Persian"),
    ]
    .iter()
    .map(|cat| service.create(cat).unwrap())
    .collect()
}

fn seed_people(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO people (id, name) VALUES (1, 'Ann'), (2, 'Bob');
         INSERT INTO cats_people (cat_id, people_id) VALUES (1, 1), (1, 2), (2, 2);",
    )
    .unwrap();
}

#[test]
fn whiskers_scenario_creates_then_reads_back() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    let before = service.count().unwrap();

    let input = NewCat::new("Whiskers", 3, "Tabby");
    let created = service.create(&input).unwrap();
    assert!(created.id > 0);
    assert_eq!(created.name, "Whiskers");

    let profile = service.get_by_id(created.id).unwrap();
    assert_eq!(profile, CatProfile::from(&input));
    assert_eq!(service.count().unwrap(), before + 1);
}

#[test]
fn get_by_id_exposes_exactly_name_age_breed() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    let cats = seed_cats(&service);

    for cat in cats {
        let value = serde_json::to_value(service.get_by_id(cat.id).unwrap()).unwrap();
        let keys: BTreeSet<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, BTreeSet::from(["age", "breed", "name"]));
    }
}

#[test]
fn get_by_id_missing_is_not_found() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    assert!(matches!(service.get_by_id(404), Err(StoreError::NotFound(_))));
}

#[test]
fn list_by_min_age_filters_inclusively() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);

    let all = service.list_by_min_age(None).unwrap();
    let grown = service.list_by_min_age(Some(3)).unwrap();

    assert_eq!(all.len(), 3);
    assert!(all.len() >= grown.len());
    let names: Vec<_> = grown.iter().map(|cat| cat.name.as_str()).collect();
    assert_eq!(names, vec!["Tom", "Whiskers"]);
    assert!(grown.iter().all(|cat| cat.age >= 3));
}

#[test]
fn count_matches_unfiltered_listing() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    assert_eq!(service.count().unwrap(), 0);

    seed_cats(&service);
    let listed = service.list_by_min_age(None).unwrap().len() as u64;
    assert_eq!(service.count().unwrap(), listed);
}

#[test]
fn get_by_name_applies_like_pattern() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);

    let names: Vec<_> = service
        .get_by_name("Wh%")
        .unwrap()
        .into_iter()
        .map(|cat| cat.name)
        .collect();
    assert_eq!(names, vec!["Whiskers", "Whitey"]);

    assert_eq!(service.get_by_name("tom").unwrap().len(), 1);
}

#[test]
fn get_by_name_binds_pattern_as_value() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);

    let matches = service.get_by_name("' OR 1=1 --").unwrap();
    assert!(matches.is_empty());
    assert_eq!(service.count().unwrap(), 3);
}

#[test]
fn update_is_idempotent_upsert() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    let cats = seed_cats(&service);
    let target = cats[0].id;

    let change = NewCat::new("Tom", 6, "Siamese Mix");
    let first = service.update(target, &change).unwrap();
    let snapshot = service.list_by_min_age(None).unwrap();
    let second = service.update(target, &change).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.id, target);
    assert_eq!(service.list_by_min_age(None).unwrap(), snapshot);
    assert_eq!(service.get_by_id(target).unwrap().breed, "Siamese Mix");
}

#[test]
fn update_with_unused_id_inserts() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));

    let cat = service
        .update(42, &NewCat::new("Ghost", 9, "Unknown"))
        .unwrap();
    assert_eq!(cat.id, 42);
    assert_eq!(service.count().unwrap(), 1);
}

#[test]
fn upper_case_name_runs_in_data_source() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    assert_eq!(service.upper_case_name("whiskers").unwrap(), "WHISKERS");
}

#[test]
fn get_single_cat_matches_exact_name() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    let cats = seed_cats(&service);

    assert_eq!(service.get_single_cat("Whitey").unwrap(), cats[2]);
    assert!(matches!(
        service.get_single_cat("Wh%"),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn get_records_with_related_nests_people_under_cats() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);
    seed_people(&conn);

    let nested = service.get_records_with_related().unwrap();

    assert_eq!(
        nested,
        vec![
            json!({"cat_id": 1, "cat_name": "Tom", "age": 5, "breed": "Siamese", "people": [
                {"person_id": 1, "person_name": "Ann"},
                {"person_id": 2, "person_name": "Bob"}
            ]}),
            json!({"cat_id": 2, "cat_name": "Whiskers", "age": 3, "breed": "Tabby", "people": [
                {"person_id": 2, "person_name": "Bob"}
            ]}),
            json!({"cat_id": 3, "cat_name": "Whitey", "age": 1, "breed": "Persian", "people": []}),
        ]
    );
}

#[test]
fn get_records_with_related_camel_renames_in_driver() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);
    seed_people(&conn);

    let nested = service.get_records_with_related_camel().unwrap();

    assert_eq!(
        nested,
        vec![
            json!({"catId": 1, "catName": "Tom", "age": 5, "breed": "Siamese", "people": [
                {"personId": 1, "personName": "Ann"},
                {"personId": 2, "personName": "Bob"}
            ]}),
            json!({"catId": 2, "catName": "Whiskers", "age": 3, "breed": "Tabby", "people": [
                {"personId": 2, "personName": "Bob"}
            ]}),
            json!({"catId": 3, "catName": "Whitey", "age": 1, "breed": "Persian", "people": []}),
        ]
    );
}

#[test]
fn get_joined_records_returns_flat_rows_for_one_cat() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);
    seed_people(&conn);

    let rows = service.get_joined_records(1).unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["cats_people.cat_id"], json!(1));
        assert_eq!(row["cats.name"], json!("Tom"));
    }
    let people: Vec<_> = rows.iter().map(|row| row["people.name"].clone()).collect();
    assert_eq!(people, vec![json!("Ann"), json!("Bob")]);

    assert!(service.get_joined_records(3).unwrap().is_empty());
}

#[test]
fn list_with_aliased_columns_renames_link_columns() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));
    seed_cats(&service);
    seed_people(&conn);

    let rows = service.list_with_aliased_columns().unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let keys: BTreeSet<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, BTreeSet::from(["catId", "personId"]));
    }
    assert_eq!(rows[0]["catId"], json!(1));
    assert_eq!(rows[0]["personId"], json!(1));
}

#[test]
fn reports_round_trip_by_title() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));

    let saved = service
        .save_report(&json!({"title": "Q1", "summary": "quiet", "tags": ["a", "b"]}))
        .unwrap();
    assert_eq!(saved["id"], json!(1));

    let loaded = service.get_report_by_title("Q1").unwrap();
    assert_eq!(loaded, saved);
    assert!(matches!(
        service.get_report_by_title("Q2"),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn saving_report_with_id_replaces_document() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));

    let saved = service
        .save_report(&json!({"title": "Draft", "pages": 1}))
        .unwrap();
    let mut revised = saved.clone();
    revised["pages"] = json!(2);
    service.save_report(&revised).unwrap();

    let loaded = service.get_report_by_title("Draft").unwrap();
    assert_eq!(loaded["pages"], json!(2));
    assert_eq!(loaded["id"], saved["id"]);
}

#[test]
fn report_must_be_an_object() {
    let conn = ready_connection();
    let service = CatService::new(SqliteDriver::new(&conn));

    let err = service.save_report(&Value::from("just text")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Driver(DriverError::InvalidData(_))
    ));
}

#[test]
fn operations_before_bootstrap_surface_driver_errors() {
    let conn = open_db_in_memory().unwrap();
    let service = CatService::new(SqliteDriver::new(&conn));

    assert!(matches!(
        service.count(),
        Err(StoreError::Driver(DriverError::Db(_)))
    ));
}
