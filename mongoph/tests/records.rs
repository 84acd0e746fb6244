mod common;

use std::time::Duration;

use bson::{Bson, DateTime, doc};
use mongoph::{prelude::*, record::DATETIME_FORMAT};

async fn seed(store: &RecordStore<mongoph::memory::InMemoryConnector>, names: &[&str]) -> Vec<String> {
    let records = names.iter().map(|name| doc! { "name": *name }).collect();

    store
        .insert_many("app", "users", records, Returning::Ack)
        .await
        .unwrap()
        .into_ack()
        .unwrap()
}

#[tokio::test]
async fn inserted_records_are_stamped_consistently() {
    let store = common::store();

    let key = store
        .insert_one("app", "users", doc! { "name": "ada" }, Returning::Ack)
        .await
        .unwrap()
        .into_ack()
        .unwrap();

    let record = store
        .find_one("app", "users", doc! { "record_id": key.as_str() }, Some(doc! { "_id": 0 }))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.get_str("name").unwrap(), "ada");
    assert_eq!(record.get("id"), Some(&Bson::Int64(1)));
    assert_eq!(record.get_str("record_id").unwrap(), key);

    let created_at = record.get_str("created_at").unwrap();
    assert_eq!(created_at, record.get_str("updated_at").unwrap());
    assert!(chrono::NaiveDateTime::parse_from_str(created_at, DATETIME_FORMAT).is_ok());
}

#[tokio::test]
async fn find_one_uses_the_default_projection() {
    let store = common::store();
    seed(&store, &["ada"]).await;

    let record = store.find_one("app", "users", doc! { "name": "ada" }, None).await.unwrap();
    let missing = store.find_one("app", "users", doc! { "name": "bob" }, None).await.unwrap();

    assert_eq!(record, Some(doc! { "id": 1_i64 }));
    assert_eq!(missing, None);
}

#[tokio::test]
async fn insert_many_returns_keys_in_input_order() {
    let store = common::store();

    let keys = seed(&store, &["a", "b", "c"]).await;

    assert_eq!(keys.len(), 3);
    for (position, key) in keys.iter().enumerate() {
        let expected = position as i64 + 1;
        let record = store
            .find_one("app", "users", doc! { "record_id": key.as_str() }, Some(doc! { "_id": 0, "id": 1 }))
            .await
            .unwrap();
        assert_eq!(record, Some(doc! { "id": expected }));
    }
}

#[tokio::test]
async fn insert_many_with_no_records_writes_nothing() {
    let store = common::store();

    let outcome = store
        .insert_many("app", "users", Vec::new(), Returning::Ack)
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Ack(Vec::new()));
    assert_eq!(store.count("app", "users", doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn pager_windows_the_sorted_listing() {
    let store = common::store();
    seed(&store, &["a", "b", "c", "d"]).await;

    let page = store
        .find(
            "app",
            "users",
            FindOptions::builder()
                .sort("id", SortDirection::Asc)
                .pager(Pager::new(1, 2))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(page, vec![doc! { "id": 2_i64 }, doc! { "id": 3_i64 }]);
}

#[tokio::test]
async fn zero_page_size_returns_everything_after_the_skip() {
    let store = common::store();
    seed(&store, &["a", "b", "c", "d"]).await;

    let page = store
        .find(
            "app",
            "users",
            FindOptions::builder()
                .sort("id", SortDirection::Asc)
                .pager(Pager::new(1, 0))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(page, vec![doc! { "id": 2_i64 }, doc! { "id": 3_i64 }, doc! { "id": 4_i64 }]);
}

#[tokio::test]
async fn empty_pager_is_ignored() {
    let store = common::store();
    seed(&store, &["a", "b"]).await;

    let listing = store
        .find("app", "users", FindOptions::builder().pager(Pager::default()).build())
        .await
        .unwrap();

    assert_eq!(listing.len(), 2);
}

#[tokio::test]
async fn default_listing_is_newest_first() {
    let store = common::store();

    for name in ["a", "b", "c"] {
        store
            .insert_one("app", "users", doc! { "name": name }, Returning::Ack)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let listing = store.find("app", "users", FindOptions::default()).await.unwrap();

    assert_eq!(listing, vec![doc! { "id": 3_i64 }, doc! { "id": 2_i64 }, doc! { "id": 1_i64 }]);
}

#[tokio::test]
async fn find_applies_criteria_and_limit() {
    let store = common::store();
    seed(&store, &["a", "b", "c", "d"]).await;

    let found = store
        .find(
            "app",
            "users",
            FindOptions::builder()
                .criteria(Filter::any_of("name", ["b", "c", "d"]))
                .projection(doc! { "_id": 0, "name": 1 })
                .sort("name", SortDirection::Desc)
                .limit(2)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(found, vec![doc! { "name": "d" }, doc! { "name": "c" }]);
}

#[tokio::test]
async fn incomplete_pager_fails_before_connecting() {
    let store = common::store();

    let err = store
        .find(
            "app",
            "users",
            FindOptions::builder()
                .pager(Pager { skip: None, limit: Some(10) })
                .build(),
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(store.connector().connections_opened(), 0);
}

#[tokio::test]
async fn set_update_refreshes_updated_at() {
    let store = common::store();
    let key = seed(&store, &["ada"]).await.remove(0);

    let raw = async || {
        let connection = store.connector().connect("app").await.unwrap();
        let record = connection
            .find_one("users", doc! { "record_id": key.as_str() }, doc! {})
            .await
            .unwrap()
            .unwrap();
        connection.close().await.unwrap();
        record
    };

    let before = raw().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let outcome = store
        .update_one("app", "users", doc! { "record_id": key.as_str() }, UpdateOperator::Set, doc! { "name": "lovelace" }, Returning::Ack)
        .await
        .unwrap();
    let after = raw().await;

    assert_eq!(outcome, WriteOutcome::Ack(true));
    assert_eq!(after.get_str("name").unwrap(), "lovelace");
    assert_eq!(after.get_datetime("created_at").unwrap(), before.get_datetime("created_at").unwrap());
    assert!(after.get_datetime("updated_at").unwrap() > before.get_datetime("updated_at").unwrap());
}

#[tokio::test]
async fn other_operators_also_stamp_updated_at() {
    let store = common::store();
    let key = seed(&store, &["ada"]).await.remove(0);
    let before = DateTime::now();

    store
        .update_one("app", "users", doc! { "record_id": key.as_str() }, "$push", doc! { "tags": "math" }, Returning::Ack)
        .await
        .unwrap();

    let connection = store.connector().connect("app").await.unwrap();
    let record = connection
        .find_one("users", doc! { "record_id": key.as_str() }, doc! {})
        .await
        .unwrap()
        .unwrap();
    connection.close().await.unwrap();

    assert_eq!(record.get_array("tags").unwrap(), &vec![Bson::from("math")]);
    assert!(*record.get_datetime("updated_at").unwrap() >= before);
}

#[tokio::test]
async fn update_of_missing_record_still_acknowledges() {
    let store = common::store();

    let outcome = store
        .update_one("app", "users", doc! { "id": 42 }, UpdateOperator::Set, doc! { "name": "x" }, Returning::Ack)
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Ack(true));
    assert_eq!(store.count("app", "users", doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn deletes_remove_matching_records() {
    let store = common::store();
    seed(&store, &["a", "b", "b", "c"]).await;

    store.delete_one("app", "users", doc! { "name": "b" }, Returning::Ack).await.unwrap();
    assert_eq!(store.count("app", "users", doc! { "name": "b" }).await.unwrap(), 1);

    let outcome = store
        .delete_many("app", "users", doc! { "name": { "$in": ["a", "b"] } }, Returning::Listing)
        .await
        .unwrap();

    assert_eq!(outcome.into_listing(), Some(vec![doc! { "id": 4_i64 }]));
}

#[tokio::test]
async fn listing_mode_returns_the_collection_after_the_write() {
    let store = common::store();

    let outcome = store
        .insert_one("app", "users", doc! { "name": "ada" }, Returning::Listing)
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Listing(vec![doc! { "id": 1_i64 }]));
    assert_eq!(store.connector().open_connections(), 0);
}

#[tokio::test]
async fn aggregate_output_is_normalized() {
    let store = common::store();
    seed(&store, &["ada", "bob"]).await;

    let rows = store
        .aggregate(
            "app",
            "users",
            vec![
                doc! { "$match": { "name": "ada" } },
                doc! { "$project": { "_id": 0, "name": 1, "created_at": 1 } },
            ],
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("name").unwrap(), "ada");
    assert!(rows[0].get_str("created_at").is_ok());
}

#[tokio::test]
async fn failed_operations_release_their_connection() {
    let store = common::store();

    let err = store
        .find("app", "users", FindOptions::builder().criteria(doc! { "$where": "true" }).build())
        .await
        .unwrap_err();
    assert!(err.is_database_operation());

    let err = store
        .aggregate("app", "users", vec![doc! { "$group": { "_id": null } }])
        .await
        .unwrap_err();
    assert!(err.is_database_operation());

    assert_eq!(store.connector().connections_opened(), 2);
    assert_eq!(store.connector().open_connections(), 0);
}

#[tokio::test]
async fn unreachable_server_surfaces_as_connection_error() {
    let store = common::store();
    store.connector().set_reachable(false);

    let err = store
        .insert_one("app", "users", doc! { "name": "ada" }, Returning::Ack)
        .await
        .unwrap_err();

    assert!(err.is_connection());
    assert_eq!(store.connector().open_connections(), 0);
}

#[tokio::test]
async fn collection_view_forwards_to_the_store() {
    let store = common::store();
    let users = store.collection("app", "users");

    users.insert_one(doc! { "name": "ada" }, Returning::Ack).await.unwrap();

    assert_eq!(users.count(doc! {}).await.unwrap(), 1);
    assert_eq!(users.next_identifier().await.unwrap(), 2);
    assert_eq!(users.find(FindOptions::default()).await.unwrap(), vec![doc! { "id": 1_i64 }]);
}
