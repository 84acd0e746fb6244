mod common;

use std::collections::BTreeSet;

use bson::doc;
use futures::future::join_all;
use mongoph::{memory::InMemoryConnector, prelude::*};

#[tokio::test]
async fn identifiers_start_at_one_and_increase() {
    let store = common::store();
    let ids = store.identifiers();

    assert_eq!(ids.next_identifier("app", "users").await.unwrap(), 1);
    assert_eq!(ids.next_identifier("app", "users").await.unwrap(), 2);
    assert_eq!(ids.next_identifier("app", "orders").await.unwrap(), 1);
    assert_eq!(store.connector().open_connections(), 0);
}

#[tokio::test]
async fn concurrent_callers_never_share_an_identifier() {
    let store = common::store();
    let ids = store.identifiers();

    let minted = join_all((0..50).map(|_| ids.next_identifier("app", "users"))).await;
    let minted: BTreeSet<i64> = minted.into_iter().map(Result::unwrap).collect();

    assert_eq!(minted, (1..=50).collect());
}

#[tokio::test]
async fn counter_entries_live_in_the_configured_collection() {
    let connector = InMemoryConnector::new();
    let config = Config::builder("mongodb://localhost:27017")
        .counter_collection("sequences")
        .build();
    let store = RecordStore::new(connector.clone(), config);

    store.identifiers().next_identifier("app", "users").await.unwrap();

    let connection = connector.connect("app").await.unwrap();
    let entry = connection
        .find_one("sequences", doc! { "_id": "users" }, doc! {})
        .await
        .unwrap();
    connection.close().await.unwrap();

    assert_eq!(entry, Some(doc! { "_id": "users", "tally": 1_i64 }));
    assert_eq!(store.identifiers().counter_collection(), "sequences");
}

#[tokio::test]
async fn ensure_counter_does_not_consume_an_identifier() {
    let store = common::store();
    let ids = store.identifiers();

    ids.ensure_counter("app", "users").await.unwrap();
    ids.ensure_counter("app", "users").await.unwrap();

    assert_eq!(ids.next_identifier("app", "users").await.unwrap(), 1);
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let store = common::store();
    store.connector().set_reachable(false);

    let err = store.identifiers().next_identifier("app", "users").await.unwrap_err();

    assert!(err.is_connection());
}
