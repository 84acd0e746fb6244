//! Runs against a live deployment named by `MONGOPH_MONGODB_CONNECTION_STRING`.
//!
//! ```text
//! MONGOPH_MONGODB_CONNECTION_STRING=mongodb://localhost:27017 cargo test -p mongoph-mongodb -- --ignored
//! ```

use bson::{doc, oid::ObjectId};
use mongoph_core::{
    backend::{Connection, Connector},
    config::Config,
    error::MongophError,
    query::Query,
};
use mongoph_mongodb::MongoDbConnector;

fn connector() -> MongoDbConnector {
    let config = Config::from_env().expect("MONGOPH_MONGODB_CONNECTION_STRING must be set");
    MongoDbConnector::from_config(&config).unwrap()
}

fn scratch_database() -> String {
    format!("mongoph_test_{}", ObjectId::new().to_hex())
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connection_error() {
    let connector = MongoDbConnector::new("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200").unwrap();

    let err = connector.connect("app").await.unwrap_err();

    assert!(err.is_connection());
}

#[tokio::test]
async fn malformed_endpoint_is_a_connection_error() {
    let err = MongoDbConnector::new("not-a-uri").unwrap().connect("app").await.unwrap_err();

    assert!(err.is_connection());
}

#[test]
fn empty_endpoint_is_a_configuration_error() {
    let err = MongoDbConnector::new("  ").unwrap_err();
    assert!(matches!(err, MongophError::Configuration(_)));

    let config = Config::builder("").build();
    assert!(matches!(MongoDbConnector::record_store(config).unwrap_err(), MongophError::Configuration(_)));
    assert!(MongoDbConnector::builder("").build().is_err());
}

#[test]
fn record_store_shares_the_configured_endpoint() {
    let config = Config::builder("mongodb://db.internal:27017").counter_collection("sequences").build();

    let store = MongoDbConnector::record_store(config).unwrap();

    assert_eq!(store.connector().dsn(), store.config().connection_string);
    assert_eq!(store.identifiers().counter_collection(), "sequences");
}

#[tokio::test]
#[ignore]
async fn counters_and_records_round_trip() {
    let database = scratch_database();
    let connection = connector().connect(&database).await.unwrap();

    assert_eq!(connection.increment_counter("incrementors", "users").await.unwrap(), 1);
    assert_eq!(connection.increment_counter("incrementors", "users").await.unwrap(), 2);
    connection.init_counter("incrementors", "users").await.unwrap();
    assert_eq!(connection.increment_counter("incrementors", "users").await.unwrap(), 3);

    connection
        .insert_many("users", vec![doc! { "id": 1, "name": "ada" }, doc! { "id": 2, "name": "bob" }])
        .await
        .unwrap();
    assert_eq!(connection.count("users", doc! {}).await.unwrap(), 2);

    let listed = connection
        .find("users", Query { sort: vec![], skip: Some(1), ..Query::default() })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    assert_eq!(connection.update_one("users", doc! { "id": 1 }, doc! { "$set": { "name": "lovelace" } }).await.unwrap(), 1);
    assert_eq!(connection.delete_many("users", doc! {}).await.unwrap(), 2);

    connection.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn indexes_of_missing_collections_are_empty() {
    let database = scratch_database();
    let connection = connector().connect(&database).await.unwrap();

    assert!(connection.list_indexes("posts").await.unwrap().is_empty());

    connection.create_collection("posts").await.unwrap();
    connection.create_text_index("posts", "title", "posts_title").await.unwrap();

    let names = connection.list_indexes("posts").await.unwrap();
    assert!(names.contains(&"posts_title".to_string()));

    connection.close().await.unwrap();
}
