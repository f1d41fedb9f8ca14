//! Shared fixtures: a client wired to a scripted transport.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::testing::MockTransport;
use crate::{Client, ClientConfig, Database};

pub(crate) const SERVER: &str = "http://mock.local:5984";

/// Client and database `animaldb` backed by a fresh mock.
pub(crate) fn setup_with(config: ClientConfig) -> (Client, Database, Arc<MockTransport>) {
    let mock = MockTransport::new();
    let client = Client::with_transport(SERVER, config, mock.clone()).unwrap();
    let db = client.database("animaldb").unwrap();
    (client, db, mock)
}

pub(crate) fn setup() -> (Client, Database, Arc<MockTransport>) {
    setup_with(ClientConfig::default())
}

pub(crate) fn with_limit(limit: usize) -> ClientConfig {
    ClientConfig {
        max_concurrent_operations: limit,
        ..ClientConfig::default()
    }
}

/// A view row as the server sends it.
pub(crate) fn view_row(id: &str, key: JsonValue, value: JsonValue) -> JsonValue {
    json!({"id": id, "key": key, "value": value})
}

/// Serialized row, for building hand-chunked bodies.
pub(crate) fn row_text(id: &str) -> String {
    view_row(id, json!(id), json!(1)).to_string()
}

/// A stored document body.
pub(crate) fn doc(id: &str, rev: &str) -> JsonValue {
    json!({"_id": id, "_rev": rev, "class": "mammal"})
}

/// Yield until the mock has received `n` requests.
pub(crate) async fn wait_for_requests(mock: &MockTransport, n: usize) {
    while mock.request_count() < n {
        tokio::task::yield_now().await;
    }
}
