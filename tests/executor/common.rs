//! Common test utilities for executor tests

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use settee::testing::MockTransport;
use settee::{Client, ClientConfig, Database};

pub const SERVER: &str = "https://examples.cloudant.test";

/// Route logs to the test harness; set RUST_LOG to see them.
pub fn init_tracing() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
}

/// Create a client on a fresh mock transport
pub fn create_client(config: ClientConfig) -> (Client, Arc<MockTransport>) {
    init_tracing();
    let mock = MockTransport::new();
    let client = Client::with_transport(SERVER, config, mock.clone()).unwrap();
    (client, mock)
}

/// Create the `animaldb` database handle with default config
pub fn create_animaldb() -> (Client, Database, Arc<MockTransport>) {
    let (client, mock) = create_client(ClientConfig::default());
    let db = client.database("animaldb").unwrap();
    (client, db, mock)
}

/// Helper to build a stored animal document
pub fn animal(id: &str, rev: &str, class: &str) -> JsonValue {
    json!({"_id": id, "_rev": rev, "class": class})
}
