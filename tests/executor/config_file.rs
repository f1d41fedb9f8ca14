//! Clients configured from a settee.toml file.

use std::time::Duration;

use serde_json::json;
use settee::testing::MockResponse;
use settee::{ClientConfig, Error, GetDocument, Method, CONFIG_FILE_NAME};
use tempfile::TempDir;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn file_settings_reach_the_dispatcher() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "max_concurrent_operations = 1\ndefault_timeout_ms = 25\nuser_agent = \"zoo-keeper/2\"\n",
    )
    .unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    let (client, mock) = create_client(config);
    let db = client.database("animaldb").unwrap();
    mock.respond(
        Method::Get,
        "/animaldb/sloth",
        MockResponse::json(200, animal("sloth", "1-a", "mammal"))
            .with_latency(Duration::from_secs(5)),
    );

    let outcome = db.submit(GetDocument::new("sloth")).unwrap().outcome().await;
    assert_eq!(outcome, Err(Error::Timeout { after_ms: 25 }));
    assert_eq!(client.stats().limit, 1);
    assert_eq!(
        mock.requests()[0].header("user-agent"),
        Some("zoo-keeper/2")
    );
}

#[tokio::test]
async fn default_file_is_usable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    ClientConfig::write_default_if_missing(&path).unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    assert_eq!(config, ClientConfig::default());

    let (client, mock) = create_client(config);
    let db = client.database("animaldb").unwrap();
    mock.respond(Method::Put, "/animaldb", MockResponse::json(201, json!({"ok": true})));
    db.create().await.unwrap();
}

#[test]
fn invalid_file_names_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "row_buffer = 0\n").unwrap();

    match ClientConfig::from_file(&path) {
        Err(Error::Config { reason }) => assert!(reason.contains(CONFIG_FILE_NAME)),
        other => panic!("expected config error, got {:?}", other),
    }
}
