//! Error taxonomy as seen through the public API.

use std::time::Duration;

use serde_json::json;
use settee::testing::MockResponse;
use settee::{
    ClientConfig, Error, ErrorKind, GetDocument, Method, QueryView, SubmitOptions,
};

use crate::common::*;

#[tokio::test]
async fn status_codes_map_to_kinds() {
    let (_client, db, mock) = create_animaldb();
    let cases = [
        ("a", 401, ErrorKind::Unauthorized),
        ("b", 403, ErrorKind::Unauthorized),
        ("c", 404, ErrorKind::NotFound),
        ("d", 409, ErrorKind::Conflict),
        ("e", 500, ErrorKind::Server),
        ("f", 400, ErrorKind::Server),
    ];
    for (id, status, _) in &cases {
        mock.respond(
            Method::Get,
            &format!("/animaldb/{}", id),
            MockResponse::json(*status, json!({"error": "e", "reason": "r"})),
        );
    }

    for (id, status, kind) in cases {
        let err = db.get_document(id).await.unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
        assert_eq!(err.status(), Some(status));
    }
}

#[tokio::test]
async fn error_messages_are_readable() {
    let (_client, db, mock) = create_animaldb();
    mock.respond(
        Method::Get,
        "/animaldb/dodo",
        MockResponse::json(404, json!({"error": "not_found", "reason": "deleted"})),
    );

    let err = db.get_document("dodo").await.unwrap_err();
    assert_eq!(err.to_string(), "document not found (404): not_found: deleted");
}

#[tokio::test]
async fn validation_errors_never_reach_the_server() {
    let (_client, db, mock) = create_animaldb();

    let err = db
        .submit(QueryView::new("views101", "diet").key("a").keys(vec!["b"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.is_interrupted());
    assert_eq!(err.status(), None);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn interruptions_are_distinguished() {
    let (client, mock) = create_client(ClientConfig::default());
    let db = client.database("animaldb").unwrap();
    mock.respond(Method::Get, "/animaldb/slow", MockResponse::never());

    let timed = db
        .submit_with_options(
            GetDocument::new("slow"),
            SubmitOptions::default().timeout(Duration::from_millis(10)),
        )
        .unwrap()
        .outcome()
        .await
        .unwrap_err();
    assert!(timed.is_interrupted());
    assert_eq!(timed.kind(), ErrorKind::Timeout);

    let handle = db.submit(GetDocument::new("slow")).unwrap();
    handle.cancel();
    let cancelled = handle.outcome().await.unwrap_err();
    assert_eq!(cancelled, Error::Cancelled);
    assert!(cancelled.is_interrupted());

    let stats = client.stats();
    assert_eq!((stats.failed, stats.cancelled), (1, 1));
}
