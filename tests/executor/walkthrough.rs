//! A full session against one database: create, write, query, clean up.

use serde_json::json;
use settee::testing::MockResponse;
use settee::{
    Callbacks, FindDocuments, Method, Operation, OperationState, Outcome, QueryView, Stale,
};
use tokio::sync::oneshot;

use crate::common::*;

#[tokio::test]
async fn animaldb_session() {
    let (client, db, mock) = create_animaldb();
    mock.respond(Method::Put, "/animaldb", MockResponse::json(201, json!({"ok": true})));
    mock.respond(
        Method::Put,
        "/animaldb/zebra",
        MockResponse::json(201, json!({"ok": true, "id": "zebra", "rev": "1-a"})),
    );
    mock.respond(
        Method::Put,
        "/animaldb/zebra",
        MockResponse::json(201, json!({"ok": true, "id": "zebra", "rev": "2-b"})),
    );
    mock.respond(
        Method::Get,
        "/animaldb/zebra",
        MockResponse::json(200, animal("zebra", "2-b", "mammal")),
    );
    mock.respond(
        Method::Delete,
        "/animaldb/zebra",
        MockResponse::json(200, json!({"ok": true, "id": "zebra", "rev": "3-c"})),
    );
    mock.respond(Method::Delete, "/animaldb", MockResponse::json(200, json!({"ok": true})));

    db.create().await.unwrap();

    let created = db
        .put_document("zebra", json!({"class": "mammal"}))
        .await
        .unwrap();
    let updated = db
        .put_document(
            "zebra",
            json!({"_rev": created.rev, "class": "mammal", "stripes": true}),
        )
        .await
        .unwrap();
    assert_eq!(updated.rev, "2-b");

    let fetched = db.get_document("zebra").await.unwrap();
    assert_eq!(fetched.rev, updated.rev);

    let deleted = db.delete_document("zebra", &fetched.rev).await.unwrap();
    assert_eq!(deleted.rev, "3-c");

    db.delete().await.unwrap();
    client.drain().await;

    let trail: Vec<_> = mock
        .requests()
        .iter()
        .map(|r| format!("{} {}", r.method, r.path()))
        .collect();
    assert_eq!(
        trail,
        vec![
            "PUT /animaldb",
            "PUT /animaldb/zebra",
            "PUT /animaldb/zebra",
            "GET /animaldb/zebra",
            "DELETE /animaldb/zebra",
            "DELETE /animaldb",
        ]
    );
    assert_eq!(mock.requests()[2].json_body().unwrap()["_rev"], json!("1-a"));
    assert_eq!(client.stats().completed, 6);
}

#[tokio::test]
async fn view_rows_stream_through_handle() {
    let (_client, db, mock) = create_animaldb();
    mock.respond(
        Method::Get,
        "/animaldb/_design/views101/_view/diet",
        MockResponse::chunked(
            200,
            [
                r#"{"total_rows":3,"offset":0,"rows":[{"id":"aardvark","key":"#,
                r#""carnivore","value":1},{"id":"giraffe","key":"herbivore","value":1},"#,
                r#"{"id":"kookaburra","key":"omnivore","value":1}]}"#,
            ],
        ),
    );

    let query = QueryView::new("views101", "diet")
        .stale(Stale::Ok)
        .limit(3);
    let mut handle = db.submit(query).unwrap();
    let mut keys = Vec::new();
    while let Some(row) = handle.next_row().await {
        keys.push(row.key().cloned().unwrap());
    }
    let completion = handle.finish().await;

    assert_eq!(keys, vec![json!("carnivore"), json!("herbivore"), json!("omnivore")]);
    assert_eq!(completion.rows_delivered, 3);
    assert!(matches!(
        completion.outcome,
        Ok(Outcome::Rows(ref summary)) if summary.total_rows == Some(3)
    ));
    assert_eq!(mock.requests()[0].query(), Some("limit=3&stale=ok"));
}

#[tokio::test]
async fn query_with_index_and_callbacks() {
    let (_client, db, mock) = create_animaldb();
    mock.respond(
        Method::Post,
        "/animaldb/_index",
        MockResponse::json(200, json!({"result": "created", "id": "_design/by-class", "name": "class"})),
    );
    mock.respond(
        Method::Post,
        "/animaldb/_find",
        MockResponse::json(
            200,
            json!({"docs": [animal("kiwi", "1-a", "bird"), animal("emu", "1-b", "bird")]}),
        ),
    );

    let index = db.create_json_index(Some("class"), [json!("class")]).await.unwrap();
    assert!(index.created());

    let (tx, rx) = oneshot::channel();
    let handle = db
        .submit_with(
            FindDocuments::new(json!({"class": "bird"})).use_index("by-class"),
            Callbacks::new(move |completion| {
                let _ = tx.send(completion);
            }),
        )
        .unwrap();
    let completion = rx.await.unwrap();

    assert!(completion.is_ok());
    assert_eq!(handle.state(), OperationState::Completed);
    let body = mock.requests()[1].json_body().unwrap();
    assert_eq!(body["use_index"], json!("by-class"));
}

#[tokio::test]
async fn request_can_be_previewed_without_sending() {
    let (_client, db, mock) = create_animaldb();

    let request = db
        .build_request(&Operation::from(QueryView::new("views101", "diet").key("herbivore")))
        .unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(
        request.url.as_str(),
        "https://examples.cloudant.test/animaldb/_design/views101/_view/diet?key=%22herbivore%22"
    );
    assert_eq!(mock.request_count(), 0);
}
