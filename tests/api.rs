//! Black-box HTTP tests against the in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use docstore_rest::config::HttpConfig;
use docstore_rest::{app, doc, AppState, ConfigError, ObjectId, PrivilegeTable, StaticRoleDirectory, Value};
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use tower::ServiceExt;

const USER_HEADER: &str = "x-remote-user";

fn roles() -> StaticRoleDirectory {
    StaticRoleDirectory::new()
        .grant("x", "reader", "Reader")
        .grant("x", "writer", "Writer")
        .grant("x", "editor", "Editor")
}

fn state() -> AppState {
    AppState::in_memory(roles())
}

fn router(state: AppState) -> Router {
    app(state, &PrivilegeTable::default()).unwrap()
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    builder.body(body).unwrap()
}

fn json_request(method: Method, uri: &str, user: Option<&str>, body: Json) -> Request<Body> {
    let mut req = request(method, uri, user, Body::from(body.to_string()));
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    req
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(router: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let (status, body) = send(router, req).await;
    let value = if body.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Json) {
    send_json(router, request(Method::GET, uri, None, Body::empty())).await
}

#[tokio::test]
async fn reserved_databases_are_rejected_before_authentication() {
    let router = router(state());
    for db in ["admin", "config", "local"] {
        let (status, _) = get_json(&router, &format!("/{}", db)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = get_json(&router, &format!("/{}/users", db)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let anonymous = json_request(Method::POST, &format!("/{}/users/", db), None, json!({"a": 1}));
        assert_eq!(send(&router, anonymous).await.0, StatusCode::METHOD_NOT_ALLOWED);

        let editor = request(Method::DELETE, &format!("/{}", db), Some("editor"), Body::empty());
        assert_eq!(send(&router, editor).await.0, StatusCode::METHOD_NOT_ALLOWED);
    }
    let (status, _) = get_json(&router, "/public/users").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn mutations_require_identity_and_privilege() {
    let router = router(state());
    let body = json!({"name": "run"});

    let (status, err) = send_json(&router, json_request(Method::POST, "/cdb_x/runs/", None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"]["code"], "unauthenticated");

    let blank = json_request(Method::POST, "/cdb_x/runs/", Some("  "), body.clone());
    assert_eq!(send(&router, blank).await.0, StatusCode::UNAUTHORIZED);

    let reader = json_request(Method::POST, "/cdb_x/runs/", Some("reader"), body.clone());
    assert_eq!(send(&router, reader).await.0, StatusCode::FORBIDDEN);

    let stranger = json_request(Method::POST, "/cdb_y/runs/", Some("writer"), body.clone());
    assert_eq!(send(&router, stranger).await.0, StatusCode::FORBIDDEN);

    let (_, docs) = get_json(&router, "/cdb_x/runs").await;
    assert_eq!(docs, json!([]));

    let writer = json_request(Method::POST, "/cdb_x/runs/", Some("writer"), body);
    assert_eq!(send(&router, writer).await.0, StatusCode::OK);

    let drop_by_writer = request(Method::DELETE, "/cdb_x/runs", Some("writer"), Body::empty());
    assert_eq!(send(&router, drop_by_writer).await.0, StatusCode::FORBIDDEN);
    let drop_by_editor = request(Method::DELETE, "/cdb_x/runs", Some("editor"), Body::empty());
    assert_eq!(send(&router, drop_by_editor).await.0, StatusCode::OK);
    let (_, docs) = get_json(&router, "/cdb_x/runs").await;
    assert_eq!(docs, json!([]));
}

#[tokio::test]
async fn inserted_document_reads_back_by_generated_id() {
    let router = router(state());
    let (status, created) = send_json(
        &router,
        json_request(Method::POST, "/cdb_x/runs", Some("writer"), json!({"name": "alpha", "n": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true);
    let id = created["value"].as_str().unwrap().to_string();
    assert!(ObjectId::parse_str(&id).is_ok());

    let (status, doc) = get_json(&router, &format!("/cdb_x/runs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, json!({"_id": id, "name": "alpha", "n": 3}));

    let (status, missing) = get_json(&router, &format!("/cdb_x/runs/{}", ObjectId::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(missing, Json::Null);

    let (_, collections) = get_json(&router, "/cdb_x").await;
    assert_eq!(collections, json!(["runs"]));
}

#[tokio::test]
async fn simple_filters_return_matches_in_insertion_order() {
    let router = router(state());
    for (id, status) in [("1", "open"), ("2", "closed"), ("3", "open")] {
        let req = json_request(
            Method::POST,
            "/cdb_x/collectionA/",
            Some("writer"),
            json!({"_id": id, "status": status}),
        );
        assert_eq!(send(&router, req).await.0, StatusCode::OK);
    }
    let (status, docs) = get_json(&router, "/cdb_x/collectionA?status=open").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = docs.as_array().unwrap().iter().map(|d| d["_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "3"]);

    let (_, all) = get_json(&router, "/cdb_x/collectionA").await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn wrapped_identifiers_in_query_string_match_object_ids() {
    let state = state();
    let oid = ObjectId::new();
    state
        .documents
        .insert_one("cdb_x", "runs", doc! { "_id" => oid, "name" => "typed" })
        .await
        .unwrap();
    let router = router(state);

    let wrapped = format!("/cdb_x/runs?query_string=%7B%22_id%22%3A%22Identifier({})%22%7D", oid);
    let (status, docs) = get_json(&router, &wrapped).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(docs, json!([{"_id": oid.to_hex(), "name": "typed"}]));

    let plain = format!("/cdb_x/runs?query_string=%7B%22_id%22%3A%22{}%22%7D", oid);
    let (_, docs) = get_json(&router, &plain).await;
    assert_eq!(docs, json!([]));

    let (status, err) = get_json(&router, "/cdb_x/runs?query_string=%7Bbroken").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"]["code"], "parse_error");
}

#[tokio::test]
async fn replace_rejects_mismatched_payload_id() {
    let router = router(state());
    let put = |body: Json| json_request(Method::PUT, "/cdb_x/runs/run-7", Some("writer"), body);

    let (status, _) = send_json(&router, put(json!({"_id": "run-7", "v": 1}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, err) = send_json(&router, put(json!({"_id": "run-8", "v": 2}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"]["code"], "parse_error");
    let (_, doc) = get_json(&router, "/cdb_x/runs/run-7").await;
    assert_eq!(doc, json!({"_id": "run-7", "v": 1}));
    let (_, other) = get_json(&router, "/cdb_x/runs/run-8").await;
    assert_eq!(other, Json::Null);

    let (status, _) = send_json(&router, put(json!({"v": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, doc) = get_json(&router, "/cdb_x/runs/run-7").await;
    assert_eq!(doc["v"], 3);

    let (status, _) = send(&router, request(Method::PUT, "/cdb_x/runs/run-7", Some("writer"), Body::from("[1]"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, deleted) = send_json(
        &router,
        request(Method::DELETE, "/cdb_x/runs/run-7", Some("writer"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"success": true, "value": 1}));
}

#[tokio::test]
async fn hex_string_ids_stay_reachable_and_keep_their_type() {
    let state = state();
    let router = router(state.clone());
    let hex = "507f1f77bcf86cd799439011";
    let uri = format!("/cdb_x/runs/{}", hex);

    let create = json_request(Method::POST, "/cdb_x/runs/", Some("writer"), json!({"_id": hex, "v": 1}));
    assert_eq!(send(&router, create).await.0, StatusCode::OK);

    let (status, doc) = get_json(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, json!({"_id": hex, "v": 1}));

    let replace = json_request(Method::PUT, &uri, Some("writer"), json!({"v": 2}));
    assert_eq!(send(&router, replace).await.0, StatusCode::OK);
    let stored = state.documents.find("cdb_x", "runs", &Default::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["_id"], Value::from(hex));
    assert_eq!(stored[0]["v"], Value::Int(2));

    let (_, deleted) = send_json(&router, request(Method::DELETE, &uri, Some("writer"), Body::empty())).await;
    assert_eq!(deleted, json!({"success": true, "value": 1}));
    let (_, docs) = get_json(&router, "/cdb_x/runs").await;
    assert_eq!(docs, json!([]));
}

#[tokio::test]
async fn integer_ids_are_addressable_by_decimal_segment() {
    let state = state();
    let router = router(state.clone());

    let create = json_request(Method::POST, "/cdb_x/runs/", Some("writer"), json!({"_id": 7, "v": 1}));
    assert_eq!(send(&router, create).await.0, StatusCode::OK);

    let (status, doc) = get_json(&router, "/cdb_x/runs/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, json!({"_id": 7, "v": 1}));

    let replace = json_request(Method::PUT, "/cdb_x/runs/7", Some("writer"), json!({"v": 2}));
    assert_eq!(send(&router, replace).await.0, StatusCode::OK);
    let stored = state.documents.find("cdb_x", "runs", &Default::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["_id"], Value::Int(7));

    let (_, deleted) = send_json(&router, request(Method::DELETE, "/cdb_x/runs/7", Some("writer"), Body::empty())).await;
    assert_eq!(deleted, json!({"success": true, "value": 1}));
}

#[tokio::test]
async fn responses_keep_client_key_order() {
    let router = router(state());
    let create = request(
        Method::POST,
        "/cdb_x/runs/",
        Some("writer"),
        Body::from(r#"{"_id":"k","zeta":1,"alpha":2,"mid":{"z":true,"a":false}}"#),
    );
    assert_eq!(send(&router, create).await.0, StatusCode::OK);

    let (status, body) = send(&router, request(Method::GET, "/cdb_x/runs/k", None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        r#"{"_id":"k","zeta":1,"alpha":2,"mid":{"z":true,"a":false}}"#
    );
}

#[tokio::test]
async fn anonymous_mutations_are_refused_and_change_nothing() {
    let state = state();
    state
        .documents
        .insert_one("cdb_x", "runs", doc! { "_id" => "r1", "v" => 1i64 })
        .await
        .unwrap();
    let file = state
        .files
        .put(
            "cdb_x",
            docstore_rest::store::Upload {
                filename: None,
                content_type: None,
                data: axum::body::Bytes::from_static(b"payload"),
            },
        )
        .await
        .unwrap();
    let router = router(state.clone());

    let file_uri = format!("/cdb_x/gridfs/{}", file);
    let attempts = [
        json_request(Method::PUT, "/cdb_x/runs/r1", None, json!({"v": 2})),
        json_request(Method::POST, "/cdb_x/runs/r1", None, json!({"v": 3})),
        request(Method::DELETE, "/cdb_x/runs/r1", None, Body::empty()),
        request(Method::DELETE, "/cdb_x/runs", None, Body::empty()),
        request(Method::DELETE, "/cdb_x", None, Body::empty()),
        request(Method::PUT, "/cdb_x/gridfs/", None, Body::from("bytes")),
        request(Method::DELETE, &file_uri, None, Body::empty()),
    ];
    for attempt in attempts {
        let route = format!("{} {}", attempt.method(), attempt.uri());
        let (status, err) = send_json(&router, attempt).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", route);
        assert_eq!(err["error"]["code"], "unauthenticated", "{}", route);
    }

    let stored = state.documents.find("cdb_x", "runs", &Default::default()).await.unwrap();
    assert_eq!(stored, vec![doc! { "_id" => "r1", "v" => 1i64 }]);
    assert_eq!(state.documents.list_collections("cdb_x").await.unwrap(), vec!["runs"]);
    let kept = state.files.open("cdb_x", &file).await.unwrap().unwrap();
    assert_eq!(kept.info.length, 7);
}

#[tokio::test]
async fn large_objects_round_trip_across_chunks() {
    let router = router(state());
    let payload: Vec<u8> = (0..600 * 1024).map(|i| (i % 251) as u8).collect();

    let (status, created) = send_json(
        &router,
        request(Method::PUT, "/cdb_x/gridfs/", Some("writer"), Body::from(payload.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["value"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(request(Method::GET, &format!("/cdb_x/gridfs/{}", id), None, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], payload.len().to_string().as_str());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), payload.as_slice());

    let del = request(Method::DELETE, &format!("/cdb_x/gridfs/{}", id), Some("writer"), Body::empty());
    assert_eq!(send(&router, del).await.0, StatusCode::OK);
    let (status, _) = get_json(&router, &format!("/cdb_x/gridfs/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&router, "/cdb_x/gridfs/not-an-id").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn empty_and_oversized_uploads_create_nothing() {
    let http = HttpConfig {
        max_upload_bytes: 16,
        ..HttpConfig::default()
    };
    let router = router(state().with_http(http));

    let (status, err) = send_json(&router, request(Method::PUT, "/cdb_x/gridfs/", Some("writer"), Body::empty())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"]["code"], "payload_rejected");

    let big = request(Method::POST, "/cdb_x/gridfs/", Some("writer"), Body::from(vec![7u8; 17]));
    assert_eq!(send(&router, big).await.0, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, databases) = get_json(&router, "/").await;
    assert_eq!(databases, json!([]));

    let exact = request(Method::POST, "/cdb_x/gridfs/", Some("writer"), Body::from(vec![7u8; 16]));
    assert_eq!(send(&router, exact).await.0, StatusCode::OK);
}

#[tokio::test]
async fn multipart_upload_keeps_first_field() {
    let router = router(state());
    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nfirst\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"extra\"\r\n\r\nsecond\r\n--{b}--\r\n",
        b = boundary
    );
    let mut req = request(Method::POST, "/cdb_x/gridfs/", Some("writer"), Body::from(body));
    req.headers_mut().insert(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", boundary).parse().unwrap(),
    );
    let (status, created) = send_json(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["value"].as_str().unwrap();

    let (status, content) = send(&router, request(Method::GET, &format!("/cdb_x/gridfs/{}", id), None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content, b"first");
}

#[tokio::test]
async fn linked_large_objects_resolve_through_parent_document() {
    let state = state();
    let stored = state
        .files
        .put(
            "cdb_x",
            docstore_rest::store::Upload {
                filename: Some("run.log".into()),
                content_type: None,
                data: axum::body::Bytes::from_static(b"log lines"),
            },
        )
        .await
        .unwrap();
    state
        .documents
        .insert_one("cdb_x", "runs", doc! { "_id" => "r1", "gridfs_id" => stored })
        .await
        .unwrap();
    state
        .documents
        .insert_one("cdb_x", "runs", doc! { "_id" => "r2", "gridfs_id" => ObjectId::new() })
        .await
        .unwrap();
    state
        .documents
        .insert_one("cdb_x", "runs", doc! { "_id" => "r3", "name" => "unlinked" })
        .await
        .unwrap();
    let router = router(state);

    let (status, content) = send(&router, request(Method::GET, "/cdb_x/runs/gridfs/r1", None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content, b"log lines");

    for missing in ["r2", "r3", "r4"] {
        let (status, _) = get_json(&router, &format!("/cdb_x/runs/gridfs/{}", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", missing);
    }
}

#[tokio::test]
async fn database_listing_hides_reserved_names() {
    let state = state();
    for db in ["admin", "cdb_x", "scratch"] {
        state
            .documents
            .insert_one(db, "c", doc! { "_id" => "1" })
            .await
            .unwrap();
    }
    let router = router(state);
    let (status, databases) = get_json(&router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(databases, json!(["cdb_x"]));

    let drop = request(Method::DELETE, "/cdb_x", Some("editor"), Body::empty());
    assert_eq!(send(&router, drop).await.0, StatusCode::OK);
    let (_, databases) = get_json(&router, "/").await;
    assert_eq!(databases, json!([]));
}

#[tokio::test]
async fn router_construction_fails_on_unregistered_privilege() {
    let mut map = BTreeMap::new();
    map.insert("post".to_string(), vec!["Writer".to_string()]);
    let table = PrivilegeTable::from_map(map).unwrap();
    match app(state(), &table) {
        Err(ConfigError::UnknownPrivilege(name)) => assert_eq!(name, "edit"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("router built without an edit privilege"),
    }
}

#[tokio::test]
async fn health_and_readiness() {
    let router = router(state());
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = get_json(&router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "ok");
    let (_, body) = get_json(&router, "/version").await;
    assert_eq!(body["name"], "docstore-rest");
}

#[test]
fn typed_values_serialize_for_responses() {
    let oid = ObjectId::new();
    let out = docstore_rest::response::encode(&Value::from(oid)).unwrap();
    assert_eq!(out, format!("\"{}\"", oid));
}
