//! Request/response integration tests
//!
//! Correlation of replies, server errors, notifications and frame handling.

mod common;

use common::{eventually, mock_error, mock_response, ErrorLog, MockServer};
use jsonservices_client::{TraceDirection, TraceFrame};
use jsonservices_core::{Error, JsonRpcErrorData, Message, VersionRequest, Void};
use jsonservices_macros::Message;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Serialize, Message)]
#[message(name = "GetCustomer", response = Customer)]
#[serde(rename_all = "PascalCase")]
struct GetCustomer {
    customer_id: u32,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct Customer {
    name: String,
}

#[derive(Serialize)]
struct Unnamed {}

impl Message for Unnamed {
    type Response = Void;
}

#[tokio::test]
async fn test_call_connects_on_first_use() {
    let server = MockServer::with_responder(|request| match request["method"].as_str() {
        Some("rpc.authenticate") => Some(mock_response(request, json!({"SessionId": "abc"}))),
        Some("rpc.version") => Some(mock_response(
            request,
            json!({"ProductName": "Demo", "ProductVersion": "2.0", "EngineVersion": "0.9"}),
        )),
        _ => None,
    });
    let client = server.builder().build().unwrap();

    let version = client.call(&VersionRequest::default()).await.unwrap();

    assert_eq!(version.product_name, "Demo");
    assert_eq!(version.product_version, "2.0");
    assert!(client.is_connected());

    let requests = server.requests();
    assert_eq!(requests[0]["method"], "rpc.authenticate");
    assert_eq!(requests[1]["method"], "rpc.version");
    assert_eq!(requests[1]["id"], "2");
}

#[tokio::test]
async fn test_typed_call() {
    let server = MockServer::new();
    server.set_responder(|request| match request["method"].as_str() {
        Some("GetCustomer") => Some(mock_response(
            request,
            json!({"Name": format!("customer {}", request["params"]["CustomerId"])}),
        )),
        _ => common::default_reply(request),
    });
    let client = server.builder().build().unwrap();

    let customer = client.call(&GetCustomer { customer_id: 7 }).await.unwrap();

    assert_eq!(customer, Customer { name: "customer 7".into() });
}

#[tokio::test]
async fn test_out_of_order_replies() {
    let server = MockServer::new();
    let client = server.builder().build().unwrap();
    client.connect().await.unwrap();

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.call_raw("First".into(), json!({})).await }
    });
    eventually("first call", || server.requests_for("First").len() == 1).await;
    let second = tokio::spawn({
        let client = client.clone();
        async move { client.call_raw("Second".into(), json!({})).await }
    });
    eventually("second call", || server.requests_for("Second").len() == 1).await;

    let first_request = server.requests_for("First").remove(0);
    let second_request = server.requests_for("Second").remove(0);
    assert_ne!(first_request["id"], second_request["id"]);

    server.push(mock_response(&second_request, json!("two")));
    server.push(mock_response(&first_request, json!("one")));

    assert_eq!(first.await.unwrap().unwrap(), json!("one"));
    assert_eq!(second.await.unwrap().unwrap(), json!("two"));
}

#[tokio::test]
async fn test_server_error_rejects_call() {
    let server = MockServer::new();
    server.set_responder(|request| match request["method"].as_str() {
        Some("Explode") => Some(mock_error(request, -32603, "boom", json!({"detail": "stack"}))),
        _ => common::default_reply(request),
    });
    let log = ErrorLog::new();
    let client = log.install(server.builder()).build().unwrap();

    let err = client.call_raw("Explode".into(), json!({})).await.unwrap_err();

    match err {
        Error::JsonRpc(data) => {
            assert_eq!(data.code, JsonRpcErrorData::INTERNAL_ERROR);
            assert_eq!(data.message, "boom");
            assert_eq!(data.data, Some(json!({"detail": "stack"})));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(log.codes(), vec![Some(-32603)]);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_loose_error_object_rejects_call() {
    let server = MockServer::new();
    server.set_responder(|request| match request["method"].as_str() {
        Some("Boom") => Some(json!({"id": request["id"], "error": {"message": "boom"}})),
        Some("Denied") => Some(json!({"id": request["id"], "error": "denied"})),
        _ => common::default_reply(request),
    });
    let client = server.builder().build().unwrap();

    let err = tokio::time::timeout(Duration::from_secs(2), client.call_raw("Boom".into(), json!({})))
        .await
        .expect("call never settled")
        .unwrap_err();
    match err {
        Error::JsonRpc(data) => {
            assert_eq!(data.code, JsonRpcErrorData::INTERNAL_ERROR);
            assert_eq!(data.message, "boom");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = tokio::time::timeout(Duration::from_secs(2), client.call_raw("Denied".into(), json!({})))
        .await
        .expect("call never settled")
        .unwrap_err();
    assert_eq!(err.code(), Some(JsonRpcErrorData::INTERNAL_ERROR));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_unknown_reply_is_dropped() {
    let server = MockServer::new();
    server.set_responder(|request| match request["method"].as_str() {
        Some("Echo") => Some(mock_response(request, request["params"].clone())),
        _ => common::default_reply(request),
    });
    let log = ErrorLog::new();
    let client = log.install(server.builder()).build().unwrap();
    client.connect().await.unwrap();

    server.push(json!({"jsonrpc": "2.0", "id": "999", "result": 1}));
    server.push(json!({"jsonrpc": "2.0", "id": "998", "error": {"code": -1, "message": "late"}}));

    let echoed = client.call_raw("Echo".into(), json!({"x": 1})).await.unwrap();
    assert_eq!(echoed, json!({"x": 1}));
    assert!(log.errors().is_empty());
}

#[tokio::test]
async fn test_notify_sends_no_id() {
    let server = MockServer::new();
    let client = server.builder().build().unwrap();

    client
        .notify_raw("Ping".into(), json!({"At": 1}))
        .await
        .unwrap();

    let pings = server.requests_for("Ping");
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0], json!({"jsonrpc": "2.0", "method": "Ping", "params": {"At": 1}}));
}

#[tokio::test]
async fn test_malformed_frame_is_reported() {
    let server = MockServer::new();
    let log = ErrorLog::new();
    let client = log.install(server.builder()).build().unwrap();
    client.connect().await.unwrap();

    server.push_text("{not json");
    eventually("parse error", || !log.errors().is_empty()).await;

    assert!(matches!(log.errors()[0], Error::Parse(_)));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_binary_reply() {
    let server = MockServer::new();
    let client = server.builder().build().unwrap();
    client.connect().await.unwrap();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_raw("Binary".into(), json!({})).await }
    });
    eventually("call sent", || server.requests_for("Binary").len() == 1).await;
    let request = server.requests_for("Binary").remove(0);
    server.push_binary(mock_response(&request, json!("bytes")));

    assert_eq!(call.await.unwrap().unwrap(), json!("bytes"));
}

#[tokio::test]
async fn test_trace_hook_sees_both_directions() {
    let server = MockServer::new();
    let frames = Arc::new(Mutex::new(Vec::new()));
    let client = server
        .builder()
        .on_trace({
            let frames = Arc::clone(&frames);
            move |frame: &TraceFrame<'_>| frames.lock().unwrap().push((frame.direction, frame.data.to_string()))
        })
        .build()
        .unwrap();

    client.connect().await.unwrap();

    let frames = frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, TraceDirection::Outgoing);
    assert!(frames[0].1.contains("rpc.authenticate"));
    assert_eq!(frames[1].0, TraceDirection::Incoming);
    assert!(frames[1].1.contains("abc"));
}

#[tokio::test]
async fn test_unknown_message_name() {
    let server = MockServer::new();
    let log = ErrorLog::new();
    let client = log.install(server.builder()).build().unwrap();

    let err = client.call(&Unnamed {}).await.unwrap_err();

    assert!(matches!(err, Error::UnknownMessageName(_)));
    assert_eq!(log.errors().len(), 1);
    assert_eq!(server.opens(), 0);
}

#[tokio::test]
async fn test_registered_message_name() {
    let server = MockServer::new();
    server.set_responder(|request| match request["method"].as_str() {
        Some("Unnamed") => Some(mock_response(request, json!(null))),
        _ => common::default_reply(request),
    });
    let client = server
        .builder()
        .register_message::<Unnamed>("Unnamed")
        .build()
        .unwrap();

    assert_eq!(client.name_of(Some(&Unnamed {})).unwrap(), "Unnamed");
    assert_eq!(client.name_of::<Unnamed>(None).unwrap(), "null");
    client.call(&Unnamed {}).await.unwrap();
    assert_eq!(server.requests_for("Unnamed").len(), 1);
}

#[tokio::test]
async fn test_ids_are_unique() {
    let server = MockServer::new();
    server.set_responder(|request| match request["method"].as_str() {
        Some("Echo") => Some(mock_response(request, json!(true))),
        _ => common::default_reply(request),
    });
    let client = server.builder().build().unwrap();

    for _ in 0..5 {
        client.call_raw("Echo".into(), json!({})).await.unwrap();
    }

    let ids: Vec<String> = server
        .requests()
        .iter()
        .map(|request| request["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
}
