//! WebSocket transport integration tests
//!
//! The client against a real WebSocket server on a local port.

mod common;

use common::{default_reply, mock_response, MockWsServer};
use jsonservices_client::ClientBuilder;
use jsonservices_core::{VersionRequest, CONNECTION_FAILED};
use serde_json::json;

#[tokio::test]
async fn test_websocket_round_trip() {
    let mut server = MockWsServer::with_handler(|request| async move {
        match request["method"].as_str() {
            Some("rpc.version") => Some(mock_response(
                &request,
                json!({"ProductName": "Demo", "ProductVersion": "3.1", "EngineVersion": "1.0"}),
            )),
            _ => default_reply(&request),
        }
    })
    .await;

    let client = ClientBuilder::new(server.url()).connect().await.unwrap();
    assert_eq!(client.session_id().as_deref(), Some("abc"));

    let version = client.call(&VersionRequest::default()).await.unwrap();
    assert_eq!(version.product_version, "3.1");

    let auth = server.next_message().await.unwrap();
    assert_eq!(auth["method"], "rpc.authenticate");
    let call = server.next_message().await.unwrap();
    assert_eq!(call["method"], "rpc.version");

    client.disconnect().await;
    let logout = server.next_message().await.unwrap();
    assert_eq!(logout["method"], "rpc.logout");
    assert!(!client.is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_websocket_connect_failure() {
    let client = ClientBuilder::new("ws://127.0.0.1:1").without_reconnect().build().unwrap();

    let err = client.connect().await.unwrap_err();

    assert_eq!(err.code(), Some(CONNECTION_FAILED));
    assert!(err.to_string().starts_with("Couldn't connect to ws://127.0.0.1:1"));
}
