//! Integration tests for JsonRpcTransport against a mocked Odoo endpoint

use mockito::Matcher;
use odoo_connect::{Credentials, Endpoint, JsonRpcTransport, Transport, TransportError};
use serde_json::json;

fn transport_for(server: &mockito::ServerGuard) -> JsonRpcTransport {
    let endpoint = Endpoint::parse(&server.url()).unwrap();
    JsonRpcTransport::new(endpoint, Credentials::new("testdb", "admin", "secret")).unwrap()
}

#[tokio::test]
async fn test_connect_stores_uid_and_call_uses_it() {
    let mut server = mockito::Server::new_async().await;

    let auth = server
        .mock("POST", "/jsonrpc")
        .match_body(Matcher::PartialJson(json!({
            "params": {
                "service": "common",
                "method": "authenticate",
                "args": ["testdb", "admin", "secret", {}]
            }
        })))
        .with_header("content-type", "application/json")
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": 2}).to_string())
        .create_async()
        .await;

    let search = server
        .mock("POST", "/jsonrpc")
        .match_body(Matcher::PartialJson(json!({
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": ["testdb", 2, "secret", "res.partner", "search_read", [[], ["name"], 0, 2]]
            }
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": [{"id": 1, "name": "ACME"}, {"id": 2, "name": "Globex"}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let transport = transport_for(&server);
    transport.connect().await.unwrap();
    assert_eq!(transport.uid().await, Some(2));

    let result = transport
        .call("res.partner", "search_read", &[json!([[], ["name"], 0, 2])])
        .await
        .unwrap();
    assert_eq!(result.as_array().unwrap().len(), 2);

    auth.assert_async().await;
    search.assert_async().await;
}

#[tokio::test]
async fn test_bad_credentials_are_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _auth = server
        .mock("POST", "/jsonrpc")
        .with_header("content-type", "application/json")
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": false}).to_string())
        .create_async()
        .await;

    let transport = transport_for(&server);
    let result = transport.connect().await;

    assert!(matches!(
        result,
        Err(TransportError::AuthenticationRejected { .. })
    ));
    assert_eq!(transport.uid().await, None);
}

#[tokio::test]
async fn test_remote_error_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    let _auth = server
        .mock("POST", "/jsonrpc")
        .match_body(Matcher::PartialJson(json!({"params": {"service": "common"}})))
        .with_header("content-type", "application/json")
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": 2}).to_string())
        .create_async()
        .await;
    let _call = server
        .mock("POST", "/jsonrpc")
        .match_body(Matcher::PartialJson(json!({"params": {"service": "object"}})))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "error": {
                    "code": 200,
                    "message": "Odoo Server Error",
                    "data": {"name": "odoo.exceptions.AccessError", "message": "Not allowed"}
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let transport = transport_for(&server);
    transport.connect().await.unwrap();

    let err = transport
        .call("sale.order", "action_confirm", &[json!([7])])
        .await
        .unwrap_err();
    assert!(err.is_remote());
    assert_eq!(err.to_string(), "Remote error 200: Odoo Server Error: Not allowed");
}

#[tokio::test]
async fn test_http_failure_is_transport_error() {
    let mut server = mockito::Server::new_async().await;
    let _fail = server
        .mock("POST", "/jsonrpc")
        .with_status(502)
        .create_async()
        .await;

    let transport = transport_for(&server);
    assert!(matches!(
        transport.connect().await,
        Err(TransportError::Http(_))
    ));
}
