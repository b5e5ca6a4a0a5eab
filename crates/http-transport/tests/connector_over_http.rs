// Integration tests: a connector definition executed over real HTTP against a
// mock server.

use std::sync::Arc;

use connector::{Bundle, Connector, ConnectorError, FailureOrigin};
use http_transport::{ReqwestTransport, TransportConfig};
use serde_json::json;

fn definition(base_url: &str) -> String {
    format!(
        r#"
        name = "helpdesk"

        [authentication]
        scheme = {{ type = "bearer", field = "token" }}
        fields = [{{ key = "token", required = true }}]

        [authentication.test]
        request = {{ url = "{base_url}/v1/health" }}

        [[actions]]
        name = "assign_ticket"
        noun = "Ticket"
        label = "Assign Ticket"
        fields = [{{ key = "ticket_id", required = true }}]
        request = {{ method = "POST", url = "{base_url}/v1/tickets/assign", body = {{ type = "json", constants = {{ agent_role = "senior" }} }} }}
        "#
    )
}

fn connector(base_url: &str) -> Connector {
    let transport = ReqwestTransport::new(&TransportConfig::default()).unwrap();
    Connector::from_toml_str(&definition(base_url), Arc::new(transport)).unwrap()
}

#[tokio::test]
async fn action_round_trips_through_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/tickets/assign")
        .match_header("authorization", "Bearer t0ken")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::Json(
            json!({ "ticket_id": "42", "agent_role": "senior" }),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":7}"#)
        .create_async()
        .await;

    let bundle = Bundle::new()
        .with_input("ticket_id", "42")
        .with_auth("token", "t0ken");
    let payload = connector(&server.url())
        .execute("assign_ticket", &bundle)
        .await
        .unwrap();

    assert_eq!(payload, json!({ "id": 7 }));
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_is_an_http_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/tickets/assign")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let bundle = Bundle::new()
        .with_input("ticket_id", "42")
        .with_auth("token", "t0ken");
    let err = connector(&server.url())
        .execute("assign_ticket", &bundle)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConnectorError::HttpError {
            status: 503,
            body: "maintenance".to_string()
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn invalid_bundle_never_hits_the_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/tickets/assign")
        .expect(0)
        .create_async()
        .await;

    let err = connector(&server.url())
        .execute("assign_ticket", &Bundle::new().with_auth("token", "t0ken"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "missing_field");
    mock.assert_async().await;
}

#[tokio::test]
async fn unsendable_token_is_a_local_failure() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/tickets/assign")
        .expect(0)
        .create_async()
        .await;

    let bundle = Bundle::new()
        .with_input("ticket_id", "42")
        .with_auth("token", "t0ken\r\nX-Injected: 1");
    let err = connector(&server.url())
        .execute("assign_ticket", &bundle)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "invalid_credential");
    assert_eq!(err.origin(), FailureOrigin::Local);
    mock.assert_async().await;
}

#[tokio::test]
async fn authentication_test_accepts_plain_ok() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/health")
        .match_header("authorization", "Bearer t0ken")
        .with_status(200)
        .with_body("OK")
        .create_async()
        .await;

    let payload = connector(&server.url())
        .execute("authentication_test", &Bundle::new().with_auth("token", "t0ken"))
        .await
        .unwrap();

    assert!(payload.is_null());
    mock.assert_async().await;
}
