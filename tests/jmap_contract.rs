//! The HTTP client and the full pipeline against a mock JMAP server.

use fastmail_mcp::config::Credentials;
use fastmail_mcp::error::{Error, ExecutionError};
use fastmail_mcp::jmap::{JmapClient, Transport};
use fastmail_mcp::mapper::DisplayZone;
use fastmail_mcp::service::MailService;
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn session_body(server: &MockServer) -> Value {
    session_with_accounts(server, &["u1"])
}

fn session_with_accounts(server: &MockServer, ids: &[&str]) -> Value {
    let accounts: Map<String, Value> = ids
        .iter()
        .map(|id| {
            let account = json!({ "name": format!("{}@example.com", id), "isPersonal": true, "isReadOnly": false });
            (id.to_string(), account)
        })
        .collect();
    json!({
        "capabilities": {
            "urn:ietf:params:jmap:core": {},
            "urn:ietf:params:jmap:mail": {}
        },
        "accounts": accounts,
        "primaryAccounts": { "urn:ietf:params:jmap:mail": "u1" },
        "username": "me@example.com",
        "apiUrl": format!("{}/jmap/api/", server.uri()),
        "state": "s1"
    })
}

async fn mount_session(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(server)))
        .mount(server)
        .await;
}

fn token() -> Credentials {
    Credentials::Token("tok".into())
}

/// A tiny JMAP server: two mailboxes and two messages from alice.
/// `Email/get` answers in reverse request order.
struct MailApi;

impl MailApi {
    fn mailboxes() -> Vec<Value> {
        vec![
            json!({ "id": "mb-inbox", "name": "Inbox", "role": "inbox" }),
            json!({ "id": "mb-archive", "name": "Archive", "role": "archive" }),
        ]
    }

    fn email(id: &str) -> Value {
        let older = id == "e1";
        let received_at = if older {
            "2024-01-10T15:30:00Z"
        } else {
            "2024-07-04T17:00:00Z"
        };
        json!({
            "id": id,
            "threadId": format!("t-{}", id),
            "mailboxIds": { "mb-inbox": true },
            "keywords": { "$seen": older },
            "receivedAt": received_at,
            "from": [{ "name": "Alice", "email": "alice@example.com" }],
            "subject": format!("Subject {}", id),
            "preview": "preview",
            "hasAttachment": false
        })
    }

    fn answer(name: &str, args: &Map<String, Value>) -> (String, Value) {
        let ids: Option<Vec<&str>> = args
            .get("ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect());

        match name {
            "Mailbox/get" => {
                let all = Self::mailboxes();
                let (list, not_found): (Vec<Value>, Vec<&str>) = match &ids {
                    None => (all, vec![]),
                    Some(ids) => (
                        all.into_iter()
                            .filter(|m| ids.contains(&m["id"].as_str().unwrap_or("")))
                            .collect(),
                        ids.iter()
                            .copied()
                            .filter(|id| !id.starts_with("mb-"))
                            .collect(),
                    ),
                };
                (name.into(), json!({ "accountId": "u1", "list": list, "notFound": not_found }))
            }
            "Email/query" => (
                name.into(),
                json!({ "accountId": "u1", "ids": ["e2", "e1"], "total": 2, "position": 0 }),
            ),
            "Email/get" => {
                let list: Vec<Value> = ids
                    .unwrap_or_default()
                    .into_iter()
                    .rev()
                    .map(Self::email)
                    .collect();
                (name.into(), json!({ "accountId": "u1", "list": list, "notFound": [] }))
            }
            _ => ("error".into(), json!({ "type": "unknownMethod" })),
        }
    }
}

impl Respond for MailApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let responses: Vec<Value> = body["methodCalls"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|call| {
                let name = call[0].as_str().unwrap_or("");
                let empty = Map::new();
                let args = call[1].as_object().unwrap_or(&empty);
                let (method, result) = Self::answer(name, args);
                json!([method, result, call[2]])
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "methodResponses": responses,
            "sessionState": "s1"
        }))
    }
}

#[tokio::test]
async fn test_session_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let session = client.session().await.unwrap();
    assert_eq!(session.username, "me@example.com");
    assert_eq!(session.primary_account_id("urn:ietf:params:jmap:mail"), Some("u1"));

    // Cached after the first fetch.
    client.session().await.unwrap();
}

#[tokio::test]
async fn test_session_uses_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .and(header(
            "authorization",
            "Basic bWVAZXhhbXBsZS5jb206YXBwLXBhc3M=",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials::Basic {
        username: "me@example.com".into(),
        password: "app-pass".into(),
    };
    let client = JmapClient::new(server.uri(), credentials).unwrap();
    client.session().await.unwrap();
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let err = client.session().await.unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::AuthFailure(_))));
    assert_eq!(err.code(), "AuthFailure");
}

#[tokio::test]
async fn test_server_errors_are_transport_failures() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/jmap/api/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let err = client
        .send(&["urn:ietf:params:jmap:mail"], vec![json!(["Mailbox/get", {}, "m0"])])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TransportFailure");
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_body(&server))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = JmapClient::with_timeout(server.uri(), token(), Duration::from_millis(100)).unwrap();
    let err = client.session().await.unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::Timeout)));
}

#[tokio::test]
async fn test_batch_declares_capabilities() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/jmap/api/"))
        .respond_with(MailApi)
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let responses = client
        .send(
            &["urn:ietf:params:jmap:mail"],
            vec![json!(["Mailbox/get", { "accountId": "u1" }, "m0"])],
        )
        .await
        .unwrap();
    assert_eq!(responses[0][0], "Mailbox/get");

    let requests = server.received_requests().await.unwrap();
    let post = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let body: Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(
        body["using"],
        json!(["urn:ietf:params:jmap:core", "urn:ietf:params:jmap:mail"])
    );
}

#[tokio::test]
async fn test_search_end_to_end() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/jmap/api/"))
        .respond_with(MailApi)
        .expect(3)
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let service = MailService::new(Arc::new(client), DisplayZone::default());

    let args = json!({ "sender": "alice@example.com", "mailbox": "inbox", "limit": "10" });
    let messages = service
        .messages_search(args.as_object().unwrap())
        .await
        .unwrap();

    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["e2", "e1"]);
    assert_eq!(messages[0].from, vec!["Alice <alice@example.com>"]);
    assert_eq!(messages[0].received_at.as_deref(), Some("2024-07-04 12:00 PM CDT"));
    assert_eq!(messages[1].received_at.as_deref(), Some("2024-01-10 09:30 AM CST"));
    assert!(messages[1].flags.read);
    assert!(!messages[0].flags.read);

    let requests = server.received_requests().await.unwrap();
    let query_call = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .flat_map(|body| body["methodCalls"].as_array().cloned().unwrap_or_default())
        .find(|call| call[0] == "Email/query")
        .unwrap();
    assert_eq!(
        query_call[1],
        json!({
            "accountId": "u1",
            "filter": {
                "operator": "AND",
                "conditions": [
                    { "from": "alice@example.com" },
                    { "inMailbox": "mb-inbox" }
                ]
            },
            "sort": [{ "property": "receivedAt", "isAscending": false }],
            "position": 0,
            "limit": 10
        })
    );
}

#[tokio::test]
async fn test_unknown_mailbox_stops_before_query() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/jmap/api/"))
        .respond_with(MailApi)
        .expect(1)
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let service = MailService::new(Arc::new(client), DisplayZone::default());

    let args = json!({ "mailbox_name": "Receipts" });
    let err = service
        .messages_list(args.as_object().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "mailbox not found: Receipts");
}

#[tokio::test]
async fn test_each_call_sees_current_accounts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_with_accounts(&server, &["u1"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jmap/session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(session_with_accounts(&server, &["u1", "u2"])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jmap/api/"))
        .respond_with(MailApi)
        .mount(&server)
        .await;

    let client = JmapClient::new(server.uri(), token()).unwrap();
    let service = MailService::new(Arc::new(client), DisplayZone::default());
    let args = json!({ "account_id": "u2" });

    let err = service
        .messages_list(args.as_object().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "account not found: u2");

    // Shared account granted after the first call.
    let messages = service
        .messages_list(args.as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);

    let session_fetches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(session_fetches, 2);
}
