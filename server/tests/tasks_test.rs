//! Integration tests for task CRUD over REST and the realtime events it publishes.

use futures_util::StreamExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use taskboard_server::auth::jwt;
use taskboard_server::state::AppState;
use taskboard_server::ws::UserId;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JWT_SECRET: &[u8] = b"tasks-test-secret";

/// Helper: start the server on a random port and return (base_url, addr, state).
/// Guests 1 and 2 exist so `token_for(1)` and `token_for(2)` are accepted.
async fn start_test_server() -> (String, SocketAddr, AppState) {
    let state = AppState::new(JWT_SECRET.to_vec());
    state.users.create_guest();
    state.users.create_guest();
    let app = taskboard_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (format!("http://{}", addr), addr, state)
}

fn token_for(user_id: i64) -> String {
    jwt::issue_access_token(JWT_SECRET, UserId(user_id), 30).expect("Failed to issue token")
}

/// Connect a WebSocket and consume the initial presence snapshot.
async fn connect_ws(addr: SocketAddr, token: &str) -> Client {
    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    let presence = next_event(&mut ws).await;
    assert_eq!(presence["type"], "presence_update");
    ws
}

async fn next_event(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected a message within timeout")
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("Event should be JSON")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text event, got: {:?}", other),
        }
    }
}

async fn create_task(client: &reqwest::Client, base_url: &str, token: &str, body: Value) -> Value {
    let resp = client
        .post(format!("{}/api/v1/tasks", base_url))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_and_root() {
    let (base_url, _addr, _state) = start_test_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({"status": "healthy"}));

    let root: Value = client
        .get(format!("{}/", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_tasks_require_bearer_token() {
    let (base_url, _addr, _state) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/tasks", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/api/v1/tasks", base_url))
        .bearer_auth("invalid_token")
        .json(&json!({"title": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Validly signed token for a user the directory has never seen
    let resp = client
        .get(format!("{}/api/v1/tasks", base_url))
        .bearer_auth(token_for(99))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_task_create_broadcast() {
    let (base_url, addr, _state) = start_test_server().await;
    let token = token_for(1);
    let mut ws = connect_ws(addr, &token).await;
    let client = reqwest::Client::new();

    let task = create_task(&client, &base_url, &token, json!({"title": "Test Task"})).await;
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["owner_id"], 1);

    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "task_created");
    assert_eq!(event["task"], task);
}

#[tokio::test]
async fn test_task_create_reaches_other_users() {
    let (base_url, addr, _state) = start_test_server().await;
    let owner_token = token_for(1);
    let mut watcher = connect_ws(addr, &token_for(2)).await;
    let client = reqwest::Client::new();

    let task = create_task(&client, &base_url, &owner_token, json!({"title": "Shared"})).await;

    let event = next_event(&mut watcher).await;
    assert_eq!(event["type"], "task_created");
    assert_eq!(event["task"]["id"], task["id"]);
}

#[tokio::test]
async fn test_task_update_broadcast() {
    let (base_url, addr, _state) = start_test_server().await;
    let token = token_for(1);
    let client = reqwest::Client::new();
    let task = create_task(&client, &base_url, &token, json!({"title": "Original Title"})).await;
    let task_id = task["id"].as_i64().unwrap();

    let mut ws = connect_ws(addr, &token).await;

    let resp = client
        .put(format!("{}/api/v1/tasks/{}", base_url, task_id))
        .bearer_auth(&token)
        .json(&json!({"title": "Updated Title", "status": "in_progress"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "task_updated");
    assert_eq!(event["task"]["id"], task_id);
    assert_eq!(event["task"]["title"], "Updated Title");
    assert_eq!(event["task"]["status"], "in_progress");
}

#[tokio::test]
async fn test_task_update_null_clears_assignee() {
    let (base_url, addr, _state) = start_test_server().await;
    let token = token_for(1);
    let client = reqwest::Client::new();
    let task = create_task(
        &client,
        &base_url,
        &token,
        json!({"title": "Pair on it", "description": "with Bob", "assigned_to_id": 2}),
    )
    .await;
    assert_eq!(task["assigned_to_id"], 2);
    let task_id = task["id"].as_i64().unwrap();

    let mut ws = connect_ws(addr, &token).await;

    let updated: Value = client
        .put(format!("{}/api/v1/tasks/{}", base_url, task_id))
        .bearer_auth(&token)
        .json(&json!({"assigned_to_id": null}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["assigned_to_id"], Value::Null);
    // Omitted fields are left alone
    assert_eq!(updated["description"], "with Bob");

    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "task_updated");
    assert_eq!(event["task"]["assigned_to_id"], Value::Null);
}

#[tokio::test]
async fn test_task_delete_broadcast() {
    let (base_url, addr, state) = start_test_server().await;
    let token = token_for(1);
    let client = reqwest::Client::new();
    let task = create_task(&client, &base_url, &token, json!({"title": "Task to Delete"})).await;
    let task_id = task["id"].as_i64().unwrap();

    let mut ws = connect_ws(addr, &token).await;

    let resp = client
        .delete(format!("{}/api/v1/tasks/{}", base_url, task_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let event = next_event(&mut ws).await;
    assert_eq!(event, json!({"type": "task_deleted", "task_id": task_id}));
    assert!(state.tasks.is_empty());
}

#[tokio::test]
async fn test_mutation_succeeds_with_nobody_connected() {
    let (base_url, _addr, state) = start_test_server().await;
    let token = token_for(1);
    let client = reqwest::Client::new();

    create_task(&client, &base_url, &token, json!({"title": "Quiet"})).await;

    assert_eq!(state.connections.user_count(), 0);
    assert_eq!(state.tasks.len(), 1);
}

#[tokio::test]
async fn test_tasks_are_scoped_to_owner() {
    let (base_url, _addr, _state) = start_test_server().await;
    let alice = token_for(1);
    let bob = token_for(2);
    let client = reqwest::Client::new();
    let task = create_task(&client, &base_url, &alice, json!({"title": "Alice only"})).await;
    let task_id = task["id"].as_i64().unwrap();

    let listed: Vec<Value> = client
        .get(format!("{}/api/v1/tasks", base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    let resp = client
        .get(format!("{}/api/v1/tasks/{}", base_url, task_id))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .delete(format!("{}/api/v1/tasks/{}", base_url, task_id))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let fetched: Value = client
        .get(format!("{}/api/v1/tasks/{}", base_url, task_id))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, task);
}

#[tokio::test]
async fn test_task_title_validation() {
    let (base_url, _addr, state) = start_test_server().await;
    let token = token_for(1);
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/v1/tasks", base_url))
        .bearer_auth(&token)
        .json(&json!({"title": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = client
        .post(format!("{}/api/v1/tasks", base_url))
        .bearer_auth(&token)
        .json(&json!({"title": "ok", "status": "someday"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    assert!(state.tasks.is_empty());
}

#[tokio::test]
async fn test_presence_endpoints() {
    let (base_url, addr, _state) = start_test_server().await;
    let token = token_for(1);
    let _ws = connect_ws(addr, &token).await;
    let client = reqwest::Client::new();

    let online: Value = client
        .get(format!("{}/api/v1/presence", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(online, json!({"users": [1]}));

    let me: Value = client
        .get(format!("{}/api/v1/presence/1", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["user_id"], 1);
    assert_eq!(me["is_online"], true);
    assert!(me["connected_at"].is_string());

    let other: Value = client
        .get(format!("{}/api/v1/presence/999", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other, json!({"user_id": 999, "is_online": false}));

    let resp = client
        .get(format!("{}/api/v1/presence", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
