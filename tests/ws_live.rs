//! Live tally delivery over the `/ws` endpoint.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

use bright4event::api;
use bright4event::app_state::AppState;
use bright4event::config::AppConfig;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = api::build_app(AppState::new(AppConfig::default()));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn post(client: &Client, url: String, token: &str, body: Value) -> Value {
    let Ok(response) = client.post(url).bearer_auth(token).json(&body).send().await else {
        panic!("request failed");
    };
    assert!(response.status().is_success(), "status {}", response.status());
    response.json::<Value>().await.unwrap_or(Value::Null)
}

fn str_at(body: &Value, pointer: &str) -> String {
    let Some(value) = body.pointer(pointer).and_then(Value::as_str) else {
        panic!("missing {pointer} in {body}");
    };
    value.to_string()
}

async fn send_command(ws: &mut WsStream, id: &str, payload: Value) {
    let frame = json!({ "id": id, "type": "command", "payload": payload });
    if ws.send(Message::text(frame.to_string())).await.is_err() {
        panic!("ws send failed");
    }
}

/// Reads frames until one satisfies `want`, failing after a timeout.
async fn next_matching(ws: &mut WsStream, want: impl Fn(&Value) -> bool) -> Value {
    let read = async {
        while let Some(frame) = ws.next().await {
            let Ok(Message::Text(text)) = frame else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                continue;
            };
            if want(&value) {
                return value;
            }
        }
        panic!("ws closed");
    };
    let Ok(value) = tokio::time::timeout(Duration::from_secs(5), read).await else {
        panic!("timed out waiting for ws message");
    };
    value
}

#[tokio::test]
async fn subscribers_receive_tally_updates_and_can_resync() {
    let addr = spawn_server().await;
    let base = format!("http://{addr}");
    let client = Client::new();

    let Ok(response) = client
        .post(format!("{base}/api/auth/signup"))
        .json(&json!({ "email": "led@bright.vn", "password": "led-screen-1" }))
        .send()
        .await
    else {
        panic!("signup failed");
    };
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    let admin = str_at(&body, "/data/session/token");
    let event_id = str_at(&body, "/data/first_event/id");
    let code = str_at(&body, "/data/first_event/code");

    let Ok(response) = client
        .put(format!("{base}/api/events/{event_id}"))
        .bearer_auth(&admin)
        .json(&json!({ "show_live_results": true }))
        .send()
        .await
    else {
        panic!("update failed");
    };
    assert_eq!(response.status(), StatusCode::OK);

    let category = post(
        &client,
        format!("{base}/api/events/{event_id}/categories"),
        &admin,
        json!({ "name": "Song of the Night" }),
    )
    .await;
    let category_id = str_at(&category, "/data/id");
    let candidate = post(
        &client,
        format!("{base}/api/events/{event_id}/categories/{category_id}/candidates"),
        &admin,
        json!({ "name": "Mai" }),
    )
    .await;
    let candidate_id = str_at(&candidate, "/data/id");

    let Ok((mut ws, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };
    send_command(
        &mut ws,
        "sub-1",
        json!({ "command": "subscribe", "event_ids": [event_id] }),
    )
    .await;
    let ack = next_matching(&mut ws, |v| v.get("id") == Some(&json!("sub-1"))).await;
    assert_eq!(ack.get("type"), Some(&json!("response")));
    assert_eq!(ack.pointer("/payload/count"), Some(&json!(1)));

    let Ok(response) = client
        .post(format!("{base}/api/events/by-code/{code}/guests/auth"))
        .json(&json!({ "phone": "0903 111 222" }))
        .send()
        .await
    else {
        panic!("guest auth failed");
    };
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    let voter = str_at(&body, "/data/session/token");

    post(
        &client,
        format!("{base}/api/voter/ballot"),
        &voter,
        json!({ "selections": [{ "category_id": category_id, "candidate_ids": [candidate_id] }] }),
    )
    .await;

    let update = next_matching(&mut ws, |v| {
        v.pointer("/payload/event_type") == Some(&json!("tally_updated"))
    })
    .await;
    assert_eq!(update.get("type"), Some(&json!("event")));
    assert_eq!(update.pointer("/payload/total_votes"), Some(&json!(1)));

    send_command(
        &mut ws,
        "tally-1",
        json!({ "command": "get_tally", "event_id": event_id }),
    )
    .await;
    let tally = next_matching(&mut ws, |v| v.get("id") == Some(&json!("tally-1"))).await;
    assert_eq!(tally.get("type"), Some(&json!("response")));
    assert_eq!(
        tally.pointer("/payload/categories/0/total_votes"),
        Some(&json!(1))
    );
}

#[tokio::test]
async fn malformed_frames_get_an_error_reply() {
    let addr = spawn_server().await;
    let Ok((mut ws, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };
    if ws.send(Message::text("not json")).await.is_err() {
        panic!("ws send failed");
    }
    let reply = next_matching(&mut ws, |_| true).await;
    assert_eq!(reply.get("type"), Some(&json!("error")));
    assert_eq!(reply.pointer("/payload/code"), Some(&json!(400)));
}
