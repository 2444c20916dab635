//! Live channel protocol tests: a real server instance, real WebSocket
//! clients, join/send/receive over the wire.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use bazaar_server::build_router;
use bazaar_server::context::AppContext;

use common::{seed_user, test_context};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_server(ctx: AppContext) -> String {
    let app = build_router(ctx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

async fn connect(url: &str) -> WsClient {
    let (client, _response) = connect_async(url).await.expect("WebSocket upgrade failed");
    client
}

async fn send_json(client: &mut WsClient, value: Value) {
    client
        .send(WsMessage::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn recv_json(client: &mut WsClient) -> Value {
    loop {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a server event")
            .expect("connection closed")
            .expect("transport error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(client: &mut WsClient, ctx: &AppContext, user: Uuid) {
    let token = ctx.auth.create_token(user).unwrap();
    send_json(client, json!({"type": "join", "token": token})).await;
    let joined = recv_json(client).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["userId"], json!(user));
}

#[tokio::test]
async fn send_over_channel_echoes_to_both_parties() {
    let ctx = test_context().await;
    let alice = seed_user(&ctx, "alice").await;
    let bob = seed_user(&ctx, "bob").await;
    let url = spawn_server(ctx.clone()).await;

    let mut alice_ws = connect(&url).await;
    let mut bob_ws = connect(&url).await;
    join(&mut alice_ws, &ctx, alice).await;
    join(&mut bob_ws, &ctx, bob).await;

    send_json(
        &mut alice_ws,
        json!({"type": "send", "receiverId": bob, "text": "ahoy"}),
    )
    .await;

    for ws in [&mut alice_ws, &mut bob_ws] {
        let event = recv_json(ws).await;
        assert_eq!(event["type"], "receive");
        assert_eq!(event["message"]["text"], "ahoy");
        assert_eq!(event["message"]["senderId"], json!(alice));
    }
}

#[tokio::test]
async fn two_sessions_of_one_user_both_receive() {
    let ctx = test_context().await;
    let alice = seed_user(&ctx, "alice").await;
    let bob = seed_user(&ctx, "bob").await;
    let url = spawn_server(ctx.clone()).await;

    let mut bob_phone = connect(&url).await;
    let mut bob_laptop = connect(&url).await;
    join(&mut bob_phone, &ctx, bob).await;
    join(&mut bob_laptop, &ctx, bob).await;

    ctx.delivery
        .send(alice, common::draft(bob, "to all devices"))
        .await
        .unwrap();

    for ws in [&mut bob_phone, &mut bob_laptop] {
        let event = recv_json(ws).await;
        assert_eq!(event["type"], "receive");
        assert_eq!(event["message"]["text"], "to all devices");
    }
}

#[tokio::test]
async fn send_before_join_is_rejected() {
    let ctx = test_context().await;
    let bob = seed_user(&ctx, "bob").await;
    let url = spawn_server(ctx.clone()).await;

    let mut ws = connect(&url).await;
    send_json(
        &mut ws,
        json!({"type": "send", "receiverId": bob, "text": "sneaky"}),
    )
    .await;

    let event = recv_json(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn join_with_bad_token_is_rejected() {
    let ctx = test_context().await;
    let url = spawn_server(ctx).await;

    let mut ws = connect(&url).await;
    send_json(&mut ws, json!({"type": "join", "token": "bogus"})).await;

    let event = recv_json(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn invalid_send_surfaces_an_error_event_and_keeps_the_socket() {
    let ctx = test_context().await;
    let alice = seed_user(&ctx, "alice").await;
    let bob = seed_user(&ctx, "bob").await;
    let url = spawn_server(ctx.clone()).await;

    let mut ws = connect(&url).await;
    join(&mut ws, &ctx, alice).await;

    send_json(
        &mut ws,
        json!({"type": "send", "receiverId": bob, "text": "   "}),
    )
    .await;
    let event = recv_json(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["code"], "INVALID_MESSAGE");

    // The session is still live after the rejection.
    send_json(
        &mut ws,
        json!({"type": "send", "receiverId": bob, "text": "fine now"}),
    )
    .await;
    let event = recv_json(&mut ws).await;
    assert_eq!(event["type"], "receive");
    assert_eq!(event["message"]["text"], "fine now");
}

#[tokio::test]
async fn disconnected_session_is_unregistered() {
    let ctx = test_context().await;
    let alice = seed_user(&ctx, "alice").await;
    let bob = seed_user(&ctx, "bob").await;
    let url = spawn_server(ctx.clone()).await;

    let mut bob_ws = connect(&url).await;
    join(&mut bob_ws, &ctx, bob).await;
    bob_ws.close(None).await.unwrap();

    // Wait for the server side to observe the close.
    timeout(RECV_TIMEOUT, async {
        while !ctx.registry.sessions_for(bob).await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session was never unregistered");

    // Offline again: send persists without a push.
    ctx.delivery
        .send(alice, common::draft(bob, "while away"))
        .await
        .unwrap();
    assert!(ctx.registry.sessions_for(bob).await.is_empty());
}
