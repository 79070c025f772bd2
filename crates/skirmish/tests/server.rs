//! End-to-end tests: a real server on a random port, driven by
//! tokio-tungstenite clients speaking the JSON envelope protocol.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use skirmish::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const STEP: Duration = Duration::from_secs(2);

struct TestServer {
    addr: String,
    shutdown: CancellationToken,
    matchmaker: std::sync::Arc<Matchmaker>,
    task: JoinHandle<Result<(), SkirmishError>>,
}

async fn start_with(builder: SkirmishServerBuilder) -> TestServer {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let shutdown = server.shutdown_token();
    let matchmaker = server.matchmaker();
    let task = tokio::spawn(server.run());

    TestServer {
        addr,
        shutdown,
        matchmaker,
        task,
    }
}

async fn start_server() -> TestServer {
    start_with(SkirmishServer::builder()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

async fn join(ws: &mut ClientWs, name: &str) {
    send(ws, json!({ "type": "join", "data": { "name": name } })).await;
}

async fn choose(ws: &mut ClientWs, choice: &str) {
    send(ws, json!({ "type": "make_choice", "data": { "choice": choice } })).await;
}

/// Reads the next event, skipping control frames.
async fn recv(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(STEP, ws.next())
            .await
            .expect("event should arrive in time")
            .expect("stream should stay open")
            .expect("frame should be valid");
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                return serde_json::from_slice(&msg.into_data()).expect("decode");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn recv_type(ws: &mut ClientWs, kind: &str) -> Value {
    let event = recv(ws).await;
    assert_eq!(event["type"], kind, "got {event}");
    event["data"].clone()
}

/// Waits until the server closes the connection.
async fn expect_closed(ws: &mut ClientWs) {
    tokio::time::timeout(STEP, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("server should close the connection");
}

/// Sends a raw HTTP request and returns the full response text.
async fn http_get(addr: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("tcp connect");
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut response = String::new();
    tokio::time::timeout(STEP, stream.read_to_string(&mut response))
        .await
        .expect("response in time")
        .expect("read");
    response
}

async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(STEP, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Connects Alice and Bob and plays them into round one.
async fn matched_pair(addr: &str) -> (ClientWs, ClientWs) {
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "Alice").await;
    recv_type(&mut alice, "waiting").await;
    join(&mut bob, "Bob").await;

    for ws in [&mut alice, &mut bob] {
        recv_type(ws, "match_found").await;
        recv_type(ws, "round_start").await;
    }
    (alice, bob)
}

// =========================================================================
// HTTP routing
// =========================================================================

#[tokio::test]
async fn test_health_check_returns_ok() {
    let server = start_server().await;
    let response = http_get(&server.addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("OK"), "{response}");
}

#[tokio::test]
async fn test_unknown_path_returns_not_found() {
    let server = start_server().await;
    let response = http_get(&server.addr, "/admin").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
}

#[tokio::test]
async fn test_custom_paths_are_served() {
    let server = start_with(SkirmishServer::builder().ws_path("/play").health_path("/live")).await;

    let response = http_get(&server.addr, "/live").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    let response = http_get(&server.addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/play", server.addr))
        .await
        .expect("should connect on the custom path");
    join(&mut ws, "Alice").await;
    recv_type(&mut ws, "waiting").await;
}

#[tokio::test]
async fn test_build_rejects_clashing_paths() {
    let result = SkirmishServer::builder()
        .bind("127.0.0.1:0")
        .ws_path("/ws")
        .health_path("/ws")
        .build()
        .await;
    assert!(matches!(result, Err(SkirmishError::Transport(_))));
}

// =========================================================================
// Full game flow
// =========================================================================

#[tokio::test]
async fn test_two_clients_full_game_then_play_again() {
    let server = start_server().await;
    let mut alice = connect(&server.addr).await;
    let mut bob = connect(&server.addr).await;

    join(&mut alice, "Alice").await;
    assert_eq!(recv(&mut alice).await, json!({ "type": "waiting", "data": {} }));

    join(&mut bob, "Bob").await;
    assert_eq!(recv_type(&mut alice, "match_found").await["opponent_name"], "Bob");
    assert_eq!(recv_type(&mut bob, "match_found").await["opponent_name"], "Alice");
    for ws in [&mut alice, &mut bob] {
        assert_eq!(recv_type(ws, "round_start").await["round_number"], 1);
    }

    // Round 1: rock beats scissors.
    choose(&mut alice, "rock").await;
    choose(&mut bob, "scissors").await;
    assert_eq!(
        recv_type(&mut alice, "round_result").await,
        json!({ "result": "win", "your_choice": "rock", "opponent_choice": "scissors" })
    );
    assert_eq!(
        recv_type(&mut bob, "round_result").await,
        json!({ "result": "lose", "your_choice": "scissors", "opponent_choice": "rock" })
    );
    for ws in [&mut alice, &mut bob] {
        assert_eq!(recv_type(ws, "round_start").await["round_number"], 2);
    }

    // Round 2: paper beats rock, Alice takes the game.
    choose(&mut bob, "rock").await;
    choose(&mut alice, "paper").await;
    recv_type(&mut alice, "round_result").await;
    recv_type(&mut bob, "round_result").await;
    assert_eq!(
        recv_type(&mut alice, "game_ended").await,
        json!({ "result": "win", "score": "2-0" })
    );
    assert_eq!(
        recv_type(&mut bob, "game_ended").await,
        json!({ "result": "lose", "score": "0-2" })
    );

    let matchmaker = &server.matchmaker;
    eventually(|| matchmaker.session_count() == 0).await;

    send(&mut alice, json!({ "type": "play_again" })).await;
    recv_type(&mut alice, "waiting").await;
    send(&mut bob, json!({ "type": "play_again", "data": {} })).await;
    assert_eq!(recv_type(&mut bob, "match_found").await["opponent_name"], "Alice");
    assert_eq!(recv_type(&mut bob, "round_start").await["round_number"], 1);
}

// =========================================================================
// Rejections and malformed input
// =========================================================================

#[tokio::test]
async fn test_malformed_messages_are_ignored() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;

    ws.send(Message::Text("not json".to_string().into())).await.unwrap();
    send(&mut ws, json!({ "type": "teleport", "data": {} })).await;
    send(&mut ws, json!({ "type": "join", "data": {} })).await;

    // Still connected and served.
    join(&mut ws, "Alice").await;
    recv_type(&mut ws, "waiting").await;
}

#[tokio::test]
async fn test_duplicate_waiting_name_gets_error_event() {
    let server = start_server().await;
    let mut first = connect(&server.addr).await;
    let mut second = connect(&server.addr).await;

    join(&mut first, "Alice").await;
    recv_type(&mut first, "waiting").await;
    join(&mut second, "Alice").await;

    let error = recv_type(&mut second, "error").await;
    assert!(error["message"].as_str().unwrap().contains("already taken"));
    assert_eq!(server.matchmaker.waiting_count(), 1);
}

#[tokio::test]
async fn test_empty_name_gets_error_event() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;
    join(&mut ws, "").await;
    assert_eq!(
        recv_type(&mut ws, "error").await["message"],
        "name cannot be empty"
    );
}

#[tokio::test]
async fn test_invalid_choice_gets_error_event() {
    let server = start_server().await;
    let (mut alice, mut bob) = matched_pair(&server.addr).await;

    choose(&mut alice, "lizard").await;
    let error = recv_type(&mut alice, "error").await;
    assert!(error["message"].as_str().unwrap().contains("rock, paper, or scissors"));

    // The round is still open.
    choose(&mut alice, "paper").await;
    choose(&mut bob, "paper").await;
    assert_eq!(recv_type(&mut alice, "round_result").await["result"], "draw");
}

#[tokio::test]
async fn test_choice_outside_match_gets_error_event() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;
    choose(&mut ws, "rock").await;
    assert_eq!(recv_type(&mut ws, "error").await["message"], "not in a match");
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_disconnect_event_closes_connection() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;
    join(&mut ws, "Alice").await;
    recv_type(&mut ws, "waiting").await;

    send(&mut ws, json!({ "type": "disconnect" })).await;
    expect_closed(&mut ws).await;

    let matchmaker = &server.matchmaker;
    eventually(|| matchmaker.endpoint_count() == 0 && matchmaker.waiting_count() == 0).await;
}

#[tokio::test]
async fn test_drop_mid_match_forfeits_to_opponent() {
    let server = start_server().await;
    let (alice, mut bob) = matched_pair(&server.addr).await;

    drop(alice);

    assert_eq!(
        recv_type(&mut bob, "game_ended").await,
        json!({ "result": "win", "score": "0-0" })
    );
    let matchmaker = &server.matchmaker;
    eventually(|| matchmaker.session_count() == 0).await;

    // Bob can queue again straight away.
    send(&mut bob, json!({ "type": "play_again" })).await;
    recv_type(&mut bob, "waiting").await;
}

// =========================================================================
// Keepalive and deadlines
// =========================================================================

#[tokio::test]
async fn test_idle_connection_is_pinged() {
    let server = start_with(
        SkirmishServer::builder().ping_interval(Duration::from_millis(50)),
    )
    .await;
    let mut ws = connect(&server.addr).await;

    let frame = tokio::time::timeout(STEP, ws.next())
        .await
        .expect("ping in time")
        .expect("open")
        .expect("valid");
    assert!(matches!(frame, Message::Ping(_)), "got {frame:?}");
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let server = start_with(
        SkirmishServer::builder()
            .ping_interval(Duration::from_secs(30))
            .read_timeout(Duration::from_millis(200)),
    )
    .await;
    let mut ws = connect(&server.addr).await;

    expect_closed(&mut ws).await;
    let matchmaker = &server.matchmaker;
    eventually(|| matchmaker.endpoint_count() == 0).await;
}

#[tokio::test]
async fn test_pongs_keep_connection_alive() {
    let server = start_with(
        SkirmishServer::builder()
            .ping_interval(Duration::from_millis(50))
            .read_timeout(Duration::from_millis(300)),
    )
    .await;
    let mut ws = connect(&server.addr).await;

    // Reading answers pings with pongs; keep at it well past the deadline.
    let keepalive = tokio::time::timeout(Duration::from_millis(900), async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
    assert!(keepalive.is_err(), "connection closed despite pongs");

    join(&mut ws, "Alice").await;
    recv_type(&mut ws, "waiting").await;
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_clients_and_stops_run() {
    let server = start_server().await;
    let (mut alice, mut bob) = matched_pair(&server.addr).await;
    let mut lurker = connect(&server.addr).await;

    server.shutdown.cancel();

    tokio::time::timeout(STEP, server.task)
        .await
        .expect("run should return")
        .expect("task should not panic")
        .expect("run should succeed");

    for ws in [&mut alice, &mut bob, &mut lurker] {
        expect_closed(ws).await;
    }
    assert!(server.matchmaker.is_closed());
    assert_eq!(server.matchmaker.session_count(), 0);
    assert!(TcpStream::connect(&server.addr).await.is_err());
}
