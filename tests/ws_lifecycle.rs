//! Black-box connection lifecycle tests over real sockets: keepalive
//! ping cadence, read-deadline eviction, the close handshake on mailbox
//! closure, and single deregistration per teardown.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use pulseboard::ws::connection::{ConnectionTiming, run_connection_with};
use pulseboard::ws::hub::Hub;
use pulseboard::ws::messages::Action;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone)]
struct TestState {
    hub: Hub,
    timing: ConnectionTiming,
}

async fn ws_route(ws: WebSocketUpgrade, State(state): State<TestState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection_with(socket, state.hub, state.timing))
}

/// Serves `/ws` on an ephemeral port with the given lifecycle timing.
async fn start_server(timing: ConnectionTiming) -> (Hub, SocketAddr) {
    let (hub, runner) = Hub::new(64, 8);
    tokio::spawn(runner.run());

    let app = Router::new()
        .route("/ws", get(ws_route))
        .with_state(TestState { hub: hub.clone(), timing });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (hub, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

/// Next text frame as JSON, skipping control frames. Reading also
/// answers server pings, which keeps the client within its deadline.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(3), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Reads until a `user_count` frame with the given count arrives.
async fn await_user_count(client: &mut Client, count: u64) {
    loop {
        let frame = next_json(client).await;
        if frame["action"] == "user_count" && frame["data"]["count"] == count {
            return;
        }
    }
}

#[tokio::test]
async fn keepalive_pings_flow_and_connection_stays_registered() {
    let timing = ConnectionTiming {
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(5),
        ping_period: Duration::from_millis(150),
    };
    let (hub, addr) = start_server(timing).await;
    let mut client = connect(addr).await;

    await_user_count(&mut client, 1).await;

    // Several keepalive pings arrive on schedule.
    let mut pings = 0;
    while pings < 3 {
        let msg = timeout(Duration::from_secs(3), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if matches!(msg, Message::Ping(_)) {
            pings += 1;
        }
    }

    // Well past several ping periods the connection is still registered:
    // a broadcast reaches it.
    hub.publish(Action::DeleteEvent, &json!({ "id": 7 }));
    loop {
        let frame = next_json(&mut client).await;
        if frame["action"] == "delete_event" {
            assert_eq!(frame["data"]["id"], 7);
            break;
        }
    }
}

#[tokio::test]
async fn silent_peer_is_evicted_and_receives_close_handshake() {
    let timing = ConnectionTiming {
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_millis(400),
        ping_period: Duration::from_secs(30),
    };
    let (_hub, addr) = start_server(timing).await;
    let mut client = connect(addr).await;

    // Never read or write, so no pongs flow back; the read deadline
    // expires and the hub drops the mailbox.
    tokio::time::sleep(Duration::from_millis(900)).await;

    // Draining the socket now yields the buffered registration frame
    // followed by the server's close handshake.
    let mut saw_close = false;
    loop {
        match timeout(Duration::from_secs(2), client.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | None => {
                saw_close = true;
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(_)) => break,
        }
    }
    assert!(saw_close, "evicted peer never saw a close frame");
}

#[tokio::test]
async fn eviction_announces_user_count_exactly_once() {
    let timing = ConnectionTiming {
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_millis(700),
        ping_period: Duration::from_millis(150),
    };
    let (hub, addr) = start_server(timing).await;

    // The observer keeps reading, so its auto-pongs reset its deadline.
    let mut observer = connect(addr).await;
    await_user_count(&mut observer, 1).await;

    // The silent peer never polls, so it never answers pings.
    let silent = connect(addr).await;
    await_user_count(&mut observer, 2).await;

    await_user_count(&mut observer, 1).await;

    // Both lifecycle loops of the dead connection funnel through the
    // same idempotent deregistration, so exactly one count change is
    // announced: the next data frame is the broadcast, not a repeat.
    hub.publish(Action::DeleteEvent, &json!({ "id": 11 }));
    let frame = next_json(&mut observer).await;
    assert_eq!(frame["action"], "delete_event");

    drop(silent);
}

#[tokio::test]
async fn client_close_frame_triggers_deregistration() {
    let timing = ConnectionTiming {
        write_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(5),
        ping_period: Duration::from_millis(150),
    };
    let (_hub, addr) = start_server(timing).await;

    let mut observer = connect(addr).await;
    await_user_count(&mut observer, 1).await;

    let mut closer = connect(addr).await;
    await_user_count(&mut observer, 2).await;

    closer.close(None).await.unwrap();
    await_user_count(&mut observer, 1).await;
}
