//! The WebSocket connector end to end, against a loopback tungstenite server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

use murmur_client::{HistoryError, HistorySource, SessionEngine, WsConnector};
use murmur_crypto::{Cipher, PreSharedKey};
use murmur_types::api::Identity;
use murmur_types::{ConnectionStatus, EncryptedEnvelope, UserId};

struct NoHistory;

impl HistorySource for NoHistory {
    fn fetch(&self, _room_id: &str) -> BoxFuture<'static, Result<Vec<EncryptedEnvelope>, HistoryError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

fn cipher() -> Cipher {
    Cipher::new(PreSharedKey::from_passphrase("change-me"))
}

fn engine(ws_base: Url) -> SessionEngine {
    SessionEngine::new(
        Identity::new(UserId::from("1"), "alice", "tok-xyz"),
        cipher(),
        ws_base,
        Arc::new(NoHistory),
        Arc::new(WsConnector::new()),
    )
}

async fn pump_until(engine: &mut SessionEngine, done: impl Fn(&SessionEngine) -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done(engine) {
            engine.process_next().await;
        }
    })
    .await
    .expect("timed out waiting for the engine");
}

#[tokio::test]
async fn exchanges_frames_with_a_live_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = oneshot::channel::<String>();
    let (seen_tx, seen_rx) = oneshot::channel::<String>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        })
        .await
        .unwrap();

        let greeting = json!({
            "sender_id": 2,
            "encrypted_content": cipher().encrypt("welcome").unwrap(),
            "created_at": "2024-05-01T12:00:00Z"
        });
        ws.send(WsMessage::text(greeting.to_string())).await.unwrap();

        let mut seen_tx = Some(seen_tx);
        let mut saw_close = false;
        while let Some(Ok(frame)) = ws.next().await {
            match frame {
                WsMessage::Text(text) => {
                    if let Some(tx) = seen_tx.take() {
                        let _ = tx.send(text.as_str().to_owned());
                    }
                    // Broadcast back the way the server does
                    let echo = json!({
                        "sender_id": "1",
                        "encrypted_content": text.as_str(),
                        "created_at": "2024-05-01T12:00:05Z"
                    });
                    ws.send(WsMessage::text(echo.to_string())).await.unwrap();
                }
                WsMessage::Close(_) => {
                    saw_close = true;
                    break;
                }
                _ => {}
            }
        }
        saw_close
    });

    let mut engine = engine(Url::parse(&format!("ws://{}", addr)).unwrap());
    engine.select_room("general").unwrap();

    let uri = uri_rx.await.unwrap();
    assert_eq!(uri, "/ws/general?token=tok-xyz");

    pump_until(&mut engine, |e| {
        e.status() == ConnectionStatus::Connected && !e.timeline().is_empty()
    })
    .await;
    assert_eq!(engine.timeline()[0].text, "welcome");
    assert!(!engine.timeline()[0].is_own);

    engine.send_message("hello back").unwrap();
    let raw = seen_rx.await.unwrap();
    assert_eq!(cipher().decrypt(&raw).unwrap(), "hello back");

    pump_until(&mut engine, |e| e.timeline().len() == 2).await;
    assert_eq!(engine.timeline()[1].text, "hello back");
    assert!(engine.timeline()[1].is_own);

    engine.teardown();
    let saw_close = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server did not finish")
        .unwrap();
    assert!(saw_close);
}

#[tokio::test]
async fn refused_connection_reports_an_error() {
    // Grab a free port, then release it so nothing is listening.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

    let mut engine = engine(Url::parse(&format!("ws://{}", addr)).unwrap());
    engine.select_room("general").unwrap();

    pump_until(&mut engine, |e| e.status() == ConnectionStatus::Errored).await;
    assert!(
        engine
            .last_error()
            .is_some_and(|e| e.starts_with("Connection error: "))
    );
    assert!(engine.send_message("anyone?").is_err());
}

#[tokio::test]
async fn server_close_leaves_the_room_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;
    });

    let mut engine = engine(Url::parse(&format!("ws://{}", addr)).unwrap());
    engine.select_room("general").unwrap();

    pump_until(&mut engine, |e| e.status() == ConnectionStatus::Disconnected).await;
    assert_eq!(engine.room(), Some("general"));
}

#[tokio::test]
async fn switching_rooms_closes_the_previous_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (path_tx, mut path_rx) = mpsc::unbounded_channel::<String>();
    let (ended_tx, ended_rx) = oneshot::channel::<bool>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let tx = path_tx.clone();
        let mut first = accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = tx.send(req.uri().path().to_string());
            Ok(resp)
        })
        .await
        .unwrap();
        tokio::spawn(async move {
            let frame = first.next().await;
            let _ = ended_tx.send(matches!(frame, Some(Ok(WsMessage::Close(_))) | None));
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut second = accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = path_tx.send(req.uri().path().to_string());
            Ok(resp)
        })
        .await
        .unwrap();
        while let Some(Ok(_)) = second.next().await {}
    });

    let mut engine = engine(Url::parse(&format!("ws://{}", addr)).unwrap());
    engine.select_room("A").unwrap();
    assert_eq!(path_rx.recv().await.as_deref(), Some("/ws/A"));
    pump_until(&mut engine, |e| e.status() == ConnectionStatus::Connected).await;

    engine.select_room("B").unwrap();
    let ended = tokio::time::timeout(Duration::from_secs(10), ended_rx)
        .await
        .expect("first socket was left open")
        .unwrap();
    assert!(ended);
    assert_eq!(path_rx.recv().await.as_deref(), Some("/ws/B"));

    pump_until(&mut engine, |e| e.status() == ConnectionStatus::Connected).await;
    assert_eq!(engine.room(), Some("B"));
}

#[tokio::test]
async fn teardown_while_connecting_abandons_the_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, accepted_rx) = oneshot::channel::<()>();
    let (gone_tx, gone_rx) = oneshot::channel::<()>();

    // Accepts TCP but never answers the upgrade request
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = accepted_tx.send(());
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = gone_tx.send(());
    });

    let mut engine = engine(Url::parse(&format!("ws://{}", addr)).unwrap());
    engine.select_room("general").unwrap();
    accepted_rx.await.unwrap();
    assert_eq!(engine.status(), ConnectionStatus::Connecting);

    engine.teardown();
    tokio::time::timeout(Duration::from_secs(10), gone_rx)
        .await
        .expect("client kept the half-open connection")
        .unwrap();

    assert_eq!(engine.status(), ConnectionStatus::Disconnected);
    assert_eq!(engine.room(), None);
    assert_eq!(engine.process_pending(), 0);
}
