//! Integration tests for the server, handshake and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hnp::prelude::*;
use hnp_admin::{AdminClient, AdminError, AuthError, DEFAULT_ADMIN_HEADER, DEFAULT_ADMIN_SECRET};
use hnp_protocol::{CompiledProtocol, RejectCode, SystemFrame};
use hnp_schema::validate;
use hnp_transport::{memory_channel, MemoryClient, MemoryConnector};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Fixtures
// =========================================================================

fn schema() -> ValidatedSchema {
    let schema = ProtocolSchema::default()
        .message(MessageDef::heartbeat("ping"))
        .message(MessageDef::new("chat", Direction::Bidirectional).field(FieldDef::new("text", "string")));
    validate(&schema).unwrap()
}

fn chat(text: &str) -> Vec<u8> {
    let protocol = CompiledProtocol::compile(&schema());
    protocol
        .encode(&MessageInstance::new(1, vec![Some(Value::from(text))]))
        .unwrap()
}

fn join(room: Option<RoomId>) -> Vec<u8> {
    SystemFrame::Join {
        room,
        fingerprint: schema().fingerprint(),
    }
    .encode()
}

fn memory_server(config: ServerConfig) -> (MemoryConnector, TestServer) {
    let (transport, connector) = memory_channel();
    let server = HnpServerBuilder::new()
        .config(config)
        .build_with(transport, &schema())
        .unwrap();
    let manager = server.manager();
    let handle = server.handle();
    tokio::spawn(server.run());
    (connector, TestServer { manager, _stop: handle })
}

struct TestServer {
    manager: hnp_room::RoomManager,
    _stop: ServerHandle,
}

async fn next(client: &mut MemoryClient) -> Option<Vec<u8>> {
    tokio::time::timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("frame should arrive")
}

async fn joined(connector: &MemoryConnector, room: Option<RoomId>) -> (MemoryClient, RoomId) {
    let mut client = connector.connect().unwrap();
    client.send(join(room)).unwrap();
    match SystemFrame::decode(&next(&mut client).await.unwrap()).unwrap() {
        SystemFrame::Joined { room, connection } => {
            assert_eq!(connection, client.id());
            (client, room)
        }
        other => panic!("expected JOINED, got {other:?}"),
    }
}

async fn expect_rejected(client: &mut MemoryClient, code: RejectCode) {
    let frame = next(client).await.unwrap();
    assert_eq!(SystemFrame::decode(&frame).unwrap(), SystemFrame::Rejected { code });
    assert_eq!(next(client).await, None, "server should hang up after REJECTED");
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_join_and_relay() {
    let (connector, _server) = memory_server(ServerConfig::default());
    let (a, room_a) = joined(&connector, None).await;
    let (mut b, room_b) = joined(&connector, None).await;
    assert_eq!(room_a, room_b);

    a.send(chat("hi")).unwrap();
    assert_eq!(next(&mut b).await.unwrap(), chat("hi"));
}

#[tokio::test]
async fn test_fingerprint_mismatch_is_rejected() {
    let (connector, _server) = memory_server(ServerConfig::default());
    let mut client = connector.connect().unwrap();
    client
        .send(
            SystemFrame::Join {
                room: None,
                fingerprint: schema().fingerprint() ^ 1,
            }
            .encode(),
        )
        .unwrap();
    expect_rejected(&mut client, RejectCode::FingerprintMismatch).await;
}

#[tokio::test]
async fn test_first_frame_must_be_join() {
    let (connector, _server) = memory_server(ServerConfig::default());
    let mut client = connector.connect().unwrap();
    client.send(chat("too early")).unwrap();
    expect_rejected(&mut client, RejectCode::BadHandshake).await;
}

#[tokio::test]
async fn test_server_full_is_rejected() {
    let config = ServerConfig {
        max_rooms: 1,
        max_conn_per_room: 1,
        ..ServerConfig::default()
    };
    let (connector, _server) = memory_server(config);
    let (_a, _) = joined(&connector, None).await;

    let mut b = connector.connect().unwrap();
    b.send(join(None)).unwrap();
    expect_rejected(&mut b, RejectCode::ServerFull).await;
}

#[tokio::test]
async fn test_disconnect_releases_the_slot() {
    let config = ServerConfig {
        max_rooms: 1,
        max_conn_per_room: 1,
        ..ServerConfig::default()
    };
    let (connector, server) = memory_server(config);
    let (mut a, room) = joined(&connector, None).await;
    a.close();

    for _ in 0..200 {
        let rooms = server.manager.list_rooms().await.unwrap();
        if rooms.first().is_some_and(|r| r.members == 0) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (_b, again) = joined(&connector, Some(room)).await;
    assert_eq!(again, room);
}

#[tokio::test]
async fn test_room_shutdown_sends_closing() {
    let (connector, server) = memory_server(ServerConfig::default());
    let (mut a, room) = joined(&connector, None).await;

    server.manager.shutdown_room(room, "bye").await.unwrap();

    let frame = next(&mut a).await.unwrap();
    assert_eq!(
        SystemFrame::decode(&frame).unwrap(),
        SystemFrame::Closing { reason: "bye".into() }
    );
    assert_eq!(next(&mut a).await, None);
}

// =========================================================================
// WebSocket + admin, end to end
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn ws_join(addr: &str) -> ClientWs {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws.send(Message::Binary(join(None).into())).await.unwrap();
    let frame = ws_next(&mut ws).await;
    assert!(matches!(SystemFrame::decode(&frame), Ok(SystemFrame::Joined { .. })));
    ws
}

async fn ws_next(ws: &mut ClientWs) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame should arrive")
            .expect("stream should be open")
            .expect("frame should be valid");
        if let Message::Binary(data) = msg {
            return data.to_vec();
        }
    }
}

#[tokio::test]
async fn test_admin_shutdown_notifies_every_member() {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        admin_port: 0,
        ..ServerConfig::default()
    };
    let server = HnpServerBuilder::new().config(config).build(&schema()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let admin_url = format!("http://{}", server.admin_addr().unwrap());
    let running = tokio::spawn(server.run());

    let mut a = ws_join(&addr).await;
    let mut b = ws_join(&addr).await;

    let intruder = AdminClient::new(admin_url.clone(), DEFAULT_ADMIN_HEADER, "thinner");
    assert!(matches!(
        intruder.shutdown().await,
        Err(AdminError::Auth(AuthError::Unauthorized))
    ));

    // Still connected after the rejected call.
    a.send(Message::Binary(chat("still here").into())).await.unwrap();
    assert_eq!(ws_next(&mut b).await, chat("still here"));

    let admin = AdminClient::new(admin_url, DEFAULT_ADMIN_HEADER, DEFAULT_ADMIN_SECRET);
    assert_eq!(admin.list_rooms().await.unwrap()[0].members, 2);
    admin.shutdown().await.unwrap();

    for ws in [&mut a, &mut b] {
        let frame = ws_next(ws).await;
        assert!(matches!(SystemFrame::decode(&frame), Ok(SystemFrame::Closing { .. })));
    }

    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}
