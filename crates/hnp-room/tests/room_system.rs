//! Integration tests for admission, room lifecycle and relay.

use std::sync::Arc;
use std::time::Duration;

use hnp_protocol::{CompiledProtocol, ConnectionId, MessageInstance, Recipient, RoomId, Value};
use hnp_room::{
    member_channel, Admission, AdmissionError, AdmissionRequest, MemberReceiver, Outbound, RelayLogic,
    RoomContext, RoomError, RoomFault, RoomLimits, RoomLogic, RoomManager, RoomOutbound, RoomSnapshot,
    RoomState,
};
use hnp_schema::{validate, Direction, FieldDef, MessageDef, ProtocolSchema};

// =========================================================================
// Fixtures
// =========================================================================

const PING: u8 = 0;
const CHAT: u8 = 1;
const INPUT: u8 = 2;
const SCORE: u8 = 3;

fn protocol() -> Arc<CompiledProtocol> {
    let schema = ProtocolSchema::default()
        .message(MessageDef::heartbeat("ping"))
        .message(MessageDef::new("chat", Direction::Bidirectional).field(FieldDef::new("text", "string")))
        .message(
            MessageDef::new("input", Direction::ClientToServer).field(FieldDef::new("buttons", "uint8")),
        )
        .message(
            MessageDef::new("score", Direction::ServerToClient).field(FieldDef::new("points", "uint8")),
        );
    Arc::new(CompiledProtocol::compile(&validate(&schema).unwrap()))
}

fn limits(max_rooms: usize, max_conn_per_room: usize) -> RoomLimits {
    RoomLimits {
        max_rooms,
        max_conn_per_room,
        grace_period: Duration::from_secs(30),
        ..RoomLimits::default()
    }
}

fn frame(protocol: &CompiledProtocol, tag: u8, fields: Vec<Option<Value>>) -> Vec<u8> {
    protocol.encode(&MessageInstance::new(tag, fields)).unwrap()
}

fn chat(protocol: &CompiledProtocol, text: &str) -> Vec<u8> {
    frame(protocol, CHAT, vec![Some(Value::from(text))])
}

type Member = (Admission, MemberReceiver);

async fn try_admit(
    mgr: &RoomManager,
    conn: u32,
    room: Option<RoomId>,
    buffer: usize,
) -> Result<Member, AdmissionError> {
    let (sender, rx) = member_channel(buffer);
    let request = AdmissionRequest {
        conn: ConnectionId::new(conn),
        room,
        sender,
    };
    mgr.admit(request).await.map(|admission| (admission, rx))
}

async fn admit(mgr: &RoomManager, conn: u32, room: Option<RoomId>) -> Member {
    try_admit(mgr, conn, room, 16).await.unwrap()
}

/// Polls the room list until `pred` holds.
async fn wait_for_rooms(mgr: &RoomManager, pred: impl Fn(&[RoomSnapshot]) -> bool) -> Vec<RoomSnapshot> {
    for _ in 0..200 {
        let rooms = mgr.list_rooms().await.unwrap();
        if pred(&rooms) {
            return rooms;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("room list never reached the expected shape");
}

fn state_of(rooms: &[RoomSnapshot], id: RoomId) -> Option<RoomState> {
    rooms.iter().find(|r| r.id == id).map(|r| r.state)
}

/// Faults on any `input` message, relays everything else.
struct FragileLogic;

impl RoomLogic for FragileLogic {
    type State = ();

    fn init(_room_id: RoomId) -> Self::State {}

    fn handle_message(
        state: &mut Self::State,
        ctx: &RoomContext<'_>,
        sender: ConnectionId,
        msg: MessageInstance,
    ) -> Result<Outbound, RoomFault> {
        if msg.tag == INPUT {
            return Err(RoomFault("input rejected".into()));
        }
        RelayLogic::handle_message(state, ctx, sender, msg)
    }
}

/// Answers chat with the client-only `input` message, relays the rest.
struct MisdirectedLogic;

impl RoomLogic for MisdirectedLogic {
    type State = ();

    fn init(_room_id: RoomId) -> Self::State {}

    fn handle_message(
        state: &mut Self::State,
        ctx: &RoomContext<'_>,
        sender: ConnectionId,
        msg: MessageInstance,
    ) -> Result<Outbound, RoomFault> {
        if msg.tag == CHAT {
            let input = MessageInstance::new(INPUT, vec![Some(Value::Int(1))]);
            return Ok(vec![(Recipient::All, input)]);
        }
        RelayLogic::handle_message(state, ctx, sender, msg)
    }
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test]
async fn test_first_admission_creates_room_one() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(2, 2), protocol()).unwrap();
    let (a, _rx) = admit(&mgr, 1, None).await;

    assert_eq!(a.room_id(), RoomId(1));
    let rooms = mgr.list_rooms().await.unwrap();
    assert_eq!(
        rooms,
        vec![RoomSnapshot {
            id: RoomId(1),
            members: 1,
            capacity: 2,
            state: RoomState::Open,
        }]
    );
}

#[tokio::test]
async fn test_zero_limits_are_refused_at_spawn() {
    let spawned = RoomManager::spawn::<RelayLogic>(limits(0, 4), protocol());
    assert_eq!(spawned.err(), Some(RoomError::InvalidLimits("max_rooms")));

    let spawned = RoomManager::spawn::<RelayLogic>(limits(2, 0), protocol());
    assert_eq!(spawned.err(), Some(RoomError::InvalidLimits("max_conn_per_room")));
}

#[tokio::test]
async fn test_concurrent_admissions_respect_limits() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(2, 1), protocol()).unwrap();

    let (r1, r2, r3) = tokio::join!(
        try_admit(&mgr, 1, None, 4),
        try_admit(&mgr, 2, None, 4),
        try_admit(&mgr, 3, None, 4),
    );
    let results = [r1, r2, r3];

    let admitted: Vec<RoomId> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|(a, _)| a.room_id()))
        .collect();
    let rejected: Vec<&AdmissionError> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(admitted.len(), 2);
    assert_ne!(admitted[0], admitted[1]);
    assert_eq!(rejected, vec![&AdmissionError::ServerFull]);

    let rooms = mgr.list_rooms().await.unwrap();
    assert!(rooms.iter().all(|r| r.state == RoomState::Full && r.members == 1));
}

#[tokio::test]
async fn test_named_room_full_is_rejected() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(4, 1), protocol()).unwrap();
    let (a, _rx) = admit(&mgr, 1, None).await;

    let err = try_admit(&mgr, 2, Some(a.room_id()), 4).await.unwrap_err();
    assert_eq!(err, AdmissionError::RoomFull(a.room_id()));
}

#[tokio::test]
async fn test_unknown_named_room_falls_back_to_policy() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(4, 2), protocol()).unwrap();
    let (a, _rx) = admit(&mgr, 1, None).await;
    let (b, _rx_b) = admit(&mgr, 2, Some(RoomId(77))).await;
    assert_eq!(b.room_id(), a.room_id());
}

#[tokio::test]
async fn test_dropping_admission_releases_membership() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(1, 1), protocol()).unwrap();
    let (a, _rx) = admit(&mgr, 1, None).await;
    let room = a.room_id();
    drop(a);

    let rooms = wait_for_rooms(&mgr, |r| state_of(r, room) == Some(RoomState::Closing)).await;
    assert_eq!(rooms[0].members, 0);

    let (b, _rx_b) = admit(&mgr, 2, None).await;
    assert_eq!(b.room_id(), room);
}

// =========================================================================
// Grace period
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_rejoin_within_grace_keeps_room() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(2, 4), protocol()).unwrap();
    let (a, _rx) = admit(&mgr, 1, None).await;
    let room = a.room_id();
    drop(a);
    wait_for_rooms(&mgr, |r| state_of(r, room) == Some(RoomState::Closing)).await;

    tokio::time::sleep(Duration::from_secs(15)).await;
    let (b, _rx_b) = admit(&mgr, 2, Some(room)).await;
    assert_eq!(b.room_id(), room);

    // The timer armed before the rejoin must not close the room.
    tokio::time::sleep(Duration::from_secs(30)).await;
    let rooms = mgr.list_rooms().await.unwrap();
    assert_eq!(state_of(&rooms, room), Some(RoomState::Open));
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_removes_room() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(2, 4), protocol()).unwrap();
    let (a, _rx) = admit(&mgr, 1, None).await;
    let room = a.room_id();
    drop(a);
    wait_for_rooms(&mgr, |r| state_of(r, room) == Some(RoomState::Closing)).await;

    tokio::time::sleep(Duration::from_secs(31)).await;
    wait_for_rooms(&mgr, |r| r.is_empty()).await;

    let (b, _rx_b) = admit(&mgr, 2, Some(room)).await;
    assert_ne!(b.room_id(), room, "closed room ids are never reused");
}

// =========================================================================
// Relay
// =========================================================================

#[tokio::test]
async fn test_chat_is_relayed_to_other_members() {
    let p = protocol();
    let mgr = RoomManager::spawn::<RelayLogic>(limits(1, 4), p.clone()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;
    let (_b, mut rx_b) = admit(&mgr, 2, None).await;

    let bytes = chat(&p, "hello");
    a.send_frame(bytes.clone()).await.unwrap();

    match rx_b.recv().await {
        Some(RoomOutbound::Frame(f)) => assert_eq!(&f[..], &bytes[..]),
        other => panic!("expected frame, got {other:?}"),
    }

    // The sender only hears its own heartbeat echo.
    let ping = frame(&p, PING, vec![]);
    a.send_frame(ping.clone()).await.unwrap();
    match rx_a.recv().await {
        Some(RoomOutbound::Frame(f)) => assert_eq!(&f[..], &ping[..]),
        other => panic!("expected ping echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_frames_are_dropped_without_closing_room() {
    let p = protocol();
    let mgr = RoomManager::spawn::<RelayLogic>(limits(1, 4), p.clone()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;

    a.send_frame(vec![0xEE, 1, 2]).await.unwrap();
    a.send_frame(vec![CHAT]).await.unwrap();

    let ping = frame(&p, PING, vec![]);
    a.send_frame(ping.clone()).await.unwrap();
    match rx_a.recv().await {
        Some(RoomOutbound::Frame(f)) => assert_eq!(&f[..], &ping[..]),
        other => panic!("expected ping echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_outbound_queue_drops_instead_of_blocking() {
    let p = protocol();
    let mgr = RoomManager::spawn::<RelayLogic>(limits(1, 4), p.clone()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;
    let (_slow, mut rx_slow) = try_admit(&mgr, 2, None, 1).await.unwrap();

    for i in 0..5 {
        a.send_frame(chat(&p, &format!("msg {i}"))).await.unwrap();
    }
    let ping = frame(&p, PING, vec![]);
    a.send_frame(ping).await.unwrap();

    // The room kept going while the slow member's queue was full.
    assert!(matches!(rx_a.recv().await, Some(RoomOutbound::Frame(_))));
    assert!(matches!(rx_slow.try_recv(), Some(RoomOutbound::Frame(_))));
    assert_eq!(rx_slow.try_recv(), None);
}

#[tokio::test]
async fn test_server_only_message_from_client_is_dropped() {
    let p = protocol();
    let mgr = RoomManager::spawn::<RelayLogic>(limits(1, 4), p.clone()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;
    let (_b, mut rx_b) = admit(&mgr, 2, None).await;

    a.send_frame(frame(&p, SCORE, vec![Some(Value::Int(9))])).await.unwrap();

    // The room is still alive and the score went nowhere.
    let ping = frame(&p, PING, vec![]);
    a.send_frame(ping.clone()).await.unwrap();
    assert_eq!(rx_a.recv().await, Some(RoomOutbound::Frame(ping.into())));
    assert_eq!(rx_b.try_recv(), None);
    assert_eq!(mgr.list_rooms().await.unwrap()[0].members, 2);
}

#[tokio::test]
async fn test_client_only_message_from_logic_is_dropped() {
    let p = protocol();
    let mgr = RoomManager::spawn::<MisdirectedLogic>(limits(1, 4), p.clone()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;
    let (_b, mut rx_b) = admit(&mgr, 2, None).await;

    a.send_frame(chat(&p, "gg")).await.unwrap();

    let ping = frame(&p, PING, vec![]);
    a.send_frame(ping.clone()).await.unwrap();
    assert_eq!(rx_a.recv().await, Some(RoomOutbound::Frame(ping.into())));
    assert_eq!(rx_b.try_recv(), None);
}

// =========================================================================
// Faults and shutdown
// =========================================================================

#[tokio::test]
async fn test_logic_fault_closes_only_that_room() {
    let p = protocol();
    let mgr = RoomManager::spawn::<FragileLogic>(limits(2, 1), p.clone()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;
    let (b, mut rx_b) = admit(&mgr, 2, None).await;
    assert_ne!(a.room_id(), b.room_id());

    a.send_frame(frame(&p, INPUT, vec![Some(Value::Int(1))])).await.unwrap();
    assert!(matches!(rx_a.recv().await, Some(RoomOutbound::Closed { .. })));

    let rooms = wait_for_rooms(&mgr, |r| r.len() == 1).await;
    assert_eq!(rooms[0].id, b.room_id());

    let ping = frame(&p, PING, vec![]);
    b.send_frame(ping.clone()).await.unwrap();
    match rx_b.recv().await {
        Some(RoomOutbound::Frame(f)) => assert_eq!(&f[..], &ping[..]),
        other => panic!("expected ping echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_room_notifies_members() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(2, 4), protocol()).unwrap();
    let (a, mut rx_a) = admit(&mgr, 1, None).await;
    let (_b, mut rx_b) = admit(&mgr, 2, None).await;
    let room = a.room_id();

    mgr.shutdown_room(room, "closed by admin").await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        assert_eq!(
            rx.recv().await,
            Some(RoomOutbound::Closed {
                reason: "closed by admin".into()
            })
        );
        assert_eq!(rx.recv().await, None);
    }
    assert!(mgr.list_rooms().await.unwrap().is_empty());

    // Already closed: still fine. Never existed: not found.
    mgr.shutdown_room(room, "again").await.unwrap();
    assert_eq!(
        mgr.shutdown_room(RoomId(99), "nope").await,
        Err(RoomError::NotFound(RoomId(99)))
    );
}

#[tokio::test]
async fn test_shutdown_closes_everything_and_rejects_admissions() {
    let mgr = RoomManager::spawn::<RelayLogic>(limits(2, 1), protocol()).unwrap();
    let (_a, mut rx_a) = admit(&mgr, 1, None).await;
    let (_b, mut rx_b) = admit(&mgr, 2, None).await;

    mgr.shutdown("server maintenance").await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        assert!(matches!(
            rx.recv().await,
            Some(RoomOutbound::Closed { reason }) if reason == "server maintenance"
        ));
    }
    assert!(mgr.list_rooms().await.unwrap().is_empty());
    assert_eq!(
        try_admit(&mgr, 3, None, 4).await.unwrap_err(),
        AdmissionError::ShuttingDown
    );

    mgr.shutdown("again").await.unwrap();
}

#[tokio::test]
async fn test_close_notice_skips_a_full_queue() {
    let p = protocol();
    let mgr = RoomManager::spawn::<RelayLogic>(limits(1, 4), p.clone()).unwrap();
    let (a, mut rx_a) = try_admit(&mgr, 1, None, 1).await.unwrap();

    // The heartbeat echo fills the single slot.
    a.send_frame(frame(&p, PING, vec![])).await.unwrap();
    mgr.shutdown_room(a.room_id(), "closed by admin").await.unwrap();

    // The notice jumps the queued frame, which is abandoned.
    assert_eq!(
        rx_a.recv().await,
        Some(RoomOutbound::Closed {
            reason: "closed by admin".into()
        })
    );
    // The echo was still queued behind it; a writer stops before reading it.
    assert!(matches!(rx_a.recv().await, Some(RoomOutbound::Frame(_))));
    assert_eq!(rx_a.recv().await, None);
}
