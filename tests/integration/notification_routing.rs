//! Integration tests for real-time notification routing.
//!
//! Runs the hub in-process, drives mission commands through a
//! `MissionEngine` whose effects go through a `Dispatcher` backed by the
//! hub's `ConnectionManager`, and observes what each WebSocket client
//! actually receives.
//!
//! Verification command: `cargo test --test notification_routing`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures_util::{SinkExt, StreamExt};
use mockable::DefaultClock;
use tokio_tungstenite::tungstenite;

use opsboard::dispatch::Dispatcher;
use opsboard::lifecycle::{MissionEngine, NewTask, TaskUpdate};
use opsboard::mail::LogMailer;
use opsboard::memory::MemoryStore;
use opsboard::model::{Operative, Requester};
use opsboard_hub::jobs;
use opsboard_hub::router::ConnectionManager;
use opsboard_hub::server::{self, HubState};
use opsboard_proto::event::Notification;
use opsboard_proto::hub::{self, HubMessage};
use opsboard_proto::operative::{OperativeId, Role, RoomId};
use opsboard_proto::task::{Priority, TaskId};

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

type Engine = MissionEngine<MemoryStore, DefaultClock>;
type HubDispatcher = Dispatcher<ConnectionManager, LogMailer>;

// =============================================================================
// Test helpers
// =============================================================================

struct Harness {
    addr: SocketAddr,
    router: Arc<ConnectionManager>,
    engine: Engine,
    dispatcher: HubDispatcher,
}

async fn start_hub() -> Harness {
    let router = Arc::new(ConnectionManager::new());
    let state = Arc::new(HubState::new(Arc::clone(&router)));
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start hub");

    let store = Arc::new(MemoryStore::with_operatives([
        Operative::new(OperativeId::new("chair"), "Ada", Role::Chair),
        Operative::new(OperativeId::new("e1"), "Grace", Role::Employee),
        Operative::new(OperativeId::new("e2"), "Linus", Role::Employee),
    ]));
    let engine = MissionEngine::new(store, Arc::new(DefaultClock));
    let dispatcher = Dispatcher::new(Arc::clone(&router), Arc::new(LogMailer));

    Harness {
        addr,
        router,
        engine,
        dispatcher,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Client, msg: &HubMessage) {
    let bytes = hub::encode(msg).unwrap();
    ws.send(tungstenite::Message::Binary(bytes.into()))
        .await
        .unwrap();
}

async fn recv(ws: &mut Client) -> HubMessage {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("recv timed out")
        .unwrap()
        .unwrap();
    hub::decode(&msg.into_data()).unwrap()
}

async fn recv_event(ws: &mut Client) -> Notification {
    match recv(ws).await {
        HubMessage::Event(n) => n,
        other => panic!("expected Event, got {other:?}"),
    }
}

/// Asserts nothing arrives within a short grace period.
async fn assert_silent(ws: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

/// Connects and subscribes to `room`, waiting for the acknowledgment.
async fn subscriber(addr: SocketAddr, room: &str) -> Client {
    let mut ws = connect(addr).await;
    let room = RoomId::new(room);
    send(&mut ws, &HubMessage::Subscribe { room: room.clone() }).await;
    assert_eq!(recv(&mut ws).await, HubMessage::Subscribed { room });
    ws
}

/// Waits until the hub has registered `n` connections.
async fn wait_for_connections(router: &ConnectionManager, n: usize) {
    for _ in 0..100 {
        if router.connection_count().await >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached {n} connections");
}

fn chair() -> Requester {
    Requester::chair(OperativeId::new("chair"), "Ada")
}

async fn assign(h: &Harness, assignee: &str, priority: Priority) -> TaskId {
    let outcome = h
        .engine
        .create(
            &chair(),
            NewTask::new("Restock depot", "Bring supplies to depot 4")
                .assigned_to(OperativeId::new(assignee))
                .priority(priority)
                .deadline(Utc::now() + ChronoDuration::hours(6)),
        )
        .await
        .unwrap();
    let id = outcome.value.id().clone();
    h.dispatcher.deliver(outcome.effects).await;
    id
}

// =============================================================================
// Targeted vs broadcast delivery
// =============================================================================

#[tokio::test]
async fn creation_broadcasts_and_targets_assignee_room() {
    let h = start_hub().await;
    let mut grace = subscriber(h.addr, "e1").await;
    let mut linus = subscriber(h.addr, "e2").await;

    let id = assign(&h, "e1", Priority::Emergency).await;

    assert_eq!(
        recv_event(&mut grace).await,
        Notification::TaskCreated {
            task_id: id.clone(),
            title: "Restock depot".to_string()
        }
    );
    assert_eq!(
        recv_event(&mut grace).await,
        Notification::PriorityChanged {
            task_id: id.clone(),
            title: "Restock depot".to_string(),
            priority: Priority::Emergency,
            urgent: true,
        }
    );

    assert_eq!(recv_event(&mut linus).await.name(), "task_created");
    assert_silent(&mut linus).await;
}

#[tokio::test]
async fn unsubscribed_client_only_sees_broadcasts() {
    let h = start_hub().await;
    let mut grace = subscriber(h.addr, "e1").await;
    let mut observer = connect(h.addr).await;
    wait_for_connections(&h.router, 2).await;

    let id = assign(&h, "e1", Priority::Low).await;
    assert_eq!(recv_event(&mut observer).await.name(), "task_created");
    assert_silent(&mut observer).await;
    recv_event(&mut grace).await;
    recv_event(&mut grace).await;

    let outcome = h
        .engine
        .update(&chair(), &id, TaskUpdate::priority(Priority::High))
        .await
        .unwrap();
    h.dispatcher.deliver(outcome.effects).await;

    assert!(matches!(
        recv_event(&mut grace).await,
        Notification::PriorityChanged {
            priority: Priority::High,
            urgent: true,
            ..
        }
    ));
    assert_eq!(recv_event(&mut grace).await, Notification::TaskSync);
    assert_eq!(recv_event(&mut observer).await, Notification::TaskSync);
    assert_silent(&mut observer).await;
}

#[tokio::test]
async fn leaving_a_room_stops_targeted_delivery() {
    let h = start_hub().await;
    let mut grace = subscriber(h.addr, "e1").await;

    let room = RoomId::new("e1");
    send(&mut grace, &HubMessage::Unsubscribe { room: room.clone() }).await;
    assert_eq!(recv(&mut grace).await, HubMessage::Unsubscribed { room: room.clone() });
    assert_eq!(h.router.room_size(&room).await, 0);

    assign(&h, "e1", Priority::High).await;
    assert_eq!(recv_event(&mut grace).await.name(), "task_created");
    assert_silent(&mut grace).await;
}

#[tokio::test]
async fn disconnect_drops_room_membership() {
    let h = start_hub().await;
    let grace = subscriber(h.addr, "e1").await;
    let room = RoomId::new("e1");
    assert_eq!(h.router.room_size(&room).await, 1);

    drop(grace);
    for _ in 0..100 {
        if h.router.room_size(&room).await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.router.room_size(&room).await, 0);
    assert_eq!(h.router.connection_count().await, 0);

    // Nothing is queued for the absent assignee.
    assign(&h, "e1", Priority::Medium).await;
    let mut again = subscriber(h.addr, "e1").await;
    assert_silent(&mut again).await;
}

#[tokio::test]
async fn several_clients_in_one_room_all_receive() {
    let h = start_hub().await;
    let mut phone = subscriber(h.addr, "e2").await;
    let mut laptop = subscriber(h.addr, "e2").await;
    assert_eq!(h.router.room_size(&RoomId::new("e2")).await, 2);

    assign(&h, "e2", Priority::Medium).await;
    for ws in [&mut phone, &mut laptop] {
        assert_eq!(recv_event(ws).await.name(), "task_created");
        assert_eq!(recv_event(ws).await.name(), "priority_changed");
    }
}

// =============================================================================
// Scheduled broadcasts
// =============================================================================

#[tokio::test]
async fn deadline_sweep_broadcasts_count() {
    let h = start_hub().await;
    let mut observer = connect(h.addr).await;
    wait_for_connections(&h.router, 1).await;

    assign(&h, "e1", Priority::High).await;
    assign(&h, "e2", Priority::Low).await;
    recv_event(&mut observer).await;
    recv_event(&mut observer).await;

    let due = jobs::deadline_sweep(&h.engine, &h.dispatcher, ChronoDuration::hours(24))
        .await
        .unwrap();
    assert_eq!(due, 2);
    assert_eq!(
        recv_event(&mut observer).await,
        Notification::DeadlinesApproaching { task_count: 2 }
    );
}

#[tokio::test]
async fn monthly_reset_broadcasts_affected() {
    let h = start_hub().await;
    let mut observer = connect(h.addr).await;
    wait_for_connections(&h.router, 1).await;

    let outcome = h.engine.monthly_reset().await.unwrap();
    h.dispatcher.deliver(outcome.effects).await;
    assert_eq!(
        recv_event(&mut observer).await,
        Notification::ScoresReset { affected: 2 }
    );
}
