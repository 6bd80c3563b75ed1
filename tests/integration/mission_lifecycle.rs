//! Integration tests for the mission lifecycle.
//!
//! Drives `MissionEngine` over a `MemoryStore` with a controllable clock:
//! creation, on-time and late completion, reopening, listing order and
//! visibility, the comment log, deletion, and concurrent writers.
//!
//! Verification command: `cargo test --test mission_lifecycle`

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::redundant_clone
)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use parking_lot::Mutex;

use opsboard::CommandError;
use opsboard::lifecycle::{MissionEngine, NewTask, TaskUpdate};
use opsboard::memory::MemoryStore;
use opsboard::model::{Operative, Requester};
use opsboard::ports::{OperativeStore, TaskStore};
use opsboard_proto::event::{Delivery, Dispatch, Notification};
use opsboard_proto::operative::{OperativeId, Role};
use opsboard_proto::task::{Priority, TaskId, TaskStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clock that only moves when told to.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    fn set(&self, now: DateTime<Utc>) {
        *self.0.lock() = now;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

type Engine = MissionEngine<MemoryStore, ManualClock>;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap()
}

fn chair() -> Requester {
    Requester::chair(OperativeId::new("chair"), "Ada")
}

fn employee(id: &str, name: &str) -> Requester {
    Requester::employee(OperativeId::new(id), name)
}

/// Engine seeded with a Chair and two Employees. E1 starts at `e1_score`.
fn setup(e1_score: u32) -> (Engine, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::with_operatives([
        Operative::new(OperativeId::new("chair"), "Ada", Role::Chair),
        Operative::new(OperativeId::new("e1"), "Grace", Role::Employee)
            .with_email("grace@example.com")
            .with_score(e1_score),
        Operative::new(OperativeId::new("e2"), "Linus", Role::Employee)
            .with_email("linus@example.com"),
    ]));
    let clock = Arc::new(ManualClock::at(start()));
    let engine = MissionEngine::new(Arc::clone(&store), Arc::clone(&clock));
    (engine, store, clock)
}

async fn create(engine: &Engine, assignee: &str, priority: Priority, due_in: Duration) -> TaskId {
    engine
        .create(
            &chair(),
            NewTask::new(format!("{priority} mission"), "details")
                .assigned_to(OperativeId::new(assignee))
                .priority(priority)
                .deadline(start() + due_in),
        )
        .await
        .unwrap()
        .value
        .id()
        .clone()
}

async fn score(store: &MemoryStore, id: &str) -> u32 {
    store
        .find_operative(&OperativeId::new(id))
        .await
        .unwrap()
        .unwrap()
        .score
}

async fn set_status(engine: &Engine, who: &Requester, id: &TaskId, status: TaskStatus) {
    engine
        .update(who, id, TaskUpdate::status(status))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Full scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn complete_revert_delete_scenario() {
    let (engine, store, clock) = setup(30);
    let grace = employee("e1", "Grace");

    let t1 = create(&engine, "e1", Priority::Medium, Duration::hours(2)).await;
    assert_eq!(score(&store, "e1").await, 30);
    let task = engine.get(&grace, &t1).await.unwrap();
    assert_eq!(task.status(), TaskStatus::Pending);
    assert_eq!(task.progress(), 0);

    clock.set(start() + Duration::hours(1));
    set_status(&engine, &grace, &t1, TaskStatus::Completed).await;
    assert_eq!(score(&store, "e1").await, 40);
    assert_eq!(engine.get(&grace, &t1).await.unwrap().progress(), 100);

    clock.set(start() + Duration::minutes(90));
    set_status(&engine, &chair(), &t1, TaskStatus::Pending).await;
    assert_eq!(score(&store, "e1").await, 30);
    assert_eq!(engine.get(&grace, &t1).await.unwrap().progress(), 0);

    let outcome = engine.delete(&chair(), &t1).await.unwrap();
    assert_eq!(
        outcome.effects.events,
        vec![Dispatch::broadcast(Notification::TaskDeleted {
            task_id: t1.clone()
        })]
    );
    assert!(engine.list(&chair()).await.unwrap().is_empty());
    assert!(engine.list(&grace).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completion_at_deadline_is_on_time() {
    let (engine, store, clock) = setup(0);
    let t1 = create(&engine, "e1", Priority::High, Duration::hours(3)).await;

    clock.set(start() + Duration::hours(3));
    set_status(&engine, &employee("e1", "Grace"), &t1, TaskStatus::Completed).await;
    assert_eq!(score(&store, "e1").await, 10);
}

#[tokio::test]
async fn late_completion_leaves_score_unchanged() {
    let (engine, store, clock) = setup(15);
    let t1 = create(&engine, "e1", Priority::High, Duration::hours(3)).await;

    clock.set(start() + Duration::hours(3) + Duration::seconds(1));
    set_status(&engine, &employee("e1", "Grace"), &t1, TaskStatus::Completed).await;
    assert_eq!(score(&store, "e1").await, 15);
    assert_eq!(engine.get(&chair(), &t1).await.unwrap().progress(), 100);
}

#[tokio::test]
async fn resubmitting_completed_does_not_award_twice() {
    let (engine, store, _clock) = setup(0);
    let grace = employee("e1", "Grace");
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(5)).await;

    set_status(&engine, &grace, &t1, TaskStatus::Completed).await;
    set_status(&engine, &grace, &t1, TaskStatus::Completed).await;
    assert_eq!(score(&store, "e1").await, 10);
}

#[tokio::test]
async fn reopening_below_penalty_skips_deduction() {
    let (engine, store, clock) = setup(0);
    let grace = employee("e1", "Grace");
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;

    // Late completion earns nothing, so the score stays under the penalty.
    clock.set(start() + Duration::hours(2));
    set_status(&engine, &grace, &t1, TaskStatus::Completed).await;
    store.set_score(&OperativeId::new("e1"), 5).await.unwrap();

    set_status(&engine, &grace, &t1, TaskStatus::InProgress).await;
    assert_eq!(score(&store, "e1").await, 5);
    assert_eq!(engine.get(&grace, &t1).await.unwrap().progress(), 50);
}

#[tokio::test]
async fn reopening_at_exactly_penalty_reaches_zero() {
    let (engine, store, clock) = setup(0);
    let grace = employee("e1", "Grace");
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;

    set_status(&engine, &grace, &t1, TaskStatus::Completed).await;
    assert_eq!(score(&store, "e1").await, 10);

    clock.set(start() + Duration::hours(4));
    set_status(&engine, &grace, &t1, TaskStatus::Pending).await;
    assert_eq!(score(&store, "e1").await, 0);
}

#[tokio::test]
async fn scored_transition_for_unknown_assignee_commits_nothing() {
    let (engine, store, _clock) = setup(0);
    let ghost_task = create(&engine, "ghost", Priority::Medium, Duration::hours(1)).await;

    let err = engine
        .update(&chair(), &ghost_task, TaskUpdate::status(TaskStatus::Completed))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::NotFound(_)));

    let task = store.find_task(&ghost_task).await.unwrap().unwrap();
    assert_eq!(task.status(), TaskStatus::Pending);
    assert_eq!(task.version(), 0);
}

// ---------------------------------------------------------------------------
// Listing and visibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chair_sees_all_in_priority_then_deadline_order() {
    let (engine, _store, _clock) = setup(0);
    let low = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;
    let high_late = create(&engine, "e2", Priority::High, Duration::hours(9)).await;
    let emergency = create(&engine, "e1", Priority::Emergency, Duration::hours(20)).await;
    let high_soon = create(&engine, "e1", Priority::High, Duration::hours(2)).await;
    let medium = create(&engine, "e2", Priority::Medium, Duration::hours(3)).await;

    let ids: Vec<TaskId> = engine
        .list(&chair())
        .await
        .unwrap()
        .iter()
        .map(|t| t.id().clone())
        .collect();
    assert_eq!(ids, vec![emergency, high_soon, high_late, medium, low]);
}

#[tokio::test]
async fn employee_sees_only_own_tasks() {
    let (engine, _store, _clock) = setup(0);
    create(&engine, "e1", Priority::Low, Duration::hours(1)).await;
    create(&engine, "e2", Priority::High, Duration::hours(1)).await;
    create(&engine, "e2", Priority::Medium, Duration::hours(2)).await;

    let linus = employee("e2", "Linus");
    let tasks = engine.list(&linus).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.assigned_to() == &linus.id));
}

#[tokio::test]
async fn employee_cannot_read_foreign_task() {
    let (engine, _store, _clock) = setup(0);
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;
    let err = engine.get(&employee("e2", "Linus"), &t1).await.unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn employee_create_and_delete_are_forbidden_without_mutation() {
    let (engine, store, _clock) = setup(0);
    let grace = employee("e1", "Grace");
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;

    let err = engine
        .create(
            &grace,
            NewTask::new("self-assigned", "nope")
                .assigned_to(grace.id.clone())
                .deadline(start()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    let err = engine.delete(&grace, &t1).await.unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    assert_eq!(store.task_count(), 1);
    assert!(store.find_task(&t1).await.unwrap().is_some());
}

#[tokio::test]
async fn assignee_priority_change_is_forbidden() {
    let (engine, store, _clock) = setup(0);
    let grace = employee("e1", "Grace");
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;

    let err = engine
        .update(&grace, &t1, TaskUpdate::priority(Priority::Emergency))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    let task = store.find_task(&t1).await.unwrap().unwrap();
    assert_eq!(task.priority(), Priority::Low);
    assert_eq!(task.version(), 0);

    // Status alone is still the assignee's to change.
    let updated = engine
        .update(&grace, &t1, TaskUpdate::status(TaskStatus::InProgress))
        .await
        .unwrap()
        .value;
    assert_eq!(updated.status(), TaskStatus::InProgress);
    assert_eq!(updated.priority(), Priority::Low);
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn comments_append_with_author_snapshot() {
    let (engine, store, clock) = setup(0);
    let t1 = create(&engine, "e1", Priority::Medium, Duration::hours(6)).await;

    engine
        .add_comment(&employee("e1", "Grace"), &t1, "on site")
        .await
        .unwrap();

    // Profile renamed after the first comment was written.
    store
        .upsert_operative(
            Operative::new(OperativeId::new("e1"), "Grace Hopper", Role::Employee)
                .with_email("grace@example.com"),
        )
        .await
        .unwrap();

    clock.set(start() + Duration::minutes(5));
    engine
        .add_comment(&employee("e1", "Grace Hopper"), &t1, "relay replaced")
        .await
        .unwrap();
    engine.add_comment(&chair(), &t1, "confirmed").await.unwrap();

    let task = engine.get(&chair(), &t1).await.unwrap();
    let log: Vec<(&str, Role, &str)> = task
        .comments()
        .iter()
        .map(|c| (c.author_name(), c.author_role(), c.text()))
        .collect();
    assert_eq!(
        log,
        vec![
            ("Grace", Role::Employee, "on site"),
            ("Grace Hopper", Role::Employee, "relay replaced"),
            ("Ada", Role::Chair, "confirmed"),
        ]
    );
    let stamps: Vec<DateTime<Utc>> = task.comments().iter().map(|c| c.created_at()).collect();
    assert_eq!(
        stamps,
        vec![
            start(),
            start() + Duration::minutes(5),
            start() + Duration::minutes(5)
        ]
    );
    assert_eq!(task.version(), 3);
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_and_priority_update_emits_targeted_then_broadcast() {
    let (engine, _store, _clock) = setup(0);
    let t1 = create(&engine, "e1", Priority::Low, Duration::hours(1)).await;

    let outcome = engine
        .update(
            &chair(),
            &t1,
            TaskUpdate::status(TaskStatus::InProgress).with_priority(Priority::Emergency),
        )
        .await
        .unwrap();

    let events = outcome.effects.events;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].delivery, Delivery::Room(OperativeId::new("e1").room()));
    assert!(matches!(
        events[0].notification,
        Notification::PriorityChanged {
            priority: Priority::Emergency,
            urgent: true,
            ..
        }
    ));
    assert_eq!(events[1], Dispatch::broadcast(Notification::TaskSync));
    assert_eq!(outcome.value.version(), 1);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_writer_gets_conflict_and_changes_nothing() {
    let (engine, store, _clock) = setup(0);
    let grace = employee("e1", "Grace");
    let t1 = create(&engine, "e1", Priority::Medium, Duration::hours(4)).await;

    let seen = engine.get(&grace, &t1).await.unwrap().version();
    engine
        .update(
            &chair(),
            &t1,
            TaskUpdate::priority(Priority::High).expecting_version(seen),
        )
        .await
        .unwrap();

    let err = engine
        .update(
            &grace,
            &t1,
            TaskUpdate::status(TaskStatus::Completed).expecting_version(seen),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Conflict {
            expected: 0,
            found: 1
        }
    ));

    let task = store.find_task(&t1).await.unwrap().unwrap();
    assert_eq!(task.status(), TaskStatus::Pending);
    assert_eq!(task.priority(), Priority::High);
    assert_eq!(score(&store, "e1").await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_award_once() {
    let (engine, store, _clock) = setup(0);
    let t1 = create(&engine, "e1", Priority::Medium, Duration::hours(4)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let id = t1.clone();
        handles.push(tokio::spawn(async move {
            let grace = employee("e1", "Grace");
            engine
                .update(&grace, &id, TaskUpdate::status(TaskStatus::Completed))
                .await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(CommandError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Losers either conflicted or found the task already completed.
    let task = store.find_task(&t1).await.unwrap().unwrap();
    assert_eq!(task.version(), 1);
    assert_eq!(score(&store, "e1").await, 10);
}
