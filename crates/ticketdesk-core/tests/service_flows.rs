use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use ticketdesk_core::backend::{BackendError, Call, MemoryBackend, Sleeper};
use ticketdesk_core::error::{ErrorCategory, TicketError};
use ticketdesk_core::model::{Status, Ticket, TicketDraft};
use ticketdesk_core::notify::{CreationNotifier, NotifyError, ToastLevel, ToastQueue};
use ticketdesk_core::service::TicketService;
use ticketdesk_core::store::TicketStore;

#[derive(Clone, Default)]
struct RecordingSleeper(Rc<RefCell<Vec<Duration>>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

struct FailingNotifier;

impl CreationNotifier for FailingNotifier {
    fn notify_created(&self, _tickets: &[Ticket], _creator: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Status(502))
    }
}

#[derive(Clone, Default)]
struct CapturingNotifier(Rc<RefCell<Vec<(Vec<i64>, String)>>>);

impl CreationNotifier for CapturingNotifier {
    fn notify_created(&self, tickets: &[Ticket], creator: &str) -> Result<(), NotifyError> {
        self.0
            .borrow_mut()
            .push((tickets.iter().map(|t| t.id).collect(), creator.to_string()));
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 4, 9, 30, 0).unwrap()
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.seed(
        "tickets",
        vec![
            json!({"id": 1, "title": "Login fails", "status": "Open", "project_id": 1, "log": []}),
            json!({"id": 2, "title": "Slow export", "status": "In Progress", "project_id": 2,
                   "started_at": "2024-07-01 08:00:00+00", "log": null}),
            json!({"id": 3, "title": "Old bug", "status": "Completed",
                   "started_at": "2024-06-01", "completed_at": "2024-06-02"}),
        ],
    );
    backend.seed(
        "projects",
        vec![json!({"id": 1, "name": "Auth"}), json!({"id": 2, "name": "Reports"})],
    );
    backend
}

fn loaded(backend: &MemoryBackend) -> TicketStore {
    let mut store = TicketStore::new();
    let service = TicketService::new(backend, RecordingSleeper::default());
    service.load(&mut store).unwrap();
    store
}

#[test]
fn load_reads_everything_newest_first_with_project_names() {
    let backend = backend();
    let store = loaded(&backend);
    let ids: Vec<_> = store.tickets().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert_eq!(store.get(1).unwrap().project_name, "Auth");
    assert_eq!(store.get(3).unwrap().project_name, "");
}

#[test]
fn load_failure_is_fatal_and_leaves_store_empty() {
    let backend = backend();
    backend.fail_reads(1, &BackendError::Transport("offline".into()));
    let mut store = TicketStore::new();
    let service = TicketService::new(&backend, RecordingSleeper::default());

    let err = service.load(&mut store).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::FatalRead);
    assert!(store.is_empty());
}

#[test]
fn status_change_writes_patch_and_audit_entry() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());

    service
        .change_status(&mut store, 1, Status::Completed, "dana", now())
        .unwrap();

    let Some(Call::Update { fields, .. }) = backend.calls().into_iter().last() else {
        panic!("expected an update call");
    };
    assert_eq!(fields["status"], json!("Completed"));
    assert_eq!(fields["started_at"], json!("2024-07-04T09:30:00+00:00"));
    assert_eq!(fields["completed_at"], json!("2024-07-04T09:30:00+00:00"));
    assert_eq!(fields["log"][0]["field"], json!("status"));
    assert_eq!(fields["log"][0]["user"], json!("dana"));
    assert_eq!(fields["log"][0]["oldValue"], json!("Open"));
    assert_eq!(fields["log"][0]["newValue"], json!("Completed"));

    let ticket = store.get(1).unwrap();
    assert_eq!(ticket.status, Status::Completed);
    assert_eq!(ticket.completed_at, Some(now()));
    assert_eq!(ticket.audit_entries().len(), 1);
    assert_eq!(ticket.project_name, "Auth");
}

fn update_calls(backend: &MemoryBackend) -> usize {
    backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Update { .. }))
        .count()
}

/// Stamp `updated_at` on row `id`, as a backend trigger would.
fn touch(backend: &MemoryBackend, id: i64, at: &str) {
    let rows = backend
        .rows("tickets")
        .into_iter()
        .map(|mut row| {
            if row["id"] == id {
                row["updated_at"] = json!(at);
            }
            row
        })
        .collect();
    backend.seed("tickets", rows);
}

#[test]
fn writes_pick_up_server_maintained_columns() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());
    assert_eq!(store.get(1).unwrap().updated_at, None);

    touch(&backend, 1, "2024-07-04T09:30:05Z");
    service
        .change_status(&mut store, 1, Status::InProgress, "alex", now())
        .unwrap();
    let ticket = store.get(1).unwrap();
    assert_eq!(ticket.status, Status::InProgress);
    assert_eq!(
        ticket.updated_at,
        Some(Utc.with_ymd_and_hms(2024, 7, 4, 9, 30, 5).unwrap())
    );

    touch(&backend, 1, "2024-07-04T09:31:00Z");
    service
        .assign(&mut store, 1, Some("sam"), "alex", now())
        .unwrap();
    let ticket = store.get(1).unwrap();
    assert_eq!(ticket.assignee.as_deref(), Some("sam"));
    assert_eq!(
        ticket.updated_at,
        Some(Utc.with_ymd_and_hms(2024, 7, 4, 9, 31, 0).unwrap())
    );
}

#[test]
fn failed_writes_are_retried_with_linear_backoff() {
    let backend = backend();
    let mut store = loaded(&backend);
    let sleeper = RecordingSleeper::default();
    let service = TicketService::new(&backend, sleeper.clone());

    backend.fail_writes(3, &BackendError::Status { status: 409, body: "conflict".into() });
    service
        .change_status(&mut store, 2, Status::Blocked, "dana", now())
        .unwrap();

    assert_eq!(update_calls(&backend), 4);
    assert_eq!(
        *sleeper.0.borrow(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3)
        ]
    );
    assert_eq!(store.get(2).unwrap().status, Status::Blocked);
}

#[test]
fn exhausted_retries_leave_cache_unchanged_and_raise_toast() {
    let backend = backend();
    let mut store = loaded(&backend);
    let before = store.get(2).unwrap().clone();
    let sleeper = RecordingSleeper::default();
    let toasts = ToastQueue::new();
    let service = TicketService::new(&backend, sleeper.clone())
        .with_toasts(Box::new(toasts.clone()));

    backend.fail_writes(4, &BackendError::Transport("reset".into()));
    let err = service
        .change_status(&mut store, 2, Status::Completed, "dana", now())
        .unwrap_err();

    assert!(matches!(err, TicketError::Write { id: 2, .. }));
    assert_eq!(err.category(), ErrorCategory::RecoverableWrite);
    assert_eq!(update_calls(&backend), 4);
    assert_eq!(sleeper.0.borrow().len(), 3);
    assert_eq!(store.get(2).unwrap(), &before);
    let raised = toasts.drain();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].level, ToastLevel::Error);
}

#[test]
fn same_status_is_rejected_without_a_write() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());
    let calls = backend.calls().len();

    let err = service
        .change_status(&mut store, 1, Status::Open, "dana", now())
        .unwrap_err();
    assert!(matches!(err, TicketError::Unchanged { .. }));
    assert_eq!(backend.calls().len(), calls);
}

#[test]
fn assign_sets_and_clears_assignment_time() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());

    let written = service
        .assign(&mut store, 1, Some("kim"), "dana", now())
        .unwrap();
    assert_eq!(written["assignee"], json!("kim"));
    assert_eq!(store.get(1).unwrap().assigned_at, Some(now()));

    let calls = backend.calls().len();
    let unchanged = service
        .assign(&mut store, 1, Some("kim"), "dana", now())
        .unwrap();
    assert!(unchanged.is_empty());
    assert_eq!(backend.calls().len(), calls);

    service.assign(&mut store, 1, None, "dana", now()).unwrap();
    let ticket = store.get(1).unwrap();
    assert!(ticket.assignee.is_none());
    assert!(ticket.assigned_at.is_none());
    assert_eq!(ticket.audit_entries().len(), 2);
}

#[test]
fn invalid_drafts_never_reach_the_backend() {
    let backend = backend();
    let mut store = loaded(&backend);
    let toasts = ToastQueue::new();
    let service = TicketService::new(&backend, RecordingSleeper::default())
        .with_toasts(Box::new(toasts.clone()));
    let calls = backend.calls().len();

    let err = service
        .create(
            &mut store,
            vec![
                TicketDraft {
                    title: "Has title".into(),
                    ..TicketDraft::default()
                },
                TicketDraft {
                    project_id: Some(1),
                    ..TicketDraft::default()
                },
            ],
            "dana",
            now(),
        )
        .unwrap_err();

    assert!(
        matches!(&err, TicketError::Validation { fields } if fields == &vec!["project_id", "title"])
    );
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(backend.calls().len(), calls);
    assert!(toasts.is_empty());
}

#[test]
fn create_prepends_server_rows_and_announces_them() {
    let backend = backend();
    let mut store = loaded(&backend);
    let notifier = CapturingNotifier::default();
    let service = TicketService::new(&backend, RecordingSleeper::default())
        .with_notifier(Box::new(notifier.clone()));

    let ids = service
        .create(
            &mut store,
            vec![
                TicketDraft {
                    title: "Printer".into(),
                    project_id: Some(2),
                    ..TicketDraft::default()
                },
                TicketDraft {
                    title: "Scanner".into(),
                    project_id: Some(2),
                    assignee: Some("kim".into()),
                    ..TicketDraft::default()
                },
            ],
            "dana",
            now(),
        )
        .unwrap();

    assert_eq!(ids, vec![4, 5]);
    let order: Vec<_> = store.tickets().iter().map(|t| t.id).collect();
    assert_eq!(order, vec![5, 4, 3, 2, 1]);
    assert_eq!(store.get(4).unwrap().project_name, "Reports");
    assert_eq!(store.get(5).unwrap().created_by.as_deref(), Some("dana"));
    assert!(!store.creation_flag().is_set());

    let announced = notifier.0.borrow();
    assert_eq!(announced.as_slice(), &[(vec![4, 5], "dana".to_string())]);
}

#[test]
fn channel_echo_of_own_insert_is_ignored_after_create() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());

    let ids = service
        .create(
            &mut store,
            vec![TicketDraft {
                title: "Printer".into(),
                project_id: Some(2),
                ..TicketDraft::default()
            }],
            "dana",
            now(),
        )
        .unwrap();

    let echo = backend.row("tickets", ids[0]).unwrap();
    store.apply_change(
        &json!({"eventType": "INSERT", "new": echo}),
        std::time::Instant::now(),
    );
    assert_eq!(store.len(), 4);
}

#[test]
fn failed_insert_releases_creation_flag() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());
    backend.fail_writes(1, &BackendError::Status { status: 500, body: "boom".into() });

    let err = service
        .create(
            &mut store,
            vec![TicketDraft {
                title: "Printer".into(),
                project_id: Some(2),
                ..TicketDraft::default()
            }],
            "dana",
            now(),
        )
        .unwrap_err();

    assert!(matches!(err, TicketError::Create(_)));
    assert!(!store.creation_flag().is_set());
    assert_eq!(store.len(), 3);
}

#[test]
fn announcement_failure_is_only_a_toast() {
    let backend = backend();
    let mut store = loaded(&backend);
    let toasts = ToastQueue::new();
    let service = TicketService::new(&backend, RecordingSleeper::default())
        .with_notifier(Box::new(FailingNotifier))
        .with_toasts(Box::new(toasts.clone()));

    let ids = service
        .create(
            &mut store,
            vec![TicketDraft {
                title: "Printer".into(),
                project_id: Some(2),
                ..TicketDraft::default()
            }],
            "dana",
            now(),
        )
        .unwrap();

    assert_eq!(ids.len(), 1);
    let levels: Vec<_> = toasts.drain().into_iter().map(|t| t.level).collect();
    assert_eq!(levels, vec![ToastLevel::Success, ToastLevel::Error]);
}

#[test]
fn bulk_status_sends_one_rpc_with_per_ticket_patches() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());

    let outcome = service
        .bulk_status(&mut store, &[1, 2, 3], Status::Completed, "dana", now())
        .unwrap();
    assert_eq!(outcome.updated, vec![1, 2]);
    assert_eq!(outcome.unchanged, vec![3]);

    let Some(Call::Rpc { function, args }) = backend.calls().into_iter().last() else {
        panic!("expected an rpc call");
    };
    assert_eq!(function, "bulk_update_tickets");
    let updates = args["updates"].as_array().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0]["id"], json!(1));
    assert_eq!(updates[0]["updates"]["started_at"], json!("2024-07-04T09:30:00+00:00"));
    assert!(updates[1]["updates"].get("started_at").is_none());
    assert_eq!(updates[1]["updates"]["completed_at"], json!("2024-07-04T09:30:00+00:00"));

    for id in [1, 2] {
        let ticket = store.get(id).unwrap();
        assert_eq!(ticket.status, Status::Completed);
        assert!(ticket.started_at.is_some());
        assert!(ticket.completed_at.is_some());
    }
    assert_eq!(
        backend.row("tickets", 2).unwrap()["status"],
        Value::from("Completed")
    );
}

#[test]
fn bulk_with_unknown_id_writes_nothing() {
    let backend = backend();
    let mut store = loaded(&backend);
    let service = TicketService::new(&backend, RecordingSleeper::default());
    let calls = backend.calls().len();

    let err = service
        .bulk_status(&mut store, &[1, 99], Status::Cancelled, "dana", now())
        .unwrap_err();
    assert!(matches!(err, TicketError::NotFound(99)));
    assert_eq!(backend.calls().len(), calls);
    assert_eq!(store.get(1).unwrap().status, Status::Open);
}
