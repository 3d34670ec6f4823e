use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use ticketdesk_core::model::Status;
use ticketdesk_core::transition::{Effect, FieldWrite, TimestampState, resolve, rule};

use Effect::{Clear, Keep, SetNow};
use Status::{Blocked, Cancelled, Completed, InProgress, OnHold, Open, Rejected};

/// `(old, new, started_at, completed_at)` for every pair with a different target.
const TABLE: [(Status, Status, Effect, Effect); 42] = [
    (Open, InProgress, SetNow, Keep),
    (Open, OnHold, Keep, Keep),
    (Open, Blocked, Keep, Keep),
    (Open, Cancelled, SetNow, SetNow),
    (Open, Rejected, SetNow, SetNow),
    (Open, Completed, SetNow, SetNow),
    (InProgress, Open, Clear, Keep),
    (InProgress, OnHold, Keep, Keep),
    (InProgress, Blocked, Keep, Keep),
    (InProgress, Cancelled, Keep, SetNow),
    (InProgress, Rejected, Keep, SetNow),
    (InProgress, Completed, Keep, SetNow),
    (OnHold, Open, Keep, Keep),
    (OnHold, Blocked, Keep, Keep),
    (OnHold, InProgress, SetNow, Keep),
    (OnHold, Cancelled, Keep, Keep),
    (OnHold, Rejected, SetNow, SetNow),
    (OnHold, Completed, SetNow, SetNow),
    (Blocked, Open, Keep, Keep),
    (Blocked, OnHold, Keep, Keep),
    (Blocked, InProgress, SetNow, Keep),
    (Blocked, Cancelled, Keep, Keep),
    (Blocked, Rejected, SetNow, SetNow),
    (Blocked, Completed, SetNow, SetNow),
    (Cancelled, Open, Clear, Clear),
    (Cancelled, OnHold, Keep, Clear),
    (Cancelled, InProgress, Keep, Clear),
    (Cancelled, Blocked, Keep, Keep),
    (Cancelled, Rejected, SetNow, SetNow),
    (Cancelled, Completed, SetNow, SetNow),
    (Rejected, Open, Clear, Clear),
    (Rejected, OnHold, Keep, Clear),
    (Rejected, InProgress, Keep, Clear),
    (Rejected, Blocked, Keep, Keep),
    (Rejected, Cancelled, SetNow, SetNow),
    (Rejected, Completed, SetNow, SetNow),
    (Completed, Open, Clear, Clear),
    (Completed, OnHold, Keep, Clear),
    (Completed, InProgress, Keep, Clear),
    (Completed, Blocked, Keep, Keep),
    (Completed, Cancelled, SetNow, SetNow),
    (Completed, Rejected, SetNow, SetNow),
];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn expected(effect: Effect) -> FieldWrite {
    match effect {
        Keep => FieldWrite::Keep,
        SetNow => FieldWrite::Set(now()),
        Clear => FieldWrite::Clear,
    }
}

#[test]
fn table_covers_every_pair_once() {
    for old in Status::ALL {
        for new in Status::ALL {
            let rows = TABLE
                .iter()
                .filter(|(o, n, _, _)| *o == old && *n == new)
                .count();
            assert_eq!(rows, usize::from(old != new), "{old} -> {new}");
        }
    }
}

#[test]
fn rule_matches_table_for_all_42_pairs() {
    for (old, new, started, completed) in TABLE {
        assert_eq!(rule(old, new), (started, completed), "{old} -> {new}");
    }
}

#[test]
fn resolve_with_populated_timestamps_is_exactly_the_table() {
    let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for (old, new, started, completed) in TABLE {
        let patch = resolve(
            TimestampState {
                status: old,
                started_at: Some(earlier),
                completed_at: Some(earlier),
            },
            new,
            now(),
        );
        assert_eq!(patch.status, new);
        assert_eq!(patch.started_at, expected(started), "{old} -> {new} started_at");
        assert_eq!(patch.completed_at, expected(completed), "{old} -> {new} completed_at");
    }
}

#[test]
fn untouched_columns_are_not_written() {
    let patch = resolve(
        TimestampState {
            status: OnHold,
            started_at: None,
            completed_at: None,
        },
        Blocked,
        now(),
    );
    assert_eq!(Value::Object(patch.to_fields()), json!({"status": "Blocked"}));
}

#[test]
fn open_ticket_completed_at_t() {
    let patch = resolve(
        TimestampState {
            status: Open,
            started_at: None,
            completed_at: None,
        },
        Completed,
        now(),
    );
    assert_eq!(
        Value::Object(patch.to_fields()),
        json!({
            "status": "Completed",
            "started_at": "2024-06-01T12:00:00+00:00",
            "completed_at": "2024-06-01T12:00:00+00:00",
        })
    );
}

#[test]
fn cancelled_ticket_reopened_clears_both() {
    let patch = resolve(
        TimestampState {
            status: Cancelled,
            started_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            completed_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
        },
        Open,
        now(),
    );
    assert_eq!(
        Value::Object(patch.to_fields()),
        json!({"status": "Open", "started_at": null, "completed_at": null})
    );
}

#[test]
fn parked_to_cancelled_backfills_missing_timestamps() {
    let started = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let patch = resolve(
        TimestampState {
            status: OnHold,
            started_at: Some(started),
            completed_at: None,
        },
        Cancelled,
        now(),
    );
    assert_eq!(patch.started_at, FieldWrite::Keep);
    assert_eq!(patch.completed_at, FieldWrite::Set(now()));
}

#[test]
fn resolve_is_deterministic() {
    let state = TimestampState {
        status: InProgress,
        started_at: None,
        completed_at: None,
    };
    assert_eq!(resolve(state, Rejected, now()), resolve(state, Rejected, now()));
}
