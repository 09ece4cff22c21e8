use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

static LAST_NANOS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time, strictly later than every value previously returned
/// in this process. Mutation timestamps rely on this to always advance.
pub fn now() -> DateTime<Utc> {
    let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut prev = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(prev.saturating_add(1));
        match LAST_NANOS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return DateTime::from_timestamp_nanos(next),
            Err(actual) => prev = actual,
        }
    }
}

/// Never hand out a time at or before `ts` again. Called with the newest
/// stored timestamp at startup, so a wall clock that stepped back across a
/// restart cannot produce an `updatedAt` before an existing `createdAt`.
pub fn advance_past(ts: DateTime<Utc>) {
    if let Some(nanos) = ts.timestamp_nanos_opt() {
        LAST_NANOS.fetch_max(nanos, Ordering::AcqRel);
    }
}

/// Fixed-width RFC 3339 with nanoseconds, so lexical order is time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Accepts our own format and SQLite's `datetime('now')` layout.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .ok()
}
