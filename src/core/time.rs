//! Timestamp and run-id helpers for batch summaries.

use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

/// Stamp written to every CSV row and JSONL record of one batch run:
/// whole seconds since the epoch, `Z`-suffixed. A clock set before 1970
/// stamps `0Z` rather than failing the run.
pub fn now_epoch_z() -> String {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{elapsed}Z")
}

/// Sortable id tying together the rows written by one batch run.
pub fn new_run_id() -> String {
    Ulid::new().to_string()
}
