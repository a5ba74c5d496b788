use std::sync::LockResult;

use tracing::warn;

/// Take the guard even if another thread panicked while holding the lock.
///
/// Entries are whole serialized snapshots, so a poisoned cache can hold a stale
/// entry but never a torn one.
pub(crate) fn recover<G>(result: LockResult<G>, source: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            source,
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}
