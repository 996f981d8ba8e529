use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Acquire `lock`, recovering the guard when a previous holder panicked.
///
/// Every cache and scan log mutation completes inside a single critical
/// section, so the recovered state is always one a caller could have observed.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "a panic occurred while another caller held the lock",
                "Recovered from poisoned lock"
            );
            poisoned.into_inner()
        }
    }
}
