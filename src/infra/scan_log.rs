//! Bounded in-memory scan log.

use std::{collections::VecDeque, num::NonZeroUsize, sync::Mutex};

use async_trait::async_trait;
use metrics::counter;

use crate::application::repos::{RepoError, ScanLogRepo};
use crate::cache::mutex_lock;
use crate::domain::scan_log::{LogFilter, NewScanLog, ScanLogEntry};

const SOURCE: &str = "infra::scan_log";
const METRIC_RECORDED: &str = "rfid_scan_log_recorded_total";

struct LogState {
    entries: VecDeque<ScanLogEntry>,
    next_id: u64,
}

/// Keeps the most recent `capacity` entries; older ones are discarded.
pub struct MemoryScanLog {
    capacity: NonZeroUsize,
    state: Mutex<LogState>,
}

impl MemoryScanLog {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LogState {
                entries: VecDeque::with_capacity(capacity.get().min(1024)),
                next_id: 1,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ScanLogRepo for MemoryScanLog {
    async fn record(&self, entry: NewScanLog) -> Result<ScanLogEntry, RepoError> {
        let mut state = mutex_lock(&self.state, SOURCE, "record");
        let id = state.next_id;
        state.next_id += 1;

        let stored = ScanLogEntry::from_new(id, entry);
        counter!(METRIC_RECORDED, "status" => stored.status().as_str()).increment(1);

        if state.entries.len() >= self.capacity.get() {
            state.entries.pop_front();
        }
        state.entries.push_back(stored.clone());
        Ok(stored)
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<ScanLogEntry>, RepoError> {
        let state = mutex_lock(&self.state, SOURCE, "list");
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<usize, RepoError> {
        let mut state = mutex_lock(&self.state, SOURCE, "clear");
        let removed = state.entries.len();
        state.entries.clear();
        Ok(removed)
    }
}
