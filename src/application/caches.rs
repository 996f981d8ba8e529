//! Per-view lookup caches and the read-through helper shared by services.

use std::{future::Future, sync::Arc};

use tracing::{debug, warn};

use crate::application::repos::RepoError;
use crate::cache::{CacheConfig, CacheError, Clock, SystemClock, TtlCache};
use crate::domain::entities::{BillSummary, GradeSheet, StudentInfo};

const SOURCE: &str = "application::caches";

/// A cached value that may be missing pieces required to render it.
pub trait CachedView: Send + Sync {
    fn is_complete(&self) -> bool;
}

impl CachedView for StudentInfo {
    fn is_complete(&self) -> bool {
        StudentInfo::is_complete(self)
    }
}

impl CachedView for GradeSheet {
    fn is_complete(&self) -> bool {
        GradeSheet::is_complete(self)
    }
}

impl CachedView for BillSummary {
    fn is_complete(&self) -> bool {
        BillSummary::is_complete(self)
    }
}

/// One cache per view shape.
pub struct StudentCaches {
    /// Keyed by RFID.
    pub info: TtlCache<String, Arc<StudentInfo>>,
    /// Keyed by RFID.
    pub grades: TtlCache<String, Arc<GradeSheet>>,
    /// Keyed by [`StudentCaches::semester_key`].
    pub semester_grades: TtlCache<String, Arc<GradeSheet>>,
    /// Keyed by RFID.
    pub bills: TtlCache<String, Arc<BillSummary>>,
}

impl StudentCaches {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let ttl = config.ttl();
        Ok(Self {
            info: TtlCache::new("student_info", config.capacity, ttl)?
                .with_clock(Arc::clone(&clock)),
            grades: TtlCache::new("grades", config.capacity, ttl)?.with_clock(Arc::clone(&clock)),
            semester_grades: TtlCache::new("semester_grades", config.capacity, ttl)?
                .with_clock(Arc::clone(&clock)),
            bills: TtlCache::new("bills", config.capacity, ttl)?.with_clock(clock),
        })
    }

    pub fn semester_key(student_id: &str, semester: &str) -> String {
        format!("{student_id}:{semester}")
    }

    /// Sweep every cache, returning the total number of entries dropped.
    pub fn purge_expired(&self) -> usize {
        self.info.purge_expired()
            + self.grades.purge_expired()
            + self.semester_grades.purge_expired()
            + self.bills.purge_expired()
    }
}

/// A value served by [`load_through`].
#[derive(Debug)]
pub struct Cached<V> {
    pub value: Arc<V>,
    pub hit: bool,
}

/// Serve `key` from `cache`, falling back to `fetch` on a miss.
///
/// An incomplete cached value is deleted and treated as a miss. Only complete
/// fetched values are stored; an incomplete fetch is reported as not found.
pub async fn load_through<V, F, Fut>(
    cache: &TtlCache<String, Arc<V>>,
    key: &str,
    fetch: F,
) -> Result<Option<Cached<V>>, RepoError>
where
    V: CachedView,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<V>, RepoError>>,
{
    if let Some(value) = cache.get(key) {
        if value.is_complete() {
            debug!(target_module = SOURCE, cache = cache.name(), key, "cache hit");
            return Ok(Some(Cached { value, hit: true }));
        }

        warn!(
            target_module = SOURCE,
            cache = cache.name(),
            key,
            "discarding incomplete cached value"
        );
        cache.delete(key);
    }

    let Some(value) = fetch().await? else {
        return Ok(None);
    };
    if !value.is_complete() {
        debug!(
            target_module = SOURCE,
            cache = cache.name(),
            key,
            "fetched value incomplete, not caching"
        );
        return Ok(None);
    }

    let value = Arc::new(value);
    cache.set(key.to_string(), Arc::clone(&value));
    Ok(Some(Cached { value, hit: false }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn info(with_student: bool) -> StudentInfo {
        StudentInfo {
            student: with_student.then(|| crate::domain::entities::StudentRecord {
                student_id: "2023-001".to_string(),
                rfid: "ACLC-2023-001".to_string(),
                first_name: Some("Maria".to_string()),
                middle_name: None,
                last_name: Some("Reyes".to_string()),
                email: None,
                year_level: Some(1),
                program: None,
                block_section: None,
                status: None,
            }),
            grades_summary: Vec::new(),
            assessment: None,
            payment_schedules: Vec::new(),
        }
    }

    fn caches() -> StudentCaches {
        StudentCaches::new(&CacheConfig::default()).expect("default config is valid")
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let caches = caches();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(info(true)))
        };

        let first = load_through(&caches.info, "ACLC-2023-001", fetch)
            .await
            .expect("lookup succeeds")
            .expect("found");
        assert!(!first.hit);

        let second = load_through(&caches.info, "ACLC-2023-001", fetch)
            .await
            .expect("lookup succeeds")
            .expect("found");
        assert!(second.hit);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn incomplete_cached_value_is_replaced() {
        let caches = caches();
        caches
            .info
            .set("ACLC-2023-001".to_string(), Arc::new(info(false)));

        let found = load_through(&caches.info, "ACLC-2023-001", || async {
            Ok(Some(info(true)))
        })
        .await
        .expect("lookup succeeds")
        .expect("found");

        assert!(!found.hit);
        assert!(
            caches
                .info
                .get("ACLC-2023-001")
                .is_some_and(|cached| cached.is_complete())
        );
    }

    #[tokio::test]
    async fn incomplete_fetch_is_not_cached() {
        let caches = caches();

        let found = load_through(&caches.info, "unknown", || async { Ok(Some(info(false))) })
            .await
            .expect("lookup succeeds");

        assert!(found.is_none());
        assert!(caches.info.is_empty());
    }

    #[tokio::test]
    async fn repository_errors_propagate_and_leave_cache_untouched() {
        let caches = caches();

        let result = load_through(&caches.info, "ACLC-2023-001", || async {
            Err::<Option<StudentInfo>, _>(RepoError::Timeout)
        })
        .await;

        assert!(matches!(result, Err(RepoError::Timeout)));
        assert!(caches.info.is_empty());
    }

    #[test]
    fn semester_key_joins_with_colon() {
        assert_eq!(
            StudentCaches::semester_key("2023-001", "Second Semester"),
            "2023-001:Second Semester"
        );
    }
}
