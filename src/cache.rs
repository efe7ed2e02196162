use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db;
use crate::error::RosterResult;
use crate::ingest;
use crate::models::StudentRecord;
use crate::source::{self, SheetSource};

/// Ten minutes, the dashboard's default staleness window.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_RETRIES: u32 = 2;

struct CachedBatch {
    loaded_at: Instant,
    students: Arc<[StudentRecord]>,
}

/// Holds the last fetched batch until it goes stale.
///
/// The batch is shared read-only. A refresh swaps in a new `Arc`; holders of
/// the previous one keep seeing the old collection.
pub struct RosterCache {
    stale_after: Duration,
    batch: Option<CachedBatch>,
}

impl RosterCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            batch: None,
        }
    }

    /// Changes the staleness window; applies to the batch already held too.
    pub fn invalidate_after(&mut self, stale_after: Duration) {
        self.stale_after = stale_after;
    }

    pub fn invalidate(&mut self) {
        self.batch = None;
    }

    pub fn fresh(&self) -> Option<Arc<[StudentRecord]>> {
        self.fresh_at(Instant::now())
    }

    pub fn fresh_at(&self, now: Instant) -> Option<Arc<[StudentRecord]>> {
        let batch = self.batch.as_ref()?;
        let age = now.saturating_duration_since(batch.loaded_at);
        (age < self.stale_after).then(|| Arc::clone(&batch.students))
    }

    pub fn replace(&mut self, students: Vec<StudentRecord>) -> Arc<[StudentRecord]> {
        self.replace_at(students, Instant::now())
    }

    fn replace_at(&mut self, students: Vec<StudentRecord>, now: Instant) -> Arc<[StudentRecord]> {
        let students: Arc<[StudentRecord]> = students.into();
        self.batch = Some(CachedBatch {
            loaded_at: now,
            students: Arc::clone(&students),
        });
        students
    }
}

impl Default for RosterCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

/// Data-access layer: serves the cached batch while fresh, otherwise goes
/// back to the source with the retry budget.
pub struct RosterLoader<S> {
    source: S,
    cache: RosterCache,
    retries: u32,
}

impl<S: SheetSource> RosterLoader<S> {
    pub fn new(source: S, cache: RosterCache, retries: u32) -> Self {
        Self {
            source,
            cache,
            retries,
        }
    }

    pub async fn students(&mut self) -> RosterResult<Arc<[StudentRecord]>> {
        if let Some(students) = self.cache.fresh() {
            debug!(students = students.len(), "roster cache hit");
            return Ok(students);
        }
        debug!("roster cache miss");
        self.refresh().await
    }

    /// Fetches regardless of freshness. On failure the previous batch stays cached.
    pub async fn refresh(&mut self) -> RosterResult<Arc<[StudentRecord]>> {
        let report = source::load_with_retry(&self.source, self.retries).await?;
        Ok(self.cache.replace(report.students))
    }

    pub fn cache_mut(&mut self) -> &mut RosterCache {
        &mut self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Wraps a source so that separate processes share one download.
///
/// The last readable document is kept in the local store with its fetch
/// time and served again until it is `stale_after` old. Store failures are
/// logged and fall through to the wrapped source.
pub struct SnapshotSource<S> {
    inner: S,
    pool: SqlitePool,
    stale_after: Duration,
}

impl<S: SheetSource> SnapshotSource<S> {
    pub fn new(inner: S, pool: SqlitePool, stale_after: Duration) -> Self {
        Self {
            inner,
            pool,
            stale_after,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn fetch_csv_at(&self, now: DateTime<Utc>) -> RosterResult<String> {
        let key = self.inner.describe();

        match db::latest_roster_snapshot(&self.pool, &key).await {
            Ok(Some(snapshot)) if is_fresh(snapshot.fetched_at, now, self.stale_after) => {
                debug!(source = %key, fetched_at = %snapshot.fetched_at, "roster snapshot hit");
                return Ok(snapshot.body);
            }
            Ok(_) => debug!(source = %key, "roster snapshot miss"),
            Err(err) => warn!(source = %key, error = %err, "roster snapshot unreadable"),
        }

        let body = self.inner.fetch_csv().await?;

        // A page that yields no students (a sign-in page, an empty tab) is
        // handed on but never stored.
        if ingest::parse_students_str(&body)?.students.is_empty() {
            warn!(source = %key, "downloaded roster has no students, not storing it");
            return Ok(body);
        }
        if let Err(err) = db::save_roster_snapshot(&self.pool, &key, &body, now).await {
            warn!(source = %key, error = %err, "failed to store roster snapshot");
        }
        Ok(body)
    }
}

#[async_trait]
impl<S: SheetSource> SheetSource for SnapshotSource<S> {
    async fn fetch_csv(&self) -> RosterResult<String> {
        self.fetch_csv_at(Utc::now()).await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, stale_after: Duration) -> bool {
    (now - fetched_at)
        .to_std()
        .map_or(false, |age| age < stale_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RosterError;
    use chrono::TimeZone;

    use crate::db::tests::memory_pool;
    use crate::source::tests::{unavailable, ScriptedSource, TWO_STUDENTS};

    fn loader(source: ScriptedSource, stale_after: Duration) -> RosterLoader<ScriptedSource> {
        RosterLoader::new(source, RosterCache::new(stale_after), DEFAULT_RETRIES)
    }

    #[tokio::test]
    async fn serves_fresh_batch_without_refetching() {
        let mut loader = loader(ScriptedSource::always(TWO_STUDENTS), DEFAULT_STALE_AFTER);

        let first = loader.students().await.unwrap();
        let second = loader.students().await.unwrap();

        assert_eq!(loader.source().calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn stale_batch_is_replaced_wholesale() {
        let mut loader = loader(ScriptedSource::always(TWO_STUDENTS), Duration::ZERO);

        let first = loader.students().await.unwrap();
        let second = loader.students().await.unwrap();

        assert_eq!(loader.source().calls(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(&first[..], &second[..]);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let mut loader = loader(ScriptedSource::always(TWO_STUDENTS), DEFAULT_STALE_AFTER);
        loader.students().await.unwrap();
        loader.cache_mut().invalidate();
        loader.students().await.unwrap();
        assert_eq!(loader.source().calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_batch() {
        let source = ScriptedSource::new(vec![Ok(TWO_STUDENTS.to_string())], unavailable());
        let mut loader = loader(source, DEFAULT_STALE_AFTER);

        let cached = loader.students().await.unwrap();
        let err = loader.refresh().await.unwrap_err();

        assert!(matches!(err, RosterError::SourceUnavailable { attempts: 3, .. }));
        let still_cached = loader.students().await.unwrap();
        assert!(Arc::ptr_eq(&cached, &still_cached));
    }

    #[test]
    fn freshness_follows_window() {
        let mut cache = RosterCache::new(Duration::from_secs(60));
        let loaded_at = Instant::now();
        cache.replace_at(vec![StudentRecord::new(1, "R1", "Alice")], loaded_at);

        assert!(cache.fresh_at(loaded_at + Duration::from_secs(59)).is_some());
        assert!(cache.fresh_at(loaded_at + Duration::from_secs(60)).is_none());

        cache.invalidate_after(Duration::from_secs(120));
        assert!(cache.fresh_at(loaded_at + Duration::from_secs(60)).is_some());
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn snapshot_is_shared_between_runs_while_fresh() {
        let pool = memory_pool().await;

        let first_run = SnapshotSource::new(
            ScriptedSource::always(TWO_STUDENTS),
            pool.clone(),
            DEFAULT_STALE_AFTER,
        );
        assert_eq!(first_run.fetch_csv_at(at(0)).await.unwrap(), TWO_STUDENTS);
        assert_eq!(first_run.inner().calls(), 1);

        let second_run = SnapshotSource::new(
            ScriptedSource::new(Vec::new(), unavailable()),
            pool.clone(),
            DEFAULT_STALE_AFTER,
        );
        assert_eq!(second_run.fetch_csv_at(at(9)).await.unwrap(), TWO_STUDENTS);
        assert_eq!(second_run.inner().calls(), 0);

        let err = second_run.fetch_csv_at(at(10)).await.unwrap_err();
        assert!(matches!(err, RosterError::SourceUnavailable { .. }));
        assert_eq!(second_run.inner().calls(), 1);
    }

    #[tokio::test]
    async fn zero_window_always_downloads() {
        let pool = memory_pool().await;
        let source = SnapshotSource::new(
            ScriptedSource::always(TWO_STUDENTS),
            pool,
            Duration::ZERO,
        );

        source.fetch_csv_at(at(0)).await.unwrap();
        source.fetch_csv_at(at(0)).await.unwrap();
        assert_eq!(source.inner().calls(), 2);
    }

    #[tokio::test]
    async fn document_without_students_is_not_stored() {
        let pool = memory_pool().await;
        let source = SnapshotSource::new(
            ScriptedSource::always("<html><body>Sign in</body></html>\n"),
            pool.clone(),
            DEFAULT_STALE_AFTER,
        );

        source.fetch_csv_at(at(0)).await.unwrap();
        source.fetch_csv_at(at(1)).await.unwrap();
        assert_eq!(source.inner().calls(), 2);
        assert_eq!(db::latest_roster_snapshot(&pool, "scripted").await.unwrap(), None);
    }

    #[tokio::test]
    async fn loader_reads_through_snapshot() {
        let pool = memory_pool().await;
        db::save_roster_snapshot(&pool, "scripted", TWO_STUDENTS, Utc::now())
            .await
            .unwrap();

        let source = SnapshotSource::new(
            ScriptedSource::new(Vec::new(), unavailable()),
            pool,
            DEFAULT_STALE_AFTER,
        );
        let mut loader = RosterLoader::new(source, RosterCache::default(), DEFAULT_RETRIES);

        let students = loader.students().await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(loader.source().inner().calls(), 0);
    }
}
