//! In-memory job store.
//!
//! Mirrors the PostgreSQL semantics (guarded transitions, newest-first
//! listings, sorted distinct tags) without a database. Used by tests and
//! local runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crux_models::{Job, JobId, NewJob, TerminalUpdate};
use tokio::sync::RwLock;

use crate::error::{DbError, DbResult};
use crate::store::JobStore;

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    unavailable: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a transient error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of read calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Insert a row as-is, bypassing `create`.
    pub async fn insert_raw(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    fn check(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> DbResult<()> {
        self.check()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn newest_first(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    jobs
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, new_job: NewJob) -> DbResult<Job> {
        self.check()?;
        let job = Job::processing(new_job, Utc::now());
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> DbResult<Option<Job>> {
        self.read()?;
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list(&self, owner: Option<&str>) -> DbResult<Vec<Job>> {
        self.read()?;
        let jobs = self.jobs.read().await;
        let matching = jobs
            .values()
            .filter(|job| owner.map_or(true, |o| job.metadata.user_id == o))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn transition(&self, id: JobId, update: &TerminalUpdate) -> DbResult<Job> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(DbError::NotFound(id))?;
        job.apply(update, Utc::now())
            .map_err(|status| DbError::InvalidTransition { id, status })?;
        Ok(job.clone())
    }

    async fn delete(&self, id: JobId) -> DbResult<Job> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        match jobs.get(&id) {
            None => Err(DbError::NotFound(id)),
            Some(job) if !job.is_terminal() => Err(DbError::InFlight(id)),
            Some(_) => jobs.remove(&id).ok_or(DbError::NotFound(id)),
        }
    }

    async fn list_processing_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Job>> {
        self.read()?;
        let jobs = self.jobs.read().await;
        let mut stale: Vec<Job> = jobs
            .values()
            .filter(|job| !job.is_terminal() && job.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|job| job.created_at);
        Ok(stale)
    }

    async fn list_tags(&self) -> DbResult<Vec<String>> {
        self.read()?;
        let jobs = self.jobs.read().await;
        let tags: BTreeSet<String> = jobs
            .values()
            .flat_map(|job| job.metadata.tags.iter().cloned())
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn ping(&self) -> DbResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crux_models::{ClimbMetadata, JobStatus};

    fn new_job(user: &str, tags: &str) -> NewJob {
        NewJob::new(ClimbMetadata::new(user, "Project").with_tags(tags))
    }

    fn failed(msg: &str) -> TerminalUpdate {
        TerminalUpdate::Failed {
            error: msg.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job("u1", "board")).await.unwrap();

        assert_eq!(job.status, JobStatus::Processing);
        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched, job);
        assert!(store.get(JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_is_single_shot() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job("u1", "")).await.unwrap();

        let done = store.transition(job.id, &failed("boom")).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);

        let err = store
            .transition(job.id, &TerminalUpdate::TimedOut { error: "late".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidTransition {
                status: JobStatus::Failed,
                ..
            }
        ));

        let err = store.transition(JobId::new(), &failed("x")).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_terminal() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job("u1", "")).await.unwrap();

        assert!(matches!(
            store.delete(job.id).await.unwrap_err(),
            DbError::InFlight(_)
        ));

        store.transition(job.id, &failed("boom")).await.unwrap();
        let deleted = store.delete(job.id).await.unwrap();
        assert_eq!(deleted.id, job.id);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_by_owner_and_tags() {
        let store = MemoryJobStore::new();
        store.create(new_job("u1", "comp,board")).await.unwrap();
        store.create(new_job("u1", "crimp")).await.unwrap();
        store.create(new_job("u2", "board")).await.unwrap();

        assert_eq!(store.list(Some("u1")).await.unwrap().len(), 2);
        assert_eq!(store.list(None).await.unwrap().len(), 3);
        assert!(store.list(Some("nobody")).await.unwrap().is_empty());
        assert_eq!(
            store.list_tags().await.unwrap(),
            vec!["board", "comp", "crimp"]
        );
    }

    #[tokio::test]
    async fn test_list_processing_before() {
        let store = MemoryJobStore::new();
        let mut old = Job::processing(new_job("u1", ""), Utc::now() - Duration::hours(2));
        old.created_at = Utc::now() - Duration::hours(2);
        store.insert_raw(old.clone()).await;
        store.create(new_job("u1", "")).await.unwrap();

        let stale = store
            .list_processing_before(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[tokio::test]
    async fn test_unavailable_is_transient() {
        let store = MemoryJobStore::new();
        store.set_unavailable(true);

        let err = store.create(new_job("u1", "")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.ping().await.is_err());

        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
