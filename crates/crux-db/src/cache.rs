//! Read-through job cache.
//!
//! Entries are filled on read and dropped by every write before the write
//! returns. A fill that raced with a write is discarded: writers bump the
//! generation before invalidating, and readers re-check it after inserting.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crux_models::{Job, JobId, NewJob, TerminalUpdate};
use dashmap::DashMap;
use tracing::trace;

use crate::error::DbResult;
use crate::store::JobStore;

/// Listing cache key; `None` is the unfiltered listing.
type OwnerKey = Option<String>;

pub struct CachedJobStore<S> {
    inner: S,
    jobs: DashMap<JobId, Job>,
    listings: DashMap<OwnerKey, Vec<Job>>,
    tags: DashMap<(), Vec<String>>,
    generation: AtomicU64,
}

impl<S: JobStore> CachedJobStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            jobs: DashMap::new(),
            listings: DashMap::new(),
            tags: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.jobs.clear();
        self.listings.clear();
        self.tags.clear();
    }

    fn invalidate(&self, id: JobId, owner: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.jobs.remove(&id);
        self.listings.remove(&Some(owner.to_string()));
        self.listings.remove(&None);
        self.tags.clear();
        trace!(job_id = %id, owner, "Invalidated cached job entries");
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Owner of `id` as far as we can tell without failing the write.
    async fn owner_of(&self, id: JobId) -> Option<String> {
        if let Some(job) = self.jobs.get(&id) {
            return Some(job.metadata.user_id.clone());
        }
        self.inner
            .get(id)
            .await
            .ok()
            .flatten()
            .map(|job| job.metadata.user_id)
    }
}

#[async_trait]
impl<S: JobStore> JobStore for CachedJobStore<S> {
    async fn create(&self, new_job: NewJob) -> DbResult<Job> {
        let job = self.inner.create(new_job).await?;
        self.invalidate(job.id, &job.metadata.user_id);
        Ok(job)
    }

    async fn get(&self, id: JobId) -> DbResult<Option<Job>> {
        if let Some(job) = self.jobs.get(&id) {
            return Ok(Some(job.clone()));
        }

        let seen = self.generation();
        let job = self.inner.get(id).await?;
        if let Some(job) = &job {
            self.jobs.insert(id, job.clone());
            if self.generation() != seen {
                self.jobs.remove(&id);
            }
        }
        Ok(job)
    }

    async fn list(&self, owner: Option<&str>) -> DbResult<Vec<Job>> {
        let key: OwnerKey = owner.map(str::to_string);
        if let Some(jobs) = self.listings.get(&key) {
            return Ok(jobs.clone());
        }

        let seen = self.generation();
        let jobs = self.inner.list(owner).await?;
        self.listings.insert(key.clone(), jobs.clone());
        if self.generation() != seen {
            self.listings.remove(&key);
        }
        Ok(jobs)
    }

    async fn transition(&self, id: JobId, update: &TerminalUpdate) -> DbResult<Job> {
        match self.inner.transition(id, update).await {
            Ok(job) => {
                self.invalidate(id, &job.metadata.user_id);
                Ok(job)
            }
            Err(e) => {
                // The row may have moved under us; never keep serving it.
                if let Some(owner) = self.owner_of(id).await {
                    self.invalidate(id, &owner);
                } else {
                    self.clear();
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, id: JobId) -> DbResult<Job> {
        let job = self.inner.delete(id).await?;
        self.invalidate(id, &job.metadata.user_id);
        Ok(job)
    }

    async fn list_processing_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Job>> {
        self.inner.list_processing_before(cutoff).await
    }

    async fn list_tags(&self) -> DbResult<Vec<String>> {
        if let Some(tags) = self.tags.get(&()) {
            return Ok(tags.clone());
        }

        let seen = self.generation();
        let tags = self.inner.list_tags().await?;
        self.tags.insert((), tags.clone());
        if self.generation() != seen {
            self.tags.clear();
        }
        Ok(tags)
    }

    async fn ping(&self) -> DbResult<()> {
        self.inner.ping().await
    }
}
