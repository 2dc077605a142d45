//! PostgreSQL job store.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use crux_models::{ClimbMetadata, Job, JobId, JobStatus, NewJob, TerminalUpdate};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::store::JobStore;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const JOB_COLUMNS: &str = "id, user_id, title, climbed_date, climb_type, board_type, \
     board_angle, grade, tags, description, climb_url, is_send, status, video_url, \
     thumbnail_url, video_key, thumbnail_key, error_message, created_at, updated_at, \
     completed_at";

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DbConfig {
    /// Load from `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> DbResult<Self> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| DbError::config_error("DATABASE_URL not set"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        Ok(Self {
            url,
            max_connections,
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    user_id: String,
    title: String,
    climbed_date: Option<NaiveDate>,
    climb_type: Option<String>,
    board_type: Option<String>,
    board_angle: Option<i32>,
    grade: i32,
    tags: Vec<String>,
    description: Option<String>,
    climb_url: Option<String>,
    is_send: bool,
    status: String,
    video_url: Option<String>,
    thumbnail_url: Option<String>,
    video_key: Option<String>,
    thumbnail_key: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| DbError::Corrupt(format!("{}: {}", row.id, e)))?;

        Ok(Job {
            id: JobId(row.id),
            status,
            metadata: ClimbMetadata {
                user_id: row.user_id,
                title: row.title,
                climbed_date: row.climbed_date,
                climb_type: row.climb_type,
                board_type: row.board_type,
                board_angle: row.board_angle,
                grade: row.grade,
                tags: row.tags,
                description: row.description,
                climb_url: row.climb_url,
                is_send: row.is_send,
            },
            video_url: row.video_url,
            thumbnail_url: row.thumbnail_url,
            video_key: row.video_key,
            thumbnail_key: row.thumbnail_key,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

fn into_jobs(rows: Vec<JobRow>) -> DbResult<Vec<Job>> {
    rows.into_iter().map(Job::try_from).collect()
}

/// Job store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool using the given config.
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn status_of(&self, id: JobId) -> DbResult<Option<JobStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM videos WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        status
            .map(|s| s.parse().map_err(|e| DbError::Corrupt(format!("{}: {}", id, e))))
            .transpose()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, new_job: NewJob) -> DbResult<Job> {
        let meta = &new_job.metadata;
        let sql = format!(
            "INSERT INTO videos (id, user_id, title, climbed_date, climb_type, board_type, \
             board_angle, grade, tags, description, climb_url, is_send, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'processing') \
             RETURNING {JOB_COLUMNS}"
        );

        let row: JobRow = sqlx::query_as(&sql)
            .bind(new_job.id.as_uuid())
            .bind(&meta.user_id)
            .bind(&meta.title)
            .bind(meta.climbed_date)
            .bind(&meta.climb_type)
            .bind(&meta.board_type)
            .bind(meta.board_angle)
            .bind(meta.grade)
            .bind(&meta.tags)
            .bind(&meta.description)
            .bind(&meta.climb_url)
            .bind(meta.is_send)
            .fetch_one(&self.pool)
            .await?;

        debug!(job_id = %new_job.id, "Inserted job row");
        row.try_into()
    }

    async fn get(&self, id: JobId) -> DbResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM videos WHERE id = $1");
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn list(&self, owner: Option<&str>) -> DbResult<Vec<Job>> {
        let rows: Vec<JobRow> = match owner {
            Some(user_id) => {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM videos WHERE user_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {JOB_COLUMNS} FROM videos ORDER BY created_at DESC");
                sqlx::query_as(&sql).fetch_all(&self.pool).await?
            }
        };

        into_jobs(rows)
    }

    async fn transition(&self, id: JobId, update: &TerminalUpdate) -> DbResult<Job> {
        let (video_url, video_key, thumbnail_url, thumbnail_key, error) = match update {
            TerminalUpdate::Completed {
                video_url,
                video_key,
                thumbnail_url,
                thumbnail_key,
            } => (
                Some(video_url.as_str()),
                Some(video_key.as_str()),
                Some(thumbnail_url.as_str()),
                thumbnail_key.as_deref(),
                None,
            ),
            TerminalUpdate::Failed { error } | TerminalUpdate::TimedOut { error } => {
                (None, None, None, None, Some(error.as_str()))
            }
        };

        // The status guard makes the terminal write single-shot.
        let sql = format!(
            "UPDATE videos SET status = $2, video_url = $3, video_key = $4, \
             thumbnail_url = $5, thumbnail_key = $6, error_message = $7, \
             updated_at = NOW(), completed_at = NOW() \
             WHERE id = $1 AND status = 'processing' \
             RETURNING {JOB_COLUMNS}"
        );

        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(update.status().as_str())
            .bind(video_url)
            .bind(video_key)
            .bind(thumbnail_url)
            .bind(thumbnail_key)
            .bind(error)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.status_of(id).await? {
                Some(status) => Err(DbError::InvalidTransition { id, status }),
                None => Err(DbError::NotFound(id)),
            },
        }
    }

    async fn delete(&self, id: JobId) -> DbResult<Job> {
        let sql = format!(
            "DELETE FROM videos WHERE id = $1 AND status <> 'processing' RETURNING {JOB_COLUMNS}"
        );
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.status_of(id).await? {
                Some(_) => Err(DbError::InFlight(id)),
                None => Err(DbError::NotFound(id)),
            },
        }
    }

    async fn list_processing_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM videos \
             WHERE status = 'processing' AND created_at < $1 ORDER BY created_at"
        );
        let rows: Vec<JobRow> = sqlx::query_as(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        into_jobs(rows)
    }

    async fn list_tags(&self) -> DbResult<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT tag FROM (SELECT unnest(tags) AS tag FROM videos) t ORDER BY tag",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
