//! Video API handlers.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use crux_models::{
    parse_tags, ClimbMetadata, Job, JobId, JobStatus, PROCESSING_PLACEHOLDER_URL,
};
use crux_worker::Upload;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the video file.
pub const VIDEO_FIELD: &str = "video";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Public view of a job. Object keys stay internal.
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoResponse {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(flatten)]
    pub metadata: ClimbMetadata,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for VideoResponse {
    fn from(job: Job) -> Self {
        let (video_url, thumbnail_url) = if job.status == JobStatus::Processing {
            (
                Some(PROCESSING_PLACEHOLDER_URL.to_string()),
                Some(PROCESSING_PLACEHOLDER_URL.to_string()),
            )
        } else {
            (job.video_url, job.thumbnail_url)
        };

        Self {
            id: job.id,
            status: job.status,
            metadata: job.metadata,
            video_url,
            thumbnail_url,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
}

/// Upload form fields other than the file.
#[derive(Debug, Default)]
struct UploadForm {
    user_id: Option<String>,
    title: Option<String>,
    climbed_date: Option<String>,
    climb_type: Option<String>,
    board_type: Option<String>,
    board_angle: Option<String>,
    grade: Option<String>,
    tags: Option<String>,
    description: Option<String>,
    climb_url: Option<String>,
    is_send: Option<String>,
}

impl UploadForm {
    fn set(&mut self, name: &str, value: String) {
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        let slot = match name {
            "user_id" => &mut self.user_id,
            "title" => &mut self.title,
            "climbed_date" => &mut self.climbed_date,
            "climb_type" => &mut self.climb_type,
            "board_type" => &mut self.board_type,
            "board_angle" => &mut self.board_angle,
            "grade" => &mut self.grade,
            "tags" => &mut self.tags,
            "description" => &mut self.description,
            "climb_url" => &mut self.climb_url,
            "is_send" => &mut self.is_send,
            _ => return,
        };
        *slot = Some(value);
    }

    fn into_metadata(self) -> ApiResult<ClimbMetadata> {
        let mut meta = ClimbMetadata::new(
            self.user_id.unwrap_or_default(),
            self.title.unwrap_or_default(),
        );

        meta.climbed_date = self
            .climbed_date
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .map_err(|_| ApiError::bad_request(format!("invalid climbed_date: {d}")))
            })
            .transpose()?;
        meta.board_angle = self
            .board_angle
            .map(|a| {
                a.parse()
                    .map_err(|_| ApiError::bad_request(format!("invalid board_angle: {a}")))
            })
            .transpose()?;
        if let Some(grade) = self.grade {
            meta.grade = grade
                .parse()
                .map_err(|_| ApiError::bad_request(format!("invalid grade: {grade}")))?;
        }
        meta.tags = self.tags.as_deref().map(parse_tags).unwrap_or_default();
        meta.climb_type = self.climb_type;
        meta.board_type = self.board_type;
        meta.description = self.description;
        meta.climb_url = self.climb_url;
        meta.is_send = self
            .is_send
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes"));

        Ok(meta)
    }
}

/// Accept an upload and start processing it.
///
/// POST /api/videos
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut upload: Option<Upload> = None;
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == VIDEO_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let data = field.bytes().await?;
            upload = Some(Upload::new(file_name, data.to_vec()));
        } else {
            let value = field.text().await?;
            form.set(&name, value);
        }
    }

    let metadata = form.into_metadata()?;
    let upload = upload.unwrap_or_default();
    let job_id = state.ingest.submit(upload, metadata).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            job_id,
            status: JobStatus::Processing,
        }),
    ))
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Video not found: {raw}")))
}

/// GET /api/videos/:id
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let id = parse_job_id(&id)?;
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {id}")))?;

    Ok(Json(job.into()))
}

/// GET /api/videos?user_id=
pub async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<VideoResponse>>> {
    let owner = query.user_id.as_deref().filter(|s| !s.is_empty());
    let jobs = state.jobs.list(owner).await?;
    Ok(Json(jobs.into_iter().map(VideoResponse::from).collect()))
}

/// Delete a finished video and its stored artifacts.
///
/// DELETE /api/videos/:id
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_job_id(&id)?;

    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {id}")))?;
    if !job.is_terminal() {
        return Err(ApiError::conflict(format!("Video {id} is still processing")));
    }

    let job = state.jobs.delete(id).await?;

    let keys: Vec<&str> = job.video_key.iter().chain(job.thumbnail_key.iter()).map(String::as_str).collect();
    if let Err(e) = state.ingest.publisher().remove(keys).await {
        warn!(job_id = %id, "Deleted job but failed to remove artifacts: {}", e);
    }

    info!(job_id = %id, user_id = %job.metadata.user_id, "Deleted video");
    Ok(StatusCode::NO_CONTENT)
}
