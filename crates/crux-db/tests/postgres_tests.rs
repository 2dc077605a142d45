//! Integration tests for the PostgreSQL job store.
//!
//! Require a reachable database. Run with:
//! DATABASE_URL=postgres://... cargo test -p crux-db -- --ignored

use crux_db::{DbConfig, DbError, JobStore, PgJobStore};
use crux_models::{ClimbMetadata, JobStatus, NewJob, TerminalUpdate};

async fn store() -> PgJobStore {
    dotenvy::dotenv().ok();
    let config = DbConfig::from_env().expect("DATABASE_URL must be set");
    let store = PgJobStore::connect(&config).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_create_get_transition() {
    let store = store().await;
    let meta = ClimbMetadata::new("it-user", "Warm up")
        .with_grade(5)
        .with_tags("board,comp");
    let job = store.create(NewJob::new(meta)).await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);

    let fetched = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.metadata.tags, vec!["board", "comp"]);
    assert_eq!(fetched.metadata.grade, 5);

    let update = TerminalUpdate::Completed {
        video_url: "https://cdn.example.com/videos/x.mp4".into(),
        video_key: "videos/x.mp4".into(),
        thumbnail_url: "/static/placeholders/thumbnail.jpg".into(),
        thumbnail_key: None,
    };
    let done = store.transition(job.id, &update).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());

    let err = store
        .transition(job.id, &TerminalUpdate::Failed { error: "late".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { .. }));

    store.delete(job.id).await.unwrap();
    assert!(store.get(job.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_delete_refuses_processing_rows() {
    let store = store().await;
    let job = store
        .create(NewJob::new(ClimbMetadata::new("it-user", "Project")))
        .await
        .unwrap();

    assert!(matches!(
        store.delete(job.id).await.unwrap_err(),
        DbError::InFlight(_)
    ));

    store
        .transition(job.id, &TerminalUpdate::Failed { error: "cleanup".into() })
        .await
        .unwrap();
    store.delete(job.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ping() {
    let store = store().await;
    store.ping().await.unwrap();
}
