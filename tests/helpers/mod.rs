//! Shared test helpers: temp-backed pipeline construction and mock
//! upstream servers (media resolution provider, separation service) on
//! ephemeral ports with hit counters.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use stemsep::services::{
    AudioAcquirer, MediaResolver, Pipeline, SeparationClient, StemFetcher,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Mock media resolution provider
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MediaState {
    base: String,
    search_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
    audio_calls: Arc<AtomicUsize>,
    thumb_calls: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<String>>>,
}

/// Handle to a running mock media provider
pub struct MediaHandle {
    pub base: String,
    pub search_calls: Arc<AtomicUsize>,
    pub stream_calls: Arc<AtomicUsize>,
    pub audio_calls: Arc<AtomicUsize>,
    pub thumb_calls: Arc<AtomicUsize>,
    pub last_query: Arc<Mutex<Option<String>>>,
}

async fn media_search(
    State(st): State<MediaState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    st.search_calls.fetch_add(1, Ordering::SeqCst);
    *st.last_query.lock().unwrap() = params.get("q").cloned();

    Json(json!([
        {
            "id": "abc123",
            "title": "Summer Nights",
            "channel": "Luna Bay",
            "thumbnail_url": format!("{}/thumb/abc123", st.base)
        },
        {
            "id": "def456",
            "title": "Electric Dreams",
            "thumbnail_url": format!("{}/thumb/def456", st.base)
        }
    ]))
}

async fn media_streams(
    State(st): State<MediaState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    st.stream_calls.fetch_add(1, Ordering::SeqCst);

    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown id"}))).into_response();
    }

    Json(json!({
        "title": "Summer Nights",
        "thumbnail_url": format!("{}/thumb/{}", st.base, id),
        "formats": [
            {"url": format!("{}/audio/{}/low", st.base, id), "audio_bitrate": 64, "has_video": false},
            {"url": format!("{}/audio/{}/best", st.base, id), "audio_bitrate": 160, "has_video": false},
            {"url": format!("{}/audio/{}/video", st.base, id), "audio_bitrate": 192, "has_video": true}
        ]
    }))
    .into_response()
}

async fn media_audio(
    State(st): State<MediaState>,
    Path((_id, _quality)): Path<(String, String)>,
) -> Vec<u8> {
    st.audio_calls.fetch_add(1, Ordering::SeqCst);
    b"ID3-fake-audio-bytes".to_vec()
}

async fn media_thumb(State(st): State<MediaState>, Path(_id): Path<String>) -> Vec<u8> {
    st.thumb_calls.fetch_add(1, Ordering::SeqCst);
    b"fake-jpeg-bytes".to_vec()
}

/// Spawn the mock media provider on an ephemeral port.
pub async fn spawn_media_provider() -> MediaHandle {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let state = MediaState {
        base: base.clone(),
        search_calls: Arc::new(AtomicUsize::new(0)),
        stream_calls: Arc::new(AtomicUsize::new(0)),
        audio_calls: Arc::new(AtomicUsize::new(0)),
        thumb_calls: Arc::new(AtomicUsize::new(0)),
        last_query: Arc::new(Mutex::new(None)),
    };

    let handle = MediaHandle {
        base: base.clone(),
        search_calls: state.search_calls.clone(),
        stream_calls: state.stream_calls.clone(),
        audio_calls: state.audio_calls.clone(),
        thumb_calls: state.thumb_calls.clone(),
        last_query: state.last_query.clone(),
    };

    let app = Router::new()
        .route("/search", get(media_search))
        .route("/streams/:id", get(media_streams))
        .route("/audio/:id/:quality", get(media_audio))
        .route("/thumb/:id", get(media_thumb))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    handle
}

// ---------------------------------------------------------------------------
// Mock separation service
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct SepState {
    base: String,
    submissions: Arc<AtomicUsize>,
    status_calls: Arc<AtomicUsize>,
    file_calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Value>>>,
}

/// Handle to a running mock separation service with a scripted status
/// sequence
pub struct SeparationHandle {
    pub base: String,
    pub submissions: Arc<AtomicUsize>,
    pub status_calls: Arc<AtomicUsize>,
    pub file_calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Value>>>,
}

impl SeparationHandle {
    /// Queue a processing status with optional progress
    pub fn push_processing(&self, progress: Option<f64>) {
        let mut body = json!({"status": "processing"});
        if let Some(p) = progress {
            body = json!({"status": "processing", "data": {"progress": p}});
        }
        self.script.lock().unwrap().push_back(body);
    }

    /// Queue a done status advertising the given output names
    pub fn push_done(&self, names: &[&str]) {
        let files: Vec<Value> = names
            .iter()
            .map(|name| json!({"url": format!("{}/files/{}.mp3", self.base, name)}))
            .collect();
        self.script
            .lock()
            .unwrap()
            .push_back(json!({"status": "done", "data": {"files": files}}));
    }

    /// Queue a failed status with a message
    pub fn push_failed(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(json!({"status": "failed", "data": {"message": message}}));
    }
}

async fn sep_create(State(st): State<SepState>) -> Json<Value> {
    st.submissions.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "success": true,
        "data": {"link": format!("{}/api/separation/get/job-1", st.base)}
    }))
}

async fn sep_status(State(st): State<SepState>) -> Json<Value> {
    st.status_calls.fetch_add(1, Ordering::SeqCst);
    let next = st.script.lock().unwrap().pop_front();
    Json(next.unwrap_or_else(|| json!({"status": "processing"})))
}

async fn sep_file(State(st): State<SepState>, Path(name): Path<String>) -> Vec<u8> {
    st.file_calls.fetch_add(1, Ordering::SeqCst);
    format!("stem-bytes-{}", name).into_bytes()
}

/// Spawn the mock separation service on an ephemeral port.
pub async fn spawn_separation_service() -> SeparationHandle {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let state = SepState {
        base: base.clone(),
        submissions: Arc::new(AtomicUsize::new(0)),
        status_calls: Arc::new(AtomicUsize::new(0)),
        file_calls: Arc::new(AtomicUsize::new(0)),
        script: Arc::new(Mutex::new(VecDeque::new())),
    };

    let handle = SeparationHandle {
        base: base.clone(),
        submissions: state.submissions.clone(),
        status_calls: state.status_calls.clone(),
        file_calls: state.file_calls.clone(),
        script: state.script.clone(),
    };

    let app = Router::new()
        .route("/api/separation/create", post(sep_create))
        .route("/api/separation/get/:job", get(sep_status))
        .route("/files/:name", get(sep_file))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    handle
}

// ---------------------------------------------------------------------------
// Pipeline construction over a temp root
// ---------------------------------------------------------------------------

/// A pipeline wired to mock upstreams over a temp storage root
pub struct TestPipeline {
    pub pool: SqlitePool,
    pub pipeline: Arc<Pipeline>,
    pub resolver: MediaResolver,
    pub downloads_dir: PathBuf,
    _tmp: TempDir,
}

/// Build a pipeline against the given upstream base URLs, backed by a
/// temp directory and a file database inside it.
pub async fn build_pipeline(media_base: &str, sep_base: &str) -> TestPipeline {
    let tmp = tempfile::tempdir().unwrap();
    let downloads_dir = tmp.path().join("downloads");
    tokio::fs::create_dir_all(&downloads_dir).await.unwrap();

    let pool = stemsep::db::init_database_pool(&tmp.path().join("stemsep.db"))
        .await
        .unwrap();

    let download_slots = Arc::new(tokio::sync::Semaphore::new(4));

    let resolver = MediaResolver::new(media_base.to_string(), TEST_TIMEOUT).unwrap();
    let acquirer = AudioAcquirer::new(
        resolver.clone(),
        downloads_dir.clone(),
        TEST_TIMEOUT,
        Arc::clone(&download_slots),
    )
    .unwrap();
    let separation =
        SeparationClient::new(sep_base.to_string(), "test-token".to_string(), TEST_TIMEOUT)
            .unwrap();
    let fetcher = StemFetcher::new(downloads_dir.clone(), TEST_TIMEOUT, download_slots).unwrap();

    let pipeline = Arc::new(Pipeline::new(
        pool.clone(),
        acquirer,
        separation,
        fetcher,
    ));

    TestPipeline {
        pool,
        pipeline,
        resolver,
        downloads_dir,
        _tmp: tmp,
    }
}
