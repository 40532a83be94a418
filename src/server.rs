use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{ApiError, ApiJson, ApiRequest};
use douyin_virality::apify_client::ApifyClient;
use douyin_virality::collaborators::{BlobStore, CreatorDirectory, SpreadsheetStore, VideoSearch};
use douyin_virality::config::{Secrets, ServiceConfig};
use douyin_virality::douyin_client::DouyinClient;
use douyin_virality::google::{DriveClient, ServiceAccountAuth, SheetsClient};
use douyin_virality::progress::{NoProgress, ProgressEvent, ProgressSink};
use douyin_virality::workflows::{
    archive_videos, discover_creators, generate_report, update_follower_counts, ArchiveRequest,
    ArchiveResponse, DiscoverRequest, DiscoverResponse, FollowerUpdateRequest,
    FollowerUpdateResponse, ReportRequest, ReportResponse, WorkflowContext,
};
use douyin_virality::{ViralityScorer, WorkflowError};

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>>;

const CHANNEL_IDLE_CHECK: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct AppState {
    config: Arc<ServiceConfig>,
    scorer: Arc<ViralityScorer>,
    api_key: Option<String>,
    search: Option<Arc<dyn VideoSearch>>,
    directory: Option<Arc<dyn CreatorDirectory>>,
    sheets: Option<Arc<dyn SpreadsheetStore>>,
    drive: Option<Arc<dyn BlobStore>>,
    channels: Channels,
}

#[derive(serde::Deserialize)]
struct StreamQuery {
    request_id: String,
}

/// Progress channel of one workflow call.
struct Job {
    request_id: String,
    sender: broadcast::Sender<ProgressEvent>,
}

impl AppState {
    async fn build(config: ServiceConfig, secrets: Secrets) -> Self {
        let search = secrets.apify_token.and_then(|token| {
            match ApifyClient::from_config(&config.apify, token) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn VideoSearch>),
                Err(err) => {
                    warn!(error = %err, "video search unavailable");
                    None
                }
            }
        });
        let directory = secrets.rapidapi_key.map(|key| {
            Arc::new(DouyinClient::from_config(&config.rapidapi, key)) as Arc<dyn CreatorDirectory>
        });

        let auth = google_auth(&config, secrets.google_credentials_json, secrets.google_credentials_path).await;
        let sheets = auth.clone().map(|auth| {
            Arc::new(SheetsClient::new(config.google.sheets_base.clone(), auth))
                as Arc<dyn SpreadsheetStore>
        });
        let drive = auth.map(|auth| {
            Arc::new(DriveClient::new(
                config.google.drive_base.clone(),
                config.google.upload_base.clone(),
                auth,
            )) as Arc<dyn BlobStore>
        });

        if secrets.api_key.is_none() {
            warn!("API_KEY_SECRET is not set; workflow routes will refuse requests");
        }
        info!(
            search = search.is_some(),
            directory = directory.is_some(),
            google = sheets.is_some(),
            "collaborators configured"
        );

        Self {
            scorer: Arc::new(ViralityScorer::from_config(&config.scoring)),
            config: Arc::new(config),
            api_key: secrets.api_key,
            search,
            directory,
            sheets,
            drive,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn search(&self) -> Result<Arc<dyn VideoSearch>, ApiError> {
        self.search
            .clone()
            .ok_or_else(|| ApiError::not_configured("APIFY_TOKEN"))
    }

    fn directory(&self) -> Result<Arc<dyn CreatorDirectory>, ApiError> {
        self.directory
            .clone()
            .ok_or_else(|| ApiError::not_configured("RAPIDAPI_KEY"))
    }

    fn sheets(&self) -> Result<Arc<dyn SpreadsheetStore>, ApiError> {
        self.sheets
            .clone()
            .ok_or_else(|| ApiError::not_configured("Google credentials"))
    }

    fn drive(&self) -> Result<Arc<dyn BlobStore>, ApiError> {
        self.drive
            .clone()
            .ok_or_else(|| ApiError::not_configured("Google credentials"))
    }

    fn context<'a>(&'a self, progress: &'a dyn ProgressSink) -> WorkflowContext<'a> {
        WorkflowContext {
            config: &self.config,
            scorer: &self.scorer,
            now: Utc::now(),
            progress,
        }
    }

    async fn start_job(&self, request_id: Option<String>, message: &str) -> Option<Job> {
        let request_id = request_id.filter(|id| !id.trim().is_empty())?;
        let sender = get_or_create_channel(&self.channels, &request_id).await;
        send_event(&sender, "start", message);
        Some(Job { request_id, sender })
    }

    fn finish_job<T>(&self, job: Option<Job>, result: &Result<T, WorkflowError>) {
        let Some(job) = job else {
            return;
        };
        if let Err(err) = result {
            send_event(&job.sender, "error", &err.to_string());
        }
        schedule_cleanup(self.channels.clone(), job.request_id);
    }
}

async fn google_auth(
    config: &ServiceConfig,
    json: Option<String>,
    path: Option<std::path::PathBuf>,
) -> Option<ServiceAccountAuth> {
    let scopes = config.google.scopes.clone();
    let auth = match (json, path) {
        (Some(json), _) => ServiceAccountAuth::from_json(&json, scopes),
        (None, Some(path)) => ServiceAccountAuth::from_file(&path, scopes).await,
        (None, None) => return None,
    };
    match auth {
        Ok(auth) => {
            info!(account = auth.client_email(), "google service account loaded");
            Some(auth)
        }
        Err(err) => {
            warn!(error = %err, "google services unavailable");
            None
        }
    }
}

pub async fn serve(host: String, port: u16, config: ServiceConfig) -> Result<(), String> {
    let state = AppState::build(config, Secrets::from_env()).await;

    let workflows = Router::new()
        .route("/api/creators/discover", post(discover_handler))
        .route("/api/creators/followers", post(followers_handler))
        .route("/api/reports/virality", post(report_handler))
        .route("/api/videos/archive", post(archive_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/jobs/stream", get(stream_handler))
        .merge(workflows)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;
    info!(%addr, "listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        format!("failed to bind server: {}", err)
    })?, app)
    .await
    .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match check_api_key(
        state.api_key.as_deref(),
        request.headers().get("x-api-key").and_then(|value| value.to_str().ok()),
    ) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

fn check_api_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err(ApiError::not_configured("API_KEY_SECRET"));
    };
    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn discover_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ApiRequest<DiscoverRequest>>,
) -> Result<Json<DiscoverResponse>, ApiError> {
    let search = state.search()?;
    let sheets = state.sheets()?;
    let job = state.start_job(request.request_id, "Starting creator discovery").await;
    let progress = sink(&job);
    let ctx = state.context(progress);

    let result = discover_creators(&ctx, search.as_ref(), sheets.as_ref(), request.body).await;
    state.finish_job(job, &result);
    Ok(Json(result?))
}

async fn followers_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ApiRequest<FollowerUpdateRequest>>,
) -> Result<Json<FollowerUpdateResponse>, ApiError> {
    let directory = state.directory()?;
    let sheets = state.sheets()?;
    let job = state.start_job(request.request_id, "Starting follower update").await;
    let progress = sink(&job);
    let ctx = state.context(progress);

    let result = update_follower_counts(&ctx, directory.as_ref(), sheets.as_ref(), request.body).await;
    state.finish_job(job, &result);
    Ok(Json(result?))
}

async fn report_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ApiRequest<ReportRequest>>,
) -> Result<Json<ReportResponse>, ApiError> {
    let directory = state.directory()?;
    let sheets = state.sheets()?;
    let job = state.start_job(request.request_id, "Starting virality report").await;
    let progress = sink(&job);
    let ctx = state.context(progress);

    let result = generate_report(&ctx, directory.as_ref(), sheets.as_ref(), request.body).await;
    state.finish_job(job, &result);
    Ok(Json(result?))
}

async fn archive_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ApiRequest<ArchiveRequest>>,
) -> Result<Json<ArchiveResponse>, ApiError> {
    let directory = state.directory()?;
    let drive = state.drive()?;
    let job = state.start_job(request.request_id, "Starting video archive").await;
    let progress = sink(&job);
    let ctx = state.context(progress);

    let result = archive_videos(&ctx, directory.as_ref(), drive.as_ref(), request.body).await;
    state.finish_job(job, &result);
    Ok(Json(result?))
}

fn sink(job: &Option<Job>) -> &dyn ProgressSink {
    match job {
        Some(job) => &job.sender,
        None => &NoProgress,
    }
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, StatusCode>
{
    let sender = get_or_create_channel(&state.channels, &query.request_id).await;
    let receiver = sender.subscribe();
    schedule_idle_cleanup(state.channels.clone(), query.request_id);
    let stream = BroadcastStream::new(receiver).filter_map(|event| {
        match event {
            Ok(event) => {
                let data = serde_json::to_string(&event).unwrap_or_default();
                Some(Ok(Event::default().data(data)))
            }
            Err(_) => None,
        }
    });

    send_event(&sender, "connected", "Streaming workflow progress");
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(8))))
}

async fn get_or_create_channel(
    channels: &Channels,
    request_id: &str,
) -> broadcast::Sender<ProgressEvent> {
    let mut guard = channels.lock().await;
    if let Some(sender) = guard.get(request_id) {
        return sender.clone();
    }
    let (sender, _) = broadcast::channel(32);
    guard.insert(request_id.to_string(), sender.clone());
    sender
}

fn send_event(sender: &broadcast::Sender<ProgressEvent>, event: &str, message: &str) {
    sender.emit(event, message);
}

fn schedule_cleanup(channels: Channels, request_id: String) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut guard = channels.lock().await;
        guard.remove(&request_id);
    });
}

/// Drops a stream-opened channel once nobody listens to it any more.
fn schedule_idle_cleanup(channels: Channels, request_id: String) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(CHANNEL_IDLE_CHECK).await;
            if remove_if_idle(&channels, &request_id).await {
                break;
            }
        }
    });
}

/// Returns true once the channel is gone, either removed here or earlier.
async fn remove_if_idle(channels: &Channels, request_id: &str) -> bool {
    let mut guard = channels.lock().await;
    match guard.get(request_id) {
        Some(sender) if sender.receiver_count() > 0 => false,
        Some(_) => {
            guard.remove(request_id);
            true
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_check_distinguishes_missing_secret_from_bad_key() {
        assert_eq!(
            check_api_key(None, Some("k")).unwrap_err().status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            check_api_key(Some("k"), None).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            check_api_key(Some("k"), Some("other")).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
        assert!(check_api_key(Some("k"), Some("k")).is_ok());
    }

    #[tokio::test]
    async fn channels_are_shared_per_request_id() {
        let channels: Channels = Arc::new(Mutex::new(HashMap::new()));
        let first = get_or_create_channel(&channels, "job-1").await;
        let second = get_or_create_channel(&channels, "job-1").await;
        let mut receiver = second.subscribe();

        send_event(&first, "fetching", "working");
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event, "fetching");
        assert_eq!(channels.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_stream_channels_are_removed() {
        let channels: Channels = Arc::new(Mutex::new(HashMap::new()));
        for index in 0..1000 {
            let sender = get_or_create_channel(&channels, &format!("stream-{}", index)).await;
            drop(sender.subscribe());
        }
        assert_eq!(channels.lock().await.len(), 1000);

        for index in 0..1000 {
            assert!(remove_if_idle(&channels, &format!("stream-{}", index)).await);
        }
        assert!(channels.lock().await.is_empty());
    }

    #[tokio::test]
    async fn listened_channels_survive_idle_checks() {
        let channels: Channels = Arc::new(Mutex::new(HashMap::new()));
        let sender = get_or_create_channel(&channels, "job-7").await;
        let receiver = sender.subscribe();

        assert!(!remove_if_idle(&channels, "job-7").await);
        assert_eq!(channels.lock().await.len(), 1);

        drop(receiver);
        assert!(remove_if_idle(&channels, "job-7").await);
        assert!(remove_if_idle(&channels, "job-7").await);
        assert!(channels.lock().await.is_empty());
    }
}
