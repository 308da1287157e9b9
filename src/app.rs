#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use log::{error, info};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::analytics;
use crate::downloader;
use crate::error::GymError;
use crate::graph::{self, ChartKind};
use crate::membership::{CheckInResult, NewMember, Renewal, Session};
use crate::qr::{self, QrOptions};

/// Shared state: one front-desk session, serialised behind a mutex.
pub struct AppState {
    session: Mutex<Session>,
    qr: QrOptions,
}

impl AppState {
    pub fn new(session: Session, qr: QrOptions) -> Self {
        AppState {
            session: Mutex::new(session),
            qr,
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, Session>, ApiError> {
        self.session
            .lock()
            .map_err(|_| ApiError::Internal("session lock poisoned".to_string()))
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct ScanResult {
    key: String,
    #[serde(flatten)]
    result: CheckInResult,
}

enum ApiError {
    Gym(GymError),
    BadRequest(String),
    Internal(String),
}

impl From<GymError> for ApiError {
    fn from(e: GymError) -> Self {
        ApiError::Gym(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Gym(e) => {
                let status = match &e {
                    GymError::Validation(_) | GymError::InvalidImage(_) => StatusCode::BAD_REQUEST,
                    GymError::NotFound(_) => StatusCode::NOT_FOUND,
                    GymError::DuplicateKey(_) => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("{}", e);
                }
                (status, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => {
                error!("{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (
            status,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(message),
            }),
        )
            .into_response()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_landing))
        .route("/api/members", get(list_members).post(create_member))
        .route("/api/members/:key", get(get_member))
        .route("/api/members/:key/qr", get(member_qr))
        .route("/api/members/:key/renew", post(renew_member))
        .route("/api/checkin/:key", post(check_in))
        .route("/api/scan", post(scan_frame))
        .route("/api/analytics", get(get_analytics))
        .route("/api/charts/:name", get(get_chart))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(bind: &str, session: Session, qr: QrOptions) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new(session, qr));
    let app = router(app_state);

    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename.replace('"', "")),
        )
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn png_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

async fn list_members(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut session = state.session()?;
    session.reload()?;
    Ok(Json(session.records().to_vec()).into_response())
}

async fn get_member(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let mut session = state.session()?;
    session.reload()?;
    let record = session
        .find(&key)
        .cloned()
        .ok_or(GymError::NotFound(key))?;
    Ok(Json(record).into_response())
}

async fn create_member(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewMember>,
) -> Result<Response, ApiError> {
    let record = state.session()?.create_member(&input, today())?;
    let png = qr::png(&record.key, &state.qr)?;
    attachment("image/png", &format!("member_{}.png", record.key), png)
}

async fn member_qr(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let mut session = state.session()?;
    session.reload()?;
    if session.find(&key).is_none() {
        return Err(GymError::NotFound(key).into());
    }
    drop(session);
    let png = qr::png(&key, &state.qr)?;
    attachment("image/png", &format!("member_{}.png", key), png)
}

async fn renew_member(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(renewal): Json<Renewal>,
) -> Result<Response, ApiError> {
    let record = state.session()?.renew(&key, &renewal, today())?;
    Ok(Json(record).into_response())
}

async fn check_in(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let result = state.session()?.check_in(key.trim(), today())?;
    Ok(Json(result).into_response())
}

async fn scan_frame(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut frame = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("frame") {
            frame = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?
                .to_vec();
        }
    }

    if frame.is_empty() {
        return Err(ApiError::BadRequest("No frame data received".to_string()));
    }

    let results: Vec<ScanResult> = state
        .session()?
        .scan_frame(&frame, today())?
        .into_iter()
        .map(|(key, result)| ScanResult { key, result })
        .collect();
    Ok(Json(results).into_response())
}

async fn get_analytics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut session = state.session()?;
    session.reload()?;
    Ok(Json(analytics::report(session.records(), today())).into_response())
}

async fn get_chart(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let kind = ChartKind::from_name(&name)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown chart '{}'", name)))?;

    // Render outside the lock.
    let records = {
        let mut session = state.session()?;
        session.reload()?;
        session.records().to_vec()
    };
    let png = match kind {
        ChartKind::Subscriptions => graph::subscriptions_chart(&analytics::signups_by_month(&records))?,
        ChartKind::CheckIns => graph::check_ins_chart(&analytics::top_check_ins(
            &records,
            analytics::TOP_CHECK_INS,
        ))?,
        ChartKind::Payments => graph::payments_chart(&analytics::payment_status(&records))?,
    };
    Ok(png_response(png))
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut session = state.session()?;
    session.reload()?;
    let csv = downloader::to_csv(session.records())?;
    attachment("text/csv; charset=utf-8", "members.csv", csv)
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut session = state.session()?;
    session.reload()?;
    let xlsx = downloader::to_xlsx(session.records())?;
    attachment(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "members.xlsx",
        xlsx,
    )
}
