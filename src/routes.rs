use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde_json::json;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    analyzer::Analyzer,
    error::ShopVisionError,
    media::SourceImage,
    models::{
        AnalyzeRequest, DemoImage, InstructionRequest, LoadImageRequest, ProductDescription, RenderedImage,
        SceneRequest, ScenePreset, VisualizeRequest, DEMO_IMAGES, RETAIL_PRESETS,
    },
    session::{Action, Session},
    visualizer::Visualizer,
};

/// Photos arrive base64 encoded inside JSON, well past axum's 2 MB default.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub analyzer: Arc<Analyzer>,
    pub visualizer: Arc<Visualizer>,
}

impl AppState {
    pub fn new(analyzer: Analyzer, visualizer: Visualizer) -> Self {
        Self {
            store: Arc::default(),
            analyzer: Arc::new(analyzer),
            visualizer: Arc::new(visualizer),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("history item {0} not found")]
    HistoryNotFound(Uuid),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
    #[error("{message}")]
    BadBody { status: StatusCode, message: String },
    #[error(transparent)]
    Adapter(#[from] ShopVisionError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        // Image validation runs inside deserialization; surface it as the adapter error it is.
        match message.split_once("invalid image: ") {
            Some((_, reason)) => {
                let reason = reason.rsplit_once(" at line ").map_or(reason, |(head, _)| head);
                Self::Adapter(ShopVisionError::InvalidImage(reason.to_string()))
            }
            None => Self::BadBody { status: rejection.status(), message },
        }
    }
}

/// `Json` whose rejections render as [`ApiError`] bodies.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match self {
            Self::Adapter(e) => return e.into_response(),
            Self::BadBody { status, .. } => (status, "invalid_body"),
            Self::SessionNotFound(_) | Self::HistoryNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::UnknownPreset(_) => (StatusCode::BAD_REQUEST, "unknown_preset"),
        };
        (status, Json(json!({ "error": kind, "message": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/presets", get(list_presets))
        .route("/api/demos", get(list_demos))
        .route("/api/analyze", post(analyze))
        .route("/api/visualize", post(visualize))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/image", post(load_image))
        .route("/api/sessions/:id/analyze", post(analyze_session))
        .route("/api/sessions/:id/visualize", post(visualize_session))
        .route("/api/sessions/:id/restore", post(restore_original))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/history/:item_id", post(select_history))
        .route("/api/sessions/:id/export", get(export_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn list_presets() -> Json<&'static [ScenePreset]> {
    Json(RETAIL_PRESETS)
}

pub async fn list_demos() -> Json<&'static [DemoImage]> {
    Json(DEMO_IMAGES)
}

pub async fn analyze(State(state): State<AppState>, AppJson(body): AppJson<AnalyzeRequest>) -> Result<Json<ProductDescription>, ApiError> {
    let instruction = body.instruction.unwrap_or_default();
    let description = state.analyzer.analyze(&body.image, &instruction).await?;
    Ok(Json(description))
}

pub async fn visualize(State(state): State<AppState>, AppJson(body): AppJson<VisualizeRequest>) -> Result<Json<RenderedImage>, ApiError> {
    let instruction = resolve_scene(&body.scene)?;
    let rendered = state.visualizer.visualize(&body.image, &instruction).await?;
    Ok(Json(rendered))
}

pub async fn create_session(State(state): State<AppState>, AppJson(body): AppJson<LoadImageRequest>) -> (StatusCode, Json<Session>) {
    let session = Session::new().apply(Action::load(body.image, body.origin));
    tracing::info!("🛍️ Created session {} ({} bytes)", session.id, session.current.as_ref().map_or(0, SourceImage::len));
    state.store.write().insert(session.id, session.clone());
    (StatusCode::CREATED, Json(session))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    let session = state.store.read().get(&id).cloned().ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(session))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.write().remove(&id).ok_or(ApiError::SessionNotFound(id))?;
    tracing::info!("🗑️ Deleted session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn load_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    AppJson(body): AppJson<LoadImageRequest>,
) -> Result<Json<Session>, ApiError> {
    let action = Action::load(body.image, body.origin);
    Ok(Json(update(&state, id, |session| Ok(session.apply(action)))?))
}

pub async fn analyze_session(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    AppJson(body): AppJson<InstructionRequest>,
) -> Result<Json<Session>, ApiError> {
    let image = current_image(&state, id)?;
    // The store lock is released while the model runs.
    let description = state.analyzer.analyze(&image, body.instruction.as_deref().unwrap_or_default()).await?;
    let session = update(&state, id, |session| {
        ensure_unchanged(session, &image)?;
        Ok(session.apply(Action::AnalyzeSucceeded(description)))
    })?;
    Ok(Json(session))
}

pub async fn visualize_session(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    AppJson(body): AppJson<SceneRequest>,
) -> Result<Json<Session>, ApiError> {
    let instruction = resolve_scene(&body)?;
    let image = current_image(&state, id)?;
    let rendered = state.visualizer.visualize(&image, &instruction).await?;
    let session = update(&state, id, |session| {
        ensure_unchanged(session, &image)?;
        Ok(session.apply(Action::VisualizeSucceeded(rendered)))
    })?;
    tracing::info!("✅ Session {} now has {} renders", id, session.history.len());
    Ok(Json(session))
}

pub async fn restore_original(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    Ok(Json(update(&state, id, |session| Ok(session.apply(Action::RestoreOriginal)))?))
}

pub async fn reset_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    Ok(Json(update(&state, id, |session| Ok(session.apply(Action::Reset)))?))
}

pub async fn select_history(
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> Result<Json<Session>, ApiError> {
    let session = update(&state, id, |session| {
        if !session.history.iter().any(|item| item.id == item_id) {
            return Err(ApiError::HistoryNotFound(item_id));
        }
        Ok(session.apply(Action::SelectHistory(item_id)))
    })?;
    Ok(Json(session))
}

pub async fn export_image(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Response, ApiError> {
    let image = current_image(&state, id)?;
    let mut headers = HeaderMap::new();
    if let Ok(value) = image.mime_type().parse() {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = format!("attachment; filename=\"shopvision_{}.{}\"", id, image.extension()).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((StatusCode::OK, headers, image.bytes().clone()).into_response())
}

fn resolve_scene(scene: &SceneRequest) -> Result<String, ApiError> {
    scene
        .resolve()
        .ok_or_else(|| ApiError::UnknownPreset(scene.preset.clone().unwrap_or_default()))
}

fn current_image(state: &AppState, id: Uuid) -> Result<SourceImage, ApiError> {
    let guard = state.store.read();
    let session = guard.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    session.current.clone().ok_or(ApiError::Conflict("session has no active image"))
}

fn ensure_unchanged(session: &Session, image: &SourceImage) -> Result<(), ApiError> {
    if session.current.as_ref() == Some(image) {
        Ok(())
    } else {
        Err(ApiError::Conflict("active image changed while the request was running"))
    }
}

/// Replaces the stored session with the next state computed from it.
fn update(
    state: &AppState,
    id: Uuid,
    next: impl FnOnce(&Session) -> Result<Session, ApiError>,
) -> Result<Session, ApiError> {
    let mut guard = state.store.write();
    let session = guard.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
    let updated = next(session)?;
    *session = updated.clone();
    Ok(updated)
}
