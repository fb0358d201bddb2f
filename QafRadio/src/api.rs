//! API REST de la station : statut, commandes lecteur, évènements de
//! présence (SSE) et fichiers média servis à la passerelle.

use std::path::PathBuf;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use qafcatalog::RecitationCatalog;
use qafstation::{PlaybackState, PresenceHub, StationError, StationHandle};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::debug;

/// État partagé entre tous les handlers.
#[derive(Clone)]
pub struct AppState {
    pub station: StationHandle,
    pub catalog: RecitationCatalog,
    pub presence: Arc<PresenceHub>,
    pub media_root: PathBuf,
}

/// Router complet du binaire (API + média).
pub fn radio_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/reciters", get(list_reciters))
        .route("/api/player/skip", post(player_skip))
        .route("/api/player/previous", post(player_previous))
        .route("/api/player/pause", post(player_pause))
        .route("/api/player/resume", post(player_resume))
        .route("/api/player/stop", post(player_stop))
        .route("/api/player/reciter", put(set_reciter))
        .route("/api/events", get(presence_events))
        .route("/media/{reciter}/{file}", get(serve_media))
        .with_state(state)
}

/// Statut détaillé de la station.
///
/// `track` est la piste audible quand la lecture est en cours,
/// `next_track` l'index stocké (la prochaine piste à démarrer).
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: PlaybackState,
    pub track: u16,
    pub title: String,
    pub reciter: String,
    pub connected: bool,
    pub next_track: u16,
}

/// Requête de changement de récitateur.
#[derive(Debug, Deserialize)]
pub struct SetReciterRequest {
    pub name: String,
}

/// Réponse d'erreur REST générique.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub async fn get_status(State(state): State<AppState>) -> Response {
    let status = match state.station.status().await {
        Ok(status) => status,
        Err(err) => return map_error(err),
    };
    let snapshot = match state.station.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => return map_error(err),
    };

    let payload = StatusResponse {
        state: status.state,
        track: status.track,
        title: status.title,
        reciter: status.reciter,
        connected: status.connected,
        next_track: snapshot.track.get(),
    };
    (StatusCode::OK, Json(payload)).into_response()
}

pub async fn list_reciters(State(state): State<AppState>) -> Response {
    match state.catalog.list_reciters() {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(err) => map_error(err.into()),
    }
}

pub async fn player_skip(State(state): State<AppState>) -> Response {
    command_response(state.station.skip().await)
}

pub async fn player_previous(State(state): State<AppState>) -> Response {
    command_response(state.station.previous().await)
}

pub async fn player_pause(State(state): State<AppState>) -> Response {
    command_response(state.station.pause().await)
}

pub async fn player_resume(State(state): State<AppState>) -> Response {
    command_response(state.station.resume().await)
}

pub async fn player_stop(State(state): State<AppState>) -> Response {
    command_response(state.station.stop().await)
}

pub async fn set_reciter(
    State(state): State<AppState>,
    Json(req): Json<SetReciterRequest>,
) -> Response {
    command_response(state.station.set_reciter(req.name).await)
}

/// Handler SSE : diffuse les changements de présence.
pub async fn presence_events(State(state): State<AppState>) -> impl IntoResponse {
    let mut rx = state.presence.subscribe();

    let stream = stream! {
        while let Ok(update) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&update) {
                yield Ok::<_, axum::Error>(Event::default().event("presence").data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Sert un fichier audio du catalogue en streaming.
///
/// C'est l'espace d'URL que la passerelle vient tirer ; il expose le
/// répertoire audio et rien d'autre.
pub async fn serve_media(
    State(state): State<AppState>,
    Path((reciter, file)): Path<(String, String)>,
) -> Result<Response, StatusCode> {
    if !safe_segment(&reciter) || !safe_segment(&file) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let path = state.media_root.join(&reciter).join(&file);
    let media = tokio::fs::File::open(&path).await.map_err(|err| {
        debug!(%reciter, %file, %err, "media file not served");
        StatusCode::NOT_FOUND
    })?;
    let length = media
        .metadata()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .len();

    let body = Body::from_stream(ReaderStream::new(media));
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "audio/mpeg")
        .header("Content-Length", length)
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Les segments de chemin arrivent décodés ; tout ce qui pourrait sortir
/// du répertoire audio est refusé.
fn safe_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.starts_with('.') && !segment.contains(['/', '\\'])
}

fn command_response(result: qafstation::Result<()>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(err),
    }
}

fn map_error(error: StationError) -> Response {
    let status = match error {
        StationError::UnknownReciter(_) => StatusCode::NOT_FOUND,
        StationError::StationGone => StatusCode::SERVICE_UNAVAILABLE,
        StationError::NoTargetConfigured
        | StationError::Catalog(_)
        | StationError::Sink(_)
        | StationError::Io(_)
        | StationError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: format!("{:?}", error),
            message: error.to_string(),
        }),
    )
        .into_response()
}
