use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::GameSettings;
use crate::driver::{BrowserError, Launcher};
use crate::game::{GameError, GameSession, GameStage};
use crate::reader::Payload;
use crate::registry::{SessionError, SessionRegistry};

pub fn router<L: Launcher>(
    registry: Arc<SessionRegistry<L::Driver>>,
    launcher: Arc<L>,
    settings: GameSettings,
) -> Router {
    Router::new()
        .route("/start", post(start_game::<L>))
        .route("/turn/{game_id}", post(turn::<L>))
        .route("/end/{game_id}", post(end_game::<L>))
        .route("/games", get(list_games::<L>))
        .route("/games/{game_id}", get(get_game::<L>))
        .with_state(ApiState {
            registry,
            launcher,
            settings: Arc::new(settings),
        })
}

struct ApiState<L: Launcher> {
    registry: Arc<SessionRegistry<L::Driver>>,
    launcher: Arc<L>,
    settings: Arc<GameSettings>,
}

impl<L: Launcher> Clone for ApiState<L> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            launcher: self.launcher.clone(),
            settings: self.settings.clone(),
        }
    }
}

enum ApiError {
    Launch(BrowserError),
    Session(SessionError),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::Session(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Launch(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("Failed to start game: {e}")})),
            )
                .into_response(),
            ApiError::Session(SessionError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, Json(json!({"detail": "Game not found"}))).into_response()
            }
            ApiError::Session(SessionError::Game(e)) => {
                let status = match e {
                    GameError::InvalidAnswer(_) => StatusCode::BAD_REQUEST,
                    GameError::GameOver(_) | GameError::Closed => StatusCode::CONFLICT,
                    GameError::Interaction(_) | GameError::Timeout { .. } | GameError::Browser(_) => {
                        tracing::error!("turn failed: {e}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, Json(json!({"error": e.to_string()}))).into_response()
            }
        }
    }
}

fn default_theme() -> String {
    "1".into()
}

#[derive(Deserialize)]
struct StartParams {
    /// 1 = characters, 2 = objects, 14 = animals
    #[serde(default = "default_theme")]
    theme: String,
}

#[derive(Serialize)]
struct StartResponse {
    game_id: String,
    content: Option<Payload>,
    stage: GameStage,
}

async fn start_game<L: Launcher>(
    State(api): State<ApiState<L>>,
    Query(params): Query<StartParams>,
) -> Result<Json<StartResponse>, ApiError> {
    let driver = api.launcher.launch().await.map_err(|e| {
        tracing::error!("browser launch failed: {e}");
        ApiError::Launch(e)
    })?;

    let mut session = GameSession::new(driver, (*api.settings).clone());
    // A failed start is still registered so it can be inspected and ended.
    if let Err(e) = session.start(&params.theme).await {
        tracing::warn!("game with theme {} failed to start: {e}", params.theme);
    }

    let stage = session.stage();
    let content = session.content().cloned();
    let game_id = api.registry.insert(session).await;
    tracing::info!("game {game_id} registered in stage {stage}");

    Ok(Json(StartResponse {
        game_id,
        content,
        stage,
    }))
}

#[derive(Deserialize)]
struct AnswerBody {
    answer: String,
}

async fn turn<L: Launcher>(
    State(api): State<ApiState<L>>,
    Path(game_id): Path<String>,
    Json(body): Json<AnswerBody>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = api.registry.turn(&game_id, &body.answer).await?;
    Ok(Json(outcome))
}

async fn end_game<L: Launcher>(
    State(api): State<ApiState<L>>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match api.registry.end(&game_id).await {
        Ok(()) => {}
        // Already unregistered; a browser that fails to close is only worth a log line.
        Err(SessionError::Game(e)) => tracing::warn!("game {game_id} ended uncleanly: {e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(Json(json!({"detail": "Game ended"})))
}

async fn list_games<L: Launcher>(State(api): State<ApiState<L>>) -> impl IntoResponse {
    let games = api.registry.list().await;
    Json(json!({"active_games": games}))
}

async fn get_game<L: Launcher>(
    State(api): State<ApiState<L>>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(api.registry.snapshot(&game_id).await?))
}
