use std::convert::Infallible;
use axum::{
    Router,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Json, Response, sse::{Event, KeepAlive, Sse}},
    routing::{get, post},
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::error::GameError;
use crate::game::{Difficulty, EndGameInput, Game, GameId, GameInput, UserId};
use crate::game_manager::GameManager;
use crate::notifications::{GameFilter, Subscription};
use crate::puzzle::{Position, Puzzle};
use crate::storage::{GamePage, GameQuery};

/// Header carrying the caller's id, set by the identity provider in front of us.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
struct AppState {
    game_manager: GameManager,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Game(GameError),
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError::Game(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Game(err) => {
                let status = match err {
                    GameError::NotFound(_) => StatusCode::NOT_FOUND,
                    GameError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    GameError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// The authenticated caller, read from [`USER_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
struct CreateGameParams {
    difficulty: String,
    level: i64,
}

impl CreateGameParams {
    fn into_input(self) -> Result<GameInput, GameError> {
        let difficulty: Difficulty = self
            .difficulty
            .parse()
            .map_err(|err: crate::game::ParseEnumError| GameError::BadRequest(err.to_string()))?;
        let level = u8::try_from(self.level).map_err(|_| GameError::bad_request("Level must be between 1 and 5"))?;
        Ok(GameInput { difficulty, level })
    }
}

/// Builds the HTTP surface over a manager.
pub fn router(game_manager: GameManager) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game).delete(delete_game))
        .route("/games/{id}/join", post(join_game))
        .route("/games/{id}/kick", post(kick_challenger))
        .route("/games/{id}/start", post(start_puzzle))
        .route("/games/{id}/move", post(move_piece))
        .route("/games/{id}/finish", post(finish_game))
        .route("/games/{id}/puzzle", get(get_puzzle))
        .route("/games/{id}/puzzle/events", get(puzzle_events))
        .route("/notifications", get(game_events))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState { game_manager })
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Head-to-head puzzle server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "create_game": "POST /games?difficulty=&level=",
            "list_games": "GET /games",
            "get_game": "GET /games/{id}",
            "delete_game": "DELETE /games/{id}",
            "join_game": "POST /games/{id}/join",
            "kick_challenger": "POST /games/{id}/kick",
            "start_puzzle": "POST /games/{id}/start",
            "move_piece": "POST /games/{id}/move",
            "finish_game": "POST /games/{id}/finish",
            "get_puzzle": "GET /games/{id}/puzzle",
            "puzzle_events": "GET /games/{id}/puzzle/events",
            "game_events": "GET /notifications"
        }
    }))
}

async fn create_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<CreateGameParams>,
    image: Bytes,
) -> ApiResult<(StatusCode, Json<Game>)> {
    let input = params.into_input()?;
    let game = state.game_manager.create_game(user, input, &image).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<GameQuery>,
) -> ApiResult<Json<GamePage>> {
    Ok(Json(state.game_manager.list_games(&query).await?))
}

async fn get_game(State(state): State<AppState>, Path(game_id): Path<GameId>) -> ApiResult<Json<Game>> {
    Ok(Json(state.game_manager.get_game(game_id).await?))
}

async fn delete_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
) -> ApiResult<StatusCode> {
    state.game_manager.delete_game(user, game_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
) -> ApiResult<Json<Game>> {
    Ok(Json(state.game_manager.join_game(user, game_id).await?))
}

async fn kick_challenger(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
) -> ApiResult<Json<Game>> {
    Ok(Json(state.game_manager.kick_challenger(user, game_id).await?))
}

async fn start_puzzle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
) -> ApiResult<Json<Puzzle>> {
    Ok(Json(state.game_manager.start_puzzle(user, game_id).await?))
}

async fn move_piece(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
    Json(target): Json<Position>,
) -> ApiResult<Json<Puzzle>> {
    Ok(Json(state.game_manager.move_piece(user, game_id, target).await?))
}

async fn finish_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
    Json(input): Json<EndGameInput>,
) -> ApiResult<Json<Game>> {
    Ok(Json(state.game_manager.finish_game(user, game_id, input).await?))
}

async fn get_puzzle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
) -> ApiResult<Json<Puzzle>> {
    Ok(Json(state.game_manager.get_puzzle(user, game_id).await?))
}

async fn game_events(
    State(state): State<AppState>,
    Query(filter): Query<GameFilter>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = state.game_manager.subscribe_games(filter).await?;
    Ok(Sse::new(event_stream(subscription, "game")).keep_alive(KeepAlive::default()))
}

async fn puzzle_events(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<GameId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = state.game_manager.subscribe_puzzle(user, game_id).await?;
    Ok(Sse::new(event_stream(subscription, "puzzle")).keep_alive(KeepAlive::default()))
}

fn event_stream<T>(
    mut subscription: Subscription<T>,
    name: &'static str,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    async_stream::stream! {
        while let Some(message) = subscription.recv().await {
            match Event::default().event(name).json_data(&message) {
                Ok(event) => yield Ok(event),
                Err(err) => tracing::warn!(error = %err, "could not encode event"),
            }
        }
    }
}
