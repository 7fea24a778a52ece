use std::sync::{Arc, Mutex};
use rand::SeedableRng;
use rand::rngs::StdRng;
use crate::cache::{KvStore, MemoryKv};
use crate::config::Config;
use crate::error::{GameError, Result};
use crate::game::{EndGameInput, Game, GameId, GameInput, GameStatus, NewGame, UserId};
use crate::notifications::{GameFilter, GameNotification, NotificationType, Notifier, Subscription};
use crate::pubsub::{LocalPubSub, PubSub};
use crate::puzzle::{Position, Puzzle};
use crate::puzzle_store::{MoveOutcome, PuzzleStore};
use crate::shuffle;
use crate::sqlite_store::SqliteStore;
use crate::storage::{GamePage, GameQuery, GameRepository, StorageError};
use crate::uploader::{ImageUploader, MemoryUploader};

const GAME_NOT_FOUND: &str = "Game not found";
const PUZZLE_NOT_FOUND: &str = "Puzzle not found";

/// Runs head-to-head matches: the NEW → ON → DONE lifecycle, puzzle setup and
/// moves, and notification fanout.
///
/// Every transition is one conditional write against the game store. When the
/// write does not apply, the record is read back only to pick the error kind.
#[derive(Clone)]
pub struct GameManager {
    games: Arc<dyn GameRepository>,
    puzzles: PuzzleStore,
    uploader: Arc<dyn ImageUploader>,
    notifier: Notifier,
    config: Arc<Config>,
    shuffle_rng: Option<Arc<Mutex<StdRng>>>,
}

impl GameManager {
    pub fn new(
        config: Config,
        games: Arc<dyn GameRepository>,
        kv: Arc<dyn KvStore>,
        pubsub: Arc<dyn PubSub>,
        uploader: Arc<dyn ImageUploader>,
    ) -> Self {
        let puzzles = PuzzleStore::new(kv, config.key_namespace);
        let notifier = Notifier::new(pubsub, config.notification_topic.clone(), config.key_namespace);
        GameManager {
            games,
            puzzles,
            uploader,
            notifier,
            config: Arc::new(config),
            shuffle_rng: None,
        }
    }

    /// Everything in process: SQLite `:memory:`, in-memory cache, uploads and pubsub.
    ///
    /// No background sweeper runs here. The cache drops expired puzzles as it
    /// is written to; long-lived servers should also call
    /// [`MemoryKv::purge_expired`] on a timer.
    pub fn in_memory(config: Config) -> std::result::Result<Self, StorageError> {
        let games = Arc::new(SqliteStore::open(":memory:")?);
        let pubsub = Arc::new(LocalPubSub::new(config.channel_capacity));
        Ok(Self::new(
            config,
            games,
            Arc::new(MemoryKv::new()),
            pubsub,
            Arc::new(MemoryUploader::new()),
        ))
    }

    /// Scrambles every started puzzle from one seeded generator, so a run of
    /// matches is reproducible.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_rng = Some(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn puzzles(&self) -> &PuzzleStore {
        &self.puzzles
    }

    /// Opens a match hosted by `host` with an uploaded puzzle image.
    pub async fn create_game(&self, host: UserId, input: GameInput, image: &[u8]) -> Result<Game> {
        input.validate()?;
        if image.is_empty() {
            return Err(GameError::bad_request("Image is required"));
        }

        let image = self.uploader.upload_image(host, image).await?;
        let game = self
            .games
            .insert_game(&NewGame { host, difficulty: input.difficulty, level: input.level, image })
            .await?;

        tracing::info!(game_id = game.id, host, difficulty = %game.difficulty, level = game.level, "game created");
        self.notifier.publish_game(NotificationType::New, &game).await;
        Ok(game)
    }

    /// Removes an open match nobody has joined yet.
    pub async fn delete_game(&self, host: UserId, game_id: GameId) -> Result<Game> {
        if let Some(game) = self.games.delete_open_game(game_id, host).await? {
            tracing::info!(game_id, host, "game deleted");
            self.notifier.publish_game(NotificationType::Delete, &game).await;
            return Ok(game);
        }

        let err = match self.games.find_game(game_id).await? {
            Some(game) if game.host == host && game.status == GameStatus::New && game.challenger.is_some() => {
                GameError::bad_request("Cannot delete a game with a challenger")
            }
            _ => GameError::not_found(GAME_NOT_FOUND),
        };
        tracing::warn!(game_id, host, error = %err, "delete rejected");
        Err(err)
    }

    pub async fn join_game(&self, challenger: UserId, game_id: GameId) -> Result<Game> {
        if let Some(game) = self.games.set_challenger(game_id, challenger).await? {
            tracing::info!(game_id, challenger, "challenger joined");
            self.notifier.publish_game(NotificationType::Update, &game).await;
            return Ok(game);
        }

        let err = match self.games.find_game(game_id).await? {
            Some(game) if game.status == GameStatus::New && game.host == challenger => {
                GameError::bad_request("Cannot join your own game")
            }
            _ => GameError::not_found(GAME_NOT_FOUND),
        };
        tracing::warn!(game_id, challenger, error = %err, "join rejected");
        Err(err)
    }

    /// Unseats the challenger; the match stays open.
    pub async fn kick_challenger(&self, host: UserId, game_id: GameId) -> Result<Game> {
        if let Some(game) = self.games.clear_challenger(game_id, host).await? {
            tracing::info!(game_id, host, "challenger kicked");
            self.notifier.publish_game(NotificationType::Update, &game).await;
            return Ok(game);
        }

        let err = self.missing_challenger_error(host, game_id).await?;
        tracing::warn!(game_id, host, error = %err, "kick rejected");
        Err(err)
    }

    /// Starts the match: both players get identical copies of one scrambled
    /// puzzle, which then evolve independently. Returns the host's copy.
    pub async fn start_puzzle(&self, host: UserId, game_id: GameId) -> Result<Puzzle> {
        let Some(game) = self.games.start_game(game_id, host).await? else {
            let err = self.missing_challenger_error(host, game_id).await?;
            tracing::warn!(game_id, host, error = %err, "start rejected");
            return Err(err);
        };

        let Some(players) = game.players() else {
            tracing::error!(game_id, "started game has no challenger");
            return Err(GameError::Internal);
        };

        let time = self.config.time_budget.seconds(game.difficulty, game.level);
        let puzzle = match self.scramble(game.level, time) {
            Ok(puzzle) => puzzle,
            Err(err) => {
                self.undo_start(host, &game).await;
                return Err(err);
            }
        };

        for player in players {
            if let Err(err) = self.puzzles.save(game.id, player, &puzzle).await {
                tracing::error!(game_id, player, error = %err, "could not store puzzle");
                self.undo_start(host, &game).await;
                return Err(GameError::Internal);
            }
        }
        for player in players {
            self.notifier.publish_puzzle(game.id, player, &puzzle).await;
        }

        tracing::info!(game_id, host, size = puzzle.size(), time, "puzzle started");
        self.notifier.publish_game(NotificationType::Update, &game).await;
        Ok(puzzle)
    }

    fn scramble(&self, level: u8, time: u64) -> Result<Puzzle> {
        let Some(rng) = &self.shuffle_rng else {
            return Ok(shuffle::scrambled(level, time));
        };
        let mut rng = rng.lock().map_err(|_| {
            tracing::error!("shuffle rng lock poisoned");
            GameError::Internal
        })?;
        let mut puzzle = Puzzle::generate(level, time);
        shuffle::shuffle(&mut puzzle, &mut *rng);
        Ok(puzzle)
    }

    /// Rolls a half-started match back to NEW so the host can try again.
    async fn undo_start(&self, host: UserId, game: &Game) {
        let game_id = game.id;
        if let Some(players) = game.players() {
            for player in players {
                if let Err(err) = self.puzzles.discard(game_id, player).await {
                    tracing::warn!(game_id, player, error = %err, "could not discard puzzle");
                }
            }
        }
        match self.games.revert_start(game_id, host).await {
            Ok(Some(_)) => tracing::warn!(game_id, host, "start rolled back"),
            Ok(None) => tracing::warn!(game_id, host, "start not rolled back, game already moved on"),
            Err(err) => tracing::error!(game_id, host, error = %err, "could not roll back start"),
        }
    }

    /// Kick and start share the same rejection rules.
    async fn missing_challenger_error(&self, host: UserId, game_id: GameId) -> Result<GameError> {
        Ok(match self.games.find_game(game_id).await? {
            Some(game) if game.host == host && game.status == GameStatus::New && game.challenger.is_none() => {
                GameError::bad_request("Game has no challenger")
            }
            _ => GameError::not_found(GAME_NOT_FOUND),
        })
    }

    /// Slides the empty cell of `user`'s puzzle toward `target`.
    ///
    /// Targets that are not playable leave the puzzle as it was; that is not an
    /// error. The stored copy is rewritten and its expiry refreshed either way.
    pub async fn move_piece(&self, user: UserId, game_id: GameId, target: Position) -> Result<Puzzle> {
        let outcome = self
            .puzzles
            .apply_move(game_id, user, target)
            .await?
            .ok_or_else(|| GameError::not_found(PUZZLE_NOT_FOUND))?;

        match &outcome {
            MoveOutcome::Moved(puzzle) if puzzle.completed => {
                tracing::info!(game_id, user, "puzzle solved");
            }
            MoveOutcome::Moved(_) => {
                tracing::debug!(game_id, user, row = target.row, column = target.column, "piece moved");
            }
            MoveOutcome::Ignored(_) => {
                tracing::debug!(game_id, user, row = target.row, column = target.column, "move ignored");
            }
            MoveOutcome::Stale(_) => {
                tracing::debug!(game_id, user, "stale move absorbed");
            }
        }

        let puzzle = outcome.into_puzzle();
        self.notifier.publish_puzzle(game_id, user, &puzzle).await;
        Ok(puzzle)
    }

    /// Settles a running match. Either participant may report the result.
    pub async fn finish_game(&self, user: UserId, game_id: GameId, input: EndGameInput) -> Result<Game> {
        input.validate()?;

        let Some(game) = self
            .games
            .finish_game(game_id, user, input.time, input.winner)
            .await?
        else {
            let err = match self.games.find_game(game_id).await? {
                Some(game) if game.status == GameStatus::On && !game.is_participant(user) => {
                    GameError::bad_request("Only participants can finish a game")
                }
                _ => GameError::not_found(GAME_NOT_FOUND),
            };
            tracing::warn!(game_id, user, error = %err, "finish rejected");
            return Err(err);
        };

        tracing::info!(game_id, user, winner = %game.winner, time = game.time, "game finished");

        if let Some(players) = game.players() {
            for player in players {
                if let Err(err) = self.puzzles.discard(game.id, player).await {
                    tracing::warn!(game_id, player, error = %err, "could not discard puzzle");
                }
                self.notifier.close_puzzle(game.id, player).await;
            }
        }

        self.notifier.publish_game(NotificationType::Update, &game).await;
        Ok(game)
    }

    pub async fn get_game(&self, game_id: GameId) -> Result<Game> {
        self.games
            .find_game(game_id)
            .await?
            .ok_or_else(|| GameError::not_found(GAME_NOT_FOUND))
    }

    pub async fn list_games(&self, query: &GameQuery) -> Result<GamePage> {
        Ok(self.games.list_games(query).await?)
    }

    /// The caller's current puzzle, for clients resynchronising after a reconnect.
    pub async fn get_puzzle(&self, user: UserId, game_id: GameId) -> Result<Puzzle> {
        self.puzzles
            .load(game_id, user)
            .await?
            .ok_or_else(|| GameError::not_found(PUZZLE_NOT_FOUND))
    }

    pub async fn subscribe_games(&self, filter: GameFilter) -> Result<Subscription<GameNotification>> {
        Ok(self.notifier.subscribe_games(filter).await?)
    }

    pub async fn subscribe_puzzle(&self, user: UserId, game_id: GameId) -> Result<Subscription<Puzzle>> {
        Ok(self.notifier.subscribe_puzzle(game_id, user).await?)
    }
}
