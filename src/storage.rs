use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::game::{Game, GameId, GameStatus, GameWinner, NewGame, UserId};

pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("storage lock poisoned")]
    Lock,
}

/// Filter and window for listing games, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameQuery {
    #[serde(default)]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub host: Option<UserId>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
}

impl GameQuery {
    pub fn open_games() -> Self {
        GameQuery { status: Some(GameStatus::New), ..Default::default() }
    }

    /// Limit clamped to `1..=MAX_PAGE_SIZE`; zero means the maximum.
    pub fn page_size(&self) -> u32 {
        match self.limit {
            0 => MAX_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePage {
    pub edges: Vec<Game>,
    pub total: u64,
    pub has_next_page: bool,
}

/// Persistent store for games.
///
/// Every state transition is a single conditional write: it returns the updated
/// row when the predicate held and `None` when it did not, so concurrent callers
/// can never both win the same transition.
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn insert_game(&self, game: &NewGame) -> Result<Game, StorageError>;

    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StorageError>;

    async fn list_games(&self, query: &GameQuery) -> Result<GamePage, StorageError>;

    /// Removes the game if `host` owns it, it is NEW and nobody has joined.
    async fn delete_open_game(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError>;

    /// Seats `challenger` on a NEW, unjoined game hosted by someone else.
    async fn set_challenger(&self, game_id: GameId, challenger: UserId) -> Result<Option<Game>, StorageError>;

    /// Unseats the challenger of a NEW game owned by `host`.
    async fn clear_challenger(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError>;

    /// Moves a joined NEW game owned by `host` to ON.
    async fn start_game(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError>;

    /// Puts an ON game owned by `host` back to NEW, keeping its challenger.
    async fn revert_start(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError>;

    /// Settles an ON game in which `user` is a participant.
    async fn finish_game(
        &self,
        game_id: GameId,
        user: UserId,
        time: u32,
        winner: GameWinner,
    ) -> Result<Option<Game>, StorageError>;
}
