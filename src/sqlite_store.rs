use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use async_trait::async_trait;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use crate::game::{Difficulty, Game, GameId, GameStatus, GameWinner, NewGame, UserId};
use crate::storage::{GamePage, GameQuery, GameRepository, StorageError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    difficulty TEXT NOT NULL,
    level INTEGER NOT NULL CHECK (level BETWEEN 1 AND 5),
    status TEXT NOT NULL DEFAULT 'new',
    winner TEXT NOT NULL DEFAULT 'unsettled',
    time INTEGER NOT NULL DEFAULT 1,
    image TEXT NOT NULL,
    host_id INTEGER NOT NULL,
    challenger_id INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (status <> 'on' OR challenger_id IS NOT NULL)
);
CREATE INDEX IF NOT EXISTS games_status_idx ON games (status, id);";

const GAME_COLUMNS: &str =
    "id, difficulty, level, status, winner, time, image, host_id, challenger_id, created_at, updated_at";

const LIST_FILTER: &str = "(?1 IS NULL OR status = ?1) AND (?2 IS NULL OR host_id = ?2)";

fn epoch_secs_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

sql_text_enum!(Difficulty);
sql_text_enum!(GameStatus);
sql_text_enum!(GameWinner);

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        difficulty: row.get(1)?,
        level: row.get(2)?,
        status: row.get(3)?,
        winner: row.get(4)?,
        time: row.get(5)?,
        image: row.get(6)?,
        host: row.get(7)?,
        challenger: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// SQLite-backed persistence for games.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path. `":memory:"` gives a
    /// private in-memory database.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        tracing::info!(path, "opening game store");
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }

    /// Runs a conditional write that reports the affected row, if any.
    fn write_returning<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Option<Game>, StorageError> {
        let conn = self.conn()?;
        let game = conn.query_row(sql, params, game_from_row).optional()?;
        Ok(game)
    }
}

#[async_trait]
impl GameRepository for SqliteStore {
    async fn insert_game(&self, game: &NewGame) -> Result<Game, StorageError> {
        let now = epoch_secs_now();
        let conn = self.conn()?;
        let inserted = conn.query_row(
            &format!(
                "INSERT INTO games (difficulty, level, image, host_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {}",
                GAME_COLUMNS
            ),
            params![game.difficulty, game.level, game.image, game.host, now],
            game_from_row,
        )?;
        tracing::debug!(game_id = inserted.id, "game inserted");
        Ok(inserted)
    }

    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StorageError> {
        let conn = self.conn()?;
        let game = conn
            .query_row(
                &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
                params![game_id],
                game_from_row,
            )
            .optional()?;
        Ok(game)
    }

    async fn list_games(&self, query: &GameQuery) -> Result<GamePage, StorageError> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM games WHERE {}", LIST_FILTER),
            params![query.status, query.host],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM games WHERE {} ORDER BY id DESC LIMIT ?3 OFFSET ?4",
            GAME_COLUMNS, LIST_FILTER
        ))?;
        let edges = stmt
            .query_map(
                params![query.status, query.host, query.page_size(), query.offset],
                game_from_row,
            )?
            .collect::<Result<Vec<Game>, rusqlite::Error>>()?;

        let total = total as u64;
        let has_next_page = (query.offset as u64 + edges.len() as u64) < total;
        Ok(GamePage { edges, total, has_next_page })
    }

    async fn delete_open_game(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError> {
        self.write_returning(
            &format!(
                "DELETE FROM games
                 WHERE id = ?1 AND host_id = ?2 AND status = 'new' AND challenger_id IS NULL
                 RETURNING {}",
                GAME_COLUMNS
            ),
            params![game_id, host],
        )
    }

    async fn set_challenger(&self, game_id: GameId, challenger: UserId) -> Result<Option<Game>, StorageError> {
        self.write_returning(
            &format!(
                "UPDATE games SET challenger_id = ?2, updated_at = ?3
                 WHERE id = ?1 AND status = 'new' AND challenger_id IS NULL AND host_id <> ?2
                 RETURNING {}",
                GAME_COLUMNS
            ),
            params![game_id, challenger, epoch_secs_now()],
        )
    }

    async fn clear_challenger(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError> {
        self.write_returning(
            &format!(
                "UPDATE games SET challenger_id = NULL, updated_at = ?3
                 WHERE id = ?1 AND host_id = ?2 AND status = 'new' AND challenger_id IS NOT NULL
                 RETURNING {}",
                GAME_COLUMNS
            ),
            params![game_id, host, epoch_secs_now()],
        )
    }

    async fn start_game(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError> {
        self.write_returning(
            &format!(
                "UPDATE games SET status = 'on', updated_at = ?3
                 WHERE id = ?1 AND host_id = ?2 AND status = 'new' AND challenger_id IS NOT NULL
                 RETURNING {}",
                GAME_COLUMNS
            ),
            params![game_id, host, epoch_secs_now()],
        )
    }

    async fn revert_start(&self, game_id: GameId, host: UserId) -> Result<Option<Game>, StorageError> {
        self.write_returning(
            &format!(
                "UPDATE games SET status = 'new', updated_at = ?3
                 WHERE id = ?1 AND host_id = ?2 AND status = 'on'
                 RETURNING {}",
                GAME_COLUMNS
            ),
            params![game_id, host, epoch_secs_now()],
        )
    }

    async fn finish_game(
        &self,
        game_id: GameId,
        user: UserId,
        time: u32,
        winner: GameWinner,
    ) -> Result<Option<Game>, StorageError> {
        self.write_returning(
            &format!(
                "UPDATE games SET status = 'done', time = ?3, winner = ?4, updated_at = ?5
                 WHERE id = ?1 AND status = 'on' AND (host_id = ?2 OR challenger_id = ?2)
                 RETURNING {}",
                GAME_COLUMNS
            ),
            params![game_id, user, time, winner, epoch_secs_now()],
        )
    }
}
