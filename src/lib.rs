//! Head-to-head sliding puzzle matches.
//!
//! A host opens a match, a challenger joins, and once the host starts it both
//! players race to solve identical copies of one scrambled board. The crate
//! covers the match lifecycle, puzzle generation and moves, the per-player
//! ephemeral puzzle store and live notification fanout.
//!
//! ## Example usage
//! ```
//! use headtohead::{Config, Difficulty, GameInput, GameManager, GameStatus, Position};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let manager = GameManager::in_memory(Config::default()).unwrap();
//! let (host, challenger) = (1, 2);
//!
//! let input = GameInput { difficulty: Difficulty::Easy, level: 1 };
//! let game = manager.create_game(host, input, b"\x89PNG image").await.unwrap();
//! manager.join_game(challenger, game.id).await.unwrap();
//!
//! let puzzle = manager.start_puzzle(host, game.id).await.unwrap();
//! assert_eq!(puzzle.size(), 3);
//! assert_eq!(manager.get_game(game.id).await.unwrap().status, GameStatus::On);
//!
//! // Targets that are not in line with the empty cell are ignored.
//! let diagonal = Position::new((puzzle.next.row + 1) % 3, (puzzle.next.column + 1) % 3);
//! let same = manager.move_piece(challenger, game.id, diagonal).await.unwrap();
//! assert_eq!(same.grid, puzzle.grid);
//! # });
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod game;
pub mod game_manager;
pub mod keys;
pub mod notifications;
pub mod pubsub;
pub mod puzzle;
pub mod puzzle_store;
pub mod shuffle;
pub mod sqlite_store;
pub mod storage;
pub mod uploader;

#[cfg(feature = "server")]
pub mod api;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{GameError, Result};
pub use game::{Difficulty, EndGameInput, Game, GameId, GameInput, GameStatus, GameWinner, UserId};
pub use game_manager::GameManager;
pub use notifications::{GameFilter, GameNotification, NotificationType, Subscription};
pub use puzzle::{Piece, Position, Puzzle};
pub use storage::{GamePage, GameQuery};
