//! Deterministic lookup coordinates for per-player state.
//!
//! The puzzle cache key and the puzzle-change topic for a player are the same
//! string: a UUID v5 over the configured namespace and `"{game_id}:{player_id}"`.

use uuid::Uuid;
use crate::game::{GameId, UserId};

pub fn player_slot(namespace: &Uuid, game_id: GameId, player_id: UserId) -> Uuid {
    Uuid::new_v5(namespace, format!("{}:{}", game_id, player_id).as_bytes())
}

pub fn puzzle_key(namespace: &Uuid, game_id: GameId, player_id: UserId) -> String {
    format!("puzzle:{}", player_slot(namespace, game_id, player_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_KEY_NAMESPACE;

    #[test]
    fn test_key_is_stable() {
        let a = puzzle_key(&DEFAULT_KEY_NAMESPACE, 7, 42);
        let b = puzzle_key(&DEFAULT_KEY_NAMESPACE, 7, 42);
        assert_eq!(a, b);
        assert!(a.starts_with("puzzle:"));
    }

    #[test]
    fn test_key_distinguishes_players_and_games() {
        let ns = DEFAULT_KEY_NAMESPACE;
        assert_ne!(puzzle_key(&ns, 7, 42), puzzle_key(&ns, 7, 43));
        assert_ne!(puzzle_key(&ns, 7, 42), puzzle_key(&ns, 42, 7));
        // no ambiguity from digit concatenation
        assert_ne!(puzzle_key(&ns, 1, 23), puzzle_key(&ns, 12, 3));
    }

    #[test]
    fn test_key_depends_on_namespace() {
        let other = Uuid::from_u128(1);
        assert_ne!(
            puzzle_key(&DEFAULT_KEY_NAMESPACE, 1, 2),
            puzzle_key(&other, 1, 2)
        );
    }

    #[test]
    fn test_slot_is_v5() {
        let slot = player_slot(&DEFAULT_KEY_NAMESPACE, 1, 2);
        assert_eq!(slot.get_version_num(), 5);
    }
}
