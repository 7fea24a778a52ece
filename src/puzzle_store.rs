use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use crate::cache::{CacheError, KvStore};
use crate::game::{GameId, UserId};
use crate::keys;
use crate::puzzle::{Position, Puzzle};

/// What a move request did to the stored puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move slid pieces.
    Moved(Puzzle),
    /// The target was not playable; the puzzle was rewritten as-is.
    Ignored(Puzzle),
    /// Another write landed between our read and write; this is the newer puzzle.
    Stale(Puzzle),
}

impl MoveOutcome {
    pub fn puzzle(&self) -> &Puzzle {
        match self {
            MoveOutcome::Moved(p) | MoveOutcome::Ignored(p) | MoveOutcome::Stale(p) => p,
        }
    }

    pub fn into_puzzle(self) -> Puzzle {
        match self {
            MoveOutcome::Moved(p) | MoveOutcome::Ignored(p) | MoveOutcome::Stale(p) => p,
        }
    }
}

/// Per-player puzzle state kept in the cache under a derived key, living for
/// `puzzle.time` seconds after its latest write.
#[derive(Clone)]
pub struct PuzzleStore {
    kv: Arc<dyn KvStore>,
    namespace: Uuid,
}

impl PuzzleStore {
    pub fn new(kv: Arc<dyn KvStore>, namespace: Uuid) -> Self {
        PuzzleStore { kv, namespace }
    }

    pub fn key(&self, game_id: GameId, player_id: UserId) -> String {
        keys::puzzle_key(&self.namespace, game_id, player_id)
    }

    fn ttl(puzzle: &Puzzle) -> Duration {
        Duration::from_secs(puzzle.time)
    }

    async fn load_raw(&self, key: &str) -> Result<Option<(String, Puzzle)>, CacheError> {
        match self.kv.get(key).await? {
            Some(raw) => {
                let puzzle: Puzzle = serde_json::from_str(&raw)?;
                if !puzzle.is_well_formed() {
                    return Err(CacheError::Corrupt(key.to_string()));
                }
                Ok(Some((raw, puzzle)))
            }
            None => Ok(None),
        }
    }

    pub async fn load(&self, game_id: GameId, player_id: UserId) -> Result<Option<Puzzle>, CacheError> {
        let key = self.key(game_id, player_id);
        Ok(self.load_raw(&key).await?.map(|(_, puzzle)| puzzle))
    }

    /// Unconditionally writes a player's puzzle, replacing any previous one.
    pub async fn save(&self, game_id: GameId, player_id: UserId, puzzle: &Puzzle) -> Result<(), CacheError> {
        let key = self.key(game_id, player_id);
        let raw = serde_json::to_string(puzzle)?;
        self.kv.set(&key, raw, Self::ttl(puzzle)).await?;
        tracing::debug!(game_id, player_id, key = %key, ttl = puzzle.time, "puzzle saved");
        Ok(())
    }

    /// Applies a move and writes the result back, refreshing the TTL even when
    /// the move was not playable. The write only lands if the stored puzzle is
    /// still the one that was read; otherwise the newer puzzle is returned
    /// untouched. `None` means there is no puzzle for this player.
    pub async fn apply_move(
        &self,
        game_id: GameId,
        player_id: UserId,
        target: Position,
    ) -> Result<Option<MoveOutcome>, CacheError> {
        let key = self.key(game_id, player_id);
        let Some((raw, mut puzzle)) = self.load_raw(&key).await? else {
            return Ok(None);
        };

        let moved = puzzle.move_piece(target);
        puzzle.revision += 1;
        let updated = serde_json::to_string(&puzzle)?;

        if !self.kv.compare_and_set(&key, &raw, updated, Self::ttl(&puzzle)).await? {
            tracing::debug!(game_id, player_id, "concurrent puzzle write, move dropped");
            return Ok(self
                .load_raw(&key)
                .await?
                .map(|(_, latest)| MoveOutcome::Stale(latest)));
        }

        Ok(Some(if moved {
            MoveOutcome::Moved(puzzle)
        } else {
            MoveOutcome::Ignored(puzzle)
        }))
    }

    pub async fn discard(&self, game_id: GameId, player_id: UserId) -> Result<bool, CacheError> {
        self.kv.delete(&self.key(game_id, player_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::cache::MemoryKv;
    use crate::config::DEFAULT_KEY_NAMESPACE;

    fn make_store() -> (PuzzleStore, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        (PuzzleStore::new(kv.clone(), DEFAULT_KEY_NAMESPACE), kv)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, kv) = make_store();
        let puzzle = Puzzle::generate(1, 60);
        store.save(1, 10, &puzzle).await.unwrap();

        assert_eq!(store.load(1, 10).await.unwrap(), Some(puzzle));
        assert!(store.load(1, 11).await.unwrap().is_none());
        assert!(kv.get(&store.key(1, 10)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_apply_move_valid() {
        let (store, _) = make_store();
        store.save(1, 10, &Puzzle::generate(1, 60)).await.unwrap();

        let outcome = store.apply_move(1, 10, Position::new(2, 0)).await.unwrap().unwrap();
        assert!(matches!(outcome, MoveOutcome::Moved(_)));
        assert_eq!(outcome.puzzle().next, Position::new(2, 0));
        assert_eq!(outcome.puzzle().revision, 1);

        let stored = store.load(1, 10).await.unwrap().unwrap();
        assert_eq!(&stored, outcome.puzzle());
    }

    #[tokio::test]
    async fn test_apply_move_invalid_is_rewritten_unchanged() {
        let (store, _) = make_store();
        let original = Puzzle::generate(1, 60);
        store.save(1, 10, &original).await.unwrap();

        let outcome = store.apply_move(1, 10, Position::new(0, 0)).await.unwrap().unwrap();
        assert!(matches!(outcome, MoveOutcome::Ignored(_)));
        let puzzle = outcome.into_puzzle();
        assert_eq!(puzzle.grid, original.grid);
        assert_eq!(puzzle.next, original.next);
        assert_eq!(puzzle.revision, 1);
    }

    #[tokio::test]
    async fn test_apply_move_missing_puzzle() {
        let (store, _) = make_store();
        assert!(store.apply_move(1, 10, Position::new(0, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_puzzle_is_gone() {
        let (store, _) = make_store();
        store.save(1, 10, &Puzzle::generate(1, 0)).await.unwrap();
        assert!(store.load(1, 10).await.unwrap().is_none());
        assert!(store.apply_move(1, 10, Position::new(2, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discard() {
        let (store, _) = make_store();
        store.save(1, 10, &Puzzle::generate(1, 60)).await.unwrap();
        assert!(store.discard(1, 10).await.unwrap());
        assert!(store.load(1, 10).await.unwrap().is_none());
    }

    /// A cache whose compare-and-set always loses, as if another request wrote
    /// between our read and write.
    struct RacingKv {
        inner: MemoryKv,
    }

    #[async_trait]
    impl KvStore for RacingKv {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await
        }
        async fn delete(&self, key: &str) -> Result<bool, CacheError> {
            self.inner.delete(key).await
        }
        async fn compare_and_set(&self, _: &str, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_lost_race_returns_latest_without_writing() {
        let store = PuzzleStore::new(Arc::new(RacingKv { inner: MemoryKv::new() }), DEFAULT_KEY_NAMESPACE);
        let original = Puzzle::generate(2, 60);
        store.save(3, 30, &original).await.unwrap();

        let outcome = store.apply_move(3, 30, Position::new(3, 0)).await.unwrap().unwrap();
        match outcome {
            MoveOutcome::Stale(latest) => assert_eq!(latest, original),
            other => panic!("Expected Stale, got {:?}", other),
        }
        assert_eq!(store.load(3, 30).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_an_error() {
        let (store, kv) = make_store();
        kv.set(&store.key(1, 10), "not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(store.load(1, 10).await, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_malformed_grid_is_an_error() {
        let (store, kv) = make_store();
        let mut puzzle = Puzzle::generate(1, 60);
        puzzle.next = Position::new(7, 7);
        let key = store.key(1, 10);
        kv.set(&key, serde_json::to_string(&puzzle).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(store.load(1, 10).await, Err(CacheError::Corrupt(k)) if k == key));
        assert!(matches!(
            store.apply_move(1, 10, Position::new(0, 7)).await,
            Err(CacheError::Corrupt(_))
        ));
    }
}
