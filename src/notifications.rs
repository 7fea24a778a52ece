use std::sync::Arc;
use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;
use crate::game::{Game, GameId, UserId};
use crate::keys;
use crate::pubsub::{PubSub, PubSubError};
use crate::puzzle::Puzzle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    New,
    Update,
    Delete,
}

/// Envelope published on the game lifecycle topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameNotification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub game: Game,
}

/// Subscriber-side narrowing of the lifecycle topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFilter {
    /// Only envelopes about this game.
    #[serde(default)]
    pub game_id: Option<GameId>,
    /// Only envelopes about games this user hosts or challenges.
    #[serde(default)]
    pub participant: Option<UserId>,
}

impl GameFilter {
    pub fn matches(&self, notification: &GameNotification) -> bool {
        let game = &notification.game;
        self.game_id.is_none_or(|id| game.id == id)
            && self.participant.is_none_or(|user| game.is_participant(user))
    }
}

type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Typed view over a topic receiver.
///
/// Payloads that fail to decode are logged and skipped, as are messages lost
/// to a slow receiver.
pub struct Subscription<T> {
    topic: String,
    rx: broadcast::Receiver<String>,
    filter: Filter<T>,
}

impl<T: DeserializeOwned> Subscription<T> {
    fn new(topic: String, rx: broadcast::Receiver<String>, filter: Filter<T>) -> Self {
        Subscription { topic, rx, filter }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn accept(&self, raw: &str) -> Option<T> {
        match serde_json::from_str::<T>(raw) {
            Ok(item) if (self.filter)(&item) => Some(item),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(topic = %self.topic, error = %err, "skipping malformed payload");
                None
            }
        }
    }

    /// Waits for the next matching message. `None` once the topic is closed.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(raw) => {
                    if let Some(item) = self.accept(&raw) {
                        return Some(item);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(topic = %self.topic, missed, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching message already delivered, if any.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(raw) => {
                    if let Some(item) = self.accept(&raw) {
                        return Some(item);
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(topic = %self.topic, missed, "subscriber lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Publishes lifecycle envelopes and per-player puzzle snapshots.
///
/// Publishing is best-effort: failures are logged and never reach the caller.
#[derive(Clone)]
pub struct Notifier {
    pubsub: Arc<dyn PubSub>,
    topic: String,
    namespace: Uuid,
}

impl Notifier {
    pub fn new(pubsub: Arc<dyn PubSub>, topic: impl Into<String>, namespace: Uuid) -> Self {
        Notifier { pubsub, topic: topic.into(), namespace }
    }

    pub fn game_topic(&self) -> &str {
        &self.topic
    }

    pub fn puzzle_topic(&self, game_id: GameId, player_id: UserId) -> String {
        keys::puzzle_key(&self.namespace, game_id, player_id)
    }

    async fn publish<T: Serialize>(&self, topic: &str, message: &T) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(topic, error = %err, "could not encode notification");
                return;
            }
        };
        match self.pubsub.publish(topic, payload).await {
            Ok(receivers) => tracing::debug!(topic, receivers, "published"),
            Err(err) => tracing::warn!(topic, error = %err, "publish failed"),
        }
    }

    pub async fn publish_game(&self, kind: NotificationType, game: &Game) {
        let envelope = GameNotification { kind, game: game.clone() };
        self.publish(&self.topic, &envelope).await;
    }

    pub async fn publish_puzzle(&self, game_id: GameId, player_id: UserId, puzzle: &Puzzle) {
        let topic = self.puzzle_topic(game_id, player_id);
        self.publish(&topic, puzzle).await;
    }

    /// Ends a player's puzzle topic so its subscribers see the end of stream.
    pub async fn close_puzzle(&self, game_id: GameId, player_id: UserId) {
        let topic = self.puzzle_topic(game_id, player_id);
        match self.pubsub.close(&topic).await {
            Ok(existed) => tracing::debug!(topic, existed, "puzzle topic closed"),
            Err(err) => tracing::warn!(topic, error = %err, "could not close topic"),
        }
    }

    pub async fn subscribe_games(
        &self,
        filter: GameFilter,
    ) -> Result<Subscription<GameNotification>, PubSubError> {
        let rx = self.pubsub.subscribe(&self.topic).await?;
        Ok(Subscription::new(
            self.topic.clone(),
            rx,
            Box::new(move |n: &GameNotification| filter.matches(n)),
        ))
    }

    pub async fn subscribe_puzzle(
        &self,
        game_id: GameId,
        player_id: UserId,
    ) -> Result<Subscription<Puzzle>, PubSubError> {
        let topic = self.puzzle_topic(game_id, player_id);
        let rx = self.pubsub.subscribe(&topic).await?;
        Ok(Subscription::new(topic, rx, Box::new(|_: &Puzzle| true)))
    }
}
