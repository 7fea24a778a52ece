use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::error::GameError;

pub type GameId = i64;
pub type UserId = i64;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
/// Upper bound on a reported finishing time, in seconds.
pub const MAX_FINISH_TIME: u32 = 3000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        ParseEnumError { kind, value: value.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ParseEnumError::new("difficulty", s)),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a match: open for a challenger, being played, settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    New,
    On,
    Done,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::New => "new",
            GameStatus::On => "on",
            GameStatus::Done => "done",
        }
    }
}

impl FromStr for GameStatus {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(GameStatus::New),
            "on" => Ok(GameStatus::On),
            "done" => Ok(GameStatus::Done),
            _ => Err(ParseEnumError::new("game status", s)),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `DefaultHost` and `DefaultChallenger` are wins by forfeit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameWinner {
    DefaultHost,
    DefaultChallenger,
    Host,
    Challenger,
    Unsettled,
    Draw,
}

impl GameWinner {
    pub fn as_str(self) -> &'static str {
        match self {
            GameWinner::DefaultHost => "defaultHost",
            GameWinner::DefaultChallenger => "defaultChallenger",
            GameWinner::Host => "host",
            GameWinner::Challenger => "challenger",
            GameWinner::Unsettled => "unsettled",
            GameWinner::Draw => "draw",
        }
    }
}

impl FromStr for GameWinner {
    type Err = ParseEnumError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defaultHost" => Ok(GameWinner::DefaultHost),
            "defaultChallenger" => Ok(GameWinner::DefaultChallenger),
            "host" => Ok(GameWinner::Host),
            "challenger" => Ok(GameWinner::Challenger),
            "unsettled" => Ok(GameWinner::Unsettled),
            "draw" => Ok(GameWinner::Draw),
            _ => Err(ParseEnumError::new("winner", s)),
        }
    }
}

impl fmt::Display for GameWinner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent record of a head-to-head match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    pub difficulty: Difficulty,
    pub level: u8,
    pub status: GameStatus,
    pub winner: GameWinner,
    pub time: u32,
    pub image: String,
    pub host: UserId,
    pub challenger: Option<UserId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Game {
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.host == user_id || self.challenger == Some(user_id)
    }

    /// Both player ids, once a challenger has joined.
    pub fn players(&self) -> Option<[UserId; 2]> {
        self.challenger.map(|challenger| [self.host, challenger])
    }
}

/// Row to insert when a host opens a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub host: UserId,
    pub difficulty: Difficulty,
    pub level: u8,
    pub image: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInput {
    pub difficulty: Difficulty,
    pub level: u8,
}

impl GameInput {
    pub fn validate(&self) -> Result<(), GameError> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&self.level) {
            return Err(GameError::BadRequest(format!(
                "Level must be between {} and {}",
                MIN_LEVEL, MAX_LEVEL
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndGameInput {
    pub time: u32,
    pub winner: GameWinner,
}

impl EndGameInput {
    pub fn validate(&self) -> Result<(), GameError> {
        if !(1..=MAX_FINISH_TIME).contains(&self.time) {
            return Err(GameError::BadRequest(format!(
                "Time must be between 1 and {} seconds",
                MAX_FINISH_TIME
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::test_case;

    fn make_game() -> Game {
        Game {
            id: 1,
            difficulty: Difficulty::Easy,
            level: 3,
            status: GameStatus::New,
            winner: GameWinner::Unsettled,
            time: 1,
            image: "http://localhost/img.png".to_string(),
            host: 10,
            challenger: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test_case("easy")]
    #[test_case("medium")]
    #[test_case("hard")]
    fn test_difficulty_from_str(value: &str) {
        let difficulty: Difficulty = value.parse().unwrap();
        assert_eq!(difficulty.as_str(), value);
    }

    #[test]
    fn test_unknown_enum_values_rejected() {
        assert!("impossible".parse::<Difficulty>().is_err());
        assert!("paused".parse::<GameStatus>().is_err());
        assert!("nobody".parse::<GameWinner>().is_err());
        assert_eq!(
            "x".parse::<GameStatus>().unwrap_err().to_string(),
            "unknown game status `x`"
        );
    }

    #[test]
    fn test_winner_wire_names() {
        assert_eq!(serde_json::to_string(&GameWinner::DefaultHost).unwrap(), "\"defaultHost\"");
        assert_eq!("defaultChallenger".parse::<GameWinner>(), Ok(GameWinner::DefaultChallenger));
        assert_eq!(serde_json::to_string(&GameStatus::On).unwrap(), "\"on\"");
    }

    #[test]
    fn test_game_serializes_camel_case() {
        let json = serde_json::to_value(make_game()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("challenger").unwrap().is_null());
    }

    #[test]
    fn test_participants() {
        let mut game = make_game();
        assert!(game.is_participant(10));
        assert!(!game.is_participant(20));
        assert!(game.players().is_none());

        game.challenger = Some(20);
        assert!(game.is_participant(20));
        assert_eq!(game.players(), Some([10, 20]));
    }

    #[test_case(0, false)]
    #[test_case(1, true)]
    #[test_case(5, true)]
    #[test_case(6, false)]
    fn test_game_input_level_range(level: u8, ok: bool) {
        let input = GameInput { difficulty: Difficulty::Medium, level };
        assert_eq!(input.validate().is_ok(), ok);
    }

    #[test_case(0, false)]
    #[test_case(1, true)]
    #[test_case(3000, true)]
    #[test_case(3001, false)]
    fn test_end_game_input_time_range(time: u32, ok: bool) {
        let input = EndGameInput { time, winner: GameWinner::Host };
        assert_eq!(input.validate().is_ok(), ok);
    }
}
