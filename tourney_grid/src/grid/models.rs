//! Grid data models: grids, rounds, matches, games and their views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::errors::GridError;

/// Grid ID type
pub type GridId = Uuid;

/// Round ID type
pub type RoundId = Uuid;

/// Match ID type
pub type MatchId = Uuid;

/// Game ID type
pub type GameId = Uuid;

/// Participant ID type
pub type ParticipantId = Uuid;

/// Cumulative score of the two slots
pub type Score = [i32; 2];

/// Participant slots of a match, each empty until resolved
pub type Slots = [Option<ParticipantId>; 2];

/// Bracket format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GridType {
    /// Single elimination
    Playoff,
    /// Round robin
    Circle,
}

impl GridType {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            GridType::Playoff => "PLAYOFF",
            GridType::Circle => "CIRCLE",
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridType {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAYOFF" => Ok(GridType::Playoff),
            "CIRCLE" => Ok(GridType::Circle),
            _ => Err(GridError::UnsupportedGridType(s.to_string())),
        }
    }
}

/// Bracket container for one tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub id: GridId,
    pub grid_type: GridType,
    /// Whether semifinal losers play for third place (playoff only)
    pub third_place_match: bool,
    pub created_at: DateTime<Utc>,
}

/// One stage of a grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub grid_id: GridId,
    /// Dense, 1-indexed
    pub round_number: u32,
    /// Games per match (best-of-N)
    pub game_count: u32,
}

/// Lifecycle of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    /// At least one slot is still empty
    Pending,
    /// Both slots filled, not ended yet
    Ready,
    /// Ended, with a winner or as a draw
    Decided,
}

/// A contest between two participant slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub round_id: RoundId,
    /// Position within the round, defines bracket topology
    pub grid_match_number: u32,
    /// Position in the global playback order
    pub queue_match_number: u32,
    pub participants: Slots,
    pub score: Score,
    pub winner_id: Option<ParticipantId>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Current lifecycle state
    pub fn state(&self) -> MatchState {
        if self.winner_id.is_some() || self.decided_at.is_some() {
            MatchState::Decided
        } else if self.participants.iter().all(Option::is_some) {
            MatchState::Ready
        } else {
            MatchState::Pending
        }
    }

    /// Slot holding the strictly greater score, `None` on a tie
    pub fn leading_slot(&self) -> Option<usize> {
        match self.score[0].cmp(&self.score[1]) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The participant that did not win, once decided
    pub fn loser_id(&self) -> Option<ParticipantId> {
        let winner = self.winner_id?;
        self.participants
            .iter()
            .flatten()
            .copied()
            .find(|participant| *participant != winner)
    }

    /// Whether both slots hold the same score
    pub fn is_tied(&self) -> bool {
        self.score[0] == self.score[1]
    }
}

/// One scored sub-unit of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub match_id: MatchId,
    /// 1-indexed
    pub game_number: u32,
    pub score: Score,
}

/// Partial match update
///
/// Score, winner and draw writes only apply while the match has not ended, so
/// a second decision attempt affects zero rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchUpdate {
    pub score: Option<Score>,
    pub slot: Option<(usize, ParticipantId)>,
    pub winner_id: Option<ParticipantId>,
    /// End the match without a winner
    pub draw: bool,
}

impl MatchUpdate {
    pub fn score(score: Score) -> Self {
        Self {
            score: Some(score),
            ..Self::default()
        }
    }

    pub fn slot(slot: usize, participant_id: ParticipantId) -> Self {
        Self {
            slot: Some((slot, participant_id)),
            ..Self::default()
        }
    }

    pub fn winner(participant_id: ParticipantId) -> Self {
        Self {
            winner_id: Some(participant_id),
            ..Self::default()
        }
    }

    pub fn draw() -> Self {
        Self {
            draw: true,
            ..Self::default()
        }
    }

    /// Whether the update is subject to the not-yet-ended check
    pub fn touches_result(&self) -> bool {
        self.score.is_some() || self.winner_id.is_some() || self.draw
    }

    /// Whether applying the update ends the match
    pub fn ends_match(&self) -> bool {
        self.winner_id.is_some() || self.draw
    }
}

/// A seat filled by propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub match_id: MatchId,
    pub slot: usize,
    pub participant_id: ParticipantId,
}

/// Partial round update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundUpdate {
    pub game_count: Option<u32>,
}

/// Display record of a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub full_name: String,
}

/// Match summary with resolved participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    pub id: MatchId,
    pub grid_match_number: u32,
    pub queue_match_number: u32,
    pub participants: [Option<Participant>; 2],
    pub score: Score,
    pub winner_id: Option<ParticipantId>,
    /// Set once the match has ended, draws included
    pub decided_at: Option<DateTime<Utc>>,
}

/// Round with its matches in bracket order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub id: RoundId,
    pub round_number: u32,
    pub game_count: u32,
    pub matches: Vec<MatchView>,
}

/// Whole bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketView {
    pub grid_id: GridId,
    pub grid_type: GridType,
    pub rounds: Vec<RoundView>,
    pub third_place_match: Option<MatchView>,
}

/// Game score line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub id: GameId,
    pub game_number: u32,
    pub score: Score,
}

/// Match with its games
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetailView {
    #[serde(flatten)]
    pub summary: MatchView,
    pub games: Vec<GameView>,
}

/// Final placement of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingView {
    pub participant: Participant,
    /// Single rank ("1") or shared range ("5 — 8")
    pub placement: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(participants: Slots, score: Score) -> Match {
        Match {
            id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            grid_match_number: 1,
            queue_match_number: 1,
            participants,
            score,
            winner_id: None,
            decided_at: None,
        }
    }

    #[test]
    fn test_grid_type_parsing() {
        assert_eq!("PLAYOFF".parse::<GridType>().unwrap(), GridType::Playoff);
        assert_eq!("circle".parse::<GridType>().unwrap(), GridType::Circle);

        let err = "SWISS".parse::<GridType>().unwrap_err();
        assert!(matches!(err, GridError::UnsupportedGridType(ref s) if s == "SWISS"));
    }

    #[test]
    fn test_grid_type_serde_uses_storage_names() {
        let json = serde_json::to_string(&GridType::Circle).unwrap();
        assert_eq!(json, "\"CIRCLE\"");
    }

    #[test]
    fn test_match_state_transitions() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut m = sample_match([Some(a), None], [0, 0]);
        assert_eq!(m.state(), MatchState::Pending);

        m.participants[1] = Some(b);
        assert_eq!(m.state(), MatchState::Ready);

        m.winner_id = Some(b);
        assert_eq!(m.state(), MatchState::Decided);
        assert_eq!(m.loser_id(), Some(a));
    }

    #[test]
    fn test_draw_is_terminal() {
        let mut m = sample_match([Some(Uuid::new_v4()), Some(Uuid::new_v4())], [1, 1]);
        m.decided_at = Some(Utc::now());
        assert_eq!(m.state(), MatchState::Decided);
        assert_eq!(m.loser_id(), None);
    }

    #[test]
    fn test_leading_slot() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(sample_match([Some(a), Some(b)], [2, 1]).leading_slot(), Some(0));
        assert_eq!(sample_match([Some(a), Some(b)], [0, 3]).leading_slot(), Some(1));
        assert_eq!(sample_match([Some(a), Some(b)], [1, 1]).leading_slot(), None);
    }
}
