//! Round-robin construction and circle-method playback order.

use std::collections::HashMap;

use super::{
    errors::{GridError, GridResult},
    factory::{BracketBuilder, BracketPlan, PlannedMatch, PlannedRound},
    models::{GridType, ParticipantId},
};

/// Pairings of the circle method, one group per rotation
///
/// Index 0 stays fixed while the other entrants rotate around it. Each
/// rotation pairs the fixed entrant with the far end of the circle and the
/// rest symmetrically from both ends inward. For odd `n` a phantom entrant is
/// added and whoever draws it sits that rotation out. Pairs are `(low, high)`.
pub fn circle_rotations(n: usize) -> Vec<Vec<(usize, usize)>> {
    if n < 2 {
        return Vec::new();
    }

    let size = n + n % 2;
    let half = size / 2;
    let mut ring: Vec<usize> = (1..size).collect();
    let mut rotations = Vec::with_capacity(size - 1);

    for _ in 0..size - 1 {
        let mut pairs = Vec::with_capacity(half);
        pairs.push((0, ring[size - 2]));
        for i in 0..half - 1 {
            pairs.push((ring[i], ring[size - 3 - i]));
        }

        rotations.push(
            pairs
                .into_iter()
                .filter(|&(a, b)| a < n && b < n)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect(),
        );
        ring.rotate_right(1);
    }

    rotations
}

/// Flattened playback order
///
/// Rotations are concatenated in order. Each rotation starts from its first
/// pair sharing nobody with the previously queued pair, when such a pair
/// exists, and continues cyclically.
pub fn queue_order(n: usize) -> Vec<(usize, usize)> {
    let mut order: Vec<(usize, usize)> = Vec::with_capacity(n * n.saturating_sub(1) / 2);

    for rotation in circle_rotations(n) {
        let start = order
            .last()
            .and_then(|&(a, b)| {
                rotation
                    .iter()
                    .position(|&(c, d)| c != a && c != b && d != a && d != b)
            })
            .unwrap_or(0);
        order.extend(rotation[start..].iter().chain(&rotation[..start]).copied());
    }

    order
}

/// Builds the single round-robin round
#[derive(Debug, Clone)]
pub struct CircleBuilder {
    players: Vec<ParticipantId>,
    game_count: u32,
}

impl CircleBuilder {
    /// Create a circle builder
    pub fn new(players: Vec<ParticipantId>, game_count: u32) -> Self {
        Self {
            players,
            game_count,
        }
    }
}

impl BracketBuilder for CircleBuilder {
    fn plan(&self) -> GridResult<BracketPlan> {
        if self.game_count == 0 {
            return Err(GridError::InvalidGameCount(self.game_count));
        }
        let n = self.players.len();
        if n < 2 {
            return Err(GridError::InvalidParticipantCount {
                format: GridType::Circle.as_str(),
                count: n,
            });
        }

        let queue_positions: HashMap<(usize, usize), u32> = queue_order(n)
            .into_iter()
            .enumerate()
            .map(|(position, pair)| (pair, position as u32 + 1))
            .collect();

        let mut matches = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n - 1 {
            for j in i + 1..n {
                matches.push(PlannedMatch {
                    grid_match_number: matches.len() as u32 + 1,
                    queue_match_number: queue_positions[&(i, j)],
                    participants: [Some(self.players[i]), Some(self.players[j])],
                });
            }
        }

        Ok(BracketPlan {
            grid_type: GridType::Circle,
            rounds: vec![PlannedRound {
                round_number: 1,
                game_count: self.game_count,
                matches,
            }],
        })
    }
}
