//! Deterministic participant shuffling.
//!
//! The seed is derived from the grid id alone: the 16 id bytes fill the first
//! half of the ChaCha seed and the second half stays zero. Rebuilding a grid
//! from the same participant list therefore always yields the same order.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::models::{GridId, ParticipantId};

/// Seed bytes for a grid
pub fn grid_seed(grid_id: &GridId) -> [u8; 32] {
    let mut seed = [0; 32];
    seed[0..16].copy_from_slice(grid_id.as_bytes());

    seed
}

/// Shuffle participants with an RNG seeded from the grid id
pub fn shuffle_participants(
    participants: &[ParticipantId],
    grid_id: &GridId,
) -> Vec<ParticipantId> {
    let rng = &mut ChaCha8Rng::from_seed(grid_seed(grid_id));
    let mut shuffled = participants.to_vec();
    shuffled.shuffle(rng);
    shuffled
}
