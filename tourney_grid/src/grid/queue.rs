//! Playback order of a grid's matches.

use log::warn;

use super::models::Match;

/// Lays matches out by `queue_match_number` in a fixed number of slots
#[derive(Debug, Clone, Copy)]
pub struct QueueScheduler {
    capacity: usize,
}

impl QueueScheduler {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot index of a queue number, if it fits
    fn slot_of(&self, queue_match_number: u32) -> Option<usize> {
        let index = (queue_match_number as usize).checked_sub(1)?;
        (index < self.capacity).then_some(index)
    }

    /// Place matches in queue order
    ///
    /// Matches whose queue number falls outside the capacity are left out.
    /// Empty slots are dropped from the result.
    pub fn schedule<T, F>(&self, matches: &[Match], mut summarize: F) -> Vec<T>
    where
        F: FnMut(&Match) -> T,
    {
        let mut slots: Vec<Option<T>> = (0..self.capacity).map(|_| None).collect();
        for m in matches {
            match self.slot_of(m.queue_match_number) {
                Some(index) => slots[index] = Some(summarize(m)),
                None => warn!(
                    "Match {} queue number {} exceeds capacity {}",
                    m.id, m.queue_match_number, self.capacity
                ),
            }
        }
        slots.into_iter().flatten().collect()
    }
}
