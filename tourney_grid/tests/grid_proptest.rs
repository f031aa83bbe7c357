/// Property-based tests for bracket construction using proptest
///
/// These tests verify builder counts, pair coverage, circle-method rotation
/// groups, propagation arithmetic and shuffle determinism over generated inputs.
use proptest::prelude::*;
use std::collections::HashSet;
use tourney_grid::grid::{
    BracketBuilder, CircleBuilder, PlayoffBuilder, circle::circle_rotations, circle::queue_order,
    playoff::next_match, shuffle_participants,
};
use uuid::Uuid;

// Strategy to generate a list of distinct participant ids
fn participants(n: usize) -> Vec<Uuid> {
    (0..n).map(|i| Uuid::from_u128(i as u128 + 1)).collect()
}

proptest! {
    #[test]
    fn test_playoff_match_counts(exponent in 1u32..=6) {
        let n = 1usize << exponent;
        let plan = PlayoffBuilder::new(participants(n), false, 1).plan().unwrap();

        prop_assert_eq!(plan.rounds.len() as u32, exponent);
        prop_assert_eq!(plan.match_count(), n - 1);
        for round in &plan.rounds {
            prop_assert_eq!(round.matches.len(), n >> round.round_number);
        }
    }

    #[test]
    fn test_playoff_third_place_adds_one_match(exponent in 2u32..=6) {
        let n = 1usize << exponent;
        let plan = PlayoffBuilder::new(participants(n), true, 1).plan().unwrap();
        prop_assert_eq!(plan.match_count(), n);

        let queue: Vec<_> = plan.matches().map(|(_, m)| m.queue_match_number).collect();
        prop_assert_eq!(queue, (1..=n as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_circle_covers_every_pair_once(n in 2usize..=16) {
        let players = participants(n);
        let plan = CircleBuilder::new(players, 1).plan().unwrap();
        prop_assert_eq!(plan.match_count(), n * (n - 1) / 2);

        let mut seen = HashSet::new();
        for (_, m) in plan.matches() {
            let [Some(a), Some(b)] = m.participants else {
                return Err(TestCaseError::fail("empty slot in circle match"));
            };
            prop_assert!(a != b);
            prop_assert!(seen.insert((a.min(b), a.max(b))));
        }

        let mut queue: Vec<_> = plan.matches().map(|(_, m)| m.queue_match_number).collect();
        queue.sort_unstable();
        prop_assert_eq!(queue, (1..=plan.match_count() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_rotation_groups_are_disjoint(n in 2usize..=16) {
        for rotation in circle_rotations(n) {
            let mut used = HashSet::new();
            for (a, b) in rotation {
                prop_assert!(used.insert(a));
                prop_assert!(used.insert(b));
            }
        }
        prop_assert_eq!(queue_order(n).len(), n * (n - 1) / 2);
    }

    #[test]
    fn test_next_match_formula(m in 1u32..=1024) {
        let (destination, slot) = next_match(m);
        prop_assert_eq!(destination, m.div_ceil(2));
        prop_assert_eq!(slot, if m % 2 == 1 { 0 } else { 1 });
        // siblings share a destination and never a slot
        let sibling = if m % 2 == 1 { m + 1 } else { m - 1 };
        let (sibling_destination, sibling_slot) = next_match(sibling);
        prop_assert_eq!(destination, sibling_destination);
        prop_assert_ne!(slot, sibling_slot);
    }

    #[test]
    fn test_shuffle_is_deterministic(n in 2usize..=32, seed in any::<u128>()) {
        let players = participants(n);
        let grid_id = Uuid::from_u128(seed);

        let first = shuffle_participants(&players, &grid_id);
        let second = shuffle_participants(&players, &grid_id);
        prop_assert_eq!(&first, &second);

        let mut sorted = first.clone();
        sorted.sort();
        prop_assert_eq!(sorted, players);

        let plan_a = CircleBuilder::new(first.clone(), 1).plan().unwrap();
        let plan_b = CircleBuilder::new(second, 1).plan().unwrap();
        prop_assert_eq!(plan_a, plan_b);
    }

    #[test]
    fn test_invalid_playoff_sizes_rejected(n in 0usize..=100) {
        prop_assume!(n < 2 || !n.is_power_of_two());
        prop_assert!(PlayoffBuilder::new(participants(n), false, 1).plan().is_err());
    }
}
