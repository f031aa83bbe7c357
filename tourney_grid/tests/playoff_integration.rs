//! Integration tests for playoff grids
//!
//! These tests drive `GridManager` over the in-memory repository from build
//! through the final and check the bracket, standings and failure paths.

use std::collections::HashMap;
use std::sync::Arc;

use tourney_grid::db::{GridRepository, MemoryGridRepository, MemoryParticipantDirectory};
use tourney_grid::grid::{
    GridError, GridManager, GridSettings, GridType, Match, MatchOutcome, Participant,
    ParticipantId,
};
use uuid::Uuid;

fn roster(names: &[&str]) -> Vec<Participant> {
    names
        .iter()
        .map(|name| Participant {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
        })
        .collect()
}

fn setup(players: &[Participant]) -> (GridManager, Arc<MemoryGridRepository>) {
    let repository = Arc::new(MemoryGridRepository::new());
    let directory = Arc::new(MemoryParticipantDirectory::with_participants(
        players.to_vec(),
    ));
    let manager = GridManager::new(repository.clone(), directory, GridSettings::default());
    (manager, repository)
}

fn names(players: &[Participant]) -> HashMap<ParticipantId, String> {
    players.iter().map(|p| (p.id, p.full_name.clone())).collect()
}

async fn play(manager: &GridManager, m: &Match, winner_slot: usize, score: [i32; 2]) {
    let score = if winner_slot == 0 {
        [score[0].max(score[1]), score[0].min(score[1])]
    } else {
        [score[0].min(score[1]), score[0].max(score[1])]
    };
    manager.update_match_score(m.id, score).await.unwrap();
    manager.end_match(m.id).await.unwrap();
}

/// Matches of one round as currently stored
async fn round_matches(
    repository: &MemoryGridRepository,
    grid_id: Uuid,
    round_number: u32,
) -> Vec<Match> {
    let rounds = repository.find_rounds(grid_id).await.unwrap();
    let round = rounds
        .iter()
        .find(|r| r.round_number == round_number)
        .unwrap();
    repository.find_matches(round.id).await.unwrap()
}

#[tokio::test]
async fn test_four_player_playoff_to_completion() {
    let players = roster(&["Ana", "Ben", "Cleo", "Dev"]);
    let (manager, repository) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, false).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    manager.start(grid.id, &ids).await.unwrap();

    let first = round_matches(&repository, grid.id, 1).await;
    assert_eq!(first.len(), 2);
    let [Some(a), Some(b)] = first[0].participants else {
        panic!("round 1 match 1 not seeded");
    };
    let [Some(c), Some(d)] = first[1].participants else {
        panic!("round 1 match 2 not seeded");
    };

    // A beats B 2-0, D beats C 1-0
    manager.update_match_score(first[0].id, [2, 0]).await.unwrap();
    manager.end_match(first[0].id).await.unwrap();
    manager.update_match_score(first[1].id, [0, 1]).await.unwrap();
    manager.end_match(first[1].id).await.unwrap();

    // match 1 feeds slot 0, match 2 feeds slot 1
    let final_match = round_matches(&repository, grid.id, 2).await.remove(0);
    assert_eq!(final_match.participants, [Some(a), Some(d)]);

    manager.update_match_score(final_match.id, [2, 1]).await.unwrap();
    let outcome = manager.end_match(final_match.id).await.unwrap();
    assert_eq!(outcome, MatchOutcome::Champion { winner_id: a });

    let standings = manager.standings(grid.id).await.unwrap();
    let table: Vec<_> = standings
        .iter()
        .map(|s| (s.participant.id, s.placement.as_str()))
        .collect();
    assert_eq!(table, vec![(a, "1"), (d, "2"), (b, "3 — 4"), (c, "3 — 4")]);
}

#[tokio::test]
async fn test_eight_player_playoff_with_third_place() {
    let players = roster(&["P1", "P2", "P3", "P4", "P5", "P6", "P7", "P8"]);
    let (manager, repository) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, true).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    let created = manager.start(grid.id, &ids).await.unwrap();
    assert_eq!(created.len(), 8);

    // slot 0 always wins
    for m in round_matches(&repository, grid.id, 1).await {
        play(&manager, &m, 0, [3, 1]).await;
    }
    let semifinals = round_matches(&repository, grid.id, 2).await;
    assert_eq!(semifinals.len(), 3);
    for m in &semifinals[..2] {
        play(&manager, m, 1, [0, 2]).await;
    }

    let third_place = round_matches(&repository, grid.id, 2).await.remove(2);
    let final_match = round_matches(&repository, grid.id, 3).await.remove(0);
    assert_eq!(
        third_place.participants,
        [semifinals[0].participants[0], semifinals[1].participants[0]]
    );
    assert_eq!(
        final_match.participants,
        [semifinals[0].participants[1], semifinals[1].participants[1]]
    );

    play(&manager, &third_place, 1, [0, 1]).await;
    play(&manager, &final_match, 0, [4, 2]).await;

    let standings = manager.standings(grid.id).await.unwrap();
    let placements: Vec<_> = standings.iter().map(|s| s.placement.as_str()).collect();
    assert_eq!(
        placements,
        vec!["1", "2", "3", "4", "5 — 8", "5 — 8", "5 — 8", "5 — 8"]
    );
    assert_eq!(Some(standings[0].participant.id), final_match.participants[0]);
    assert_eq!(Some(standings[2].participant.id), third_place.participants[1]);

    let display = names(&players);
    for standing in &standings {
        assert_eq!(display[&standing.participant.id], standing.participant.full_name);
    }
}

#[tokio::test]
async fn test_queue_lists_third_place_before_final() {
    let players = roster(&["A", "B", "C", "D"]);
    let (manager, _) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, true).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    manager.start(grid.id, &ids).await.unwrap();

    let queue = manager.queue(grid.id).await.unwrap();
    let numbers: Vec<_> = queue
        .iter()
        .map(|m| (m.queue_match_number, m.grid_match_number))
        .collect();
    assert_eq!(numbers, vec![(1, 1), (2, 2), (3, 3), (4, 1)]);
}

#[tokio::test]
async fn test_standings_before_final_rejected() {
    let players = roster(&["A", "B", "C", "D"]);
    let (manager, _) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, false).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    manager.start(grid.id, &ids).await.unwrap();

    let err = manager.standings(grid.id).await.unwrap_err();
    assert!(matches!(err, GridError::GridNotConcluded { open_matches: 3, .. }));
}

#[tokio::test]
async fn test_non_power_of_two_rejected() {
    let players = roster(&["A", "B", "C", "D", "E", "F"]);
    let (manager, repository) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, false).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();

    let err = manager.start(grid.id, &ids).await.unwrap_err();
    assert!(matches!(err, GridError::InvalidParticipantCount { count: 6, .. }));
    assert!(repository.find_rounds(grid.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_build_is_rolled_back_and_retryable() {
    let players = roster(&["A", "B", "C", "D", "E", "F", "G", "H"]);
    let repository = Arc::new(MemoryGridRepository::failing_after(4));
    let directory = Arc::new(MemoryParticipantDirectory::with_participants(players.clone()));
    let manager = GridManager::new(repository.clone(), directory, GridSettings::default());

    let grid = manager.create_grid(GridType::Playoff, false).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    let err = manager.start(grid.id, &ids).await.unwrap_err();
    assert!(matches!(err, GridError::PersistenceFailure(_)));
    assert_eq!(err.client_message(), "Internal server error");

    let bracket = manager.bracket(grid.id).await.unwrap();
    assert!(bracket.rounds.is_empty());
    assert!(bracket.third_place_match.is_none());
}

#[tokio::test]
async fn test_concurrent_builds_only_one_wins() {
    let players = roster(&["A", "B", "C", "D"]);
    let (manager, repository) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, false).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();

    let first = tokio::spawn({
        let manager = manager.clone();
        let ids = ids.clone();
        async move { manager.start(grid.id, &ids).await }
    });
    let second = tokio::spawn({
        let manager = manager.clone();
        let ids = ids.clone();
        async move { manager.start(grid.id, &ids).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(GridError::GridAlreadyBuilt(_))))
    );
    assert_eq!(repository.find_rounds(grid.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_ends_on_different_matches() {
    let players = roster(&["A", "B", "C", "D", "E", "F", "G", "H"]);
    let (manager, repository) = setup(&players);
    let grid = manager.create_grid(GridType::Playoff, false).await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    manager.start(grid.id, &ids).await.unwrap();

    let first = round_matches(&repository, grid.id, 1).await;
    for m in &first {
        manager.update_match_score(m.id, [1, 0]).await.unwrap();
    }

    let handles: Vec<_> = first
        .iter()
        .map(|m| {
            let manager = manager.clone();
            let match_id = m.id;
            tokio::spawn(async move { manager.end_match(match_id).await })
        })
        .collect();
    for handle in handles {
        assert!(matches!(
            handle.await.unwrap(),
            Ok(MatchOutcome::Advanced { .. })
        ));
    }

    let second = round_matches(&repository, grid.id, 2).await;
    assert_eq!(second[0].participants, [first[0].participants[0], first[1].participants[0]]);
    assert_eq!(second[1].participants, [first[2].participants[0], first[3].participants[0]]);
}
