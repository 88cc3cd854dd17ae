use crate::types::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Failures surfaced by preference building and matching.
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("no players to assign")]
    NoPlayers,
    #[error("no teams to assign players to")]
    NoTeams,
    #[error("entity {id} ({name}) has a non-finite location")]
    NonFiniteLocation { id: usize, name: String },
    #[error("entity id {0} appears more than once")]
    DuplicateId(usize),
    #[error("team {id} ({name}) has no roster capacity")]
    MissingCapacity { id: usize, name: String },
    #[error("total roster capacity {capacity} cannot hold {players} players")]
    InsufficientCapacity { capacity: usize, players: usize },
    #[error("entity {0} has no computed preferences")]
    PreferencesNotBuilt(usize),
    #[error("player {player_id} ranks unknown team {team_id}")]
    UnknownTeam { player_id: usize, team_id: usize },
    #[error("player {0} was rejected by every team it could reach")]
    ExhaustedPreferences(usize),
    #[error("{unassigned} players still unassigned after {passes} passes")]
    PassLimitExceeded { passes: usize, unassigned: usize },
}

/// Compute pairwise player-team distances and derive both sides'
/// preference rankings, nearest first. Ties keep recording order, so
/// equidistant counterparts rank in generation order.
///
/// Distances are appended to whatever the entities already hold: calling
/// this twice for the same population doubles every list. Call it exactly
/// once per generated league.
pub fn build_preferences(
    players: &mut [Entity],
    teams: &mut [Entity],
) -> Result<(), MatchError> {
    if players.is_empty() {
        return Err(MatchError::NoPlayers);
    }
    if teams.is_empty() {
        return Err(MatchError::NoTeams);
    }

    let mut seen = HashSet::with_capacity(players.len() + teams.len());
    for entity in players.iter().chain(teams.iter()) {
        if !entity.location.is_finite() {
            return Err(MatchError::NonFiniteLocation {
                id: entity.id,
                name: entity.name.clone(),
            });
        }
        if !seen.insert(entity.id) {
            return Err(MatchError::DuplicateId(entity.id));
        }
    }

    for player in players.iter_mut() {
        for team in teams.iter_mut() {
            let dist = player.location.distance(&team.location);
            player.distances.push((dist, team.id));
            team.distances.push((dist, player.id));
        }
    }

    for entity in players.iter_mut().chain(teams.iter_mut()) {
        entity.sort_distances();
        entity.rankings = entity.distances.iter().map(|&(_, id)| id).collect();
    }

    Ok(())
}

/// Deferred-acceptance roster matcher.
///
/// Works like a residency match: each pass, every unassigned player
/// proposes to the team at the front of its preference queue. The team
/// accepts if the player sits within the pass's consideration depth of
/// its own ranking and it still has room; otherwise the player waits. A
/// full team is dropped from the player's queue for good. The depth
/// starts at 1 and grows by one each pass, so teams concede to farther
/// players only as closer ones settle elsewhere.
pub struct Matchmaker {
    config: LeagueConfig,
}

impl Matchmaker {
    pub fn new(config: LeagueConfig) -> Self {
        Self { config }
    }

    /// Assign every unassigned player to a team, mutating rosters on both
    /// sides. Players already holding a team (coach's kids) are left
    /// untouched and count toward completion.
    ///
    /// On error the work done so far is kept: rosters stay valid and
    /// mutual, and every popped queue entry was a confirmed-full team.
    pub fn run(
        &self,
        players: &mut [Entity],
        teams: &mut [Entity],
    ) -> Result<(), MatchError> {
        for team in teams.iter() {
            if team.max_roster_size == 0 {
                return Err(MatchError::MissingCapacity {
                    id: team.id,
                    name: team.name.clone(),
                });
            }
        }

        let mut assigned = players.iter().filter(|p| p.is_assigned()).count();
        if assigned == players.len() {
            return Ok(());
        }
        for player in players.iter().filter(|p| !p.is_assigned()) {
            if player.distances.is_empty() {
                return Err(MatchError::PreferencesNotBuilt(player.id));
            }
        }
        for team in teams.iter() {
            if team.distances.is_empty() {
                return Err(MatchError::PreferencesNotBuilt(team.id));
            }
        }

        let team_slots: HashMap<usize, usize> =
            teams.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

        let max_passes = self
            .config
            .max_match_passes
            .unwrap_or(players.len() + teams.len() + 1);
        let mut passes = 0;

        while assigned < players.len() {
            if passes == max_passes {
                return Err(MatchError::PassLimitExceeded {
                    passes,
                    unassigned: players.len() - assigned,
                });
            }
            // Teams consider one more of their ranked players each pass.
            let depth = passes + 1;

            for player in players.iter_mut() {
                if player.is_assigned() {
                    continue;
                }

                let preferred = match player.rankings.front() {
                    Some(&team_id) => team_id,
                    None => return Err(MatchError::ExhaustedPreferences(player.id)),
                };
                let team = match team_slots.get(&preferred) {
                    Some(&slot) => &mut teams[slot],
                    None => {
                        return Err(MatchError::UnknownTeam {
                            player_id: player.id,
                            team_id: preferred,
                        })
                    }
                };

                if !team.has_room() {
                    // A full team never reopens, so drop it for good.
                    player.rankings.pop_front();
                    #[cfg(feature = "debug")]
                    eprintln!("Player {} dropped full team {}", player.id, preferred);
                    continue;
                }

                if team.rankings.iter().take(depth).any(|&id| id == player.id) {
                    // Mutual acceptance, recorded on both sides at once.
                    player.roster.push(team.id);
                    team.roster.push(player.id);
                    assigned += 1;
                }
                // Otherwise the player is deferred, queue untouched, and
                // proposes to the same team at the next depth.
            }

            passes += 1;
            #[cfg(feature = "debug")]
            eprintln!(
                "Match pass {} (depth {}): {}/{} players assigned",
                passes,
                depth,
                assigned,
                players.len()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: usize, x: f64, y: f64) -> Entity {
        Entity::player(id, format!("Player {}", id), Point::new(x, y))
    }

    fn team(id: usize, x: f64, y: f64, capacity: usize) -> Entity {
        Entity::team(id, format!("Team {}", id), Point::new(x, y), 1, capacity)
    }

    fn ranked_ids(entity: &Entity) -> Vec<usize> {
        entity.rankings.iter().copied().collect()
    }

    #[test]
    fn test_build_preferences_sorts_ascending() {
        let mut players = vec![player(1, 0.0, 0.0)];
        let mut teams = vec![team(10, 5.0, 0.0, 2), team(11, 1.0, 0.0, 2), team(12, 3.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();

        assert_eq!(ranked_ids(&players[0]), vec![11, 12, 10]);
        let dists: Vec<f64> = players[0].distances.iter().map(|&(d, _)| d).collect();
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_build_preferences_records_both_sides() {
        let mut players = vec![player(1, 0.0, 0.0), player(2, 10.0, 0.0)];
        let mut teams = vec![team(10, 2.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();

        assert_eq!(players[0].distances.len(), 1);
        assert_eq!(players[1].distances.len(), 1);
        assert_eq!(teams[0].distances.len(), 2);
        // Same pair, same distance on both sides.
        assert_eq!(players[0].distances[0].0, 2.0);
        assert_eq!(teams[0].distances[0], (2.0, 1));
        assert_eq!(ranked_ids(&teams[0]), vec![1, 2]);
    }

    #[test]
    fn test_build_preferences_ties_keep_generation_order() {
        let mut players = vec![player(1, 0.0, 0.0)];
        // Both teams at distance 4, in either direction.
        let mut teams = vec![team(10, 4.0, 0.0, 2), team(11, -4.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();
        assert_eq!(ranked_ids(&players[0]), vec![10, 11]);
    }

    #[test]
    fn test_build_preferences_rejects_empty_collections() {
        let mut no_players: Vec<Entity> = Vec::new();
        let mut teams = vec![team(10, 0.0, 0.0, 2)];
        assert_eq!(
            build_preferences(&mut no_players, &mut teams),
            Err(MatchError::NoPlayers)
        );

        let mut players = vec![player(1, 0.0, 0.0)];
        let mut no_teams: Vec<Entity> = Vec::new();
        assert_eq!(
            build_preferences(&mut players, &mut no_teams),
            Err(MatchError::NoTeams)
        );
    }

    #[test]
    fn test_build_preferences_rejects_duplicate_id() {
        let mut players = vec![player(1, 0.0, 0.0)];
        let mut teams = vec![team(1, 5.0, 0.0, 2)];
        assert_eq!(
            build_preferences(&mut players, &mut teams),
            Err(MatchError::DuplicateId(1))
        );
    }

    #[test]
    fn test_build_preferences_rejects_non_finite_location() {
        let mut players = vec![player(1, f64::NAN, 0.0)];
        let mut teams = vec![team(10, 5.0, 0.0, 2)];
        let err = build_preferences(&mut players, &mut teams).unwrap_err();
        assert_eq!(
            err,
            MatchError::NonFiniteLocation {
                id: 1,
                name: "Player 1".to_string()
            }
        );
    }

    #[test]
    fn test_build_preferences_appends_on_second_call() {
        let mut players = vec![player(1, 0.0, 0.0)];
        let mut teams = vec![team(10, 5.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();
        build_preferences(&mut players, &mut teams).unwrap();
        assert_eq!(players[0].distances.len(), 2);
        assert_eq!(players[0].rankings.len(), 2);
    }

    #[test]
    fn test_mutual_first_choices_settle_in_one_pass() {
        // Each player is nearest to a different team and vice versa.
        let mut players = vec![player(1, 0.0, 0.0), player(2, 10.0, 0.0)];
        let mut teams = vec![team(10, 1.0, 0.0, 1), team(11, 9.0, 0.0, 1)];
        build_preferences(&mut players, &mut teams).unwrap();

        let matchmaker = Matchmaker::new(LeagueConfig {
            max_match_passes: Some(1),
            ..LeagueConfig::default()
        });
        matchmaker.run(&mut players, &mut teams).unwrap();

        assert_eq!(players[0].assigned_team(), Some(10));
        assert_eq!(players[1].assigned_team(), Some(11));
        assert_eq!(teams[0].roster, vec![1]);
        assert_eq!(teams[1].roster, vec![2]);
    }

    #[test]
    fn test_second_ranked_player_waits_for_depth_two() {
        // Team 10 ranks player 2 second, so player 2 is deferred at depth
        // 1 and accepted on the second pass.
        let mut players = vec![player(1, 1.0, 0.0), player(2, 2.0, 0.0)];
        let mut teams = vec![team(10, 0.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();

        let one_pass = Matchmaker::new(LeagueConfig {
            max_match_passes: Some(1),
            ..LeagueConfig::default()
        });
        let mut players_once = players.clone();
        let mut teams_once = teams.clone();
        let err = one_pass.run(&mut players_once, &mut teams_once).unwrap_err();
        assert_eq!(
            err,
            MatchError::PassLimitExceeded {
                passes: 1,
                unassigned: 1
            }
        );
        assert!(!players_once[1].is_assigned());
        // Deferred, not rejected: the queue still has the team up front.
        assert_eq!(players_once[1].rankings.front(), Some(&10));

        let matchmaker = Matchmaker::new(LeagueConfig::default());
        matchmaker.run(&mut players, &mut teams).unwrap();
        assert_eq!(players[1].assigned_team(), Some(10));
    }

    #[test]
    fn test_full_team_is_popped_and_next_choice_wins() {
        // Both players are nearest to team 10, which only holds one.
        // Player 2 ranks second for team 11, so it lands there at depth 2.
        let mut players = vec![player(1, 0.0, 0.0), player(2, 0.5, 0.0)];
        let mut teams = vec![team(10, 0.0, 1.0, 1), team(11, 0.0, 3.0, 1)];
        build_preferences(&mut players, &mut teams).unwrap();

        let matchmaker = Matchmaker::new(LeagueConfig::default());
        matchmaker.run(&mut players, &mut teams).unwrap();

        assert_eq!(players[0].assigned_team(), Some(10));
        assert_eq!(players[1].assigned_team(), Some(11));
        // The full team was dropped from player 2's queue for good.
        assert!(!players[1].rankings.contains(&10));
    }

    #[test]
    fn test_overflow_player_exhausts_preferences() {
        // Three players, one team with room for two. The leftover player
        // pops the full team and has nowhere else to propose.
        let mut players = vec![
            player(1, 1.0, 0.0),
            player(2, 2.0, 0.0),
            player(3, 3.0, 0.0),
        ];
        let mut teams = vec![team(10, 0.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();

        let matchmaker = Matchmaker::new(LeagueConfig::default());
        let err = matchmaker.run(&mut players, &mut teams).unwrap_err();
        assert_eq!(err, MatchError::ExhaustedPreferences(3));

        // Partial progress is kept and stays mutual.
        assert_eq!(teams[0].roster, vec![1, 2]);
        assert_eq!(players[0].assigned_team(), Some(10));
        assert_eq!(players[1].assigned_team(), Some(10));
        assert!(!players[2].is_assigned());
        assert!(players[2].rankings.is_empty());
        // Assigned players never popped anything.
        assert_eq!(players[0].rankings.len(), 1);
        assert_eq!(players[1].rankings.len(), 1);
    }

    #[test]
    fn test_farthest_ranked_player_needs_deeper_passes() {
        let mut players = vec![
            player(1, 1.0, 0.0),
            player(2, 2.0, 0.0),
            player(3, 3.0, 0.0),
        ];
        let mut teams = vec![team(10, 0.0, 0.0, 3)];
        build_preferences(&mut players, &mut teams).unwrap();

        // Player 3 is only reached at depth 3, so two passes cannot finish.
        let capped = Matchmaker::new(LeagueConfig {
            max_match_passes: Some(2),
            ..LeagueConfig::default()
        });
        let mut players_capped = players.clone();
        let mut teams_capped = teams.clone();
        let err = capped.run(&mut players_capped, &mut teams_capped).unwrap_err();
        assert_eq!(
            err,
            MatchError::PassLimitExceeded {
                passes: 2,
                unassigned: 1
            }
        );

        let matchmaker = Matchmaker::new(LeagueConfig::default());
        matchmaker.run(&mut players, &mut teams).unwrap();
        assert_eq!(teams[0].roster, vec![1, 2, 3]);
    }

    #[test]
    fn test_preassigned_players_are_left_alone() {
        let mut players = vec![player(1, 0.0, 0.0), player(2, 10.0, 0.0)];
        let mut teams = vec![team(10, 1.0, 0.0, 1), team(11, 9.0, 0.0, 1)];
        build_preferences(&mut players, &mut teams).unwrap();

        // Player 1 was claimed as team 10's coach's kid before the run.
        players[0].roster.push(10);
        players[0].coach_kid = Some(10);
        teams[0].roster.push(1);
        teams[0].coach_kid = Some(1);
        let queue_before = players[0].rankings.len();

        let matchmaker = Matchmaker::new(LeagueConfig::default());
        matchmaker.run(&mut players, &mut teams).unwrap();

        assert_eq!(players[0].assigned_team(), Some(10));
        assert_eq!(players[0].rankings.len(), queue_before);
        assert_eq!(players[1].assigned_team(), Some(11));
    }

    #[test]
    fn test_capacity_and_symmetry_hold_on_larger_league() {
        let mut players: Vec<Entity> = (1..=12)
            .map(|i| player(i, i as f64, (i % 4) as f64))
            .collect();
        let mut teams = vec![
            team(100, 2.0, 0.0, 4),
            team(101, 6.0, 2.0, 4),
            team(102, 11.0, 1.0, 4),
        ];
        build_preferences(&mut players, &mut teams).unwrap();

        let matchmaker = Matchmaker::new(LeagueConfig::default());
        matchmaker.run(&mut players, &mut teams).unwrap();

        for team in &teams {
            assert!(team.roster.len() <= team.max_roster_size);
            for &player_id in &team.roster {
                let member = players.iter().find(|p| p.id == player_id).unwrap();
                assert_eq!(member.assigned_team(), Some(team.id));
            }
        }
        for player in &players {
            let team_id = player.assigned_team().unwrap();
            let roster = &teams.iter().find(|t| t.id == team_id).unwrap().roster;
            assert!(roster.contains(&player.id));
        }
    }

    #[test]
    fn test_identical_input_gives_identical_assignment() {
        let make = || {
            let players: Vec<Entity> = (1..=9)
                .map(|i| player(i, (i * 2) as f64, (i % 3) as f64))
                .collect();
            let teams = vec![team(100, 3.0, 0.0, 3), team(101, 9.0, 1.0, 3), team(102, 15.0, 2.0, 3)];
            (players, teams)
        };

        let (mut players_a, mut teams_a) = make();
        build_preferences(&mut players_a, &mut teams_a).unwrap();
        Matchmaker::new(LeagueConfig::default())
            .run(&mut players_a, &mut teams_a)
            .unwrap();

        let (mut players_b, mut teams_b) = make();
        build_preferences(&mut players_b, &mut teams_b).unwrap();
        Matchmaker::new(LeagueConfig::default())
            .run(&mut players_b, &mut teams_b)
            .unwrap();

        for (a, b) in players_a.iter().zip(players_b.iter()) {
            assert_eq!(a.assigned_team(), b.assigned_team());
        }
    }

    #[test]
    fn test_zero_capacity_team_is_rejected() {
        let mut players = vec![player(1, 0.0, 0.0)];
        let mut teams = vec![team(10, 1.0, 0.0, 0)];
        build_preferences(&mut players, &mut teams).unwrap();

        let err = Matchmaker::new(LeagueConfig::default())
            .run(&mut players, &mut teams)
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::MissingCapacity {
                id: 10,
                name: "Team 10".to_string()
            }
        );
    }

    #[test]
    fn test_run_without_preferences_is_rejected() {
        let mut players = vec![player(1, 0.0, 0.0)];
        let mut teams = vec![team(10, 1.0, 0.0, 2)];
        let err = Matchmaker::new(LeagueConfig::default())
            .run(&mut players, &mut teams)
            .unwrap_err();
        assert_eq!(err, MatchError::PreferencesNotBuilt(1));
    }

    #[test]
    fn test_unknown_team_in_queue_is_rejected() {
        let mut players = vec![player(1, 0.0, 0.0)];
        let mut teams = vec![team(10, 1.0, 0.0, 2)];
        build_preferences(&mut players, &mut teams).unwrap();
        players[0].rankings.push_front(999);

        let err = Matchmaker::new(LeagueConfig::default())
            .run(&mut players, &mut teams)
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::UnknownTeam {
                player_id: 1,
                team_id: 999
            }
        );
    }

    #[test]
    fn test_all_players_preassigned_is_a_no_op() {
        let mut players = vec![player(1, 0.0, 0.0)];
        players[0].roster.push(10);
        let mut teams = vec![team(10, 1.0, 0.0, 2)];
        teams[0].roster.push(1);

        Matchmaker::new(LeagueConfig::default())
            .run(&mut players, &mut teams)
            .unwrap();
        assert_eq!(teams[0].roster, vec![1]);
    }
}
