use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A position on the league's coordinate grid, in field units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A participant in the assignment process. Players and teams share one
/// shape: both carry a location, pairwise distances, and a preference
/// queue. A player's roster holds at most the one team id it was accepted
/// by; a team's roster holds the player ids it has accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub id: usize,
    pub name: String,
    pub location: Point,
    /// Ids of accepted counterparts.
    pub roster: Vec<usize>,
    /// (distance, counterpart id) pairs, sorted ascending once built.
    pub distances: Vec<(f64, usize)>,
    /// Counterpart ids in ascending-distance order. The matcher consumes
    /// this from the front, so it only ever shrinks.
    pub rankings: VecDeque<usize>,
    pub min_roster_size: usize,
    pub max_roster_size: usize,
    /// For a team: the player id pre-claimed as the coach's kid.
    /// For a player: the team id that pre-claimed it.
    pub coach_kid: Option<usize>,
}

impl Entity {
    /// A player: capacity one, so accepting a single team fills it.
    pub fn player(id: usize, name: String, location: Point) -> Self {
        Self {
            id,
            name,
            location,
            roster: Vec::new(),
            distances: Vec::new(),
            rankings: VecDeque::new(),
            min_roster_size: 0,
            max_roster_size: 1,
            coach_kid: None,
        }
    }

    /// A team with the given roster bounds.
    pub fn team(
        id: usize,
        name: String,
        location: Point,
        min_roster_size: usize,
        max_roster_size: usize,
    ) -> Self {
        Self {
            id,
            name,
            location,
            roster: Vec::new(),
            distances: Vec::new(),
            rankings: VecDeque::new(),
            min_roster_size,
            max_roster_size,
            coach_kid: None,
        }
    }

    pub fn has_room(&self) -> bool {
        self.roster.len() < self.max_roster_size
    }

    /// Whether a player already holds a team.
    pub fn is_assigned(&self) -> bool {
        !self.roster.is_empty()
    }

    pub fn assigned_team(&self) -> Option<usize> {
        self.roster.first().copied()
    }

    /// Sort recorded distances ascending. The sort is stable, so
    /// equidistant counterparts keep their recording order.
    pub fn sort_distances(&mut self) {
        self.distances.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
}

/// Tunable parameters for league generation and matching.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeagueConfig {
    /// Center of the field that generated locations scatter around.
    pub field_center: Point,
    /// Radial standard deviation of player home locations.
    pub player_spread: f64,
    /// Radial standard deviation of team field locations.
    pub team_spread: f64,
    /// Roster bounds stamped onto generated teams.
    pub min_roster_size: usize,
    pub max_roster_size: usize,
    /// Seed one nearby player per team before the general match runs.
    pub assign_coach_kids: bool,
    /// How many of a team's closest players are candidates for its
    /// coach's kid.
    pub coach_kid_pool: usize,
    /// Hard cap on matcher passes. None derives a bound from the
    /// population size.
    pub max_match_passes: Option<usize>,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            field_center: Point::new(50.0, 50.0),
            player_spread: 12.0,
            team_spread: 6.0,
            min_roster_size: 10,
            max_roster_size: 11,
            assign_coach_kids: true,
            coach_kid_pool: 5,
            max_match_passes: None,
        }
    }
}

/// Aggregate outcome of the most recent assignment run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub total_players: usize,
    pub total_teams: usize,
    pub assigned_players: usize,
    pub coach_kids: usize,
    pub smallest_roster: usize,
    pub largest_roster: usize,
    pub avg_roster_size: f64,
    pub avg_travel_distance: f64,
    pub max_travel_distance: f64,
    /// Per-assigned-player travel distances, for histogram views.
    pub travel_distance_samples: Vec<f64>,
}
