use crate::matchmaker::{build_preferences, MatchError, Matchmaker};
use crate::types::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// League state and assignment driver.
#[derive(Serialize, Deserialize)]
pub struct Simulation {
    /// All players, in generation order.
    pub players: Vec<Entity>,
    /// All teams, in generation order.
    pub teams: Vec<Entity>,
    /// League configuration.
    pub config: LeagueConfig,
    /// Stats from the most recent assignment run.
    pub stats: AssignmentStats,
    /// Next id, shared by players and teams so ids never collide.
    next_entity_id: usize,
    /// Random number generator seed.
    rng_seed: u64,
}

impl Simulation {
    /// Create an empty league with the given config and seed.
    pub fn new(config: LeagueConfig, seed: u64) -> Self {
        Self {
            players: Vec::new(),
            teams: Vec::new(),
            config,
            stats: AssignmentStats::default(),
            next_entity_id: 1,
            rng_seed: seed,
        }
    }

    /// Sample a location scattered around the field center: radius drawn
    /// from a normal distribution, direction uniform.
    fn radial_location(&self, spread: f64, rng: &mut StdRng) -> Point {
        let radius = match Normal::new(0.0, spread) {
            Ok(normal) => normal.sample(rng),
            // A negative or non-finite spread degenerates to the center.
            Err(_) => 0.0,
        };
        let theta = rng.gen::<f64>() * 2.0 * PI;
        Point::new(
            self.config.field_center.x + radius * theta.cos(),
            self.config.field_center.y + radius * theta.sin(),
        )
    }

    /// Generate `count` players around the field center.
    pub fn generate_players(&mut self, count: usize) {
        let mut rng =
            StdRng::seed_from_u64(self.rng_seed.wrapping_add(self.next_entity_id as u64));
        for _ in 0..count {
            let number = self.players.len() + 1;
            let location = self.radial_location(self.config.player_spread, &mut rng);
            let player = Entity::player(self.next_entity_id, format!("Player {}", number), location);
            self.next_entity_id += 1;
            self.players.push(player);
        }
        self.update_stats();
    }

    /// Generate `count` teams around the field center, with the config's
    /// roster bounds.
    pub fn generate_teams(&mut self, count: usize) {
        let mut rng =
            StdRng::seed_from_u64(self.rng_seed.wrapping_add(self.next_entity_id as u64));
        for _ in 0..count {
            let number = self.teams.len() + 1;
            let location = self.radial_location(self.config.team_spread, &mut rng);
            let team = Entity::team(
                self.next_entity_id,
                format!("Team {}", number),
                location,
                self.config.min_roster_size,
                self.config.max_roster_size,
            );
            self.next_entity_id += 1;
            self.teams.push(team);
        }
        self.update_stats();
    }

    /// Generate a full league: players first, then teams.
    pub fn generate_league(&mut self, num_players: usize, num_teams: usize) {
        self.generate_players(num_players);
        self.generate_teams(num_teams);
    }

    /// Let each team claim one nearby player as its coach's kid before
    /// the open match. Candidates are drawn at random from the team's
    /// `coach_kid_pool` closest players; if every one of those is already
    /// claimed, the team takes its nearest unclaimed player instead.
    ///
    /// Requires built preferences. Returns how many kids were claimed.
    pub fn assign_coach_kids(&mut self) -> usize {
        let mut rng = StdRng::seed_from_u64(self.rng_seed.wrapping_add(1));
        let mut claimed = 0;

        for team_slot in 0..self.teams.len() {
            let team = &self.teams[team_slot];
            if team.coach_kid.is_some() || !team.has_room() {
                continue;
            }

            let mut pool: Vec<usize> = team
                .rankings
                .iter()
                .take(self.config.coach_kid_pool)
                .copied()
                .collect();
            pool.shuffle(&mut rng);

            let pick = pool
                .into_iter()
                .chain(team.rankings.iter().copied())
                .find(|&id| {
                    self.players
                        .iter()
                        .find(|p| p.id == id)
                        .map(|p| !p.is_assigned())
                        .unwrap_or(false)
                });

            if let Some(player_id) = pick {
                let team_id = self.teams[team_slot].id;
                if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
                    player.roster.push(team_id);
                    player.coach_kid = Some(team_id);
                }
                let team = &mut self.teams[team_slot];
                team.roster.push(player_id);
                team.coach_kid = Some(player_id);
                claimed += 1;
            }
        }

        self.update_stats();
        claimed
    }

    /// Run the whole assignment pipeline on the current league.
    ///
    /// Safe to call again after an error or a completed run: preferences
    /// are only derived once per population and settled players keep
    /// their teams.
    pub fn run_assignment(&mut self) -> Result<(), MatchError> {
        if self.players.is_empty() {
            return Err(MatchError::NoPlayers);
        }
        if self.teams.is_empty() {
            return Err(MatchError::NoTeams);
        }

        // Infeasible capacity is a config problem; report it before any
        // entity state changes.
        let capacity: usize = self.teams.iter().map(|t| t.max_roster_size).sum();
        if capacity < self.players.len() {
            return Err(MatchError::InsufficientCapacity {
                capacity,
                players: self.players.len(),
            });
        }

        // 1. Derive mutual proximity preferences
        if self.players.iter().all(|p| p.distances.is_empty()) {
            build_preferences(&mut self.players, &mut self.teams)?;
        }

        // 2. Coaches claim their kids ahead of the open match
        if self.config.assign_coach_kids {
            self.assign_coach_kids();
        }

        // 3. Deferred-acceptance match for everyone else
        let matchmaker = Matchmaker::new(self.config.clone());
        let outcome = matchmaker.run(&mut self.players, &mut self.teams);

        // 4. Refresh aggregate statistics, also for a partial run
        self.update_stats();
        outcome
    }

    /// Recompute aggregate stats from current rosters.
    fn update_stats(&mut self) {
        self.stats.total_players = self.players.len();
        self.stats.total_teams = self.teams.len();
        self.stats.assigned_players = self.players.iter().filter(|p| p.is_assigned()).count();
        self.stats.coach_kids = self.players.iter().filter(|p| p.coach_kid.is_some()).count();

        let roster_sizes: Vec<usize> = self.teams.iter().map(|t| t.roster.len()).collect();
        self.stats.smallest_roster = roster_sizes.iter().min().copied().unwrap_or(0);
        self.stats.largest_roster = roster_sizes.iter().max().copied().unwrap_or(0);
        self.stats.avg_roster_size = if roster_sizes.is_empty() {
            0.0
        } else {
            roster_sizes.iter().sum::<usize>() as f64 / roster_sizes.len() as f64
        };

        let mut samples = Vec::with_capacity(self.stats.assigned_players);
        for player in &self.players {
            if let Some(team_id) = player.assigned_team() {
                if let Some(team) = self.teams.iter().find(|t| t.id == team_id) {
                    samples.push(player.location.distance(&team.location));
                }
            }
        }
        self.stats.avg_travel_distance = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };
        self.stats.max_travel_distance = samples.iter().copied().fold(0.0, f64::max);
        self.stats.travel_distance_samples = samples;
    }

    /// Swap in a new config. Takes effect on the next generation, reset
    /// or assignment run.
    pub fn update_config(&mut self, config: LeagueConfig) {
        self.config = config;
    }

    /// Clear rosters, preferences and coach's kids, keeping the
    /// generated league. Team roster bounds are restamped from the
    /// config, so an updated config applies to the next run.
    pub fn reset_assignment(&mut self) {
        for entity in self.players.iter_mut().chain(self.teams.iter_mut()) {
            entity.roster.clear();
            entity.distances.clear();
            entity.rankings.clear();
            entity.coach_kid = None;
        }
        for team in self.teams.iter_mut() {
            team.min_roster_size = self.config.min_roster_size;
            team.max_roster_size = self.config.max_roster_size;
        }
        self.update_stats();
    }

    /// Current league state as JSON for the frontend.
    pub fn get_state_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Rebuild a simulation from a previously exported state.
    pub fn from_state_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
