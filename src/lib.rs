mod matchmaker;
mod simulation;
mod types;

use simulation::Simulation;
use types::*;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"league roster engine loaded".into());
}

/// WASM-exposed simulation wrapper
#[wasm_bindgen]
pub struct SimulationEngine {
    sim: Simulation,
}

#[wasm_bindgen]
impl SimulationEngine {
    /// Create a new empty league with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> SimulationEngine {
        let config = LeagueConfig::default();
        SimulationEngine {
            sim: Simulation::new(config, seed),
        }
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<SimulationEngine, JsValue> {
        let config: LeagueConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        Ok(SimulationEngine {
            sim: Simulation::new(config, seed),
        })
    }

    /// Restore an engine from an exported state
    pub fn load_state(state_json: &str) -> Result<SimulationEngine, JsValue> {
        let sim = Simulation::from_state_json(state_json)
            .map_err(|e| JsValue::from_str(&format!("State parse error: {}", e)))?;
        Ok(SimulationEngine { sim })
    }

    /// Generate players around the field center
    pub fn generate_players(&mut self, count: usize) {
        self.sim.generate_players(count);
    }

    /// Generate teams around the field center
    pub fn generate_teams(&mut self, count: usize) {
        self.sim.generate_teams(count);
    }

    /// Generate a full league
    pub fn generate_league(&mut self, num_players: usize, num_teams: usize) {
        self.sim.generate_league(num_players, num_teams);
    }

    /// Run the full assignment pipeline
    pub fn run_assignment(&mut self) -> Result<(), JsValue> {
        self.sim
            .run_assignment()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Clear rosters and preferences, keeping the league
    pub fn reset_assignment(&mut self) {
        self.sim.reset_assignment();
    }

    /// Get current league state as JSON
    pub fn get_state(&self) -> String {
        self.sim.get_state_json()
    }

    /// Get total players
    pub fn get_total_players(&self) -> usize {
        self.sim.players.len()
    }

    /// Get total teams
    pub fn get_total_teams(&self) -> usize {
        self.sim.teams.len()
    }

    /// Get statistics JSON
    pub fn get_stats(&self) -> String {
        serde_json::to_string(&self.sim.stats).unwrap_or_default()
    }

    /// Get players as JSON (for map views)
    pub fn get_players(&self) -> String {
        let players: Vec<_> = self
            .sim
            .players
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "name": p.name,
                    "x": p.location.x,
                    "y": p.location.y,
                    "team": p.assigned_team(),
                    "coach_kid": p.coach_kid.is_some(),
                })
            })
            .collect();
        serde_json::to_string(&players).unwrap_or_default()
    }

    /// Get teams as JSON (for map views)
    pub fn get_teams(&self) -> String {
        let teams: Vec<_> = self
            .sim
            .teams
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "x": t.location.x,
                    "y": t.location.y,
                    "roster_size": t.roster.len(),
                    "max_roster_size": t.max_roster_size,
                    "coach_kid": t.coach_kid,
                })
            })
            .collect();
        serde_json::to_string(&teams).unwrap_or_default()
    }

    /// Get rosters as JSON (for the assignment board)
    pub fn get_rosters(&self) -> String {
        let rosters: Vec<_> = self
            .sim
            .teams
            .iter()
            .map(|team| {
                let members: Vec<_> = team
                    .roster
                    .iter()
                    .map(|&player_id| {
                        let name = self
                            .sim
                            .players
                            .iter()
                            .find(|p| p.id == player_id)
                            .map(|p| p.name.clone())
                            .unwrap_or_default();
                        serde_json::json!({
                            "id": player_id,
                            "name": name,
                            "coach_kid": team.coach_kid == Some(player_id),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "team_id": team.id,
                    "team_name": team.name,
                    "members": members,
                })
            })
            .collect();
        serde_json::to_string(&rosters).unwrap_or_default()
    }

    /// Get travel distance histogram (for visualization)
    pub fn get_travel_distance_histogram(&self, num_bins: usize) -> String {
        let samples = &self.sim.stats.travel_distance_samples;
        if samples.is_empty() || num_bins == 0 {
            return "[]".to_string();
        }

        let max_distance = samples.iter().cloned().fold(0.0_f64, f64::max);
        let bin_width = (max_distance / num_bins as f64).max(1.0);

        let mut bins = vec![0usize; num_bins];
        for &sample in samples {
            let bin = ((sample / bin_width) as usize).min(num_bins - 1);
            bins[bin] += 1;
        }

        let histogram: Vec<_> = bins
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                serde_json::json!({
                    "bin_start": i as f64 * bin_width,
                    "bin_end": (i + 1) as f64 * bin_width,
                    "count": count,
                })
            })
            .collect();

        serde_json::to_string(&histogram).unwrap_or_default()
    }

    /// Update league config
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config: LeagueConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        self.sim.update_config(config);
        Ok(())
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&LeagueConfig::default()).unwrap_or_default()
    }
}

/// Run a parameter sweep experiment
#[wasm_bindgen]
pub fn run_experiment(
    base_config_json: &str,
    parameter: &str,
    values_json: &str,
    num_players: usize,
    num_teams: usize,
    seed: u64,
) -> Result<String, JsValue> {
    let base_config: LeagueConfig = serde_json::from_str(base_config_json)
        .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;

    let values: Vec<f64> = serde_json::from_str(values_json)
        .map_err(|e| JsValue::from_str(&format!("Values parse error: {}", e)))?;

    let mut results = Vec::new();

    for (i, &value) in values.iter().enumerate() {
        let mut config = base_config.clone();

        // Update the specified parameter
        match parameter {
            "player_spread" => config.player_spread = value,
            "team_spread" => config.team_spread = value,
            "min_roster_size" => config.min_roster_size = value as usize,
            "max_roster_size" => config.max_roster_size = value as usize,
            "coach_kid_pool" => config.coach_kid_pool = value as usize,
            _ => {
                return Err(JsValue::from_str(&format!("Unknown parameter: {}", parameter)));
            }
        }

        let started = js_sys::Date::now();
        let mut sim = Simulation::new(config, seed + i as u64);
        sim.generate_league(num_players, num_teams);
        let outcome = sim.run_assignment();

        results.push(serde_json::json!({
            "parameter_value": value,
            "assigned_players": sim.stats.assigned_players,
            "coach_kids": sim.stats.coach_kids,
            "avg_travel_distance": sim.stats.avg_travel_distance,
            "max_travel_distance": sim.stats.max_travel_distance,
            "smallest_roster": sim.stats.smallest_roster,
            "largest_roster": sim.stats.largest_roster,
            "elapsed_ms": js_sys::Date::now() - started,
            "error": outcome.err().map(|e| e.to_string()),
        }));
    }

    serde_json::to_string(&results)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Compare two configs on the same league layout
#[wasm_bindgen]
pub fn compare_configs(
    config_a_json: &str,
    config_b_json: &str,
    num_players: usize,
    num_teams: usize,
    seed: u64,
) -> Result<String, JsValue> {
    let config_a: LeagueConfig = serde_json::from_str(config_a_json)
        .map_err(|e| JsValue::from_str(&format!("Config A parse error: {}", e)))?;
    let config_b: LeagueConfig = serde_json::from_str(config_b_json)
        .map_err(|e| JsValue::from_str(&format!("Config B parse error: {}", e)))?;

    // Run league A
    let mut sim_a = Simulation::new(config_a, seed);
    sim_a.generate_league(num_players, num_teams);
    let outcome_a = sim_a.run_assignment();

    // Run league B
    let mut sim_b = Simulation::new(config_b, seed);
    sim_b.generate_league(num_players, num_teams);
    let outcome_b = sim_b.run_assignment();

    let comparison = serde_json::json!({
        "config_a": {
            "stats": sim_a.stats,
            "error": outcome_a.err().map(|e| e.to_string()),
        },
        "config_b": {
            "stats": sim_b.stats,
            "error": outcome_b.err().map(|e| e.to_string()),
        }
    });

    serde_json::to_string(&comparison)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
