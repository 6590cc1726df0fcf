use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable constant of the simulation.
///
/// Stored with the world so a snapshot replays under the numbers it was
/// generated with. Each section falls back to its defaults, so a TOML file
/// only needs to name the values it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub tick: TickBalance,
    pub rng: RngBalance,
    pub geography: GeographyBalance,
    pub economy: EconomyBalance,
    pub morale: MoraleBalance,
    pub innovation: InnovationBalance,
    pub soft_power: SoftPowerWeights,
    pub military: MilitaryBalance,
    pub colonization: ColonizationBalance,
    pub trade: TradeBalance,
    pub diplomacy: DiplomacyBalance,
    pub events: EventBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickBalance {
    pub event_base_cooldown: u32,
    pub summary_interval: u32,
    pub convoy_speed: f64,
    pub blocked_convoy_speed: f64,
    pub log_capacity: usize,
}

impl Default for TickBalance {
    fn default() -> Self {
        Self {
            event_base_cooldown: 40,
            summary_interval: 3,
            convoy_speed: 0.0025,
            blocked_convoy_speed: 0.3,
            log_capacity: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RngBalance {
    pub base_randomness: f64,
    pub battle_swing: f64,
    pub trade_variance: f64,
}

impl Default for RngBalance {
    fn default() -> Self {
        Self {
            base_randomness: 0.20,
            battle_swing: 0.15,
            trade_variance: 0.08,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeographyBalance {
    pub grid_width: i32,
    pub grid_height: i32,
    pub resources_per_type: u32,
    pub placement_retries: u32,
    pub capital_min_distance: u32,
    pub capital_placement_tries: u32,
    pub expansion_passes: u32,
    pub expansion_chance: f64,
    pub strait_enclosing_neighbors: usize,
}

impl Default for GeographyBalance {
    fn default() -> Self {
        Self {
            grid_width: 42,
            grid_height: 28,
            resources_per_type: 6,
            placement_retries: 10_000,
            capital_min_distance: 7,
            capital_placement_tries: 500,
            expansion_passes: 10,
            expansion_chance: 0.2,
            strait_enclosing_neighbors: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProsperityWeights {
    pub agriculture: f64,
    pub industry: f64,
    pub trade: f64,
    pub resources: f64,
    pub infrastructure: f64,
    pub law: f64,
    pub health: f64,
}

impl Default for ProsperityWeights {
    fn default() -> Self {
        Self {
            agriculture: 0.22,
            industry: 0.20,
            trade: 0.22,
            resources: 0.10,
            infrastructure: 0.12,
            law: 0.07,
            health: 0.07,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyBalance {
    pub prosperity_weights: ProsperityWeights,
    pub war_penalty_base: f64,
    pub war_penalty_per_exhaustion: f64,
    pub peace_penalty_per_exhaustion: f64,
    pub tax_income_per_point: f64,
    pub trade_to_treasury: f64,
    pub patronage_drain: f64,
    pub army_upkeep: f64,
    pub base_treasury: f64,
    pub treasury_ceiling: f64,
    pub ironwood_army_bonus: f64,
    pub sky_amber_navy_bonus: f64,
}

impl Default for EconomyBalance {
    fn default() -> Self {
        Self {
            prosperity_weights: ProsperityWeights::default(),
            war_penalty_base: 10.0,
            war_penalty_per_exhaustion: 0.6,
            peace_penalty_per_exhaustion: 0.3,
            tax_income_per_point: 0.18,
            trade_to_treasury: 0.5,
            patronage_drain: 0.03,
            army_upkeep: 0.005,
            base_treasury: 300.0,
            treasury_ceiling: 9999.0,
            ironwood_army_bonus: 0.12,
            sky_amber_navy_bonus: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoraleBalance {
    pub cohesion: f64,
    pub law: f64,
    pub prosperity: f64,
    pub religious_unity: f64,
    pub patronage: f64,
    pub inequality: f64,
    pub rigidity: f64,
    pub tax: f64,
    pub religious_conflict: f64,
    pub war_exhaustion: f64,
    pub cohesion_penalty_from_centralization: f64,
    pub religious_conflict_factor: f64,
    pub intolerance_threshold: f64,
    pub intolerance_penalty: f64,
}

impl Default for MoraleBalance {
    fn default() -> Self {
        Self {
            cohesion: 0.25,
            law: 0.18,
            prosperity: 0.20,
            religious_unity: 0.10,
            patronage: 0.07,
            inequality: 0.14,
            rigidity: 0.08,
            tax: 0.06,
            religious_conflict: 0.10,
            war_exhaustion: 0.18,
            cohesion_penalty_from_centralization: 0.12,
            religious_conflict_factor: 0.05,
            intolerance_threshold: 40.0,
            intolerance_penalty: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InnovationBalance {
    pub literacy: f64,
    pub universities: f64,
    pub media: f64,
    pub trade: f64,
    pub urban: f64,
    pub tolerance: f64,
    pub rigidity_penalty: f64,
}

impl Default for InnovationBalance {
    fn default() -> Self {
        Self {
            literacy: 0.25,
            universities: 0.28,
            media: 0.15,
            trade: 0.10,
            urban: 0.12,
            tolerance: 0.10,
            rigidity_penalty: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftPowerWeights {
    pub culture: f64,
    pub diplomacy: f64,
    pub trade: f64,
    pub law: f64,
}

impl Default for SoftPowerWeights {
    fn default() -> Self {
        Self {
            culture: 0.40,
            diplomacy: 0.35,
            trade: 0.15,
            law: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilitaryBalance {
    pub supply_from_infra: f64,
    pub supply_from_law: f64,
    pub supply_from_health: f64,
    pub morale_from_stability: f64,
    pub morale_from_cohesion: f64,
    pub base_flip_chance: f64,
    pub winner_exhaustion: f64,
    pub loser_exhaustion: f64,
    pub exhaustion_rise_at_war: f64,
    pub exhaustion_recovery: f64,
}

impl Default for MilitaryBalance {
    fn default() -> Self {
        Self {
            supply_from_infra: 0.6,
            supply_from_law: 0.3,
            supply_from_health: 0.1,
            morale_from_stability: 0.65,
            morale_from_cohesion: 0.35,
            base_flip_chance: 0.08,
            winner_exhaustion: 1.5,
            loser_exhaustion: 2.0,
            exhaustion_rise_at_war: 0.35,
            exhaustion_recovery: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonizationBalance {
    pub colonize_ticks: u32,
    pub cost: f64,
    pub min_prosperity: f64,
    pub min_stability: f64,
    pub min_military: f64,
    pub launch_chance: f64,
    pub discovery_chance: f64,
}

impl Default for ColonizationBalance {
    fn default() -> Self {
        Self {
            colonize_ticks: 220,
            cost: 60.0,
            min_prosperity: 55.0,
            min_stability: 55.0,
            min_military: 40.0,
            launch_chance: 0.02,
            discovery_chance: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeBalance {
    pub sea_bonus_from_navy: f64,
    pub land_bonus_from_infra: f64,
    pub min_route_len: usize,
    pub convoy_dots: usize,
    pub blockade_penalty: f64,
    pub blocked_volume_share: f64,
    pub strait_margin: f64,
    pub max_throughput: f64,
    pub unowned_partner_value: f64,
    pub raider_strike_every: u64,
    pub pressure_to_raid: f64,
    pub raid_blockade_ticks: u64,
}

impl Default for TradeBalance {
    fn default() -> Self {
        Self {
            sea_bonus_from_navy: 0.5,
            land_bonus_from_infra: 0.5,
            min_route_len: 4,
            convoy_dots: 18,
            blockade_penalty: 0.60,
            blocked_volume_share: 0.2,
            strait_margin: 1.15,
            max_throughput: 1.8,
            unowned_partner_value: 60.0,
            raider_strike_every: 120,
            pressure_to_raid: 0.35,
            raid_blockade_ticks: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiplomacyBalance {
    pub alliance_guarantee: bool,
    pub alliance_pressure_threshold: f64,
    pub cascade_interval: u64,
}

impl Default for DiplomacyBalance {
    fn default() -> Self {
        Self {
            alliance_guarantee: true,
            alliance_pressure_threshold: 65.0,
            cascade_interval: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBalance {
    pub base_chance: f64,
    pub intensity_reference: f64,
}

impl Default for EventBalance {
    fn default() -> Self {
        Self {
            base_chance: 0.001,
            intensity_reference: 50.0,
        }
    }
}

impl Balance {
    /// Load tunables from a TOML file; missing sections keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let balance: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        balance.validate()?;
        Ok(balance)
    }

    /// Validate ranges. All violations are reported together.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.geography.grid_width <= 0 || self.geography.grid_height <= 0 {
            errors.push(format!(
                "grid dimensions must be > 0, got {}x{}",
                self.geography.grid_width, self.geography.grid_height
            ));
        }

        let probabilities = [
            ("rng.base_randomness", self.rng.base_randomness),
            ("geography.expansion_chance", self.geography.expansion_chance),
            ("military.base_flip_chance", self.military.base_flip_chance),
            ("colonization.launch_chance", self.colonization.launch_chance),
            ("colonization.discovery_chance", self.colonization.discovery_chance),
            ("trade.pressure_to_raid", self.trade.pressure_to_raid),
            ("trade.blockade_penalty", self.trade.blockade_penalty),
            ("trade.blocked_volume_share", self.trade.blocked_volume_share),
            ("events.base_chance", self.events.base_chance),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be 0.0-1.0, got {}", name, value));
            }
        }

        if self.trade.min_route_len < 2 {
            errors.push(format!(
                "trade.min_route_len must be >= 2, got {}",
                self.trade.min_route_len
            ));
        }
        if self.trade.convoy_dots == 0 {
            errors.push("trade.convoy_dots must be > 0".to_string());
        }
        if self.trade.strait_margin < 1.0 {
            errors.push(format!(
                "trade.strait_margin must be >= 1.0, got {}",
                self.trade.strait_margin
            ));
        }
        if self.trade.max_throughput <= 0.0 {
            errors.push(format!(
                "trade.max_throughput must be > 0.0, got {}",
                self.trade.max_throughput
            ));
        }
        if self.colonization.colonize_ticks == 0 {
            errors.push("colonization.colonize_ticks must be > 0".to_string());
        }
        if self.diplomacy.cascade_interval == 0 {
            errors.push("diplomacy.cascade_interval must be > 0".to_string());
        }
        if self.tick.summary_interval == 0 {
            errors.push("tick.summary_interval must be > 0".to_string());
        }
        if self.tick.event_base_cooldown == 0 {
            errors.push("tick.event_base_cooldown must be > 0".to_string());
        }
        if self.events.intensity_reference <= 0.0 {
            errors.push(format!(
                "events.intensity_reference must be > 0.0, got {}",
                self.events.intensity_reference
            ));
        }
        if self.economy.treasury_ceiling <= 0.0 {
            errors.push(format!(
                "economy.treasury_ceiling must be > 0.0, got {}",
                self.economy.treasury_ceiling
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        Balance::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml_str = r#"
[trade]
strait_margin = 1.3

[colonization]
colonize_ticks = 100
"#;
        let balance: Balance = toml::from_str(toml_str).unwrap();
        assert_eq!(balance.trade.strait_margin, 1.3);
        assert_eq!(balance.trade.min_route_len, 4);
        assert_eq!(balance.colonization.colonize_ticks, 100);
        assert_eq!(balance.colonization.cost, 60.0);
        assert_eq!(balance.geography.grid_width, 42);
        balance.validate().unwrap();
    }

    #[test]
    fn zero_grid_rejected() {
        let mut balance = Balance::default();
        balance.geography.grid_height = 0;
        let err = balance.validate().unwrap_err();
        assert!(err.contains("grid dimensions"), "Error: {}", err);
    }

    #[test]
    fn multiple_errors_reported_together() {
        let mut balance = Balance::default();
        balance.trade.strait_margin = 0.5;
        balance.events.base_chance = 2.0;
        balance.diplomacy.cascade_interval = 0;
        let err = balance.validate().unwrap_err();
        assert!(err.contains("strait_margin"));
        assert!(err.contains("events.base_chance"));
        assert!(err.contains("cascade_interval"));
    }

    #[test]
    fn from_file_valid() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            r#"
[diplomacy]
alliance_guarantee = false
alliance_pressure_threshold = 40.0
"#
        )
        .unwrap();
        let balance = Balance::from_file(tmpfile.path()).unwrap();
        assert!(!balance.diplomacy.alliance_guarantee);
        assert_eq!(balance.diplomacy.alliance_pressure_threshold, 40.0);
    }

    #[test]
    fn from_file_missing() {
        let err = Balance::from_file(Path::new("/nonexistent/balance.toml")).unwrap_err();
        assert!(err.contains("Cannot read"), "Error: {}", err);
    }

    #[test]
    fn from_file_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "[trade\nstrait_margin = ").unwrap();
        let err = Balance::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("Invalid TOML"), "Error: {}", err);
    }
}
