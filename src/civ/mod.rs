pub mod indices;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::world::hex::CivId;

/// Slow-moving institutional attributes, each in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pillars {
    pub religion: f64,
    pub government: f64,
    pub economy: f64,
    pub knowledge: f64,
    pub culture: f64,
    pub social: f64,
    pub tolerance: f64,
    pub church_state: f64,
    pub media: f64,
    pub cohesion: f64,
    pub rigidity: f64,
    pub inequality: f64,
    pub centralization: f64,
}

/// Sector values, each in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sectors {
    pub population: f64,
    pub urbanization: f64,
    pub infrastructure: f64,
    pub health: f64,
    pub military: f64,
    pub aggression: f64,
    pub diplomacy: f64,
    pub resources: f64,
    pub trade_openness: f64,
    pub tax_capacity: f64,
    pub agriculture: f64,
    pub industry: f64,
}

/// Every civilization field an event effect or an external override can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Religion,
    Government,
    Economy,
    Knowledge,
    Culture,
    Social,
    Tolerance,
    ChurchState,
    Media,
    Cohesion,
    Rigidity,
    Inequality,
    Centralization,
    Population,
    Urbanization,
    Infrastructure,
    Health,
    Military,
    Aggression,
    Diplomacy,
    Resources,
    TradeOpenness,
    TaxCapacity,
    Agriculture,
    Industry,
    Prosperity,
    Stability,
    Treasury,
    ExternalPressure,
    EventIntensity,
}

impl Attribute {
    pub const ALL: [Attribute; 30] = [
        Attribute::Religion,
        Attribute::Government,
        Attribute::Economy,
        Attribute::Knowledge,
        Attribute::Culture,
        Attribute::Social,
        Attribute::Tolerance,
        Attribute::ChurchState,
        Attribute::Media,
        Attribute::Cohesion,
        Attribute::Rigidity,
        Attribute::Inequality,
        Attribute::Centralization,
        Attribute::Population,
        Attribute::Urbanization,
        Attribute::Infrastructure,
        Attribute::Health,
        Attribute::Military,
        Attribute::Aggression,
        Attribute::Diplomacy,
        Attribute::Resources,
        Attribute::TradeOpenness,
        Attribute::TaxCapacity,
        Attribute::Agriculture,
        Attribute::Industry,
        Attribute::Prosperity,
        Attribute::Stability,
        Attribute::Treasury,
        Attribute::ExternalPressure,
        Attribute::EventIntensity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Religion => "religion",
            Attribute::Government => "government",
            Attribute::Economy => "economy",
            Attribute::Knowledge => "knowledge",
            Attribute::Culture => "culture",
            Attribute::Social => "social",
            Attribute::Tolerance => "tolerance",
            Attribute::ChurchState => "church_state",
            Attribute::Media => "media",
            Attribute::Cohesion => "cohesion",
            Attribute::Rigidity => "rigidity",
            Attribute::Inequality => "inequality",
            Attribute::Centralization => "centralization",
            Attribute::Population => "population",
            Attribute::Urbanization => "urbanization",
            Attribute::Infrastructure => "infrastructure",
            Attribute::Health => "health",
            Attribute::Military => "military",
            Attribute::Aggression => "aggression",
            Attribute::Diplomacy => "diplomacy",
            Attribute::Resources => "resources",
            Attribute::TradeOpenness => "trade_openness",
            Attribute::TaxCapacity => "tax_capacity",
            Attribute::Agriculture => "agriculture",
            Attribute::Industry => "industry",
            Attribute::Prosperity => "prosperity",
            Attribute::Stability => "stability",
            Attribute::Treasury => "treasury",
            Attribute::ExternalPressure => "external_pressure",
            Attribute::EventIntensity => "event_intensity",
        }
    }

    /// Recomputed by the index formulas every tick rather than set directly.
    pub fn is_derived(self) -> bool {
        matches!(self, Attribute::Prosperity | Attribute::Stability)
    }

    /// A stock that modifiers add to, rather than an overlaid level.
    pub fn is_stock(self) -> bool {
        self == Attribute::Treasury
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| format!("unknown attribute '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Civilization {
    pub id: CivId,
    pub name: String,
    pub color: String,
    pub motto: String,
    pub pillars: Pillars,
    pub sectors: Sectors,
    pub external_pressure: f64,
    pub event_intensity: f64,
    pub prosperity: f64,
    pub stability: f64,
    pub innovation: f64,
    pub soft_power: f64,
    pub treasury: f64,
    pub war_exhaustion: f64,
    pub last_trade_volume: f64,
    /// Summed deltas of the modifiers active this tick.
    #[serde(default)]
    pub overlay: BTreeMap<Attribute, f64>,
}

impl Civilization {
    /// Stored value, before any modifier overlay.
    pub fn base(&self, attr: Attribute) -> f64 {
        let p = &self.pillars;
        let s = &self.sectors;
        match attr {
            Attribute::Religion => p.religion,
            Attribute::Government => p.government,
            Attribute::Economy => p.economy,
            Attribute::Knowledge => p.knowledge,
            Attribute::Culture => p.culture,
            Attribute::Social => p.social,
            Attribute::Tolerance => p.tolerance,
            Attribute::ChurchState => p.church_state,
            Attribute::Media => p.media,
            Attribute::Cohesion => p.cohesion,
            Attribute::Rigidity => p.rigidity,
            Attribute::Inequality => p.inequality,
            Attribute::Centralization => p.centralization,
            Attribute::Population => s.population,
            Attribute::Urbanization => s.urbanization,
            Attribute::Infrastructure => s.infrastructure,
            Attribute::Health => s.health,
            Attribute::Military => s.military,
            Attribute::Aggression => s.aggression,
            Attribute::Diplomacy => s.diplomacy,
            Attribute::Resources => s.resources,
            Attribute::TradeOpenness => s.trade_openness,
            Attribute::TaxCapacity => s.tax_capacity,
            Attribute::Agriculture => s.agriculture,
            Attribute::Industry => s.industry,
            Attribute::Prosperity => self.prosperity,
            Attribute::Stability => self.stability,
            Attribute::Treasury => self.treasury,
            Attribute::ExternalPressure => self.external_pressure,
            Attribute::EventIntensity => self.event_intensity,
        }
    }

    /// Value as the rest of the tick sees it: base plus active modifiers, clamped.
    pub fn value(&self, attr: Attribute) -> f64 {
        if attr.is_stock() {
            return self.treasury;
        }
        let delta = self.overlay.get(&attr).copied().unwrap_or(0.0);
        (self.base(attr) + delta).clamp(0.0, 100.0)
    }

    pub(crate) fn set_base(&mut self, attr: Attribute, value: f64) {
        let p = &mut self.pillars;
        let s = &mut self.sectors;
        let slot = match attr {
            Attribute::Religion => &mut p.religion,
            Attribute::Government => &mut p.government,
            Attribute::Economy => &mut p.economy,
            Attribute::Knowledge => &mut p.knowledge,
            Attribute::Culture => &mut p.culture,
            Attribute::Social => &mut p.social,
            Attribute::Tolerance => &mut p.tolerance,
            Attribute::ChurchState => &mut p.church_state,
            Attribute::Media => &mut p.media,
            Attribute::Cohesion => &mut p.cohesion,
            Attribute::Rigidity => &mut p.rigidity,
            Attribute::Inequality => &mut p.inequality,
            Attribute::Centralization => &mut p.centralization,
            Attribute::Population => &mut s.population,
            Attribute::Urbanization => &mut s.urbanization,
            Attribute::Infrastructure => &mut s.infrastructure,
            Attribute::Health => &mut s.health,
            Attribute::Military => &mut s.military,
            Attribute::Aggression => &mut s.aggression,
            Attribute::Diplomacy => &mut s.diplomacy,
            Attribute::Resources => &mut s.resources,
            Attribute::TradeOpenness => &mut s.trade_openness,
            Attribute::TaxCapacity => &mut s.tax_capacity,
            Attribute::Agriculture => &mut s.agriculture,
            Attribute::Industry => &mut s.industry,
            Attribute::Prosperity => &mut self.prosperity,
            Attribute::Stability => &mut self.stability,
            Attribute::Treasury => &mut self.treasury,
            Attribute::ExternalPressure => &mut self.external_pressure,
            Attribute::EventIntensity => &mut self.event_intensity,
        };
        *slot = value;
    }
}
