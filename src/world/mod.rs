pub mod generation;
pub mod hex;
pub mod log;
pub mod map;
pub mod preset;
pub mod topology;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;
use uuid::Uuid;

use crate::civ::indices;
use crate::civ::{Attribute, Civilization};
use crate::config::balance::Balance;
use crate::conflict::Colonization;
use crate::diplomacy::{DiplomacyLedger, RelationState, War};
use crate::events::{EventCatalog, Modifier};
use crate::simulation::rng::RandomSource;
use crate::trade::{TradeNetwork, TradeRoute};

pub use generation::{initialize, initialize_with};
pub use hex::{CivId, Hex, HexId, HexKind, Resource};
pub use log::{EventLog, LogEntry};
pub use map::HexMap;
pub use preset::Preset;

#[derive(Debug, Clone, PartialEq)]
pub enum WorldError {
    UnknownPreset(String),
    InvalidSeed(String),
    InvalidDimensions { width: i32, height: i32 },
    InvalidBalance(String),
    InvalidCatalog(String),
    NoLand,
    NoCapitalSite(CivId),
    UnknownCivilization(CivId),
    UnknownHex(HexId),
    InvalidOverride { attribute: Attribute, reason: String },
    InvalidRandomness(f64),
    NotColonizable(HexId),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::UnknownPreset(id) => write!(
                f,
                "Unknown preset '{}' (expected one of: tess, we1914, bac1200)",
                id
            ),
            WorldError::InvalidSeed(reason) => write!(f, "Invalid seed: {}", reason),
            WorldError::InvalidDimensions { width, height } => {
                write!(f, "Grid dimensions must be > 0, got {}x{}", width, height)
            }
            WorldError::InvalidBalance(e) => write!(f, "Invalid balance:\n{}", e),
            WorldError::InvalidCatalog(e) => write!(f, "Invalid event catalog:\n{}", e),
            WorldError::NoLand => write!(f, "Generated map has no land"),
            WorldError::NoCapitalSite(civ) => {
                write!(f, "No coastal land left for the capital of {}", civ)
            }
            WorldError::UnknownCivilization(civ) => write!(f, "Unknown civilization '{}'", civ),
            WorldError::UnknownHex(id) => write!(f, "Hex {} is outside the map", id),
            WorldError::InvalidOverride { attribute, reason } => {
                write!(f, "Cannot set {}: {}", attribute, reason)
            }
            WorldError::InvalidRandomness(v) => {
                write!(f, "Randomness must be within 0.0-1.0, got {}", v)
            }
            WorldError::NotColonizable(id) => {
                write!(f, "Hex {} is not unowned, unreserved land", id)
            }
        }
    }
}

impl std::error::Error for WorldError {}

/// The whole simulation: geography, polities, relations, trade and pending effects.
///
/// Every operation takes this value explicitly; there is no ambient state.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub id: Uuid,
    pub preset: Preset,
    pub tick: u64,
    pub map: HexMap,
    pub civs: Vec<Civilization>,
    pub diplomacy: DiplomacyLedger,
    pub trade: TradeNetwork,
    pub colonizations: Vec<Colonization>,
    pub modifiers: Vec<Modifier>,
    /// civilization -> event id -> first tick the event may fire again
    pub cooldowns: BTreeMap<CivId, BTreeMap<String, u64>>,
    pub log: EventLog,
    pub rng: RandomSource,
    pub balance: Balance,
    pub catalog: EventCatalog,
    pub randomness: f64,
    pub alliance_guarantee: bool,
    pub last_raid_at: u64,
}

impl WorldState {
    // === Read accessors ===

    pub fn hex(&self, id: HexId) -> Option<&Hex> {
        self.map.hex(id)
    }

    pub fn civ(&self, id: &CivId) -> Option<&Civilization> {
        self.civs.iter().find(|c| &c.id == id)
    }

    pub(crate) fn civ_mut(&mut self, id: &CivId) -> Option<&mut Civilization> {
        self.civs.iter_mut().find(|c| &c.id == id)
    }

    pub fn civ_ids(&self) -> Vec<CivId> {
        self.civs.iter().map(|c| c.id.clone()).collect()
    }

    fn require_civ(&self, id: &CivId) -> Result<(), WorldError> {
        match self.civ(id) {
            Some(_) => Ok(()),
            None => Err(WorldError::UnknownCivilization(id.clone())),
        }
    }

    /// Relation between two civilizations; `None` when asked about itself.
    pub fn relation(&self, a: &CivId, b: &CivId) -> Option<RelationState> {
        self.diplomacy.relation(a, b)
    }

    pub fn routes(&self) -> &[TradeRoute] {
        &self.trade.routes
    }

    pub fn wars(&self) -> &[War] {
        self.diplomacy.wars()
    }

    pub fn colonizations(&self) -> &[Colonization] {
        &self.colonizations
    }

    pub fn recent_log(&self, n: usize) -> impl Iterator<Item = &LogEntry> {
        self.log.recent(n)
    }

    pub fn owned_resources(&self, civ: &CivId) -> BTreeSet<Resource> {
        self.map.owned_resources(civ)
    }

    pub fn effective_army(&self, civ: &CivId) -> f64 {
        self.civ(civ)
            .map(|c| indices::effective_army(c, &self.map.owned_resources(civ), &self.balance))
            .unwrap_or(0.0)
    }

    pub fn effective_navy(&self, civ: &CivId) -> f64 {
        self.civ(civ)
            .map(|c| indices::effective_navy(c, &self.map.owned_resources(civ), &self.balance))
            .unwrap_or(0.0)
    }

    pub(crate) fn navy_table(&self) -> BTreeMap<CivId, f64> {
        self.civs
            .iter()
            .map(|c| (c.id.clone(), self.effective_navy(&c.id)))
            .collect()
    }

    pub fn average_pressure(&self) -> f64 {
        if self.civs.is_empty() {
            return 0.0;
        }
        self.civs
            .iter()
            .map(|c| c.value(Attribute::ExternalPressure))
            .sum::<f64>()
            / self.civs.len() as f64
    }

    // === Internal bookkeeping ===

    pub(crate) fn log_event(&mut self, title: String, detail: Option<String>, location: Option<HexId>) {
        self.log.push(LogEntry {
            tick: self.tick,
            title,
            detail,
            location,
        });
    }

    /// Recompute prosperity, stability, innovation and soft power without
    /// touching treasury or war exhaustion.
    pub(crate) fn refresh_indices(&mut self) {
        for i in 0..self.civs.len() {
            let at_war = self.diplomacy.is_at_war(&self.civs[i].id);
            indices::refresh_indices(&mut self.civs[i], at_war, &self.balance);
        }
    }

    /// Rebuild routes if ownership or war state changed, then redo blockades.
    pub(crate) fn refresh_trade(&mut self) {
        if self.trade.is_dirty() {
            self.trade.rebuild(&self.map, &self.diplomacy, &self.balance.trade);
        }
        let navies = self.navy_table();
        self.trade
            .update_blockades(&self.map, self.tick, self.balance.trade.strait_margin, &navies);
    }

    pub(crate) fn declare_war(&mut self, a: &CivId, b: &CivId) -> bool {
        if !self.diplomacy.declare_war(a, b, self.tick) {
            return false;
        }
        info!(tick = self.tick, a = %a, b = %b, "War declared");
        let location = self.map.capital_of(a);
        self.log_event(format!("War declared between {} and {}.", a, b), None, location);
        self.trade.mark_dirty();
        true
    }

    pub(crate) fn make_peace(&mut self, a: &CivId, b: &CivId) -> bool {
        if !self.diplomacy.make_peace(a, b, self.tick) {
            return false;
        }
        info!(tick = self.tick, a = %a, b = %b, "Truce signed");
        let location = self.map.capital_of(a);
        self.log_event(format!("Truce signed by {} and {}.", a, b), None, location);
        self.trade.mark_dirty();
        true
    }

    // === Mutators for the surrounding application ===

    /// Set a civilization attribute to an explicit value, validated against
    /// the same bounds the formulas respect.
    pub fn set_attribute(&mut self, civ: &CivId, attribute: Attribute, value: f64) -> Result<(), WorldError> {
        self.require_civ(civ)?;
        let reject = |reason: String| WorldError::InvalidOverride { attribute, reason };
        if !value.is_finite() {
            return Err(reject(format!("value {} is not finite", value)));
        }
        if attribute.is_derived() {
            return Err(reject("derived each tick from other attributes".to_string()));
        }
        let max = if attribute.is_stock() {
            self.balance.economy.treasury_ceiling
        } else {
            100.0
        };
        if !(0.0..=max).contains(&value) {
            return Err(reject(format!("{} is outside 0-{}", value, max)));
        }
        if let Some(c) = self.civ_mut(civ) {
            c.set_base(attribute, value);
        }
        self.refresh_indices();
        Ok(())
    }

    pub fn set_alliance_guarantee(&mut self, enabled: bool) {
        self.alliance_guarantee = enabled;
    }

    pub fn set_randomness(&mut self, randomness: f64) -> Result<(), WorldError> {
        if !randomness.is_finite() || !(0.0..=1.0).contains(&randomness) {
            return Err(WorldError::InvalidRandomness(randomness));
        }
        self.randomness = randomness;
        Ok(())
    }

    /// Returns whether a new war started.
    pub fn force_war(&mut self, a: &CivId, b: &CivId) -> Result<bool, WorldError> {
        self.require_civ(a)?;
        self.require_civ(b)?;
        let started = self.declare_war(a, b);
        if started {
            self.refresh_trade();
        }
        Ok(started)
    }

    /// Returns whether a war ended.
    pub fn force_peace(&mut self, a: &CivId, b: &CivId) -> Result<bool, WorldError> {
        self.require_civ(a)?;
        self.require_civ(b)?;
        let ended = self.make_peace(a, b);
        if ended {
            self.refresh_trade();
        }
        Ok(ended)
    }

    /// Start an expedition from `civ` to `hex` at progress zero, bypassing the launch draw.
    pub fn force_colonization(&mut self, civ: &CivId, hex: HexId) -> Result<(), WorldError> {
        self.require_civ(civ)?;
        if self.map.hex(hex).is_none() {
            return Err(WorldError::UnknownHex(hex));
        }
        if !self.map.colonizable.contains(&hex) {
            return Err(WorldError::NotColonizable(hex));
        }
        let cost = self.balance.colonization.cost;
        let mut debited = 0.0;
        if let Some(c) = self.civ_mut(civ) {
            debited = cost.min(c.treasury);
            c.treasury -= debited;
        }
        self.map.colonizable.remove(&hex);
        self.colonizations.push(Colonization {
            civ: civ.clone(),
            target: hex,
            progress: 0,
            cost: debited,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldState {
        initialize("tess", "719-SUNDER").unwrap()
    }

    #[test]
    fn set_attribute_validates_bounds() {
        let mut w = world();
        let sal = CivId::new("SAL");
        w.set_attribute(&sal, Attribute::Military, 42.0).unwrap();
        assert_eq!(w.civ(&sal).unwrap().sectors.military, 42.0);

        assert!(matches!(
            w.set_attribute(&sal, Attribute::Military, 101.0),
            Err(WorldError::InvalidOverride { .. })
        ));
        assert!(matches!(
            w.set_attribute(&sal, Attribute::Knowledge, f64::NAN),
            Err(WorldError::InvalidOverride { .. })
        ));
        assert!(matches!(
            w.set_attribute(&sal, Attribute::Prosperity, 50.0),
            Err(WorldError::InvalidOverride { .. })
        ));
        assert!(matches!(
            w.set_attribute(&CivId::new("ZZZ"), Attribute::Military, 1.0),
            Err(WorldError::UnknownCivilization(_))
        ));
    }

    #[test]
    fn treasury_override_uses_ceiling() {
        let mut w = world();
        let sal = CivId::new("SAL");
        w.set_attribute(&sal, Attribute::Treasury, 5000.0).unwrap();
        assert_eq!(w.civ(&sal).unwrap().treasury, 5000.0);
        assert!(w.set_attribute(&sal, Attribute::Treasury, 10_000.0).is_err());
    }

    #[test]
    fn randomness_must_be_unit_interval() {
        let mut w = world();
        w.set_randomness(0.5).unwrap();
        assert_eq!(w.randomness, 0.5);
        assert!(w.set_randomness(1.5).is_err());
        assert!(w.set_randomness(f64::INFINITY).is_err());
    }

    #[test]
    fn force_war_and_peace_are_idempotent() {
        let mut w = world();
        let (a, b) = (CivId::new("SAL"), CivId::new("LYR"));
        assert!(w.force_war(&a, &b).unwrap());
        assert!(!w.force_war(&b, &a).unwrap());
        assert_eq!(w.relation(&a, &b), Some(RelationState::War));
        assert!(w.force_peace(&a, &b).unwrap());
        assert!(!w.force_peace(&a, &b).unwrap());
        assert_eq!(w.relation(&b, &a), Some(RelationState::Truce));
        assert!(w.wars().is_empty());
    }

    #[test]
    fn force_colonization_reserves_target() {
        let mut w = world();
        let civ = CivId::new("THO");
        let target = *w.map.colonizable.iter().next().unwrap();
        let before = w.civ(&civ).unwrap().treasury;
        w.force_colonization(&civ, target).unwrap();
        assert!(!w.map.colonizable.contains(&target));
        assert_eq!(w.colonizations().len(), 1);
        assert_eq!(w.civ(&civ).unwrap().treasury, before - 60.0);

        assert_eq!(
            w.force_colonization(&civ, target),
            Err(WorldError::NotColonizable(target))
        );
        let capital = w.map.capital_of(&civ).unwrap();
        assert_eq!(
            w.force_colonization(&civ, capital),
            Err(WorldError::NotColonizable(capital))
        );
    }

    #[test]
    fn war_is_logged_at_capital() {
        let mut w = world();
        let (a, b) = (CivId::new("KHA"), CivId::new("GLA"));
        w.force_war(&a, &b).unwrap();
        let last = w.recent_log(1).next().unwrap();
        assert!(last.title.contains("War declared"));
        assert_eq!(last.location, w.map.capital_of(&a));
    }
}
