//! Random events, timed attribute modifiers, and convoy raids.
//!
//! Events are data: each has a trigger predicate over one civilization, odds
//! drawn after the trigger holds, a cooldown, and a list of effects. The
//! built-in catalog can be replaced by a TOML file with the same shape:
//!
//! ```toml
//! [[events]]
//! id = "schism"
//! title = "Doctrinal Schism"
//! category = "religion"
//! description = "Factions dispute orthodoxy, stressing unity."
//! cooldown = 90
//! trigger = { above = { attribute = "religion", threshold = 70.0 } }
//! odds = { fixed = { chance = 0.008 } }
//! effects = [{ modify = { attribute = "stability", delta = -8.0, duration = 60 } }]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::civ::{Attribute, Civilization};
use crate::world::hex::{CivId, HexId};
use crate::world::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Religion,
    Economy,
    Knowledge,
    Culture,
    Government,
    War,
    Outer,
    Diplomacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Always,
    Above { attribute: Attribute, threshold: f64 },
    Below { attribute: Attribute, threshold: f64 },
    All { of: Vec<Trigger> },
    /// Only the first civilization in world order.
    FirstCivilization,
}

impl Trigger {
    /// `index` is the civilization's position in world order.
    pub fn holds(&self, civ: &Civilization, index: usize) -> bool {
        match self {
            Trigger::Always => true,
            Trigger::Above { attribute, threshold } => civ.value(*attribute) > *threshold,
            Trigger::Below { attribute, threshold } => civ.value(*attribute) < *threshold,
            Trigger::All { of } => of.iter().all(|t| t.holds(civ, index)),
            Trigger::FirstCivilization => index == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Odds {
    Fixed { chance: f64 },
    /// Average external pressure divided by `divisor`.
    AveragePressure { divisor: f64 },
}

impl Odds {
    pub fn probability(&self, average_pressure: f64) -> f64 {
        match self {
            Odds::Fixed { chance } => *chance,
            Odds::AveragePressure { divisor } => average_pressure / divisor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Add `delta` to an attribute for `duration` ticks. On treasury the
    /// delta is paid once per tick instead.
    Modify { attribute: Attribute, delta: f64, duration: u64 },
    /// Block every outbound route of the civilization.
    Embargo { duration: u64 },
    Raid,
    /// End the oldest active war.
    ForcePeace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: String,
    pub title: String,
    pub category: EventCategory,
    #[serde(default)]
    pub description: String,
    pub trigger: Trigger,
    pub odds: Odds,
    /// Ticks before the event may fire again for the same civilization.
    /// Falls back to the balance default when absent.
    #[serde(default)]
    pub cooldown: Option<u64>,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCatalog {
    events: Vec<EventDefinition>,
}

/// A timed delta on one civilization attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub civ: CivId,
    pub attribute: Attribute,
    pub delta: f64,
    /// Applied each tick up to and including this one.
    pub expires_at: u64,
    /// Id of the event that created it.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiredEvent {
    pub civ: CivId,
    pub event: String,
    pub location: Option<HexId>,
}

fn modify(attribute: Attribute, delta: f64, duration: u64) -> Effect {
    Effect::Modify {
        attribute,
        delta,
        duration,
    }
}

fn above(attribute: Attribute, threshold: f64) -> Trigger {
    Trigger::Above {
        attribute,
        threshold,
    }
}

fn fixed(chance: f64) -> Odds {
    Odds::Fixed { chance }
}

#[allow(clippy::too_many_arguments)]
fn event(
    id: &str,
    title: &str,
    category: EventCategory,
    description: &str,
    trigger: Trigger,
    odds: Odds,
    cooldown: u64,
    effects: Vec<Effect>,
) -> EventDefinition {
    EventDefinition {
        id: id.to_string(),
        title: title.to_string(),
        category,
        description: description.to_string(),
        trigger,
        odds,
        cooldown: Some(cooldown),
        effects,
    }
}

impl EventCatalog {
    pub fn new(events: Vec<EventDefinition>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[EventDefinition] {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.id == id)
    }

    /// The sixteen stock events.
    pub fn builtin() -> Self {
        use Attribute::*;
        use EventCategory as C;
        Self::new(vec![
            event("schism", "Doctrinal Schism", C::Religion,
                "Factions dispute orthodoxy, stressing unity.",
                above(Religion, 70.0), fixed(0.008), 90,
                vec![modify(Stability, -8.0, 60)]),
            event("revival", "Religious Revival", C::Religion,
                "Pilgrimages and donations swell the faithful.",
                above(Religion, 60.0), fixed(0.03), 90,
                vec![modify(Stability, 6.0, 50), modify(Treasury, 40.0, 1)]),
            event("harvestFail", "Harvest Failure", C::Economy,
                "Poor rains cut the surplus.",
                above(Population, 30.0), fixed(0.025), 80,
                vec![modify(Prosperity, -10.0, 50)]),
            event("famineRelief", "Famine Relief", C::Economy,
                "Granaries opened; prices stabilized.",
                above(Treasury, 200.0), fixed(0.02), 80,
                vec![modify(Stability, 8.0, 40), modify(Treasury, -60.0, 1)]),
            event("industrialBoom", "Industrial Boom", C::Economy,
                "New workshops accelerate output.",
                above(Economy, 70.0), fixed(0.03), 120,
                vec![modify(Industry, 8.0, 90)]),
            event("mineCollapse", "Mine Collapse", C::Economy,
                "A major mine halts production.",
                Trigger::Always, fixed(0.02), 120,
                vec![modify(Resources, -12.0, 90)]),
            event("printingSurge", "Printing Surge", C::Knowledge,
                "Pamphlets spread ideas far and fast.",
                above(Knowledge, 65.0), fixed(0.03), 100,
                vec![modify(Knowledge, 6.0, 80), modify(Stability, -3.0, 50)]),
            event("censorship", "Censorship Drive", C::Knowledge,
                "Scribes seize texts deemed subversive.",
                above(Government, 70.0), fixed(0.02), 100,
                vec![modify(Knowledge, -8.0, 60), modify(Stability, -4.0, 40)]),
            event("goldenAge", "Golden Age", C::Culture,
                "Patrons sponsor a flowering of arts.",
                Trigger::All { of: vec![above(Culture, 70.0), above(Treasury, 300.0)] },
                fixed(0.02), 140,
                vec![modify(Culture, 10.0, 100), modify(Treasury, -80.0, 1)]),
            event("taxReform", "Tax Reform", C::Government,
                "Streamlined levies improve compliance.",
                above(Government, 65.0), fixed(0.03), 120,
                vec![modify(TaxCapacity, 10.0, 120)]),
            event("navalBlockade", "Naval Blockade", C::War,
                "Enemy squadrons interdict straits.",
                above(Military, 60.0), fixed(0.03), 130,
                vec![Effect::Embargo { duration: 70 }]),
            event("generalStrike", "General Strike", C::Economy,
                "Workers halt mills and ports.",
                Trigger::Below { attribute: Rigidity, threshold: 50.0 }, fixed(0.02), 120,
                vec![modify(Prosperity, -8.0, 60), modify(Stability, -6.0, 60)]),
            event("antiCorruption", "Anti-Corruption Drive", C::Government,
                "Audits and arrests deter graft.",
                above(Government, 60.0), fixed(0.03), 120,
                vec![modify(Government, 6.0, 100), modify(Stability, 4.0, 80)]),
            event("shoalsIncursion", "Outer Shoals Incursion", C::Outer,
                "Raiders strike convoys and coasts.",
                Trigger::FirstCivilization, Odds::AveragePressure { divisor: 500.0 }, 90,
                vec![Effect::Raid]),
            event("colonialUprising", "Colonial Uprising", C::War,
                "Resistance flares in overseas holdings.",
                Trigger::Always, fixed(0.02), 160,
                vec![modify(Stability, -6.0, 80)]),
            event("peaceConference", "Peace Conference", C::Diplomacy,
                "Envoys seek to end conflicts.",
                Trigger::Always, fixed(0.015), 200,
                vec![Effect::ForcePeace]),
        ])
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let catalog: Self = toml::from_str(content).map_err(|e| format!("Invalid event catalog TOML: {}", e))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// All violations are reported together.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();

        for ev in &self.events {
            if ev.id.trim().is_empty() {
                errors.push("event id must not be empty".to_string());
            } else if !seen.insert(ev.id.as_str()) {
                errors.push(format!("duplicate event id '{}'", ev.id));
            }
            match ev.odds {
                Odds::Fixed { chance } if !(0.0..=1.0).contains(&chance) => {
                    errors.push(format!("{}: chance must be within 0.0-1.0, got {}", ev.id, chance));
                }
                Odds::AveragePressure { divisor } if !(divisor.is_finite() && divisor > 0.0) => {
                    errors.push(format!("{}: pressure divisor must be > 0, got {}", ev.id, divisor));
                }
                _ => {}
            }
            if ev.cooldown == Some(0) {
                errors.push(format!("{}: cooldown must be > 0", ev.id));
            }
            if ev.effects.is_empty() {
                errors.push(format!("{}: at least one effect is required", ev.id));
            }
            for effect in &ev.effects {
                match effect {
                    Effect::Modify { duration: 0, .. } | Effect::Embargo { duration: 0 } => {
                        errors.push(format!("{}: effect duration must be > 0", ev.id));
                    }
                    Effect::Modify { delta, .. } if !delta.is_finite() => {
                        errors.push(format!("{}: effect delta must be finite", ev.id));
                    }
                    _ => {}
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

/// Fold active modifiers into each civilization's overlay, pay treasury
/// deltas, then drop modifiers whose last tick has passed.
pub fn apply_modifiers(world: &mut WorldState) {
    for civ in &mut world.civs {
        civ.overlay.clear();
    }
    let ceiling = world.balance.economy.treasury_ceiling;
    for m in &world.modifiers {
        let Some(civ) = world.civs.iter_mut().find(|c| c.id == m.civ) else {
            continue;
        };
        if m.attribute.is_stock() {
            civ.treasury = (civ.treasury + m.delta).clamp(0.0, ceiling);
        } else {
            *civ.overlay.entry(m.attribute).or_insert(0.0) += m.delta;
        }
    }
    let tick = world.tick;
    world.modifiers.retain(|m| tick < m.expires_at);
}

/// Roll every catalog event for every civilization.
///
/// Per pair: skip while on cooldown, draw against the intensity-scaled base
/// chance, test the trigger, then draw against the event's own odds.
pub fn run_events(world: &mut WorldState) -> Vec<FiredEvent> {
    let mut fired = Vec::new();
    let definitions = world.catalog.events().to_vec();
    let default_cooldown = u64::from(world.balance.tick.event_base_cooldown);

    for index in 0..world.civs.len() {
        let civ_id = world.civs[index].id.clone();
        let intensity = world.civs[index].value(Attribute::EventIntensity);
        let base = world.balance.events.base_chance * (intensity / world.balance.events.intensity_reference);

        for def in &definitions {
            let ready_at = world
                .cooldowns
                .get(&civ_id)
                .and_then(|m| m.get(&def.id))
                .copied()
                .unwrap_or(0);
            if world.tick < ready_at {
                continue;
            }
            if !world.rng.chance(base) || !def.trigger.holds(&world.civs[index], index) {
                continue;
            }
            let odds = def.odds.probability(world.average_pressure());
            if !world.rng.chance(odds) {
                continue;
            }

            let location = apply_event(world, &civ_id, def);
            let cooldown = def.cooldown.unwrap_or(default_cooldown);
            world
                .cooldowns
                .entry(civ_id.clone())
                .or_default()
                .insert(def.id.clone(), world.tick + cooldown);
            fired.push(FiredEvent {
                civ: civ_id.clone(),
                event: def.id.clone(),
                location,
            });
        }
    }
    fired
}

fn apply_event(world: &mut WorldState, civ: &CivId, def: &EventDefinition) -> Option<HexId> {
    let owned: Vec<HexId> = world.map.owned_by(civ).collect();
    let location = world.rng.pick(&owned).copied();
    info!(tick = world.tick, civ = %civ, event = %def.id, "Event fired");
    world.log_event(
        format!("{} ({})", def.title, civ),
        Some(def.description.clone()),
        location,
    );

    for effect in &def.effects {
        match effect {
            Effect::Modify {
                attribute,
                delta,
                duration,
            } => world.modifiers.push(Modifier {
                civ: civ.clone(),
                attribute: *attribute,
                delta: *delta,
                expires_at: world.tick + duration,
                source: def.id.clone(),
            }),
            Effect::Embargo { duration } => {
                world.trade.embargo(civ, world.tick + duration);
            }
            Effect::Raid => {
                raid(world);
            }
            Effect::ForcePeace => {
                if let Some(war) = world.wars().first().cloned() {
                    world.make_peace(&war.a, &war.b);
                }
            }
        }
    }
    location
}

/// Raiders strike a random sea route. Returns the route index and blockade hex.
pub fn raid(world: &mut WorldState) -> Option<(usize, HexId)> {
    let duration = world.balance.trade.raid_blockade_ticks;
    let struck = world.trade.raid(&world.map, &mut world.rng, world.tick, duration);
    match struck {
        Some((route, hex)) => {
            info!(tick = world.tick, route, hex, "Raiders disrupted a convoy lane");
            world.log_event("Raiders disrupted a convoy lane.".to_string(), None, Some(hex));
        }
        None => debug!(tick = world.tick, "Raid found no sea route"),
    }
    struck
}

/// Pressure-driven raid, at most once per `raider_strike_every` ticks.
pub fn world_raid_check(world: &mut WorldState) -> Option<(usize, HexId)> {
    let t = &world.balance.trade;
    if world.tick.saturating_sub(world.last_raid_at) <= t.raider_strike_every {
        return None;
    }
    let chance = world.average_pressure() / 100.0 * t.pressure_to_raid;
    if !world.rng.chance(chance) {
        return None;
    }
    world.last_raid_at = world.tick;
    raid(world)
}
