//! Border battles between civilizations at war, and overseas colonization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::civ::indices;
use crate::civ::Attribute;
use crate::world::hex::{CivId, HexId, Resource};
use crate::world::WorldState;

/// An expedition in flight. The target stays out of the colonizable set until it lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colonization {
    pub civ: CivId,
    pub target: HexId,
    pub progress: u32,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub hex: HexId,
    pub winner: CivId,
    pub loser: CivId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColonyFounded {
    pub civ: CivId,
    pub hex: HexId,
    pub discovered: Option<Resource>,
}

/// Adjacent land hexes held by two civilizations at war, each unordered pair
/// once, lower hex id first, in scan order.
pub fn contested_pairs(world: &WorldState) -> Vec<(HexId, HexId)> {
    let map = &world.map;
    let mut pairs = Vec::new();
    for hex in &map.hexes {
        let Some(owner) = hex.owner.as_ref().filter(|_| hex.is_land()) else {
            continue;
        };
        for &nid in map.neighbors(hex.id) {
            if nid <= hex.id {
                continue;
            }
            if let Some(other) = map.owner(nid) {
                if other != owner && world.diplomacy.at_war(owner, other) {
                    pairs.push((hex.id, nid));
                }
            }
        }
    }
    pairs
}

fn battle_power(world: &WorldState, civ: &CivId, swing: f64) -> f64 {
    let morale = world
        .civ(civ)
        .map(|c| indices::morale_factor(c, &world.balance))
        .unwrap_or(0.0);
    world.effective_army(civ) * morale * (1.0 + swing)
}

/// One round of border fighting.
///
/// Each contested pair draws a swing for both sides and a flip roll. The
/// stronger side takes the other hex unless it is a capital; no hex changes
/// hands twice in one round.
pub fn resolve_battles(world: &mut WorldState) -> Vec<Capture> {
    let pairs = contested_pairs(world);
    let mut flipped: BTreeSet<HexId> = BTreeSet::new();
    let mut captures = Vec::new();
    let swing = world.balance.rng.battle_swing * world.randomness;

    for (a_id, b_id) in pairs {
        if flipped.contains(&a_id) || flipped.contains(&b_id) {
            continue;
        }
        let (Some(a_owner), Some(b_owner)) = (world.map.owner(a_id).cloned(), world.map.owner(b_id).cloned())
        else {
            continue;
        };
        if a_owner == b_owner {
            continue;
        }

        let u_a = world.rng.signed_unit();
        let u_b = world.rng.signed_unit();
        let p_a = battle_power(world, &a_owner, u_a * swing);
        let p_b = battle_power(world, &b_owner, u_b * swing);
        let ratio = p_a / (p_b + 1e-5);
        let flip_chance = world.balance.military.base_flip_chance * ratio.clamp(0.2, 5.0);
        if world.rng.draw() >= flip_chance {
            continue;
        }

        let (winner, loser, target) = if p_a > p_b {
            (a_owner, b_owner, b_id)
        } else {
            (b_owner, a_owner, a_id)
        };
        if world.map.hex(target).is_some_and(|h| h.capital) {
            debug!(tick = world.tick, hex = target, attacker = %winner, "Capital held");
            continue;
        }

        world.map.assign_owner(target, &winner);
        flipped.insert(target);
        let m = world.balance.military.clone();
        if let Some(c) = world.civ_mut(&winner) {
            c.war_exhaustion = (c.war_exhaustion + m.winner_exhaustion).clamp(0.0, 100.0);
        }
        if let Some(c) = world.civ_mut(&loser) {
            c.war_exhaustion = (c.war_exhaustion + m.loser_exhaustion).clamp(0.0, 100.0);
        }
        info!(tick = world.tick, hex = target, winner = %winner, loser = %loser, "Territory captured");
        world.log_event(
            format!("{} captured territory from {}.", winner, loser),
            None,
            Some(target),
        );
        captures.push(Capture {
            hex: target,
            winner,
            loser,
        });
    }

    if !captures.is_empty() {
        world.trade.mark_dirty();
    }
    captures
}

/// Nearest colonizable coastal land hex to `from`; the first found wins ties.
pub fn nearest_colony_site(world: &WorldState, from: HexId) -> Option<HexId> {
    let map = &world.map;
    let mut best: Option<(u32, HexId)> = None;
    for &id in &map.colonizable {
        if !map.hex(id).is_some_and(|h| h.is_land()) || !map.has_sea_neighbor(id) {
            continue;
        }
        let d = map.hex_distance(from, id);
        if best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, id));
        }
    }
    best.map(|(_, id)| id)
}

/// Prosperous, stable, solvent civilizations with an army occasionally send
/// an expedition to the nearest free coast. Returns the reserved targets.
pub fn launch_colonizations(world: &mut WorldState) -> Vec<(CivId, HexId)> {
    let c = world.balance.colonization.clone();
    let mut launched = Vec::new();
    for i in 0..world.civs.len() {
        let civ = &world.civs[i];
        let eligible = civ.value(Attribute::Prosperity) > c.min_prosperity
            && civ.value(Attribute::Stability) > c.min_stability
            && civ.treasury > c.cost
            && civ.value(Attribute::Military) > c.min_military;
        if !eligible || !world.rng.chance(c.launch_chance) {
            continue;
        }
        let id = world.civs[i].id.clone();
        let Some(capital) = world.map.capital_of(&id) else {
            continue;
        };
        let Some(target) = nearest_colony_site(world, capital) else {
            debug!(tick = world.tick, civ = %id, "No colony site left");
            continue;
        };
        world.civs[i].treasury -= c.cost;
        world.map.colonizable.remove(&target);
        world.colonizations.push(Colonization {
            civ: id.clone(),
            target,
            progress: 0,
            cost: c.cost,
        });
        info!(tick = world.tick, civ = %id, hex = target, "Colonial expedition launched");
        world.log_event(
            format!("{} launched a colonial expedition.", id),
            None,
            Some(target),
        );
        launched.push((id, target));
    }
    launched
}

/// Advance every expedition one tick and settle the ones that arrive.
pub fn progress_colonizations(world: &mut WorldState) -> Vec<ColonyFounded> {
    let ticks = world.balance.colonization.colonize_ticks;
    let discovery = world.balance.colonization.discovery_chance;
    let mut founded = Vec::new();
    let mut pending = std::mem::take(&mut world.colonizations);

    for col in &mut pending {
        col.progress += 1;
        if col.progress < ticks {
            continue;
        }
        world.map.assign_owner(col.target, &col.civ);
        info!(tick = world.tick, civ = %col.civ, hex = col.target, "Colony established");
        world.log_event(
            format!("{} established a colony.", col.civ),
            None,
            Some(col.target),
        );

        let mut discovered = None;
        let bare = world.map.hex(col.target).is_some_and(|h| h.resource.is_none());
        if bare && world.rng.chance(discovery) {
            if let Some(&resource) = world.rng.pick(&Resource::ALL) {
                world.map.add_resource(col.target, resource);
                world.log_event(
                    format!("{} discovered {} at the colony.", col.civ, resource.name()),
                    None,
                    Some(col.target),
                );
                discovered = Some(resource);
            }
        }
        founded.push(ColonyFounded {
            civ: col.civ.clone(),
            hex: col.target,
            discovered,
        });
    }

    pending.retain(|c| c.progress < ticks);
    world.colonizations = pending;
    if !founded.is_empty() {
        world.trade.mark_dirty();
    }
    founded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::fixtures::{close_the_gap, duel_world, HEIGHT, WIDTH};
    use crate::world::topology::hex_id;

    fn ids() -> (CivId, CivId) {
        (CivId::new("WST"), CivId::new("EST"))
    }

    #[test]
    fn no_contest_without_war() {
        let mut world = duel_world();
        close_the_gap(&mut world);
        assert!(contested_pairs(&world).is_empty());
    }

    #[test]
    fn contested_pairs_are_unique_borders() {
        let mut world = duel_world();
        close_the_gap(&mut world);
        let (west, east) = ids();
        world.force_war(&west, &east).unwrap();
        let pairs = contested_pairs(&world);
        assert!(!pairs.is_empty());
        let unique: BTreeSet<_> = pairs.iter().collect();
        assert_eq!(unique.len(), pairs.len());
        for &(a, b) in &pairs {
            assert!(a < b);
            assert!(world.map.are_adjacent(a, b));
            let (oa, ob) = (world.map.owner(a).unwrap(), world.map.owner(b).unwrap());
            assert!(world.diplomacy.at_war(oa, ob));
        }
    }

    #[test]
    fn stronger_side_captures_border_hexes() {
        let mut world = duel_world();
        close_the_gap(&mut world);
        let (west, east) = ids();
        world.set_attribute(&east, Attribute::Military, 10.0).unwrap();
        world.set_randomness(0.0).unwrap();
        world.force_war(&west, &east).unwrap();
        let east_before = world.map.owned_count(&east);

        let mut captures = Vec::new();
        for _ in 0..20 {
            world.tick += 1;
            captures.extend(resolve_battles(&mut world));
        }
        assert!(!captures.is_empty());
        assert!(captures.iter().all(|c| c.winner == west && c.loser == east));
        assert_eq!(world.map.owned_count(&east), east_before - captures.len());
        assert!(world.civ(&east).unwrap().war_exhaustion > world.civ(&west).unwrap().war_exhaustion);
        // capitals never change hands
        let east_cap = hex_id(9, 3, WIDTH);
        assert_eq!(world.map.owner(east_cap), Some(&east));
        assert!(world.trade.is_dirty());
        assert!(world.recent_log(1).next().unwrap().title.contains("captured"));
    }

    #[test]
    fn hexes_flip_at_most_once_per_round() {
        let mut world = duel_world();
        close_the_gap(&mut world);
        let (west, east) = ids();
        world.set_attribute(&east, Attribute::Military, 10.0).unwrap();
        world.force_war(&west, &east).unwrap();
        for _ in 0..10 {
            let captures = resolve_battles(&mut world);
            let hexes: BTreeSet<_> = captures.iter().map(|c| c.hex).collect();
            assert_eq!(hexes.len(), captures.len());
        }
    }

    #[test]
    fn nearest_site_is_coastal_and_free() {
        let world = duel_world();
        let site = nearest_colony_site(&world, hex_id(0, 3, WIDTH)).unwrap();
        // column 4 on the last land row is the closest coast to the west capital
        assert_eq!(site, hex_id(4, HEIGHT as i32 - 2, WIDTH));
        assert!(world.map.colonizable.contains(&site));
        assert!(world.map.has_sea_neighbor(site));
    }

    #[test]
    fn colonization_completes_after_full_duration() {
        let mut world = duel_world();
        let (west, _) = ids();
        let target = nearest_colony_site(&world, hex_id(0, 3, WIDTH)).unwrap();
        world.force_colonization(&west, target).unwrap();
        assert!(!world.map.colonizable.contains(&target));

        for _ in 0..219 {
            assert!(progress_colonizations(&mut world).is_empty());
        }
        assert_eq!(world.map.owner(target), None);
        assert_eq!(world.colonizations()[0].progress, 219);

        let founded = progress_colonizations(&mut world);
        assert_eq!(founded.len(), 1);
        assert_eq!(world.map.owner(target), Some(&west));
        assert!(world.colonizations().is_empty());
        assert!(!world.map.colonizable.contains(&target));
        if let Some(resource) = founded[0].discovered {
            assert_eq!(world.map.hexes[target as usize].resource, Some(resource));
            assert!(world.map.resource_hexes.contains(&target));
        }
    }

    #[test]
    fn launch_requires_thresholds() {
        let mut world = duel_world();
        for civ in &mut world.civs {
            civ.treasury = 10.0;
        }
        for _ in 0..500 {
            assert!(launch_colonizations(&mut world).is_empty());
        }
    }

    #[test]
    fn eligible_civilizations_eventually_launch() {
        let mut world = duel_world();
        world.balance.colonization.launch_chance = 1.0;
        world.balance.colonization.min_prosperity = 0.0;
        world.balance.colonization.min_stability = 0.0;
        let before: f64 = world.civs.iter().map(|c| c.treasury).sum();
        let launched = launch_colonizations(&mut world);
        assert_eq!(launched.len(), 2);
        let after: f64 = world.civs.iter().map(|c| c.treasury).sum();
        assert_eq!(before - after, 120.0);
        for (_, target) in &launched {
            assert!(!world.map.colonizable.contains(target));
        }
        assert_ne!(launched[0].1, launched[1].1);
    }
}
