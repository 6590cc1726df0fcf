use std::collections::BTreeMap;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::balance::{Balance, GeographyBalance};
use crate::diplomacy::{DiplomacyLedger, RelationState};
use crate::events::EventCatalog;
use crate::simulation::rng::RandomSource;
use crate::trade::TradeNetwork;
use crate::world::hex::{CivId, Hex, HexId, HexKind, Resource};
use crate::world::log::EventLog;
use crate::world::map::HexMap;
use crate::world::preset::Preset;
use crate::world::topology::hex_id;
use crate::world::{WorldError, WorldState};

/// Build a world for a named preset with default balance and the built-in event catalog.
pub fn initialize(preset_id: &str, seed_text: &str) -> Result<WorldState, WorldError> {
    initialize_with(preset_id, seed_text, Balance::default(), EventCatalog::builtin())
}

/// Build a world for a named preset.
///
/// Fails before any generation on an unknown preset, a malformed seed, or bad
/// balance values; no partial world is returned.
pub fn initialize_with(
    preset_id: &str,
    seed_text: &str,
    balance: Balance,
    catalog: EventCatalog,
) -> Result<WorldState, WorldError> {
    validate_seed(seed_text)?;
    let preset =
        Preset::from_id(preset_id).ok_or_else(|| WorldError::UnknownPreset(preset_id.to_string()))?;
    let geo = &balance.geography;
    if geo.grid_width <= 0 || geo.grid_height <= 0 {
        return Err(WorldError::InvalidDimensions {
            width: geo.grid_width,
            height: geo.grid_height,
        });
    }
    balance.validate().map_err(WorldError::InvalidBalance)?;
    catalog.validate().map_err(WorldError::InvalidCatalog)?;

    let mut rng = RandomSource::new(seed_text);
    let mut map = generate_map(preset, geo, &mut rng);
    if map.land_count() == 0 {
        return Err(WorldError::NoLand);
    }

    let civs = preset.civilizations(balance.economy.base_treasury);
    let ids: Vec<CivId> = civs.iter().map(|c| c.id.clone()).collect();
    place_civilizations(&mut map, &ids, geo, &mut rng)?;

    let mut diplomacy = DiplomacyLedger::new();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            diplomacy.set_relation(a, b, RelationState::Peace, 0);
        }
    }
    for (a, b) in preset.alliances() {
        diplomacy.set_relation(&CivId::new(a), &CivId::new(b), RelationState::Alliance, 0);
    }

    let hi = ((rng.next_u32() as u64) << 32) | rng.next_u32() as u64;
    let lo = ((rng.next_u32() as u64) << 32) | rng.next_u32() as u64;
    let id = Uuid::from_u64_pair(hi, lo);

    let mut world = WorldState {
        id,
        preset,
        tick: 0,
        map,
        civs,
        diplomacy,
        trade: TradeNetwork::new(),
        colonizations: Vec::new(),
        modifiers: Vec::new(),
        cooldowns: BTreeMap::new(),
        log: EventLog::new(balance.tick.log_capacity),
        rng,
        randomness: balance.rng.base_randomness,
        alliance_guarantee: balance.diplomacy.alliance_guarantee,
        balance,
        catalog,
        last_raid_at: 0,
    };
    world.refresh_indices();
    world.refresh_trade();

    info!(
        world_id = %world.id,
        preset = %preset,
        seed = seed_text,
        hexes = world.map.len(),
        land = world.map.land_count(),
        straits = world.map.straits.len(),
        civilizations = world.civs.len(),
        routes = world.trade.routes.len(),
        "World initialized"
    );
    Ok(world)
}

/// Seeds must carry at least one visible character and no control characters.
pub fn validate_seed(seed_text: &str) -> Result<(), WorldError> {
    if seed_text.trim().is_empty() {
        return Err(WorldError::InvalidSeed(
            "seed must contain a non-whitespace character".to_string(),
        ));
    }
    if seed_text.chars().any(char::is_control) {
        return Err(WorldError::InvalidSeed(
            "seed must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Classify terrain, fringe the edge seas with shoals, mark straits and scatter resources.
///
/// Every land hex starts colonizable.
pub fn generate_map(preset: Preset, geo: &GeographyBalance, rng: &mut RandomSource) -> HexMap {
    let (w, h) = (geo.grid_width, geo.grid_height);
    let mut hexes = Vec::with_capacity((w * h) as usize);
    for r in 0..h {
        for q in 0..w {
            let mut kind = preset.classify(q, r, w, h);
            let on_edge = q == 0 || r == 0 || q == w - 1 || r == h - 1;
            if kind == HexKind::Sea && on_edge {
                kind = HexKind::Shoals;
            }
            hexes.push(Hex::new(hex_id(q, r, w as u32), q, r, kind));
        }
    }
    let mut map = HexMap::from_hexes(w as u32, h as u32, hexes);
    map.mark_straits(geo.strait_enclosing_neighbors);
    place_resources(&mut map, geo, rng);
    map
}

/// Round-robin resource kinds onto random land hexes without collision.
///
/// After `placement_retries` misses, the remainder fills free land in scan order.
fn place_resources(map: &mut HexMap, geo: &GeographyBalance, rng: &mut RandomSource) {
    let target = Resource::ALL.len() * geo.resources_per_type as usize;
    let last = map.len() as i64 - 1;
    let mut placed = 0usize;
    let mut attempts = 0u32;

    while placed < target && attempts < geo.placement_retries {
        attempts += 1;
        let id = rng.int_range(0, last) as HexId;
        let free = map
            .hex(id)
            .is_some_and(|h| h.is_land() && h.resource.is_none());
        if free {
            map.add_resource(id, Resource::ALL[placed % Resource::ALL.len()]);
            placed += 1;
        }
    }

    if placed < target {
        warn!(placed, target, attempts, "Resource placement retries exhausted, filling in scan order");
        let free: Vec<HexId> = map
            .hexes
            .iter()
            .filter(|h| h.is_land() && h.resource.is_none())
            .map(|h| h.id)
            .collect();
        for id in free.into_iter().take(target - placed) {
            map.add_resource(id, Resource::ALL[placed % Resource::ALL.len()]);
            placed += 1;
        }
    }
}

/// Any free coastal hex, else any free land hex, drawn at random.
fn fallback_capital_site(map: &HexMap, coastal: &[HexId], rng: &mut RandomSource) -> Option<HexId> {
    let free_coast: Vec<HexId> = coastal.iter().copied().filter(|&id| map.owner(id).is_none()).collect();
    if let Some(&id) = rng.pick(&free_coast) {
        return Some(id);
    }
    let free_land: Vec<HexId> = map
        .hexes
        .iter()
        .filter(|h| h.is_land() && h.owner.is_none())
        .map(|h| h.id)
        .collect();
    rng.pick(&free_land).copied()
}

/// Found one coastal capital per civilization, claim its land ring, then grow each
/// realm with a few random expansion passes.
pub fn place_civilizations(
    map: &mut HexMap,
    civs: &[CivId],
    geo: &GeographyBalance,
    rng: &mut RandomSource,
) -> Result<(), WorldError> {
    let candidates: Vec<HexId> = map
        .hexes
        .iter()
        .filter(|h| h.is_land() && map.has_sea_neighbor(h.id))
        .map(|h| h.id)
        .collect();
    let mut chosen: Vec<HexId> = Vec::with_capacity(civs.len());

    for civ in civs {
        let mut site = None;
        for _ in 0..geo.capital_placement_tries {
            let Some(&cand) = rng.pick(&candidates) else {
                break;
            };
            let spaced = chosen
                .iter()
                .all(|&other| map.hex_distance(cand, other) >= geo.capital_min_distance);
            if spaced && map.owner(cand).is_none() {
                site = Some(cand);
                break;
            }
        }
        let site = match site {
            Some(id) => id,
            None => {
                let fallback = fallback_capital_site(map, &candidates, rng)
                    .ok_or_else(|| WorldError::NoCapitalSite(civ.clone()))?;
                warn!(civ = %civ, hex = fallback, "Capital spacing not satisfiable, placed unconstrained");
                fallback
            }
        };

        map.set_capital(site, civ);
        chosen.push(site);
        let ring: Vec<HexId> = map.neighbors(site).to_vec();
        for nid in ring {
            if map.hexes[nid as usize].is_land() && map.owner(nid).is_none() {
                map.assign_owner(nid, civ);
            }
        }
    }

    for civ in civs {
        let mut frontier: Vec<HexId> = map.owned_by(civ).collect();
        for _ in 0..geo.expansion_passes {
            let Some(&base) = rng.pick(&frontier) else {
                break;
            };
            let ring: Vec<HexId> = map.neighbors(base).to_vec();
            for nid in ring {
                let open = map.hexes[nid as usize].is_land() && map.owner(nid).is_none();
                if open && rng.chance(geo.expansion_chance) {
                    map.assign_owner(nid, civ);
                    frontier.push(nid);
                }
            }
        }
    }
    Ok(())
}
