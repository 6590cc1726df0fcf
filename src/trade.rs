use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::civ::{Attribute, Civilization};
use crate::config::balance::{Balance, TradeBalance};
use crate::diplomacy::DiplomacyLedger;
use crate::simulation::rng::RandomSource;
use crate::world::hex::{CivId, HexId, Resource};
use crate::world::map::HexMap;
use crate::world::topology::PathMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Land,
    Sea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockadeCause {
    /// A dominant foreign navy holds a strait on the path.
    Strait,
    Raid,
    Embargo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blockade {
    pub hex: HexId,
    pub cause: BlockadeCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvoyMarker {
    /// Fraction of the path travelled, in [0, 1).
    pub position: f64,
    pub raided: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cargo {
    Mixed,
    Goods(Resource),
}

/// Identity of a route across wholesale recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub kind: RouteKind,
    pub origin: HexId,
    pub destination: HexId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRoute {
    pub kind: RouteKind,
    pub origin: HexId,
    pub destination: HexId,
    /// Origin first, destination last; consecutive hexes are adjacent.
    pub path: Vec<HexId>,
    pub origin_owner: CivId,
    pub destination_owner: Option<CivId>,
    pub blockade: Option<Blockade>,
    pub convoys: Vec<ConvoyMarker>,
    pub cargo: Cargo,
    /// Last computed throughput, before the blocked-volume share.
    pub throughput: f64,
}

impl TradeRoute {
    pub fn key(&self) -> RouteKey {
        RouteKey {
            kind: self.kind,
            origin: self.origin,
            destination: self.destination,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blockade.is_some()
    }

    fn block(&mut self, hex: HexId, cause: BlockadeCause) {
        self.blockade = Some(Blockade { hex, cause });
    }
}

/// A raid-imposed blockade that outlives route recomputation until `until`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDisruption {
    pub route: RouteKey,
    pub hex: HexId,
    pub until: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeNetwork {
    pub routes: Vec<TradeRoute>,
    pub disruptions: Vec<TradeDisruption>,
    /// civilization -> tick its outbound routes reopen
    pub embargoes: BTreeMap<CivId, u64>,
    dirty: bool,
}

impl Default for TradeNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn convoy_markers(count: usize) -> Vec<ConvoyMarker> {
    (0..count)
        .map(|i| ConvoyMarker {
            position: i as f64 / count as f64,
            raided: false,
        })
        .collect()
}

fn splice(head: HexId, middle: Vec<HexId>, tail: HexId) -> Vec<HexId> {
    let mut path = Vec::with_capacity(middle.len() + 2);
    path.push(head);
    path.extend(middle);
    path.push(tail);
    path
}

/// Every route the current map and war state allow.
///
/// Capital pairs not at war trade by sea when both capitals touch water. Each
/// capital also reaches every resource hex overland, or by sea when the
/// overland path is missing or too short. Short sea legs are dropped.
pub fn compute_routes(map: &HexMap, diplomacy: &DiplomacyLedger, bal: &TradeBalance) -> Vec<TradeRoute> {
    let mut routes = Vec::new();
    let capitals: Vec<(&CivId, HexId)> = map.capitals.iter().map(|(c, &h)| (c, h)).collect();
    let new_route = |kind, origin, destination, path, origin_owner: &CivId, destination_owner, cargo| TradeRoute {
        kind,
        origin,
        destination,
        path,
        origin_owner: origin_owner.clone(),
        destination_owner,
        blockade: None,
        convoys: convoy_markers(bal.convoy_dots),
        cargo,
        throughput: 0.0,
    };

    for &(civ_a, cap_a) in &capitals {
        for &(civ_b, cap_b) in &capitals {
            if cap_a == cap_b || diplomacy.at_war(civ_a, civ_b) {
                continue;
            }
            let (Some(sea_a), Some(sea_b)) =
                (map.first_water_neighbor(cap_a), map.first_water_neighbor(cap_b))
            else {
                continue;
            };
            if let Some(leg) = map.pathfind(sea_a, sea_b, PathMode::Sea) {
                if leg.len() >= bal.min_route_len {
                    routes.push(new_route(
                        RouteKind::Sea,
                        cap_a,
                        cap_b,
                        splice(cap_a, leg, cap_b),
                        civ_a,
                        Some(civ_b.clone()),
                        Cargo::Mixed,
                    ));
                }
            }
        }
    }

    for &(civ, cap) in &capitals {
        for &res in &map.resource_hexes {
            let Some(hex) = map.hex(res) else { continue };
            if !hex.is_land() {
                continue;
            }
            let cargo = hex.resource.map_or(Cargo::Mixed, Cargo::Goods);
            let overland = map
                .pathfind(cap, res, PathMode::Land)
                .filter(|p| p.len() >= bal.min_route_len);
            let found = match overland {
                Some(path) => Some((RouteKind::Land, path)),
                None => {
                    let sea_leg = match (map.first_water_neighbor(cap), map.first_water_neighbor(res)) {
                        (Some(from), Some(to)) => map.pathfind(from, to, PathMode::Sea),
                        _ => None,
                    };
                    sea_leg
                        .filter(|leg| leg.len() >= bal.min_route_len)
                        .map(|leg| (RouteKind::Sea, splice(cap, leg, res)))
                }
            };
            if let Some((kind, path)) = found {
                routes.push(new_route(kind, cap, res, path, civ, hex.owner.clone(), cargo));
            }
        }
    }
    routes
}

/// One throughput sample for a route. Always consumes exactly one draw.
pub fn route_throughput(
    route: &TradeRoute,
    civs: &[Civilization],
    navies: &BTreeMap<CivId, f64>,
    balance: &Balance,
    randomness: f64,
    rng: &mut RandomSource,
) -> f64 {
    let noise = rng.signed_unit();
    let find = |id: &CivId| civs.iter().find(|c| &c.id == id);
    let Some(a) = find(&route.origin_owner) else {
        return 0.0;
    };
    let b = route.destination_owner.as_ref().and_then(|id| find(id));
    let t = &balance.trade;
    let partner = |attr: Attribute| b.map_or(t.unowned_partner_value, |c| c.value(attr));

    let base = (a.value(Attribute::TradeOpenness) + partner(Attribute::TradeOpenness)) / 2.0 / 100.0;
    let infra = (a.value(Attribute::Infrastructure) + partner(Attribute::Infrastructure)) / 2.0 / 100.0;
    let stability = (a.value(Attribute::Stability) + partner(Attribute::Stability)) / 200.0;
    let type_bonus = match route.kind {
        RouteKind::Sea => {
            let navy = navies.get(&route.origin_owner).copied().unwrap_or(0.0);
            1.0 + t.sea_bonus_from_navy * navy / 100.0
        }
        RouteKind::Land => 1.0 + t.land_bonus_from_infra * a.value(Attribute::Infrastructure) / 100.0,
    };
    let blocked = if route.is_blocked() { t.blockade_penalty } else { 1.0 };
    let variance = 1.0 + noise * balance.rng.trade_variance * randomness;

    let value = base * (0.6 * infra + 0.4 * stability) * type_bonus * blocked * variance;
    if value.is_finite() {
        value.clamp(0.0, t.max_throughput)
    } else {
        0.0
    }
}

impl TradeNetwork {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            disruptions: Vec::new(),
            embargoes: BTreeMap::new(),
            dirty: true,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recompute every route. Convoy markers carry over for routes that survive.
    pub fn rebuild(&mut self, map: &HexMap, diplomacy: &DiplomacyLedger, bal: &TradeBalance) {
        let mut previous: BTreeMap<RouteKey, Vec<ConvoyMarker>> = self
            .routes
            .drain(..)
            .map(|r| (r.key(), r.convoys))
            .collect();
        self.routes = compute_routes(map, diplomacy, bal);
        for route in &mut self.routes {
            if let Some(convoys) = previous.remove(&route.key()) {
                route.convoys = convoys;
            }
        }
        self.dirty = false;
    }

    /// Clear blockades, then re-derive them: straits held by a dominant foreign
    /// navy first, then live raid disruptions, then embargoes.
    ///
    /// A route is blocked at one hex at most, and that hex always lies on its path.
    pub fn update_blockades(&mut self, map: &HexMap, tick: u64, margin: f64, navies: &BTreeMap<CivId, f64>) {
        self.disruptions.retain(|d| d.until > tick);
        self.embargoes.retain(|_, until| *until > tick);

        for route in &mut self.routes {
            route.blockade = None;
            if route.kind != RouteKind::Sea {
                continue;
            }
            for &id in &route.path {
                if !map.straits.contains(&id) {
                    continue;
                }
                let owners: BTreeSet<&CivId> = map
                    .neighbors(id)
                    .iter()
                    .filter_map(|&n| map.owner(n))
                    .collect();
                let mut strongest: Option<&CivId> = None;
                let (mut max, mut second) = (0.0_f64, 0.0_f64);
                for civ in owners {
                    let navy = navies.get(civ).copied().unwrap_or(0.0);
                    if navy > max {
                        second = max;
                        max = navy;
                        strongest = Some(civ);
                    } else if navy > second {
                        second = navy;
                    }
                }
                if let Some(holder) = strongest {
                    if max > second * margin && holder != &route.origin_owner {
                        route.block(id, BlockadeCause::Strait);
                        break;
                    }
                }
            }
        }

        for disruption in &self.disruptions {
            if let Some(route) = self
                .routes
                .iter_mut()
                .find(|r| r.key() == disruption.route && !r.is_blocked())
            {
                if route.path.contains(&disruption.hex) {
                    route.block(disruption.hex, BlockadeCause::Raid);
                }
            }
        }

        for route in &mut self.routes {
            if route.is_blocked() || !self.embargoes.contains_key(&route.origin_owner) {
                continue;
            }
            let hex = route
                .path
                .iter()
                .copied()
                .find(|id| map.straits.contains(id))
                .unwrap_or(route.path[route.path.len() / 2]);
            route.block(hex, BlockadeCause::Embargo);
        }
    }

    /// Block every outbound route of `civ` until `until`.
    pub fn embargo(&mut self, civ: &CivId, until: u64) {
        let entry = self.embargoes.entry(civ.clone()).or_insert(until);
        *entry = (*entry).max(until);
    }

    /// Strike a random sea route: flag all its convoys and hold it blocked for
    /// `duration` ticks. Returns the route index and the blockade hex.
    pub fn raid(
        &mut self,
        map: &HexMap,
        rng: &mut RandomSource,
        tick: u64,
        duration: u64,
    ) -> Option<(usize, HexId)> {
        let sea: Vec<usize> = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.kind == RouteKind::Sea)
            .map(|(i, _)| i)
            .collect();
        let idx = *rng.pick(&sea)?;
        let route = &mut self.routes[idx];
        for convoy in &mut route.convoys {
            convoy.raided = true;
        }
        let hex = match route.blockade {
            Some(b) => b.hex,
            None => {
                let straits: Vec<HexId> = route
                    .path
                    .iter()
                    .copied()
                    .filter(|id| map.straits.contains(id))
                    .collect();
                let pool = if straits.is_empty() {
                    route
                        .path
                        .iter()
                        .copied()
                        .filter(|&id| map.hex(id).is_some_and(|h| h.kind.is_water()))
                        .collect()
                } else {
                    straits
                };
                rng.pick(&pool).copied().unwrap_or(route.origin)
            }
        };
        if !route.is_blocked() {
            route.block(hex, BlockadeCause::Raid);
        }
        let key = route.key();
        self.disruptions.retain(|d| d.route != key);
        self.disruptions.push(TradeDisruption {
            route: key,
            hex,
            until: tick + duration,
        });
        Some((idx, hex))
    }

    /// Sample every route's throughput and credit origin owners.
    ///
    /// Blocked routes credit only `blocked_volume_share` of their throughput.
    pub fn update_volumes(
        &mut self,
        civs: &mut [Civilization],
        navies: &BTreeMap<CivId, f64>,
        balance: &Balance,
        randomness: f64,
        rng: &mut RandomSource,
    ) {
        let mut per_civ: BTreeMap<CivId, f64> = BTreeMap::new();
        for route in &mut self.routes {
            let th = route_throughput(route, civs, navies, balance, randomness, rng);
            route.throughput = th;
            let credited = if route.is_blocked() {
                th * balance.trade.blocked_volume_share
            } else {
                th
            };
            *per_civ.entry(route.origin_owner.clone()).or_insert(0.0) += credited;
        }
        for civ in civs.iter_mut() {
            civ.last_trade_volume = per_civ.get(&civ.id).copied().unwrap_or(0.0);
        }
    }

    /// Move convoy markers along their routes; a marker that wraps sheds its raid flag.
    pub fn advance_convoys(&mut self, speed: f64, blocked_factor: f64) {
        for route in &mut self.routes {
            let step = if route.is_blocked() {
                speed * blocked_factor
            } else {
                speed
            };
            for convoy in &mut route.convoys {
                convoy.position += step;
                if convoy.position >= 1.0 {
                    convoy.position -= 1.0;
                    convoy.raided = false;
                }
            }
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.routes.iter().filter(|r| r.is_blocked()).count()
    }
}
