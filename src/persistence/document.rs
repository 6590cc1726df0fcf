//! Flat, self-contained export of a world.
//!
//! The document carries only authoritative state. Adjacency, straits, the
//! resource and capital indices, the colonizable set, routes and blockades are
//! rebuilt on import, so an imported world continues exactly where the
//! exported one stopped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::civ::Civilization;
use crate::config::balance::Balance;
use crate::conflict::Colonization;
use crate::diplomacy::{DiplomacyLedger, RelationRecord, War};
use crate::events::{EventCatalog, Modifier};
use crate::simulation::rng::RandomSource;
use crate::trade::{ConvoyMarker, RouteKey, TradeDisruption, TradeNetwork};
use crate::world::hex::{CivId, Hex, HexId, HexKind, Resource};
use crate::world::log::EventLog;
use crate::world::map::HexMap;
use crate::world::preset::Preset;
use crate::world::topology::hex_id;
use crate::world::WorldState;

pub const DOCUMENT_VERSION: u32 = 1;

/// Largest grid side accepted on import.
pub const MAX_GRID_SIDE: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexRecord {
    pub q: i32,
    pub r: i32,
    pub kind: HexKind,
    pub owner: Option<CivId>,
    pub resource: Option<Resource>,
    pub capital: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvoyRecord {
    pub route: RouteKey,
    pub markers: Vec<ConvoyMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDocument {
    pub version: u32,
    pub id: Uuid,
    pub preset: Preset,
    pub seed_text: String,
    pub rng_state: u32,
    pub tick: u64,
    pub width: u32,
    pub height: u32,
    /// Row-major, one record per hex id.
    pub hexes: Vec<HexRecord>,
    pub civs: Vec<Civilization>,
    pub relations: Vec<RelationRecord>,
    /// Active wars in declaration order.
    pub wars: Vec<War>,
    pub modifiers: Vec<Modifier>,
    pub colonizations: Vec<Colonization>,
    pub cooldowns: BTreeMap<CivId, BTreeMap<String, u64>>,
    pub randomness: f64,
    pub alliance_guarantee: bool,
    pub last_raid_at: u64,
    pub disruptions: Vec<TradeDisruption>,
    pub embargoes: BTreeMap<CivId, u64>,
    pub convoys: Vec<ConvoyRecord>,
    pub log: EventLog,
    pub balance: Balance,
    pub catalog: EventCatalog,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    Parse(String),
    UnsupportedVersion(u32),
    InvalidDimensions { width: u32, height: u32 },
    HexCountMismatch { expected: usize, found: usize },
    HexOutOfPlace { index: usize, q: i32, r: i32 },
    DuplicateCivilization(CivId),
    UnknownCivilization { civ: CivId, context: String },
    OwnedWater(HexId),
    MissingCapital(CivId),
    ExtraCapital { civ: CivId, hex: HexId },
    UnownedCapital(HexId),
    InvalidColonization(HexId),
    InvalidRandomness(f64),
    InvalidBalance(String),
    InvalidCatalog(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Parse(e) => write!(f, "Cannot parse world document: {}", e),
            ImportError::UnsupportedVersion(v) => {
                write!(f, "Unsupported document version {} (expected {})", v, DOCUMENT_VERSION)
            }
            ImportError::InvalidDimensions { width, height } => {
                write!(
                    f,
                    "Grid sides must be within 1-{}, got {}x{}",
                    MAX_GRID_SIDE, width, height
                )
            }
            ImportError::HexCountMismatch { expected, found } => {
                write!(f, "Expected {} hexes, found {}", expected, found)
            }
            ImportError::HexOutOfPlace { index, q, r } => {
                write!(f, "Hex record {} has coordinates ({}, {})", index, q, r)
            }
            ImportError::DuplicateCivilization(civ) => write!(f, "Civilization {} appears twice", civ),
            ImportError::UnknownCivilization { civ, context } => {
                write!(f, "Unknown civilization '{}' in {}", civ, context)
            }
            ImportError::OwnedWater(id) => write!(f, "Water hex {} has an owner", id),
            ImportError::MissingCapital(civ) => write!(f, "Civilization {} has no capital", civ),
            ImportError::ExtraCapital { civ, hex } => {
                write!(f, "Civilization {} has a second capital at hex {}", civ, hex)
            }
            ImportError::UnownedCapital(id) => write!(f, "Capital hex {} has no owner", id),
            ImportError::InvalidColonization(id) => {
                write!(f, "Colonization target {} is not free land or is targeted twice", id)
            }
            ImportError::InvalidRandomness(v) => {
                write!(f, "Randomness must be within 0.0-1.0, got {}", v)
            }
            ImportError::InvalidBalance(e) => write!(f, "Invalid balance:\n{}", e),
            ImportError::InvalidCatalog(e) => write!(f, "Invalid event catalog:\n{}", e),
        }
    }
}

impl std::error::Error for ImportError {}

pub fn export_document(world: &WorldState) -> WorldDocument {
    WorldDocument {
        version: DOCUMENT_VERSION,
        id: world.id,
        preset: world.preset,
        seed_text: world.rng.seed_text().to_string(),
        rng_state: world.rng.state(),
        tick: world.tick,
        width: world.map.width,
        height: world.map.height,
        hexes: world
            .map
            .hexes
            .iter()
            .map(|h| HexRecord {
                q: h.q,
                r: h.r,
                kind: h.kind,
                owner: h.owner.clone(),
                resource: h.resource,
                capital: h.capital,
            })
            .collect(),
        civs: world.civs.clone(),
        relations: world.diplomacy.records(),
        wars: world.wars().to_vec(),
        modifiers: world.modifiers.clone(),
        colonizations: world.colonizations.clone(),
        cooldowns: world.cooldowns.clone(),
        randomness: world.randomness,
        alliance_guarantee: world.alliance_guarantee,
        last_raid_at: world.last_raid_at,
        disruptions: world.trade.disruptions.clone(),
        embargoes: world.trade.embargoes.clone(),
        convoys: world
            .trade
            .routes
            .iter()
            .map(|r| ConvoyRecord {
                route: r.key(),
                markers: r.convoys.clone(),
            })
            .collect(),
        log: world.log.clone(),
        balance: world.balance.clone(),
        catalog: world.catalog.clone(),
    }
}

fn require_known(known: &BTreeSet<CivId>, civ: &CivId, context: &str) -> Result<(), ImportError> {
    if known.contains(civ) {
        Ok(())
    } else {
        Err(ImportError::UnknownCivilization {
            civ: civ.clone(),
            context: context.to_string(),
        })
    }
}

/// Rebuild a world from a document, checking that every reference resolves.
pub fn import_document(doc: WorldDocument) -> Result<WorldState, ImportError> {
    if doc.version != DOCUMENT_VERSION {
        return Err(ImportError::UnsupportedVersion(doc.version));
    }
    let expected = doc
        .width
        .checked_mul(doc.height)
        .filter(|_| (1..=MAX_GRID_SIDE).contains(&doc.width) && (1..=MAX_GRID_SIDE).contains(&doc.height))
        .ok_or(ImportError::InvalidDimensions {
            width: doc.width,
            height: doc.height,
        })? as usize;
    if doc.hexes.len() != expected {
        return Err(ImportError::HexCountMismatch {
            expected,
            found: doc.hexes.len(),
        });
    }
    if !doc.randomness.is_finite() || !(0.0..=1.0).contains(&doc.randomness) {
        return Err(ImportError::InvalidRandomness(doc.randomness));
    }
    doc.balance.validate().map_err(ImportError::InvalidBalance)?;
    doc.catalog.validate().map_err(ImportError::InvalidCatalog)?;

    let mut known = BTreeSet::new();
    for civ in &doc.civs {
        if !known.insert(civ.id.clone()) {
            return Err(ImportError::DuplicateCivilization(civ.id.clone()));
        }
    }

    let mut hexes = Vec::with_capacity(expected);
    let mut capitals: BTreeMap<CivId, HexId> = BTreeMap::new();
    for (index, rec) in doc.hexes.iter().enumerate() {
        let id = index as HexId;
        let in_place = rec.q >= 0 && rec.r >= 0 && hex_id(rec.q, rec.r, doc.width) == id && (rec.q as u32) < doc.width;
        if !in_place {
            return Err(ImportError::HexOutOfPlace {
                index,
                q: rec.q,
                r: rec.r,
            });
        }
        if let Some(owner) = &rec.owner {
            require_known(&known, owner, &format!("owner of hex {}", id))?;
            if rec.kind != HexKind::Land {
                return Err(ImportError::OwnedWater(id));
            }
        }
        if rec.capital {
            let owner = rec.owner.clone().ok_or(ImportError::UnownedCapital(id))?;
            if capitals.insert(owner.clone(), id).is_some() {
                return Err(ImportError::ExtraCapital { civ: owner, hex: id });
            }
        }
        let mut hex = Hex::new(id, rec.q, rec.r, rec.kind);
        hex.owner = rec.owner.clone();
        hex.resource = rec.resource;
        hex.capital = rec.capital;
        hexes.push(hex);
    }
    for civ in &doc.civs {
        if !capitals.contains_key(&civ.id) {
            return Err(ImportError::MissingCapital(civ.id.clone()));
        }
    }

    for rel in &doc.relations {
        require_known(&known, &rel.a, "relations")?;
        require_known(&known, &rel.b, "relations")?;
    }
    for war in &doc.wars {
        require_known(&known, &war.a, "wars")?;
        require_known(&known, &war.b, "wars")?;
    }
    for m in &doc.modifiers {
        require_known(&known, &m.civ, "modifiers")?;
    }
    for civ in doc.cooldowns.keys() {
        require_known(&known, civ, "cooldowns")?;
    }
    for civ in doc.embargoes.keys() {
        require_known(&known, civ, "embargoes")?;
    }

    let mut map = HexMap::from_hexes(doc.width, doc.height, hexes);
    map.mark_straits(doc.balance.geography.strait_enclosing_neighbors);
    for col in &doc.colonizations {
        require_known(&known, &col.civ, "colonizations")?;
        if !map.colonizable.remove(&col.target) {
            return Err(ImportError::InvalidColonization(col.target));
        }
    }

    let mut trade = TradeNetwork::new();
    trade.disruptions = doc.disruptions;
    trade.embargoes = doc.embargoes;

    let mut world = WorldState {
        id: doc.id,
        preset: doc.preset,
        tick: doc.tick,
        map,
        civs: doc.civs,
        diplomacy: DiplomacyLedger::from_parts(&doc.relations, doc.wars),
        trade,
        colonizations: doc.colonizations,
        modifiers: doc.modifiers,
        cooldowns: doc.cooldowns,
        log: doc.log,
        rng: RandomSource::from_state(&doc.seed_text, doc.rng_state),
        balance: doc.balance,
        catalog: doc.catalog,
        randomness: doc.randomness,
        alliance_guarantee: doc.alliance_guarantee,
        last_raid_at: doc.last_raid_at,
    };
    world.refresh_trade();

    let convoys: BTreeMap<RouteKey, Vec<ConvoyMarker>> =
        doc.convoys.into_iter().map(|c| (c.route, c.markers)).collect();
    for route in &mut world.trade.routes {
        if let Some(markers) = convoys.get(&route.key()) {
            route.convoys = markers.clone();
        }
    }
    Ok(world)
}

pub fn export_json(world: &WorldState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export_document(world))
}

pub fn import_json(text: &str) -> Result<WorldState, ImportError> {
    let doc: WorldDocument = serde_json::from_str(text).map_err(|e| ImportError::Parse(e.to_string()))?;
    import_document(doc)
}
