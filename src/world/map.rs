use std::collections::{BTreeMap, BTreeSet};

use crate::world::hex::{CivId, Hex, HexId, HexKind, Resource};
use crate::world::topology::build_adjacency;

/// Rectangular odd-r hex grid plus the indices derived from per-hex fields.
///
/// Only `hexes`, `width` and `height` are authoritative. Everything else is
/// rebuilt by [`HexMap::from_hexes`] and kept current by the mutators below.
#[derive(Debug, Clone, PartialEq)]
pub struct HexMap {
    pub width: u32,
    pub height: u32,
    pub hexes: Vec<Hex>,
    pub(crate) adjacency: Vec<Vec<HexId>>,
    pub straits: BTreeSet<HexId>,
    pub resource_hexes: Vec<HexId>,
    pub outer_shoals: BTreeSet<HexId>,
    /// Unowned land not reserved by an in-flight colonization.
    pub colonizable: BTreeSet<HexId>,
    pub capitals: BTreeMap<CivId, HexId>,
}

impl HexMap {
    /// Build a map from hexes in id order and rebuild every index from their fields.
    ///
    /// Strait flags are taken as given; call [`HexMap::mark_straits`] to recompute them.
    pub fn from_hexes(width: u32, height: u32, hexes: Vec<Hex>) -> Self {
        let adjacency = build_adjacency(width, height);
        let mut map = Self {
            width,
            height,
            hexes,
            adjacency,
            straits: BTreeSet::new(),
            resource_hexes: Vec::new(),
            outer_shoals: BTreeSet::new(),
            colonizable: BTreeSet::new(),
            capitals: BTreeMap::new(),
        };
        map.rebuild_indices();
        map
    }

    fn rebuild_indices(&mut self) {
        self.straits.clear();
        self.resource_hexes.clear();
        self.outer_shoals.clear();
        self.colonizable.clear();
        self.capitals.clear();
        for hex in &self.hexes {
            if hex.strait {
                self.straits.insert(hex.id);
            }
            if hex.resource.is_some() {
                self.resource_hexes.push(hex.id);
            }
            if hex.kind == HexKind::Shoals {
                self.outer_shoals.insert(hex.id);
            }
            if hex.is_land() && hex.owner.is_none() {
                self.colonizable.insert(hex.id);
            }
            if let (true, Some(owner)) = (hex.capital, &hex.owner) {
                self.capitals.insert(owner.clone(), hex.id);
            }
        }
    }

    /// Mark every open-sea hex enclosed by at least `min_enclosing` land or
    /// shoal neighbors as a strait.
    pub fn mark_straits(&mut self, min_enclosing: usize) {
        self.straits.clear();
        for id in 0..self.hexes.len() {
            let is_strait = self.hexes[id].kind == HexKind::Sea
                && self.adjacency[id]
                    .iter()
                    .filter(|&&n| self.hexes[n as usize].kind != HexKind::Sea)
                    .count()
                    >= min_enclosing;
            self.hexes[id].strait = is_strait;
            if is_strait {
                self.straits.insert(id as HexId);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }

    pub fn hex(&self, id: HexId) -> Option<&Hex> {
        self.hexes.get(id as usize)
    }

    pub fn owner(&self, id: HexId) -> Option<&CivId> {
        self.hexes.get(id as usize).and_then(|h| h.owner.as_ref())
    }

    pub fn capital_of(&self, civ: &CivId) -> Option<HexId> {
        self.capitals.get(civ).copied()
    }

    /// Hand a hex to `civ`. The hex leaves the colonizable set.
    pub fn assign_owner(&mut self, id: HexId, civ: &CivId) {
        if let Some(hex) = self.hexes.get_mut(id as usize) {
            hex.owner = Some(civ.clone());
            self.colonizable.remove(&id);
        }
    }

    /// Found `civ`'s capital on `id`, claiming the hex.
    pub fn set_capital(&mut self, id: HexId, civ: &CivId) {
        self.assign_owner(id, civ);
        if let Some(hex) = self.hexes.get_mut(id as usize) {
            hex.capital = true;
            self.capitals.insert(civ.clone(), id);
        }
    }

    /// Place a resource; the index stays sorted by hex id.
    pub fn add_resource(&mut self, id: HexId, resource: Resource) {
        if let Some(hex) = self.hexes.get_mut(id as usize) {
            hex.resource = Some(resource);
            if let Err(pos) = self.resource_hexes.binary_search(&id) {
                self.resource_hexes.insert(pos, id);
            }
        }
    }

    pub fn owned_by<'a>(&'a self, civ: &'a CivId) -> impl Iterator<Item = HexId> + 'a {
        self.hexes
            .iter()
            .filter(move |h| h.is_owned_by(civ))
            .map(|h| h.id)
    }

    pub fn owned_count(&self, civ: &CivId) -> usize {
        self.owned_by(civ).count()
    }

    /// Distinct resource kinds on hexes owned by `civ`.
    pub fn owned_resources(&self, civ: &CivId) -> BTreeSet<Resource> {
        self.resource_hexes
            .iter()
            .filter_map(|&id| self.hex(id))
            .filter(|h| h.is_owned_by(civ))
            .filter_map(|h| h.resource)
            .collect()
    }

    pub fn land_count(&self) -> usize {
        self.hexes.iter().filter(|h| h.is_land()).count()
    }
}
