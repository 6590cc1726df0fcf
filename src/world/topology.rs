use std::collections::VecDeque;

use crate::world::hex::{HexId, HexKind};
use crate::world::map::HexMap;

/// Neighbor offsets for even rows (row % 2 == 0) in odd-r offset layout.
const EVEN_ROW_NEIGHBORS: [(i32, i32); 6] = [
    (1, 0),   // East
    (-1, 0),  // West
    (0, -1),  // Northeast
    (-1, -1), // Northwest
    (0, 1),   // Southeast
    (-1, 1),  // Southwest
];

/// Neighbor offsets for odd rows (row % 2 == 1) in odd-r offset layout.
const ODD_ROW_NEIGHBORS: [(i32, i32); 6] = [
    (1, 0),  // East
    (-1, 0), // West
    (1, -1), // Northeast
    (0, -1), // Northwest
    (1, 1),  // Southeast
    (0, 1),  // Southwest
];

/// Which hex kinds a path may cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Sea,
    Land,
    Any,
}

impl PathMode {
    pub fn passes(self, kind: HexKind) -> bool {
        match self {
            PathMode::Sea => kind.is_water(),
            PathMode::Land => kind == HexKind::Land,
            PathMode::Any => true,
        }
    }
}

pub fn hex_id(q: i32, r: i32, width: u32) -> HexId {
    (q + r * width as i32) as HexId
}

/// Build the bounded (non-wrapping) adjacency list of a `width * height` grid.
///
/// Edge hexes get fewer than six neighbors. Neighbor order follows the
/// direction table, which keeps BFS tie-breaks stable.
pub fn build_adjacency(width: u32, height: u32) -> Vec<Vec<HexId>> {
    let mut neighbors = Vec::with_capacity((width * height) as usize);
    for row in 0..height as i32 {
        for col in 0..width as i32 {
            let offsets = if row % 2 == 0 {
                &EVEN_ROW_NEIGHBORS
            } else {
                &ODD_ROW_NEIGHBORS
            };
            let mut list = Vec::with_capacity(6);
            for &(dc, dr) in offsets {
                let nc = col + dc;
                let nr = row + dr;
                if nc >= 0 && nr >= 0 && nc < width as i32 && nr < height as i32 {
                    list.push(hex_id(nc, nr, width));
                }
            }
            neighbors.push(list);
        }
    }
    neighbors
}

/// Odd-r offset to cube coordinates.
pub fn offset_to_cube(q: i32, r: i32) -> (i32, i32, i32) {
    let x = q - (r - (r & 1)) / 2;
    let z = r;
    let y = -x - z;
    (x, y, z)
}

/// Exact hex-grid distance: Chebyshev distance over cube axes.
pub fn cube_distance(a: (i32, i32), b: (i32, i32)) -> u32 {
    let (ax, ay, az) = offset_to_cube(a.0, a.1);
    let (bx, by, bz) = offset_to_cube(b.0, b.1);
    (ax - bx)
        .abs()
        .max((ay - by).abs())
        .max((az - bz).abs()) as u32
}

impl HexMap {
    pub fn hex_distance(&self, a: HexId, b: HexId) -> u32 {
        let ha = &self.hexes[a as usize];
        let hb = &self.hexes[b as usize];
        cube_distance((ha.q, ha.r), (hb.q, hb.r))
    }

    pub fn neighbors(&self, id: HexId) -> &[HexId] {
        &self.adjacency[id as usize]
    }

    pub fn has_sea_neighbor(&self, id: HexId) -> bool {
        self.neighbors(id)
            .iter()
            .any(|&n| self.hexes[n as usize].kind.is_water())
    }

    /// First non-land neighbor in direction order, the port a capital sails from.
    pub fn first_water_neighbor(&self, id: HexId) -> Option<HexId> {
        self.neighbors(id)
            .iter()
            .copied()
            .find(|&n| self.hexes[n as usize].kind.is_water())
    }

    pub fn are_adjacent(&self, a: HexId, b: HexId) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// Breadth-first shortest path from `from` to `to`, both ends included.
    ///
    /// Every hex after `from` must pass `mode`. Returns `None` when `to` is
    /// unreachable.
    pub fn pathfind(&self, from: HexId, to: HexId, mode: PathMode) -> Option<Vec<HexId>> {
        let total = self.hexes.len();
        if from as usize >= total || to as usize >= total {
            return None;
        }
        let mut came_from: Vec<Option<HexId>> = vec![None; total];
        let mut visited = vec![false; total];
        let mut queue = VecDeque::new();
        visited[from as usize] = true;
        queue.push_back(from);

        while let Some(cur) = queue.pop_front() {
            if cur == to {
                break;
            }
            for &nid in self.neighbors(cur) {
                if !visited[nid as usize] && mode.passes(self.hexes[nid as usize].kind) {
                    visited[nid as usize] = true;
                    came_from[nid as usize] = Some(cur);
                    queue.push_back(nid);
                }
            }
        }

        if !visited[to as usize] {
            return None;
        }
        let mut path = vec![to];
        let mut cur = to;
        while let Some(prev) = came_from[cur as usize] {
            path.push(prev);
            cur = prev;
        }
        path.reverse();
        Some(path)
    }
}
