use serde::{Deserialize, Serialize};
use std::fmt;

pub type HexId = u32;

/// Short civilization tag such as `SAL` or `FRA`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CivId(pub String);

impl CivId {
    pub fn new(id: &str) -> Self {
        CivId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CivId {
    fn from(s: &str) -> Self {
        CivId::new(s)
    }
}

// === Enums ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HexKind {
    Land,
    Sea,
    Shoals,
}

impl HexKind {
    pub fn is_water(self) -> bool {
        matches!(self, HexKind::Sea | HexKind::Shoals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resource {
    Grain,
    Ironwood,
    AuricSalts,
    SkyAmber,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Grain,
        Resource::Ironwood,
        Resource::AuricSalts,
        Resource::SkyAmber,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resource::Grain => "Grain",
            Resource::Ironwood => "Ironwood",
            Resource::AuricSalts => "Auric Salts",
            Resource::SkyAmber => "Sky-Amber",
        }
    }
}

// === Hex ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hex {
    pub id: HexId,
    pub q: i32,
    pub r: i32,
    pub kind: HexKind,
    pub owner: Option<CivId>,
    pub resource: Option<Resource>,
    pub capital: bool,
    pub strait: bool,
}

impl Hex {
    /// Create an unowned hex. Straits and capitals are marked later by topology
    /// and placement.
    pub fn new(id: HexId, q: i32, r: i32, kind: HexKind) -> Self {
        Self {
            id,
            q,
            r,
            kind,
            owner: None,
            resource: None,
            capital: false,
            strait: false,
        }
    }

    pub fn is_land(&self) -> bool {
        self.kind == HexKind::Land
    }

    pub fn is_owned_by(&self, civ: &CivId) -> bool {
        self.owner.as_ref() == Some(civ)
    }
}
