use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::civ::{Civilization, Pillars, Sectors};
use crate::world::hex::{CivId, HexKind};

/// A named starting scenario: terrain shape, civilizations and alliances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Tess,
    We1914,
    Bac1200,
}

struct CivTemplate {
    id: &'static str,
    name: &'static str,
    color: &'static str,
    motto: &'static str,
    /// religion, government, economy, knowledge, culture, social, tolerance,
    /// church_state, media, cohesion, rigidity, inequality, centralization
    pillars: [f64; 13],
    /// population, urbanization, infrastructure, health, military, aggression,
    /// diplomacy, resources, trade_openness, tax_capacity
    sectors: [f64; 10],
}

const TESS_CIVS: &[CivTemplate] = &[
    CivTemplate {
        id: "SAL",
        name: "The Salanic Empire",
        color: "#4FA3FF",
        motto: "Iron fist, iron will, iron legacy.",
        pillars: [75., 90., 70., 85., 60., 70., 40., 80., 45., 75., 85., 70., 90.],
        sectors: [60., 65., 75., 65., 85., 70., 60., 75., 55., 80.],
    },
    CivTemplate {
        id: "LYR",
        name: "Kingdom of Lyrica",
        color: "#FF6E6E",
        motto: "Faith and harmony, piety and order.",
        pillars: [95., 80., 65., 55., 85., 75., 30., 95., 40., 85., 80., 75., 75.],
        sectors: [55., 60., 65., 60., 70., 60., 65., 65., 50., 70.],
    },
    CivTemplate {
        id: "THO",
        name: "Republic of Thornwall",
        color: "#7AD37A",
        motto: "Commerce and discovery, innovation and liberty.",
        pillars: [40., 70., 85., 80., 70., 60., 75., 25., 80., 65., 45., 55., 60.],
        sectors: [50., 80., 80., 70., 60., 75., 80., 70., 90., 65.],
    },
    CivTemplate {
        id: "KHA",
        name: "Khaldur Nomad Clans",
        color: "#FFD166",
        motto: "Clan loyalty, warrior honor, tribal strength.",
        pillars: [60., 45., 50., 35., 55., 85., 50., 40., 30., 90., 70., 60., 40.],
        sectors: [45., 35., 45., 50., 80., 45., 55., 60., 40., 45.],
    },
    CivTemplate {
        id: "GLA",
        name: "Glass League",
        color: "#B66DFF",
        motto: "By lattice and ledger, all harbors prosper.",
        pillars: [45., 65., 85., 80., 70., 45., 65., 35., 70., 60., 45., 40., 65.],
        sectors: [52., 78., 72., 68., 70., 90., 80., 70., 85., 55.],
    },
];

const WE1914_CIVS: &[CivTemplate] = &[
    CivTemplate {
        id: "FRA",
        name: "France",
        color: "#2fa4ff",
        motto: "Honor and patrie.",
        pillars: [40., 70., 75., 75., 80., 55., 70., 20., 75., 60., 50., 52., 70.],
        sectors: [40., 70., 78., 68., 90., 60., 80., 65., 70., 60.],
    },
    CivTemplate {
        id: "UK",
        name: "United Kingdom",
        color: "#ff2f2f",
        motto: "Rule the waves.",
        pillars: [60., 80., 85., 80., 75., 60., 75., 35., 85., 62., 52., 60., 75.],
        sectors: [45., 82., 82., 70., 65., 100., 85., 60., 85., 62.],
    },
    CivTemplate {
        id: "BEL",
        name: "Belgium",
        color: "#ffd166",
        motto: "Firm and faithful.",
        pillars: [70., 65., 70., 65., 60., 55., 60., 55., 65., 58., 50., 55., 65.],
        sectors: [10., 76., 75., 65., 45., 30., 60., 45., 80., 58.],
    },
    CivTemplate {
        id: "NED",
        name: "Netherlands",
        color: "#7AD37A",
        motto: "I will persevere.",
        pillars: [55., 70., 80., 75., 65., 55., 78., 30., 80., 60., 50., 52., 65.],
        sectors: [9., 78., 78., 68., 35., 70., 75., 50., 90., 60.],
    },
    CivTemplate {
        id: "ESP",
        name: "Spain",
        color: "#B66DFF",
        motto: "Plus Ultra.",
        pillars: [75., 60., 60., 55., 70., 60., 55., 70., 60., 62., 58., 60., 62.],
        sectors: [20., 55., 60., 60., 55., 55., 60., 55., 70., 55.],
    },
    CivTemplate {
        id: "PRT",
        name: "Portugal",
        color: "#4FA3FF",
        motto: "Talant de bien faire.",
        pillars: [70., 55., 55., 55., 60., 55., 60., 60., 60., 58., 56., 58., 58.],
        sectors: [8., 52., 58., 58., 35., 60., 65., 50., 80., 55.],
    },
];

const BAC1200_CIVS: &[CivTemplate] = &[
    CivTemplate {
        id: "EGY",
        name: "Egypt",
        color: "#ffd166",
        motto: "Life, Prosperity, Health.",
        pillars: [85., 80., 70., 75., 80., 70., 55., 85., 50., 70., 68., 60., 82.],
        sectors: [30., 55., 75., 60., 70., 40., 70., 70., 65., 68.],
    },
    CivTemplate {
        id: "HAT",
        name: "Hatti",
        color: "#ff6e6e",
        motto: "Land of a thousand gods.",
        pillars: [80., 70., 65., 60., 70., 65., 50., 75., 45., 68., 64., 58., 70.],
        sectors: [20., 50., 60., 55., 80., 35., 65., 75., 55., 60.],
    },
    CivTemplate {
        id: "MYC",
        name: "Mycenaeans",
        color: "#4FA3FF",
        motto: "Lion-gate proud.",
        pillars: [70., 65., 65., 55., 70., 60., 55., 60., 45., 62., 58., 56., 62.],
        sectors: [9., 48., 55., 55., 65., 60., 60., 55., 70., 55.],
    },
    CivTemplate {
        id: "UGA",
        name: "Ugarit",
        color: "#B66DFF",
        motto: "Write, weigh, and sail.",
        pillars: [60., 65., 75., 80., 75., 55., 65., 45., 70., 58., 50., 52., 60.],
        sectors: [7., 70., 60., 55., 35., 50., 80., 45., 85., 58.],
    },
    CivTemplate {
        id: "ASS",
        name: "Assyria",
        color: "#7AD37A",
        motto: "Who dares defy the king?",
        pillars: [80., 80., 70., 65., 60., 70., 45., 80., 45., 68., 66., 60., 80.],
        sectors: [18., 48., 65., 55., 85., 30., 55., 75., 50., 65.],
    },
];

impl CivTemplate {
    fn build(&self, pressure: f64, intensity: f64, treasury: f64) -> Civilization {
        let p = self.pillars;
        let s = self.sectors;
        Civilization {
            id: CivId::new(self.id),
            name: self.name.to_string(),
            color: self.color.to_string(),
            motto: self.motto.to_string(),
            pillars: Pillars {
                religion: p[0],
                government: p[1],
                economy: p[2],
                knowledge: p[3],
                culture: p[4],
                social: p[5],
                tolerance: p[6],
                church_state: p[7],
                media: p[8],
                cohesion: p[9],
                rigidity: p[10],
                inequality: p[11],
                centralization: p[12],
            },
            sectors: Sectors {
                population: s[0],
                urbanization: s[1],
                infrastructure: s[2],
                health: s[3],
                military: s[4],
                aggression: s[5],
                diplomacy: s[6],
                resources: s[7],
                trade_openness: s[8],
                tax_capacity: s[9],
                agriculture: p[2],
                industry: p[2],
            },
            external_pressure: pressure,
            event_intensity: intensity,
            prosperity: 0.0,
            stability: 0.0,
            innovation: 0.0,
            soft_power: 0.0,
            treasury,
            war_exhaustion: 0.0,
            last_trade_volume: 0.0,
            overlay: BTreeMap::new(),
        }
    }
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Tess, Preset::We1914, Preset::Bac1200];

    pub fn from_id(id: &str) -> Option<Self> {
        Preset::ALL.iter().copied().find(|p| p.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            Preset::Tess => "tess",
            Preset::We1914 => "we1914",
            Preset::Bac1200 => "bac1200",
        }
    }

    /// Name of the outside force whose pressure drives raids.
    pub fn pressure_name(self) -> &'static str {
        match self {
            Preset::Tess => "Outer Shoals",
            Preset::We1914 => "Germany (Pressure)",
            Preset::Bac1200 => "Sea Peoples (Pressure)",
        }
    }

    fn templates(self) -> &'static [CivTemplate] {
        match self {
            Preset::Tess => TESS_CIVS,
            Preset::We1914 => WE1914_CIVS,
            Preset::Bac1200 => BAC1200_CIVS,
        }
    }

    /// (external pressure, event intensity) shared by every civilization of the preset.
    fn pressure_and_intensity(self) -> (f64, f64) {
        match self {
            Preset::Tess => (25.0, 50.0),
            Preset::We1914 => (40.0, 50.0),
            Preset::Bac1200 => (50.0, 55.0),
        }
    }

    pub fn civilizations(self, base_treasury: f64) -> Vec<Civilization> {
        let (pressure, intensity) = self.pressure_and_intensity();
        self.templates()
            .iter()
            .map(|t| t.build(pressure, intensity, base_treasury))
            .collect()
    }

    pub fn alliances(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Preset::Tess => &[],
            Preset::We1914 => &[("FRA", "UK"), ("FRA", "BEL"), ("UK", "NED")],
            Preset::Bac1200 => &[("EGY", "UGA")],
        }
    }

    /// Terrain of cell (q, r) on a `width * height` grid, before edge shoals.
    pub fn classify(self, q: i32, r: i32, width: i32, height: i32) -> HexKind {
        let nx = q as f64 / width as f64 * 2.0 - 1.0;
        let ny = r as f64 / height as f64 * 2.0 - 1.0;
        let land_if = |inside: bool| if inside { HexKind::Land } else { HexKind::Sea };
        match self {
            Preset::Tess => {
                let inland_sea = nx * nx * 1.2 + ny * ny * 0.6 < 0.9;
                let mut kind = land_if(!inland_sea);
                let (qf, rf) = (q as f64, r as f64);
                let noise = (qf * 0.9).sin() * (rf * 0.6).cos() + ((qf + rf) * 0.3).sin() * 0.5;
                if noise > 0.7 {
                    kind = HexKind::Land;
                }
                if noise < -0.85 {
                    kind = HexKind::Sea;
                }
                kind
            }
            Preset::We1914 => land_if(nx * nx * 0.6 + ny * ny * 1.6 < 0.8),
            Preset::Bac1200 => land_if(nx * nx * 0.8 + ny * ny * 1.2 < 0.85),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
