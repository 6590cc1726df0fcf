use std::fmt::Write as _;

use crate::civ::{Attribute, Civilization};
use crate::world::hex::CivId;
use crate::world::WorldState;

/// Per-tick aggregate metrics for introspection and the periodic world summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TickStatistics {
    pub tick: u64,
    pub prosperity_leader: Option<CivId>,
    pub treasury_leader: Option<CivId>,
    pub trade_leader: Option<CivId>,
    pub innovation_leader: Option<CivId>,
    pub stability_leader: Option<CivId>,
    pub total_routes: usize,
    pub blocked_routes: usize,
    pub active_wars: usize,
    pub colonizations: usize,
    pub avg_prosperity: f64,
    pub avg_stability: f64,
    pub avg_treasury: f64,
    pub tick_duration_ms: f32,
}

/// Highest scorer; the earliest civilization wins ties.
fn leader(civs: &[Civilization], score: impl Fn(&Civilization) -> f64) -> Option<CivId> {
    let mut best: Option<(&Civilization, f64)> = None;
    for civ in civs {
        let s = score(civ);
        if best.is_none_or(|(_, b)| s > b) {
            best = Some((civ, s));
        }
    }
    best.map(|(c, _)| c.id.clone())
}

/// Compute statistics for the current world state after a tick.
pub fn compute_statistics(world: &WorldState, tick_duration_ms: f32) -> TickStatistics {
    let civs = &world.civs;
    let n = civs.len() as f64;
    let mean = |attr: Attribute| {
        if civs.is_empty() {
            0.0
        } else {
            civs.iter().map(|c| c.value(attr)).sum::<f64>() / n
        }
    };

    TickStatistics {
        tick: world.tick,
        prosperity_leader: leader(civs, |c| c.value(Attribute::Prosperity)),
        treasury_leader: leader(civs, |c| c.treasury),
        trade_leader: leader(civs, |c| c.last_trade_volume),
        innovation_leader: leader(civs, |c| c.innovation),
        stability_leader: leader(civs, |c| c.value(Attribute::Stability)),
        total_routes: world.trade.routes.len(),
        blocked_routes: world.trade.blocked_count(),
        active_wars: world.wars().len(),
        colonizations: world.colonizations.len(),
        avg_prosperity: mean(Attribute::Prosperity),
        avg_stability: mean(Attribute::Stability),
        avg_treasury: mean(Attribute::Treasury),
        tick_duration_ms,
    }
}

fn name(id: &Option<CivId>) -> &str {
    id.as_ref().map_or("-", |c| c.as_str())
}

impl TickStatistics {
    pub fn summary_line(&self) -> String {
        format!(
            "{} leads in prosperity, {} holds the deepest coffers, {} moves the most goods; \
             {} of {} routes blockaded, {} wars",
            name(&self.prosperity_leader),
            name(&self.treasury_leader),
            name(&self.trade_leader),
            self.blocked_routes,
            self.total_routes,
            self.active_wars,
        )
    }
}

/// Plain-text report: one block per civilization, then wars and recent news.
pub fn world_report(world: &WorldState, news: usize) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "World Report: tick {}", world.tick);
    let _ = writeln!(s, "Preset: {}", world.preset);
    let _ = writeln!(s, "World: {}\n", world.id);

    for c in &world.civs {
        let resources: Vec<&str> = world.owned_resources(&c.id).iter().map(|r| r.name()).collect();
        let resources = if resources.is_empty() {
            "-".to_string()
        } else {
            resources.join(", ")
        };
        let _ = writeln!(s, "{} {}", c.id, c.name);
        let _ = writeln!(
            s,
            "  Prosperity {:.1}  Stability {:.1}  Innovation {:.1}  SoftPower {:.1}",
            c.value(Attribute::Prosperity),
            c.value(Attribute::Stability),
            c.innovation,
            c.soft_power
        );
        let _ = writeln!(
            s,
            "  Treasury {:.0}  MilEff {:.0}  Aggression {:.0}  Hexes {}",
            c.treasury,
            world.effective_army(&c.id) * 100.0,
            c.value(Attribute::Aggression),
            world.map.owned_count(&c.id)
        );
        let _ = writeln!(s, "  Resources: {}\n", resources);
    }

    let _ = writeln!(s, "Wars:");
    if world.wars().is_empty() {
        let _ = writeln!(s, "  none");
    }
    for w in world.wars() {
        let _ = writeln!(s, "  {} vs {}", w.a, w.b);
    }

    let stats = compute_statistics(world, 0.0);
    let _ = writeln!(s, "\nTrade: {} routes, {} blockaded", stats.total_routes, stats.blocked_routes);
    let _ = writeln!(s, "\nLatest News:");
    for entry in world.recent_log(news) {
        let _ = writeln!(s, "  t{} {}", entry.tick, entry.title);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::fixtures::duel_world;

    #[test]
    fn leaders_and_averages() {
        let mut world = duel_world();
        world.civs[1].treasury = 900.0;
        world.civs[0].last_trade_volume = 2.0;
        let stats = compute_statistics(&world, 1.5);
        assert_eq!(stats.treasury_leader, Some(CivId::new("EST")));
        assert_eq!(stats.trade_leader, Some(CivId::new("WST")));
        assert_eq!(stats.avg_treasury, 600.0);
        assert_eq!(stats.total_routes, world.routes().len());
        assert_eq!(stats.active_wars, 0);
    }

    #[test]
    fn ties_go_to_first_civilization() {
        let world = duel_world();
        let stats = compute_statistics(&world, 0.0);
        // both sides are built from the same template
        assert_eq!(stats.prosperity_leader, Some(CivId::new("WST")));
    }

    #[test]
    fn empty_world_has_no_leaders() {
        let mut world = duel_world();
        world.civs.clear();
        let stats = compute_statistics(&world, 0.0);
        assert_eq!(stats.prosperity_leader, None);
        assert_eq!(stats.avg_prosperity, 0.0);
        assert!(stats.summary_line().starts_with("- leads"));
    }

    #[test]
    fn report_lists_every_civilization_and_war() {
        let mut world = duel_world();
        let (a, b) = (CivId::new("WST"), CivId::new("EST"));
        world.force_war(&a, &b).unwrap();
        let report = world_report(&world, 5);
        assert!(report.starts_with("World Report: tick 0"));
        assert!(report.contains("WST Realm of WST"));
        assert!(report.contains("EST Realm of EST"));
        assert!(report.contains("WST vs EST"));
        assert!(report.contains("War declared"));
    }
}
