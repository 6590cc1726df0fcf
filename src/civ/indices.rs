//! Derived-index formulas and effective military strength.
//!
//! Every input is read through [`Civilization::value`], so active modifiers
//! are already folded in. All outputs are clamped.

use std::collections::BTreeSet;

use crate::civ::{Attribute, Civilization};
use crate::config::balance::{Balance, MilitaryBalance};
use crate::world::hex::Resource;

fn clamp100(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 }
}

pub fn rule_of_law(civ: &Civilization) -> f64 {
    clamp100(
        civ.value(Attribute::Government) * 0.7 + civ.value(Attribute::Infrastructure) * 0.2 + 10.0,
    )
}

pub fn cohesion(civ: &Civilization, balance: &Balance) -> f64 {
    clamp100(
        civ.value(Attribute::Cohesion)
            - balance.morale.cohesion_penalty_from_centralization
                * civ.value(Attribute::Centralization),
    )
}

pub fn literacy(civ: &Civilization) -> f64 {
    clamp100(civ.value(Attribute::Knowledge) * 0.85 + 8.0)
}

/// Religious unity is carried by the religion pillar itself, so only the
/// intolerance penalty usually contributes.
pub fn religious_conflict(civ: &Civilization, balance: &Balance) -> f64 {
    let religion = civ.value(Attribute::Religion);
    let unity = religion;
    let mut conflict = (religion - unity).abs() * balance.morale.religious_conflict_factor;
    if civ.value(Attribute::Tolerance) < balance.morale.intolerance_threshold {
        conflict += balance.morale.intolerance_penalty;
    }
    conflict
}

pub fn prosperity_index(civ: &Civilization, at_war: bool, balance: &Balance) -> f64 {
    let w = &balance.economy.prosperity_weights;
    let war_penalty = if at_war {
        balance.economy.war_penalty_base
            + civ.war_exhaustion * balance.economy.war_penalty_per_exhaustion
    } else {
        civ.war_exhaustion * balance.economy.peace_penalty_per_exhaustion
    };
    clamp100(
        w.agriculture * civ.value(Attribute::Agriculture)
            + w.industry * civ.value(Attribute::Industry)
            + w.trade * civ.value(Attribute::TradeOpenness)
            + w.resources * civ.value(Attribute::Resources)
            + w.infrastructure * civ.value(Attribute::Infrastructure)
            + w.law * rule_of_law(civ)
            + w.health * civ.value(Attribute::Health)
            - war_penalty,
    )
}

/// Reads prosperity through the overlay, so it must run after prosperity is stored.
pub fn stability_index(civ: &Civilization, balance: &Balance) -> f64 {
    let m = &balance.morale;
    let positives = m.cohesion * cohesion(civ, balance)
        + m.law * rule_of_law(civ)
        + m.prosperity * civ.value(Attribute::Prosperity)
        + m.religious_unity * civ.value(Attribute::Religion)
        + m.patronage * civ.value(Attribute::Culture);
    let negatives = m.inequality * civ.value(Attribute::Inequality)
        + m.rigidity * civ.value(Attribute::Rigidity)
        + m.tax * civ.value(Attribute::TaxCapacity)
        + m.religious_conflict * religious_conflict(civ, balance)
        + m.war_exhaustion * civ.war_exhaustion;
    clamp100(positives - negatives)
}

pub fn innovation_index(civ: &Civilization, balance: &Balance) -> f64 {
    let i = &balance.innovation;
    clamp100(
        i.literacy * literacy(civ)
            + i.universities * civ.value(Attribute::Knowledge)
            + i.media * civ.value(Attribute::Media)
            + i.trade * civ.value(Attribute::TradeOpenness)
            + i.urban * civ.value(Attribute::Urbanization)
            + i.tolerance * civ.value(Attribute::Tolerance)
            - i.rigidity_penalty * civ.value(Attribute::Rigidity),
    )
}

pub fn soft_power_index(civ: &Civilization, balance: &Balance) -> f64 {
    let s = &balance.soft_power;
    clamp100(
        s.culture * civ.value(Attribute::Culture)
            + s.diplomacy * civ.value(Attribute::Diplomacy)
            + s.trade * civ.value(Attribute::TradeOpenness)
            + s.law * rule_of_law(civ),
    )
}

/// Recompute prosperity, stability, innovation and soft power in place.
pub fn refresh_indices(civ: &mut Civilization, at_war: bool, balance: &Balance) {
    civ.prosperity = prosperity_index(civ, at_war, balance);
    civ.stability = stability_index(civ, balance);
    civ.innovation = innovation_index(civ, balance);
    civ.soft_power = soft_power_index(civ, balance);
}

/// Treasury income and spending, then war-exhaustion drift.
pub fn advance_economy(civ: &mut Civilization, at_war: bool, balance: &Balance) {
    let e = &balance.economy;
    let tax_income = civ.value(Attribute::TaxCapacity) * 0.01
        * (civ.value(Attribute::Prosperity) / 100.0)
        * (civ.value(Attribute::Population) / 100.0)
        * e.tax_income_per_point
        * 100.0;
    let trade_income = civ.last_trade_volume * e.trade_to_treasury;
    let patronage = civ.value(Attribute::Culture) * e.patronage_drain;
    let upkeep = civ.value(Attribute::Military) * e.army_upkeep;
    let next = civ.treasury + tax_income + trade_income - patronage - upkeep;
    civ.treasury = if next.is_finite() {
        next.clamp(0.0, e.treasury_ceiling)
    } else {
        0.0
    };

    let drift = if at_war {
        balance.military.exhaustion_rise_at_war
    } else {
        -balance.military.exhaustion_recovery
    };
    civ.war_exhaustion = clamp100(civ.war_exhaustion + drift);
}

pub fn supply_factor(civ: &Civilization, m: &MilitaryBalance) -> f64 {
    let sf = m.supply_from_infra * civ.value(Attribute::Infrastructure) / 100.0
        + m.supply_from_law * rule_of_law(civ) / 100.0
        + m.supply_from_health * civ.value(Attribute::Health) / 100.0;
    (0.6 + sf * 0.6).clamp(0.3, 1.6)
}

pub fn morale_factor(civ: &Civilization, balance: &Balance) -> f64 {
    let m = &balance.military;
    let mf = m.morale_from_stability * civ.value(Attribute::Stability) / 100.0
        + m.morale_from_cohesion * cohesion(civ, balance) / 100.0;
    (0.6 + mf * 0.6).clamp(0.5, 1.8)
}

/// Military sector scaled by economy, supply and morale; roughly 0..3.
fn base_strength(civ: &Civilization, balance: &Balance) -> f64 {
    civ.value(Attribute::Military) * (civ.value(Attribute::Economy) / 100.0)
        * supply_factor(civ, &balance.military)
        * morale_factor(civ, balance)
        / 100.0
}

pub fn effective_army(civ: &Civilization, owned: &BTreeSet<Resource>, balance: &Balance) -> f64 {
    let mut strength = base_strength(civ, balance);
    if owned.contains(&Resource::Ironwood) {
        strength *= 1.0 + balance.economy.ironwood_army_bonus;
    }
    strength
}

pub fn effective_navy(civ: &Civilization, owned: &BTreeSet<Resource>, balance: &Balance) -> f64 {
    let mut strength = base_strength(civ, balance);
    if owned.contains(&Resource::SkyAmber) {
        strength *= 1.0 + balance.economy.sky_amber_navy_bonus;
    }
    strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civ::tests::sample_civ;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rule_of_law_formula() {
        let civ = sample_civ("SAL");
        // 70 * 0.7 + 70 * 0.2 + 10
        assert!(approx(rule_of_law(&civ), 73.0));
    }

    #[test]
    fn cohesion_penalized_by_centralization() {
        let civ = sample_civ("SAL");
        let balance = Balance::default();
        // 70 - 0.12 * 60
        assert!(approx(cohesion(&civ, &balance), 62.8));
    }

    #[test]
    fn prosperity_war_penalty_exceeds_peace_penalty() {
        let mut civ = sample_civ("SAL");
        civ.war_exhaustion = 20.0;
        let balance = Balance::default();
        let peace = prosperity_index(&civ, false, &balance);
        let war = prosperity_index(&civ, true, &balance);
        // peace: -6, war: -(10 + 12)
        assert!(approx(peace - war, 16.0));
    }

    #[test]
    fn prosperity_matches_weighted_sum() {
        let civ = sample_civ("SAL");
        let balance = Balance::default();
        let expected = 0.22 * 70.0
            + 0.20 * 70.0
            + 0.22 * 70.0
            + 0.10 * 60.0
            + 0.12 * 70.0
            + 0.07 * 73.0
            + 0.07 * 60.0;
        assert!(approx(prosperity_index(&civ, false, &balance), expected));
    }

    #[test]
    fn intolerance_adds_religious_conflict() {
        let mut civ = sample_civ("LYR");
        let balance = Balance::default();
        assert_eq!(religious_conflict(&civ, &balance), 0.0);
        civ.pillars.tolerance = 30.0;
        assert_eq!(religious_conflict(&civ, &balance), 8.0);
    }

    #[test]
    fn indices_stay_in_bounds_at_extremes() {
        let balance = Balance::default();
        for fill in [0.0, 100.0] {
            let mut civ = sample_civ("KHA");
            for attr in crate::civ::Attribute::ALL {
                if !attr.is_derived() && !attr.is_stock() {
                    civ.set_base(attr, fill);
                }
            }
            civ.war_exhaustion = 100.0 - fill;
            for at_war in [false, true] {
                refresh_indices(&mut civ, at_war, &balance);
                for v in [civ.prosperity, civ.stability, civ.innovation, civ.soft_power] {
                    assert!((0.0..=100.0).contains(&v), "index out of range: {}", v);
                }
            }
        }
    }

    #[test]
    fn treasury_clamped_to_ceiling_and_floor() {
        let balance = Balance::default();
        let mut civ = sample_civ("GLA");
        civ.treasury = 9_998.0;
        civ.last_trade_volume = 1_000.0;
        advance_economy(&mut civ, false, &balance);
        assert_eq!(civ.treasury, balance.economy.treasury_ceiling);

        civ.treasury = 0.0;
        civ.last_trade_volume = 0.0;
        civ.prosperity = 0.0;
        advance_economy(&mut civ, false, &balance);
        assert_eq!(civ.treasury, 0.0);
    }

    #[test]
    fn war_exhaustion_drifts_and_clamps() {
        let balance = Balance::default();
        let mut civ = sample_civ("THO");
        advance_economy(&mut civ, true, &balance);
        assert!(approx(civ.war_exhaustion, 0.35));
        advance_economy(&mut civ, false, &balance);
        advance_economy(&mut civ, false, &balance);
        assert_eq!(civ.war_exhaustion, 0.0);
    }

    #[test]
    fn resource_bonuses_apply_to_matching_branch() {
        let balance = Balance::default();
        let mut civ = sample_civ("SAL");
        refresh_indices(&mut civ, false, &balance);
        let none = BTreeSet::new();
        let ironwood: BTreeSet<_> = [Resource::Ironwood].into_iter().collect();
        let amber: BTreeSet<_> = [Resource::SkyAmber].into_iter().collect();

        let army = effective_army(&civ, &none, &balance);
        assert!(approx(effective_army(&civ, &ironwood, &balance), army * 1.12));
        assert!(approx(effective_army(&civ, &amber, &balance), army));
        assert!(approx(effective_navy(&civ, &amber, &balance), army * 1.10));
        assert!(army > 0.0);
    }

    #[test]
    fn factors_stay_within_multiplier_bounds() {
        let balance = Balance::default();
        let mut civ = sample_civ("SAL");
        civ.sectors.infrastructure = 0.0;
        civ.sectors.health = 0.0;
        civ.pillars.government = 0.0;
        assert!(supply_factor(&civ, &balance.military) >= 0.3);
        civ.stability = 100.0;
        civ.pillars.cohesion = 100.0;
        civ.pillars.centralization = 0.0;
        let mf = morale_factor(&civ, &balance);
        assert!((0.5..=1.8).contains(&mf));
    }
}
