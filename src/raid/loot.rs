// Loot estimate and risk grading for eligible targets.

use std::collections::HashMap;

use crate::constants::{
    AIRCRAFT_VALUE, CITY_LOOT_MULTIPLIER, CITY_VALUE_ESTIMATE, GDP_LOOT_MULTIPLIER,
    LOW_RISK_MILITARY_PER_CITY, MEDIUM_RISK_MILITARY_PER_CITY, MILITARY_LOOT_MULTIPLIER,
    NO_WARS_MULTIPLIER, RECENT_DEFEAT_MULTIPLIER, RECENT_VICTORY_MULTIPLIER, SHIP_VALUE,
    SOLDIER_VALUE, TANK_VALUE,
};
use crate::model::{NationSnapshot, WarOutcome, WarRecord};

use super::{Candidate, RiskLevel};

/// Wars grouped by every nation taking part, built once per search.
#[derive(Debug, Default)]
pub struct WarIndex<'a> {
    by_nation: HashMap<i64, Vec<&'a WarRecord>>,
}

impl<'a> WarIndex<'a> {
    pub fn new(wars: &'a [WarRecord]) -> Self {
        let mut by_nation: HashMap<i64, Vec<&'a WarRecord>> = HashMap::new();
        for war in wars {
            by_nation.entry(war.attacker_id).or_default().push(war);
            if war.defender_id != war.attacker_id {
                by_nation.entry(war.defender_id).or_default().push(war);
            }
        }
        Self { by_nation }
    }

    pub fn wars_of(&self, nation_id: i64) -> &[&'a WarRecord] {
        self.by_nation
            .get(&nation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn military_value(nation: &NationSnapshot) -> f64 {
    nation.soldiers as f64 * SOLDIER_VALUE
        + nation.tanks as f64 * TANK_VALUE
        + nation.aircraft as f64 * AIRCRAFT_VALUE
        + nation.ships as f64 * SHIP_VALUE
}

/// Ranking key for a target. `recent_wars` are the wars the nation took part
/// in; only those it started move the multiplier, and an empty list applies
/// the no-wars bonus once. Multipliers compound per war.
pub fn estimate(nation: &NationSnapshot, recent_wars: &[&WarRecord]) -> f64 {
    let mut value = GDP_LOOT_MULTIPLIER * nation.gdp + MILITARY_LOOT_MULTIPLIER * military_value(nation);
    if nation.cities > 0 {
        value += CITY_LOOT_MULTIPLIER * (nation.cities as f64 * CITY_VALUE_ESTIMATE);
    }

    let multiplier = if recent_wars.is_empty() {
        NO_WARS_MULTIPLIER
    } else {
        recent_wars
            .iter()
            .filter(|w| w.attacker_id == nation.id)
            .fold(1.0, |acc, war| match war.outcome {
                WarOutcome::Defeat => acc * RECENT_DEFEAT_MULTIPLIER,
                WarOutcome::Victory => acc * RECENT_VICTORY_MULTIPLIER,
                WarOutcome::Pending => acc,
            })
    };

    let loot = value * multiplier;
    if loot.is_finite() {
        loot.max(0.0)
    } else {
        0.0
    }
}

pub fn risk_level(nation: &NationSnapshot) -> RiskLevel {
    let per_city = military_value(nation) / nation.cities.max(1) as f64;
    if per_city < LOW_RISK_MILITARY_PER_CITY {
        RiskLevel::Low
    } else if per_city < MEDIUM_RISK_MILITARY_PER_CITY {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Loot descending, nation id ascending on ties.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.loot_potential
            .total_cmp(&a.loot_potential)
            .then(a.nation.id.cmp(&b.nation.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn war(id: i64, attacker_id: i64, defender_id: i64, outcome: WarOutcome) -> WarRecord {
        WarRecord {
            id,
            attacker_id,
            defender_id,
            outcome,
            turns_left: 0,
        }
    }

    fn candidate(id: i64, loot: f64) -> Candidate {
        Candidate {
            nation: NationSnapshot::new(id, 100.0),
            loot_potential: loot,
            risk_level: RiskLevel::Low,
        }
    }

    #[test]
    fn test_all_zero_nation_is_non_negative() {
        let mut nation = NationSnapshot::new(1, 0.0);
        nation.cities = 0;
        assert_eq!(estimate(&nation, &[]), 0.0);
    }

    #[test]
    fn test_formula_without_wars() {
        let mut nation = NationSnapshot::new(1, 1000.0);
        nation.gdp = 1_000_000.0;
        nation.soldiers = 1000;
        nation.tanks = 10;
        nation.aircraft = 2;
        nation.ships = 1;
        nation.cities = 10;
        // base 100_000 + 0.1 * (1250 + 500 + 1000 + 3375) + 0.05 * 500_000
        let expected = (100_000.0 + 612.5 + 25_000.0) * 1.3;
        assert!((estimate(&nation, &[]) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_multiplier_compounds_per_war() {
        let mut nation = NationSnapshot::new(1, 1000.0);
        nation.cities = 2;
        let base = 0.05 * 2.0 * 50_000.0;

        let lost = [
            war(1, 1, 2, WarOutcome::Defeat),
            war(2, 1, 3, WarOutcome::Defeat),
        ];
        let refs: Vec<&WarRecord> = lost.iter().collect();
        assert!((estimate(&nation, &refs) - base * 1.2 * 1.2).abs() < 1e-6);

        let mixed = [
            war(1, 1, 2, WarOutcome::Victory),
            war(2, 1, 3, WarOutcome::Pending),
        ];
        let refs: Vec<&WarRecord> = mixed.iter().collect();
        assert!((estimate(&nation, &refs) - base * 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_defensive_wars_only_cancel_no_wars_bonus() {
        let mut nation = NationSnapshot::new(1, 1000.0);
        nation.cities = 2;
        let base = 0.05 * 2.0 * 50_000.0;
        let defended = [war(1, 9, 1, WarOutcome::Victory)];
        let refs: Vec<&WarRecord> = defended.iter().collect();
        assert!((estimate(&nation, &refs) - base).abs() < 1e-6);
    }

    #[test]
    fn test_war_index() {
        let wars = vec![
            war(1, 1, 2, WarOutcome::Pending),
            war(2, 3, 1, WarOutcome::Defeat),
        ];
        let index = WarIndex::new(&wars);
        assert_eq!(index.wars_of(1).len(), 2);
        assert_eq!(index.wars_of(2).len(), 1);
        assert!(index.wars_of(4).is_empty());
    }

    #[test]
    fn test_risk_level_by_military_per_city() {
        let mut nation = NationSnapshot::new(1, 1000.0);
        nation.cities = 10;
        assert_eq!(risk_level(&nation), RiskLevel::Low);
        nation.ships = 200; // 675_000 / 10
        assert_eq!(risk_level(&nation), RiskLevel::Medium);
        nation.ships = 1000;
        assert_eq!(risk_level(&nation), RiskLevel::High);
    }

    #[test]
    fn test_rank_breaks_ties_by_id() {
        let mut list = vec![candidate(5, 10.0), candidate(2, 30.0), candidate(3, 10.0), candidate(1, 10.0)];
        rank(&mut list);
        let ids: Vec<i64> = list.iter().map(|c| c.nation.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 5]);
    }
}
