// Target filter: narrows a snapshot to the nations a requester may raid and
// accounts for every nation it drops.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::constants::{MAX_DEFENSIVE_WARS, TOP_ALLIANCE_RANK, WAR_RANGE_MAX, WAR_RANGE_MIN};
use crate::model::{NationSnapshot, Snapshot};

/// Why a nation was dropped. Variants are declared in evaluation order, and a
/// nation is attributed to the first one it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Vacation,
    Beige,
    NoCities,
    WarCap,
    TopAlliance,
    ExcludedAlliance,
    OutOfRange,
}

impl ExclusionReason {
    pub const ALL: [ExclusionReason; 7] = [
        ExclusionReason::Vacation,
        ExclusionReason::Beige,
        ExclusionReason::NoCities,
        ExclusionReason::WarCap,
        ExclusionReason::TopAlliance,
        ExclusionReason::ExcludedAlliance,
        ExclusionReason::OutOfRange,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExclusionReason::Vacation => "in vacation mode",
            ExclusionReason::Beige => "beige-protected",
            ExclusionReason::NoCities => "inactive/no cities",
            ExclusionReason::WarCap => "at war cap",
            ExclusionReason::TopAlliance => "protected by top alliance",
            ExclusionReason::ExcludedAlliance => "explicitly excluded alliance",
            ExclusionReason::OutOfRange => "out of score range",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An alliance to leave out of the results, by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AllianceRef {
    Id(i64),
    Name(String),
}

impl AllianceRef {
    /// Numeric input is an id, anything else a name.
    pub fn parse(raw: &str) -> Option<AllianceRef> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<i64>() {
            Ok(id) => AllianceRef::Id(id),
            Err(_) => AllianceRef::Name(raw.to_lowercase()),
        })
    }
}

/// Caller-supplied filter options.
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub exclude: Vec<AllianceRef>,
}

/// Inclusive war-range band for a requester score.
pub fn war_range(requester_score: f64) -> (f64, f64) {
    (requester_score * WAR_RANGE_MIN, requester_score * WAR_RANGE_MAX)
}

#[derive(Debug, Clone)]
pub struct FilterOutcome<'a> {
    pub eligible: Vec<&'a NationSnapshot>,
    /// Every reason is present, with 0 when nothing was dropped for it.
    pub excluded: BTreeMap<ExclusionReason, usize>,
}

impl FilterOutcome<'_> {
    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

pub fn filter<'a>(
    requester_score: f64,
    snapshot: &'a Snapshot,
    params: &FilterParams,
) -> FilterOutcome<'a> {
    let ranks: HashMap<i64, u32> = snapshot.alliances.iter().map(|a| (a.id, a.rank)).collect();
    let excluded_ids: HashSet<i64> = params
        .exclude
        .iter()
        .filter_map(|r| match r {
            AllianceRef::Id(id) => Some(*id),
            AllianceRef::Name(_) => None,
        })
        .collect();
    let excluded_names: HashSet<&str> = params
        .exclude
        .iter()
        .filter_map(|r| match r {
            AllianceRef::Name(name) => Some(name.as_str()),
            AllianceRef::Id(_) => None,
        })
        .collect();
    // Names are resolved through the snapshot's alliances and the nation's own label.
    let excluded_by_name: HashSet<i64> = snapshot
        .alliances
        .iter()
        .filter(|a| excluded_names.contains(a.name.to_lowercase().as_str()))
        .map(|a| a.id)
        .collect();
    // A score that is not a finite non-negative number has no band.
    let band = (requester_score.is_finite() && requester_score >= 0.0)
        .then(|| war_range(requester_score));

    let reason_for = |nation: &NationSnapshot| -> Option<ExclusionReason> {
        if nation.vacation_turns_remaining > 0 {
            return Some(ExclusionReason::Vacation);
        }
        if nation.beige_turns_remaining > 0 {
            return Some(ExclusionReason::Beige);
        }
        if nation.cities == 0 {
            return Some(ExclusionReason::NoCities);
        }
        if nation.defensive_wars_active >= MAX_DEFENSIVE_WARS {
            return Some(ExclusionReason::WarCap);
        }
        if nation.in_alliance() {
            if matches!(ranks.get(&nation.alliance_id), Some(rank) if *rank <= TOP_ALLIANCE_RANK) {
                return Some(ExclusionReason::TopAlliance);
            }
            let named = nation
                .alliance_name
                .as_deref()
                .map(|n| excluded_names.contains(n.to_lowercase().as_str()))
                .unwrap_or(false);
            if excluded_ids.contains(&nation.alliance_id)
                || excluded_by_name.contains(&nation.alliance_id)
                || named
            {
                return Some(ExclusionReason::ExcludedAlliance);
            }
        }
        match band {
            Some((low, high)) if nation.score >= low && nation.score <= high => None,
            _ => Some(ExclusionReason::OutOfRange),
        }
    };

    let mut excluded: BTreeMap<ExclusionReason, usize> =
        ExclusionReason::ALL.iter().map(|r| (*r, 0)).collect();
    let mut eligible = Vec::new();
    for nation in &snapshot.nations {
        match reason_for(nation) {
            Some(reason) => *excluded.entry(reason).or_default() += 1,
            None => eligible.push(nation),
        }
    }

    FilterOutcome { eligible, excluded }
}
