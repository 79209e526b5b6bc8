// Raid search: filter the current snapshot for a requester, estimate loot,
// grade risk and rank the survivors.

pub mod filter;
pub mod loot;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::db::LinkedNations;
use crate::error::BotError;
use crate::metrics;
use crate::model::NationSnapshot;
use crate::store::SnapshotStore;
use crate::upstream::GameApi;

pub use filter::{AllianceRef, ExclusionReason, FilterOutcome, FilterParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

/// One eligible target, scored for this search only.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub nation: NationSnapshot,
    pub loot_potential: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct RaidReport {
    pub requester_score: f64,
    /// Inclusive score band searched.
    pub range: (f64, f64),
    /// Ranked best first.
    pub candidates: Vec<Candidate>,
    pub excluded: BTreeMap<ExclusionReason, usize>,
    /// Nations in the snapshot the search ran against.
    pub considered: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl RaidReport {
    /// Exclusion counts in evaluation order, for diagnostics.
    pub fn breakdown(&self) -> Vec<(&'static str, usize)> {
        ExclusionReason::ALL
            .iter()
            .map(|r| (r.label(), self.excluded.get(r).copied().unwrap_or(0)))
            .collect()
    }
}

/// How the caller identified whose score to search around.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequesterArgs {
    pub score: Option<f64>,
    pub nation_id: Option<i64>,
}

pub struct RaidSearch {
    store: Arc<SnapshotStore>,
    home_alliance_id: i64,
}

impl RaidSearch {
    pub fn new(store: Arc<SnapshotStore>, home_alliance_id: i64) -> Self {
        Self {
            store,
            home_alliance_id,
        }
    }

    /// Search the current snapshot. The home alliance is always excluded.
    pub fn search(&self, requester_score: f64, exclude: &[AllianceRef]) -> Result<RaidReport, BotError> {
        let started = Instant::now();
        let result = self.search_inner(requester_score, exclude);
        metrics::RAID_SEARCH_DURATION_MS.observe(started.elapsed().as_secs_f64() * 1000.0);
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::RAID_SEARCHES_TOTAL.with_label_values(&[label]).inc();
        result
    }

    fn search_inner(&self, requester_score: f64, exclude: &[AllianceRef]) -> Result<RaidReport, BotError> {
        let snapshot = self.store.current()?;

        let mut params = FilterParams {
            exclude: exclude.to_vec(),
        };
        let home = AllianceRef::Id(self.home_alliance_id);
        if !params.exclude.contains(&home) {
            params.exclude.push(home);
        }

        let outcome = filter::filter(requester_score, &snapshot, &params);
        let wars = loot::WarIndex::new(&snapshot.wars);
        let mut candidates: Vec<Candidate> = outcome
            .eligible
            .iter()
            .map(|nation| Candidate {
                nation: (*nation).clone(),
                loot_potential: loot::estimate(nation, wars.wars_of(nation.id)),
                risk_level: loot::risk_level(nation),
            })
            .collect();
        loot::rank(&mut candidates);

        debug!(
            "Raid search around {requester_score}: {} eligible, {} excluded",
            candidates.len(),
            outcome.excluded_total()
        );

        Ok(RaidReport {
            requester_score,
            range: filter::war_range(requester_score),
            candidates,
            excluded: outcome.excluded,
            considered: snapshot.nations.len(),
            last_update: snapshot.metadata.last_update,
        })
    }

    /// Work out the requester's score: explicit score, then explicit nation,
    /// then the caller's registered nation.
    pub async fn resolve_score(
        &self,
        args: RequesterArgs,
        caller_id: u64,
        api: &dyn GameApi,
        links: &dyn LinkedNations,
    ) -> Result<f64, BotError> {
        if let Some(score) = args.score {
            if !score.is_finite() || score < 0.0 {
                return Err(BotError::InvalidArgument(
                    "score must be a non-negative number".into(),
                ));
            }
            return Ok(score);
        }
        let nation_id = match args.nation_id {
            Some(id) => id,
            None => links
                .linked_nation(caller_id)
                .await?
                .ok_or(BotError::NotRegistered)?,
        };
        self.score_of(nation_id, api).await
    }

    /// Score from the snapshot when present, else from a live lookup.
    pub async fn score_of(&self, nation_id: i64, api: &dyn GameApi) -> Result<f64, BotError> {
        if let Some(nation) = self
            .store
            .snapshot()
            .and_then(|s| s.nation(nation_id).map(|n| n.score))
        {
            return Ok(nation);
        }
        api.nation(nation_id)
            .await?
            .map(|n| n.score)
            .ok_or(BotError::EntityNotFound {
                kind: "nation",
                id: nation_id,
            })
    }
}
