// Alliance compliance audits over live member records: military build usage,
// spy counts, resource holdings that should be deposited, and login activity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::info;

use crate::constants::{
    AIRCRAFT_PER_HANGAR, BASE_SPIES_REQUIRED, DEPOSIT_THRESHOLDS, INACTIVITY_HOURS,
    INTEL_AGENCY_PROJECT_BIT, INTEL_AGENCY_SPIES_REQUIRED, MILITARY_USAGE_THRESHOLD, MIN_DEPOSIT_EXCESS,
    RAIDER_MAX_CITIES, RAIDER_MONEY_THRESHOLD, SHIPS_PER_DRYDOCK, SOLDIERS_PER_BARRACKS,
    TANKS_PER_FACTORY,
};
use crate::db::LinkedNations;
use crate::error::BotError;
use crate::format::{money, thousands};
use crate::model::NationSnapshot;
use crate::store::SnapshotStore;
use crate::upstream::{GameApi, NationDetail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Military,
    Spies,
    Deposit,
    Activity,
}

impl AuditKind {
    pub fn label(self) -> &'static str {
        match self {
            AuditKind::Military => "Military",
            AuditKind::Spies => "Spies",
            AuditKind::Deposit => "Deposit",
            AuditKind::Activity => "Activity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditIssue {
    LowMilitary {
        unit: &'static str,
        current: i64,
        capacity: i64,
    },
    LowSpies {
        current: i64,
        required: i64,
    },
    ExcessResource {
        resource: &'static str,
        held: f64,
        excess: f64,
    },
    InactiveFor {
        hours: i64,
    },
    /// The game reported no usable last-active time.
    ActivityUnknown,
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditIssue::LowMilitary {
                unit,
                current,
                capacity,
            } => {
                let pct = if *capacity > 0 {
                    *current as f64 / *capacity as f64 * 100.0
                } else {
                    0.0
                };
                write!(
                    f,
                    "{unit}: {}/{} ({pct:.0}%)",
                    thousands(*current),
                    thousands(*capacity)
                )
            }
            AuditIssue::LowSpies { current, required } => {
                write!(f, "Spies: {current}/{required}")
            }
            AuditIssue::ExcessResource {
                resource: "money",
                excess,
                ..
            } => write!(f, "money: deposit {}", money(excess.floor())),
            AuditIssue::ExcessResource {
                resource, excess, ..
            } => write!(f, "{resource}: deposit {}", thousands(excess.floor() as i64)),
            AuditIssue::InactiveFor { hours } => {
                write!(f, "Inactive for {}d {}h", hours / 24, hours % 24)
            }
            AuditIssue::ActivityUnknown => f.write_str("Last active: unknown"),
        }
    }
}

/// One member who failed an audit.
#[derive(Debug, Clone, Serialize)]
pub struct AuditFinding {
    pub nation_id: i64,
    pub nation_name: String,
    pub leader_name: String,
    pub cities: u32,
    /// Chat user linked to the nation, when registered.
    pub discord_user: Option<u64>,
    /// Discord handle the nation lists in game.
    pub discord_handle: Option<String>,
    pub issues: Vec<AuditIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub kind: AuditKind,
    /// Members audited (applicants excluded).
    pub checked: usize,
    /// Members skipped because they improved since the previous snapshot.
    pub exempt: usize,
    pub findings: Vec<AuditFinding>,
}

// ── Pure checks ──────────────────────────────────────────────────────

/// Maximum units per type across all of a member's cities.
pub fn military_capacity(member: &NationDetail) -> [(&'static str, i64, i64); 4] {
    let (mut soldiers, mut tanks, mut aircraft, mut ships) = (0, 0, 0, 0);
    for city in &member.cities {
        soldiers += city.barracks * SOLDIERS_PER_BARRACKS;
        tanks += city.factory * TANKS_PER_FACTORY;
        aircraft += city.hangar * AIRCRAFT_PER_HANGAR;
        ships += city.drydock * SHIPS_PER_DRYDOCK;
    }
    [
        ("Soldiers", member.soldiers, soldiers),
        ("Tanks", member.tanks, tanks),
        ("Aircraft", member.aircraft, aircraft),
        ("Ships", member.ships, ships),
    ]
}

pub fn military_issues(member: &NationDetail) -> Vec<AuditIssue> {
    military_capacity(member)
        .into_iter()
        .filter(|(_, current, capacity)| {
            *capacity > 0 && (*current as f64 / *capacity as f64) < MILITARY_USAGE_THRESHOLD
        })
        .map(|(unit, current, capacity)| AuditIssue::LowMilitary {
            unit,
            current,
            capacity,
        })
        .collect()
}

pub fn has_intel_agency(project_bits: i64) -> bool {
    (project_bits >> INTEL_AGENCY_PROJECT_BIT) & 1 == 1
}

pub fn spies_required(member: &NationDetail) -> i64 {
    if has_intel_agency(member.project_bits) {
        INTEL_AGENCY_SPIES_REQUIRED
    } else {
        BASE_SPIES_REQUIRED
    }
}

pub fn spy_issues(member: &NationDetail) -> Vec<AuditIssue> {
    let required = spies_required(member);
    if member.spies < required {
        vec![AuditIssue::LowSpies {
            current: member.spies,
            required,
        }]
    } else {
        Vec::new()
    }
}

pub fn deposit_issues(member: &NationDetail) -> Vec<AuditIssue> {
    let thresholds: HashMap<&str, f64> = DEPOSIT_THRESHOLDS.iter().copied().collect();
    let raider = member.city_count() <= RAIDER_MAX_CITIES;
    member
        .resources()
        .into_iter()
        .filter_map(|(resource, held)| {
            let mut threshold = *thresholds.get(resource)?;
            if resource == "money" && raider {
                threshold = RAIDER_MONEY_THRESHOLD;
            }
            let excess = held - threshold;
            (excess >= MIN_DEPOSIT_EXCESS).then_some(AuditIssue::ExcessResource {
                resource,
                held,
                excess,
            })
        })
        .collect()
}

pub fn activity_issues(member: &NationDetail, now: DateTime<Utc>) -> Vec<AuditIssue> {
    let Some(last_active) = member.last_active else {
        return vec![AuditIssue::ActivityUnknown];
    };
    let hours = (now - last_active).num_hours();
    if hours >= INACTIVITY_HOURS {
        vec![AuditIssue::InactiveFor { hours }]
    } else {
        Vec::new()
    }
}

/// Whether the member built up the audited units since the previous snapshot.
fn improved(kind: AuditKind, member: &NationDetail, before: Option<&NationSnapshot>) -> bool {
    let Some(before) = before else {
        return false;
    };
    let grew = |now: i64, then: u64| now > then as i64;
    match kind {
        AuditKind::Military => {
            grew(member.soldiers, before.soldiers)
                || grew(member.tanks, before.tanks)
                || grew(member.aircraft, before.aircraft)
                || grew(member.ships, before.ships)
        }
        AuditKind::Spies => grew(member.spies, before.spies),
        AuditKind::Deposit | AuditKind::Activity => false,
    }
}

/// Run one audit over `members`, using `previous` for improvement exemptions.
pub fn run(
    kind: AuditKind,
    members: &[NationDetail],
    previous: &[NationSnapshot],
    now: DateTime<Utc>,
) -> AuditReport {
    let previous: HashMap<i64, &NationSnapshot> = previous.iter().map(|n| (n.id, n)).collect();
    let mut checked = 0;
    let mut exempt = 0;
    let mut findings = Vec::new();

    for member in members.iter().filter(|m| !m.is_applicant()) {
        checked += 1;
        let issues = match kind {
            AuditKind::Military => military_issues(member),
            AuditKind::Spies => spy_issues(member),
            AuditKind::Deposit => deposit_issues(member),
            AuditKind::Activity => activity_issues(member, now),
        };
        if issues.is_empty() {
            continue;
        }
        if improved(kind, member, previous.get(&member.id).copied()) {
            exempt += 1;
            continue;
        }
        findings.push(AuditFinding {
            nation_id: member.id,
            nation_name: member.nation_name.clone(),
            leader_name: member.leader_name.clone(),
            cities: member.city_count(),
            discord_user: None,
            discord_handle: member.discord.clone().filter(|d| !d.is_empty()),
            issues,
        });
    }
    findings.sort_by_key(|f| f.nation_id);

    AuditReport {
        kind,
        checked,
        exempt,
        findings,
    }
}

// ── Service ──────────────────────────────────────────────────────────

pub struct AuditEngine {
    api: Arc<dyn GameApi>,
    store: Arc<SnapshotStore>,
    links: Arc<dyn LinkedNations>,
    alliance_id: i64,
}

impl AuditEngine {
    pub fn new(
        api: Arc<dyn GameApi>,
        store: Arc<SnapshotStore>,
        links: Arc<dyn LinkedNations>,
        alliance_id: i64,
    ) -> Self {
        Self {
            api,
            store,
            links,
            alliance_id,
        }
    }

    pub async fn audit(&self, kind: AuditKind) -> Result<AuditReport, BotError> {
        let members = self.api.alliance_members(self.alliance_id).await?;
        let previous = self.store.previous_nations();
        let mut report = run(kind, &members, &previous, Utc::now());
        let users = try_join_all(
            report
                .findings
                .iter()
                .map(|f| self.links.linked_user(f.nation_id)),
        )
        .await?;
        for (finding, user) in report.findings.iter_mut().zip(users) {
            finding.discord_user = user;
        }
        info!(
            "{} audit: {} checked, {} exempt, {} flagged",
            kind.label(),
            report.checked,
            report.exempt,
            report.findings.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::CityDetail;

    fn member(id: i64) -> NationDetail {
        NationDetail {
            id,
            nation_name: format!("Member {id}"),
            num_cities: 1,
            alliance_position: Some("MEMBER".into()),
            ..Default::default()
        }
    }

    fn city(barracks: i64, factory: i64, hangar: i64, drydock: i64) -> CityDetail {
        CityDetail {
            barracks,
            factory,
            hangar,
            drydock,
            ..Default::default()
        }
    }

    #[test]
    fn test_military_capacity_and_usage() {
        let mut m = member(1);
        m.cities = vec![city(5, 5, 5, 3), city(5, 0, 5, 0)];
        m.soldiers = 30_000; // 100%
        m.tanks = 1000; // 80%
        m.aircraft = 100; // 66%
        m.ships = 0; // 0%
        let issues = military_issues(&m);
        let units: Vec<&str> = issues
            .iter()
            .map(|i| match i {
                AuditIssue::LowMilitary { unit, .. } => *unit,
                _ => "",
            })
            .collect();
        assert_eq!(units, vec!["Aircraft", "Ships"]);
    }

    #[test]
    fn test_no_buildings_no_military_issue() {
        let m = member(1);
        assert!(military_issues(&m).is_empty());
    }

    #[test]
    fn test_spy_requirement_depends_on_intel_agency() {
        let mut m = member(1);
        m.spies = 55;
        assert!(spy_issues(&m).is_empty());
        m.project_bits = 1 << 10;
        assert_eq!(spies_required(&m), 60);
        assert_eq!(
            spy_issues(&m),
            vec![AuditIssue::LowSpies { current: 55, required: 60 }]
        );
    }

    #[test]
    fn test_deposit_thresholds_and_raiders() {
        let mut raider = member(1);
        raider.num_cities = 12;
        raider.money = 40_000_200.0; // excess below 300
        raider.food = 1_500_000.0;
        let issues = deposit_issues(&raider);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], AuditIssue::ExcessResource { resource: "food", .. }));

        raider.money = 45_000_000.0;
        assert_eq!(deposit_issues(&raider).len(), 2);

        let mut whale = member(2);
        whale.num_cities = 30;
        whale.money = 45_000_000.0;
        assert!(deposit_issues(&whale).is_empty());
    }

    #[test]
    fn test_run_skips_applicants_and_exempts_improvers() {
        let mut applicant = member(1);
        applicant.alliance_position = Some("APPLICANT".into());

        let mut improver = member(2);
        improver.spies = 20;
        let mut slacker = member(3);
        slacker.spies = 10;
        slacker.discord = Some("slacker#0001".into());
        let compliant = {
            let mut m = member(4);
            m.spies = 50;
            m
        };

        let mut before = NationSnapshot::new(2, 100.0);
        before.spies = 5;
        let report = run(
            AuditKind::Spies,
            &[applicant, improver, slacker, compliant],
            &[before],
            Utc::now(),
        );
        assert_eq!(report.checked, 3);
        assert_eq!(report.exempt, 1);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].nation_id, 3);
        assert_eq!(report.findings[0].discord_handle.as_deref(), Some("slacker#0001"));
    }

    #[test]
    fn test_issue_display() {
        let issue = AuditIssue::LowMilitary { unit: "Tanks", current: 500, capacity: 2500 };
        assert_eq!(issue.to_string(), "Tanks: 500/2,500 (20%)");
        let issue = AuditIssue::ExcessResource { resource: "money", held: 1.0, excess: 1_234_567.8 };
        assert_eq!(issue.to_string(), "money: deposit $1,234,567");
        let issue = AuditIssue::ExcessResource { resource: "steel", held: 1.0, excess: 2_500.0 };
        assert_eq!(issue.to_string(), "steel: deposit 2,500");
    }

    #[test]
    fn test_activity_flags_a_full_day_idle() {
        let now = Utc::now();
        let idle = |id: i64, minutes: i64| {
            let mut m = member(id);
            m.last_active = Some(now - chrono::Duration::minutes(minutes));
            m
        };
        assert!(activity_issues(&idle(1, 24 * 60 - 1), now).is_empty());
        assert_eq!(
            activity_issues(&idle(2, 24 * 60), now),
            vec![AuditIssue::InactiveFor { hours: 24 }]
        );
        assert_eq!(activity_issues(&member(3), now), vec![AuditIssue::ActivityUnknown]);

        let mut applicant = idle(4, 72 * 60);
        applicant.alliance_position = Some("APPLICANT".into());
        // Lost units do not exempt anyone from the activity audit.
        let mut before = NationSnapshot::new(5, 100.0);
        before.soldiers = 0;
        let report = run(
            AuditKind::Activity,
            &[idle(5, 50 * 60), applicant, idle(6, 60)],
            &[before],
            now,
        );
        assert_eq!(report.checked, 2);
        assert_eq!(report.exempt, 0);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].nation_id, 5);
        assert_eq!(report.findings[0].issues[0].to_string(), "Inactive for 2d 2h");
    }
}
