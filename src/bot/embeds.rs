// Embed rendering for command results. Text is built by plain functions so it
// can be checked without a Discord connection.

use chrono::{DateTime, Utc};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

use crate::audit::{AuditFinding, AuditReport};
use crate::constants::GAME_BASE_URL;
use crate::format::{compact_money, thousands};
use crate::paginate::Paginator;
use crate::raid::{Candidate, RaidReport, RiskLevel};
use crate::store::CacheStatus;
use crate::upstream::{AllianceDetail, NationDetail, WarDetail};

const COLOR_OK: u32 = 0x2ecc71;
const COLOR_WARN: u32 = 0xe67e22;
const COLOR_INFO: u32 = 0x3498db;

pub fn nation_url(id: i64) -> String {
    format!("{GAME_BASE_URL}/nation/id={id}")
}

pub fn alliance_url(id: i64) -> String {
    format!("{GAME_BASE_URL}/alliance/id={id}")
}

pub fn war_url(id: i64) -> String {
    format!("{GAME_BASE_URL}/nation/war/timeline/war={id}")
}

pub fn declare_url(id: i64) -> String {
    format!("{GAME_BASE_URL}/nation/war/declare/id={id}")
}

fn age(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => {
            let minutes = (Utc::now() - ts).num_minutes().max(0);
            match minutes {
                0..=59 => format!("{minutes}m ago"),
                60..=1439 => format!("{}h ago", minutes / 60),
                _ => format!("{}d ago", minutes / 1440),
            }
        }
        None => "never".into(),
    }
}

// ── Raid ──────────────────────────────────────────────────────────────

fn risk_icon(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "🟢",
        RiskLevel::Medium => "🟡",
        RiskLevel::High => "🔴",
    }
}

/// Field name and value for one ranked target.
pub fn candidate_field(position: usize, candidate: &Candidate) -> (String, String) {
    let nation = &candidate.nation;
    let name = format!("#{position} {}", nation.name);
    let alliance = nation.alliance_name.as_deref().unwrap_or("None");
    let value = format!(
        "Score: {:.2} | Cities: {}\nLoot: {} | Risk: {} {}\nAlliance: {alliance}\n[View]({}) | [Declare]({})",
        nation.score,
        nation.cities,
        compact_money(candidate.loot_potential),
        risk_icon(candidate.risk_level),
        candidate.risk_level.label(),
        nation_url(nation.id),
        declare_url(nation.id),
    );
    (name, value)
}

/// Exclusion counts, one per line, skipping empty reasons.
pub fn breakdown_text(report: &RaidReport) -> String {
    let lines: Vec<String> = report
        .breakdown()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("{label}: {}", thousands(count as i64)))
        .collect();
    if lines.is_empty() {
        "Nothing was excluded.".into()
    } else {
        lines.join("\n")
    }
}

pub fn raid_page(report: &RaidReport, pager: &Paginator<Candidate>) -> CreateEmbed {
    let (low, high) = report.range;
    let mut description = format!(
        "War range **{low:.2} – {high:.2}** · {} targets from {} nations",
        pager.len(),
        thousands(report.considered as i64)
    );
    if pager.is_empty() {
        description.push_str("\n\nNo eligible targets. Excluded:\n");
        description.push_str(&breakdown_text(report));
    }

    let mut embed = CreateEmbed::new()
        .title(format!("Raid targets around {:.2}", report.requester_score))
        .description(description)
        .colour(if pager.is_empty() { COLOR_WARN } else { COLOR_OK })
        .footer(CreateEmbedFooter::new(format!(
            "Page {}/{} · data updated {}",
            pager.page_number(),
            pager.total_pages(),
            age(report.last_update)
        )));
    for (i, candidate) in pager.page().iter().enumerate() {
        let (name, value) = candidate_field(pager.offset() + i + 1, candidate);
        embed = embed.field(name, value, true);
    }
    embed
}

// ── Audit ─────────────────────────────────────────────────────────────

pub fn finding_field(finding: &AuditFinding) -> (String, String) {
    let mut value = finding
        .issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    match (finding.discord_user, finding.discord_handle.as_deref()) {
        (Some(user), _) => value.push_str(&format!("\n<@{user}>")),
        (None, Some(handle)) => value.push_str(&format!("\nDiscord: {handle}")),
        (None, None) => {}
    }
    value.push_str(&format!("\n[Nation]({})", nation_url(finding.nation_id)));
    (
        format!("{} ({} cities)", finding.nation_name, finding.cities),
        value,
    )
}

pub fn audit_page(report: &AuditReport, pager: &Paginator<AuditFinding>) -> CreateEmbed {
    let description = if pager.is_empty() {
        format!("All {} members pass.", report.checked)
    } else {
        format!(
            "{} of {} members flagged · {} exempt after improving",
            pager.len(),
            report.checked,
            report.exempt
        )
    };
    let mut embed = CreateEmbed::new()
        .title(format!("{} audit", report.kind.label()))
        .description(description)
        .colour(if pager.is_empty() { COLOR_OK } else { COLOR_WARN })
        .footer(CreateEmbedFooter::new(format!(
            "Page {}/{}",
            pager.page_number(),
            pager.total_pages()
        )));
    for finding in pager.page() {
        let (name, value) = finding_field(finding);
        embed = embed.field(name, value, true);
    }
    embed
}

// ── Lookups ───────────────────────────────────────────────────────────

pub fn nation_embed(nation: &NationDetail) -> CreateEmbed {
    let alliance = match &nation.alliance {
        Some(a) if nation.alliance_id > 0 => format!("[{}]({})", a.name, alliance_url(a.id)),
        _ => "None".into(),
    };
    let military = format!(
        "🪖 {} · 🛡 {} · ✈ {} · 🚢 {}\nSpies {} · Missiles {} · Nukes {}",
        thousands(nation.soldiers),
        thousands(nation.tanks),
        thousands(nation.aircraft),
        thousands(nation.ships),
        nation.spies,
        nation.missiles,
        nation.nukes,
    );
    let mut status = Vec::new();
    if nation.vacation_mode_turns > 0 {
        status.push(format!("Vacation mode ({} turns)", nation.vacation_mode_turns));
    }
    if nation.beige_turns > 0 {
        status.push(format!("Beige ({} turns)", nation.beige_turns));
    }
    if status.is_empty() {
        status.push("Active".into());
    }

    CreateEmbed::new()
        .title(format!("{} ({})", nation.nation_name, nation.leader_name))
        .url(nation_url(nation.id))
        .colour(COLOR_INFO)
        .field("Score", format!("{:.2}", nation.score), true)
        .field("Cities", nation.city_count().to_string(), true)
        .field("Color", nation.color.clone().unwrap_or_else(|| "-".into()), true)
        .field("Alliance", alliance, true)
        .field("Status", status.join(", "), true)
        .field("Last active", age(nation.last_active), true)
        .field("Military", military, false)
}

pub fn alliance_embed(alliance: &AllianceDetail) -> CreateEmbed {
    let title = match alliance.acronym.as_deref().filter(|a| !a.is_empty()) {
        Some(acronym) => format!("{} ({acronym})", alliance.name),
        None => alliance.name.clone(),
    };
    CreateEmbed::new()
        .title(title)
        .url(alliance_url(alliance.id))
        .colour(COLOR_INFO)
        .field(
            "Rank",
            alliance
                .rank
                .map(|r| format!("#{r}"))
                .unwrap_or_else(|| "-".into()),
            true,
        )
        .field("Score", format!("{:.2}", alliance.score), true)
        .field("Color", alliance.color.clone().unwrap_or_else(|| "-".into()), true)
}

pub fn war_embed(war: &WarDetail) -> CreateEmbed {
    let status = if war.turns_left > 0 {
        format!("Ongoing, {} turns left", war.turns_left)
    } else {
        match war.winner_id {
            Some(w) if w > 0 => format!("Won by [nation {w}]({})", nation_url(w)),
            _ => "Expired".into(),
        }
    };
    CreateEmbed::new()
        .title(format!("War #{}", war.id))
        .url(war_url(war.id))
        .colour(COLOR_INFO)
        .field("Attacker", format!("[{}]({})", war.att_id, nation_url(war.att_id)), true)
        .field("Defender", format!("[{}]({})", war.def_id, nation_url(war.def_id)), true)
        .field("Type", war.war_type.clone().unwrap_or_else(|| "-".into()), true)
        .field("Status", status, false)
        .field("Reason", war.reason.clone().unwrap_or_else(|| "-".into()), false)
}

pub fn cache_embed(status: Option<&CacheStatus>, refreshing: bool) -> CreateEmbed {
    let Some(status) = status else {
        return CreateEmbed::new()
            .title("Raid cache")
            .description("Nation data is still loading.")
            .colour(COLOR_WARN);
    };
    let sizes = status
        .collections
        .iter()
        .map(|(name, size)| format!("{name}: {}", thousands(*size as i64)))
        .collect::<Vec<_>>()
        .join("\n");
    CreateEmbed::new()
        .title("Raid cache")
        .colour(COLOR_OK)
        .field("Last update", age(status.last_update), true)
        .field("Refreshing", if refreshing { "yes" } else { "no" }, true)
        .field("Collections", sizes, false)
        .field(
            "Previous snapshot",
            format!("{} nations", thousands(status.previous_nations as i64)),
            false,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditIssue;
    use crate::model::NationSnapshot;

    #[test]
    fn test_candidate_field() {
        let mut nation = NationSnapshot::new(42, 1000.0);
        nation.name = "Target".into();
        nation.cities = 10;
        let candidate = Candidate {
            nation,
            loot_potential: 1_500_000.0,
            risk_level: RiskLevel::Medium,
        };
        let (name, value) = candidate_field(3, &candidate);
        assert_eq!(name, "#3 Target");
        assert!(value.contains("Score: 1000.00 | Cities: 10"));
        assert!(value.contains("Loot: $1.5M"));
        assert!(value.contains("Medium"));
        assert!(value.contains("Alliance: None"));
        assert!(value.contains("/nation/war/declare/id=42"));
    }

    #[test]
    fn test_finding_field_mentions_registered_user() {
        let finding = AuditFinding {
            nation_id: 7,
            nation_name: "Slacker".into(),
            leader_name: String::new(),
            cities: 12,
            discord_user: Some(1001),
            discord_handle: Some("ignored".into()),
            issues: vec![AuditIssue::LowSpies { current: 10, required: 50 }],
        };
        let (name, value) = finding_field(&finding);
        assert_eq!(name, "Slacker (12 cities)");
        assert!(value.starts_with("Spies: 10/50"));
        assert!(value.contains("<@1001>"));
        assert!(!value.contains("ignored"));
    }

    #[test]
    fn test_age() {
        assert_eq!(age(None), "never");
        assert_eq!(age(Some(Utc::now() - chrono::Duration::minutes(5))), "5m ago");
        assert_eq!(age(Some(Utc::now() - chrono::Duration::hours(3))), "3h ago");
        assert_eq!(age(Some(Utc::now() - chrono::Duration::days(2))), "2d ago");
    }

    #[test]
    fn test_urls() {
        assert_eq!(nation_url(5), "https://politicsandwar.com/nation/id=5");
        assert_eq!(alliance_url(6), "https://politicsandwar.com/alliance/id=6");
    }
}
