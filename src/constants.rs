// Game rules and tuning constants for raid search and alliance audits.

// ── War range ────────────────────────────────────────────────────────

/// Lowest score a target may have, as a fraction of the attacker's score.
pub const WAR_RANGE_MIN: f64 = 0.75;
/// Highest score a target may have, as a fraction of the attacker's score.
pub const WAR_RANGE_MAX: f64 = 1.25;

// ── Target exclusion ─────────────────────────────────────────────────

/// Alliances ranked at or above this are assumed to retaliate.
pub const TOP_ALLIANCE_RANK: u32 = 60;
/// Nations already defending this many wars cannot take another.
pub const MAX_DEFENSIVE_WARS: u32 = 3;

// ── Loot estimate ────────────────────────────────────────────────────

pub const GDP_LOOT_MULTIPLIER: f64 = 0.1;
pub const MILITARY_LOOT_MULTIPLIER: f64 = 0.1;
pub const CITY_LOOT_MULTIPLIER: f64 = 0.05;
pub const CITY_VALUE_ESTIMATE: f64 = 50_000.0;

pub const SOLDIER_VALUE: f64 = 1.25;
pub const TANK_VALUE: f64 = 50.0;
pub const AIRCRAFT_VALUE: f64 = 500.0;
pub const SHIP_VALUE: f64 = 3375.0;

/// Applied per recent war the target started and lost.
pub const RECENT_DEFEAT_MULTIPLIER: f64 = 1.2;
/// Applied per recent war the target started and won.
pub const RECENT_VICTORY_MULTIPLIER: f64 = 0.8;
/// Applied once when the target has no wars at all in the snapshot.
pub const NO_WARS_MULTIPLIER: f64 = 1.3;

/// Military value per city below which a target is low risk.
pub const LOW_RISK_MILITARY_PER_CITY: f64 = 50_000.0;
/// Military value per city below which a target is medium risk.
pub const MEDIUM_RISK_MILITARY_PER_CITY: f64 = 250_000.0;

// ── Pagination ───────────────────────────────────────────────────────

/// Raid results render as a 3x2 grid.
pub const RAID_PAGE_SIZE: usize = 6;
/// Audit findings render as a 3x3 grid.
pub const AUDIT_PAGE_SIZE: usize = 9;

// ── Audits ───────────────────────────────────────────────────────────

pub const SOLDIERS_PER_BARRACKS: i64 = 3000;
pub const TANKS_PER_FACTORY: i64 = 250;
pub const AIRCRAFT_PER_HANGAR: i64 = 15;
pub const SHIPS_PER_DRYDOCK: i64 = 5;
/// Members using less than this share of a unit capacity are flagged.
pub const MILITARY_USAGE_THRESHOLD: f64 = 0.79;

pub const BASE_SPIES_REQUIRED: i64 = 50;
pub const INTEL_AGENCY_SPIES_REQUIRED: i64 = 60;
/// Bit index of the Central Intelligence Agency project in `project_bits`.
pub const INTEL_AGENCY_PROJECT_BIT: u32 = 10;

/// Members idle for at least this long fail the activity audit.
pub const INACTIVITY_HOURS: i64 = 24;

/// Members at or below this city count are treated as raiders.
pub const RAIDER_MAX_CITIES: u32 = 15;
pub const RAIDER_MONEY_THRESHOLD: f64 = 40_000_000.0;
/// Excess amounts smaller than this are not worth a deposit.
pub const MIN_DEPOSIT_EXCESS: f64 = 300.0;

/// Holding thresholds per resource, above which a deposit is expected.
pub const DEPOSIT_THRESHOLDS: &[(&str, f64)] = &[
    ("money", 100_000_000.0),
    ("coal", 1_000_000.0),
    ("oil", 1_000_000.0),
    ("uranium", 100_000.0),
    ("iron", 1_000_000.0),
    ("bauxite", 1_000_000.0),
    ("lead", 1_000_000.0),
    ("gasoline", 100_000.0),
    ("munitions", 100_000.0),
    ("steel", 100_000.0),
    ("aluminum", 100_000.0),
    ("food", 1_000_000.0),
];

// ── Upstream ─────────────────────────────────────────────────────────

pub const GAME_BASE_URL: &str = "https://politicsandwar.com";
