// GraphQL queries and response shapes for single-entity lookups.
//
// The API is loose about number encoding: ids arrive as strings, counts as
// ints or floats, and absent values as null. The lenient deserializers below
// normalise all of those at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::model::WarOutcome;

use super::records::outcome_for;
use super::tabular::parse_timestamp;

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Int(i) => Some(*i as f64),
            Loose::Float(f) => Some(*f),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Loose::Int(i) => Some(*i),
            Loose::Float(f) => Some(*f as i64),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?
        .and_then(|v| v.as_i64())
        .unwrap_or(0))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0))
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| v.as_i64()))
}

fn lenient_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.and_then(|s| parse_timestamp(&s)))
}

// ── Envelope ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default, rename = "paginatorInfo")]
    pub paginator_info: PaginatorInfo,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginatorInfo {
    #[serde(default, rename = "hasMorePages")]
    pub has_more_pages: bool,
}

#[derive(Debug, Deserialize)]
pub struct NationsData {
    pub nations: Page<NationDetail>,
}

#[derive(Debug, Deserialize)]
pub struct AlliancesData {
    pub alliances: Page<AllianceDetail>,
}

#[derive(Debug, Deserialize)]
pub struct WarsData {
    pub wars: Page<WarDetail>,
}

// ── Entities ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllianceRef {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityDetail {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub infrastructure: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub land: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub barracks: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub factory: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub hangar: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub drydock: i64,
}

/// A nation as returned by the live API, including member-only fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NationDetail {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub nation_name: String,
    #[serde(default)]
    pub leader_name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub num_cities: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub alliance_id: i64,
    #[serde(default)]
    pub alliance_position: Option<String>,
    #[serde(default)]
    pub alliance: Option<AllianceRef>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub vacation_mode_turns: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub beige_turns: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub soldiers: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub tanks: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub aircraft: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ships: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub spies: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub missiles: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub nukes: i64,
    #[serde(default, deserialize_with = "lenient_time")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub discord: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub project_bits: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub money: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub coal: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub oil: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub uranium: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub iron: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bauxite: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lead: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gasoline: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub munitions: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub steel: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub aluminum: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub food: f64,
    #[serde(default)]
    pub cities: Vec<CityDetail>,
}

impl NationDetail {
    pub fn is_applicant(&self) -> bool {
        self.alliance_position
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case("APPLICANT"))
            .unwrap_or(false)
    }

    /// City count, preferring the explicit field over the city list.
    pub fn city_count(&self) -> u32 {
        if self.num_cities > 0 {
            self.num_cities as u32
        } else {
            self.cities.len() as u32
        }
    }

    /// Resource holdings by name, in display order.
    pub fn resources(&self) -> [(&'static str, f64); 12] {
        [
            ("money", self.money),
            ("coal", self.coal),
            ("oil", self.oil),
            ("uranium", self.uranium),
            ("iron", self.iron),
            ("bauxite", self.bauxite),
            ("lead", self.lead),
            ("gasoline", self.gasoline),
            ("munitions", self.munitions),
            ("steel", self.steel),
            ("aluminum", self.aluminum),
            ("food", self.food),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllianceDetail {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub acronym: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarDetail {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub att_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub def_id: i64,
    #[serde(default)]
    pub war_type: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub turns_left: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub winner_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub date: Option<DateTime<Utc>>,
}

impl WarDetail {
    pub fn outcome(&self) -> WarOutcome {
        outcome_for(self.att_id, self.def_id, self.winner_id)
    }
}

// ── Queries ──────────────────────────────────────────────────────────

const NATION_FIELDS: &str = "id nation_name leader_name score num_cities color alliance_id \
    alliance_position alliance { id name rank } vacation_mode_turns beige_turns soldiers tanks \
    aircraft ships spies missiles nukes last_active discord project_bits money coal oil uranium \
    iron bauxite lead gasoline munitions steel aluminum food \
    cities { id name infrastructure land barracks factory hangar drydock }";

pub fn nation_query(id: i64) -> String {
    format!("{{ nations(id: [{id}], first: 1) {{ data {{ {NATION_FIELDS} }} }} }}")
}

/// Members returned per page of [`alliance_members_query`].
pub const MEMBERS_PER_PAGE: u32 = 500;

/// One page (1-based) of an alliance's members outside vacation mode.
pub fn alliance_members_query(alliance_id: i64, page: u32) -> String {
    format!(
        "{{ nations(alliance_id: [{alliance_id}], first: {MEMBERS_PER_PAGE}, page: {page}, vmode: false) \
         {{ paginatorInfo {{ hasMorePages }} data {{ {NATION_FIELDS} }} }} }}"
    )
}

pub fn alliance_query(id: i64) -> String {
    format!("{{ alliances(id: [{id}], first: 1) {{ data {{ id name acronym score color rank }} }} }}")
}

pub fn war_query(id: i64) -> String {
    format!(
        "{{ wars(id: [{id}]) {{ data {{ id att_id def_id war_type reason turns_left winner_id date }} }} }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nation_detail_accepts_string_ids_and_nulls() {
        let json = r#"{
            "id": "590508",
            "nation_name": "Inazuma",
            "score": "1234.56",
            "num_cities": 12,
            "alliance_id": "13033",
            "alliance_position": "APPLICANT",
            "alliance": {"id": "13033", "name": "Home", "rank": 42},
            "soldiers": null,
            "money": 1500000.25,
            "project_bits": "1024",
            "last_active": "2024-05-01T10:00:00+00:00",
            "cities": [{"id": "1", "barracks": 5, "hangar": "5"}]
        }"#;
        let nation: NationDetail = serde_json::from_str(json).unwrap();
        assert_eq!(nation.id, 590508);
        assert_eq!(nation.score, 1234.56);
        assert_eq!(nation.alliance_id, 13033);
        assert_eq!(nation.soldiers, 0);
        assert_eq!(nation.project_bits, 1024);
        assert!(nation.is_applicant());
        assert!(nation.last_active.is_some());
        assert_eq!(nation.city_count(), 12);
        assert_eq!(nation.cities[0].hangar, 5);
        assert_eq!(nation.alliance.as_ref().and_then(|a| a.rank), Some(42));
    }

    #[test]
    fn test_envelope_with_errors() {
        let json = r#"{"errors": [{"message": "invalid api key"}]}"#;
        let resp: GraphqlResponse<NationsData> = serde_json::from_str(json).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.errors[0].message, "invalid api key");
    }

    #[test]
    fn test_war_outcome() {
        let war = WarDetail {
            att_id: 1,
            def_id: 2,
            winner_id: Some(2),
            ..Default::default()
        };
        assert_eq!(war.outcome(), WarOutcome::Defeat);
    }

    #[test]
    fn test_queries_embed_ids() {
        assert!(nation_query(42).contains("id: [42]"));
        assert!(alliance_members_query(13033, 1).contains("alliance_id: [13033]"));
        assert!(war_query(7).contains("wars(id: [7])"));
        assert!(alliance_query(9).contains("alliances(id: [9]"));
    }

    #[test]
    fn test_members_query_is_paginated() {
        let query = alliance_members_query(13033, 3);
        assert!(query.contains("page: 3"));
        assert!(query.contains("paginatorInfo { hasMorePages }"));

        let json = r#"{"nations": {"paginatorInfo": {"hasMorePages": true}, "data": [{"id": 1}]}}"#;
        let data: NationsData = serde_json::from_str(json).unwrap();
        assert!(data.nations.paginator_info.has_more_pages);
        let json = r#"{"nations": {"data": []}}"#;
        let data: NationsData = serde_json::from_str(json).unwrap();
        assert!(!data.nations.paginator_info.has_more_pages);
    }
}
