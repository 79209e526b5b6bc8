// Typed snapshot records for the four bulk collections.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four bulk collections, in the order a refresh downloads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Alliances,
    Nations,
    Cities,
    Wars,
}

impl Collection {
    /// Download order: alliance ranks are needed before nations can be judged.
    pub const ALL: [Collection; 4] = [
        Collection::Alliances,
        Collection::Nations,
        Collection::Cities,
        Collection::Wars,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Alliances => "alliances",
            Collection::Nations => "nations",
            Collection::Cities => "cities",
            Collection::Wars => "wars",
        }
    }

    /// Only the nations collection is mandatory for a refresh to succeed.
    pub fn is_mandatory(self) -> bool {
        matches!(self, Collection::Nations)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One nation at refresh time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationSnapshot {
    pub id: i64,
    pub name: String,
    pub leader: String,
    pub score: f64,
    pub cities: u32,
    /// 0 when the nation is not in an alliance.
    pub alliance_id: i64,
    #[serde(default)]
    pub alliance_name: Option<String>,
    pub soldiers: u64,
    pub tanks: u64,
    pub aircraft: u64,
    pub ships: u64,
    pub spies: u64,
    pub missiles: u64,
    pub nukes: u64,
    pub vacation_turns_remaining: u32,
    pub beige_turns_remaining: u32,
    pub defensive_wars_active: u32,
    pub gdp: f64,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub color: String,
}

impl NationSnapshot {
    /// A blank nation with the given id and score; handy for building fixtures.
    pub fn new(id: i64, score: f64) -> Self {
        Self {
            id,
            name: format!("Nation {id}"),
            leader: String::new(),
            score,
            cities: 1,
            alliance_id: 0,
            alliance_name: None,
            soldiers: 0,
            tanks: 0,
            aircraft: 0,
            ships: 0,
            spies: 0,
            missiles: 0,
            nukes: 0,
            vacation_turns_remaining: 0,
            beige_turns_remaining: 0,
            defensive_wars_active: 0,
            gdp: 0.0,
            last_active: None,
            color: String::new(),
        }
    }

    pub fn in_alliance(&self) -> bool {
        self.alliance_id != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllianceSnapshot {
    pub id: i64,
    /// 1 is the strongest alliance.
    pub rank: u32,
    pub name: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub id: i64,
    pub nation_id: i64,
    pub name: String,
    pub infrastructure: f64,
    pub land: f64,
}

/// War result from the aggressor's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarOutcome {
    Victory,
    Defeat,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarRecord {
    pub id: i64,
    pub attacker_id: i64,
    pub defender_id: i64,
    pub outcome: WarOutcome,
    /// 0 once the war has concluded.
    pub turns_left: u32,
}

impl WarRecord {
    pub fn is_active(&self) -> bool {
        self.turns_left > 0
    }
}

/// When the snapshot was taken and how big each collection was.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Unset until the first fully successful refresh.
    pub last_update: Option<DateTime<Utc>>,
    pub source_collection_sizes: BTreeMap<String, usize>,
    /// Hex digest of the collections, used to skip redundant writes.
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// A full bulk pull. Built whole by a refresh and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub alliances: Vec<AllianceSnapshot>,
    /// Sorted by id; [`Snapshot::nation`] relies on it.
    pub nations: Vec<NationSnapshot>,
    pub cities: Vec<CityRecord>,
    pub wars: Vec<WarRecord>,
    pub metadata: CacheMetadata,
}

impl Snapshot {
    pub fn collection_len(&self, collection: Collection) -> usize {
        match collection {
            Collection::Alliances => self.alliances.len(),
            Collection::Nations => self.nations.len(),
            Collection::Cities => self.cities.len(),
            Collection::Wars => self.wars.len(),
        }
    }

    pub fn nation(&self, id: i64) -> Option<&NationSnapshot> {
        self.nations
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|i| &self.nations[i])
    }

    pub fn alliance(&self, id: i64) -> Option<&AllianceSnapshot> {
        self.alliances.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_order_puts_alliances_first() {
        assert_eq!(Collection::ALL[0], Collection::Alliances);
        assert_eq!(Collection::ALL[1], Collection::Nations);
        assert!(Collection::Nations.is_mandatory());
        assert!(!Collection::Cities.is_mandatory());
    }

    #[test]
    fn test_war_is_active() {
        let war = WarRecord {
            id: 1,
            attacker_id: 10,
            defender_id: 20,
            outcome: WarOutcome::Pending,
            turns_left: 12,
        };
        assert!(war.is_active());
        assert!(!WarRecord { turns_left: 0, ..war }.is_active());
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = Snapshot {
            nations: vec![NationSnapshot::new(7, 100.0)],
            ..Default::default()
        };
        assert_eq!(snapshot.nation(7).map(|n| n.score), Some(100.0));
        assert!(snapshot.nation(8).is_none());

        assert_eq!(snapshot.collection_len(Collection::Nations), 1);
        assert_eq!(snapshot.collection_len(Collection::Wars), 0);

        let snapshot = Snapshot {
            nations: (1..=50).map(|id| NationSnapshot::new(id * 3, id as f64)).collect(),
            ..Default::default()
        };
        assert_eq!(snapshot.nation(3).map(|n| n.score), Some(1.0));
        assert_eq!(snapshot.nation(150).map(|n| n.score), Some(50.0));
        assert_eq!(snapshot.nation(75).map(|n| n.score), Some(25.0));
        assert!(snapshot.nation(76).is_none());
        assert!(snapshot.nation(0).is_none());
        assert!(snapshot.nation(151).is_none());
    }
}
