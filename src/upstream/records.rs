// Typed conversion of bulk table rows into snapshot records.
//
// A row that lacks a usable id (or, for nations, a usable score) is skipped and
// counted; it never aborts the whole collection.

use std::cmp::Ordering;

use crate::model::{AllianceSnapshot, CityRecord, NationSnapshot, WarOutcome, WarRecord};

use super::tabular::{Row, Table};

/// Records converted from one table plus the number of rows that were rejected.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

fn convert<T>(table: &Table, kind: &str, f: impl Fn(Row<'_>) -> Result<T, String>) -> Parsed<T> {
    let mut records = Vec::with_capacity(table.len());
    let mut skipped = 0;
    for (index, row) in table.rows().enumerate() {
        match f(row) {
            Ok(record) => records.push(record),
            Err(reason) => {
                skipped += 1;
                tracing::debug!("Skipping malformed {kind} row {}: {reason}", index + 1);
            }
        }
    }
    Parsed { records, skipped }
}

fn positive_id(row: &Row<'_>, column: &str) -> Result<i64, String> {
    match row.int(column) {
        Some(id) if id > 0 => Ok(id),
        Some(id) => Err(format!("{column} {id} is not a valid id")),
        None => Err(format!("{column} is missing")),
    }
}

/// Alliance ids of 0 and placeholder text such as "None" both mean no alliance.
fn alliance_ref(row: &Row<'_>) -> i64 {
    row.int("alliance_id").filter(|id| *id > 0).unwrap_or(0)
}

fn alliance_name(row: &Row<'_>) -> Option<String> {
    row.text("alliance")
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("none"))
}

pub fn nations(table: &Table) -> Parsed<NationSnapshot> {
    convert(table, "nation", |row| {
        let id = positive_id(&row, "nation_id")?;
        let score = row
            .float("score")
            .filter(|s| *s >= 0.0)
            .ok_or_else(|| "score is missing or negative".to_string())?;

        let alliance_id = alliance_ref(&row);
        Ok(NationSnapshot {
            id,
            name: row.text("nation_name").unwrap_or_default(),
            leader: row.text("leader_name").unwrap_or_default(),
            score,
            cities: row.count("cities") as u32,
            alliance_id,
            alliance_name: if alliance_id == 0 { None } else { alliance_name(&row) },
            soldiers: row.count("soldiers"),
            tanks: row.count("tanks"),
            aircraft: row.count("aircraft"),
            ships: row.count("ships"),
            spies: row.count("spies"),
            missiles: row.count("missiles"),
            nukes: row.count("nukes"),
            vacation_turns_remaining: row.first_of(&["vm_turns", "vacation_turns"]).as_i64().unwrap_or(0).max(0) as u32,
            beige_turns_remaining: row
                .first_of(&["beige_turns_remaining", "beige_turns"])
                .as_i64()
                .unwrap_or(0)
                .max(0) as u32,
            // Derived from the wars collection once it is available.
            defensive_wars_active: 0,
            gdp: row.float("gdp").filter(|g| *g >= 0.0).unwrap_or(0.0),
            last_active: row.timestamp(&["last_active", "date_created"]),
            color: row.text("color").unwrap_or_default(),
        })
    })
}

/// Alliances ranked by score, strongest first. The dumps carry no rank column.
pub fn alliances(table: &Table) -> Parsed<AllianceSnapshot> {
    let mut parsed = convert(table, "alliance", |row| {
        let id = positive_id(&row, "alliance_id")?;
        Ok(AllianceSnapshot {
            id,
            rank: 0,
            name: row
                .first_of(&["name", "alliance_name"])
                .as_text()
                .unwrap_or_default(),
            score: row.float("score").unwrap_or(0.0).max(0.0),
        })
    });
    assign_ranks(&mut parsed.records);
    parsed
}

/// Order alliances by score descending (ties by id) and number them from 1.
pub fn assign_ranks(alliances: &mut [AllianceSnapshot]) {
    alliances.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    for (i, alliance) in alliances.iter_mut().enumerate() {
        alliance.rank = i as u32 + 1;
    }
}

pub fn cities(table: &Table) -> Parsed<CityRecord> {
    convert(table, "city", |row| {
        Ok(CityRecord {
            id: positive_id(&row, "city_id")?,
            nation_id: positive_id(&row, "nation_id")?,
            name: row.text("name").unwrap_or_default(),
            infrastructure: row.float("infrastructure").unwrap_or(0.0),
            land: row.float("land").unwrap_or(0.0),
        })
    })
}

pub fn wars(table: &Table) -> Parsed<WarRecord> {
    convert(table, "war", |row| {
        let id = positive_id(&row, "war_id")?;
        let attacker_id = positive_id(&row, "aggressor_nation_id")?;
        let defender_id = positive_id(&row, "defender_nation_id")?;
        let winner = row.first_of(&["winner_id", "winner"]).as_i64();
        Ok(WarRecord {
            id,
            attacker_id,
            defender_id,
            outcome: outcome_for(attacker_id, defender_id, winner),
            turns_left: row.int("turns_left").unwrap_or(0).max(0) as u32,
        })
    })
}

/// War result from the aggressor's point of view.
pub fn outcome_for(attacker_id: i64, defender_id: i64, winner: Option<i64>) -> WarOutcome {
    match winner {
        Some(w) if w == attacker_id => WarOutcome::Victory,
        Some(w) if w == defender_id => WarOutcome::Defeat,
        _ => WarOutcome::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nations_skip_rows_without_id_or_score() {
        let table = Table::parse(
            "nation_id,nation_name,score,cities,alliance_id,alliance,vm_turns,beige_turns_remaining,soldiers\n\
             1,Alpha,1000.5,10,0,None,0,0,5000\n\
             ,Missing,500,3,0,None,0,0,0\n\
             3,NoScore,,3,0,None,0,0,0\n\
             4,Delta,800,5,77,Rose,2,1,\n",
        );
        let parsed = nations(&table);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped, 2);

        let alpha = &parsed.records[0];
        assert_eq!(alpha.id, 1);
        assert_eq!(alpha.alliance_id, 0);
        assert!(alpha.alliance_name.is_none());
        assert_eq!(alpha.soldiers, 5000);

        let delta = &parsed.records[1];
        assert_eq!(delta.alliance_id, 77);
        assert_eq!(delta.alliance_name.as_deref(), Some("Rose"));
        assert_eq!(delta.vacation_turns_remaining, 2);
        assert_eq!(delta.beige_turns_remaining, 1);
        assert_eq!(delta.soldiers, 0);
    }

    #[test]
    fn test_alliances_ranked_by_score() {
        let table = Table::parse("alliance_id,name,score\n5,Small,10\n6,Big,900\n7,Mid,300\n8,Tie,300\n");
        let parsed = alliances(&table);
        let ranked: Vec<(i64, u32)> = parsed.records.iter().map(|a| (a.id, a.rank)).collect();
        assert_eq!(ranked, vec![(6, 1), (7, 2), (8, 3), (5, 4)]);
    }

    #[test]
    fn test_wars_outcome_from_winner() {
        let table = Table::parse(
            "war_id,aggressor_nation_id,defender_nation_id,turns_left,winner_id\n\
             1,10,20,0,10\n\
             2,10,30,0,30\n\
             3,10,40,12,\n\
             4,,40,12,\n",
        );
        let parsed = wars(&table);
        assert_eq!(parsed.skipped, 1);
        let outcomes: Vec<WarOutcome> = parsed.records.iter().map(|w| w.outcome).collect();
        assert_eq!(
            outcomes,
            vec![WarOutcome::Victory, WarOutcome::Defeat, WarOutcome::Pending]
        );
        assert_eq!(parsed.records[2].turns_left, 12);
    }

    #[test]
    fn test_cities_require_both_ids() {
        let table = Table::parse("city_id,nation_id,name,infrastructure,land\n1,10,Capital,1500.5,2000\n2,,Orphan,10,10\n");
        let parsed = cities(&table);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.records[0].infrastructure, 1500.5);
    }
}
