// Snapshot refresher: downloads the bulk collections, builds a new snapshot and
// swaps it into the store. One refresh runs at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::RefreshError;
use crate::metrics;
use crate::model::{CacheMetadata, Collection, NationSnapshot, Snapshot, WarRecord};
use crate::store::SnapshotStore;
use crate::upstream::{records, SnapshotSource};

/// Outcome of a successful refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStats {
    pub sizes: BTreeMap<String, usize>,
    /// Malformed rows dropped across all collections.
    pub skipped_rows: usize,
    /// Optional collections that failed and were left empty.
    pub degraded: Vec<Collection>,
    /// False when the content hash matched the previous snapshot.
    pub changed: bool,
    pub last_update: DateTime<Utc>,
    pub elapsed_ms: u128,
}

pub struct SnapshotRefresher {
    source: Arc<dyn SnapshotSource>,
    store: Arc<SnapshotStore>,
    in_flight: Mutex<()>,
}

impl SnapshotRefresher {
    pub fn new(source: Arc<dyn SnapshotSource>, store: Arc<SnapshotStore>) -> Self {
        Self {
            source,
            store,
            in_flight: Mutex::new(()),
        }
    }

    /// Whether a refresh currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Run one refresh. Concurrent callers queue behind the one in flight.
    /// On error the store is left exactly as it was.
    pub async fn refresh(&self) -> Result<RefreshStats, RefreshError> {
        let _guard = self.in_flight.lock().await;
        let started = Instant::now();
        info!("Snapshot refresh started");

        let result = self.refresh_locked(started).await;
        metrics::REFRESH_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(stats) => {
                let label = if stats.changed { "success" } else { "unchanged" };
                metrics::REFRESHES_TOTAL.with_label_values(&[label]).inc();
                info!(
                    "Snapshot refresh finished in {}ms: {:?} ({} rows skipped, degraded: {:?})",
                    stats.elapsed_ms, stats.sizes, stats.skipped_rows, stats.degraded
                );
            }
            Err(e) => {
                metrics::REFRESHES_TOTAL.with_label_values(&["failed"]).inc();
                error!("Snapshot refresh failed, keeping previous snapshot: {e}");
            }
        }
        result
    }

    async fn refresh_locked(&self, started: Instant) -> Result<RefreshStats, RefreshError> {
        let mut snapshot = Snapshot::default();
        let mut skipped_rows = 0;
        let mut degraded = Vec::new();

        for collection in Collection::ALL {
            let table = match self.source.fetch_table(collection).await {
                Ok(table) => table,
                Err(e) if collection.is_mandatory() => {
                    metrics::COLLECTION_FAILURES_TOTAL
                        .with_label_values(&[collection.as_str()])
                        .inc();
                    return Err(RefreshError::NationsUnavailable(e));
                }
                Err(e) => {
                    metrics::COLLECTION_FAILURES_TOTAL
                        .with_label_values(&[collection.as_str()])
                        .inc();
                    warn!("Could not download {collection}, continuing without it: {e}");
                    degraded.push(collection);
                    continue;
                }
            };

            let skipped = match collection {
                Collection::Alliances => {
                    let parsed = records::alliances(&table);
                    snapshot.alliances = parsed.records;
                    parsed.skipped
                }
                Collection::Nations => {
                    let parsed = records::nations(&table);
                    snapshot.nations = parsed.records;
                    parsed.skipped
                }
                Collection::Cities => {
                    let parsed = records::cities(&table);
                    snapshot.cities = parsed.records;
                    parsed.skipped
                }
                Collection::Wars => {
                    let parsed = records::wars(&table);
                    snapshot.wars = parsed.records;
                    parsed.skipped
                }
            };
            if skipped > 0 {
                metrics::ROWS_SKIPPED_TOTAL
                    .with_label_values(&[collection.as_str()])
                    .inc_by(skipped as u64);
            }
            skipped_rows += skipped;
            info!(
                "Fetched {collection}: {} rows kept, {skipped} skipped",
                snapshot.collection_len(collection)
            );
        }

        snapshot.nations.sort_by_key(|n| n.id);
        derive_defensive_wars(&mut snapshot.nations, &snapshot.wars);
        fill_alliance_names(&mut snapshot);

        let hash = content_hash(&snapshot)?;
        let previous = self.store.snapshot();
        let changed = previous
            .as_ref()
            .and_then(|p| p.metadata.content_hash.as_deref())
            != Some(hash.as_str());

        let last_update = Utc::now();
        let sizes: BTreeMap<String, usize> = Collection::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), snapshot.collection_len(*c)))
            .collect();
        snapshot.metadata = CacheMetadata {
            last_update: Some(last_update),
            source_collection_sizes: sizes.clone(),
            content_hash: Some(hash),
        };
        let snapshot = Arc::new(snapshot);

        if changed {
            let previous_nations = match &previous {
                Some(p) => Arc::new(p.nations.clone()),
                None => self.store.previous_nations(),
            };
            self.store
                .persist(snapshot.clone(), previous_nations.clone())
                .await
                .map_err(|e| RefreshError::Persist(e.to_string()))?;
            self.store.set_previous_nations(previous_nations);
        } else {
            info!("Snapshot content unchanged, skipping cache write");
        }
        self.store.swap(snapshot);

        Ok(RefreshStats {
            sizes,
            skipped_rows,
            degraded,
            changed,
            last_update,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}

/// Count active wars in which each nation is the defender.
pub fn derive_defensive_wars(nations: &mut [NationSnapshot], wars: &[WarRecord]) {
    let mut counts: HashMap<i64, u32> = HashMap::new();
    for war in wars.iter().filter(|w| w.is_active()) {
        *counts.entry(war.defender_id).or_default() += 1;
    }
    for nation in nations {
        nation.defensive_wars_active = counts.get(&nation.id).copied().unwrap_or(0);
    }
}

fn fill_alliance_names(snapshot: &mut Snapshot) {
    let names: HashMap<i64, &str> = snapshot
        .alliances
        .iter()
        .map(|a| (a.id, a.name.as_str()))
        .collect();
    for nation in snapshot.nations.iter_mut().filter(|n| n.alliance_name.is_none()) {
        if let Some(name) = names.get(&nation.alliance_id) {
            nation.alliance_name = Some(name.to_string());
        }
    }
}

/// Hex SHA-256 over the four collections (metadata excluded).
pub fn content_hash(snapshot: &Snapshot) -> Result<String, RefreshError> {
    let bytes = serde_json::to_vec(&(
        &snapshot.alliances,
        &snapshot.nations,
        &snapshot.cities,
        &snapshot.wars,
    ))
    .map_err(|e| RefreshError::Persist(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Refresh once in the background, e.g. right after startup.
pub fn spawn_refresh(refresher: Arc<SnapshotRefresher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Failures are logged inside `refresh`.
        let _ = refresher.refresh().await;
    })
}

/// Refresh every day at `hour_utc:00`.
pub fn spawn_refresh_scheduler(refresher: Arc<SnapshotRefresher>, hour_utc: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_run(Utc::now(), hour_utc);
            info!("Next scheduled refresh in {}m", wait.as_secs() / 60);
            tokio::time::sleep(wait).await;
            let _ = refresher.refresh().await;
        }
    })
}

/// Time from `now` until the next `hour_utc:00`, strictly in the future.
pub fn until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let next = match now.date_naive().and_hms_opt(hour_utc, 0, 0) {
        Some(today) if today.and_utc() > now => today.and_utc(),
        Some(today) => today.and_utc() + chrono::Duration::days(1),
        None => now + chrono::Duration::days(1),
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WarOutcome;
    use chrono::TimeZone;

    fn war(id: i64, defender_id: i64, turns_left: u32) -> WarRecord {
        WarRecord {
            id,
            attacker_id: 99,
            defender_id,
            outcome: WarOutcome::Pending,
            turns_left,
        }
    }

    #[test]
    fn test_derive_defensive_wars_counts_active_only() {
        let mut nations = vec![NationSnapshot::new(1, 10.0), NationSnapshot::new(2, 10.0)];
        let wars = vec![war(1, 1, 10), war(2, 1, 5), war(3, 1, 0), war(4, 2, 0)];
        derive_defensive_wars(&mut nations, &wars);
        assert_eq!(nations[0].defensive_wars_active, 2);
        assert_eq!(nations[1].defensive_wars_active, 0);
    }

    #[test]
    fn test_content_hash_ignores_metadata() {
        let mut a = Snapshot {
            nations: vec![NationSnapshot::new(1, 10.0)],
            ..Default::default()
        };
        let h1 = content_hash(&a).unwrap();
        a.metadata.last_update = Some(Utc::now());
        assert_eq!(content_hash(&a).unwrap(), h1);
        a.nations[0].score = 11.0;
        assert_ne!(content_hash(&a).unwrap(), h1);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_until_next_run() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(until_next_run(now, 12), Duration::from_secs(90 * 60));
        assert_eq!(
            until_next_run(now, 0),
            Duration::from_secs(13 * 3600 + 30 * 60)
        );
        // Exactly on the hour schedules the following day.
        let on_the_hour = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(until_next_run(on_the_hour, 0), Duration::from_secs(24 * 3600));
    }
}
