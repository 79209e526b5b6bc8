use std::sync::Arc;

use tracing::{error, info};

use raiden_bot::audit::AuditEngine;
use raiden_bot::bot::{self, Data};
use raiden_bot::config::Config;
use raiden_bot::db::Database;
use raiden_bot::raid::RaidSearch;
use raiden_bot::refresh::{self, SnapshotRefresher};
use raiden_bot::store::SnapshotStore;
use raiden_bot::upstream::PnwClient;
use raiden_bot::{api, metrics};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let db = match Database::new(&config.database_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open registration store: {e}");
            std::process::exit(1);
        }
    };

    let client = match PnwClient::from_config(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build game API client: {e}");
            std::process::exit(1);
        }
    };

    // A cache from a previous run serves searches until the first refresh lands.
    let store = Arc::new(SnapshotStore::open(&config.cache_path));
    let refresher = Arc::new(SnapshotRefresher::new(client.clone(), store.clone()));
    refresh::spawn_refresh(refresher.clone());
    refresh::spawn_refresh_scheduler(refresher.clone(), config.refresh_hour_utc);

    let ops = api::router(store.clone(), refresher.clone());
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(port, ops).await {
            error!("Ops server stopped: {e}");
        }
    });

    let data = Data {
        raids: RaidSearch::new(store.clone(), config.alliance_id),
        audits: AuditEngine::new(client.clone(), store.clone(), db.clone(), config.alliance_id),
        api: client,
        config,
        store,
        refresher,
        db,
    };

    info!("Starting Discord client");
    if let Err(e) = bot::run(data).await {
        error!("Discord client stopped: {e}");
        std::process::exit(1);
    }
}
