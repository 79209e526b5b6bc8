// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{AUDIT_PAGE_SIZE, RAID_PAGE_SIZE};
use crate::error::BotError;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token.
    pub bot_token: String,
    /// Static key appended to every game API request.
    pub api_key: String,
    /// Home alliance: audited, and never offered as a raid target.
    pub alliance_id: i64,
    /// Chat user allowed to force a cache refresh.
    pub admin_user_id: Option<u64>,
    /// Registration store connection string (SQLite).
    pub database_url: String,
    /// Location of the persisted raid cache.
    pub cache_path: PathBuf,
    /// Port for the ops HTTP server (health, metrics, cache status).
    pub port: u16,
    /// Hour of day (UTC) at which the daily refresh runs.
    pub refresh_hour_utc: u32,
    /// Base URL of the GraphQL API.
    pub api_base_url: String,
    /// Base URL of the daily bulk data files.
    pub data_base_url: String,
    pub raid_page_size: usize,
    pub audit_page_size: usize,
    /// Upper bound for any user-facing upstream call.
    pub command_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Required environment variables:
    /// - `BOT_TOKEN` - Discord bot token
    /// - `PNW_API_KEY` - game API key
    /// - `ALLIANCE_ID` - home alliance id
    ///
    /// Optional:
    /// - `DATABASE_URL` (default: `sqlite:raiden.db?mode=rwc`)
    /// - `CACHE_PATH` (default: `data/raid_cache.json.gz`)
    /// - `PORT` (default: 3000), overridable with `--port <PORT>`
    /// - `REFRESH_HOUR_UTC` (default: 0)
    /// - `PNW_API_URL`, `PNW_DATA_URL`
    /// - `RAID_PAGE_SIZE` (default: 6), `AUDIT_PAGE_SIZE` (default: 9)
    /// - `COMMAND_TIMEOUT_SECS` (default: 30)
    /// - `ADMIN_USER_ID`
    pub fn load() -> Result<Self, BotError> {
        let args: Vec<String> = std::env::args().collect();
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Some(port) = Self::parse_cli_value(&args, "--port").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| BotError::Configuration(format!("{key} is required")))
        };

        let bot_token = required("BOT_TOKEN")?;
        let api_key = required("PNW_API_KEY")?;
        let alliance_id = required("ALLIANCE_ID")?
            .trim()
            .parse::<i64>()
            .map_err(|_| BotError::Configuration("ALLIANCE_ID must be an integer".into()))?;

        let admin_user_id = lookup("ADMIN_USER_ID").and_then(|v| v.trim().parse().ok());

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:raiden.db?mode=rwc".to_string());
        let cache_path = lookup("CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/raid_cache.json.gz"));

        let port = lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(3000);
        let refresh_hour_utc = lookup("REFRESH_HOUR_UTC")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|h| *h < 24)
            .unwrap_or(0);

        let api_base_url = lookup("PNW_API_URL")
            .unwrap_or_else(|| "https://api.politicsandwar.com".to_string());
        let data_base_url = lookup("PNW_DATA_URL")
            .unwrap_or_else(|| "https://politicsandwar.com/data".to_string());

        let raid_page_size = lookup("RAID_PAGE_SIZE")
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(RAID_PAGE_SIZE);
        let audit_page_size = lookup("AUDIT_PAGE_SIZE")
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(AUDIT_PAGE_SIZE);

        let command_timeout = Duration::from_secs(
            lookup("COMMAND_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        );

        Ok(Config {
            bot_token,
            api_key,
            alliance_id,
            admin_user_id,
            database_url,
            cache_path,
            port,
            refresh_hour_utc,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            data_base_url: data_base_url.trim_end_matches('/').to_string(),
            raid_page_size,
            audit_page_size,
            command_timeout,
        })
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
