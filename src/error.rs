// Error taxonomy shared by the refresh pipeline, the raid search and the command layer.

use thiserror::Error;

/// A single failed call to the upstream game API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("upstream throttled the request")]
    Throttled,
    #[error("could not decode upstream payload: {0}")]
    Decode(String),
    #[error("could not read archive: {0}")]
    Archive(String),
}

// Request URLs carry the API key as a query parameter.
impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::Http(e.without_url())
    }
}

/// Errors that reach a caller of the bot's services.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),
    #[error("raid cache has not been loaded yet")]
    CacheNotReady,
    #[error("caller has no registered nation")]
    NotRegistered,
    #[error("{kind} {id} not found")]
    EntityNotFound { kind: &'static str, id: i64 },
    #[error("registration store error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("cache file error: {0}")]
    Persistence(String),
    #[error("operation timed out")]
    Timeout,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BotError {
    /// Stable label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::Configuration(_) => "configuration",
            BotError::UpstreamUnavailable(_) => "upstream_unavailable",
            BotError::CacheNotReady => "cache_not_ready",
            BotError::NotRegistered => "not_registered",
            BotError::EntityNotFound { .. } => "entity_not_found",
            BotError::Storage(_) => "storage",
            BotError::Persistence(_) => "persistence",
            BotError::Timeout => "timeout",
            BotError::InvalidArgument(_) => "invalid_argument",
        }
    }

    /// Short message that is safe to show to a chat user.
    pub fn user_message(&self) -> String {
        match self {
            BotError::Configuration(_) => "The bot is misconfigured. Please contact an admin.".into(),
            BotError::UpstreamUnavailable(_) => {
                "The game API is unavailable right now. Please try again later.".into()
            }
            BotError::CacheNotReady => {
                "Nation data is still loading. Please try again in a few minutes.".into()
            }
            BotError::NotRegistered => {
                "You need to register your nation first with /register, or pass a score.".into()
            }
            BotError::EntityNotFound { kind, id } => format!("No {kind} found with ID {id}."),
            BotError::Storage(_) | BotError::Persistence(_) => {
                "Something went wrong on our side. Please try again later.".into()
            }
            BotError::Timeout => "That took too long. Please try again.".into(),
            BotError::InvalidArgument(msg) => format!("Invalid input: {msg}."),
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BotError::CacheNotReady | BotError::UpstreamUnavailable(_) | BotError::Timeout
        )
    }
}

/// Failure of one refresh cycle. The store is untouched when this is returned.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("nations collection unavailable: {0}")]
    NationsUnavailable(UpstreamError),
    #[error("could not persist snapshot: {0}")]
    Persist(String),
}

impl From<RefreshError> for BotError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::NationsUnavailable(inner) => BotError::UpstreamUnavailable(inner),
            RefreshError::Persist(msg) => BotError::Persistence(msg),
        }
    }
}
