// Upstream game API: bulk collection downloads and single-entity lookups.

pub mod client;
pub mod graphql;
pub mod records;
pub mod tabular;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::model::Collection;

pub use client::{PnwClient, RetryPolicy};
pub use graphql::{AllianceDetail, CityDetail, NationDetail, WarDetail};
pub use records::Parsed;
pub use tabular::Table;

/// Source of the four bulk collections a refresh is built from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Download one collection as a coerced table.
    async fn fetch_table(&self, collection: Collection) -> Result<Table, UpstreamError>;
}

/// Live lookups of single entities. `Ok(None)` means the id does not exist.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn nation(&self, id: i64) -> Result<Option<NationDetail>, UpstreamError>;
    async fn alliance(&self, id: i64) -> Result<Option<AllianceDetail>, UpstreamError>;
    async fn war(&self, id: i64) -> Result<Option<WarDetail>, UpstreamError>;
    /// Current members (and applicants) of an alliance, vacation mode excluded.
    async fn alliance_members(&self, alliance_id: i64) -> Result<Vec<NationDetail>, UpstreamError>;
}
