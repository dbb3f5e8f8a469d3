mod changes;
mod cycle;
mod notify;
mod report;
mod watcher;

use std::io::BufRead;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::workflows::listings::Listing;

pub use changes::{detect_changes, QuoteChange};
pub use cycle::PollCycle;
pub use notify::{render_content, LogNotifier, WebhookNotifier, DISCORD_CONTENT_LIMIT};
pub use report::{CycleReport, FailureStage, FilteredUnit, UnitFailure};
pub use watcher::{LatestReport, TickOutcome, Watcher};

/// Source of the raw listing set for one poll cycle.
#[async_trait]
pub trait ListingFeed: Send + Sync {
    async fn fetch_listings(&self) -> Result<Vec<Listing>, FeedError>;
}

/// A unit's pricing matrix markup, read once by the extraction that owns it.
pub type PricingDocument = Box<dyn BufRead + Send>;

/// Source of a unit's pricing matrix markup.
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn fetch_pricing(
        &self,
        id_value: &str,
        availability: NaiveDate,
    ) -> Result<PricingDocument, PricingFetchError>;
}

/// Delivery channel for cycle reports.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, report: &CycleReport) -> Result<(), NotifyError>;
}

/// The listing feed could not be fetched or decoded.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("listing feed request failed: {0}")]
    Transport(String),
    #[error("listing feed returned status {0}")]
    Status(u16),
    #[error("listing feed body is not valid listing JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PricingFetchError {
    #[error("pricing request failed: {0}")]
    Transport(String),
    #[error("pricing service returned status {0}")]
    Status(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected with status {0}")]
    Rejected(u16),
    #[error("failed to render notification: {0}")]
    Render(#[from] serde_json::Error),
}
