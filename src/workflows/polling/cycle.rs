use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::report::{CycleReport, FailureStage, FilteredUnit, UnitFailure};
use super::{FeedError, ListingFeed, PricingSource};
use crate::workflows::listings::{Listing, ListingFilter};
use crate::workflows::quotes::QuoteExtractor;

/// One fetch → filter → quote pass over the listing feed.
pub struct PollCycle {
    feed: Arc<dyn ListingFeed>,
    pricing: Arc<dyn PricingSource>,
    filter: ListingFilter,
    extractor: QuoteExtractor,
    concurrency: usize,
}

impl PollCycle {
    pub fn new(
        feed: Arc<dyn ListingFeed>,
        pricing: Arc<dyn PricingSource>,
        filter: ListingFilter,
        extractor: QuoteExtractor,
    ) -> Self {
        Self {
            feed,
            pricing,
            filter,
            extractor,
            concurrency: 1,
        }
    }

    /// Maximum number of units quoted at the same time.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub async fn run(&self) -> Result<CycleReport, FeedError> {
        let listings = self.feed.fetch_listings().await?;
        let fetched = listings.len();
        info!(count = fetched, "fetched listings");

        let matched = self.filter.apply(listings);
        let matched_count = matched.len();

        let outcomes: Vec<Result<FilteredUnit, UnitFailure>> = stream::iter(matched)
            .map(|listing| self.quote_unit(listing))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut quoted = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(unit) => quoted.push(unit),
                Err(failure) => failures.push(failure),
            }
        }

        info!(
            quoted = quoted.len(),
            failed = failures.len(),
            "poll cycle complete"
        );

        Ok(CycleReport {
            checked_at: Utc::now(),
            fetched,
            matched: matched_count,
            quoted,
            failures,
        })
    }

    async fn quote_unit(&self, listing: Listing) -> Result<FilteredUnit, UnitFailure> {
        let document = match self
            .pricing
            .fetch_pricing(&listing.id_value, listing.availability)
            .await
        {
            Ok(document) => document,
            Err(err) => {
                warn!(unit = %listing.unit, error = %err, "pricing fetch failed");
                return Err(UnitFailure::new(&listing, FailureStage::Fetch, err));
            }
        };

        match self.extractor.extract(document) {
            Ok(best) => {
                info!(
                    unit = %listing.unit,
                    quote = %format!("{:.2}", best.amount),
                    lease_months = best.lease_months,
                    basis = best.basis.label(),
                    "quoted unit"
                );
                Ok(FilteredUnit::new(listing, best))
            }
            Err(err) => {
                warn!(unit = %listing.unit, error = %err, "pricing extraction failed");
                Err(UnitFailure::new(&listing, FailureStage::Extract, err))
            }
        }
    }
}
