use std::io;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::workflows::listings::Listing;
use crate::workflows::quotes::{BestQuote, QuoteBasis};

/// A listing that survived filtering, with its best quote attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredUnit {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(serialize_with = "serialize_cents")]
    pub quote: f64,
    pub quote_lease_months: u32,
    pub quote_basis: QuoteBasis,
}

impl FilteredUnit {
    pub fn new(listing: Listing, best: BestQuote) -> Self {
        Self {
            listing,
            quote: best.amount,
            quote_lease_months: best.lease_months,
            quote_basis: best.basis,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Extract,
}

impl FailureStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
        }
    }
}

/// A unit whose quote could not be derived this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub id: String,
    pub unit: String,
    pub availability: NaiveDate,
    pub stage: FailureStage,
    pub reason: String,
}

impl UnitFailure {
    pub fn new(listing: &Listing, stage: FailureStage, reason: impl ToString) -> Self {
        Self {
            id: listing.id.clone(),
            unit: listing.unit.clone(),
            availability: listing.availability,
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub checked_at: DateTime<Utc>,
    pub fetched: usize,
    pub matched: usize,
    pub quoted: Vec<FilteredUnit>,
    pub failures: Vec<UnitFailure>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.quoted.is_empty() && self.failures.is_empty()
    }

    /// Units ordered from cheapest best quote upwards.
    pub fn cheapest_first(&self) -> Vec<&FilteredUnit> {
        let mut units: Vec<&FilteredUnit> = self.quoted.iter().collect();
        units.sort_by(|a, b| a.quote.total_cmp(&b.quote));
        units
    }

    /// Writes one CSV row per unit; failed units carry an empty quote and
    /// their failure reason.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "id",
            "unit",
            "bedroom",
            "sq_ft",
            "floor",
            "availability",
            "min_rent",
            "max_rent",
            "quote",
            "quote_lease_months",
            "quote_basis",
            "failure",
        ])?;

        for unit in &self.quoted {
            let listing = &unit.listing;
            csv_writer.write_record([
                listing.id.clone(),
                listing.unit.clone(),
                listing.bedroom.clone(),
                listing.sq_ft.to_string(),
                listing.floor.clone(),
                listing.availability.to_string(),
                listing.min_rent.to_string(),
                listing.max_rent.to_string(),
                format!("{:.2}", unit.quote),
                unit.quote_lease_months.to_string(),
                unit.quote_basis.label().to_string(),
                String::new(),
            ])?;
        }

        for failure in &self.failures {
            let availability = failure.availability.to_string();
            let reason = format!("{}: {}", failure.stage.label(), failure.reason);
            csv_writer.write_record([
                failure.id.as_str(),
                failure.unit.as_str(),
                "",
                "",
                "",
                availability.as_str(),
                "",
                "",
                "",
                "",
                "",
                reason.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn serialize_cents<S>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64((amount * 100.0).round() / 100.0)
}
