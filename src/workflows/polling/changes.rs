use std::collections::BTreeMap;

use serde::Serialize;

use super::report::{CycleReport, FilteredUnit};

/// Difference between two consecutive cycle reports for one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum QuoteChange {
    Listed { id: String, unit: String, quote: f64 },
    Unlisted { id: String, unit: String },
    Repriced {
        id: String,
        unit: String,
        previous: f64,
        current: f64,
    },
}

/// Quotes are compared at cent precision.
fn cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn by_id(report: &CycleReport) -> BTreeMap<&str, &FilteredUnit> {
    report
        .quoted
        .iter()
        .map(|unit| (unit.listing.id.as_str(), unit))
        .collect()
}

/// Compares quoted units between cycles. Without a previous report every
/// quoted unit counts as newly listed.
pub fn detect_changes(previous: Option<&CycleReport>, current: &CycleReport) -> Vec<QuoteChange> {
    let before = previous.map(by_id).unwrap_or_default();
    let after = by_id(current);
    let mut changes = Vec::new();

    for unit in &current.quoted {
        let id = unit.listing.id.as_str();
        match before.get(id) {
            None => changes.push(QuoteChange::Listed {
                id: id.to_string(),
                unit: unit.listing.unit.clone(),
                quote: unit.quote,
            }),
            Some(old) if cents(old.quote) != cents(unit.quote) => {
                changes.push(QuoteChange::Repriced {
                    id: id.to_string(),
                    unit: unit.listing.unit.clone(),
                    previous: old.quote,
                    current: unit.quote,
                })
            }
            Some(_) => {}
        }
    }

    for (id, old) in &before {
        if !after.contains_key(id) {
            changes.push(QuoteChange::Unlisted {
                id: id.to_string(),
                unit: old.listing.unit.clone(),
            });
        }
    }

    changes
}
