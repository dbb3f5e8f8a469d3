use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

/// An available rental unit as reported by the listing feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub unit: String,
    /// Identifier used by the pricing service for this unit.
    pub id_value: String,
    pub bedroom: String,
    #[serde(default)]
    pub sq_ft: u32,
    #[serde(default)]
    pub min_rent: u32,
    #[serde(default)]
    pub max_rent: u32,
    #[serde(deserialize_with = "deserialize_availability")]
    pub availability: NaiveDate,
    #[serde(default)]
    pub floor: String,
}

/// Open interval of acceptable move-in dates. Both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub after: NaiveDate,
    pub before: NaiveDate,
}

impl AvailabilityWindow {
    pub fn new(after: NaiveDate, before: NaiveDate) -> Self {
        Self { after, before }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date > self.after && date < self.before
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub bedroom: String,
    pub window: AvailabilityWindow,
}

/// Selects the listings matching a bedroom label and move-in window.
#[derive(Debug, Clone)]
pub struct ListingFilter {
    criteria: SearchCriteria,
}

impl ListingFilter {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self { criteria }
    }

    /// Returns the matching listings in their original order.
    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let by_bedroom: Vec<Listing> = listings
            .into_iter()
            .filter(|listing| listing.bedroom == self.criteria.bedroom)
            .collect();
        info!(
            bedroom = %self.criteria.bedroom,
            count = by_bedroom.len(),
            "filtered listings by bedroom type"
        );

        let in_window: Vec<Listing> = by_bedroom
            .into_iter()
            .filter(|listing| self.criteria.window.contains(listing.availability))
            .collect();
        info!(
            after = %self.criteria.window.after,
            before = %self.criteria.window.before,
            count = in_window.len(),
            "filtered listings by move-in date"
        );

        in_window
    }
}

fn deserialize_availability<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_availability(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised availability '{raw}'")))
}

/// Accepts RFC 3339 timestamps, naive timestamps and plain dates.
pub fn parse_availability(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn listing(id: &str, bedroom: &str, availability: NaiveDate) -> Listing {
        Listing {
            id: id.to_string(),
            unit: format!("Unit {id}"),
            id_value: format!("pv-{id}"),
            bedroom: bedroom.to_string(),
            sq_ft: 480,
            min_rent: 2800,
            max_rent: 3400,
            availability,
            floor: "4".to_string(),
        }
    }

    fn studio_filter() -> ListingFilter {
        ListingFilter::new(SearchCriteria {
            bedroom: "Studio".to_string(),
            window: AvailabilityWindow::new(date(2023, 6, 1), date(2023, 7, 10)),
        })
    }

    #[test]
    fn keeps_matching_listings_in_input_order() {
        let listings = vec![
            listing("c", "Studio", date(2023, 6, 20)),
            listing("x", "1 Bedroom", date(2023, 6, 20)),
            listing("a", "Studio", date(2023, 6, 2)),
            listing("late", "Studio", date(2023, 8, 1)),
            listing("b", "Studio", date(2023, 7, 9)),
        ];

        let ids: Vec<String> = studio_filter()
            .apply(listings)
            .into_iter()
            .map(|listing| listing.id)
            .collect();

        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn window_bounds_are_exclusive() {
        let listings = vec![
            listing("on-start", "Studio", date(2023, 6, 1)),
            listing("on-end", "Studio", date(2023, 7, 10)),
        ];

        assert!(studio_filter().apply(listings).is_empty());
    }

    #[test]
    fn bedroom_match_is_exact() {
        let listings = vec![
            listing("lower", "studio", date(2023, 6, 15)),
            listing("suffix", "Studio Plus", date(2023, 6, 15)),
        ];

        assert!(studio_filter().apply(listings).is_empty());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(studio_filter().apply(Vec::new()).is_empty());
    }

    #[test]
    fn deserializes_feed_records_with_timestamps() {
        let raw = r#"[
            {"id":"101","unit":"0412","id_value":"9981","bedroom":"Studio","sq_ft":455,
             "min_rent":2950,"max_rent":3310,"availability":"2023-06-15T00:00:00Z","floor":"4"},
            {"id":"102","unit":"0518","id_value":"9982","bedroom":"Studio",
             "availability":"2023-06-20"}
        ]"#;

        let listings: Vec<Listing> = serde_json::from_str(raw).expect("feed parses");

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].availability, date(2023, 6, 15));
        assert_eq!(listings[1].availability, date(2023, 6, 20));
        assert_eq!(listings[1].sq_ft, 0);
    }

    #[test]
    fn rejects_unrecognised_availability() {
        let raw =
            r#"{"id":"1","unit":"1","id_value":"1","bedroom":"Studio","availability":"soon"}"#;
        assert!(serde_json::from_str::<Listing>(raw).is_err());
    }
}
