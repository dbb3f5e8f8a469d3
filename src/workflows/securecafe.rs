//! HTTP adapters for the property website's listing feed and the
//! SecureCafe pricing matrix endpoint.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::workflows::listings::Listing;
use crate::workflows::polling::{
    FeedError, ListingFeed, PricingDocument, PricingFetchError, PricingSource,
};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Format expected by the pricing endpoint's `UnitAvailableDate` parameter.
pub const AVAILABLE_DATE_FORMAT: &str = "%m/%d/%Y";

/// Builds the shared HTTP client. Every request is marked as an XHR, which
/// both endpoints require.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
}

#[derive(Debug, Clone)]
pub struct SecureCafeClient {
    http: reqwest::Client,
    listings_url: String,
    pricing_url: String,
}

impl SecureCafeClient {
    pub fn new(
        http: reqwest::Client,
        listings_url: impl Into<String>,
        pricing_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            listings_url: listings_url.into(),
            pricing_url: pricing_url.into(),
        }
    }
}

#[async_trait]
impl ListingFeed for SecureCafeClient {
    async fn fetch_listings(&self) -> Result<Vec<Listing>, FeedError> {
        let response = self
            .http
            .post(&self.listings_url)
            .form(&[("action", "available-units")])
            .send()
            .await
            .map_err(|err| FeedError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| FeedError::Transport(err.to_string()))?;
        debug!(bytes = body.len(), "received listing feed");

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl PricingSource for SecureCafeClient {
    async fn fetch_pricing(
        &self,
        id_value: &str,
        availability: NaiveDate,
    ) -> Result<PricingDocument, PricingFetchError> {
        let available_date = availability.format(AVAILABLE_DATE_FORMAT).to_string();
        let response = self
            .http
            .get(&self.pricing_url)
            .query(&[
                ("contentclass", "pricingmatrix"),
                ("UnitId", id_value),
                ("UnitAvailableDate", available_date.as_str()),
            ])
            .send()
            .await
            .map_err(|err| PricingFetchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PricingFetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| PricingFetchError::Transport(err.to_string()))?;
        debug!(unit_id = id_value, bytes = body.len(), "received pricing matrix");

        Ok(Box::new(Cursor::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_available_date_as_month_day_year() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 5).expect("valid date");
        assert_eq!(date.format(AVAILABLE_DATE_FORMAT).to_string(), "06/05/2023");
    }

    #[test]
    fn builds_client_with_timeout() {
        assert!(build_http_client(Duration::from_secs(5)).is_ok());
    }
}
