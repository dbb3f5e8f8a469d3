use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::report::{CycleReport, FilteredUnit, UnitFailure};
use super::{NotificationSink, NotifyError};

/// Maximum length of a Discord message body.
pub const DISCORD_CONTENT_LIMIT: usize = 2000;

const FENCE_OPEN: &str = "```json\n";
const FENCE_CLOSE: &str = "\n```";
const TRUNCATED: &str = "\n...";

#[derive(Serialize)]
struct NotificationBody<'a> {
    units: Vec<&'a FilteredUnit>,
    failures: &'a [UnitFailure],
}

#[derive(Serialize)]
struct DiscordMessage<'a> {
    content: &'a str,
    username: &'a str,
}

/// Renders the report as a fenced JSON block, cheapest unit first, cut to
/// fit within `limit` characters.
pub fn render_content(report: &CycleReport, limit: usize) -> Result<String, serde_json::Error> {
    let body = serde_json::to_string_pretty(&NotificationBody {
        units: report.cheapest_first(),
        failures: &report.failures,
    })?;

    let overhead = FENCE_OPEN.len() + FENCE_CLOSE.len();
    let body = if body.chars().count() + overhead > limit {
        let keep = limit.saturating_sub(overhead + TRUNCATED.len());
        let mut cut: String = body.chars().take(keep).collect();
        cut.push_str(TRUNCATED);
        cut
    } else {
        body
    };

    Ok(format!("{FENCE_OPEN}{body}{FENCE_CLOSE}"))
}

/// Posts cycle reports to a Discord-compatible webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(http: reqwest::Client, url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            username: username.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn deliver(&self, report: &CycleReport) -> Result<(), NotifyError> {
        let content = render_content(report, DISCORD_CONTENT_LIMIT)?;
        let message = DiscordMessage {
            content: &content,
            username: &self.username,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        info!(
            units = report.quoted.len(),
            failures = report.failures.len(),
            "delivered webhook notification"
        );
        Ok(())
    }
}

/// Writes cycle reports to the log; used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn deliver(&self, report: &CycleReport) -> Result<(), NotifyError> {
        for unit in report.cheapest_first() {
            info!(
                id = %unit.listing.id,
                unit = %unit.listing.unit,
                availability = %unit.listing.availability,
                quote = %format!("{:.2}", unit.quote),
                lease_months = unit.quote_lease_months,
                basis = unit.quote_basis.label(),
                "best quote"
            );
        }
        for failure in &report.failures {
            warn!(
                id = %failure.id,
                unit = %failure.unit,
                stage = failure.stage.label(),
                reason = %failure.reason,
                "unit not quoted"
            );
        }
        Ok(())
    }
}
