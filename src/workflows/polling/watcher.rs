use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::changes::{detect_changes, QuoteChange};
use super::cycle::PollCycle;
use super::report::CycleReport;
use super::{FeedError, NotificationSink};

/// Most recent successful cycle report, shared with the status server.
pub type LatestReport = Arc<RwLock<Option<CycleReport>>>;

/// Runs poll cycles on an interval and notifies on changes.
///
/// Changes are measured against the last report the sink accepted, so a
/// failed delivery is retried on the next cycle.
pub struct Watcher {
    cycle: PollCycle,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
    notify_on_change_only: bool,
    latest: LatestReport,
    delivered: RwLock<Option<CycleReport>>,
}

/// Result of a single watcher tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub report: CycleReport,
    pub changes: Vec<QuoteChange>,
    pub notified: bool,
}

impl Watcher {
    pub fn new(cycle: PollCycle, sink: Arc<dyn NotificationSink>, interval: Duration) -> Self {
        Self {
            cycle,
            sink,
            interval,
            notify_on_change_only: true,
            latest: Arc::new(RwLock::new(None)),
            delivered: RwLock::new(None),
        }
    }

    pub fn notify_on_change_only(mut self, enabled: bool) -> Self {
        self.notify_on_change_only = enabled;
        self
    }

    pub fn latest(&self) -> LatestReport {
        self.latest.clone()
    }

    /// Runs one cycle. Feed failures are returned without touching the
    /// latest report. Notification failures are logged and leave the
    /// delivered baseline where it was.
    pub async fn tick(&self) -> Result<TickOutcome, FeedError> {
        let report = self.cycle.run().await?;
        let baseline = self.delivered.read().await.clone();

        let changes = detect_changes(baseline.as_ref(), &report);
        let failures_changed = failure_ids(baseline.as_ref()) != failure_ids(Some(&report));
        let should_notify =
            !self.notify_on_change_only || !changes.is_empty() || failures_changed;

        let mut notified = false;
        if should_notify {
            match self.sink.deliver(&report).await {
                Ok(()) => {
                    *self.delivered.write().await = Some(report.clone());
                    notified = true;
                }
                Err(err) => warn!(
                    error = %err,
                    pending_changes = changes.len(),
                    "notification delivery failed; retrying next cycle"
                ),
            }
        } else {
            info!("no quote changes since last notification");
        }

        *self.latest.write().await = Some(report.clone());

        Ok(TickOutcome {
            report,
            changes,
            notified,
        })
    }

    /// Polls forever. A failed cycle is skipped and retried at the next
    /// interval.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(outcome) => info!(
                    changes = outcome.changes.len(),
                    notified = outcome.notified,
                    "watch cycle finished"
                ),
                Err(err) => error!(error = %err, "poll cycle skipped"),
            }
        }
    }
}

fn failure_ids(report: Option<&CycleReport>) -> BTreeSet<String> {
    report
        .map(|report| {
            report
                .failures
                .iter()
                .map(|failure| failure.id.clone())
                .collect()
        })
        .unwrap_or_default()
}
