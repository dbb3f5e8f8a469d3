use axum_prometheus::PrometheusMetricLayer;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::future::IntoFuture;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use studio_scout::config::AppConfig;
use studio_scout::error::AppError;
use studio_scout::server::{self, StatusState};
use studio_scout::telemetry;
use studio_scout::workflows::listings::ListingFilter;
use studio_scout::workflows::polling::{
    LogNotifier, NotificationSink, PollCycle, Watcher, WebhookNotifier,
};
use studio_scout::workflows::quotes::{BestQuote, QuoteExtractor};
use studio_scout::workflows::securecafe::{build_http_client, SecureCafeClient};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "Studio Scout",
    about = "Poll apartment listings and report the best studio lease quotes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on an interval and serve status endpoints (default command)
    Watch(WatchArgs),
    /// Run a single poll cycle and print the report
    Check(CheckArgs),
    /// Extract the best quote from a saved pricing matrix document
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
struct WatchArgs {
    /// Override the configured host for the status server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the status server
    #[arg(long)]
    port: Option<u16>,
    /// Run one cycle, notify if needed, then exit
    #[arg(long)]
    once: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Print the report as CSV instead of JSON
    #[arg(long)]
    csv: bool,
    /// Also deliver the report to the configured notification sink
    #[arg(long)]
    notify: bool,
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Saved pricing matrix HTML
    file: PathBuf,
    /// Availability date of the unit (YYYY-MM-DD), echoed in the output
    #[arg(long, value_parser = parse_date)]
    available: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct QuoteOutput {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<NaiveDate>,
    #[serde(flatten)]
    best: BestQuote,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Watch(WatchArgs::default()));

    match command {
        Command::Watch(args) => run_watch(args).await,
        Command::Check(args) => run_check(args).await,
        Command::Quote(args) => run_quote(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn build_cycle(config: &AppConfig, http: reqwest::Client) -> PollCycle {
    let client = Arc::new(SecureCafeClient::new(
        http,
        config.source.listings_url.clone(),
        config.source.pricing_url.clone(),
    ));

    PollCycle::new(
        client.clone(),
        client,
        ListingFilter::new(config.search.clone()),
        QuoteExtractor::new(config.quotes.clone()),
    )
    .with_concurrency(config.source.concurrency)
}

fn build_sink(config: &AppConfig, http: reqwest::Client) -> Arc<dyn NotificationSink> {
    match &config.notify.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            http,
            url.clone(),
            config.notify.username.clone(),
        )),
        None => {
            warn!("WEBHOOK_URL not set; reports will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

async fn run_watch(mut args: WatchArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let http = build_http_client(config.source.timeout)?;
    let watcher = Watcher::new(
        build_cycle(&config, http.clone()),
        build_sink(&config, http),
        config.polling.interval,
    )
    .notify_on_change_only(config.polling.notify_on_change_only);

    if args.once {
        let outcome = watcher.tick().await?;
        info!(
            quoted = outcome.report.quoted.len(),
            failures = outcome.report.failures.len(),
            changes = outcome.changes.len(),
            notified = outcome.notified,
            "single watch cycle finished"
        );
        return Ok(());
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = StatusState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
        latest: watcher.latest(),
    };
    let app = server::router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        interval_secs = config.polling.interval.as_secs(),
        "studio scout watching"
    );

    tokio::select! {
        served = axum::serve(listener, app).into_future() => served?,
        _ = watcher.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown requested");
        }
    }

    Ok(())
}

async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let http = build_http_client(config.source.timeout)?;
    let cycle = build_cycle(&config, http.clone());
    let report = cycle.run().await?;

    if args.csv {
        report.write_csv(io::stdout().lock())?;
    } else {
        let payload = json!({
            "checked_at": report.checked_at,
            "fetched": report.fetched,
            "matched": report.matched,
            "units": report.cheapest_first(),
            "failures": report.failures,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    if args.notify {
        build_sink(&config, http).deliver(&report).await?;
    }

    Ok(())
}

fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let reader = BufReader::new(File::open(&args.file)?);
    let best = QuoteExtractor::new(config.quotes).extract(reader)?;

    let output = QuoteOutput {
        file: args.file,
        available: args.available,
        best,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
