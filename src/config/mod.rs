use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::workflows::listings::{AvailabilityWindow, SearchCriteria};
use crate::workflows::quotes::{PenaltyRatio, QuoteConfig, UnparseablePrice};

const DEFAULT_LISTINGS_URL: &str = "https://protokendallsq.com/floorplans/";
const DEFAULT_PRICING_URL: &str = "https://protokendallsq.securecafe.com/rcloadcontent.ashx";
const DEFAULT_WEBHOOK_USERNAME: &str = "Apt Price Scraper";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the poller.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub source: SourceConfig,
    pub polling: PollingConfig,
    pub search: SearchCriteria,
    pub quotes: QuoteConfig,
    pub notify: NotifyConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let telemetry = TelemetryConfig {
            log_level: var_or("APP_LOG_LEVEL", "info"),
            ansi: parse_bool("APP_LOG_ANSI", false)?,
        };

        let source = SourceConfig {
            listings_url: var_or("SCOUT_LISTINGS_URL", DEFAULT_LISTINGS_URL),
            pricing_url: var_or("SCOUT_PRICING_URL", DEFAULT_PRICING_URL),
            timeout: Duration::from_secs(parse_number("SCOUT_HTTP_TIMEOUT_SECS", 30)?),
            concurrency: parse_number("SCOUT_CONCURRENCY", 1)?,
        };
        if source.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let polling = PollingConfig {
            interval: Duration::from_secs(parse_number("SCOUT_POLL_INTERVAL_SECS", 3600)?),
            notify_on_change_only: parse_bool("SCOUT_NOTIFY_ON_CHANGE_ONLY", true)?,
        };

        let after = parse_date("SCOUT_AVAILABLE_AFTER", "2023-06-01")?;
        let before = parse_date("SCOUT_AVAILABLE_BEFORE", "2023-07-10")?;
        if after >= before {
            return Err(ConfigError::EmptyWindow { after, before });
        }
        let search = SearchCriteria {
            bedroom: var_or("SCOUT_BEDROOM", "Studio"),
            window: AvailabilityWindow::new(after, before),
        };

        let quotes = load_quote_config()?;

        let notify = NotifyConfig {
            webhook_url: env::var("WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            username: var_or("SCOUT_WEBHOOK_USERNAME", DEFAULT_WEBHOOK_USERNAME),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry,
            source,
            polling,
            search,
            quotes,
            notify,
        })
    }
}

fn load_quote_config() -> Result<QuoteConfig, ConfigError> {
    let defaults = QuoteConfig::default();

    let lease_rows = parse_number("SCOUT_LEASE_ROWS", defaults.lease_rows)?;
    if lease_rows == 0 {
        return Err(ConfigError::NoLeaseRows);
    }

    let short_lease_cutoff = parse_number("SCOUT_SHORT_LEASE_CUTOFF", defaults.short_lease_cutoff)?;
    if short_lease_cutoff > lease_rows {
        return Err(ConfigError::CutoffExceedsRows {
            cutoff: short_lease_cutoff,
            rows: lease_rows,
        });
    }

    let early_move_out = match env::var("SCOUT_EARLY_MOVE_OUT_RATIO") {
        Ok(raw) => raw
            .parse::<PenaltyRatio>()
            .map_err(|_| ConfigError::InvalidRatio { value: raw })?,
        Err(_) => defaults.early_move_out,
    };

    let unparseable_price = match env::var("SCOUT_UNPARSEABLE_PRICE") {
        Ok(raw) => raw
            .parse::<UnparseablePrice>()
            .map_err(|value| ConfigError::UnknownPricePolicy { value })?,
        Err(_) => defaults.unparseable_price,
    };

    Ok(QuoteConfig {
        lease_rows,
        base_term_months: parse_number("SCOUT_BASE_TERM_MONTHS", defaults.base_term_months)?,
        short_lease_cutoff,
        early_move_out,
        unparseable_price,
    })
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_date(key: &'static str, default: &str) -> Result<NaiveDate, ConfigError> {
    let raw = var_or(key, default);
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|source| ConfigError::InvalidDate { key, value: raw, source })
}

/// Settings controlling the status server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Remote endpoints and HTTP client limits.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub listings_url: String,
    pub pricing_url: String,
    pub timeout: Duration,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub interval: Duration,
    pub notify_on_change_only: bool,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub username: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        key: &'static str,
        value: String,
    },
    InvalidBool {
        key: &'static str,
        value: String,
    },
    InvalidDate {
        key: &'static str,
        value: String,
        source: chrono::ParseError,
    },
    EmptyWindow {
        after: NaiveDate,
        before: NaiveDate,
    },
    NoLeaseRows,
    CutoffExceedsRows {
        cutoff: usize,
        rows: usize,
    },
    InvalidRatio {
        value: String,
    },
    UnknownPricePolicy {
        value: String,
    },
    ZeroConcurrency,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidBool { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
            ConfigError::InvalidDate { key, value, .. } => {
                write!(f, "{key} must be a YYYY-MM-DD date, got '{value}'")
            }
            ConfigError::EmptyWindow { after, before } => write!(
                f,
                "availability window {after} .. {before} is empty; \
                 SCOUT_AVAILABLE_AFTER must precede SCOUT_AVAILABLE_BEFORE"
            ),
            ConfigError::NoLeaseRows => write!(f, "SCOUT_LEASE_ROWS must be at least 1"),
            ConfigError::CutoffExceedsRows { cutoff, rows } => write!(
                f,
                "SCOUT_SHORT_LEASE_CUTOFF ({cutoff}) cannot exceed SCOUT_LEASE_ROWS ({rows})"
            ),
            ConfigError::InvalidRatio { value } => write!(
                f,
                "SCOUT_EARLY_MOVE_OUT_RATIO must look like 8/7, got '{value}'"
            ),
            ConfigError::UnknownPricePolicy { value } => write!(
                f,
                "SCOUT_UNPARSEABLE_PRICE must be 'fail' or 'skip', got '{value}'"
            ),
            ConfigError::ZeroConcurrency => write!(f, "SCOUT_CONCURRENCY must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidDate { source, .. } => Some(source),
            _ => None,
        }
    }
}
