use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Directives appended to the configured level so tokenizer and HTTP client
/// internals stay quiet unless `RUST_LOG` asks for them.
const QUIET_DEPENDENCIES: &str = "html5ever=warn,hyper=warn,reqwest=warn";

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(f, "invalid log level/filter '{}'", value)
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

pub fn filter_directives(config: &TelemetryConfig) -> String {
    format!("{},{}", config.log_level, QUIET_DEPENDENCIES)
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = filter_directives(config);
            EnvFilter::try_new(&directives).map_err(|source| TelemetryError::EnvFilter {
                value: config.log_level.clone(),
                source,
            })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(config.ansi)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_dependency_directives() {
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
            ansi: false,
        };
        assert_eq!(
            filter_directives(&config),
            "debug,html5ever=warn,hyper=warn,reqwest=warn"
        );
    }

    #[test]
    fn rejects_malformed_level() {
        let config = TelemetryConfig {
            log_level: "studio_scout=loud".to_string(),
            ansi: false,
        };
        assert!(EnvFilter::try_new(filter_directives(&config)).is_err());
    }
}
