//! Application configuration loaded from environment variables.

use std::time::Duration;

use messaging::{DEFAULT_PUBLISH_TIMEOUT, topics};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Topic names the services publish to and listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub order_created: String,
    pub payment_completed: String,
    pub payment_failed: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            order_created: topics::ORDER_CREATED.to_string(),
            payment_completed: topics::PAYMENT_COMPLETED.to_string(),
            payment_failed: topics::PAYMENT_FAILED.to_string(),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory stores when unset
/// - `OUTBOX_POLL_INTERVAL_MS`: relay poll interval (default: `5000`)
/// - `PUBLISH_TIMEOUT_MS`: upper bound on one publish call (default: `5000`)
/// - `ORDER_CREATED_TOPIC`, `PAYMENT_COMPLETED_TOPIC`, `PAYMENT_FAILED_TOPIC`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub poll_interval: Duration,
    pub publish_timeout: Duration,
    pub topics: Topics,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers and zero durations fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            poll_interval: millis("OUTBOX_POLL_INTERVAL_MS", defaults.poll_interval),
            publish_timeout: millis("PUBLISH_TIMEOUT_MS", defaults.publish_timeout),
            topics: Topics {
                order_created: lookup("ORDER_CREATED_TOPIC")
                    .unwrap_or(defaults.topics.order_created),
                payment_completed: lookup("PAYMENT_COMPLETED_TOPIC")
                    .unwrap_or(defaults.topics.payment_completed),
                payment_failed: lookup("PAYMENT_FAILED_TOPIC")
                    .unwrap_or(defaults.topics.payment_failed),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            poll_interval: Duration::from_secs(5),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            topics: Topics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert_eq!(config.topics.order_created, "order-created");
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_lookup_matches_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.topics, Topics::default());
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/outbox"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("PUBLISH_TIMEOUT_MS", "1000"),
            ("PAYMENT_FAILED_TOPIC", "payments-failed"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/outbox")
        );
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.publish_timeout, Duration::from_secs(1));
        assert_eq!(config.topics.payment_failed, "payments-failed");
        assert_eq!(config.topics.payment_completed, "payment-completed");
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("OUTBOX_POLL_INTERVAL_MS", "-5")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_durations_fall_back() {
        let config = from_pairs(&[
            ("OUTBOX_POLL_INTERVAL_MS", "0"),
            ("PUBLISH_TIMEOUT_MS", "0"),
        ]);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_database_url_means_in_memory() {
        let config = from_pairs(&[("DATABASE_URL", "")]);
        assert!(config.database_url.is_none());
    }
}
