//! Configuration management for the catalog composite.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparsable numeric values fall back to their default with a warning;
//! [`Config::validate`] rejects values that parse but make no sense.

use catalog_composite_runtime::{CircuitBreakerConfig, PublishPoolConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration values that parsed but cannot be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A count that must be positive was zero
    #[error("{name} must be greater than zero")]
    Zero {
        /// Environment variable name
        name: &'static str,
    },
    /// A percentage above 100
    #[error("{name} must be between 0 and 100, got {value}")]
    PercentOutOfRange {
        /// Environment variable name
        name: &'static str,
        /// Offending value
        value: u8,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Dependent service locations and read timeouts
    pub downstream: DownstreamConfig,
    /// Resilience policy guarding the item service
    pub resilience: ResilienceConfig,
    /// RedPanda/Kafka configuration
    pub redpanda: RedpandaConfig,
    /// Publish pool sizing
    pub publisher: PublisherConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Address reported as `serviceAddresses.composite` and on fallback items
    pub service_address: String,
}

/// Where the dependent services live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Item service base URL
    pub item_url: String,
    /// Ratings service base URL
    pub ratings_url: String,
    /// Commentary service base URL
    pub commentary_url: String,
    /// Timeout of each `/health` probe
    pub health_timeout: Duration,
    /// Timeout of each ratings or commentary read
    pub secondary_timeout: Duration,
}

/// Resilience policy settings for the item service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Per-attempt deadline
    pub item_timeout: Duration,
    /// Attempts per call, first one included
    pub retry_max_attempts: usize,
    /// Pause between attempts
    pub retry_wait: Duration,
    /// Outcomes kept in the breaker window
    pub breaker_window_size: usize,
    /// Outcomes required before the breaker evaluates
    pub breaker_minimum_calls: usize,
    /// Failure percentage that opens the breaker
    pub breaker_failure_rate: u8,
    /// How long the breaker stays open
    pub breaker_open_wait: Duration,
    /// Trial calls admitted while half-open
    pub breaker_half_open_calls: usize,
}

/// RedPanda/Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Topic consumed by the item service
    pub items_topic: String,
    /// Topic consumed by the ratings service
    pub ratings_topic: String,
    /// Topic consumed by the commentary service
    pub commentary_topic: String,
}

/// Publish pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Worker tasks
    pub workers: usize,
    /// Total queued events
    pub queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let host = vars.string("HOST", "0.0.0.0");
        let port = vars.parsed("PORT", 8080_u16);
        let service_address = vars.lookup("SERVICE_ADDRESS").unwrap_or_else(|| {
            let hostname = vars
                .lookup("HOSTNAME")
                .unwrap_or_else(|| "localhost".to_string());
            format!("{hostname}:{port}")
        });

        Self {
            server: ServerConfig {
                host,
                port,
                service_address,
            },
            downstream: DownstreamConfig {
                item_url: vars.string("ITEM_SERVICE_URL", "http://item:8080"),
                ratings_url: vars.string("RATINGS_SERVICE_URL", "http://ratings:8080"),
                commentary_url: vars.string("COMMENTARY_SERVICE_URL", "http://commentary:8080"),
                health_timeout: vars.millis("HEALTH_TIMEOUT_MS", 2_000),
                secondary_timeout: vars.millis("SECONDARY_TIMEOUT_MS", 5_000),
            },
            resilience: ResilienceConfig {
                item_timeout: vars.millis("ITEM_TIMEOUT_MS", 2_000),
                retry_max_attempts: vars.parsed("RETRY_MAX_ATTEMPTS", 3),
                retry_wait: vars.millis("RETRY_WAIT_MS", 1_000),
                breaker_window_size: vars.parsed("BREAKER_WINDOW_SIZE", 5),
                breaker_minimum_calls: vars.parsed("BREAKER_MINIMUM_CALLS", 5),
                breaker_failure_rate: vars.parsed("BREAKER_FAILURE_RATE", 50),
                breaker_open_wait: vars.millis("BREAKER_OPEN_WAIT_MS", 10_000),
                breaker_half_open_calls: vars.parsed("BREAKER_HALF_OPEN_CALLS", 3),
            },
            redpanda: RedpandaConfig {
                brokers: vars.string("REDPANDA_BROKERS", "localhost:9092"),
                items_topic: vars.string("ITEMS_TOPIC", "items"),
                ratings_topic: vars.string("RATINGS_TOPIC", "ratings"),
                commentary_topic: vars.string("COMMENTARY_TOPIC", "commentary"),
            },
            publisher: PublisherConfig {
                workers: vars.parsed("PUBLISH_POOL_WORKERS", 10),
                queue_capacity: vars.parsed("PUBLISH_QUEUE_CAPACITY", 100),
            },
        }
    }

    /// Reject values that parsed but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("PUBLISH_POOL_WORKERS", self.publisher.workers),
            ("PUBLISH_QUEUE_CAPACITY", self.publisher.queue_capacity),
            ("RETRY_MAX_ATTEMPTS", self.resilience.retry_max_attempts),
            ("BREAKER_WINDOW_SIZE", self.resilience.breaker_window_size),
            ("BREAKER_HALF_OPEN_CALLS", self.resilience.breaker_half_open_calls),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { name });
        }

        if self.resilience.breaker_failure_rate > 100 {
            return Err(ConfigError::PercentOutOfRange {
                name: "BREAKER_FAILURE_RATE",
                value: self.resilience.breaker_failure_rate,
            });
        }

        Ok(())
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Breaker settings for the item service.
    #[must_use]
    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        let r = &self.resilience;
        CircuitBreakerConfig::builder()
            .sliding_window_size(r.breaker_window_size)
            .minimum_number_of_calls(r.breaker_minimum_calls)
            .failure_rate_threshold(r.breaker_failure_rate)
            .wait_duration_in_open_state(r.breaker_open_wait)
            .permitted_calls_in_half_open_state(r.breaker_half_open_calls)
            .build()
    }

    /// Retry settings for the item service.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(self.resilience.retry_max_attempts)
            .wait_duration(self.resilience.retry_wait)
            .build()
    }

    /// Publish pool sizing.
    #[must_use]
    pub const fn publish_pool(&self) -> PublishPoolConfig {
        PublishPoolConfig {
            workers: self.publisher.workers,
            queue_capacity: self.publisher.queue_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.lookup(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &str, default: T) -> T
    where
        T: FromStr + Display,
        T::Err: Display,
    {
        match self.lookup(name) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
                tracing::warn!(
                    variable = name,
                    value = %raw,
                    error = %e,
                    default = %default,
                    "Invalid configuration value, using default"
                );
                default
            }),
        }
    }

    fn millis(&self, name: &str, default: u64) -> Duration {
        Duration::from_millis(self.parsed(name, default))
    }
}
