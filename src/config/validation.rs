//! Configuration validation.
//!
//! Semantic checks on top of what serde already guarantees syntactically.
//! Validation is a pure function over the full config and reports every
//! violation it finds, not just the first.

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic violation in the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    BindAddress(String),

    #[error("upstream.url {0:?} is not a valid URL")]
    UpstreamUrl(String),

    #[error("upstream.deadline_secs must be at least 1")]
    Deadline,

    /// The gate's behavior is undefined at capacity 0.
    #[error("admission.max_in_flight must be at least 1")]
    Capacity,

    #[error("admission.backoff_min_secs must be at least 1")]
    BackoffMin,

    #[error("admission back-off range is inverted: min {min} > max {max}")]
    BackoffRange { min: u64, max: u64 },

    #[error("shutdown.grace_secs must be at least 1")]
    Grace,
}

/// Validate a configuration, collecting all violations.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if Url::parse(&config.upstream.url).is_err() {
        errors.push(ValidationError::UpstreamUrl(config.upstream.url.clone()));
    }

    if config.upstream.deadline_secs == 0 {
        errors.push(ValidationError::Deadline);
    }

    if config.admission.max_in_flight == 0 {
        errors.push(ValidationError::Capacity);
    }

    if config.admission.backoff_min_secs == 0 {
        errors.push(ValidationError::BackoffMin);
    }

    if config.admission.backoff_min_secs > config.admission.backoff_max_secs {
        errors.push(ValidationError::BackoffRange {
            min: config.admission.backoff_min_secs,
            max: config.admission.backoff_max_secs,
        });
    }

    if config.shutdown.grace_secs == 0 {
        errors.push(ValidationError::Grace);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
