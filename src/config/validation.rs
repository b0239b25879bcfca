//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Check the default backend is a usable reference
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: IngressConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{
    IngressConfig, MAX_APPLY_TIMEOUT_SECS, MAX_POLL_INTERVAL_MS, MAX_RESYNC_INTERVAL_SECS,
    MAX_RETRY_DELAY_MS,
};

/// Upper bound for proxy timeouts in seconds.
const MAX_PROXY_TIMEOUT_SECS: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
    #[error("controller.default_backend must name a service and a non-zero port")]
    InvalidDefaultBackend,
    #[error("controller.retry_base_delay_ms exceeds controller.retry_max_delay_ms")]
    BackoffRange,
    #[error("service {0:?} has an empty address")]
    EmptyServiceAddress(String),
    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,
}

pub fn validate_config(config: &IngressConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let controller = &config.controller;
    for (field, value, max) in [
        ("controller.resync_interval_secs", controller.resync_interval_secs, MAX_RESYNC_INTERVAL_SECS),
        ("controller.apply_timeout_secs", controller.apply_timeout_secs, MAX_APPLY_TIMEOUT_SECS),
        ("controller.retry_base_delay_ms", controller.retry_base_delay_ms, MAX_RETRY_DELAY_MS),
        ("controller.retry_max_delay_ms", controller.retry_max_delay_ms, MAX_RETRY_DELAY_MS),
        ("controller.poll_interval_ms", controller.poll_interval_ms, MAX_POLL_INTERVAL_MS),
        ("timeouts.request_secs", config.timeouts.request_secs, MAX_PROXY_TIMEOUT_SECS),
        ("timeouts.connect_secs", config.timeouts.connect_secs, MAX_PROXY_TIMEOUT_SECS),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        } else if value > max {
            errors.push(ValidationError::TooLarge { field, max });
        }
    }
    if controller.retry_base_delay_ms > controller.retry_max_delay_ms {
        errors.push(ValidationError::BackoffRange);
    }
    if controller.default_backend.service.is_empty() || controller.default_backend.port == 0 {
        errors.push(ValidationError::InvalidDefaultBackend);
    }

    for (name, address) in &config.services {
        if address.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceAddress(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&IngressConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = IngressConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.controller.resync_interval_secs = 0;
        config.controller.default_backend.port = 0;
        config.services.insert("http-svc".into(), " ".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("controller.resync_interval_secs")));
        assert!(errors.contains(&ValidationError::InvalidDefaultBackend));
        assert!(errors.contains(&ValidationError::EmptyServiceAddress("http-svc".into())));
    }

    #[test]
    fn test_interval_upper_bounds() {
        let mut config = IngressConfig::default();
        config.controller.resync_interval_secs = MAX_RESYNC_INTERVAL_SECS;
        config.controller.retry_max_delay_ms = MAX_RETRY_DELAY_MS;
        assert!(validate_config(&config).is_ok());

        config.controller.resync_interval_secs = i64::MAX as u64;
        config.controller.retry_max_delay_ms = MAX_RETRY_DELAY_MS + 1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::TooLarge {
                    field: "controller.resync_interval_secs",
                    max: MAX_RESYNC_INTERVAL_SECS,
                },
                ValidationError::TooLarge {
                    field: "controller.retry_max_delay_ms",
                    max: MAX_RETRY_DELAY_MS,
                },
            ]
        );
    }

    #[test]
    fn test_admin_checked_only_when_enabled() {
        let mut config = IngressConfig::default();
        config.admin.api_key.clear();
        assert!(validate_config(&config).is_ok());

        config.admin.enabled = true;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::EmptyApiKey]));
    }
}
