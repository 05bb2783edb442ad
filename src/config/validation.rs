//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("servers must list at least one endpoint")]
    NoServers,
    #[error("server endpoint must be host:port, got '{0}'")]
    InvalidEndpoint(String),
    #[error("identity.nick is required")]
    MissingNick,
    #[error("identity.nick must not contain spaces, got '{0}'")]
    InvalidNick(String),
    #[error("rate_limit.capacity must be at least 1")]
    ZeroCapacity,
    #[error("rate_limit.period_secs must be positive, got {0}")]
    InvalidPeriod(f64),
    #[error("modules.command_prefix must not be empty")]
    EmptyCommandPrefix,
    #[error("module '{0}' is listed more than once in modules.autoload")]
    DuplicateAutoload(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }
    for endpoint in &config.servers {
        let valid = endpoint
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            errors.push(ValidationError::InvalidEndpoint(endpoint.clone()));
        }
    }

    let nick = &config.identity.nick;
    if nick.is_empty() {
        errors.push(ValidationError::MissingNick);
    } else if nick.contains(' ') {
        errors.push(ValidationError::InvalidNick(nick.clone()));
    }

    if config.rate_limit.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }
    let period = config.rate_limit.period_secs;
    if period.is_nan() || period <= 0.0 {
        errors.push(ValidationError::InvalidPeriod(period));
    }

    if config.modules.command_prefix.is_empty() {
        errors.push(ValidationError::EmptyCommandPrefix);
    }
    let mut seen = std::collections::HashSet::new();
    for name in &config.modules.autoload {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateAutoload(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
