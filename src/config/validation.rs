//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the static root exists and is a directory
//! - Validate value ranges (interval > 0, id length > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function over the config plus a filesystem stat
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("could not stat {}", .0.display())]
    StaticRootMissing(PathBuf),

    #[error("{} is not a directory", .0.display())]
    StaticRootNotDirectory(PathBuf),

    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),

    #[error("listener.tls is required")]
    MissingTls,

    #[error("session.checkpoint_interval_ms must be greater than zero")]
    ZeroCheckpointInterval,

    #[error("session.id_length must be greater than zero")]
    ZeroIdLength,

    #[error("session.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("auth.login_location `{0}` must start with '/'")]
    InvalidLoginLocation(String),
}

/// Displays a list of errors separated by commas.
pub(crate) struct Joined<'a, T>(pub(crate) &'a [T]);

impl<T: fmt::Display> fmt::Display for Joined<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match std::fs::metadata(&config.static_root) {
        Ok(meta) if !meta.is_dir() => {
            errors.push(ValidationError::StaticRootNotDirectory(config.static_root.clone()))
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::StaticRootMissing(config.static_root.clone())),
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.tls.is_none() {
        errors.push(ValidationError::MissingTls);
    }

    if config.session.checkpoint_interval_ms == 0 {
        errors.push(ValidationError::ZeroCheckpointInterval);
    }

    if config.session.id_length == 0 {
        errors.push(ValidationError::ZeroIdLength);
    }

    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    if !config.auth.login_location.starts_with('/') {
        errors.push(ValidationError::InvalidLoginLocation(
            config.auth.login_location.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
