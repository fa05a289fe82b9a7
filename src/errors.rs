//! Typed error hierarchy for the portal.
//!
//! Two top-level enums cover the two places failures are matched on:
//! - `IdentityError`: why a session could not be resolved to a principal
//! - `PortalError`: store, configuration and input failures

use thiserror::Error;

/// Failures of the identity collaborator.
///
/// The session gate treats every variant as "not authenticated"; the variants
/// exist so logs can say why.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("No session token presented")]
    MissingToken,

    #[error("Session token is unknown or has been revoked")]
    UnknownSession,

    #[error("Session expired at {expires_at}")]
    Expired { expires_at: String },

    #[error("Identity lookup failed: {0}")]
    Lookup(String),
}

/// Errors from the portal store, configuration and request validation.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Customer {email} not found")]
    CustomerNotFound { email: String },

    #[error("Customer {email} already exists")]
    CustomerExists { email: String },

    #[error("Order {id} not found")]
    OrderNotFound { id: i64 },

    #[error("Invalid order status '{0}'")]
    InvalidStatus(String),

    #[error("Invalid impact parameter {name} = {value}: must be a finite number greater than zero")]
    InvalidImpactParameter { name: &'static str, value: f64 },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
