use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::IdentityError;

/// Who is asking, as far as the gate cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPrincipal {
    pub is_authenticated: bool,
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SessionPrincipal {
    pub fn customer(customer_id: i64, email: impl Into<String>, is_admin: bool) -> Self {
        Self {
            is_authenticated: true,
            is_admin,
            customer_id: Some(customer_id),
            email: Some(email.into()),
        }
    }
}

/// The "who am I" collaborator.
///
/// Real implementation: `portal::auth::SessionTokenIdentity`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_principal(&self) -> Result<SessionPrincipal, IdentityError>;
}
