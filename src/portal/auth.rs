use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};

use super::db::DbHandle;
use crate::errors::IdentityError;
use crate::session::{IdentityProvider, SessionPrincipal};

/// Cookie the front end stores the session token in.
pub const SESSION_COOKIE: &str = "refurb_session";

/// Hex SHA-256 of `salt:password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fresh random salt for a new password.
pub fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Pull the session token from `Authorization: Bearer` or the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Resolves the principal behind a session token against the portal store.
pub struct SessionTokenIdentity {
    db: DbHandle,
    token: Option<String>,
}

impl SessionTokenIdentity {
    pub fn new(db: DbHandle, token: Option<String>) -> Self {
        Self { db, token }
    }
}

#[async_trait]
impl IdentityProvider for SessionTokenIdentity {
    async fn current_principal(&self) -> Result<SessionPrincipal, IdentityError> {
        let token = self.token.clone().ok_or(IdentityError::MissingToken)?;

        let found = self
            .db
            .call(move |db| db.find_session(&token))
            .await
            .map_err(|e| IdentityError::Lookup(e.to_string()))?;
        let (session, customer) = found.ok_or(IdentityError::UnknownSession)?;

        let expires_at = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
            .map_err(|e| IdentityError::Lookup(format!("bad session expiry: {}", e)))?;
        if expires_at <= chrono::Utc::now() {
            return Err(IdentityError::Expired {
                expires_at: session.expires_at,
            });
        }

        Ok(SessionPrincipal::customer(
            customer.id,
            customer.email,
            customer.is_admin,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::db::PortalDb;
    use axum::http::HeaderValue;

    fn db_with_customer(is_admin: bool) -> (DbHandle, i64) {
        let db = PortalDb::new_in_memory().unwrap();
        let customer = db
            .create_customer("ada@example.com", "Ada", "hunter2", is_admin)
            .unwrap();
        (DbHandle::new(db), customer.id)
    }

    #[test]
    fn test_hash_password_is_salted() {
        let a = hash_password("salt-a", "secret");
        let b = hash_password("salt-b", "secret");
        assert_ne!(a, b);
        assert_eq!(a, hash_password("salt-a", "secret"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refurb_session=tok-9; other=1"),
        );
        assert_eq!(extract_token(&headers), Some("tok-9".to_string()));
    }

    #[test]
    fn test_extract_token_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        headers.insert(header::COOKIE, HeaderValue::from_static("refurb_session="));
        assert_eq!(extract_token(&headers), None);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let (db, _) = db_with_customer(false);
        let identity = SessionTokenIdentity::new(db, None);
        assert_eq!(
            identity.current_principal().await,
            Err(IdentityError::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let (db, _) = db_with_customer(false);
        let identity = SessionTokenIdentity::new(db, Some("nope".to_string()));
        assert_eq!(
            identity.current_principal().await,
            Err(IdentityError::UnknownSession)
        );
    }

    #[tokio::test]
    async fn test_valid_session_resolves_principal() {
        let (db, customer_id) = db_with_customer(true);
        let session = db
            .call(move |db| db.create_session(customer_id, 1))
            .await
            .unwrap();
        let identity = SessionTokenIdentity::new(db, Some(session.token));
        let principal = identity.current_principal().await.unwrap();
        assert!(principal.is_authenticated);
        assert!(principal.is_admin);
        assert_eq!(principal.customer_id, Some(customer_id));
        assert_eq!(principal.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let (db, customer_id) = db_with_customer(false);
        let session = db
            .call(move |db| db.create_session(customer_id, 0))
            .await
            .unwrap();
        let identity = SessionTokenIdentity::new(db, Some(session.token));
        assert!(matches!(
            identity.current_principal().await,
            Err(IdentityError::Expired { .. })
        ));
    }
}
