use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::auth::{hash_password, new_salt};
use super::models::*;
use crate::errors::PortalError;
use crate::progress::OrderStatus;

/// Async-safe handle to the portal database.
///
/// Wraps `PortalDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so SQLite I/O never ties up
/// async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<PortalDb>>,
}

impl DbHandle {
    pub fn new(db: PortalDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PortalDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| PortalError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct PortalDb {
    conn: Connection,
}

const ORDER_COLUMNS: &str =
    "id, customer_id, reference, model, quantity, status, created_at, updated_at";

const CUSTOMER_COLUMNS: &str = "id, email, display_name, is_admin, created_at";

impl PortalDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS customers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL DEFAULT '',
                    password_salt TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    expires_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS orders (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
                    reference TEXT NOT NULL UNIQUE,
                    model TEXT NOT NULL,
                    quantity INTEGER NOT NULL DEFAULT 1,
                    status TEXT NOT NULL DEFAULT 'placed',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_customer ON sessions(customer_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Customers ─────────────────────────────────────────────────────

    pub fn create_customer(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<Customer> {
        let email = email.trim().to_lowercase();
        if self.get_customer_by_email(&email)?.is_some() {
            return Err(PortalError::CustomerExists { email }.into());
        }
        let salt = new_salt();
        let hash = hash_password(&salt, password);
        self.conn
            .execute(
                "INSERT INTO customers (email, display_name, password_salt, password_hash, is_admin)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![email, display_name, salt, hash, is_admin],
            )
            .context("Failed to insert customer")?;
        let id = self.conn.last_insert_rowid();
        self.get_customer(id)?
            .context("Customer not found after insert")
    }

    pub fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
        self.conn
            .query_row(&sql, params![id], customer_from_row)
            .optional()
            .context("Failed to query customer")
    }

    pub fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE email = ?1", CUSTOMER_COLUMNS);
        self.conn
            .query_row(&sql, params![email.trim().to_lowercase()], customer_from_row)
            .optional()
            .context("Failed to query customer by email")
    }

    /// Returns the customer when `password` matches, `None` otherwise.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<Customer>> {
        let row: Option<(i64, String, String)> = self
            .conn
            .query_row(
                "SELECT id, password_salt, password_hash FROM customers WHERE email = ?1",
                params![email.trim().to_lowercase()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to query credentials")?;

        match row {
            Some((id, salt, hash)) if hash_password(&salt, password) == hash => {
                self.get_customer(id)
            }
            _ => Ok(None),
        }
    }

    // ── Sessions ──────────────────────────────────────────────────────

    pub fn create_session(&self, customer_id: i64, ttl_hours: u32) -> Result<Session> {
        let token = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let expires_at = now + chrono::Duration::hours(i64::from(ttl_hours));
        self.conn
            .execute(
                "INSERT INTO sessions (token, customer_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token, customer_id, now.to_rfc3339(), expires_at.to_rfc3339()],
            )
            .context("Failed to insert session")?;
        Ok(Session {
            token,
            customer_id,
            created_at: now.to_rfc3339(),
            expires_at: expires_at.to_rfc3339(),
        })
    }

    /// Look up a session and the customer it belongs to. Expiry is not
    /// checked here; the identity provider decides what an expired session
    /// means.
    pub fn find_session(&self, token: &str) -> Result<Option<(Session, Customer)>> {
        let session = self
            .conn
            .query_row(
                "SELECT token, customer_id, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        customer_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query session")?;

        match session {
            Some(session) => {
                let customer = self
                    .get_customer(session.customer_id)?
                    .context("Session refers to a missing customer")?;
                Ok(Some((session, customer)))
            }
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .context("Failed to delete session")?;
        Ok(affected > 0)
    }

    /// Remove sessions whose expiry is in the past. Returns how many went.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT token, expires_at FROM sessions")
            .context("Failed to prepare purge_expired_sessions")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("Failed to query sessions")?;

        let now = chrono::Utc::now();
        let mut expired = Vec::new();
        for row in rows {
            let (token, expires_at) = row.context("Failed to read session row")?;
            let is_expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
                .map(|t| t <= now)
                .unwrap_or(true);
            if is_expired {
                expired.push(token);
            }
        }

        for token in &expired {
            self.delete_session(token)?;
        }
        Ok(expired.len())
    }

    // ── Orders ────────────────────────────────────────────────────────

    pub fn create_order(
        &self,
        customer_id: i64,
        model: &str,
        quantity: i64,
        status: OrderStatus,
    ) -> Result<Order> {
        let reference = format!(
            "RF-{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        );
        self.conn
            .execute(
                "INSERT INTO orders (customer_id, reference, model, quantity, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![customer_id, reference, model, quantity, status.as_str()],
            )
            .context("Failed to insert order")?;
        let id = self.conn.last_insert_rowid();
        self.get_order(id)?.context("Order not found after insert")
    }

    pub fn get_order(&self, id: i64) -> Result<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        self.conn
            .query_row(&sql, params![id], order_from_row)
            .optional()
            .context("Failed to query order")
    }

    pub fn list_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE customer_id = ?1 ORDER BY id",
            ORDER_COLUMNS
        );
        self.collect_orders(&sql, params![customer_id])
    }

    pub fn list_all_orders(&self) -> Result<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders ORDER BY id", ORDER_COLUMNS);
        self.collect_orders(&sql, [])
    }

    fn collect_orders<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Order>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare order query")?;
        let rows = stmt
            .query_map(params, order_from_row)
            .context("Failed to query orders")?;
        let mut orders = Vec::new();
        for row in rows {
            orders.push(row.context("Failed to read order row")?);
        }
        Ok(orders)
    }

    pub fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        let affected = self
            .conn
            .execute(
                "UPDATE orders SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update order status")?;
        if affected == 0 {
            return Err(PortalError::OrderNotFound { id }.into());
        }
        self.get_order(id)?
            .context("Order not found after status update")
    }

    /// Laptops that count toward a customer's impact total.
    pub fn impact_laptops_for_customer(&self, customer_id: i64) -> Result<u64> {
        let laptops: u64 = self
            .list_orders_for_customer(customer_id)?
            .iter()
            .filter(|o| o.status.counts_toward_impact())
            .map(|o| o.quantity.max(0) as u64)
            .sum();
        Ok(laptops)
    }

    // ── Settings ──────────────────────────────────────────────────────

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query setting")
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .context("Failed to upsert setting")?;
        Ok(())
    }

    /// Stored impact parameters, falling back to `defaults` per key.
    pub fn impact_settings(&self, defaults: ImpactSettings) -> Result<ImpactSettings> {
        let read = |key: &str, fallback: f64| -> Result<f64> {
            match self.get_setting(key)? {
                Some(value) => value
                    .parse::<f64>()
                    .with_context(|| format!("Invalid stored setting {} = '{}'", key, value)),
                None => Ok(fallback),
            }
        };
        Ok(ImpactSettings {
            unit_size: read(SETTING_UNIT_SIZE, defaults.unit_size)?,
            per_unit_contribution: read(
                SETTING_PER_UNIT_CONTRIBUTION,
                defaults.per_unit_contribution,
            )?,
        })
    }

    pub fn save_impact_settings(&self, settings: ImpactSettings) -> Result<()> {
        self.set_setting(SETTING_UNIT_SIZE, &settings.unit_size.to_string())?;
        self.set_setting(
            SETTING_PER_UNIT_CONTRIBUTION,
            &settings.per_unit_contribution.to_string(),
        )?;
        Ok(())
    }
}

const SETTING_UNIT_SIZE: &str = "impact.unit_size";
const SETTING_PER_UNIT_CONTRIBUTION: &str = "impact.per_unit_contribution";

fn customer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Status strings from storage go through the lossy parser: a value written
/// by another system surfaces as `Unknown` instead of failing the query.
fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(5)?;
    Ok(Order {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        reference: row.get(2)?,
        model: row.get(3)?,
        quantity: row.get(4)?,
        status: OrderStatus::parse_lossy(&status),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Result<(PortalDb, Customer)> {
        let db = PortalDb::new_in_memory()?;
        let customer = db.create_customer("Grace@Example.com", "Grace", "pw", false)?;
        Ok((db, customer))
    }

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = PortalDb::new_in_memory()?;
        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('customers', 'sessions', 'orders', 'settings')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 4, "Expected 4 tables to exist");
        Ok(())
    }

    #[test]
    fn test_reopening_file_database_is_idempotent() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("portal.db");
        {
            let db = PortalDb::new(&path)?;
            db.create_customer("a@example.com", "A", "pw", false)?;
        }
        let db = PortalDb::new(&path)?;
        assert!(db.get_customer_by_email("a@example.com")?.is_some());
        Ok(())
    }

    #[test]
    fn test_create_customer_normalizes_email() -> Result<()> {
        let (db, customer) = seeded()?;
        assert_eq!(customer.email, "grace@example.com");
        assert!(!customer.is_admin);
        assert!(db.get_customer_by_email(" GRACE@example.com ")?.is_some());
        Ok(())
    }

    #[test]
    fn test_duplicate_customer_is_rejected() -> Result<()> {
        let (db, _) = seeded()?;
        let err = db
            .create_customer("grace@example.com", "Again", "pw", false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PortalError>(),
            Some(PortalError::CustomerExists { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_verify_credentials() -> Result<()> {
        let (db, customer) = seeded()?;
        assert_eq!(
            db.verify_credentials("grace@example.com", "pw")?.map(|c| c.id),
            Some(customer.id)
        );
        assert!(db.verify_credentials("grace@example.com", "wrong")?.is_none());
        assert!(db.verify_credentials("nobody@example.com", "pw")?.is_none());
        Ok(())
    }

    #[test]
    fn test_session_lifecycle() -> Result<()> {
        let (db, customer) = seeded()?;
        let session = db.create_session(customer.id, 24)?;
        let (found, owner) = db.find_session(&session.token)?.expect("session exists");
        assert_eq!(found, session);
        assert_eq!(owner.id, customer.id);

        assert!(db.delete_session(&session.token)?);
        assert!(db.find_session(&session.token)?.is_none());
        assert!(!db.delete_session(&session.token)?);
        Ok(())
    }

    #[test]
    fn test_purge_expired_sessions() -> Result<()> {
        let (db, customer) = seeded()?;
        let expired = db.create_session(customer.id, 0)?;
        let live = db.create_session(customer.id, 24)?;
        assert_eq!(db.purge_expired_sessions()?, 1);
        assert!(db.find_session(&expired.token)?.is_none());
        assert!(db.find_session(&live.token)?.is_some());
        Ok(())
    }

    #[test]
    fn test_create_and_list_orders() -> Result<()> {
        let (db, customer) = seeded()?;
        let other = db.create_customer("other@example.com", "Other", "pw", false)?;
        let first = db.create_order(customer.id, "ThinkPad T480", 2, OrderStatus::Placed)?;
        db.create_order(customer.id, "Latitude 7490", 1, OrderStatus::Shipped)?;
        db.create_order(other.id, "EliteBook 840", 5, OrderStatus::Delivered)?;

        assert!(first.reference.starts_with("RF-"));
        assert_eq!(first.status, OrderStatus::Placed);

        let mine = db.list_orders_for_customer(customer.id)?;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[1].model, "Latitude 7490");
        assert_eq!(db.list_all_orders()?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_update_order_status() -> Result<()> {
        let (db, customer) = seeded()?;
        let order = db.create_order(customer.id, "ThinkPad X1", 1, OrderStatus::Placed)?;
        let updated = db.update_order_status(order.id, OrderStatus::QualityCheck)?;
        assert_eq!(updated.status, OrderStatus::QualityCheck);

        let err = db
            .update_order_status(9999, OrderStatus::Shipped)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PortalError>(),
            Some(PortalError::OrderNotFound { id: 9999 })
        ));
        Ok(())
    }

    #[test]
    fn test_unrecognized_stored_status_reads_as_unknown() -> Result<()> {
        let (db, customer) = seeded()?;
        let order = db.create_order(customer.id, "ThinkPad X1", 1, OrderStatus::Placed)?;
        db.conn.execute(
            "UPDATE orders SET status = 'on_hold' WHERE id = ?1",
            params![order.id],
        )?;
        let order = db.get_order(order.id)?.expect("order exists");
        assert_eq!(order.status, OrderStatus::Unknown);
        Ok(())
    }

    #[test]
    fn test_impact_laptops_exclude_reversed_orders() -> Result<()> {
        let (db, customer) = seeded()?;
        db.create_order(customer.id, "A", 3, OrderStatus::Delivered)?;
        db.create_order(customer.id, "B", 2, OrderStatus::Shipped)?;
        db.create_order(customer.id, "C", 4, OrderStatus::Cancelled)?;
        db.create_order(customer.id, "D", 1, OrderStatus::Returned)?;
        assert_eq!(db.impact_laptops_for_customer(customer.id)?, 5);
        Ok(())
    }

    #[test]
    fn test_impact_settings_fall_back_to_defaults() -> Result<()> {
        let db = PortalDb::new_in_memory()?;
        let defaults = ImpactSettings {
            unit_size: 1000.0,
            per_unit_contribution: 500.0,
        };
        assert_eq!(db.impact_settings(defaults)?, defaults);

        db.set_setting("impact.per_unit_contribution", "320")?;
        let settings = db.impact_settings(defaults)?;
        assert_eq!(settings.unit_size, 1000.0);
        assert_eq!(settings.per_unit_contribution, 320.0);

        let saved = ImpactSettings {
            unit_size: 250.0,
            per_unit_contribution: 40.0,
        };
        db.save_impact_settings(saved)?;
        assert_eq!(db.impact_settings(defaults)?, saved);
        Ok(())
    }

    #[test]
    fn test_deleting_customer_cascades() -> Result<()> {
        let (db, customer) = seeded()?;
        db.create_order(customer.id, "A", 1, OrderStatus::Placed)?;
        db.create_session(customer.id, 1)?;
        db.conn
            .execute("DELETE FROM customers WHERE id = ?1", params![customer.id])?;
        assert!(db.list_all_orders()?.is_empty());
        Ok(())
    }
}
