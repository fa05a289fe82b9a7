//! Customer portal back-end.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, TraceLayer, CORS)      │
//! │  (SPA)   │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ SessionGate::check() per request       │
//!                       │         v                                        │
//!                       │  auth.rs  (SessionTokenIdentity, cookies)        │
//!                       │         │                                        │
//!                       │         │ StatusStageMapper / MilestoneTracker   │
//!                       │         v                                        │
//!                       │  db.rs  (PortalDb, DbHandle)   cache.rs          │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! | Module   | Responsibility                                             |
//! |----------|------------------------------------------------------------|
//! | `models` | Row and view types: `Customer`, `Order`, `ImpactSummary`   |
//! | `db`     | SQLite access via `DbHandle` (thin `Arc<Mutex<_>>`)        |
//! | `auth`   | Password hashing, token extraction, identity provider      |
//! | `cache`  | Per-session JSON cache for read endpoints                  |
//!
//! ## Typical Request Flow (`GET /api/orders`)
//!
//! 1. `require_member` extracts the bearer token or `refurb_session` cookie.
//! 2. `SessionGate::check()` resolves the principal; a denial answers 401 or
//!    403 with a `Location` of the login or home path.
//! 3. On grant, the handler consults the query cache, then the database, and
//!    attaches `StatusStageMapper` output to every order.
//! 4. An admin status change invalidates cached order and impact reads for
//!    every session.

pub mod api;
pub mod auth;
pub mod cache;
pub mod db;
pub mod models;
pub mod server;

pub use api::{AppState, SharedState, api_router};
pub use db::{DbHandle, PortalDb};
pub use server::{build_router, start_server};
