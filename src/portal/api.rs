use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use super::auth::{SESSION_COOKIE, SessionTokenIdentity, extract_token};
use super::cache::QueryCache;
use super::db::DbHandle;
#[cfg(test)]
use super::db::PortalDb;
use super::models::{ImpactSettings, ImpactSummary, LoginResponse, Order, OrderWithProgress};
use crate::config::PortalToml;
use crate::errors::PortalError;
use crate::progress::{MilestoneTracker, OrderStatus, StatusStageMapper};
use crate::session::{
    DenialReason, GateState, RedirectPaths, RedirectRecorder, RedirectTarget, SessionGate,
    SessionPrincipal,
};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub cache: QueryCache,
    pub config: PortalToml,
    pub mapper: StatusStageMapper,
}

impl AppState {
    pub fn new(db: DbHandle, config: PortalToml) -> Self {
        let cache = QueryCache::new(Duration::from_secs(config.cache.ttl_secs));
        Self {
            db,
            cache,
            config,
            mapper: StatusStageMapper::new(),
        }
    }

    fn with_progress(&self, order: Order) -> OrderWithProgress {
        OrderWithProgress {
            progress: self.mapper.map(order.status),
            order,
        }
    }

    fn default_impact_settings(&self) -> ImpactSettings {
        ImpactSettings {
            unit_size: self.config.impact.unit_size,
            per_unit_contribution: self.config.impact.per_unit_contribution,
        }
    }

    async fn impact_settings(&self) -> Result<ImpactSettings, ApiError> {
        let defaults = self.default_impact_settings();
        Ok(self.db.call(move |db| db.impact_settings(defaults)).await?)
    }

    async fn impact_tracker(&self) -> Result<MilestoneTracker, ApiError> {
        let settings = self.impact_settings().await?;
        MilestoneTracker::new(settings.unit_size, settings.per_unit_contribution)
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    /// Writes to orders change every order listing and every impact total.
    fn invalidate_order_reads(&self) {
        self.cache.invalidate_prefix("/api/orders");
        self.cache.invalidate_prefix("/api/impact");
    }
}

pub type SharedState = Arc<AppState>;

/// Inserted into request extensions by the session gate once access is granted.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub principal: SessionPrincipal,
    pub token: String,
}

impl CurrentSession {
    fn customer_id(&self) -> Result<i64, ApiError> {
        self.principal
            .customer_id
            .ok_or_else(|| ApiError::Internal("Granted session has no customer".into()))
    }

    /// Customers see their own orders; administrators see every order.
    fn can_view(&self, order: &Order) -> bool {
        self.principal.is_admin || self.principal.customer_id == Some(order.customer_id)
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct UpdateImpactSettingsRequest {
    pub unit_size: Option<f64>,
    pub per_unit_contribution: Option<f64>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl From<DenialReason> for ApiError {
    fn from(reason: DenialReason) -> Self {
        match reason {
            DenialReason::Unauthenticated => ApiError::Unauthorized("Sign in to continue".into()),
            DenialReason::Forbidden => {
                ApiError::Forbidden("Administrator access required".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(msg) = &self {
            error!(error = %msg, "request failed");
        }
        (status, Json(serde_json::json!({"error": self.into_message()}))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let msg = err.to_string();
        match err.downcast_ref::<PortalError>() {
            Some(PortalError::OrderNotFound { .. } | PortalError::CustomerNotFound { .. }) => {
                ApiError::NotFound(msg)
            }
            Some(
                PortalError::InvalidStatus(_)
                | PortalError::InvalidImpactParameter { .. }
                | PortalError::CustomerExists { .. },
            ) => ApiError::BadRequest(msg),
            Some(PortalError::InvalidCredentials) => ApiError::Unauthorized(msg),
            _ => ApiError::Internal(msg),
        }
    }
}

/// Response for a gate denial: the status says why, `Location` says where
/// the front end should navigate.
fn denied_response(paths: &RedirectPaths, reason: DenialReason, target: RedirectTarget) -> Response {
    let location = paths.resolve(target).to_string();
    let err = ApiError::from(reason);
    (
        err.status(),
        [(header::LOCATION, location.clone())],
        Json(serde_json::json!({
            "error": err.into_message(),
            "reason": reason,
            "redirect": location,
        })),
    )
        .into_response()
}

// ── Session gate middleware ───────────────────────────────────────────

async fn require_member(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    gate_request(&state, SessionGate::member(), req, next).await
}

async fn require_admin(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    gate_request(&state, SessionGate::admin(), req, next).await
}

/// Every gated request runs its own identity check; nothing is shared
/// between requests.
async fn gate_request(
    state: &SharedState,
    gate: SessionGate,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_token(req.headers());
    let identity = SessionTokenIdentity::new(state.db.clone(), token.clone());
    let navigator = RedirectRecorder::new();

    match gate.check(&identity, &navigator).await {
        GateState::Granted(principal) => {
            req.extensions_mut().insert(CurrentSession {
                principal,
                token: token.unwrap_or_default(),
            });
            next.run(req).await
        }
        GateState::Denied(reason) => {
            // Whatever this token cached while it was valid is unreachable now.
            if reason == DenialReason::Unauthenticated
                && let Some(token) = &token
            {
                state.cache.end_scope(token);
            }
            let target = navigator
                .last()
                .unwrap_or_else(|| reason.redirect_target());
            denied_response(&state.config.session.redirect_paths(), reason, target)
        }
        GateState::Checking => {
            ApiError::Internal("Session check did not settle".into()).into_response()
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router(state: SharedState) -> Router {
    let member = Router::new()
        .route("/api/logout", post(logout))
        .route("/api/session", get(session_info))
        .route("/api/orders", get(list_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/progress", get(get_order_progress))
        .route("/api/impact", get(get_impact))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_member));

    let admin = Router::new()
        .route("/api/admin/orders", get(admin_list_orders))
        .route(
            "/api/admin/orders/{id}/status",
            patch(admin_update_order_status),
        )
        .route(
            "/api/admin/impact-settings",
            get(admin_get_impact_settings).put(admin_update_impact_settings),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/login", post(login))
        .merge(member)
        .merge(admin)
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ttl_hours = state.config.session.ttl_hours;
    let (customer, session) = state
        .db
        .call(move |db| {
            let customer = db
                .verify_credentials(&req.email, &req.password)?
                .ok_or(PortalError::InvalidCredentials)?;
            let session = db.create_session(customer.id, ttl_hours)?;
            Ok((customer, session))
        })
        .await?;

    info!(customer_id = customer.id, "session created");

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session.token
    );
    let body = LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        principal: SessionPrincipal::customer(customer.id, customer.email, customer.is_admin),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

async fn logout(
    State(state): State<SharedState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, ApiError> {
    let token = session.token.clone();
    state.db.call(move |db| db.delete_session(&token)).await?;
    let dropped = state.cache.end_scope(&session.token);
    info!(customer_id = ?session.principal.customer_id, dropped, "session ended");

    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

async fn session_info(Extension(session): Extension<CurrentSession>) -> impl IntoResponse {
    Json(session.principal)
}

async fn list_orders(
    State(state): State<SharedState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Value>, ApiError> {
    const PATH: &str = "/api/orders";
    if let Some(hit) = state.cache.get(&session.token, PATH) {
        return Ok(Json(hit));
    }

    let customer_id = session.customer_id()?;
    let orders = state
        .db
        .call(move |db| db.list_orders_for_customer(customer_id))
        .await?;
    let views: Vec<OrderWithProgress> = orders
        .into_iter()
        .map(|order| state.with_progress(order))
        .collect();

    let value = serde_json::to_value(&views).map_err(|e| ApiError::Internal(e.to_string()))?;
    state.cache.insert(&session.token, PATH, value.clone());
    Ok(Json(value))
}

/// Load an order the session may see. Orders belonging to someone else are
/// reported as missing.
async fn visible_order(
    state: &SharedState,
    session: &CurrentSession,
    id: i64,
) -> Result<Order, ApiError> {
    let order = state.db.call(move |db| db.get_order(id)).await?;
    match order {
        Some(order) if session.can_view(&order) => Ok(order),
        _ => Err(ApiError::NotFound(format!("Order {} not found", id))),
    }
}

async fn get_order(
    State(state): State<SharedState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let path = format!("/api/orders/{}", id);
    if let Some(hit) = state.cache.get(&session.token, &path) {
        return Ok(Json(hit));
    }

    let order = visible_order(&state, &session, id).await?;
    let value = serde_json::to_value(state.with_progress(order))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state.cache.insert(&session.token, &path, value.clone());
    Ok(Json(value))
}

async fn get_order_progress(
    State(state): State<SharedState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let order = visible_order(&state, &session, id).await?;
    Ok(Json(state.mapper.map(order.status)))
}

async fn get_impact(
    State(state): State<SharedState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Value>, ApiError> {
    const PATH: &str = "/api/impact";
    if let Some(hit) = state.cache.get(&session.token, PATH) {
        return Ok(Json(hit));
    }

    let customer_id = session.customer_id()?;
    let tracker = state.impact_tracker().await?;
    let laptops = state
        .db
        .call(move |db| db.impact_laptops_for_customer(customer_id))
        .await?;
    let value = tracker.value_for_units(laptops);

    let summary = ImpactSummary {
        laptops,
        metric_label: state.config.impact.metric_label.clone(),
        metric: tracker.metric(value),
        milestone: tracker.progress(value),
    };
    let value = serde_json::to_value(&summary).map_err(|e| ApiError::Internal(e.to_string()))?;
    state.cache.insert(&session.token, PATH, value.clone());
    Ok(Json(value))
}

async fn admin_list_orders(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.db.call(|db| db.list_all_orders()).await?;
    let views: Vec<OrderWithProgress> = orders
        .into_iter()
        .map(|order| state.with_progress(order))
        .collect();
    Ok(Json(views))
}

async fn admin_update_order_status(
    State(state): State<SharedState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: PortalError| ApiError::BadRequest(e.to_string()))?;

    let order = state
        .db
        .call(move |db| db.update_order_status(id, status))
        .await?;
    state.invalidate_order_reads();
    info!(
        order_id = id,
        %status,
        admin_id = ?session.principal.customer_id,
        "order status updated"
    );

    Ok(Json(state.with_progress(order)))
}

async fn admin_get_impact_settings(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.impact_settings().await?))
}

async fn admin_update_impact_settings(
    State(state): State<SharedState>,
    Json(req): Json<UpdateImpactSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = state.impact_settings().await?;
    let updated = ImpactSettings {
        unit_size: req.unit_size.unwrap_or(current.unit_size),
        per_unit_contribution: req
            .per_unit_contribution
            .unwrap_or(current.per_unit_contribution),
    };
    MilestoneTracker::new(updated.unit_size, updated.per_unit_contribution)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .db
        .call(move |db| db.save_impact_settings(updated))
        .await?;
    state.cache.invalidate_prefix("/api/impact");
    info!(
        unit_size = updated.unit_size,
        per_unit_contribution = updated.per_unit_contribution,
        "impact settings updated"
    );

    Ok(Json(updated))
}
