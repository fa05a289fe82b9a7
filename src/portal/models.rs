use serde::{Deserialize, Serialize};

use crate::progress::{ImpactMetric, MilestoneProgress, OrderProgress, OrderStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub reference: String,
    pub model: String,
    pub quantity: i64,
    pub status: OrderStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A login session. `expires_at` is RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub customer_id: i64,
    pub created_at: String,
    pub expires_at: String,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithProgress {
    #[serde(flatten)]
    pub order: Order,
    pub progress: OrderProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSummary {
    /// Laptops counted toward the metric (cancelled and returned orders excluded)
    pub laptops: u64,
    pub metric_label: String,
    pub metric: ImpactMetric,
    pub milestone: MilestoneProgress,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImpactSettings {
    pub unit_size: f64,
    pub per_unit_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub principal: crate::session::SessionPrincipal,
}
