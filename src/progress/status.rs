use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PortalError;

/// Lifecycle status of an order, as assigned by the order system.
///
/// Strings the order system sends that are not one of the known keys land in
/// `Unknown` instead of failing, so every consumer has an explicit branch for
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Placed,
    Processing,
    InProduction,
    QualityCheck,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Returned,
    Unknown,
}

impl OrderStatus {
    /// Every status the order system can assign, in lifecycle order.
    pub const KNOWN: [OrderStatus; 9] = [
        Self::Placed,
        Self::Processing,
        Self::InProduction,
        Self::QualityCheck,
        Self::Shipped,
        Self::Delivered,
        Self::Completed,
        Self::Cancelled,
        Self::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Processing => "processing",
            Self::InProduction => "in_production",
            Self::QualityCheck => "quality_check",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a status read from storage or the order feed. Never fails.
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }

    /// Whether laptops in an order with this status count toward the
    /// customer's impact total.
    pub fn counts_toward_impact(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Returned | Self::Unknown)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "placed" => Ok(Self::Placed),
            "processing" => Ok(Self::Processing),
            "in_production" => Ok(Self::InProduction),
            "quality_check" => Ok(Self::QualityCheck),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "returned" => Ok(Self::Returned),
            other => Err(PortalError::InvalidStatus(other.to_string())),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self::parse_lossy(&s)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}
