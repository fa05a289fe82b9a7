use serde::{Deserialize, Serialize};

use super::status::OrderStatus;

/// One step of the delivery progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub label: String,
    pub status_key: OrderStatus,
    pub active: bool,
}

/// Stage list and headline percentage for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProgress {
    pub status: OrderStatus,
    pub stages: Vec<Stage>,
    pub percent: u8,
}

/// The five stages shown on the progress bar, in order.
pub const CANONICAL_STAGES: [(OrderStatus, &str); 5] = [
    (OrderStatus::Placed, "Order Placed"),
    (OrderStatus::InProduction, "In Production"),
    (OrderStatus::QualityCheck, "Quality Check"),
    (OrderStatus::Shipped, "Shipped"),
    (OrderStatus::Delivered, "Delivered"),
];

/// Maps an order status to its progress stages and completion percentage.
///
/// Stage activity and the percentage come from two independent tables and
/// are deliberately not reconciled: `completed` reports 100% with no active
/// stage, `processing` reports 40% with no active stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusStageMapper;

impl StatusStageMapper {
    pub fn new() -> Self {
        Self
    }

    /// Position of `status` in the canonical stage catalog, or `None` when
    /// the status has no stage of its own.
    pub fn current_index(&self, status: OrderStatus) -> Option<usize> {
        CANONICAL_STAGES.iter().position(|(key, _)| *key == status)
    }

    /// Canonical stages with every stage up to and including the current one
    /// marked active. Statuses outside the catalog activate nothing.
    pub fn stages(&self, status: OrderStatus) -> Vec<Stage> {
        let current = self.current_index(status);
        CANONICAL_STAGES
            .iter()
            .enumerate()
            .map(|(index, (key, label))| Stage {
                label: (*label).to_string(),
                status_key: *key,
                active: current.is_some_and(|c| index <= c),
            })
            .collect()
    }

    pub fn percent(&self, status: OrderStatus) -> u8 {
        match status {
            OrderStatus::Placed => 20,
            OrderStatus::Processing => 40,
            OrderStatus::InProduction => 60,
            OrderStatus::QualityCheck => 80,
            OrderStatus::Shipped => 90,
            OrderStatus::Delivered | OrderStatus::Completed => 100,
            OrderStatus::Cancelled | OrderStatus::Returned | OrderStatus::Unknown => 0,
        }
    }

    pub fn map(&self, status: OrderStatus) -> OrderProgress {
        OrderProgress {
            status,
            stages: self.stages(status),
            percent: self.percent(status),
        }
    }
}
