use serde::{Deserialize, Serialize};

use crate::errors::PortalError;

/// Default milestone granularity (e.g. every 1000 liters).
pub const DEFAULT_UNIT_SIZE: f64 = 1000.0;

/// Default contribution of one laptop to the impact metric.
pub const DEFAULT_PER_UNIT_CONTRIBUTION: f64 = 500.0;

/// A running impact total together with the milestone step it is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetric {
    pub cumulative_value: f64,
    pub unit_size: f64,
}

/// Progress from the last reached milestone toward the next one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    pub previous_milestone: f64,
    pub next_milestone: f64,
    pub progress_percent: f64,
    pub remaining: f64,
    pub units_needed: u64,
}

/// Computes milestone progress for a cumulative impact metric.
///
/// When the value sits exactly on a milestone the span between previous and
/// next collapses to zero; the span is then taken as 1, which reports 0%
/// progress and nothing remaining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MilestoneTracker {
    unit_size: f64,
    per_unit_contribution: f64,
}

impl Default for MilestoneTracker {
    fn default() -> Self {
        Self {
            unit_size: DEFAULT_UNIT_SIZE,
            per_unit_contribution: DEFAULT_PER_UNIT_CONTRIBUTION,
        }
    }
}

impl MilestoneTracker {
    pub fn new(unit_size: f64, per_unit_contribution: f64) -> Result<Self, PortalError> {
        validate_positive("unit_size", unit_size)?;
        validate_positive("per_unit_contribution", per_unit_contribution)?;
        Ok(Self {
            unit_size,
            per_unit_contribution,
        })
    }

    pub fn unit_size(&self) -> f64 {
        self.unit_size
    }

    pub fn per_unit_contribution(&self) -> f64 {
        self.per_unit_contribution
    }

    /// Wrap a raw running total as an `ImpactMetric` in this tracker's units.
    pub fn metric(&self, cumulative_value: f64) -> ImpactMetric {
        ImpactMetric {
            cumulative_value: sanitize(cumulative_value),
            unit_size: self.unit_size,
        }
    }

    /// Impact total attributed to `units` source units.
    pub fn value_for_units(&self, units: u64) -> f64 {
        units as f64 * self.per_unit_contribution
    }

    pub fn progress(&self, value: f64) -> MilestoneProgress {
        let value = sanitize(value);
        let steps = value / self.unit_size;
        let previous_milestone = steps.floor() * self.unit_size;
        let next_milestone = steps.ceil() * self.unit_size;
        if !(previous_milestone.is_finite() && next_milestone.is_finite()) {
            // Past the representable range: report it like an exact milestone.
            return MilestoneProgress {
                previous_milestone: value,
                next_milestone: value,
                progress_percent: 0.0,
                remaining: 0.0,
                units_needed: 0,
            };
        }

        let mut span = next_milestone - previous_milestone;
        if span <= 0.0 {
            span = 1.0;
        }
        let progress_percent = ((value - previous_milestone) / span * 100.0).clamp(0.0, 100.0);

        let remaining = (next_milestone - value).max(0.0);
        let units_needed = (remaining / self.per_unit_contribution).ceil() as u64;

        MilestoneProgress {
            previous_milestone,
            next_milestone,
            progress_percent,
            remaining,
            units_needed,
        }
    }
}

fn validate_positive(name: &'static str, value: f64) -> Result<(), PortalError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PortalError::InvalidImpactParameter { name, value })
    }
}

/// Running totals never go below zero; garbage input is read as zero.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
