//! Read-only views of the progress model: `refurb progress` and `refurb milestone`.

use anyhow::Result;
use console::style;

use refurb_portal::config::PortalToml;
use refurb_portal::progress::{MilestoneTracker, OrderStatus, StatusStageMapper};

pub fn cmd_progress(status: &str) -> Result<()> {
    let status: OrderStatus = status.parse()?;
    let progress = StatusStageMapper::new().map(status);

    println!();
    println!("Order status: {}", style(progress.status).bold());
    for stage in &progress.stages {
        if stage.active {
            println!("  {} {}", style("[x]").green(), stage.label);
        } else {
            println!("  {} {}", style("[ ]").dim(), stage.label);
        }
    }
    println!("Progress: {}%", progress.percent);
    if !status.counts_toward_impact() {
        println!("{}", style("This order does not count toward impact.").dim());
    }
    println!();
    Ok(())
}

pub fn cmd_milestone(
    config: &PortalToml,
    value: f64,
    unit_size: Option<f64>,
    per_unit: Option<f64>,
) -> Result<()> {
    let tracker = match (unit_size, per_unit) {
        (None, None) => config.impact.tracker()?,
        _ => MilestoneTracker::new(
            unit_size.unwrap_or(config.impact.unit_size),
            per_unit.unwrap_or(config.impact.per_unit_contribution),
        )?,
    };
    let milestone = tracker.progress(value);

    println!();
    println!(
        "Cumulative {}: {}",
        config.impact.metric_label,
        style(value).cyan()
    );
    println!("Previous milestone: {}", milestone.previous_milestone);
    println!("Next milestone: {}", milestone.next_milestone);
    println!("Progress: {:.1}%", milestone.progress_percent);
    println!("Remaining: {}", milestone.remaining);
    println!("Laptops needed: {}", milestone.units_needed);
    println!();
    Ok(())
}
