//! Configuration view and validation commands: `refurb config`.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::ConfigCommands;
use refurb_portal::config::PortalToml;

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Portal Configuration");
            println!("====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                PortalToml::load(config_path)?
            } else {
                println!("No portal.toml found at {}", config_path.display());
                println!("Using default configuration.");
                PortalToml::default()
            };
            println!();
            print!(
                "{}",
                toml::to_string_pretty(&toml).context("Failed to render configuration")?
            );
            println!();

            let mut effective = toml;
            effective.apply_env()?;
            println!("Effective values (with env overrides):");
            println!("  port = {}", effective.server.port);
            println!("  db_path = \"{}\"", effective.server.db_path.display());
            println!(
                "  per_unit_contribution = {}",
                effective.impact.per_unit_contribution
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No portal.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = PortalToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("portal.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }

            PortalToml::default().save(config_path)?;

            println!("Created portal.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] port, host, db_path");
            println!("  - [impact] unit_size, per_unit_contribution, metric_label");
            println!("  - [session] login_path, home_path, ttl_hours");
            println!();
        }
    }

    Ok(())
}
