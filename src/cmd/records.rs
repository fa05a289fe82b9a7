//! Account and order seeding: `refurb customer` and `refurb order`.

use anyhow::Result;
use console::style;

use super::super::{CustomerCommands, OrderCommands};
use refurb_portal::config::PortalToml;
use refurb_portal::errors::PortalError;
use refurb_portal::portal::server::open_database;
use refurb_portal::progress::OrderStatus;

pub fn cmd_customer(config: &PortalToml, command: CustomerCommands) -> Result<()> {
    match command {
        CustomerCommands::Add {
            email,
            password,
            name,
            admin,
        } => {
            let display_name = name.unwrap_or_else(|| {
                email
                    .split_once('@')
                    .map(|(local, _)| local.to_string())
                    .unwrap_or_else(|| email.clone())
            });
            let db = open_database(config)?;
            let customer = db.create_customer(&email, &display_name, &password, admin)?;
            let role = if customer.is_admin { "admin" } else { "customer" };
            println!(
                "Created {} {} ({}) with id {}",
                role,
                style(&customer.email).cyan(),
                customer.display_name,
                customer.id
            );
        }
    }
    Ok(())
}

pub fn cmd_order(config: &PortalToml, command: OrderCommands) -> Result<()> {
    match command {
        OrderCommands::Add {
            email,
            model,
            quantity,
            status,
        } => {
            let status: OrderStatus = status.parse()?;
            if quantity < 1 {
                anyhow::bail!("Quantity must be at least 1, got {}", quantity);
            }

            let db = open_database(config)?;
            let customer = db
                .get_customer_by_email(&email)?
                .ok_or_else(|| PortalError::CustomerNotFound {
                    email: email.clone(),
                })?;
            let order = db.create_order(customer.id, &model, quantity, status)?;
            println!(
                "Created order {} for {}: {} x {} ({})",
                style(&order.reference).yellow().bold(),
                customer.email,
                order.quantity,
                order.model,
                order.status
            );
        }
    }
    Ok(())
}
