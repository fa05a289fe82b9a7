//! Portal server commands: `refurb serve` and `refurb init-db`.

use anyhow::Result;
use std::path::PathBuf;

use refurb_portal::config::PortalToml;
use refurb_portal::portal::server::{open_database, start_server};

pub async fn cmd_serve(
    mut config: PortalToml,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(db_path) = db_path {
        config.server.db_path = db_path;
    }
    if dev {
        config.server.dev_mode = true;
        config.server.host = "0.0.0.0".to_string();
    }

    start_server(config).await
}

pub fn cmd_init_db(mut config: PortalToml, db_path: Option<PathBuf>) -> Result<()> {
    if let Some(db_path) = db_path {
        config.server.db_path = db_path;
    }
    open_database(&config)?;
    println!(
        "Portal database initialized at {}",
        config.server.db_path.display()
    );
    Ok(())
}
