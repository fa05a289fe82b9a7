//! Portal configuration, read from `.refurb/portal.toml`.
//!
//! Layered: file → environment → CLI. Every section is optional and falls
//! back to defaults, so an empty file (or no file) is a valid configuration.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 3142
//! host = "127.0.0.1"
//! db_path = ".refurb/portal.db"
//! dev_mode = false
//!
//! [impact]
//! unit_size = 1000.0
//! per_unit_contribution = 500.0
//! metric_label = "liters of water"
//!
//! [session]
//! login_path = "/login"
//! home_path = "/"
//! ttl_hours = 72
//!
//! [cache]
//! ttl_secs = 30
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::progress::MilestoneTracker;
use crate::progress::milestone::{DEFAULT_PER_UNIT_CONTRIBUTION, DEFAULT_UNIT_SIZE};
use crate::session::RedirectPaths;

/// Name of the directory holding portal state, relative to the working dir.
pub const PORTAL_DIR: &str = ".refurb";

/// Name of the config file inside [`PORTAL_DIR`].
pub const CONFIG_FILE: &str = "portal.toml";

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Permissive CORS for a front end served from a dev server
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3142
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".refurb/portal.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

/// ESG impact parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSection {
    /// Milestone granularity
    #[serde(default = "default_unit_size")]
    pub unit_size: f64,
    /// How much one laptop adds to the metric
    #[serde(default = "default_per_unit_contribution")]
    pub per_unit_contribution: f64,
    #[serde(default = "default_metric_label")]
    pub metric_label: String,
}

fn default_unit_size() -> f64 {
    DEFAULT_UNIT_SIZE
}

fn default_per_unit_contribution() -> f64 {
    DEFAULT_PER_UNIT_CONTRIBUTION
}

fn default_metric_label() -> String {
    "liters of water".to_string()
}

impl Default for ImpactSection {
    fn default() -> Self {
        Self {
            unit_size: default_unit_size(),
            per_unit_contribution: default_per_unit_contribution(),
            metric_label: default_metric_label(),
        }
    }
}

impl ImpactSection {
    pub fn tracker(&self) -> Result<MilestoneTracker> {
        MilestoneTracker::new(self.unit_size, self.per_unit_contribution)
            .context("Invalid [impact] configuration")
    }
}

/// Session and redirect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_home_path")]
    pub home_path: String,
    /// How long a login stays valid
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_ttl_hours() -> u32 {
    72
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            home_path: default_home_path(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl SessionSection {
    pub fn redirect_paths(&self) -> RedirectPaths {
        RedirectPaths {
            login: self.login_path.clone(),
            home: self.home_path.clone(),
        }
    }
}

/// Query cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    30
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Root of `portal.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub impact: ImpactSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub cache: CacheSection,
}

impl PortalToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse portal.toml")
    }

    /// Load `portal.toml` from `portal_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(portal_dir: &Path) -> Result<Self> {
        let config_path = portal_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize portal.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `REFURB_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("REFURB_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid REFURB_PORT '{}'", port))?;
        }
        if let Some(db_path) = lookup("REFURB_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }
        if let Some(value) = lookup("REFURB_PER_UNIT_CONTRIBUTION") {
            self.impact.per_unit_contribution = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid REFURB_PER_UNIT_CONTRIBUTION '{}'", value))?;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(self.impact.unit_size.is_finite() && self.impact.unit_size > 0.0) {
            warnings.push(format!(
                "Invalid impact.unit_size {}: must be greater than zero",
                self.impact.unit_size
            ));
        }
        if !(self.impact.per_unit_contribution.is_finite()
            && self.impact.per_unit_contribution > 0.0)
        {
            warnings.push(format!(
                "Invalid impact.per_unit_contribution {}: must be greater than zero",
                self.impact.per_unit_contribution
            ));
        }
        if self.session.login_path.trim().is_empty() {
            warnings.push("session.login_path is empty".to_string());
        }
        if self.session.home_path.trim().is_empty() {
            warnings.push("session.home_path is empty".to_string());
        }
        if self.session.ttl_hours == 0 {
            warnings.push("session.ttl_hours is 0: every login expires immediately".to_string());
        }
        if self.cache.ttl_secs == 0 {
            warnings.push("cache.ttl_secs is 0: query cache is effectively disabled".to_string());
        }

        warnings
    }
}

/// Resolve the config file location: an explicit path wins, otherwise
/// `.refurb/portal.toml` under `base_dir`.
pub fn config_path(base_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => base_dir.join(PORTAL_DIR).join(CONFIG_FILE),
    }
}

/// Load the config from `path` if it exists, then apply the environment.
pub fn load_layered(path: &Path) -> Result<PortalToml> {
    let mut toml = if path.exists() {
        PortalToml::load(path)?
    } else {
        PortalToml::default()
    };
    toml.apply_env()?;
    Ok(toml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = PortalToml::parse("").unwrap();
        assert_eq!(config.server.port, 3142);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.db_path, PathBuf::from(".refurb/portal.db"));
        assert_eq!(config.impact.unit_size, 1000.0);
        assert_eq!(config.impact.per_unit_contribution, 500.0);
        assert_eq!(config.session.login_path, "/login");
        assert_eq!(config.session.home_path, "/");
        assert_eq!(config.cache.ttl_secs, 30);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = PortalToml::parse(
            r#"
            [impact]
            per_unit_contribution = 350.0

            [session]
            home_path = "/dashboard"
            "#,
        )
        .unwrap();
        assert_eq!(config.impact.per_unit_contribution, 350.0);
        assert_eq!(config.impact.unit_size, 1000.0);
        assert_eq!(config.session.home_path, "/dashboard");
        assert_eq!(config.session.login_path, "/login");
        assert_eq!(config.session.redirect_paths().home, "/dashboard");
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = PortalToml::parse("[server\nport = ").unwrap_err();
        assert!(err.to_string().contains("portal.toml"));
    }

    #[test]
    fn test_validate_flags_bad_impact_parameters() {
        let mut config = PortalToml::default();
        config.impact.unit_size = 0.0;
        config.impact.per_unit_contribution = -5.0;
        config.session.ttl_hours = 0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("unit_size"));
        assert!(warnings[1].contains("per_unit_contribution"));
        assert!(config.impact.tracker().is_err());
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let mut config = PortalToml::parse("[server]\nport = 9000").unwrap();
        let env: HashMap<&str, &str> = [
            ("REFURB_PORT", "9100"),
            ("REFURB_DB_PATH", "/tmp/other.db"),
            ("REFURB_PER_UNIT_CONTRIBUTION", "420"),
        ]
        .into_iter()
        .collect();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.impact.per_unit_contribution, 420.0);
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let mut config = PortalToml::default();
        let err = config
            .apply_overrides(|k| (k == "REFURB_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("REFURB_PORT"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = PortalToml::default();
        config.server.port = 4000;
        config.impact.metric_label = "kg CO2".to_string();
        config.save(&path).unwrap();

        let loaded = PortalToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.server.port, 4000);
        assert_eq!(loaded.impact.metric_label, "kg CO2");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = PortalToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.server.port, 3142);
    }

    #[test]
    fn test_config_path_prefers_explicit() {
        let base = Path::new("/srv/portal");
        assert_eq!(
            config_path(base, None),
            PathBuf::from("/srv/portal/.refurb/portal.toml")
        );
        assert_eq!(
            config_path(base, Some(Path::new("/etc/refurb.toml"))),
            PathBuf::from("/etc/refurb.toml")
        );
    }
}
