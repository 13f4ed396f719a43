pub mod types;


pub use types::*;

use anyhow::Result;
use std::path::Path;

impl RouterConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. When the file does not exist, built-in defaults
    /// are used — allowing the crate to start with zero configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: RouterConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => anyhow::bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            tracing::info!(
                "config file not found at {}, using defaults",
                path.display()
            );
            RouterConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!("loaded router configuration");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WAYPOINT_TRAILING_SLASH") {
            self.trailing_slash = match v.as_str() {
                "strict" => TrailingSlashPolicy::Strict,
                "ignore" => TrailingSlashPolicy::Ignore,
                "redirect" => TrailingSlashPolicy::Redirect,
                other => {
                    tracing::warn!("ignoring unrecognized WAYPOINT_TRAILING_SLASH={other}");
                    self.trailing_slash
                }
            };
        }
        if let Ok(v) = std::env::var("WAYPOINT_TRAILING_SLASH_STATUS") {
            if let Ok(n) = v.parse::<u16>() {
                self.trailing_slash_status = n;
            }
        }
        if let Ok(v) = std::env::var("WAYPOINT_DEFAULT_DOMAIN") {
            self.default_domain = Some(v);
        }
        if let Ok(v) = std::env::var("WAYPOINT_SERVE_STATIC") {
            self.serve_static = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("WAYPOINT_STATIC_ROOT") {
            self.static_root = Some(v);
        }
        if let Ok(v) = std::env::var("WAYPOINT_METHOD_OVERRIDE") {
            self.method_override = v == "true" || v == "1";
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.serve_static && self.static_root.is_none() {
            anyhow::bail!("serve_static is enabled but static_root is not set");
        }
        if !matches!(self.trailing_slash_status, 301 | 302 | 307 | 308) {
            anyhow::bail!(
                "trailing_slash_status must be a redirect status (301/302/307/308), got {}",
                self.trailing_slash_status
            );
        }
        Ok(())
    }
}
