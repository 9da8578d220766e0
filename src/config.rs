use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::{fs, process};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::constants::CONFIG_POLL_INTERVAL;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub const TIME_FORMAT_12H: &str = "12h";
pub const TIME_FORMAT_24H: &str = "24h";
pub const UNIT_METRIC: &str = "metric";
pub const UNIT_IMPERIAL: &str = "imperial";

/// Display preferences and weather location, reloaded from disk while
/// the daemon runs. Field names mirror the on-disk YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub location: String,
    pub time_format: String,
    pub text_color: String,
    pub background_color: String,
    pub background_image: String,
    pub unit: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            location: "Jersey City, NJ".to_string(),
            time_format: TIME_FORMAT_12H.to_string(),
            text_color: "#FFFFFF".to_string(),
            background_color: "#000000".to_string(),
            background_image: "background.png".to_string(),
            unit: UNIT_IMPERIAL.to_string(),
        }
    }
}

/// CLI overrides, layered over the YAML file.
#[derive(Debug, Parser, Clone)]
#[command(name = "nexusd", about = "iCUE Nexus display daemon")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Log filter, e.g. "info" or "nexusd=debug"
    #[arg(long)]
    pub log_level: Option<String>,
    /// Dump the effective config and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML (explicit path or search), validate,
/// honor --dump-config.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    let cfg = load_from(cli.config.as_deref())?;

    if cli.dump_config {
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        process::exit(0);
    }

    Ok(cfg)
}

/// Loads from an explicit path (missing file is an error) or from the
/// search locations (missing file falls back to defaults).
pub fn load_from(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = if let Some(p) = explicit {
        if !p.exists() {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        read_yaml(p)?
    } else if let Some(p) = find_config_file() {
        read_yaml(&p)?
    } else {
        Config::default()
    };

    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/nexusd/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/nexusd/config.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["nexusd.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

/// Directory for background images: ~/.config/nexusd/images
pub fn images_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config/nexusd/images"))
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    match cfg.time_format.as_str() {
        TIME_FORMAT_12H | TIME_FORMAT_24H => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "timeFormat must be 12h|24h, got {other:?}"
            )));
        }
    }
    match cfg.unit.as_str() {
        UNIT_METRIC | UNIT_IMPERIAL => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unit must be metric|imperial, got {other:?}"
            )));
        }
    }
    if cfg.location.trim().is_empty() {
        return Err(ConfigError::Validation("location must not be empty".into()));
    }
    Ok(())
}

/// Periodically reloads the config file and propagates changes: any
/// change updates the shared copy and signals the scheduler; a
/// location or unit change additionally pokes the weather monitor.
pub async fn run_watcher(
    explicit: Option<PathBuf>,
    shared: Arc<RwLock<Config>>,
    prefs_tx: mpsc::Sender<Config>,
    weather_refresh_tx: mpsc::Sender<()>,
) {
    let mut ticker = tokio::time::interval(CONFIG_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let new_cfg = match load_from(explicit.as_deref()) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Error loading config: {e}");
                continue;
            }
        };

        let changed = {
            let current = shared.read().unwrap_or_else(|e| e.into_inner());
            if *current == new_cfg {
                None
            } else {
                let weather_relevant =
                    current.location != new_cfg.location || current.unit != new_cfg.unit;
                Some(weather_relevant)
            }
        };

        let Some(weather_relevant) = changed else {
            continue;
        };

        if weather_relevant {
            info!("Config changed, triggering weather update for {}", new_cfg.location);
            let _ = weather_refresh_tx.try_send(());
        } else {
            debug!("Config changed");
        }

        {
            let mut current = shared.write().unwrap_or_else(|e| e.into_inner());
            *current = new_cfg.clone();
        }
        let _ = prefs_tx.try_send(new_cfg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("timeFormat: 24h\nunit: metric\n").unwrap();
        assert_eq!(cfg.time_format, "24h");
        assert_eq!(cfg.unit, "metric");
        assert_eq!(cfg.location, "Jersey City, NJ");
        assert_eq!(cfg.text_color, "#FFFFFF");
    }

    #[test]
    fn camel_case_keys_round_trip() {
        let cfg = Config {
            text_color: "#ff8800".into(),
            ..Config::default()
        };
        let s = serde_yaml::to_string(&cfg).unwrap();
        assert!(s.contains("textColor"));
        assert!(s.contains("backgroundImage"));
        let back: Config = serde_yaml::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn rejects_bad_enumerations() {
        let mut cfg = Config::default();
        cfg.time_format = "13h".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));

        let mut cfg = Config::default();
        cfg.unit = "kelvin".into();
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.location = "  ".into();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let missing = Path::new("/nonexistent/nexusd.yaml");
        assert!(matches!(
            load_from(Some(missing)),
            Err(ConfigError::Validation(_))
        ));
    }
}
