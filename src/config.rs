//! Application configuration.
//!
//! Values come from CLI flags or a JSON file; either way they are validated
//! once before the scan loop starts. The scanning core treats the config as
//! immutable after that.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_window_title() -> String {
    "Vortex".into()
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_min_matches() -> usize {
    8
}

fn default_ratio() -> f32 {
    0.75
}

fn default_click_delay() -> f64 {
    2.0
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_retry_limit() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Drive the Vortex workflow (scan the mod-manager window first).
    #[serde(default)]
    pub vortex: bool,
    /// Use the legacy template variants and legacy popup dialogs.
    #[serde(default)]
    pub legacy: bool,
    /// Capture only the primary monitor even when several are present.
    #[serde(default)]
    pub force_primary: bool,
    /// Title substring of the window searched during the vortex phase.
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// Directory holding the button template images.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Where to write annotated detection frames; disabled when unset.
    #[serde(default)]
    pub debug_frame_dir: Option<PathBuf>,

    /// Minimum good matches for the vortex-button search.
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,
    /// Lowe ratio-test threshold.
    #[serde(default = "default_ratio")]
    pub ratio_threshold: f32,
    /// Seconds between scan ticks.
    #[serde(default = "default_click_delay")]
    pub click_delay: f64,
    /// Seconds to settle after clicking away a popup dialog.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    /// Consecutive web-phase misses before the cycle restarts.
    #[serde(default = "default_retry_limit")]
    pub wabbajack_retry_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vortex: false,
            legacy: false,
            force_primary: false,
            window_title: default_window_title(),
            assets_dir: default_assets_dir(),
            debug_frame_dir: None,
            min_matches: default_min_matches(),
            ratio_threshold: default_ratio(),
            click_delay: default_click_delay(),
            retry_delay: default_retry_delay(),
            wabbajack_retry_limit: default_retry_limit(),
        }
    }
}

impl AppConfig {
    /// Load a config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Check value ranges and option combinations. Fatal before the loop.
    pub fn validate(&self) -> Result<()> {
        if self.min_matches < 1 {
            return Err(Error::Config("min_matches must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.ratio_threshold) {
            return Err(Error::Config(format!(
                "ratio_threshold must be in [0, 1], got {}",
                self.ratio_threshold
            )));
        }
        if self.click_delay < 0.1 {
            return Err(Error::Config(format!(
                "click_delay must be at least 0.1s, got {}",
                self.click_delay
            )));
        }
        if self.retry_delay < 0.1 {
            return Err(Error::Config(format!(
                "retry_delay must be at least 0.1s, got {}",
                self.retry_delay
            )));
        }
        if self.wabbajack_retry_limit < 1 {
            return Err(Error::Config(
                "wabbajack_retry_limit must be at least 1".into(),
            ));
        }
        if self.vortex && self.window_title.trim().is_empty() {
            return Err(Error::Config(
                "the vortex workflow needs a non-empty window_title".into(),
            ));
        }
        Ok(())
    }

    /// Inter-tick delay as a [`Duration`].
    pub fn click_interval(&self) -> Duration {
        Duration::from_secs_f64(self.click_delay)
    }

    /// Popup settle delay as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = AppConfig {
            ratio_threshold: 1.5,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        config.ratio_threshold = 0.75;
        config.click_delay = 0.0;
        assert!(config.validate().is_err());

        config.click_delay = 2.0;
        config.wabbajack_retry_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn vortex_requires_window_title() {
        let config = AppConfig {
            vortex: true,
            window_title: "  ".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
