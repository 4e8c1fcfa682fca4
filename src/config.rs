//! Runtime configuration.
//!
//! Everything has a default; a JSON file named by `LORENZ_CONFIG` may
//! override any subset of fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animator::AnimatorConfig;
use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "LORENZ_CONFIG";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub animator: AnimatorConfig,
    pub window: WindowConfig,
    pub web: WebConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub frame_interval_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "Lorenz Attractor".to_string(),
            width: 800.0,
            height: 600.0,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
    pub frame_interval_ms: u64,
    /// Upper bound for `/snapshot.png?frames=N`
    pub max_snapshot_frames: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            bind: "127.0.0.1:3000".to_string(),
            frame_interval_ms: 16,
            max_snapshot_frames: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Output pixels per viewport pixel
    pub scale: u32,
    pub directory: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            scale: 4,
            directory: ".".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, overridden by the file in `LORENZ_CONFIG` when set.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let config = Self::from_path(Path::new(&path))?;
                log::info!("loaded config from {}", Path::new(&path).display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Trivial bounds clamping; nothing here rejects a config.
    pub fn sanitized(mut self) -> Self {
        let a = &mut self.animator;
        if !(a.simulation.dt > 0.0) {
            log::warn!("dt must be positive, using default");
            a.simulation.dt = 0.01;
        }
        a.viewport.width = a.viewport.width.max(1.0);
        a.viewport.height = a.viewport.height.max(1.0);
        a.trail.emission_period = a.trail.emission_period.max(1);
        a.trail.decay_rate = a.trail.decay_rate.max(0.0);

        self.window.width = self.window.width.max(1.0);
        self.window.height = self.window.height.max(1.0);
        self.window.frame_interval_ms = self.window.frame_interval_ms.max(1);
        self.web.frame_interval_ms = self.web.frame_interval_ms.max(1);
        self.snapshot.scale = self.snapshot.scale.clamp(1, 16);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let c = AppConfig::default();
        let sim = c.animator.simulation;
        assert_eq!((sim.sigma, sim.rho, sim.dt), (10.0, 28.0, 0.01));
        assert_eq!(sim.beta, 8.0 / 3.0);
        assert_eq!(c.animator.seed, [0.1, 0.1, 0.1]);
        assert_eq!((c.animator.viewport.width, c.animator.viewport.height), (200.0, 150.0));
        assert_eq!(c.animator.trail.max_age, 300);
        assert_eq!(c.animator.trail.max_trails, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let c = AppConfig::from_json(r#"{ "animator": { "trail": { "max_trails": 50 } }, "web": { "bind": "0.0.0.0:8080" } }"#)
            .unwrap();
        assert_eq!(c.animator.trail.max_trails, Some(50));
        assert_eq!(c.animator.trail.max_age, 300);
        assert_eq!(c.animator.simulation, crate::lorenz::LorenzParams::default());
        assert_eq!(c.web.bind, "0.0.0.0:8080");
        assert_eq!(c.web.frame_interval_ms, 16);
    }

    #[test]
    fn test_sanitize_clamps_degenerate_values() {
        let c = AppConfig::from_json(
            r#"{ "animator": { "simulation": { "dt": -1.0 }, "viewport": { "width": 0.0 }, "trail": { "emission_period": 0, "decay_rate": -3.0 } }, "snapshot": { "scale": 0 } }"#,
        )
        .unwrap();
        assert_eq!(c.animator.simulation.dt, 0.01);
        assert_eq!(c.animator.viewport.width, 1.0);
        assert_eq!(c.animator.trail.emission_period, 1);
        assert_eq!(c.animator.trail.decay_rate, 0.0);
        assert_eq!(c.snapshot.scale, 1);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(AppConfig::from_json("{ nope"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("lorenz-profile-missing-config.json");
        assert!(matches!(AppConfig::from_path(&path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_from_path_reads_file() {
        let path = std::env::temp_dir().join(format!("lorenz-profile-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "snapshot": { "scale": 2 } }"#).unwrap();
        let c = AppConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(c.snapshot.scale, 2);
    }

    #[test]
    fn test_round_trips_through_json() {
        let c = AppConfig::default();
        let text = serde_json::to_string(&c).unwrap();
        assert_eq!(AppConfig::from_json(&text).unwrap(), c);
    }
}
