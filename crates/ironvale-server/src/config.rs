//! Server configuration.
//!
//! Wraps the simulation tunables with host settings (world file, event bus,
//! demo players). Loaded from `ironvale.toml`; a missing or invalid file falls
//! back to defaults.

use ironvale_sim::SimConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "ironvale.toml";

/// Server configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // === Host Settings ===
    /// World definition file with `[[spawn]]` entries
    pub world_file: PathBuf,
    /// Stop after this many ticks (0 = run until ctrl-c)
    pub max_ticks: u64,
    /// Event bus capacity
    pub event_bus_capacity: usize,
    /// Log every emitted event as JSON
    pub log_events: bool,

    // === Demo Settings ===
    /// Scripted players circling the world origin
    pub demo_players: u32,
    /// Arrows each demo player starts with
    pub demo_quiver: u32,

    /// Simulation tunables
    pub sim: SimConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            world_file: PathBuf::from("demos/world.toml"),
            max_ticks: 0,
            event_bus_capacity: 4096,
            log_events: true,

            demo_players: 2,
            demo_quiver: 20,

            sim: SimConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }
}
