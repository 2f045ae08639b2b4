//! World definition loading.
//!
//! A world file is TOML with one `[[spawn]]` table per spawn point:
//!
//! ```toml
//! [[spawn]]
//! id = 1
//! kind = "goblin"
//! level = 5
//! position = [10.0, 0.0, 0.0]
//! loot_table = 7
//! patrol_radius = 4.0
//! ```
//!
//! Every entry is validated before it is registered.

use ironvale_common::WorldError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::lifecycle::{SpawnPoint, SpawnRegistry};

/// Errors that can occur while loading a world definition.
#[derive(Debug, Error)]
pub enum WorldLoadError {
    /// File not found.
    #[error("World file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read world file: {0}")]
    Read(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse world TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// An entry failed validation.
    #[error(transparent)]
    Invalid(#[from] WorldError),
}

/// Result type for world loading.
pub type WorldLoadResult<T> = Result<T, WorldLoadError>;

/// On-disk world definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldFile {
    /// Spawn point entries
    #[serde(default, rename = "spawn")]
    pub spawns: Vec<SpawnPoint>,
}

/// Parses and validates a world definition.
pub fn parse_world(content: &str) -> WorldLoadResult<SpawnRegistry> {
    let file: WorldFile = toml::from_str(content)?;

    let mut registry = SpawnRegistry::new();
    for point in file.spawns {
        debug!(
            spawn_point = point.id.raw(),
            kind = point.kind.display_name(),
            "Registering spawn point"
        );
        registry.register(point)?;
    }
    Ok(registry)
}

/// Loads a world definition from disk.
pub fn load_world(path: &Path) -> WorldLoadResult<SpawnRegistry> {
    if !path.exists() {
        return Err(WorldLoadError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let registry = parse_world(&content)?;
    info!(path = %path.display(), spawn_points = registry.len(), "Loaded world");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::{MobKind, WeaponCategory};
    use ironvale_common::{LootTableId, SpawnPointId, Vec3};
    use std::io::Write;
    use std::time::Duration;

    const SAMPLE: &str = r#"
[[spawn]]
id = 1
kind = "goblin"
level = 5
position = [10.0, 0.0, 0.0]
loot_table = 7

[[spawn]]
id = 2
kind = "skeleton"
level = 9
position = [-20.0, 0.0, 4.0]
aggressive = false
weapon = "melee"
respawn_delay_ms = 30000
patrol_radius = 5.0
stats = { constitution = 6, strength = 4, ranged = 2, defense = 3, weapon_damage = 5 }
"#;

    #[test]
    fn test_parse_world() {
        let registry = parse_world(SAMPLE).expect("parse");
        assert_eq!(registry.len(), 2);

        let goblin = registry.get(SpawnPointId::new(1)).expect("goblin");
        assert_eq!(goblin.kind, MobKind::Goblin);
        assert_eq!(goblin.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(goblin.loot_table, Some(LootTableId::new(7)));
        assert!(goblin.aggressive);

        let skeleton = registry.get(SpawnPointId::new(2)).expect("skeleton");
        assert!(!skeleton.aggressive);
        assert_eq!(skeleton.effective_weapon(), WeaponCategory::Melee);
        assert_eq!(skeleton.effective_stats().max_health(), 60);
        assert_eq!(
            skeleton.respawn_delay(&crate::config::SimConfig::default()),
            Duration::from_secs(30)
        );

        let order: Vec<_> = registry.iter().map(|p| p.id.raw()).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_empty_world() {
        let registry = parse_world("").expect("parse");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let bad = "[[spawn]]\nid = 1\nkind = \"kraken\"\nlevel = 1\nposition = [0.0, 0.0, 0.0]\n";
        assert!(matches!(parse_world(bad), Err(WorldLoadError::Parse(_))));
    }

    #[test]
    fn test_validation_error_surfaces() {
        let bad = "[[spawn]]\nid = 1\nkind = \"goblin\"\nlevel = 0\nposition = [0.0, 0.0, 0.0]\n";
        assert!(matches!(
            parse_world(bad),
            Err(WorldLoadError::Invalid(WorldError::InvalidSpawnPoint { .. }))
        ));

        let dup = format!(
            "{SAMPLE}\n[[spawn]]\nid = 1\nkind = \"wolf\"\nlevel = 2\nposition = [0.0, 0.0, 0.0]\n"
        );
        assert!(matches!(
            parse_world(&dup),
            Err(WorldLoadError::Invalid(WorldError::DuplicateSpawnPoint(_)))
        ));
    }

    #[test]
    fn test_load_world_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");

        let registry = load_world(file.path()).expect("load");
        assert_eq!(registry.len(), 2);

        let missing = load_world(Path::new("/nonexistent/ironvale/world.toml"));
        assert!(matches!(missing, Err(WorldLoadError::NotFound(_))));
    }
}
