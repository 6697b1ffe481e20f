//! Config bootstrap: YAML discovery, deep merge, and engine construction.
//!
//! All `*.yaml` / `*.yml` files under the config directory are discovered
//! recursively and merged deep-and-left in path order: mappings merge
//! recursively, sequences concatenate, scalars overwrite. The merged document
//! is then deserialized and validated; any invalid value is fatal at startup.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use virdi_engine::{Engine, Resource, ResourceMapping};
use walkdir::WalkDir;

/// Errors that abort the bootstrap.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A discovered file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A discovered file is not valid YAML.
    #[error("invalid yaml in {path}: {source}")]
    Yaml {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The merged document violates the config schema.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The merged on-disk configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BootstrapConfig {
    /// Resources to create at startup.
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    /// Per-game resource mappings.
    #[serde(default)]
    pub games: BTreeMap<String, GameDef>,
}

/// One `resources:` list entry.
#[derive(Debug, Deserialize)]
pub struct ResourceDef {
    /// Stable resource identifier.
    pub id: String,
    /// Capacity of the resource's global buffer.
    pub buffer_limit: u64,
}

/// One `games.<game_id>` block.
#[derive(Debug, Default, Deserialize)]
pub struct GameDef {
    /// Mappings keyed by broker resource id.
    #[serde(default)]
    pub resource_mappings: BTreeMap<String, MappingDef>,
}

/// One `resource_mappings.<resource_id>` block.
#[derive(Debug, Default, Deserialize)]
pub struct MappingDef {
    /// Conversion factor shared by every entry; defaults to 1.
    pub factor: Option<u64>,
    /// Conversion divisor shared by every entry; defaults to 1.
    pub divisor: Option<u64>,
    /// The game-side resource ids, in short or override form.
    #[serde(default)]
    pub game_ids: Vec<GameIdEntry>,
}

/// A `game_ids` entry: either a bare external id or an external id with a
/// factor/divisor override that multiplies the group defaults.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GameIdEntry {
    /// `- <external_id>`
    Plain(String),
    /// `- <external_id>: { factor: <int>, divisor: <int> }`
    WithOverride(BTreeMap<String, Option<MappingOverride>>),
}

/// A per-entry factor/divisor override.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MappingOverride {
    /// Extra factor applied on top of the group factor.
    pub factor: Option<u64>,
    /// Extra divisor applied on top of the group divisor.
    pub divisor: Option<u64>,
}

/// Loads and merges every YAML file under `dir`.
pub fn load_dir(dir: &Path) -> Result<BootstrapConfig, ConfigError> {
    let mut merged = Value::Null;

    for path in discover(dir) {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let doc: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.clone(),
            source,
        })?;
        if doc.is_null() {
            continue;
        }
        info!(path = %path.display(), "merging config file");
        merged = deep_merge(merged, doc);
    }

    if merged.is_null() {
        return Ok(BootstrapConfig::default());
    }
    serde_yaml::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// Builds the engine from a loaded configuration.
pub fn build_engine(config: &BootstrapConfig) -> Result<Engine, ConfigError> {
    let mut resource_ids = HashSet::new();
    let mut resources = Vec::with_capacity(config.resources.len());

    for def in &config.resources {
        if def.id.is_empty() {
            return Err(ConfigError::Invalid("found resource without id".to_string()));
        }
        if def.buffer_limit == 0 {
            return Err(ConfigError::Invalid(format!(
                "resource {} needs a positive buffer_limit",
                def.id
            )));
        }
        if !resource_ids.insert(def.id.clone()) {
            return Err(ConfigError::Invalid(format!(
                "resource {} is defined twice",
                def.id
            )));
        }
        resources.push(Resource::new(&def.id, def.buffer_limit));
    }

    let mut mappings = Vec::new();
    for (game_id, game) in &config.games {
        for (resource_id, def) in &game.resource_mappings {
            if !resource_ids.contains(resource_id) {
                return Err(ConfigError::Invalid(format!(
                    "resource mapping in game {game_id} references unknown resource {resource_id}"
                )));
            }

            let group_factor = def.factor.unwrap_or(1);
            let group_divisor = def.divisor.unwrap_or(1);

            for entry in &def.game_ids {
                let (external_id, factor, divisor) = match entry {
                    GameIdEntry::Plain(external_id) => {
                        (external_id.clone(), group_factor, group_divisor)
                    }
                    GameIdEntry::WithOverride(map) => {
                        let Some((external_id, inner)) = map.iter().next() else {
                            continue;
                        };
                        let inner = inner.clone().unwrap_or_default();
                        (
                            external_id.clone(),
                            group_factor * inner.factor.unwrap_or(1),
                            group_divisor * inner.divisor.unwrap_or(1),
                        )
                    }
                };

                if factor == 0 || divisor == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "mapping {game_id}|{external_id} needs positive factor and divisor"
                    )));
                }

                info!(
                    game = %game_id,
                    external = %external_id,
                    resource = %resource_id,
                    factor,
                    divisor,
                    "creating resource mapping"
                );
                mappings.push(ResourceMapping::new(
                    resource_id,
                    game_id,
                    external_id,
                    factor,
                    divisor,
                ));
            }
        }
    }

    Ok(Engine::new(resources).with_mappings(mappings))
}

fn discover(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml" | "yml")
            )
        })
        .collect();
    files.sort();
    files
}

/// Recursively merges `overlay` into `base`: mappings merge key by key,
/// sequences concatenate, everything else overwrites.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.remove(&key) {
                    Some(existing) => {
                        base.insert(key, deep_merge(existing, value));
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Mapping(base)
        }
        (Value::Sequence(mut base), Value::Sequence(overlay)) => {
            base.extend(overlay);
            Value::Sequence(base)
        }
        (_, overlay) => overlay,
    }
}
