//! Agent profiles: static configuration loaded from `agents.yaml`.
//!
//! One `main:` profile with nested `subagents:` describes each agent's
//! persona, model, tool subset, depth budget, compaction threshold,
//! converted-content access mode, and filesystem permissions. Subagent
//! profiles inherit unset fields from their parent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::guard::{ConvertedAccessMode, Permissions, normalize_path};

/// Agents file name inside the config directory.
pub const AGENTS_FILENAME: &str = "agents.yaml";
/// Default spawn depth budget.
const DEFAULT_MAX_DEPTH: usize = 3;
/// Default compaction threshold.
const DEFAULT_COMPACT_THRESHOLD: f32 = 0.9;

/// Raw profile configuration as parsed from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// System context/persona text.
    #[serde(default)]
    pub context: String,
    /// Model identifier override.
    #[serde(default)]
    pub model: Option<String>,
    /// Working directory override (relative to the parent's).
    #[serde(default)]
    pub path: Option<String>,
    /// Tool subset; empty means every tool.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Named subagent profiles.
    #[serde(default)]
    pub subagents: BTreeMap<String, ProfileConfig>,
    /// Spawn depth budget.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Compaction threshold in `[0, 1]`.
    #[serde(default)]
    pub compact_threshold: Option<f32>,
    /// Converted-content access mode: `strict`, `hybrid`, or `open`.
    #[serde(default)]
    pub converted_access_mode: Option<String>,
    /// Filesystem permission scopes.
    #[serde(default)]
    pub permissions: Option<PermissionsConfig>,
}

/// Raw permission scopes as parsed from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Readable path prefixes.
    #[serde(default)]
    pub read: Vec<String>,
    /// Writable path prefixes (write implies read).
    #[serde(default)]
    pub write: Vec<String>,
}

/// Top-level shape of `agents.yaml`.
#[derive(Debug, Clone, Deserialize)]
struct AgentsFile {
    main: ProfileConfig,
}

/// Resolved profile defining an agent's configuration.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// System context/persona text.
    pub context: String,
    /// Model identifier.
    pub model: String,
    /// Working directory.
    pub base_dir: PathBuf,
    /// Tool subset; empty means every tool.
    pub tools: Vec<String>,
    /// Named subagent configurations.
    pub subagents: BTreeMap<String, ProfileConfig>,
    /// Profile name.
    pub name: String,
    /// Spawn depth budget.
    pub max_depth: usize,
    /// Compaction threshold in `[0, 1]`.
    pub compact_threshold: f32,
    /// Converted-content access mode.
    pub converted_access_mode: ConvertedAccessMode,
    /// Filesystem permissions.
    pub permissions: Permissions,
}

impl AgentProfile {
    /// Default profile for a base directory: every tool, hybrid
    /// converted access, full base-dir permissions.
    #[must_use]
    pub fn default_for(base_dir: &Path, model: &str) -> Self {
        Self {
            context: String::new(),
            model: model.to_string(),
            base_dir: base_dir.to_path_buf(),
            tools: Vec::new(),
            subagents: BTreeMap::new(),
            name: "main".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            converted_access_mode: ConvertedAccessMode::Hybrid,
            permissions: Permissions::for_base_dir(base_dir),
        }
    }

    /// Builds a profile from raw configuration, inheriting unset fields
    /// from `parent` when given.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Profile`] on invalid threshold or access
    /// mode values.
    pub fn from_config(
        config: &ProfileConfig,
        name: &str,
        parent: Option<&Self>,
        default_base_dir: &Path,
        default_model: &str,
    ) -> Result<Self> {
        let mut base_dir = parent.map_or_else(
            || default_base_dir.to_path_buf(),
            |p| p.base_dir.clone(),
        );
        if let Some(ref path) = config.path {
            let candidate = Path::new(path);
            base_dir = if candidate.is_absolute() {
                normalize_path(candidate)
            } else {
                normalize_path(&base_dir.join(candidate))
            };
        }

        let model = config
            .model
            .clone()
            .or_else(|| parent.map(|p| p.model.clone()))
            .unwrap_or_else(|| default_model.to_string());

        let max_depth = config
            .max_depth
            .or_else(|| parent.map(|p| p.max_depth))
            .unwrap_or(DEFAULT_MAX_DEPTH);

        let compact_threshold = match config.compact_threshold {
            Some(value) => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(AgentError::Profile {
                        message: format!(
                            "compact_threshold must be between 0.0 and 1.0 (got {value})"
                        ),
                    }
                    .into());
                }
                value
            }
            None => parent.map_or(DEFAULT_COMPACT_THRESHOLD, |p| p.compact_threshold),
        };

        let converted_access_mode = match config.converted_access_mode.as_deref() {
            Some(value) => ConvertedAccessMode::parse(value)
                .map_err(|message| AgentError::Profile { message })?,
            None => parent.map_or(ConvertedAccessMode::Hybrid, |p| p.converted_access_mode),
        };

        let permissions = match &config.permissions {
            Some(raw) => {
                let resolve = |paths: &[String]| -> Vec<PathBuf> {
                    paths
                        .iter()
                        .map(|p| {
                            let candidate = Path::new(p);
                            if candidate.is_absolute() {
                                normalize_path(candidate)
                            } else {
                                normalize_path(&base_dir.join(candidate))
                            }
                        })
                        .collect()
                };
                Permissions {
                    read_paths: resolve(&raw.read),
                    write_paths: resolve(&raw.write),
                    explicit: true,
                }
            }
            None => parent.map_or_else(
                || Permissions::for_base_dir(&base_dir),
                |p| p.permissions.clone(),
            ),
        };

        Ok(Self {
            context: config.context.clone(),
            model,
            base_dir,
            tools: config.tools.clone(),
            subagents: config.subagents.clone(),
            name: name.to_string(),
            max_depth,
            compact_threshold,
            converted_access_mode,
            permissions,
        })
    }

    /// Resolves a named subagent profile, inheriting from this profile.
    ///
    /// Returns `None` for unknown names.
    #[must_use]
    pub fn create_subagent_profile(&self, subagent_name: &str) -> Option<Self> {
        let config = self.subagents.get(subagent_name)?;
        Self::from_config(config, subagent_name, Some(self), &self.base_dir, &self.model).ok()
    }

    /// Derives a dynamic sub-agent profile: caller persona and tool
    /// subset, everything else inherited.
    #[must_use]
    pub fn derive_dynamic(
        &self,
        context: &str,
        model: Option<&str>,
        tools: Option<&[String]>,
        child_number: u64,
    ) -> Self {
        Self {
            context: context.to_string(),
            model: model.map_or_else(|| self.model.clone(), ToString::to_string),
            base_dir: self.base_dir.clone(),
            tools: tools.map_or_else(|| self.tools.clone(), <[String]>::to_vec),
            subagents: BTreeMap::new(),
            name: format!("sub-{child_number}"),
            max_depth: self.max_depth,
            compact_threshold: self.compact_threshold,
            converted_access_mode: self.converted_access_mode,
            permissions: self.permissions.clone(),
        }
    }

    /// Loads the `main` profile from `<base_dir>/.flavia/agents.yaml`,
    /// falling back to [`AgentProfile::default_for`] when the file is
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Profile`] when the file exists but does not
    /// parse or validate.
    pub fn load(base_dir: &Path, default_model: &str) -> Result<Self> {
        let path = base_dir.join(".flavia").join(AGENTS_FILENAME);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Ok(Self::default_for(base_dir, default_model));
        };
        let file: AgentsFile = serde_yaml::from_str(&raw).map_err(AgentError::from)?;
        Self::from_config(&file.main, "main", None, base_dir, default_model)
    }
}
