//! Project configuration: a three-tier JSON merge.
//!
//! Built-in defaults are overridden by `.claude/cat/cat-config.json`, which
//! is in turn overridden by `.claude/cat/cat-config.local.json` (for a
//! developer's own machine-local tweaks, typically gitignored).

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

static CONFIG: OnceLock<CatConfig> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trust {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verify {
    None,
    Changed,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewThreshold {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatConfig {
    #[serde(rename = "autoRemoveWorktrees")]
    pub auto_remove_worktrees: bool,
    pub trust: Trust,
    pub verify: Verify,
    /// Investigation depth. Accepts either `curiosity` or `effort` as the
    /// JSON key, matching the two synonymous names the external interface
    /// recognizes.
    #[serde(rename = "curiosity", alias = "effort")]
    pub curiosity: Level,
    pub patience: Level,
    #[serde(rename = "completionWorkflow")]
    pub completion_workflow: String,
    #[serde(rename = "reviewThreshold")]
    pub review_threshold: ReviewThreshold,
}

impl Default for CatConfig {
    fn default() -> Self {
        CatConfig {
            auto_remove_worktrees: true,
            trust: Trust::Medium,
            verify: Verify::Changed,
            curiosity: Level::Medium,
            patience: Level::Medium,
            completion_workflow: "merge".to_string(),
            review_threshold: ReviewThreshold::High,
        }
    }
}

impl CatConfig {
    /// Merge `override_value` onto `self`, field by field, where a present
    /// JSON key wins. Absent keys leave the current value untouched.
    fn merge_from(mut self, override_value: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = override_value else {
            return Ok(self);
        };

        let mut base = serde_json::to_value(&self).context("serializing base config")?;
        let serde_json::Value::Object(base_map) = &mut base else {
            unreachable!("CatConfig always serializes to a JSON object");
        };
        for (key, value) in map {
            base_map.insert(key.clone(), value.clone());
        }
        self = serde_json::from_value(base).context("merging config override")?;
        Ok(self)
    }
}

/// Load the three-tier config rooted at `repo_root`, caching the result for
/// the lifetime of the process.
pub fn load(repo_root: &Path) -> &'static CatConfig {
    CONFIG.get_or_init(|| load_uncached(repo_root).unwrap_or_default())
}

fn load_uncached(repo_root: &Path) -> Result<CatConfig> {
    let mut config = CatConfig::default();

    let project = repo_root.join(".claude/cat/cat-config.json");
    if let Some(value) = read_json_if_present(&project)? {
        config = config.merge_from(&value)?;
    }

    let local = repo_root.join(".claude/cat/cat-config.local.json");
    if let Some(value) = read_json_if_present(&local)? {
        config = config.merge_from(&value)?;
    }

    Ok(config)
}

fn read_json_if_present(path: &Path) -> Result<Option<serde_json::Value>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let value = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = CatConfig::default();
        assert!(config.auto_remove_worktrees);
        assert_eq!(config.trust, Trust::Medium);
        assert_eq!(config.completion_workflow, "merge");
    }

    #[test]
    fn load_uncached_falls_back_to_defaults_when_absent() {
        let dir = TempDir::new().unwrap();
        let config = load_uncached(dir.path()).unwrap();
        assert_eq!(config, CatConfig::default());
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let cat_dir = dir.path().join(".claude/cat");
        fs::create_dir_all(&cat_dir).unwrap();
        fs::write(
            cat_dir.join("cat-config.json"),
            r#"{"trust": "high", "autoRemoveWorktrees": false}"#,
        )
        .unwrap();

        let config = load_uncached(dir.path()).unwrap();
        assert_eq!(config.trust, Trust::High);
        assert!(!config.auto_remove_worktrees);
        assert_eq!(config.verify, Verify::Changed);
    }

    #[test]
    fn local_config_overrides_project_config() {
        let dir = TempDir::new().unwrap();
        let cat_dir = dir.path().join(".claude/cat");
        fs::create_dir_all(&cat_dir).unwrap();
        fs::write(cat_dir.join("cat-config.json"), r#"{"trust": "high"}"#).unwrap();
        fs::write(
            cat_dir.join("cat-config.local.json"),
            r#"{"trust": "low"}"#,
        )
        .unwrap();

        let config = load_uncached(dir.path()).unwrap();
        assert_eq!(config.trust, Trust::Low);
    }

    #[test]
    fn effort_is_accepted_as_alias_for_curiosity() {
        let dir = TempDir::new().unwrap();
        let cat_dir = dir.path().join(".claude/cat");
        fs::create_dir_all(&cat_dir).unwrap();
        fs::write(cat_dir.join("cat-config.json"), r#"{"effort": "high"}"#).unwrap();

        let config = load_uncached(dir.path()).unwrap();
        assert_eq!(config.curiosity, Level::High);
    }
}
