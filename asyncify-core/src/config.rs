//! Project configuration
//!
//! The first source found wins:
//! 1. `--config <FILE>` on the command line
//! 2. `.asyncifyrc.json` in the project root
//! 3. `asyncify.config.json` in the project root
//! 4. the `"asyncify"` object in `package.json`
//!
//! Every field is optional and falls back to the built-in default. Command
//! line flags override whatever the file says.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::CallPattern;
use crate::report::DEFAULT_REPORT_PATH;

/// Dedicated config files, in lookup order
const CONFIG_FILE_NAMES: &[&str] = &[".asyncifyrc.json", "asyncify.config.json"];

/// Key holding the config object inside `package.json`
const PACKAGE_JSON_KEY: &str = "asyncify";

/// Skipped unless the config lists its own excludes
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/*.min.js",
];

/// Config as written by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsyncifyConfig {
    /// Object the blocking call is made on (`Promise`)
    #[serde(default)]
    pub namespace: Option<String>,

    /// Blocking method name (`await`)
    #[serde(default)]
    pub method: Option<String>,

    /// Report store path (`remove-promise-await.yaml`)
    #[serde(default)]
    pub report: Option<PathBuf>,

    /// Only files matching one of these globs are transformed
    #[serde(default)]
    pub include: Vec<String>,

    /// Files matching one of these globs are never transformed
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Append reports for files that only had skipped calls
    #[serde(default)]
    pub report_skip_only_files: Option<bool>,
}

/// Config with defaults filled in and globs compiled
#[derive(Debug)]
pub struct ResolvedConfig {
    pub pattern: CallPattern,
    pub report_path: PathBuf,
    pub report_skip_only_files: bool,
    /// `None` when no include globs were given
    pub include: Option<GlobSet>,
    pub exclude: GlobSet,
    /// Where the config came from; `None` for built-in defaults
    pub config_path: Option<PathBuf>,
}

/// Whether `name` can stand as a bare JavaScript identifier
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
    head_ok && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn compile_globs<'p>(patterns: impl IntoIterator<Item = &'p str>, field: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid {} pattern: {}", field, pattern))?;
        builder.add(glob);
    }
    builder
        .build()
        .with_context(|| format!("failed to compile {} patterns", field))
}

impl AsyncifyConfig {
    /// Check identifiers, paths and globs without building anything
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("namespace", &self.namespace), ("method", &self.method)] {
            match value {
                Some(name) if !is_identifier(name) => {
                    anyhow::bail!("{} must be a plain identifier (got {:?})", field, name)
                }
                _ => {}
            }
        }

        if self.report.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            anyhow::bail!("report must not be empty");
        }

        for pattern in &self.include {
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        }
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Fill in defaults and compile globs
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let include = if self.include.is_empty() {
            None
        } else {
            Some(compile_globs(self.include.iter().map(String::as_str), "include")?)
        };

        // User excludes replace the defaults rather than extending them
        let exclude = if self.exclude.is_empty() {
            compile_globs(DEFAULT_EXCLUDES.iter().copied(), "exclude")?
        } else {
            compile_globs(self.exclude.iter().map(String::as_str), "exclude")?
        };

        let defaults = CallPattern::default();
        let pattern = CallPattern {
            namespace: self.namespace.clone().unwrap_or(defaults.namespace),
            method: self.method.clone().unwrap_or(defaults.method),
        };

        Ok(ResolvedConfig {
            pattern,
            report_path: self
                .report
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH)),
            report_skip_only_files: self.report_skip_only_files.unwrap_or(false),
            include,
            exclude,
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Built-in defaults, used when no config exists
    pub fn defaults() -> Result<Self> {
        AsyncifyConfig::default().resolve()
    }

    /// Excludes win over includes; no include globs means everything is in
    pub fn should_include(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        !self.exclude.is_match(path.as_ref())
            && self
                .include
                .as_ref()
                .is_none_or(|include| include.is_match(path.as_ref()))
    }
}

/// Look for a config in `project_root`; `Ok(None)` means use defaults
pub fn discover_config(project_root: &Path) -> Result<Option<(AsyncifyConfig, PathBuf)>> {
    for name in CONFIG_FILE_NAMES {
        let path = project_root.join(name);
        if path.is_file() {
            return Ok(Some((load_config_file(&path)?, path)));
        }
    }

    let manifest = project_root.join("package.json");
    if manifest.is_file() {
        if let Some(config) = load_from_package_json(&manifest)? {
            return Ok(Some((config, manifest)));
        }
    }

    Ok(None)
}

/// Read, parse and validate a standalone config file
pub fn load_config_file(path: &Path) -> Result<AsyncifyConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: AsyncifyConfig =
        serde_json::from_str(&text).with_context(|| format!("failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;
    Ok(config)
}

fn load_from_package_json(path: &Path) -> Result<Option<AsyncifyConfig>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut manifest: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;

    let Some(section) = manifest.get_mut(PACKAGE_JSON_KEY).map(serde_json::Value::take) else {
        return Ok(None);
    };

    let config: AsyncifyConfig = serde_json::from_value(section)
        .with_context(|| format!("invalid \"{}\" section in {}", PACKAGE_JSON_KEY, path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid \"{}\" section in {}", PACKAGE_JSON_KEY, path.display()))?;
    Ok(Some(config))
}

/// Load the explicit config, or discover one under `project_root`, and resolve it
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let found = match config_path {
        Some(path) => Some((load_config_file(path)?, path.to_path_buf())),
        None => discover_config(project_root)?,
    };

    match found {
        Some((config, path)) => {
            let mut resolved = config.resolve()?;
            resolved.config_path = Some(path);
            Ok(resolved)
        }
        None => ResolvedConfig::defaults(),
    }
}
