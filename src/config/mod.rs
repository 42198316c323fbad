//! Run configuration
//!
//! - [`invocation`]: captured compiler invocations and their transforms
//! - [`options`]: the adapter from an invocation to [`options::ParserOptions`]
//!
//! [`RunConfig`] collects everything else a batch needs. It is read from an
//! optional JSON file, then overridden by command-line flags; nothing is
//! taken from process-wide defaults.

pub mod invocation;
pub mod options;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::serializer::ProjectionRules;
use crate::snapshot::DuplicateFunctionPolicy;
use options::AdapterSettings;

/// Inputs that were already run through the preprocessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessedMode {
    /// Appended to every input name, e.g. `main.c` becomes `main.c.ipp`
    pub input_suffix: String,
    /// Appended to the output directory name
    pub output_dir_suffix: String,
}

impl Default for PreprocessedMode {
    fn default() -> Self {
        PreprocessedMode {
            input_suffix: ".ipp".to_string(),
            output_dir_suffix: "_i".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Batch document of captured invocations
    pub invocations: PathBuf,
    /// Inputs to pull out into their own invocations before the run
    pub split: Vec<String>,
    /// Base for relative `input` and `include` entries
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub artifact_extension: String,
    pub preprocessed: Option<PreprocessedMode>,
    /// Worker threads; `None` uses the available parallelism
    pub workers: Option<usize>,
    /// Per-file parse limit in seconds
    pub timeout_secs: Option<u64>,
    pub print_warnings: bool,
    pub print_info: bool,
    pub pretty: bool,
    pub duplicate_functions: DuplicateFunctionPolicy,
    pub adapter: AdapterSettings,
    pub rules: ProjectionRules,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            invocations: PathBuf::from("invocations.json"),
            split: Vec::new(),
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from("out"),
            artifact_extension: "obj".to_string(),
            preprocessed: None,
            workers: None,
            timeout_secs: None,
            print_warnings: false,
            print_info: false,
            pretty: false,
            duplicate_functions: DuplicateFunctionPolicy::default(),
            adapter: AdapterSettings::default(),
            rules: ProjectionRules::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(source: &str, origin: &Path) -> Result<RunConfig, ConfigError> {
        serde_json::from_str(source).map_err(|source| ConfigError::Malformed {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a run configuration file. Relative paths inside it are taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<RunConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = RunConfig::from_json(&text, path)?;

        if let Some(dir) = path.parent() {
            config.invocations = dir.join(&config.invocations);
            config.source_dir = dir.join(&config.source_dir);
            config.output_dir = dir.join(&config.output_dir);
        }
        Ok(config)
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidSetting {
                name: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidSetting {
                name: "timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.artifact_extension.is_empty() || self.artifact_extension.contains(['/', '\\', '.']) {
            return Err(ConfigError::InvalidSetting {
                name: "artifact_extension",
                reason: format!("`{}` is not a bare extension", self.artifact_extension),
            });
        }
        if self.adapter.sentinel_define.is_empty() || self.adapter.sentinel_define.starts_with('=') {
            return Err(ConfigError::InvalidSetting {
                name: "sentinel_define",
                reason: "must name a macro".to_string(),
            });
        }
        self.rules.validate()
    }

    /// Output directory with the preprocessed-mode suffix applied
    pub fn effective_output_dir(&self) -> PathBuf {
        match &self.preprocessed {
            Some(mode) if !mode.output_dir_suffix.is_empty() => {
                let mut name = self.output_dir.as_os_str().to_os_string();
                name.push(&mode.output_dir_suffix);
                PathBuf::from(name)
            }
            _ => self.output_dir.clone(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::NodeKind;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_empty_document_is_default() {
        let config = RunConfig::from_json("{}", Path::new("run.json")).unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document() {
        let config = RunConfig::from_json(
            r#"{
                "output_dir": "dump",
                "workers": 4,
                "duplicate_functions": "merge",
                "adapter": { "target_cpu": "x86", "function_bodies": false },
                "rules": { "blacklist": ["span"] }
            }"#,
            Path::new("run.json"),
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("dump"));
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.duplicate_functions, DuplicateFunctionPolicy::Merge);
        assert!(!config.adapter.function_bodies);
        assert_eq!(config.adapter.sentinel_define, "AST_DUMP_FIXED");
        assert!(config.rules.whitelist.is_empty());
    }

    #[test]
    fn test_unknown_setting_is_malformed() {
        let err = RunConfig::from_json(r#"{ "outdir": "x" }"#, Path::new("run.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RunConfig {
            workers: Some(0),
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { name: "workers", .. })
        ));

        let config = RunConfig {
            artifact_extension: ".obj".to_string(),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.adapter.sentinel_define = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { name: "sentinel_define", .. })
        ));

        let mut config = RunConfig::default();
        config
            .rules
            .whitelist
            .insert(NodeKind::Macro, vec!["body".to_string()]);
        assert!(matches!(config.validate(), Err(ConfigError::UnknownField { .. })));
    }

    #[test]
    fn test_preprocessed_output_dir() {
        let config = RunConfig {
            output_dir: PathBuf::from("build/ast"),
            preprocessed: Some(PreprocessedMode::default()),
            ..RunConfig::default()
        };
        assert_eq!(config.effective_output_dir(), PathBuf::from("build/ast_i"));
        assert_eq!(RunConfig::default().effective_output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "invocations": "batch.json", "source_dir": "src" }"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.invocations, dir.path().join("batch.json"));
        assert_eq!(config.source_dir, dir.path().join("src"));
        assert_eq!(config.output_dir, dir.path().join("out"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = RunConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
