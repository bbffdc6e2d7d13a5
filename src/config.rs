//! `dsl-typer.toml` configuration
//!
//! ```toml
//! [paths]
//! dsl_file = "arc-dsl/dsl.py"
//! solvers_file = "arc-dsl/solvers.py"
//! mapping_output = "arc-dsl/dsl_type_mapping.json"
//!
//! [inference]
//! grid_type = "Grid"
//! output_always_grid = false
//! callable_detection = "call-sites"
//!
//! [constants]
//! HUNDRED = "Integer"
//! ```
//!
//! Every key is optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::constants::ConstantTypes;
use crate::error::{read_source, Result, TyperError};
use crate::infer::{CallableDetection, InferenceOptions};
use crate::signatures::DEFAULT_CALLABLE_MARKER;

/// Looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = "dsl-typer.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TyperConfig {
    pub paths: PathsConfig,
    pub inference: InferenceConfig,
    /// Extra or corrected constant labels
    pub constants: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub dsl_file: PathBuf,
    pub solvers_file: PathBuf,
    pub mapping_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            dsl_file: PathBuf::from("arc-dsl/dsl.py"),
            solvers_file: PathBuf::from("arc-dsl/solvers.py"),
            mapping_output: PathBuf::from("arc-dsl/dsl_type_mapping.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub input_param: Option<String>,
    pub output_name: Option<String>,
    pub grid_type: Option<String>,
    pub output_always_grid: Option<bool>,
    pub callable_marker: Option<String>,
    pub callable_detection: Option<CallableDetection>,
}

impl TyperConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TyperError::Config(e.to_string()))
    }

    /// Load `path` when given (it must exist), else `dsl-typer.toml` from
    /// the working directory when present, else the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = Self::parse(&read_source(path)?)?;
                debug!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            None if Path::new(CONFIG_FILE_NAME).exists() => {
                Self::load(Some(Path::new(CONFIG_FILE_NAME)))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn inference_options(&self) -> InferenceOptions {
        let defaults = InferenceOptions::default();
        let section = &self.inference;
        InferenceOptions {
            input_param: section.input_param.clone().unwrap_or(defaults.input_param),
            output_name: section.output_name.clone().unwrap_or(defaults.output_name),
            grid_type: section.grid_type.clone().unwrap_or(defaults.grid_type),
            output_always_grid: section
                .output_always_grid
                .unwrap_or(defaults.output_always_grid),
            callable_detection: section
                .callable_detection
                .unwrap_or(defaults.callable_detection),
        }
    }

    pub fn constant_types(&self) -> ConstantTypes {
        ConstantTypes::default().with_overrides(self.constants.clone())
    }

    pub fn callable_marker(&self) -> &str {
        self.inference
            .callable_marker
            .as_deref()
            .unwrap_or(DEFAULT_CALLABLE_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TyperConfig::parse("").unwrap();
        assert_eq!(config.paths.dsl_file, PathBuf::from("arc-dsl/dsl.py"));
        assert_eq!(config.inference_options(), InferenceOptions::default());
        assert_eq!(config.callable_marker(), "Callable");
        assert_eq!(config.constant_types(), ConstantTypes::default());
    }

    #[test]
    fn test_full_config() {
        let config = TyperConfig::parse(
            r#"
[paths]
dsl_file = "lib/dsl.py"

[inference]
grid_type = "Board"
output_always_grid = true
callable_detection = "call-sites"
callable_marker = "Fn"

[constants]
HUNDRED = "Integer"
"#,
        )
        .unwrap();
        assert_eq!(config.paths.dsl_file, PathBuf::from("lib/dsl.py"));
        assert_eq!(config.paths.solvers_file, PathBuf::from("arc-dsl/solvers.py"));
        let options = config.inference_options();
        assert_eq!(options.grid_type, "Board");
        assert_eq!(options.output_name, "O");
        assert!(options.output_always_grid);
        assert_eq!(options.callable_detection, CallableDetection::CallSites);
        assert_eq!(config.callable_marker(), "Fn");
        assert_eq!(config.constant_types().get("HUNDRED"), Some("Integer"));
        assert_eq!(config.constant_types().get("T"), Some("Boolean"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = TyperConfig::parse("[inference]\ngrid = \"Grid\"\n").unwrap_err();
        assert!(matches!(err, TyperError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = TyperConfig::load(Some(Path::new("/nonexistent/dsl-typer.toml"))).unwrap_err();
        assert!(matches!(err, TyperError::SourceNotFound { .. }));
    }
}
