//! Registry configuration.
//!
//! Configuration is read from JSON. Every field is optional:
//!
//! ```json
//! {
//!     "solver": { "maxIterations": 500, "tolerance": 0.001 },
//!     "endPolicy": "cancel"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::solver::SolverSettings;

/// How ending a job treats a solver that is still iterating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndPolicy {
    /// Ask the solver to stop after its current iteration, then wait for it.
    #[default]
    Cancel,
    /// Wait for the solver to finish on its own.
    Wait,
}

/// Settings of a [`JobRegistry`](crate::JobRegistry).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Parameters of the optimizer run by every job.
    pub solver: SolverSettings,
    /// Behaviour of `end` on running jobs.
    pub end_policy: EndPolicy,
}

impl RegistryConfig {
    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not valid configuration.
    ///
    /// # Examples
    /// ```
    /// use topoptx::{EndPolicy, RegistryConfig};
    ///
    /// let config = RegistryConfig::from_json(r#"{ "endPolicy": "wait" }"#).expect("valid");
    /// assert_eq!(config.end_policy, EndPolicy::Wait);
    /// assert_eq!(config.solver.max_iterations, 2000);
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its content is not valid configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = RegistryConfig::from_json("{}").expect("valid");
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.end_policy, EndPolicy::Cancel);
    }

    #[test]
    fn nested_solver_settings_are_merged_with_defaults() {
        let config = RegistryConfig::from_json(r#"{ "solver": { "tolerance": 0.01 } }"#)
            .expect("valid");
        assert_eq!(config.solver.tolerance, 0.01);
        assert_eq!(config.solver.max_iterations, 2000);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = RegistryConfig::from_json("{ solver").expect_err("rejected");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let error = RegistryConfig::from_path("/nonexistent/topoptx.json").expect_err("rejected");
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
