//! Configuration for the load generator.
//!
//! Configuration is loaded once at startup from the following sources, with the following precedence
//! (highest to lowest):
//!
//! 1. Environment variables (prefixed with `REGBENCH__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `REGBENCH__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `REGBENCH__REMOTE=http://localhost:5004/shell-descriptors` sets the benchmark target
//! - `REGBENCH__WEIGHTS__READ=0.5` sets the relative weight of reads
//! - `REGBENCH__READINESS__TIMEOUT=30s` bounds the readiness probe
//!
//! # YAML Configuration File
//!
//! ```yaml
//! remote: http://localhost:5004/shell-descriptors
//! iterations: 10000
//! seed: 42
//! prewarm: 1000
//!
//! weights:
//!   create: 0.4
//!   read: 0.2
//!   list: 0.2
//!   search_paginated: 0.2
//!
//! orchestration:
//!   up: podman compose -f docker_compose/docker_compose.yml up -d --build
//!   down: podman compose -f docker_compose/docker_compose.yml down -v
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::orchestration::Orchestration;
use crate::readiness::Readiness;
use crate::template::{DEFAULT_SUB_RESOURCES_FIELD, IdScheme};
use crate::workload::Weights;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "REGBENCH__";

/// Body template configuration.
///
/// Used in: [`Config::template`]
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Template {
    /// Path to a JSON file with the descriptor to submit on create.
    ///
    /// # Default
    ///
    /// `None`, which uses a built-in shell descriptor with one submodel descriptor.
    pub path: Option<PathBuf>,

    /// Name of the array whose entries receive fresh identifiers on every create.
    ///
    /// # Default
    ///
    /// `submodelDescriptors`
    pub sub_resources_field: String,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            path: None,
            sub_resources_field: DEFAULT_SUB_RESOURCES_FIELD.into(),
        }
    }
}

/// Main configuration struct for the load generator.
///
/// All fields are fixed for the duration of a run.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// URL of the descriptor collection under test.
    ///
    /// Creates are posted here; reads append the encoded identifier as a path segment.
    ///
    /// # Environment Variable
    ///
    /// `REGBENCH__REMOTE`
    pub remote: String,

    /// Total number of operations.
    ///
    /// # Default
    ///
    /// `10000`
    pub iterations: u64,

    /// Seed of the random stream that selects operations.
    ///
    /// Two runs with the same seed, weights, iterations and prewarm issue the same operations, as long
    /// as the registry behaves the same.
    pub seed: u64,

    /// Number of leading operations that are forced to be creates.
    ///
    /// Clamped to `iterations`. Set to `0` to disable.
    ///
    /// # Default
    ///
    /// `1000`
    pub prewarm: u64,

    /// Relative weights of the operations after the prewarm phase.
    pub weights: Weights,

    /// Page size of paginated searches.
    ///
    /// # Default
    ///
    /// `100`
    pub page_limit: u32,

    /// Whether records include the request URL, request body and response body.
    ///
    /// This inflates the result file considerably and should be off for actual measurements.
    ///
    /// # Default
    ///
    /// `false`
    pub log_request_details: bool,

    /// Path of the JSON file that receives the records.
    ///
    /// # Default
    ///
    /// `runtime_results.json`
    pub output: PathBuf,

    /// Body template for creates.
    pub template: Template,

    /// Identifier generation for new descriptors.
    pub ids: IdScheme,

    /// Timeout of every request issued during the run.
    ///
    /// A timed out request is recorded as a failed operation.
    ///
    /// # Default
    ///
    /// `30s`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Number of iterations between two progress log lines.
    ///
    /// # Default
    ///
    /// `100`
    pub progress_interval: u64,

    /// Readiness probe run before the first operation.
    pub readiness: Readiness,

    /// Commands starting and stopping the target.
    pub orchestration: Orchestration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: "http://localhost:5004/shell-descriptors".into(),
            iterations: 10_000,
            seed: 42,
            prewarm: 1_000,
            weights: Weights::default(),
            page_limit: 100,
            log_request_details: false,
            output: PathBuf::from("runtime_results.json"),
            template: Template::default(),
            ids: IdScheme::default(),
            request_timeout: Duration::from_secs(30),
            progress_interval: 100,
            readiness: Readiness::default(),
            orchestration: Orchestration::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided in `path`)
    /// 3. Environment variables (prefixed with `REGBENCH__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML configuration file cannot be read or parsed, or if the
    /// environment variables contain invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// The URL probed for readiness.
    pub fn readiness_url(&self) -> &str {
        self.readiness.url.as_deref().unwrap_or(&self.remote)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::orchestration::Orchestration;
    use crate::template::IdMode;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.iterations, 10_000);
            assert_eq!(config.prewarm, 1_000);
            assert_eq!(config.weights, Weights::default());
            assert_eq!(config.request_timeout, Duration::from_secs(30));
            assert_eq!(config.readiness_url(), config.remote);
            assert!(config.template.path.is_none());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("REGBENCH__REMOTE", "http://registry:8080/shell-descriptors");
            jail.set_env("REGBENCH__ITERATIONS", "500");
            jail.set_env("REGBENCH__WEIGHTS__READ", "0.7");
            jail.set_env("REGBENCH__READINESS__URL", "http://registry:8080/health");
            jail.set_env("REGBENCH__READINESS__TIMEOUT", "30s");
            jail.set_env("REGBENCH__IDS__MODE", "seeded");

            let config = Config::load(None).unwrap();

            assert_eq!(config.remote, "http://registry:8080/shell-descriptors");
            assert_eq!(config.iterations, 500);
            assert_eq!(config.weights.read, 0.7);
            assert_eq!(config.weights.create, 0.4);
            assert_eq!(config.readiness_url(), "http://registry:8080/health");
            assert_eq!(config.readiness.timeout, Duration::from_secs(30));
            assert_eq!(config.ids.mode, IdMode::Seeded);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
                iterations: 200
                seed: 7
                prewarm: 20
                log_request_details: true
                output: results/run.json
                request_timeout: 2m
                weights:
                    create: 1
                    read: 1
                    list: 0
                    search_paginated: 0
                template:
                    path: bodies/complex.json
                orchestration:
                    up: podman compose up -d
                    down: podman compose down -v
                "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.iterations, 200);
            assert_eq!(config.seed, 7);
            assert_eq!(config.prewarm, 20);
            assert!(config.log_request_details);
            assert_eq!(config.output, Path::new("results/run.json"));
            assert_eq!(config.request_timeout, Duration::from_secs(120));
            assert_eq!(config.weights.list, 0.0);
            assert_eq!(
                config.template.path.as_deref(),
                Some(Path::new("bodies/complex.json"))
            );
            assert_eq!(config.template.sub_resources_field, "submodelDescriptors");
            assert_eq!(
                config.orchestration,
                Orchestration {
                    up: Some("podman compose up -d".into()),
                    down: Some("podman compose down -v".into()),
                }
            );

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(b"iterations: 200\nseed: 7\n").unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("REGBENCH__SEED", "9");

            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.iterations, 200);
            // Env should overwrite the yaml config
            assert_eq!(config.seed, 9);

            Ok(())
        });
    }
}
