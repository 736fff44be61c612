use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::env::EnvSource;
use crate::process::{ProcessRunner, RunError};

/// Environment variable gcloud itself uses for the default region.
pub const REGION_ENV_VAR: &str = "CLOUDSDK_COMPUTE_REGION";

pub const GCLOUD_PROGRAM: &str = "gcloud";
pub const GCLOUD_REGION_ARGS: &[&str] = &["config", "get-value", "compute/region"];

pub const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a resolved region came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSource {
    Override,
    Environment,
    Cli,
    Unset,
}

impl RegionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionSource::Override => "override",
            RegionSource::Environment => "environment",
            RegionSource::Cli => "cli",
            RegionSource::Unset => "unset",
        }
    }
}

impl fmt::Display for RegionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCandidate {
    pub source: RegionSource,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("gcloud exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("unrecognized region output: {0:?}")]
    Parse(String),
}

/// Turns gcloud's stdout into a region. Empty output means no region.
pub fn parse_region(stdout: &str) -> Result<String, ProbeError> {
    let trimmed = stdout.trim();
    if trimmed.chars().any(char::is_whitespace) {
        return Err(ProbeError::Parse(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Resolves the deployment region: explicit value, then the environment,
/// then a bounded `gcloud` probe. Never fails; the last resort is `""`.
#[derive(Clone)]
pub struct RegionResolver {
    env: Arc<dyn EnvSource>,
    runner: ProcessRunner,
}

impl RegionResolver {
    pub fn new(env: Arc<dyn EnvSource>, runner: ProcessRunner) -> Self {
        Self { env, runner }
    }

    pub fn resolve(&self, explicit: Option<&str>, timeout: Duration) -> String {
        self.resolve_candidate(explicit, timeout).value
    }

    pub fn resolve_candidate(&self, explicit: Option<&str>, timeout: Duration) -> RegionCandidate {
        if let Some(v) = explicit {
            return RegionCandidate {
                source: RegionSource::Override,
                value: v.to_string(),
            };
        }
        if let Some(v) = self.region_from_environment() {
            debug!(region = %v, "using region from {REGION_ENV_VAR}");
            return RegionCandidate {
                source: RegionSource::Environment,
                value: v,
            };
        }
        match self.region_from_cli(timeout) {
            Ok(v) if !v.is_empty() => {
                info!(region = %v, "Using default region {v} from gcloud CLI");
                RegionCandidate {
                    source: RegionSource::Cli,
                    value: v,
                }
            }
            Ok(_) => {
                debug!("gcloud reported no default region");
                unset()
            }
            Err(e) => {
                debug!(error = %e, "could not read region from gcloud");
                unset()
            }
        }
    }

    pub fn region_from_environment(&self) -> Option<String> {
        self.env.var(REGION_ENV_VAR)
    }

    pub fn region_from_cli(&self, timeout: Duration) -> Result<String, ProbeError> {
        let out = self
            .runner
            .run(GCLOUD_PROGRAM, GCLOUD_REGION_ARGS, timeout)?;
        if !out.success() {
            return Err(ProbeError::NonZeroExit {
                code: out.exit_code,
                stderr: out.stderr_lossy().trim().to_string(),
            });
        }
        parse_region(&out.stdout_lossy())
    }
}

fn unset() -> RegionCandidate {
    RegionCandidate {
        source: RegionSource::Unset,
        value: String::new(),
    }
}
