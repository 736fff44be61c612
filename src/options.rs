//! Deployment options with lazily computed defaults.
//!
//! `job_name` and `region` are filled in on first read when unset and the
//! result is cached on the instance for its lifetime.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::env::{self, EnvSource, ProcessEnv};
use crate::job_name;
use crate::locations::{self, LocationError};
use crate::process::{ProcessRunner, ProcessSpawner, SystemSpawner};
use crate::region::{RegionCandidate, RegionResolver, RegionSource, DEFAULT_CLI_TIMEOUT};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlexRsGoal {
    #[default]
    Unspecified,
    SpeedOptimized,
    CostOptimized,
}

pub struct DeploymentOptions {
    app_name: Option<String>,
    user_name: Option<String>,
    job_name: OnceLock<String>,
    region: OnceLock<RegionCandidate>,
    region_timeout: Duration,
    temp_location: Option<String>,
    gcp_temp_location: Option<String>,
    staging_location: Option<String>,
    flex_rs_goal: FlexRsGoal,
    clock: Arc<dyn Clock>,
    env: Arc<dyn EnvSource>,
    spawner: Arc<dyn ProcessSpawner>,
    rng_seed: Option<u64>,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentOptions {
    pub fn new() -> Self {
        Self {
            app_name: None,
            user_name: None,
            job_name: OnceLock::new(),
            region: OnceLock::new(),
            region_timeout: DEFAULT_CLI_TIMEOUT,
            temp_location: None,
            gcp_temp_location: None,
            staging_location: None,
            flex_rs_goal: FlexRsGoal::default(),
            clock: Arc::new(SystemClock),
            env: Arc::new(ProcessEnv),
            spawner: Arc::new(SystemSpawner),
            rng_seed: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Makes the job name suffix reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn set_app_name(&mut self, v: impl Into<String>) {
        self.app_name = Some(v.into());
    }

    pub fn set_user_name(&mut self, v: impl Into<String>) {
        self.user_name = Some(v.into());
    }

    pub fn set_job_name(&mut self, v: impl Into<String>) {
        self.job_name = OnceLock::from(v.into());
    }

    pub fn set_region(&mut self, v: impl Into<String>) {
        self.region = OnceLock::from(RegionCandidate {
            source: RegionSource::Override,
            value: v.into(),
        });
    }

    pub fn set_region_timeout(&mut self, timeout: Duration) {
        self.region_timeout = timeout;
    }

    pub fn set_temp_location(&mut self, v: impl Into<String>) {
        self.temp_location = Some(v.into());
    }

    pub fn set_gcp_temp_location(&mut self, v: impl Into<String>) {
        self.gcp_temp_location = Some(v.into());
    }

    pub fn set_staging_location(&mut self, v: impl Into<String>) {
        self.staging_location = Some(v.into());
    }

    pub fn set_flex_rs_goal(&mut self, goal: FlexRsGoal) {
        self.flex_rs_goal = goal;
    }

    /// Explicit value, else the running executable's file stem.
    pub fn app_name(&self) -> String {
        self.app_name.clone().unwrap_or_else(default_app_name)
    }

    /// Explicit value, else the account running this process.
    pub fn user_name(&self) -> String {
        self.user_name
            .clone()
            .or_else(|| env::user_name(self.env.as_ref()))
            .unwrap_or_default()
    }

    pub fn job_name(&self) -> &str {
        self.job_name.get_or_init(|| {
            let now = self.clock.now();
            let name = match self.rng_seed {
                Some(seed) => job_name::generate(
                    &self.app_name(),
                    &self.user_name(),
                    now,
                    &mut StdRng::seed_from_u64(seed),
                ),
                None => job_name::generate(
                    &self.app_name(),
                    &self.user_name(),
                    now,
                    &mut rand::rng(),
                ),
            };
            debug!(job_name = %name, "generated job name");
            name
        })
    }

    pub fn region(&self) -> &str {
        &self.region_candidate().value
    }

    pub fn region_candidate(&self) -> &RegionCandidate {
        self.region.get_or_init(|| {
            let runner = ProcessRunner::new(self.spawner.clone());
            RegionResolver::new(self.env.clone(), runner)
                .resolve_candidate(None, self.region_timeout)
        })
    }

    pub fn temp_location(&self) -> Option<&str> {
        self.temp_location.as_deref()
    }

    pub fn gcp_temp_location(&self) -> Result<String, LocationError> {
        locations::gcp_temp_location(
            self.gcp_temp_location.as_deref(),
            self.temp_location.as_deref(),
        )
    }

    pub fn staging_location(&self) -> Result<String, LocationError> {
        locations::staging_location(self.staging_location.as_deref(), self.gcp_temp_location())
    }

    pub fn flex_rs_goal(&self) -> FlexRsGoal {
        self.flex_rs_goal
    }

    /// Resolves every option, forcing the lazy defaults.
    pub fn snapshot(&self) -> OptionsSnapshot {
        let region = self.region_candidate();
        OptionsSnapshot {
            app_name: self.app_name(),
            user_name: self.user_name(),
            job_name: self.job_name().to_string(),
            region: region.value.clone(),
            region_source: region.source,
            temp_location: self.temp_location.clone(),
            gcp_temp_location: self.gcp_temp_location().ok(),
            staging_location: self.staging_location().ok(),
            flex_rs_goal: self.flex_rs_goal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionsSnapshot {
    pub app_name: String,
    pub user_name: String,
    pub job_name: String,
    pub region: String,
    pub region_source: RegionSource,
    pub temp_location: Option<String>,
    pub gcp_temp_location: Option<String>,
    pub staging_location: Option<String>,
    pub flex_rs_goal: FlexRsGoal,
}

fn default_app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::clock::FixedClock;
    use crate::env::MapEnv;
    use crate::job_name::segments;
    use crate::process::testing::{FakeChild, FakeSpawner};
    use crate::region::REGION_ENV_VAR;

    fn options(env: MapEnv, spawner: Arc<FakeSpawner>) -> DeploymentOptions {
        let at: DateTime<Utc> = "2014-12-08T19:07:06.698Z".parse().unwrap();
        DeploymentOptions::new()
            .with_clock(Arc::new(FixedClock(at)))
            .with_env(Arc::new(env))
            .with_spawner(spawner)
    }

    #[test]
    fn explicit_job_name_is_returned() {
        let mut o = options(MapEnv::new(), Arc::new(FakeSpawner::missing()));
        o.set_job_name("TestJobName");
        assert_eq!(o.job_name(), "TestJobName");
    }

    #[test]
    fn job_name_without_user() {
        let mut o = options(MapEnv::new(), Arc::new(FakeSpawner::missing()));
        o.set_app_name("TestApplication");
        let name = o.job_name().to_string();
        let parts = segments(&name);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "testapplication");
        assert_eq!(parts[1], "");
        assert_eq!(parts[2], "1208190706");
        assert!(name.len() <= 40);
    }

    #[test]
    fn job_name_uses_ambient_user() {
        let mut o = options(
            MapEnv::new().with("USER", "abcde"),
            Arc::new(FakeSpawner::missing()),
        );
        o.set_app_name("1234567890");
        let name = o.job_name().to_string();
        let parts = segments(&name);
        assert_eq!(parts[0], "a234567890");
        assert_eq!(parts[1], "abcde");
    }

    #[test]
    fn job_name_is_cached() {
        let mut o = options(MapEnv::new(), Arc::new(FakeSpawner::missing()));
        o.set_app_name("app");
        let first = o.job_name().to_string();
        assert_eq!(o.job_name(), first);
    }

    #[test]
    fn seeded_job_names_repeat() {
        let make = || {
            let mut o = options(MapEnv::new(), Arc::new(FakeSpawner::missing())).with_rng_seed(9);
            o.set_app_name("app");
            o.job_name().to_string()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn region_from_environment() {
        let spawner = Arc::new(FakeSpawner::missing());
        let o = options(MapEnv::new().with(REGION_ENV_VAR, "us-west1"), spawner.clone());
        assert_eq!(o.region(), "us-west1");
        assert_eq!(spawner.call_count(), 0);
    }

    #[test]
    fn region_from_gcloud_is_cached() {
        let spawner = Arc::new(FakeSpawner::with(FakeChild::exits(0, b"us-west1\n")));
        let o = options(MapEnv::new(), spawner.clone());
        assert_eq!(o.region(), "us-west1");
        assert_eq!(o.region(), "us-west1");
        assert_eq!(spawner.call_count(), 1);
    }

    #[test]
    fn region_unset_when_gcloud_missing() {
        let o = options(MapEnv::new(), Arc::new(FakeSpawner::missing()));
        assert_eq!(o.region(), "");
        assert_eq!(o.region_candidate().source, RegionSource::Unset);
    }

    #[test]
    fn explicit_region_skips_resolution() {
        let spawner = Arc::new(FakeSpawner::missing());
        let mut o = options(MapEnv::new().with(REGION_ENV_VAR, "us-west1"), spawner.clone());
        o.set_region("asia-east1");
        assert_eq!(o.region(), "asia-east1");
        assert_eq!(spawner.call_count(), 0);
    }

    #[test]
    fn staging_defaults_to_temp_location() {
        let mut o = options(MapEnv::new(), Arc::new(FakeSpawner::missing()));
        o.set_temp_location("gs://temp_location/");
        assert_eq!(o.gcp_temp_location().unwrap(), "gs://temp_location/");
        assert_eq!(o.staging_location().unwrap(), "gs://temp_location/staging/");
    }

    #[test]
    fn flex_rs_goal_defaults_to_unspecified() {
        let mut o = options(MapEnv::new(), Arc::new(FakeSpawner::missing()));
        assert_eq!(o.flex_rs_goal(), FlexRsGoal::Unspecified);
        o.set_flex_rs_goal(FlexRsGoal::CostOptimized);
        assert_eq!(o.flex_rs_goal(), FlexRsGoal::CostOptimized);
    }

    #[test]
    fn snapshot_resolves_everything() {
        let mut o = options(
            MapEnv::new().with(REGION_ENV_VAR, "us-west1").with("USER", "me"),
            Arc::new(FakeSpawner::missing()),
        );
        o.set_app_name("app");
        let s = o.snapshot();
        assert_eq!(s.region, "us-west1");
        assert_eq!(s.region_source, RegionSource::Environment);
        assert_eq!(s.user_name, "me");
        assert_eq!(s.job_name, o.job_name());
        assert_eq!(s.staging_location, None);
    }
}
