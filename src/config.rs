use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::options::{DeploymentOptions, FlexRsGoal};

pub const CONFIG_FILE: &str = "config.toml";

/// Values read from `config.toml`. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub app_name: Option<String>,
    pub user_name: Option<String>,
    pub job_name: Option<String>,
    pub region: Option<String>,
    pub region_timeout_secs: Option<u64>,
    pub temp_location: Option<String>,
    pub gcp_temp_location: Option<String>,
    pub staging_location: Option<String>,
    pub flex_rs_goal: Option<FlexRsGoal>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Loads the default config file; a missing file is an empty config.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `other` wins wherever it has a value.
    pub fn merge(self, other: FileConfig) -> FileConfig {
        FileConfig {
            app_name: other.app_name.or(self.app_name),
            user_name: other.user_name.or(self.user_name),
            job_name: other.job_name.or(self.job_name),
            region: other.region.or(self.region),
            region_timeout_secs: other.region_timeout_secs.or(self.region_timeout_secs),
            temp_location: other.temp_location.or(self.temp_location),
            gcp_temp_location: other.gcp_temp_location.or(self.gcp_temp_location),
            staging_location: other.staging_location.or(self.staging_location),
            flex_rs_goal: other.flex_rs_goal.or(self.flex_rs_goal),
        }
    }

    pub fn apply(self, options: &mut DeploymentOptions) {
        if let Some(v) = self.app_name {
            options.set_app_name(v);
        }
        if let Some(v) = self.user_name {
            options.set_user_name(v);
        }
        if let Some(v) = self.job_name {
            options.set_job_name(v);
        }
        if let Some(v) = self.region {
            options.set_region(v);
        }
        if let Some(secs) = self.region_timeout_secs {
            options.set_region_timeout(Duration::from_secs(secs));
        }
        if let Some(v) = self.temp_location {
            options.set_temp_location(v);
        }
        if let Some(v) = self.gcp_temp_location {
            options.set_gcp_temp_location(v);
        }
        if let Some(v) = self.staging_location {
            options.set_staging_location(v);
        }
        if let Some(goal) = self.flex_rs_goal {
            options.set_flex_rs_goal(goal);
        }
    }
}

/// `$FLOWOPTS_HOME`, else `$HOME/.flowopts`.
pub fn flowopts_home_dir() -> Option<PathBuf> {
    if let Some(v) = std::env::var_os("FLOWOPTS_HOME") {
        return Some(PathBuf::from(v));
    }
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".flowopts"))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(flowopts_home_dir()?.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_fields() {
        let cfg = FileConfig::parse(
            r#"
app_name = "wordcount"
region = "us-west1"
region_timeout_secs = 5
temp_location = "gs://bucket/tmp"
flex_rs_goal = "COST_OPTIMIZED"
"#,
        )
        .unwrap();
        assert_eq!(cfg.app_name.as_deref(), Some("wordcount"));
        assert_eq!(cfg.region.as_deref(), Some("us-west1"));
        assert_eq!(cfg.region_timeout_secs, Some(5));
        assert_eq!(cfg.flex_rs_goal, Some(FlexRsGoal::CostOptimized));
        assert_eq!(cfg.job_name, None);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(FileConfig::parse("regoin = \"x\"").is_err());
    }

    #[test]
    fn merge_prefers_other() {
        let base = FileConfig {
            app_name: Some("a".into()),
            region: Some("r1".into()),
            ..Default::default()
        };
        let top = FileConfig {
            region: Some("r2".into()),
            ..Default::default()
        };
        let merged = base.merge(top);
        assert_eq!(merged.app_name.as_deref(), Some("a"));
        assert_eq!(merged.region.as_deref(), Some("r2"));
    }

    #[test]
    fn load_reads_file() {
        let td = tempfile::TempDir::new().unwrap();
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(&path, "job_name = \"fixed\"\n").unwrap();
        let cfg = FileConfig::load(&path).unwrap();
        assert_eq!(cfg.job_name.as_deref(), Some("fixed"));
    }

    #[test]
    fn load_missing_file_fails_with_path() {
        let err = FileConfig::load(Path::new("/nonexistent/flowopts.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/flowopts.toml"));
    }
}
