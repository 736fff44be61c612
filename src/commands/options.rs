use std::path::PathBuf;

use anyhow::{Context, Result};

use flow_opts::config::FileConfig;
use flow_opts::options::DeploymentOptions;

use crate::cli::{JobNameArgs, OptionArgs, OutputFormat, RegionArgs, ShowArgs};

pub(crate) fn cmd_job_name(config: Option<PathBuf>, args: JobNameArgs) -> Result<()> {
    let options = build_options(config, args.options)?;
    println!("{}", options.job_name());
    Ok(())
}

pub(crate) fn cmd_region(config: Option<PathBuf>, args: RegionArgs) -> Result<()> {
    let options = build_options(config, args.options)?;
    let candidate = options.region_candidate();
    if candidate.value.is_empty() {
        eprintln!("Warning: no region configured; set --region or CLOUDSDK_COMPUTE_REGION");
    }
    if args.with_source {
        println!("{}\t{}", candidate.value, candidate.source);
    } else {
        println!("{}", candidate.value);
    }
    Ok(())
}

pub(crate) fn cmd_show(config: Option<PathBuf>, args: ShowArgs) -> Result<()> {
    let options = build_options(config, args.options)?;
    if let Err(e) = options.staging_location() {
        eprintln!("Warning: {e}");
    }
    let snapshot = options.snapshot();
    let text = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&snapshot)? + "\n",
        OutputFormat::Yaml => {
            serde_yaml::to_string(&snapshot).context("Failed to render options as YAML")?
        }
    };
    print!("{text}");
    Ok(())
}

fn build_options(config: Option<PathBuf>, args: OptionArgs) -> Result<DeploymentOptions> {
    let file = match config {
        Some(path) => FileConfig::load(&path)?,
        None => FileConfig::load_default()?,
    };
    let mut options = DeploymentOptions::new();
    file.merge(args.into_config()).apply(&mut options);
    Ok(options)
}
