use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use flow_opts::config::FileConfig;
use flow_opts::options::FlexRsGoal;

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "flowopts",
    version,
    about = "Resolve job name and region defaults for pipeline deployments"
)]
struct Cli {
    /// Config file to read (default: $FLOWOPTS_HOME/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log more (-v info, -vv debug). FLOWOPTS_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the job name, generating one if it is not set
    JobName(JobNameArgs),
    /// Print the deployment region (empty if none can be found)
    Region(RegionArgs),
    /// Print every option with its defaults filled in
    Show(ShowArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct OptionArgs {
    /// Application name used as the first job name segment
    #[arg(long)]
    pub(crate) app_name: Option<String>,
    /// User name used as the second job name segment (default: $USER)
    #[arg(long)]
    pub(crate) user_name: Option<String>,
    /// Use this job name instead of generating one
    #[arg(long)]
    pub(crate) job_name: Option<String>,
    /// Use this region instead of probing the environment and gcloud
    #[arg(long)]
    pub(crate) region: Option<String>,
    /// Seconds to wait for `gcloud config get-value compute/region`
    #[arg(long)]
    pub(crate) region_timeout_secs: Option<u64>,
    #[arg(long)]
    pub(crate) temp_location: Option<String>,
    #[arg(long)]
    pub(crate) gcp_temp_location: Option<String>,
    #[arg(long)]
    pub(crate) staging_location: Option<String>,
    #[arg(long, value_enum)]
    pub(crate) flex_rs_goal: Option<FlexRsGoal>,
}

impl OptionArgs {
    pub(crate) fn into_config(self) -> FileConfig {
        FileConfig {
            app_name: self.app_name,
            user_name: self.user_name,
            job_name: self.job_name,
            region: self.region,
            region_timeout_secs: self.region_timeout_secs,
            temp_location: self.temp_location,
            gcp_temp_location: self.gcp_temp_location,
            staging_location: self.staging_location,
            flex_rs_goal: self.flex_rs_goal,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct JobNameArgs {
    #[command(flatten)]
    pub(crate) options: OptionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct RegionArgs {
    #[command(flatten)]
    pub(crate) options: OptionArgs,
    /// Also print where the region came from
    #[arg(long)]
    pub(crate) with_source: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Args, Debug)]
pub(crate) struct ShowArgs {
    #[command(flatten)]
    pub(crate) options: OptionArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub(crate) format: OutputFormat,
}

pub(crate) fn run() -> Result<()> {
    let cli = Cli::parse();
    flow_opts::logging::init(cli.verbose);
    let config = cli.config;
    match cli.command {
        Commands::JobName(args) => commands::options::cmd_job_name(config, args),
        Commands::Region(args) => commands::options::cmd_region(config, args),
        Commands::Show(args) => commands::options::cmd_show(config, args),
    }
}
