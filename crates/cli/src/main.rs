//! nami
//!
//! An operator CLI for container services: rolling deployments with
//! convergence tracking, fleet reports and autoscaling registration.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::autoscaling::{self, AutoscaleArgs};
use commands::deploy::{self, DeployArgs, PinArgs};
use commands::{revisions, services, Session};
use nami_lib::{
    abort_pair, init_tracing, AwsControlPlane, AwsOptions, ControlPlane, LogFormat, OperationLogger,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// nami CLI
#[derive(Parser)]
#[command(name = "nami")]
#[command(author, version, about = "Deploy, inspect and scale container services", long_about = None)]
pub struct Cli {
    /// Region to operate in (overrides config and the credential chain)
    #[arg(long, global = true, env = "NAMI_REGION")]
    pub region: Option<String>,

    /// Named credential profile
    #[arg(long, global = true, env = "NAMI_PROFILE")]
    pub profile: Option<String>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Roll a service onto a new image
    Deploy {
        /// Cluster the service runs in
        #[arg(long, short, env = "NAMI_CLUSTER")]
        cluster: Option<String>,

        /// Service to deploy
        #[arg(long, short, env = "NAMI_SERVICE")]
        service: String,

        /// Container whose image changes (defaults to the first container)
        #[arg(long, env = "NAMI_CONTAINER")]
        container_name: Option<String>,

        /// New image reference
        #[arg(long, short, env = "NAMI_IMAGE")]
        image: String,

        /// Block until the service converges on the new revision
        #[arg(long)]
        wait: bool,

        /// Convergence deadline in seconds (0 uses the default)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Change service settings
    #[command(subcommand)]
    Update(UpdateCommands),

    /// Show fleet reports
    #[command(subcommand)]
    Get(GetCommands),

    /// Configure services
    #[command(subcommand)]
    Set(SetCommands),
}

#[derive(Subcommand)]
pub enum UpdateCommands {
    /// Point a service at an existing revision of its task definition family
    Revision {
        /// Service name
        service: String,

        /// Revision number within the service's family
        revision: u32,

        /// Cluster the service runs in
        #[arg(long, short)]
        cluster: Option<String>,

        /// Force a new deployment even if the revision is unchanged
        #[arg(long)]
        force: bool,

        /// Block until the service converges on the revision
        #[arg(long)]
        wait: bool,

        /// Convergence deadline in seconds (0 uses the default)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Services with counts and trailing-day utilization
    Services {
        /// Only show this service
        service: Option<String>,

        /// Clusters to report on (repeatable; defaults to every cluster)
        #[arg(long, short)]
        cluster: Vec<String>,
    },

    /// Scaling bounds and policies of every service in a cluster
    Autoscaling {
        /// Cluster to report on
        #[arg(long, short)]
        cluster: Option<String>,
    },

    /// Active revisions of a task definition family
    Revisions {
        /// Task definition family
        family: String,
    },
}

#[derive(Subcommand)]
pub enum SetCommands {
    /// Register capacity bounds and target-tracking policies
    Autoscale {
        /// Service name
        service: String,

        /// Cluster the service runs in
        #[arg(long, short)]
        cluster: Option<String>,

        /// Minimum task count
        #[arg(long)]
        min: i32,

        /// Maximum task count
        #[arg(long)]
        max: i32,

        /// Target average CPU utilization percent (0 skips the policy)
        #[arg(long, default_value_t = 0)]
        cpu: u32,

        /// Target average memory utilization percent (0 skips the policy)
        #[arg(long, default_value_t = 0)]
        mem: u32,

        /// Target requests per task behind the load balancer (0 skips the policy)
        #[arg(long, default_value_t = 0)]
        request: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format.into());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    let options = AwsOptions {
        region: cli.region.or_else(|| config.region.clone()),
        profile: cli.profile.or_else(|| config.profile.clone()),
    };
    let region = options.region.clone().unwrap_or_else(|| "default".to_string());
    let client: Arc<dyn ControlPlane> = Arc::new(AwsControlPlane::connect(options).await);

    let (abort_handle, abort) = abort_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, aborting");
            abort_handle.abort();
        }
    });

    let session = Session {
        client,
        abort,
        format: cli.format.or(config.format).unwrap_or_default(),
        config,
        logger: OperationLogger::new(region),
    };

    match cli.command {
        Commands::Deploy {
            cluster,
            service,
            container_name,
            image,
            wait,
            timeout,
        } => {
            deploy::deploy(
                &session,
                DeployArgs {
                    cluster,
                    service,
                    container_name,
                    image,
                    wait,
                    timeout,
                },
            )
            .await?;
        }
        Commands::Update(UpdateCommands::Revision {
            service,
            revision,
            cluster,
            force,
            wait,
            timeout,
        }) => {
            deploy::update_revision(
                &session,
                PinArgs {
                    cluster,
                    service,
                    revision,
                    force,
                    wait,
                    timeout,
                },
            )
            .await?;
        }
        Commands::Get(get_cmd) => match get_cmd {
            GetCommands::Services { service, cluster } => {
                services::get_services(&session, service, cluster).await?;
            }
            GetCommands::Autoscaling { cluster } => {
                autoscaling::get_autoscaling(&session, cluster).await?;
            }
            GetCommands::Revisions { family } => {
                revisions::get_revisions(&session, &family).await?;
            }
        },
        Commands::Set(SetCommands::Autoscale {
            service,
            cluster,
            min,
            max,
            cpu,
            mem,
            request,
        }) => {
            autoscaling::set_autoscale(
                &session,
                AutoscaleArgs {
                    cluster,
                    service,
                    min,
                    max,
                    cpu,
                    memory: mem,
                    requests: request,
                },
            )
            .await?;
        }
    }

    Ok(())
}
