// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the update/run command tree and global connection flags.

use clap::{Args, Parser, Subcommand};
use ecsdeploy::config::Settings;
use ecsdeploy::types::Image;

#[derive(Parser)]
#[command(name = "ecsdeploy")]
#[command(about = "Deploy ECS services, run one-shot tasks, and update scheduled tasks")]
#[command(version)]
pub struct Cli {
    /// Named credentials profile
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Region of the control plane
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Control-plane endpoint URL (http://host:port)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply the global flags over file and environment settings.
    pub fn overlay(&self, mut settings: Settings) -> Settings {
        if let Some(ref profile) = self.profile {
            settings.profile = Some(profile.clone());
        }
        if let Some(ref region) = self.region {
            settings.region = Some(region.clone());
        }
        if let Some(ref endpoint) = self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        settings
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Update a service, task definition, or scheduled task
    Update {
        #[command(subcommand)]
        target: UpdateCommands,
    },

    /// Run a one-shot task
    Run {
        #[command(subcommand)]
        target: RunCommands,
    },
}

#[derive(Subcommand)]
pub enum UpdateCommands {
    /// Deploy a new task definition revision to a service
    Service(ServiceArgs),

    /// Register a new task definition revision
    TaskDefinition(TaskDefinitionArgs),

    /// Point a scheduled task's targets at a task definition
    ScheduledTask(ScheduledTaskArgs),
}

#[derive(Subcommand)]
pub enum RunCommands {
    /// Run a task and wait for it to finish
    Task(TaskArgs),
}

#[derive(Args, Debug)]
pub struct ServiceArgs {
    /// Name of the cluster
    #[arg(short, long)]
    pub cluster: String,

    /// Name of the service
    #[arg(short = 'n', long)]
    pub service_name: String,

    /// Base task definition (defaults to the service's current one)
    #[arg(short = 'd', long)]
    pub base_task_definition: Option<String>,

    /// Image as repository or repository:tag
    #[arg(short, long)]
    pub image: Option<Image>,

    /// Seconds to wait for the new revision to go live
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Roll back to the current revision when the deploy fails
    #[arg(long)]
    pub enable_rollback: bool,

    /// Finish once one new task runs instead of waiting for the deployment to settle
    #[arg(long)]
    pub skip_check_deployments: bool,
}

#[derive(Args, Debug)]
pub struct TaskDefinitionArgs {
    /// Base task definition
    #[arg(short = 'd', long)]
    pub base_task_definition: String,

    /// Image as repository or repository:tag
    #[arg(short, long)]
    pub image: Option<Image>,
}

#[derive(Args, Debug)]
pub struct ScheduledTaskArgs {
    /// Name of the scheduled rule
    #[arg(short, long)]
    pub name: String,

    /// Task definition for the targets
    #[arg(short = 'd', long)]
    pub task_definition: String,

    /// Number of tasks each target starts
    #[arg(short, long, default_value_t = 1)]
    pub count: i64,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Name of the cluster
    #[arg(short, long)]
    pub cluster: String,

    /// Container receiving the command (defaults to the first container)
    #[arg(short = 'n', long)]
    pub container_name: Option<String>,

    /// Task definition to run
    #[arg(short = 'd', long)]
    pub task_definition: Option<String>,

    /// Image as repository or repository:tag
    #[arg(short, long)]
    pub image: Option<Image>,

    /// Command to run, split like a shell would
    #[arg(long, default_value = "")]
    pub command: String,

    /// Subnet ids, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub subnets: Vec<String>,

    /// Security group ids, comma separated
    #[arg(short = 'g', long, value_delimiter = ',')]
    pub security_groups: Vec<String>,

    /// Launch on FARGATE instead of EC2
    #[arg(short, long)]
    pub fargate: bool,

    /// Seconds to wait for the task to stop (0 waits forever)
    #[arg(short, long, default_value_t = 0)]
    pub timeout: u64,
}
