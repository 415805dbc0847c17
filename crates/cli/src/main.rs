//! tenantgate CLI: inspect the role model and dry-run resolutions.
//!
//! # Environment Variables
//!
//! - `TENANTGATE_LOG_FORMAT`: `json` (default) or `text`
//! - `TENANTGATE_SIGN_IN_PATH`: route guard sign-in redirect (default `/login`)
//! - `TENANTGATE_UNAUTHORIZED_PATH`: route guard forbidden redirect (default `/unauthorized`)
//! - `RUST_LOG`: log filter (default `info`)

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use tenantgate_auth::{AccessRequirement, MatchMode, Permission, PrincipalId, Role, TenantId};
use tenantgate_observability::{LogConfig, LogFormat};

/// Role-based access control for multi-tenant business applications.
#[derive(Parser, Debug)]
#[command(name = "tenantgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log format: json or text (also: TENANTGATE_LOG_FORMAT)
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every role with its permission set
    Roles,

    /// List every permission with the roles granting it
    Permissions,

    /// Explain whether a role satisfies a requirement
    Explain {
        #[arg(long)]
        role: Role,

        #[command(flatten)]
        requirement: RequirementArgs,
    },

    /// Resolve a stored role assignment end to end and decide a requirement
    Simulate(SimulateArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Clone, Default)]
struct RequirementArgs {
    /// Required permission (repeatable)
    #[arg(short, long = "permission", value_name = "PERMISSION")]
    permissions: Vec<Permission>,

    /// Require every permission instead of any one of them
    #[arg(long)]
    all: bool,

    /// Require a tenancy owner (owner or admin)
    #[arg(long)]
    owner: bool,
}

impl RequirementArgs {
    fn to_requirement(&self) -> AccessRequirement {
        AccessRequirement {
            required_permissions: self.permissions.clone(),
            mode: if self.all { MatchMode::All } else { MatchMode::Any },
            require_tenancy_owner: self.owner,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    /// Raw role value the store returns (may be outside the closed set)
    #[arg(long, conflicts_with = "fixture")]
    role: Option<String>,

    /// Company id on the stored assignment (defaults to the tenant)
    #[arg(long, requires = "role")]
    company_id: Option<String>,

    /// JSON fixture of role assignments
    #[arg(long, value_name = "PATH", requires_all = ["principal", "tenant"])]
    fixture: Option<PathBuf>,

    #[arg(long)]
    principal: Option<PrincipalId>,

    #[arg(long)]
    tenant: Option<TenantId>,

    /// Simulate a role store outage
    #[arg(long)]
    unavailable: bool,

    #[command(flatten)]
    requirement: RequirementArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    tenantgate_observability::init_with(&log_config);

    let output = match cli.command {
        Command::Roles => commands::roles()?,
        Command::Permissions => commands::permissions()?,
        Command::Explain { role, requirement } => commands::explain(role, &requirement.to_requirement())?,
        Command::Simulate(args) => commands::simulate(args).await?,
        Command::Config => commands::config(&log_config)?,
    };

    println!("{output}");
    Ok(())
}
