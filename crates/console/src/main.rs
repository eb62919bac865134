//! `storefront-authz`: inspect and check storefront RBAC configuration.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

mod commands;

use commands::Workspace;

#[derive(Debug, Parser)]
#[command(author, version, about = "Storefront authorization console", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// RBAC document (JSON). Defaults to the built-in storefront roles.
    #[arg(long, global = true, env = "STOREFRONT_RBAC_CONFIG")]
    pub config: Option<PathBuf>,
    /// Route table (JSON array of rules). Defaults to the storefront table.
    #[arg(long, global = true)]
    pub routes: Option<PathBuf>,
    /// API rule table (JSON array of fragment/resource pairs).
    #[arg(long, global = true)]
    pub api_rules: Option<PathBuf>,
    /// Deny unmatched routes and API endpoints regardless of environment.
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dump roles, permissions and categories as JSON.
    Audit,
    /// Report malformed permission tokens and unreachable route rules.
    Validate,
    /// Decide whether a role may open a path.
    CheckRoute {
        path: String,
        /// Role to check; omitted means an anonymous visitor.
        #[arg(long)]
        role: Option<String>,
    },
    /// Decide whether a role may call an endpoint with a verb.
    CheckApi {
        endpoint: String,
        verb: String,
        #[arg(long, default_value = "public")]
        role: String,
    },
    /// Explain one permission decision for a role.
    Explain { role: String, permission: String },
}

fn main() -> Result<()> {
    storefront_observability::init();
    let cli = Cli::parse();
    let workspace = Workspace::load(&cli.sources)?;

    let output = match cli.command {
        Commands::Audit => workspace.audit()?,
        Commands::Validate => {
            let report = workspace.validate();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                bail!("{} problem(s) found in {}", report.problem_count(), report.source);
            }
            return Ok(());
        }
        Commands::CheckRoute { path, role } => workspace.check_route(&path, role.as_deref())?,
        Commands::CheckApi {
            endpoint,
            verb,
            role,
        } => workspace.check_api(&endpoint, &verb, &role)?,
        Commands::Explain { role, permission } => workspace.explain(&role, &permission)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
