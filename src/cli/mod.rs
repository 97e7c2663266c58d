//! CLI command definitions for schemactl
//!
//! Each subcommand maps onto one action of the `database-schema` provider;
//! [`Command::invocation`] turns parsed arguments into the provider's
//! positional argument list.

use crate::config::{DEFAULT_ENVIRONMENT, DEFAULT_MIGRATIONS_DIR};
use crate::provider::DatabaseSchemaProvider;
use clap::{Args, Parser, Subcommand};

/// Versioned SQL schema migrations driven by layered application config
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root used to discover the application config (default: cwd)
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Explicit application config file (skips discovery)
    #[arg(short, long, global = true)]
    pub app_config: Option<String>,

    /// User settings file (default: $SCHEMACTL_USER_CONFIG or ~/.schemactl.*)
    #[arg(short, long, global = true)]
    pub user_config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Environment and migrations directory shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Config environment section
    #[arg(default_value = DEFAULT_ENVIRONMENT)]
    pub env: String,

    /// Directory holding NNN-Name.sql migration scripts
    #[arg(default_value = DEFAULT_MIGRATIONS_DIR)]
    pub dir: String,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate to the newest available version
    Update(TargetArgs),

    /// Migrate to a version: a number, next, prev, +N or -N
    UpdateTo {
        /// Target version
        #[arg(allow_hyphen_values = true)]
        version: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Run the next migration script
    Next(TargetArgs),

    /// Roll back the most recent migration script
    Prev(TargetArgs),

    /// Move forward by a number of scripts
    Inc {
        /// Number of scripts to apply
        steps: u32,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Move back by a number of scripts
    Dec {
        /// Number of scripts to roll back
        steps: u32,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show the current schema version
    Current(TargetArgs),
}

impl Command {
    /// Provider name, action name and positional arguments for this command.
    pub fn invocation(&self) -> (&'static str, &'static str, Vec<String>) {
        let (action, lead, target) = match self {
            Command::Update(target) => ("update", None, target),
            Command::UpdateTo { version, target } => ("updateTo", Some(version.clone()), target),
            Command::Next(target) => ("next", None, target),
            Command::Prev(target) => ("prev", None, target),
            Command::Inc { steps, target } => ("inc", Some(steps.to_string()), target),
            Command::Dec { steps, target } => ("dec", Some(steps.to_string()), target),
            Command::Current(target) => ("current", None, target),
        };

        let mut args: Vec<String> = lead.into_iter().collect();
        args.push(target.env.clone());
        args.push(target.dir.clone());
        (DatabaseSchemaProvider::NAME, action, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("schemactl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_update_defaults() {
        let cli = parse(&["update"]);
        assert_eq!(cli.log, "2");
        let (provider, action, args) = cli.command.invocation();
        assert_eq!(provider, "database-schema");
        assert_eq!(action, "update");
        assert_eq!(args, vec!["development", "./scripts/migrations"]);
    }

    #[test]
    fn test_update_to_accepts_negative_steps() {
        let cli = parse(&["update-to", "-2", "testing"]);
        let (_, action, args) = cli.command.invocation();
        assert_eq!(action, "updateTo");
        assert_eq!(args, vec!["-2", "testing", "./scripts/migrations"]);
    }

    #[test]
    fn test_inc_and_dec_steps() {
        let cli = parse(&["inc", "3", "development", "db/migrations"]);
        let (_, action, args) = cli.command.invocation();
        assert_eq!(action, "inc");
        assert_eq!(args, vec!["3", "development", "db/migrations"]);

        let (_, action, args) = parse(&["dec", "2", "production"]).command.invocation();
        assert_eq!(action, "dec");
        assert_eq!(args, vec!["2", "production", "./scripts/migrations"]);
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&["current", "--app-config", "conf/app.yaml", "-v"]);
        assert_eq!(cli.app_config.as_deref(), Some("conf/app.yaml"));
        assert!(cli.verbose);
        assert_eq!(cli.command.invocation().1, "current");
    }

    #[test]
    fn test_rejects_bad_steps() {
        assert!(Cli::try_parse_from(["schemactl", "inc", "many"]).is_err());
        assert!(Cli::try_parse_from(["schemactl", "dec"]).is_err());
    }
}
