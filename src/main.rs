//! schemactl
//!
//! Runs versioned SQL schema migrations against the database named in a
//! project's layered, per-environment application config.

use anyhow::{Context, Result};
use clap::Parser;
use schemactl::cli::Cli;
use schemactl::config::UserSettings;
use schemactl::logging::init_logging;
use schemactl::project::ProjectProfile;
use schemactl::provider::{Dispatcher, Registry, Response};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log, cli.verbose)?;

    let root = match &cli.project {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Cannot determine working directory")?,
    };
    let project = match &cli.app_config {
        Some(path) => ProjectProfile::with_app_config(&root, path),
        None => ProjectProfile::discover(&root),
    };
    debug!(
        root = %project.root().display(),
        app_config = ?project.application_config_file(),
        "Loaded project"
    );

    // A broken settings file is reported like any failed command.
    let settings = match UserSettings::discover(cli.user_config.as_deref().map(Path::new)) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "Failed to load user settings");
            let mut response = Response::new();
            response.append_error(&err);
            print_response(&mut response);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut registry = Registry::new(Some(project), settings);
    let (provider, action, args) = cli.command.invocation();
    let ok = Dispatcher::with_defaults().dispatch(provider, action, &args, &mut registry)?;
    print_response(registry.response_mut());

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_response(response: &mut Response) {
    for line in response.take() {
        println!("{line}");
    }
}
