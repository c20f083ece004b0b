//! rapt - Parallel download front end for APT
//!
//! Pipeline commands (install, remove, dist-upgrade, and unrecognized
//! pass-through commands) go through the full plan/confirm/download/verify/
//! apply pipeline; query and marking commands are dispatched straight to
//! the companion APT tools.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm};
use rapt_config::Config;
use rapt_events::EventReceiver;
use rapt_ops::{CommitOutcome, OpsCtxBuilder};
use std::future::Future;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.global.debug);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("application error: {e}");
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Main application logic; the returned value is the process exit code.
async fn run(cli: Cli) -> Result<i32, CliError> {
    info!("starting rapt v{}", env!("CARGO_PKG_VERSION"));

    // Configuration precedence: file, then environment, then CLI flags.
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);

    // Query and marking commands bypass the pipeline entirely.
    if let Some((program, args)) = direct_dispatch(&cli.command, &config) {
        return Ok(rapt_ops::passthrough(&program, &args).await?);
    }

    let (command, args) = pipeline_command(&cli.command)?;

    let (event_sender, mut event_receiver) = rapt_events::channel();
    let ctx = OpsCtxBuilder::new()
        .with_config(config.clone())
        .with_event_sender(event_sender)
        .build()?;
    let mut handler = EventHandler::new(config.general.verbose);

    let plan = run_with_events(
        rapt_ops::plan_transaction(&ctx, &command, &args),
        &mut event_receiver,
        &mut handler,
    )
    .await?;

    if plan.is_noop() {
        println!("Nothing to do.");
        return Ok(0);
    }

    display::render_plan(&plan);

    if !config.general.assume_yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Apply these changes?")
            .default(true)
            .interact()?;
        if !proceed {
            println!("Abort.");
            return Ok(0);
        }
    }

    let outcome = run_with_events(
        rapt_ops::commit(&ctx, &plan, &command, &args),
        &mut event_receiver,
        &mut handler,
    )
    .await?;

    match outcome {
        // Benign: another instance owns the staging directory.
        CommitOutcome::LockHeld => Ok(0),
        CommitOutcome::Applied(code) => {
            if code == 0 {
                info!("command completed successfully");
            }
            Ok(code)
        }
    }
}

/// Drive a pipeline future while rendering its events concurrently
async fn run_with_events<T, E>(
    future: impl Future<Output = Result<T, E>>,
    receiver: &mut EventReceiver,
    handler: &mut EventHandler,
) -> Result<T, E> {
    let mut future = Box::pin(future);

    loop {
        select! {
            result = &mut future => {
                // Drain any remaining events
                while let Ok(event) = receiver.try_recv() {
                    handler.handle_event(&event);
                }
                return result;
            }

            event = receiver.recv() => {
                match event {
                    Some(event) => handler.handle_event(&event),
                    None => { /* channel closed: keep waiting for the future */ }
                }
            }
        }
    }
}

/// Apply CLI flag overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(parallel) = global.parallel {
        config.general.parallel_downloads = parallel;
    }
    if global.yes {
        config.general.assume_yes = true;
    }
    if global.verbose > 0 {
        config.general.verbose = global.verbose;
    }
    if let Some(method) = global.download_method {
        config.network.download_method = method;
    }
}

/// Commands routed straight to a companion tool, without the pipeline
fn direct_dispatch(command: &Commands, config: &Config) -> Option<(String, Vec<String>)> {
    let with = |tool: &str, sub: &str, rest: &[String]| {
        let mut args = vec![sub.to_string()];
        args.extend_from_slice(rest);
        Some((tool.to_string(), args))
    };

    match command {
        Commands::Search { query } => with(&config.apt.cache, "search", query),
        Commands::Show { packages } => with(&config.apt.cache, "show", packages),
        Commands::Hold { packages } => with(&config.apt.mark, "hold", packages),
        Commands::Unhold { packages } => with(&config.apt.mark, "unhold", packages),
        Commands::Showhold => with(&config.apt.mark, "showhold", &[]),
        Commands::Update => with(&config.apt.get, "update", &[]),
        Commands::Clean => with(&config.apt.get, "clean", &[]),
        Commands::Autoclean => with(&config.apt.get, "autoclean", &[]),
        _ => None,
    }
}

/// The apt-get command and arguments for a pipeline command
fn pipeline_command(command: &Commands) -> Result<(String, Vec<String>), CliError> {
    match command {
        Commands::Install { packages } => Ok(("install".to_string(), packages.clone())),
        Commands::Remove { packages } => Ok(("remove".to_string(), packages.clone())),
        Commands::Upgrade => Ok(("upgrade".to_string(), Vec::new())),
        Commands::DistUpgrade => Ok(("dist-upgrade".to_string(), Vec::new())),
        Commands::External(words) => {
            let mut words = words.clone();
            if words.is_empty() {
                return Err(CliError::InvalidArguments("missing command".to_string()));
            }
            let command = words.remove(0);
            Ok((command, words))
        }
        // Everything else was already handled by direct_dispatch
        _ => Err(CliError::InvalidArguments(
            "command does not use the download pipeline".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_dispatch_routes_query_tools() {
        let config = Config::default();

        let (program, args) =
            direct_dispatch(&Commands::Search { query: vec!["curl".to_string()] }, &config)
                .unwrap();
        assert_eq!(program, "apt-cache");
        assert_eq!(args, ["search", "curl"]);

        let (program, args) =
            direct_dispatch(&Commands::Hold { packages: vec!["vim".to_string()] }, &config)
                .unwrap();
        assert_eq!(program, "apt-mark");
        assert_eq!(args, ["hold", "vim"]);

        assert!(direct_dispatch(
            &Commands::Install { packages: vec!["curl".to_string()] },
            &config
        )
        .is_none());
    }

    #[test]
    fn test_pipeline_command_shapes() {
        let (command, args) = pipeline_command(&Commands::Install {
            packages: vec!["curl".to_string(), "vim".to_string()],
        })
        .unwrap();
        assert_eq!(command, "install");
        assert_eq!(args, ["curl", "vim"]);

        let (command, args) = pipeline_command(&Commands::DistUpgrade).unwrap();
        assert_eq!(command, "dist-upgrade");
        assert!(args.is_empty());

        let (command, args) = pipeline_command(&Commands::External(vec![
            "build-dep".to_string(),
            "curl".to_string(),
        ]))
        .unwrap();
        assert_eq!(command, "build-dep");
        assert_eq!(args, ["curl"]);
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let mut config = Config::default();
        let global = GlobalArgs {
            parallel: Some(9),
            yes: true,
            verbose: 1,
            download_method: Some(rapt_config::DownloadMethod::Aria2),
            config: None,
            debug: false,
        };
        apply_cli_config(&mut config, &global);
        assert_eq!(config.general.parallel_downloads, 9);
        assert!(config.general.assume_yes);
        assert_eq!(config.general.verbose, 1);
        assert_eq!(
            config.network.download_method,
            rapt_config::DownloadMethod::Aria2
        );
    }
}
