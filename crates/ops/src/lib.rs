#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Operation orchestration for rapt
//!
//! Ties the pipeline together: dry-run plan parsing, staging directory
//! acquisition, concurrent download, sequential verification with
//! promotion into APT's cache, and finally the relayed apply invocation.

mod context;

pub use context::{OpsCtx, OpsCtxBuilder};

use rapt_errors::{Error, OpsError};
use rapt_events::{AppEvent, EventEmitter, VerifyEvent};
use rapt_net::{Downloader, NetClient, NetConfig};
use rapt_plan::{machine_summary_option, TransactionPlan, MACHINE_LINE_PREFIX};
use rapt_staging::StagingDir;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Result of committing a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Another instance holds the staging lock; nothing was done. This is
    /// the benign exit path, not a failure.
    LockHeld,
    /// The apply phase ran; its exit code becomes the program's.
    Applied(i32),
}

/// Ask APT for its archives directory. Cache paths come from the package
/// manager's own configuration, never from hardcoded defaults.
///
/// # Errors
///
/// Returns [`OpsError::CacheDirUnavailable`] if `apt-config` cannot be run
/// or its output does not contain the expected assignment.
pub async fn archives_dir(ctx: &OpsCtx) -> Result<PathBuf, Error> {
    let output = Command::new(&ctx.config.apt.config)
        .arg("shell")
        .arg("ARCHIVES")
        .arg("Dir::Cache::archives/d")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| OpsError::CacheDirUnavailable {
            message: format!("{}: {e}", ctx.config.apt.config),
        })?;

    if !output.status.success() {
        return Err(OpsError::CacheDirUnavailable {
            message: format!("{} exited with {}", ctx.config.apt.config, output.status),
        }
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let archives = stdout
        .lines()
        .find_map(|line| {
            line.strip_prefix("ARCHIVES='")
                .and_then(|rest| rest.strip_suffix('\''))
        })
        .map(PathBuf::from)
        .ok_or_else(|| OpsError::CacheDirUnavailable {
            message: format!("unexpected apt-config output: {}", stdout.trim()),
        })?;

    tracing::debug!(path = %archives.display(), "resolved APT archives directory");
    Ok(archives)
}

/// Parse the transaction plan for a pipeline command via a dry-run
/// print-uris invocation.
///
/// # Errors
///
/// Propagates launch and parse failures from the plan crate; no partial
/// plan is ever returned.
pub async fn plan_transaction(
    ctx: &OpsCtx,
    command: &str,
    args: &[String],
) -> Result<TransactionPlan, Error> {
    TransactionPlan::from_dry_run(&ctx.config.apt.get, command, args, &ctx.tx).await
}

/// Download, verify, promote, and apply an already-confirmed plan.
///
/// # Errors
///
/// Every download or verification failure is fatal and aborts the run; the
/// staging directory contents are purged on the way out regardless.
pub async fn commit(
    ctx: &OpsCtx,
    plan: &TransactionPlan,
    command: &str,
    args: &[String],
) -> Result<CommitOutcome, Error> {
    let archives = archives_dir(ctx).await?;

    let staging = match StagingDir::acquire(&archives) {
        Ok(staging) => staging,
        Err(e) if e.is_benign() => {
            ctx.emit_message("Another rapt instance is downloading here already; nothing to do.");
            return Ok(CommitOutcome::LockHeld);
        }
        Err(e) => return Err(e),
    };
    staging.install_signal_purge();

    if !plan.missing().is_empty() {
        fetch_and_verify(ctx, plan, &staging, &archives).await?;
    }

    let mut apply_args = vec![command.to_string()];
    apply_args.extend_from_slice(args);
    apply_args.push("-y".to_string());
    apply_args.push(machine_summary_option());

    let code = rapt_relay::relay_apply(
        &ctx.config.apt.get,
        &apply_args,
        MACHINE_LINE_PREFIX,
        &ctx.tx,
    )
    .await?;

    Ok(CommitOutcome::Applied(code))
}

/// Concurrent download phase followed by the strictly sequential
/// verification phase, iterating the missing set in insertion order.
async fn fetch_and_verify(
    ctx: &OpsCtx,
    plan: &TransactionPlan,
    staging: &StagingDir,
    archives: &std::path::Path,
) -> Result<(), Error> {
    let net_config = NetConfig {
        timeout: Duration::from_secs(ctx.config.network.timeout),
        connect_timeout: Duration::from_secs(ctx.config.network.connect_timeout),
        ..NetConfig::default()
    };
    let downloader = Downloader::new(
        NetClient::new(&net_config)?,
        ctx.config.general.parallel_downloads,
        ctx.config.network.download_method,
        ctx.config.network.aria2_path.clone(),
    );

    downloader
        .fetch_all(plan.missing(), staging.path(), &ctx.tx)
        .await?;

    for spec in plan.missing().values() {
        ctx.emit(AppEvent::Verify(VerifyEvent::Started {
            name: spec.name.clone(),
            algorithm: spec.digest.algorithm().to_string(),
        }));

        let staged = staging.path().join(&spec.name);
        rapt_hash::verify_file(&staged, &spec.name, &spec.digest).await?;
        staging.promote(&spec.name, archives).await?;

        ctx.emit(AppEvent::Verify(VerifyEvent::Promoted {
            name: spec.name.clone(),
        }));
    }

    Ok(())
}

/// Run a companion tool (or apt-get itself for non-pipeline commands) with
/// inherited standard streams, returning its exit code.
///
/// # Errors
///
/// Returns an error if the tool cannot be started.
pub async fn passthrough(program: &str, args: &[String]) -> Result<i32, Error> {
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| OpsError::OperationFailed {
            message: format!("failed to run {program}: {e}"),
        })?;
    Ok(status.code().unwrap_or(1))
}
