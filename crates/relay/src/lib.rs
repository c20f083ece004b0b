#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Interactive relay for the apply phase
//!
//! Once every archive is verified and promoted, the package tool is
//! re-invoked to apply the transaction. It may expect an interactive
//! terminal for its progress display even though rapt itself runs
//! non-interactively from this point, so the subprocess is attached to the
//! subordinate side of a freshly allocated pseudo-terminal while rapt pumps
//! the controlling side to the real terminal. Machine summary lines, only
//! meaningful during the dry-run parse, are suppressed on the way through.
//!
//! When no pseudo-terminal device is available the relay falls back to a
//! plain invocation with inherited standard streams.

mod filter;

pub use filter::TagFilter;

use nix::pty::{openpty, OpenptyResult, Winsize};
use rapt_errors::{Error, RelayError};
use rapt_events::{AppEvent, EventEmitter, EventSender, RelayEvent};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Run the apply invocation, relaying its terminal output.
///
/// Lines starting with `suppress_prefix` are filtered out of the relayed
/// stream. The subprocess exit code is returned and becomes the whole
/// program's exit code.
///
/// # Errors
///
/// Returns [`RelayError::SpawnFailed`] if the subprocess cannot be started
/// or waited on. Pseudo-terminal allocation failure is not an error: the
/// relay falls back to inherited standard streams.
pub async fn relay_apply(
    program: &str,
    args: &[String],
    suppress_prefix: &str,
    tx: &EventSender,
) -> Result<i32, Error> {
    tx.emit(AppEvent::Relay(RelayEvent::Started {
        command: program.to_string(),
    }));

    match allocate_pty() {
        Ok(pty) => relay_through_pty(program, args, suppress_prefix, pty).await,
        Err(e) => {
            tx.emit(AppEvent::Relay(RelayEvent::PtyFallback {
                reason: e.to_string(),
            }));
            run_inherited(program, args).await
        }
    }
}

/// Allocate a pseudo-terminal, propagating the invoking terminal's window
/// size when one is available.
fn allocate_pty() -> Result<OpenptyResult, RelayError> {
    let winsize = console::Term::stdout()
        .size_checked()
        .map(|(rows, cols)| Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        });

    openpty(winsize.as_ref(), None).map_err(|e| RelayError::PtyUnavailable(e.to_string()))
}

async fn relay_through_pty(
    program: &str,
    args: &[String],
    suppress_prefix: &str,
    pty: OpenptyResult,
) -> Result<i32, Error> {
    let OpenptyResult { master, slave } = pty;

    let spawn_err = |e: &std::io::Error| RelayError::SpawnFailed {
        command: program.to_string(),
        message: e.to_string(),
    };

    let stdin = slave.try_clone().map_err(|e| spawn_err(&e))?;
    let stdout = slave.try_clone().map_err(|e| spawn_err(&e))?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(slave));

    let mut child = command.spawn().map_err(|e| spawn_err(&e))?;
    // Close our copies of the subordinate side; the child holds the only
    // remaining ones, so the pump below ends when the child exits.
    drop(command);

    let mut filter = TagFilter::new(suppress_prefix);
    let mut master = tokio::fs::File::from_std(std::fs::File::from(master));

    let pump = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut buf = vec![0u8; 4096];
        loop {
            match master.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let forward = filter.push(&buf[..n]);
                    if !forward.is_empty() {
                        if stdout.write_all(&forward).await.is_err() {
                            break;
                        }
                        let _ = stdout.flush().await;
                    }
                }
                // The controlling side reads EIO once the subordinate side
                // is fully closed; that is the end-of-output condition.
                Err(_) => break,
            }
        }
        let rest = filter.flush();
        if !rest.is_empty() {
            let _ = stdout.write_all(&rest).await;
            let _ = stdout.flush().await;
        }
    });

    let status = child.wait().await.map_err(|e| spawn_err(&e))?;
    let _ = pump.await;

    Ok(status.code().unwrap_or(1))
}

/// Fallback path: direct invocation with inherited standard streams
async fn run_inherited(program: &str, args: &[String]) -> Result<i32, Error> {
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| RelayError::SpawnFailed {
            command: program.to_string(),
            message: e.to_string(),
        })?;
    Ok(status.code().unwrap_or(1))
}
