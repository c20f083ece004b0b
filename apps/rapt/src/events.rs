//! Event handling and progress display

use console::style;
use rapt_events::{AppEvent, DownloadEvent, GeneralEvent, PlanEvent, RelayEvent, VerifyEvent};

/// Renders pipeline events to the terminal
pub struct EventHandler {
    verbose: u8,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new(verbose: u8) -> Self {
        Self { verbose }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Download(download) => self.handle_download(download),

            AppEvent::Plan(PlanEvent::Started { command }) => {
                if self.verbose > 0 {
                    println!("Resolving {command} transaction...");
                }
            }
            AppEvent::Plan(PlanEvent::Parsed {
                missing_files,
                total_size,
            }) => {
                tracing::debug!(missing_files, total_size, "transaction plan parsed");
            }

            AppEvent::Verify(VerifyEvent::Started { name, algorithm }) => {
                if self.verbose > 0 {
                    println!("Verifying {name} ({algorithm})");
                }
            }
            AppEvent::Verify(VerifyEvent::Promoted { name }) => {
                if self.verbose > 1 {
                    println!("Moved {name} into the package cache");
                }
            }

            AppEvent::Relay(RelayEvent::Started { command }) => {
                if self.verbose > 0 {
                    println!("Handing over to {command}...");
                }
            }
            AppEvent::Relay(RelayEvent::PtyFallback { reason }) => {
                eprintln!(
                    "{} no pseudo-terminal available ({reason}), running directly",
                    style("Warning:").yellow().bold()
                );
            }

            AppEvent::General(GeneralEvent::Message { message }) => println!("{message}"),
            AppEvent::General(GeneralEvent::Warning { message }) => {
                eprintln!("{} {message}", style("Warning:").yellow().bold());
            }
            AppEvent::General(GeneralEvent::DebugLog { message }) => {
                if self.verbose > 1 {
                    eprintln!("{message}");
                }
                tracing::debug!("{message}");
            }
        }
    }

    fn handle_download(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Admitted {
                seq,
                total,
                name,
                url,
            } => {
                println!("Downloading [{seq}/{total}] {name}: {url}");
            }
            DownloadEvent::Completed { seq, total, name } => {
                if self.verbose > 0 {
                    println!("Received ({seq}/{total}) {name}");
                }
            }
        }
    }
}
