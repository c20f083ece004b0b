//! Tracing/logging initialization

use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "/var/log/rapt";

/// Initialize tracing. Normal runs log warnings to stderr; `--debug`
/// writes structured JSON logs to a timestamped file, falling back to
/// stderr when the log directory is not writable.
pub fn init_tracing(debug_enabled: bool) {
    if !debug_enabled {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let log_dir = Path::new(LOG_DIR);
    if std::fs::create_dir_all(log_dir).is_ok() {
        let log_file = log_dir.join(format!(
            "rapt-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));
        if let Ok(file) = std::fs::File::create(&log_file) {
            tracing_subscriber::fmt()
                .json()
                .with_writer(Arc::new(file))
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("info,rapt=debug")),
                )
                .init();
            eprintln!("Debug logging enabled: {}", log_file.display());
            return;
        }
    }

    eprintln!("Warning: cannot write to {LOG_DIR}, logging debug output to stderr");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_writer(std::io::stderr)
        .init();
}
