//! Operations context shared by every pipeline stage

use rapt_config::Config;
use rapt_errors::{Error, OpsError};
use rapt_events::{EventEmitter, EventSender};

/// Execution context threaded through all operations
///
/// Bundles the effective configuration and the event channel so nothing in
/// the pipeline reaches for ambient global state.
#[derive(Clone)]
pub struct OpsCtx {
    pub config: Config,
    pub tx: EventSender,
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

/// Builder for [`OpsCtx`]
#[derive(Default)]
pub struct OpsCtxBuilder {
    config: Option<Config>,
    tx: Option<EventSender>,
}

impl OpsCtxBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// # Errors
    ///
    /// Returns an error if a required component was not provided.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let config = self.config.ok_or(OpsError::MissingComponent {
            name: "config".to_string(),
        })?;
        let tx = self.tx.ok_or(OpsError::MissingComponent {
            name: "event sender".to_string(),
        })?;
        Ok(OpsCtx { config, tx })
    }
}
