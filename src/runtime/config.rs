use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::error::Result;
use crate::logging::Logger;
use crate::metrics::SessionMetrics;

/// Configuration knobs for a session.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// When false the page menu is hidden regardless of what the app asks for.
    pub show_sidebar_navigation: bool,
    /// Optional structured logger used by the session.
    pub logger: Option<Logger>,
    /// Metrics accumulator shared with whoever reports on the session.
    pub metrics: Option<Arc<Mutex<SessionMetrics>>>,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_sidebar_navigation: true,
            logger: None,
            metrics: None,
            metrics_target: "session_nav::metrics".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    client: ClientSection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientSection {
    #[serde(default = "enabled")]
    show_sidebar_navigation: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            show_sidebar_navigation: enabled(),
        }
    }
}

fn enabled() -> bool {
    true
}

impl RuntimeConfig {
    /// Read the options this crate cares about from an app config file
    /// (`[client] showSidebarNavigation = false`). Everything else in the
    /// file is ignored.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        Ok(Self {
            show_sidebar_navigation: file.client.show_sidebar_navigation,
            ..Self::default()
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(SessionMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<SessionMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}
