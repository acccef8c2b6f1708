//! Engine configuration, optionally loaded from `head.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                        |
//! |--------------|------------------------------------------------|
//! | `log`        | Enable `log!` output                           |
//! | `[template]` | Template parameter defaults (separator)        |
//! | `[priority]` | Implicit priority ladder and named tiers       |
//! | `[ssr]`      | Payload script id, hydration hash attribute    |
//! | `[client]`   | Auto-render debounce                           |
//!
//! # Example
//!
//! ```toml
//! [template]
//! separator = "-"
//!
//! [priority]
//! title = 45
//!
//! [client]
//! debounce_ms = 16
//! ```

pub mod defaults;
mod error;

pub use error::ConfigError;

use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing `head.toml`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct HeadConfig {
    /// Print engine diagnostics through `log!`.
    #[serde(default)]
    pub log: bool,

    /// Template parameter settings
    #[serde(default)]
    pub template: TemplateConfig,

    /// Implicit priority ladder
    #[serde(default)]
    pub priority: PriorityLadder,

    /// Server rendering settings
    #[serde(default)]
    pub ssr: SsrConfig,

    /// Client rendering settings
    #[serde(default)]
    pub client: ClientConfig,
}

impl HeadConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: HeadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sep = &self.template.separator;
        if !sep.is_empty() && sep.trim().is_empty() {
            return Err(ConfigError::Validation(
                "[template].separator must not be whitespace only".into(),
            ));
        }
        if self.ssr.payload_id.is_empty() {
            return Err(ConfigError::Validation("[ssr].payload_id is empty".into()));
        }
        if self.ssr.hash_attribute.is_empty() {
            return Err(ConfigError::Validation("[ssr].hash_attribute is empty".into()));
        }

        let p = &self.priority;
        if !(p.charset < p.base && p.base < p.csp && p.csp < p.viewport && p.viewport < p.title) {
            return Err(ConfigError::Validation(
                "[priority] must keep charset < base < csp < viewport < title".into(),
            ));
        }
        if !(p.critical < p.high && p.high < p.low) {
            return Err(ConfigError::Validation(
                "[priority] tiers must keep critical < high < low".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `[template]` section - template parameter defaults.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    /// Value of `%separator` when no entry sets `templateParams.separator`.
    #[serde(default = "defaults::template::separator")]
    #[educe(Default = defaults::template::separator())]
    pub separator: String,
}

/// `[priority]` section - the implicit ordering ladder.
///
/// Lower sorts earlier. Only the relative order matters; values are
/// compared within their band (see [`crate::resolve::sort`]).
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct PriorityLadder {
    #[educe(Default = 10)]
    pub charset: i64,
    #[educe(Default = 20)]
    pub base: i64,
    /// `meta[http-equiv=content-security-policy]`
    #[educe(Default = 30)]
    pub csp: i64,
    #[educe(Default = 40)]
    pub viewport: i64,
    #[educe(Default = 50)]
    pub title: i64,
    /// `link[rel=preconnect|dns-prefetch]`
    #[educe(Default = 60)]
    pub preconnect: i64,
    /// Render-blocking `script[src]` without `async`/`defer`.
    #[educe(Default = 70)]
    pub sync_script: i64,
    /// `link[rel=stylesheet]` and inline `style`.
    #[educe(Default = 80)]
    pub stylesheet: i64,
    /// `link[rel=preload|modulepreload]`
    #[educe(Default = 90)]
    pub preload: i64,
    /// Everything not matched by another rung.
    #[educe(Default = 100)]
    pub default: i64,
    #[educe(Default = 110)]
    pub async_script: i64,
    /// `script[defer]` and `script[type=module]`
    #[educe(Default = 120)]
    pub defer_script: i64,
    /// `link[rel=prefetch|prerender]`
    #[educe(Default = 130)]
    pub prefetch: i64,
    #[educe(Default = 1)]
    pub critical: i64,
    #[educe(Default = 2)]
    pub high: i64,
    #[educe(Default = 3)]
    pub low: i64,
}

/// `[ssr]` section - server rendering.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SsrConfig {
    /// `id` of the payload `<script>` the client reads back.
    #[serde(default = "defaults::ssr::payload_id")]
    #[educe(Default = defaults::ssr::payload_id())]
    pub payload_id: String,

    /// `<html>` attribute carrying the hash of the rendered tag set.
    #[serde(default = "defaults::ssr::hash_attribute")]
    #[educe(Default = defaults::ssr::hash_attribute())]
    pub hash_attribute: String,
}

/// `[client]` section - client rendering.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Delay before an auto-render pass runs, after the first mutation of a burst.
    #[serde(default = "defaults::client::debounce_ms")]
    #[educe(Default = defaults::client::debounce_ms())]
    pub debounce_ms: u64,
}

impl ClientConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
