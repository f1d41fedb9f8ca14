//! Client configuration via `settee.toml`
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Values are validated when the config is loaded and again
//! when a client is opened with it.

use serde::{Deserialize, Serialize};
use settee_core::{Error, Result};
use std::path::Path;
use std::time::Duration;

/// Config file name conventionally used for a client.
pub const CONFIG_FILE_NAME: &str = "settee.toml";

fn default_max_concurrent_operations() -> usize {
    6
}

fn default_row_buffer() -> usize {
    64
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("settee/{}", env!("CARGO_PKG_VERSION"))
}

/// Client configuration loaded from `settee.toml`.
///
/// # Example
///
/// ```toml
/// # Operations executing at once; further submissions wait in FIFO order
/// max_concurrent_operations = 6
///
/// # Deadline applied to operations submitted without one
/// default_timeout_ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Operations allowed in flight at once (default: 6).
    #[serde(default = "default_max_concurrent_operations")]
    pub max_concurrent_operations: usize,
    /// Deadline for operations submitted without one, measured from submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
    /// Rows buffered per operation before the body stream is paused (default: 64).
    #[serde(default = "default_row_buffer")]
    pub row_buffer: usize,
    /// TCP connect timeout of the HTTP transport (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: default_max_concurrent_operations(),
            default_timeout_ms: None,
            row_buffer: default_row_buffer(),
            connect_timeout_ms: default_connect_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_operations == 0 {
            return Err(Error::config("max_concurrent_operations must be at least 1"));
        }
        if self.row_buffer == 0 {
            return Err(Error::config("row_buffer must be at least 1"));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(Error::config("default_timeout_ms must be greater than 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::config("connect_timeout_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Deadline applied when an operation carries none.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# settee client configuration
#
# Operations executing at once (default: 6). Further submissions wait
# in submission order until a slot frees.
max_concurrent_operations = 6

# Deadline in milliseconds for operations submitted without their own,
# measured from submission (default: none).
# default_timeout_ms = 30000

# Rows buffered per operation before reading of the response pauses (default: 64).
row_buffer = 64

# TCP connect timeout in milliseconds (default: 10000).
connect_timeout_ms = 10000

# User-Agent header (default: "settee/<version>").
# user_agent = "my-app/1.0"
"#
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config { reason } => {
                Error::config(format!("{} (in '{}')", reason, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
