//! Configuration for jbodstore
//!
//! Centralized configuration with sensible defaults, shared by the client
//! stack and the device emulator.

use std::path::PathBuf;

use crate::cache::{MAX_CACHE_ENTRIES, MIN_CACHE_ENTRIES};
use crate::error::{JbodError, Result};

/// Main configuration for a jbodstore client or emulator
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// Address of the remote device (host:port)
    pub device_addr: String,

    /// Number of block cache slots created on connect; `None` disables caching
    pub cache_entries: Option<usize>,

    /// Connection read timeout (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm on the device connection
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Emulator Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for the device emulator
    pub listen_addr: String,

    /// Disk image the emulator loads on start and saves after each session
    pub image_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_addr: "127.0.0.1:3333".to_string(),
            cache_entries: None,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            nodelay: true,
            listen_addr: "127.0.0.1:3333".to_string(),
            image_path: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check settings that can be rejected without touching the device
    pub fn validate(&self) -> Result<()> {
        if let Some(entries) = self.cache_entries {
            if !(MIN_CACHE_ENTRIES..=MAX_CACHE_ENTRIES).contains(&entries) {
                return Err(JbodError::Config(format!(
                    "cache_entries must be within {}..={}, got {}",
                    MIN_CACHE_ENTRIES, MAX_CACHE_ENTRIES, entries
                )));
            }
        }
        if self.device_addr.is_empty() {
            return Err(JbodError::Config("device_addr is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the remote device address
    pub fn device_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.device_addr = addr.into();
        self
    }

    /// Enable the block cache with the given number of slots
    pub fn cache_entries(mut self, entries: usize) -> Self {
        self.config.cache_entries = Some(entries);
        self
    }

    /// Disable the block cache
    pub fn no_cache(mut self) -> Self {
        self.config.cache_entries = None;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the emulator listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the emulator disk image path
    pub fn image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.image_path = Some(path.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
