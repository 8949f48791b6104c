// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the user configuration file that dotlink reads at
//! startup. The configuration is loaded exactly once into an owned
//! [`DotConfig`], and handed explicitly to whoever needs it.
//!
//! # General Layout
//!
//! ```toml
//! # Adapters to install. Leave out to install every known adapter.
//! adapters = ["bash", "vim"]
//!
//! # Upper bound in seconds for each call to the Git binary.
//! timeout = 300
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::debug;

/// Name of configuration file inside configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// User configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DotConfig {
    /// Selected adapter names. Every known adapter when absent.
    pub adapters: Option<Vec<String>>,

    /// Timeout in seconds for external commands.
    pub timeout: Option<u64>,
}

impl DotConfig {
    /// Load configuration from configuration directory.
    ///
    /// Gives back default configuration if the configuration file does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if configuration file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if configuration file is
    ///   malformed.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        if !path.exists() {
            debug!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load configuration from {}", path.display());
        fs::read_to_string(&path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.clone(),
            })?
            .parse()
    }

    /// Save configuration into configuration directory.
    ///
    /// Creates configuration directory if needed.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NotDirectory`] if configuration directory
    ///   exists as non-directory.
    /// - Return [`ConfigError::Write`] if configuration cannot be written.
    /// - Return [`ConfigError::Serialize`] if configuration cannot be
    ///   serialized.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        if dir.exists() && !dir.is_dir() {
            return Err(ConfigError::NotDirectory {
                path: dir.to_path_buf(),
            });
        }

        let write_error = |err, path: &Path| ConfigError::Write {
            source: err,
            path: path.to_path_buf(),
        };
        mkdirp::mkdirp(dir).map_err(|err| write_error(err, dir))?;

        let path = dir.join(CONFIG_FILE_NAME);
        let contents = toml::ser::to_string_pretty(self)?;
        fs::write(&path, contents).map_err(|err| write_error(err, &path))?;
        debug!("saved configuration to {}", path.display());

        Ok(path)
    }

    /// Timeout for external commands, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

impl FromStr for DotConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: DotConfig = toml::de::from_str(data)?;

        // INVARIANT: A zero timeout would fail every external command.
        if config.timeout == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(config)
    }
}

impl Display for DotConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write configuration file.
    #[error("failed to write configuration at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Timeout of zero seconds was configured.
    #[error("timeout must be at least one second")]
    ZeroTimeout,

    /// Configuration directory path is taken by non-directory.
    #[error("configuration directory {:?} is not a directory", path.display())]
    NotDirectory { path: PathBuf },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
