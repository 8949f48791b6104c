// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way. All user supplied paths enter the
//! system through [`ManagedPath`], which performs shell expansion exactly once
//! at the boundary.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Name of configuration directory placed in user's home directory.
pub const CONFIG_DIR_NAME: &str = ".dot";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Determine default absolute path to configuration directory.
///
/// Uses `$HOME/.dot` as the default. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn default_config_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join(CONFIG_DIR_NAME))
}

/// Optional, validated path owned by a single component.
///
/// User input goes through [`ManagedPath::new`] or [`ManagedPath::set`], which
/// perform shell expansion, so a managed path never holds an unexpanded `~` or
/// `$VAR` fragment taken from the user. Paths that already name real file
/// system entries enter through [`ManagedPath::resolved`], and are stored
/// verbatim. The unset state is distinct from any path value.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ManagedPath(Option<PathBuf>);

impl ManagedPath {
    /// Construct unset managed path.
    pub fn unset() -> Self {
        Self(None)
    }

    /// Construct managed path from user supplied path-like value.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::Empty`] if given path is empty.
    /// - Return [`PathError::ShellExpansion`] if shell expansion fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut managed = Self::unset();
        managed.set(path)?;
        Ok(managed)
    }

    /// Assign new user supplied path value.
    ///
    /// Previous value is kept if the new value is rejected.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::Empty`] if given path is empty.
    /// - Return [`PathError::ShellExpansion`] if shell expansion fails.
    pub fn set(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.0 = Some(expand(path.as_ref())?);
        Ok(())
    }

    /// Construct managed path from already resolved path.
    ///
    /// No expansion is performed, so literal `~` or `$` characters that are
    /// part of a real directory name survive untouched.
    pub fn resolved(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    /// Assign already resolved path value verbatim.
    pub fn set_resolved(&mut self, path: impl Into<PathBuf>) {
        self.0 = Some(path.into());
    }

    /// Reset to unset state.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Check if a path value is currently held.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Treat managed path as optional [`Path`] slice.
    pub fn as_path(&self) -> Option<&Path> {
        self.0.as_deref()
    }
}

impl TryFrom<&str> for ManagedPath {
    type Error = PathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<PathBuf> for ManagedPath {
    fn from(path: PathBuf) -> Self {
        Self::resolved(path)
    }
}

impl Display for ManagedPath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self.as_path() {
            Some(path) => fmt.write_str(path.to_string_lossy().as_ref()),
            None => fmt.write_str("<unset>"),
        }
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }

    // INVARIANT: Non-unicode paths cannot carry expandable fragments, so they
    // are taken verbatim.
    let Some(raw) = path.to_str() else {
        return Ok(path.to_path_buf());
    };

    Ok(PathBuf::from(shellexpand::full(raw)?.into_owned()))
}

/// Path resolution error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// Empty string given as path.
    #[error("empty path is not a valid path")]
    Empty,

    /// Failed to perform shell expansion on path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
