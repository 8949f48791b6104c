// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup of displaced files.
//!
//! Any entry that stands in the way of a new dotfile link is moved aside
//! instead of being overwritten.
//!
//! # Naming Scheme
//!
//! - Directories get an incrementing counter suffix: `.bak.0`, `.bak.1`, and
//!   so on, until an unused name is found.
//! - Everything else gets the first eight hex characters of the SHA-256
//!   digest of its contents: `.bak.1a2b3c4d`. Symlinks are digested over their
//!   target path, so dangling symlinks can be backed up as well.
//!
//! Since equal contents produce equal names, backing up the same file twice
//! would hit an existing backup. In that case the existing backup is compared
//! byte-for-byte with the file being displaced. Identical contents means the
//! file is simply discarded. Different contents is reported as a
//! [`BackupError::Collision`], and nothing is touched.

use sha2::{Digest, Sha256};
use std::{
    fmt::Display,
    fs::{self, Metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Number of digest characters used in content-addressed backup names.
pub const DIGEST_PREFIX_LEN: usize = 8;

/// Result of backing up a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backup {
    /// Nothing to back up.
    Missing,

    /// Entry was moved to backup path.
    Moved(PathBuf),

    /// Identical backup already existed, so the entry was discarded.
    Deduplicated(PathBuf),
}

impl Backup {
    /// Backup path that now holds the displaced contents, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Missing => None,
            Self::Moved(path) | Self::Deduplicated(path) => Some(path.as_path()),
        }
    }
}

/// Move target path out of the way.
///
/// # Errors
///
/// - Return [`BackupError::Inspect`] if path metadata cannot be read.
/// - Return [`BackupError::Read`] if contents cannot be read for hashing.
/// - Return [`BackupError::Collision`] if a different backup already took the
///   content-addressed name.
/// - Return [`BackupError::Discard`] if a duplicate cannot be removed.
/// - Return [`BackupError::Rename`] if path cannot be moved.
#[instrument(level = "debug")]
pub fn backup(path: &Path) -> Result<Backup> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("backup: {} not found", path.display());
            return Ok(Backup::Missing);
        }
        Err(err) => {
            return Err(BackupError::Inspect {
                source: err,
                path: path.to_path_buf(),
            })
        }
    };

    let target = if metadata.is_dir() {
        counted_name(path)
    } else {
        let contents = read_contents(path, &metadata)?;
        let digest = format!("{:x}", Sha256::digest(&contents));
        let target = backup_name(path, &digest[..DIGEST_PREFIX_LEN]);

        if let Ok(existing) = fs::symlink_metadata(&target) {
            if existing.is_dir() || read_contents(&target, &existing)? != contents {
                return Err(BackupError::Collision {
                    path: path.to_path_buf(),
                    backup: target,
                });
            }

            warn!(
                "backup: {} already exists, discarding duplicate {}",
                target.display(),
                path.display()
            );
            fs::remove_file(path).map_err(|err| BackupError::Discard {
                source: err,
                path: path.to_path_buf(),
            })?;
            return Ok(Backup::Deduplicated(target));
        }

        target
    };

    debug!("backup: {} -> {}", path.display(), target.display());
    fs::rename(path, &target).map_err(|err| BackupError::Rename {
        source: err,
        from: path.to_path_buf(),
        to: target.clone(),
    })?;

    Ok(Backup::Moved(target))
}

/// Append `.bak.<suffix>` to file name of path.
pub fn backup_name(path: &Path, suffix: impl Display) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".bak.{suffix}"));
    path.with_file_name(name)
}

fn counted_name(path: &Path) -> PathBuf {
    let mut count = 0_u64;
    loop {
        let candidate = backup_name(path, count);
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        count += 1;
    }
}

fn read_contents(path: &Path, metadata: &Metadata) -> Result<Vec<u8>> {
    let contents = if metadata.is_symlink() {
        fs::read_link(path).map(|target| target.into_os_string().into_encoded_bytes())
    } else {
        fs::read(path)
    };

    contents.map_err(|err| BackupError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Backup error types.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Path metadata cannot be read.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path contents cannot be read for hashing.
    #[error("failed to read {:?} for hashing", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path cannot be moved to its backup name.
    #[error("failed to move {:?} to {:?}", from.display(), to.display())]
    Rename {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Duplicate of existing backup cannot be removed.
    #[error("failed to discard duplicate {:?}", path.display())]
    Discard {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Content-addressed backup name is taken by different contents.
    #[error("backup {:?} of {:?} already exists with different contents", backup.display(), path.display())]
    Collision { path: PathBuf, backup: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
