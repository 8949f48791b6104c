// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control probing.
//!
//! Figure out whether a directory lives inside of a Git working tree, and
//! which remotes that working tree knows about. Detection of the working tree
//! root is done purely by probing the file system for Git metadata. Remote
//! listing, cloning, and pulling are delegated to the Git binary through
//! [`Syscall`].

use crate::syscall::{CommandLine, Shell, Syscall, SyscallError};

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Mapping of remote name to remote URL.
///
/// Always recomputed on each probe, never cached.
pub type RemoteSet = BTreeMap<String, String>;

/// Git probe backed by some [`Syscall`] implementation.
#[derive(Debug, Clone, Default)]
pub struct GitProbe<S = Shell>
where
    S: Syscall,
{
    syscall: S,
}

impl<S> GitProbe<S>
where
    S: Syscall,
{
    /// Construct new Git probe.
    pub fn new(syscall: S) -> Self {
        Self { syscall }
    }

    /// Find root of working tree that contains target path.
    ///
    /// Walks upward from target path through its parents until a directory
    /// containing `.git/config` is found. The filesystem root itself is
    /// checked too. Returns `None` if no such directory exists.
    pub fn root_of(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = std::path::absolute(path.as_ref()).unwrap_or_else(|_| path.as_ref().into());
        path.ancestors()
            .find(|dir| dir.join(".git").join("config").exists())
            .map(Path::to_path_buf)
    }

    /// List remotes of working tree at target root.
    ///
    /// Parses output of `git remote -v` such that the first two whitespace
    /// separated tokens of each line form a name and URL pair. Gives back an
    /// empty mapping if root is `None`, or Git fails to list anything.
    #[instrument(skip(self), level = "debug")]
    pub fn remotes_of(&self, root: Option<&Path>) -> RemoteSet {
        let Some(root) = root else {
            return RemoteSet::new();
        };

        let output = match self.syscall.run_line(Some(root), "git remote -v") {
            Ok(output) => output,
            Err(err) => {
                warn!("cannot list remotes of {}: {err}", root.display());
                return RemoteSet::new();
            }
        };

        parse_remotes(&output)
    }

    /// Clone remote repository into target path.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError`] if Git fails to clone.
    #[instrument(skip(self), level = "debug")]
    pub fn clone_into(&self, url: &str, path: &Path) -> Result<(), SyscallError> {
        let command = CommandLine::new("git", [
            "clone".into(),
            url.into(),
            path.as_os_str().to_os_string(),
        ]);
        self.syscall.run(Some(path), &command).map(|_| ())
    }

    /// Pull updates for all remotes of working tree at target root.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError`] if Git fails to pull.
    #[instrument(skip(self), level = "debug")]
    pub fn pull(&self, root: &Path) -> Result<String, SyscallError> {
        self.syscall.run_line(Some(root), "git pull --all")
    }
}

fn parse_remotes(output: &str) -> RemoteSet {
    let mut remotes = RemoteSet::new();
    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        if let (Some(name), Some(url)) = (tokens.next(), tokens.next()) {
            debug!("remote {name} -> {url}");
            remotes.insert(name.to_owned(), url.to_owned());
        }
    }

    remotes
}
