// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Adapter link installation.
//!
//! An __adapter__ is a named bundle of configuration files for one target
//! application, e.g., a shell. Its files live in the managed root at
//! `adapters/<name>/`, and are symlinked into the user's home directory
//! following dotfile convention, i.e., `adapters/bash/bashrc` becomes
//! `~/.bashrc`.
//!
//! # Installation Protocol
//!
//! For each link of an adapter:
//!
//! 1. Missing source? Warn, and move on to the next link.
//! 2. Destination already resolves to source? Nothing to do.
//! 3. Destination exists otherwise? Back it up through [`backup::backup`].
//! 4. Create destination as symlink to source.
//!
//! Directories an adapter needs, e.g., for editor swap files, are created
//! inside its own directory in the managed root before any link is installed.
//!
//! Re-running installation on an unmodified file system never mutates
//! anything. Concurrent modification of the home directory during a run is
//! not guarded against.

pub mod backup;
pub mod registry;

use crate::adapter::backup::{Backup, BackupError};

use std::{
    collections::BTreeSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Directory of managed root housing every adapter.
pub const ADAPTERS_DIR: &str = "adapters";

/// Static declaration of an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDeclaration {
    name: String,
    links: Vec<String>,
    user_dirs: BTreeSet<String>,
}

impl AdapterDeclaration {
    /// Construct new adapter declaration.
    pub fn new(
        name: impl Into<String>,
        links: impl IntoIterator<Item = impl Into<String>>,
        user_dirs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            links: links.into_iter().map(Into::into).collect(),
            user_dirs: user_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Unique adapter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered relative file names to link.
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Relative directories required in adapter directory.
    pub fn user_dirs(&self) -> &BTreeSet<String> {
        &self.user_dirs
    }
}

/// Outcome of installing one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Destination already pointed at source.
    AlreadyLinked,

    /// Destination was absent, and is now linked.
    Installed,

    /// Destination was moved to backup path, and is now linked.
    BackedUp { backup: PathBuf },

    /// Source does not exist in managed root, so nothing was linked.
    SourceMissing,
}

/// Install adapters relative to a managed root and home directory.
///
/// Only reads the resolved managed root. Never touches install state.
#[derive(Debug, Clone, Copy)]
pub struct AdapterLinker<'a> {
    root: &'a Path,
    home: &'a Path,
}

impl<'a> AdapterLinker<'a> {
    /// Construct new adapter linker.
    pub fn new(root: &'a Path, home: &'a Path) -> Self {
        Self { root, home }
    }

    /// Directory holding files of target adapter.
    pub fn adapter_dir(&self, adapter: &AdapterDeclaration) -> PathBuf {
        self.root.join(ADAPTERS_DIR).join(adapter.name())
    }

    /// Install every link of adapter.
    ///
    /// Creates required user directories first. A missing source only skips
    /// its own link.
    ///
    /// # Errors
    ///
    /// - Return [`AdapterError`] on the first link that cannot be installed.
    ///   Links installed before that point are kept.
    #[instrument(skip(self, adapter), fields(adapter = adapter.name()), level = "debug")]
    pub fn install(&self, adapter: &AdapterDeclaration) -> Result<Vec<LinkOutcome>> {
        debug!("installing adapter {}", adapter.name());
        if self.ensure_user_dirs(adapter)? {
            info!("created user directories of {}", adapter.name());
        }

        let mut outcomes = Vec::with_capacity(adapter.links().len());
        for link in adapter.links() {
            outcomes.push(self.install_link(adapter, link)?);
        }

        Ok(outcomes)
    }

    /// Create user directories required by adapter.
    ///
    /// Directories are relative to the adapter's own directory in the managed
    /// root, so `undo` of adapter `vim` becomes `adapters/vim/undo`. Returns
    /// whether anything was created.
    ///
    /// # Errors
    ///
    /// - Return [`AdapterError::NotDirectory`] if path exists as non-directory.
    /// - Return [`AdapterError::CreateUserDir`] if directory cannot be created,
    ///   e.g., one of its parents is not a directory.
    pub fn ensure_user_dirs(&self, adapter: &AdapterDeclaration) -> Result<bool> {
        let adapter_dir = self.adapter_dir(adapter);
        let mut changed = false;
        for dir in adapter.user_dirs() {
            let path = adapter_dir.join(dir);
            if path.is_dir() {
                continue;
            }

            if fs::symlink_metadata(&path).is_ok() {
                return Err(AdapterError::NotDirectory { path });
            }

            debug!("create user directory {}", path.display());
            mkdirp::mkdirp(&path).map_err(|err| AdapterError::CreateUserDir {
                source: err,
                path: path.clone(),
            })?;
            changed = true;
        }

        Ok(changed)
    }

    /// Install one link of adapter.
    ///
    /// # Errors
    ///
    /// - Return [`AdapterError::Inspect`] if destination cannot be inspected.
    /// - Return [`AdapterError::Backup`] if destination cannot be backed up.
    /// - Return [`AdapterError::Symlink`] if symlink cannot be created.
    pub fn install_link(&self, adapter: &AdapterDeclaration, link: &str) -> Result<LinkOutcome> {
        let src = self.adapter_dir(adapter).join(link);
        let dst = self.home.join(format!(".{link}"));

        if !src.exists() {
            warn!("install: link {}/{link} not found", adapter.name());
            return Ok(LinkOutcome::SourceMissing);
        }

        let outcome = match fs::symlink_metadata(&dst) {
            Ok(_) => {
                if is_same_entry(&src, &dst) {
                    debug!("install: {}/{link} already installed", adapter.name());
                    return Ok(LinkOutcome::AlreadyLinked);
                }

                debug!("install: destination {} exists", dst.display());
                match backup::backup(&dst)? {
                    Backup::Missing => LinkOutcome::Installed,
                    Backup::Moved(backup) | Backup::Deduplicated(backup) => {
                        LinkOutcome::BackedUp { backup }
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => LinkOutcome::Installed,
            Err(err) => {
                return Err(AdapterError::Inspect {
                    source: err,
                    path: dst,
                })
            }
        };

        info!("install: linking {} to {}", dst.display(), src.display());
        symlink(&src, &dst).map_err(|err| AdapterError::Symlink {
            source: err,
            src: src.clone(),
            dst: dst.clone(),
        })?;

        Ok(outcome)
    }
}

#[cfg(unix)]
fn is_same_entry(src: &Path, dst: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(src), fs::metadata(dst)) {
        (Ok(src), Ok(dst)) => src.dev() == dst.dev() && src.ino() == dst.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_entry(src: &Path, dst: &Path) -> bool {
    match (fs::canonicalize(src), fs::canonicalize(dst)) {
        (Ok(src), Ok(dst)) => src == dst,
        _ => false,
    }
}

#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Adapter installation error types.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Required user directory path exists, but is not a directory.
    #[error("user directory {:?} exists but is not a directory", path.display())]
    NotDirectory { path: PathBuf },

    /// Required user directory cannot be created.
    #[error("failed to create user directory {:?}", path.display())]
    CreateUserDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link destination cannot be inspected.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link destination cannot be moved out of the way.
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Symlink cannot be created.
    #[error("failed to link {:?} to {:?}", dst.display(), src.display())]
    Symlink {
        #[source]
        source: std::io::Error,
        src: PathBuf,
        dst: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = AdapterError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    struct Layout {
        root: PathBuf,
        home: PathBuf,
    }

    impl Layout {
        fn new() -> anyhow::Result<Self> {
            let cwd = std::env::current_dir()?;
            let layout = Self {
                root: cwd.join("dot"),
                home: cwd.join("home"),
            };
            fs::create_dir_all(&layout.home)?;
            Ok(layout)
        }

        fn linker(&self) -> AdapterLinker<'_> {
            AdapterLinker::new(&self.root, &self.home)
        }

        fn add_source(&self, adapter: &str, link: &str, contents: &str) -> anyhow::Result<()> {
            let dir = self.root.join(ADAPTERS_DIR).join(adapter);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(link), contents)?;
            Ok(())
        }

        fn home_listing(&self) -> anyhow::Result<Vec<String>> {
            let mut names = Vec::new();
            for entry in fs::read_dir(&self.home)? {
                names.push(entry?.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(names)
        }
    }

    fn bash(links: &[&str]) -> AdapterDeclaration {
        AdapterDeclaration::new("bash", links.iter().copied(), Vec::<String>::new())
    }

    #[sealed_test]
    fn install_link_from_scratch() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("bash", "bashrc", "set -o vi\n")?;

        let result = layout.linker().install_link(&bash(&["bashrc"]), "bashrc")?;
        assert_eq!(result, LinkOutcome::Installed);

        let dst = layout.home.join(".bashrc");
        assert_eq!(fs::read_link(&dst)?, layout.root.join("adapters/bash/bashrc"));
        assert_eq!(fs::read_to_string(&dst)?, "set -o vi\n");

        Ok(())
    }

    #[sealed_test]
    fn install_link_missing_source_is_not_fatal() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("bash", "bash_profile", "source ~/.bashrc\n")?;

        let result = layout.linker().install(&bash(&["bashrc", "bash_profile"]))?;
        assert_eq!(result, vec![LinkOutcome::SourceMissing, LinkOutcome::Installed]);
        assert_eq!(layout.home_listing()?, vec![".bash_profile"]);

        Ok(())
    }

    #[sealed_test]
    fn install_twice_is_idempotent() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("bash", "bashrc", "set -o vi\n")?;
        layout.add_source("bash", "bash_aliases", "alias g=git\n")?;
        let adapter = bash(&["bashrc", "bash_aliases"]);

        layout.linker().install(&adapter)?;
        let before = layout.home_listing()?;
        let result = layout.linker().install(&adapter)?;

        assert_eq!(result, vec![LinkOutcome::AlreadyLinked, LinkOutcome::AlreadyLinked]);
        assert_eq!(layout.home_listing()?, before);

        Ok(())
    }

    #[sealed_test]
    fn install_backs_up_stale_file() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("bash", "bashrc", "set -o vi\n")?;
        layout.add_source("bash", "bash_aliases", "alias g=git\n")?;
        fs::write(layout.home.join(".bashrc"), "stale\n")?;

        let result = layout.linker().install(&bash(&["bashrc", "bash_aliases"]))?;
        let backup = backup::backup_name(&layout.home.join(".bashrc"), {
            use sha2::{Digest, Sha256};
            format!("{:x}", Sha256::digest(b"stale\n"))[..backup::DIGEST_PREFIX_LEN].to_string()
        });
        assert_eq!(
            result,
            vec![
                LinkOutcome::BackedUp {
                    backup: backup.clone()
                },
                LinkOutcome::Installed
            ]
        );
        assert_eq!(fs::read_to_string(&backup)?, "stale\n");
        assert_eq!(fs::read_to_string(layout.home.join(".bashrc"))?, "set -o vi\n");
        assert_eq!(fs::read_to_string(layout.home.join(".bash_aliases"))?, "alias g=git\n");

        Ok(())
    }

    #[sealed_test]
    fn install_replaces_dangling_symlink() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("bash", "bashrc", "set -o vi\n")?;
        std::os::unix::fs::symlink(layout.root.join("moved-away"), layout.home.join(".bashrc"))?;

        let result = layout.linker().install_link(&bash(&["bashrc"]), "bashrc")?;
        assert!(matches!(result, LinkOutcome::BackedUp { .. }));
        assert_eq!(fs::read_to_string(layout.home.join(".bashrc"))?, "set -o vi\n");

        Ok(())
    }

    #[sealed_test]
    fn install_link_recognizes_hard_link() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("bash", "bashrc", "set -o vi\n")?;
        fs::hard_link(
            layout.root.join("adapters/bash/bashrc"),
            layout.home.join(".bashrc"),
        )?;

        let result = layout.linker().install_link(&bash(&["bashrc"]), "bashrc")?;
        assert_eq!(result, LinkOutcome::AlreadyLinked);
        assert_eq!(layout.home_listing()?, vec![".bashrc"]);

        Ok(())
    }

    #[sealed_test]
    fn install_link_fails_without_destination_parent() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        let src = layout.root.join("adapters/nvim/config/nvim");
        fs::create_dir_all(&src)?;
        fs::write(src.join("init.vim"), "set number\n")?;
        let adapter =
            AdapterDeclaration::new("nvim", ["config/nvim/init.vim"], Vec::<String>::new());

        let result = layout.linker().install(&adapter);
        assert!(matches!(result, Err(AdapterError::Symlink { .. })));
        assert!(layout.home_listing()?.is_empty());

        Ok(())
    }

    #[sealed_test]
    fn ensure_user_dirs_creates_once() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        let adapter = AdapterDeclaration::new("vim", ["vimrc"], ["undo", "swap"]);

        assert!(layout.linker().ensure_user_dirs(&adapter)?);
        assert!(layout.root.join("adapters/vim/undo").is_dir());
        assert!(layout.root.join("adapters/vim/swap").is_dir());
        assert!(layout.home_listing()?.is_empty());
        assert!(!layout.linker().ensure_user_dirs(&adapter)?);
        assert!(!layout.linker().ensure_user_dirs(&bash(&["bashrc"]))?);

        Ok(())
    }

    #[sealed_test]
    fn ensure_user_dirs_refuses_non_directory() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("vim", "undo", "")?;
        let adapter = AdapterDeclaration::new("vim", ["vimrc"], ["undo"]);

        let result = layout.linker().install(&adapter);
        assert!(matches!(result, Err(AdapterError::NotDirectory { .. })));

        Ok(())
    }

    #[sealed_test]
    fn ensure_user_dirs_refuses_dangling_symlink() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        let dir = layout.root.join("adapters/vim");
        fs::create_dir_all(&dir)?;
        std::os::unix::fs::symlink(dir.join("gone"), dir.join("undo"))?;
        let adapter = AdapterDeclaration::new("vim", ["vimrc"], ["undo"]);

        let result = layout.linker().ensure_user_dirs(&adapter);
        assert!(matches!(result, Err(AdapterError::NotDirectory { .. })));

        Ok(())
    }

    #[sealed_test]
    fn ensure_user_dirs_fails_on_blocked_parent() -> anyhow::Result<()> {
        let layout = Layout::new()?;
        layout.add_source("vim", "state", "in the way")?;
        layout.add_source("vim", "vimrc", "set number\n")?;
        let adapter = AdapterDeclaration::new("vim", ["vimrc"], ["state/undo"]);

        let result = layout.linker().install(&adapter);
        assert!(matches!(result, Err(AdapterError::CreateUserDir { .. })));
        assert!(layout.home_listing()?.is_empty());

        Ok(())
    }
}
