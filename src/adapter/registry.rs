// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Adapter registry.
//!
//! Every adapter dotlink knows about is registered here by name along with a
//! factory that produces its [`AdapterDeclaration`]. The registry is filled
//! once at startup. There is no discovery of adapters at runtime.

use crate::adapter::AdapterDeclaration;

use tracing::warn;

/// Factory producing a fresh adapter declaration.
pub type AdapterFactory = fn() -> AdapterDeclaration;

/// Adapters shipped with dotlink.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Builtin {
    Bash,
    Git,
    Vim,
}

impl Builtin {
    /// Every builtin adapter in registration order.
    pub const ALL: [Builtin; 3] = [Builtin::Bash, Builtin::Git, Builtin::Vim];

    /// Unique adapter name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Git => "git",
            Self::Vim => "vim",
        }
    }

    /// Files to link into home directory.
    pub fn links(self) -> &'static [&'static str] {
        match self {
            Self::Bash => &["bashrc", "bash_profile", "bash_aliases"],
            Self::Git => &["gitconfig", "gitignore_global"],
            Self::Vim => &["vimrc"],
        }
    }

    /// Directories that must exist in adapter directory before linking.
    pub fn user_dirs(self) -> &'static [&'static str] {
        match self {
            Self::Bash | Self::Git => &[],
            Self::Vim => &["undo", "swap"],
        }
    }

    /// Build declaration of this adapter.
    pub fn declaration(self) -> AdapterDeclaration {
        AdapterDeclaration::new(
            self.name(),
            self.links().iter().copied(),
            self.user_dirs().iter().copied(),
        )
    }
}

/// Explicit mapping of adapter name to factory.
///
/// # Invariant
///
/// - Adapter names are unique.
/// - Registration order is preserved.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: Vec<(String, AdapterFactory)>,
}

impl Registry {
    /// Construct empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct registry holding every builtin adapter.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Builtin::Bash.name(), || Builtin::Bash.declaration());
        registry.register(Builtin::Git.name(), || Builtin::Git.declaration());
        registry.register(Builtin::Vim.name(), || Builtin::Vim.declaration());
        registry
    }

    /// Register adapter factory under name.
    ///
    /// Replaces any factory previously registered under the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: AdapterFactory) {
        let name = name.into();
        match self.entries.iter_mut().find(|(entry, _)| *entry == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    /// Names of registered adapters in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Construct declaration of adapter by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<AdapterDeclaration> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name.as_ref())
            .map(|(_, factory)| factory())
    }

    /// Construct declarations of selected adapters.
    ///
    /// Keeps registration order. No selection means every registered adapter.
    /// Selected names that are not registered are skipped with a warning.
    pub fn select(&self, selection: Option<&[String]>) -> Vec<AdapterDeclaration> {
        let Some(selection) = selection else {
            return self.entries.iter().map(|(_, factory)| factory()).collect();
        };

        for name in selection {
            if self.get(name).is_none() {
                warn!("unknown adapter {name:?} in selection");
            }
        }

        self.entries
            .iter()
            .filter(|(name, _)| selection.contains(name))
            .map(|(_, factory)| factory())
            .collect()
    }
}
