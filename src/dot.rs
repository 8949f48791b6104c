// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Top-level orchestration.
//!
//! [`Dot`] ties everything together: it owns the loaded configuration and the
//! install resolver, establishes the managed root, and then installs each
//! selected adapter. Adapters are installed independently of one another, so
//! one broken adapter never prevents the rest from being installed.

use crate::{
    adapter::{registry::Registry, AdapterDeclaration, AdapterError, AdapterLinker, LinkOutcome},
    config::{ConfigError, DotConfig},
    install::{Install, InstallError, InstallMode, InstallState},
    path::{default_config_dir, home_dir, ManagedPath, PathError},
    syscall::{Shell, Syscall, DEFAULT_TIMEOUT},
    vcs::GitProbe,
};

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument};

/// Startup options, usually taken from the command line.
#[derive(Debug, Default, Clone)]
pub struct DotOptions {
    /// Configuration directory override.
    pub config_dir: ManagedPath,

    /// Managed root override.
    pub root: ManagedPath,
}

/// Dotlink orchestrator.
#[derive(Debug)]
pub struct Dot<S = Shell>
where
    S: Syscall,
{
    config_dir: PathBuf,
    config: DotConfig,
    home: PathBuf,
    install: Install<S>,
    registry: Registry,
}

impl Dot<Shell> {
    /// Open dotlink through startup options.
    ///
    /// Loads configuration once, and applies managed root override.
    ///
    /// # Errors
    ///
    /// - Return [`DotError::Path`] if home directory cannot be determined.
    /// - Return [`DotError::Config`] if configuration cannot be loaded.
    pub fn open(options: DotOptions) -> Result<Self> {
        let config_dir = match options.config_dir.as_path() {
            Some(path) => path.to_path_buf(),
            None => default_config_dir()?,
        };
        let config = DotConfig::load(&config_dir)?;
        let shell = Shell::new(config.timeout().unwrap_or(DEFAULT_TIMEOUT));
        let mut install = Install::new(&config_dir, GitProbe::new(shell));
        install.set_explicit(options.root);

        Ok(Self::new(config_dir, config, home_dir()?, install, Registry::builtin()))
    }
}

impl<S> Dot<S>
where
    S: Syscall,
{
    /// Construct new orchestrator from its parts.
    pub fn new(
        config_dir: impl Into<PathBuf>,
        config: DotConfig,
        home: impl Into<PathBuf>,
        install: Install<S>,
        registry: Registry,
    ) -> Self {
        Self {
            config_dir: config_dir.into(),
            config,
            home: home.into(),
            install,
            registry,
        }
    }

    pub fn config(&self) -> &DotConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn install_state(&self) -> &InstallState {
        self.install.state()
    }

    /// Check for valid install, probing the file system again.
    pub fn is_installed(&mut self) -> bool {
        self.install.is_valid()
    }

    /// Declarations of adapters selected by configuration.
    pub fn selected_adapters(&self) -> Vec<AdapterDeclaration> {
        self.registry.select(self.config.adapters.as_deref())
    }

    /// Install every selected adapter.
    ///
    /// Initializes a fresh install in the configuration directory if no valid
    /// install can be detected. Adapter failures are collected into the
    /// report instead of aborting the run.
    ///
    /// # Errors
    ///
    /// - Return [`DotError::Install`] if no managed root can be established.
    #[instrument(skip(self), level = "debug")]
    pub fn install(&mut self) -> Result<InstallReport> {
        if !self.install.is_valid() {
            info!("no valid install detected, initializing one");
            self.install.initialize(None, InstallMode::VersionControlled)?;
        }

        let root = self
            .install
            .state()
            .root()
            .map(Path::to_path_buf)
            .ok_or(InstallError::NotInstalled)?;
        debug!("managed root at {}", root.display());

        let linker = AdapterLinker::new(&root, &self.home);
        let mut report = InstallReport::default();
        for adapter in self.selected_adapters() {
            let result = linker.install(&adapter);
            match &result {
                Ok(outcomes) => log_outcomes(&adapter, outcomes),
                Err(err) => error!("adapter {} failed: {err}", adapter.name()),
            }

            report.adapters.push(AdapterReport {
                name: adapter.name().to_owned(),
                result,
            });
        }

        Ok(report)
    }

    /// Pull latest changes into managed root.
    ///
    /// # Errors
    ///
    /// - Return [`DotError::Install`] if install is missing, unpacked, or
    ///   Git fails to pull.
    pub fn update(&mut self) -> Result<String> {
        Ok(self.install.update()?)
    }

    /// Persist new adapter selection.
    ///
    /// # Errors
    ///
    /// - Return [`DotError::Config`] if configuration cannot be saved.
    pub fn select_adapters(
        &mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<PathBuf> {
        self.config.adapters = Some(names.into_iter().map(Into::into).collect());
        Ok(self.config.save(&self.config_dir)?)
    }
}

fn log_outcomes(adapter: &AdapterDeclaration, outcomes: &[LinkOutcome]) {
    for (link, outcome) in adapter.links().iter().zip(outcomes) {
        match outcome {
            LinkOutcome::AlreadyLinked => debug!("{}: .{link} already linked", adapter.name()),
            LinkOutcome::Installed => info!("{}: .{link} linked", adapter.name()),
            LinkOutcome::BackedUp { backup } => info!(
                "{}: .{link} linked, previous file kept at {}",
                adapter.name(),
                backup.display()
            ),
            LinkOutcome::SourceMissing => debug!("{}: .{link} skipped", adapter.name()),
        }
    }
}

/// Per-adapter result of an install run.
#[derive(Debug)]
pub struct AdapterReport {
    pub name: String,
    pub result: Result<Vec<LinkOutcome>, AdapterError>,
}

/// Result of an install run over every selected adapter.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub adapters: Vec<AdapterReport>,
}

impl InstallReport {
    /// Adapters that failed to install.
    pub fn failures(&self) -> impl Iterator<Item = &AdapterReport> {
        self.adapters.iter().filter(|report| report.result.is_err())
    }

    /// Check if every adapter was installed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Orchestration error types.
#[derive(Debug, thiserror::Error)]
pub enum DotError {
    /// Path resolution fails.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Configuration cannot be loaded or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Managed root cannot be established or updated.
    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Friendly result alias :3
pub type Result<T, E = DotError> = std::result::Result<T, E>;
