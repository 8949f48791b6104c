// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installation detection and initialization.
//!
//! Before any adapter can be installed, dotlink must figure out where its
//! __managed root__ lives, i.e., the directory that houses the `adapters/`
//! tree. This module provides the state machine that answers "am I installed,
//! and where?".
//!
//! # Install Modes
//!
//! A managed root is recognized in one of two styles:
//!
//! 1. __Version controlled__: a Git working tree with at least one remote
//!    whose URL matches the [`Origin`] pattern. Working trees that do not
//!    have such a remote are considered _foreign_, and are always rejected no
//!    matter what they contain.
//! 2. __Unpacked__: a plain directory tree without Git metadata that contains
//!    the [`UNPACKED_MARKER`] file.
//!
//! # Detection Order
//!
//! Candidates are evaluated in a fixed order, and the first match wins:
//!
//! 1. Explicit root override, if any.
//! 2. Directory of the running executable, or its closest ancestor holding
//!    the [`UNPACKED_MARKER`].
//! 3. Well-known guesses in [`GUESSES`].

use crate::{
    path::ManagedPath,
    syscall::{Shell, Syscall, SyscallError},
    vcs::GitProbe,
};

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Canonical remote URL to clone fresh installs from.
pub const ORIGIN_URL: &str = "https://github.com/hazelmollusk/dot";

/// Pattern that remote URLs of valid installs must match.
pub const ORIGIN_PATTERN: &str = r"/dot(\.git)?$";

/// Well-known install locations, checked last.
pub const GUESSES: [&str; 2] = ["/usr/share/dot", "~/.dot/dot"];

/// Relative file whose presence marks an unpacked install.
pub const UNPACKED_MARKER: &str = "src/install.rs";

/// Directory name under caller's base directory used for fresh installs.
pub const DEFAULT_INSTALL_DIR: &str = "dot";

/// Recognized install styles.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstallMode {
    /// Nothing detected yet, or last detection failed.
    #[default]
    Unset,

    /// Git working tree cloned from origin.
    VersionControlled,

    /// Plain unpacked source tree.
    Unpacked,
}

/// Result of install detection.
///
/// # Invariant
///
/// - Mode is [`InstallMode::Unset`] if and only if root is unset.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct InstallState {
    mode: InstallMode,
    root: ManagedPath,
}

impl InstallState {
    /// Current install mode.
    pub fn mode(&self) -> InstallMode {
        self.mode
    }

    /// Current managed root, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_path()
    }

    // INVARIANT: Roots come from the file system, never from user input, so
    // they are stored without expansion.
    fn resolve(&mut self, mode: InstallMode, root: impl Into<PathBuf>) -> bool {
        self.root.set_resolved(root);
        self.mode = mode;
        true
    }

    fn reset(&mut self) {
        self.mode = InstallMode::Unset;
        self.root.clear();
    }
}

/// Canonical origin of managed root repository.
#[derive(Debug, Clone)]
pub struct Origin {
    url: String,
    pattern: Regex,
}

impl Origin {
    /// Construct new origin from clone URL and remote matching pattern.
    ///
    /// # Errors
    ///
    /// - Return [`regex::Error`] if pattern is not a valid regular expression.
    pub fn new(url: impl Into<String>, pattern: impl AsRef<str>) -> Result<Self, regex::Error> {
        Ok(Self {
            url: url.into(),
            pattern: Regex::new(pattern.as_ref())?,
        })
    }

    /// URL to clone from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check if remote URL identifies this origin.
    pub fn matches(&self, url: impl AsRef<str>) -> bool {
        self.pattern.is_match(url.as_ref())
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new(ORIGIN_URL, ORIGIN_PATTERN).expect("origin pattern is a valid regex")
    }
}

/// Install resolver.
///
/// Owns the [`InstallState`] of the process. Nothing else mutates it.
#[derive(Debug, Clone)]
pub struct Install<S = Shell>
where
    S: Syscall,
{
    probe: GitProbe<S>,
    origin: Origin,
    state: InstallState,
    explicit: ManagedPath,
    base: PathBuf,
    run_path: Option<PathBuf>,
    guesses: Vec<PathBuf>,
}

impl<S> Install<S>
where
    S: Syscall,
{
    /// Construct new install resolver.
    ///
    /// The `base` directory is where fresh installs go by default, i.e.,
    /// `base/dot`. Well-known guesses are expanded once here. Guesses that
    /// fail expansion are skipped with a warning.
    pub fn new(base: impl Into<PathBuf>, probe: GitProbe<S>) -> Self {
        let run_path = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(run_root));
        if run_path.is_none() {
            warn!("could not detect path of running executable");
        }

        let guesses = GUESSES
            .iter()
            .filter_map(|guess| match ManagedPath::new(guess) {
                Ok(path) => path.as_path().map(Path::to_path_buf),
                Err(err) => {
                    warn!("skip guess {guess:?}: {err}");
                    None
                }
            })
            .collect();

        Self {
            probe,
            origin: Origin::default(),
            state: InstallState::default(),
            explicit: ManagedPath::unset(),
            base: base.into(),
            run_path,
            guesses,
        }
    }

    /// Use different canonical origin.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Replace well-known guesses.
    pub fn with_guesses(mut self, guesses: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.guesses = guesses.into_iter().map(Into::into).collect();
        self
    }

    /// Replace directory of running executable.
    pub fn with_run_path(mut self, run_path: Option<PathBuf>) -> Self {
        self.run_path = run_path;
        self
    }

    /// Set explicit root override that takes priority over every guess.
    pub fn set_explicit(&mut self, explicit: ManagedPath) {
        self.explicit = explicit;
    }

    /// Current install state.
    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// Canonical origin in use.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Ordered candidate listing for detection.
    pub fn candidates(&self, explicit: Option<&Path>) -> Vec<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(self.run_path.clone())
            .chain(self.guesses.iter().cloned())
            .collect()
    }

    /// Detect valid install.
    ///
    /// Evaluates each candidate in order through [`Install::guess`], stopping
    /// at the first success. Resets state to unset if nothing matches.
    #[instrument(skip(self), level = "debug")]
    pub fn detect(&mut self, explicit: Option<&Path>) -> bool {
        for candidate in self.candidates(explicit) {
            if self.guess(&candidate) {
                return true;
            }
        }

        debug!("no valid install detected");
        self.state.reset();
        false
    }

    /// Classify one candidate path.
    ///
    /// Git working trees take precedence over the unpacked marker, so a
    /// foreign working tree is rejected even if it contains the marker.
    #[instrument(skip(self), level = "debug")]
    pub fn guess(&mut self, path: &Path) -> bool {
        if let Some(root) = self.probe.root_of(path) {
            debug!("git repository at {}", root.display());
            let remotes = self.probe.remotes_of(Some(&root));
            if let Some((name, url)) = remotes.iter().find(|(_, url)| self.origin.matches(url)) {
                info!("found install at {} through remote {name} -> {url}", root.display());
                return self.state.resolve(InstallMode::VersionControlled, root);
            }

            warn!("{} is inside a foreign git repository", path.display());
            return false;
        }

        if path.join(UNPACKED_MARKER).exists() {
            info!("found unpacked install at {}", path.display());
            return self.state.resolve(InstallMode::Unpacked, path);
        }

        false
    }

    /// Create fresh install.
    ///
    /// Installs to `path`, or `base/dot` if no path is given. Does nothing if
    /// a valid install already exists there. Only
    /// [`InstallMode::VersionControlled`] is supported, which clones the
    /// canonical origin into target path.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Unimplemented`] for any other install mode.
    /// - Return [`InstallError::NotDirectory`] if target path exists as
    ///   non-directory.
    /// - Return [`InstallError::CreateDir`] if target path cannot be created.
    /// - Return [`InstallError::Clone`] if Git fails to clone.
    /// - Return [`InstallError::Rejected`] if cloned tree is not recognized as
    ///   a valid install.
    #[instrument(skip(self), level = "debug")]
    pub fn initialize(&mut self, path: Option<&Path>, mode: InstallMode) -> Result<()> {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => self.base.join(DEFAULT_INSTALL_DIR),
        };

        if self.guess(&target) {
            info!("already installed at {}", target.display());
            return Ok(());
        }

        if mode != InstallMode::VersionControlled {
            return Err(InstallError::Unimplemented(mode));
        }

        ensure_dir(&target)?;
        self.clone_origin(&target)?;

        if !self.guess(&target) {
            return Err(InstallError::Rejected { path: target });
        }

        Ok(())
    }

    /// Check for valid install.
    ///
    /// Always probes the file system again using explicit root override.
    pub fn is_valid(&mut self) -> bool {
        let explicit = self.explicit.as_path().map(Path::to_path_buf);
        self.detect(explicit.as_deref())
    }

    /// Pull latest changes into version controlled install.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::NotInstalled`] if no valid install exists.
    /// - Return [`InstallError::NotVersionControlled`] for unpacked installs.
    /// - Return [`InstallError::Pull`] if Git fails to pull.
    #[instrument(skip(self), level = "debug")]
    pub fn update(&mut self) -> Result<String> {
        if !self.is_valid() {
            return Err(InstallError::NotInstalled);
        }

        let root = self
            .state
            .root()
            .map(Path::to_path_buf)
            .ok_or(InstallError::NotInstalled)?;
        if self.state.mode() != InstallMode::VersionControlled {
            return Err(InstallError::NotVersionControlled { root });
        }

        info!("pull updates into {}", root.display());
        self.probe
            .pull(&root)
            .map_err(|err| InstallError::Pull { source: err, root })
    }

    fn clone_origin(&self, target: &Path) -> Result<()> {
        let url = self.origin.url();
        info!("clone {url} into {}", target.display());

        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {elapsed_precise:.green}  {msg}",
        )?);
        bar.set_message(format!("cloning {url}"));
        bar.enable_steady_tick(Duration::from_millis(100));
        let result = self.probe.clone_into(url, target);
        bar.finish_and_clear();

        result.map_err(|err| InstallError::Clone {
            source: err,
            url: url.to_owned(),
            path: target.to_path_buf(),
        })
    }
}

/// Candidate root for directory of running executable.
///
/// Binaries built inside an unpacked tree live under `target/<profile>`, so
/// the closest ancestor holding [`UNPACKED_MARKER`] is preferred. Falls back
/// to the directory itself.
pub fn run_root(exe_dir: &Path) -> PathBuf {
    exe_dir
        .ancestors()
        .find(|dir| dir.join(UNPACKED_MARKER).is_file())
        .unwrap_or(exe_dir)
        .to_path_buf()
}

fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(InstallError::NotDirectory {
                path: path.to_path_buf(),
            });
        }

        return Ok(());
    }

    debug!("create directory {}", path.display());
    mkdirp::mkdirp(path).map_err(|err| InstallError::CreateDir {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Install detection and initialization error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Install target exists, but is not a directory.
    #[error("install target {:?} is not a directory", path.display())]
    NotDirectory { path: PathBuf },

    /// Install target directory cannot be created.
    #[error("failed to create install directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Git fails to clone origin.
    #[error("failed to clone {url:?} into {:?}", path.display())]
    Clone {
        #[source]
        source: SyscallError,
        url: String,
        path: PathBuf,
    },

    /// Git fails to pull updates.
    #[error("failed to pull updates into {:?}", root.display())]
    Pull {
        #[source]
        source: SyscallError,
        root: PathBuf,
    },

    /// Requested install mode has no initialization logic.
    #[error("cannot initialize install in {0:?} mode")]
    Unimplemented(InstallMode),

    /// Freshly initialized tree still is not a valid install.
    #[error("{:?} is not a valid install after initialization", path.display())]
    Rejected { path: PathBuf },

    /// No valid install could be detected.
    #[error("no valid install detected")]
    NotInstalled,

    /// Operation requires a version controlled install.
    #[error("install at {:?} is not version controlled", root.display())]
    NotVersionControlled { root: PathBuf },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::{CommandLine, Result as SyscallResult};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, collections::HashMap, fs};

    /// Stand-in for the Git binary.
    ///
    /// Remote listings are keyed by working directory. Cloning fabricates Git
    /// metadata at the target, and registers the cloned URL as its origin.
    #[derive(Default)]
    struct FakeGit {
        remotes: RefCell<HashMap<PathBuf, String>>,
        calls: RefCell<Vec<String>>,
        fail_clone: bool,
    }

    impl FakeGit {
        fn add_repo(&self, root: &Path, url: &str) {
            fs::create_dir_all(root.join(".git")).unwrap();
            fs::write(root.join(".git").join("config"), "").unwrap();
            self.remotes
                .borrow_mut()
                .insert(root.to_path_buf(), format!("origin\t{url} (fetch)\n"));
        }

        fn count(&self, subcommand: &str) -> usize {
            let prefix = format!("git {subcommand}");
            self.calls
                .borrow()
                .iter()
                .filter(|call| call.starts_with(&prefix))
                .count()
        }
    }

    impl Syscall for FakeGit {
        fn run(&self, cwd: Option<&Path>, command: &CommandLine) -> SyscallResult<String> {
            self.calls.borrow_mut().push(command.to_string());
            let args = command
                .args()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            let failure = SyscallError::Status {
                program: "git".into(),
                code: Some(128),
            };

            match args.first().map(String::as_str) {
                Some("remote") => cwd
                    .and_then(|cwd| self.remotes.borrow().get(cwd).cloned())
                    .ok_or(failure),
                Some("clone") if !self.fail_clone => {
                    self.add_repo(Path::new(&args[2]), &args[1]);
                    Ok(String::new())
                }
                Some("pull") => Ok("Already up to date.\n".into()),
                _ => Err(failure),
            }
        }
    }

    fn resolver(git: &FakeGit) -> anyhow::Result<Install<&FakeGit>> {
        let base = std::env::current_dir()?;
        Ok(Install::new(base, GitProbe::new(git))
            .with_origin(Origin::new("https://example.org/dot.git", ORIGIN_PATTERN)?)
            .with_run_path(None)
            .with_guesses(Vec::<PathBuf>::new()))
    }

    #[test]
    fn origin_pattern_matching() {
        let origin = Origin::default();
        assert!(origin.matches("https://github.com/hazelmollusk/dot"));
        assert!(origin.matches("git@github.com:hazelmollusk/dot.git"));
        assert!(!origin.matches("https://github.com/someone/dotfiles"));
        assert!(!origin.matches("https://github.com/someone/dot.gitx"));
    }

    #[sealed_test]
    fn guess_version_controlled_install() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let root = std::env::current_dir()?.join("dot");
        git.add_repo(&root, "https://github.com/hazelmollusk/dot.git");
        fs::create_dir_all(root.join("adapters").join("bash"))?;

        let mut install = resolver(&git)?;
        assert!(install.guess(&root.join("adapters").join("bash")));
        assert_eq!(install.state().mode(), InstallMode::VersionControlled);
        assert_eq!(install.state().root(), Some(root.as_path()));

        Ok(())
    }

    #[sealed_test]
    fn guess_rejects_foreign_repository() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let root = std::env::current_dir()?.join("foreign");
        git.add_repo(&root, "https://github.com/someone/dotfiles.git");
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join(UNPACKED_MARKER), "")?;

        let mut install = resolver(&git)?;
        assert!(!install.guess(&root));
        assert_eq!(install.state(), &InstallState::default());

        Ok(())
    }

    #[sealed_test]
    fn guess_unpacked_install() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let root = std::env::current_dir()?.join("unpacked");
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join(UNPACKED_MARKER), "")?;

        let mut install = resolver(&git)?;
        assert!(install.guess(&root));
        assert_eq!(install.state().mode(), InstallMode::Unpacked);
        assert_eq!(install.state().root(), Some(root.as_path()));
        assert_eq!(git.count("remote"), 0);

        Ok(())
    }

    #[sealed_test(env = [("DOTLINK_ELSEWHERE", "ELSEWHERE")])]
    fn guess_keeps_dollar_in_root_verbatim() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let cwd = std::env::current_dir()?;
        let undefined = cwd.join("a$DOTLINK_SURELY_UNDEFINED_VAR").join("dot");
        let defined = cwd.join("b$DOTLINK_ELSEWHERE").join("dot");
        for root in [&undefined, &defined] {
            fs::create_dir_all(root.join("src"))?;
            fs::write(root.join(UNPACKED_MARKER), "")?;
        }

        let mut install = resolver(&git)?;
        assert!(install.guess(&undefined));
        assert_eq!(install.state().root(), Some(undefined.as_path()));

        assert!(install.guess(&defined));
        assert_eq!(install.state().root(), Some(defined.as_path()));

        install.set_explicit(ManagedPath::resolved(&defined));
        assert!(install.is_valid());
        assert_eq!(install.state().root(), Some(defined.as_path()));

        Ok(())
    }

    #[sealed_test]
    fn detect_first_match_wins() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let cwd = std::env::current_dir()?;
        let explicit = cwd.join("explicit");
        let run_path = cwd.join("run");
        let guess = cwd.join("guess");
        for path in [&explicit, &run_path, &guess] {
            fs::create_dir_all(path.join("src"))?;
            fs::write(path.join(UNPACKED_MARKER), "")?;
        }

        let mut install = resolver(&git)?
            .with_run_path(Some(run_path.clone()))
            .with_guesses([guess.clone()]);
        assert_eq!(
            install.candidates(Some(&explicit)),
            vec![explicit.clone(), run_path.clone(), guess.clone()]
        );

        assert!(install.detect(Some(&explicit)));
        assert_eq!(install.state().root(), Some(explicit.as_path()));

        assert!(install.detect(None));
        assert_eq!(install.state().root(), Some(run_path.as_path()));
        let first = install.state().clone();
        assert!(install.detect(None));
        assert_eq!(install.state(), &first);

        Ok(())
    }

    #[sealed_test]
    fn run_root_climbs_out_of_build_directory() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let build = cwd.join("target").join("debug");
        fs::create_dir_all(&build)?;
        assert_eq!(run_root(&build), build);

        fs::create_dir_all(cwd.join("src"))?;
        fs::write(cwd.join(UNPACKED_MARKER), "")?;
        assert_eq!(run_root(&build), cwd);

        let git = FakeGit::default();
        let mut install = resolver(&git)?.with_run_path(Some(run_root(&build)));
        assert!(install.detect(None));
        assert_eq!(install.state().mode(), InstallMode::Unpacked);
        assert_eq!(install.state().root(), Some(cwd.as_path()));

        Ok(())
    }

    #[sealed_test]
    fn detect_failure_resets_state() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let root = std::env::current_dir()?.join("dot");
        git.add_repo(&root, "https://github.com/hazelmollusk/dot");

        let mut install = resolver(&git)?;
        install.set_explicit(ManagedPath::new(&root)?);
        assert!(install.is_valid());
        assert_eq!(install.state().mode(), InstallMode::VersionControlled);

        fs::remove_dir_all(&root)?;
        assert!(!install.is_valid());
        assert_eq!(install.state(), &InstallState::default());

        Ok(())
    }

    #[sealed_test]
    fn initialize_clones_into_default_target() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let target = std::env::current_dir()?.join(DEFAULT_INSTALL_DIR);

        let mut install = resolver(&git)?;
        install.initialize(None, InstallMode::VersionControlled)?;
        assert!(target.is_dir());
        assert_eq!(install.state().mode(), InstallMode::VersionControlled);
        assert_eq!(install.state().root(), Some(target.as_path()));
        assert_eq!(git.count("clone https://example.org/dot.git"), 1);

        // Never clone over a valid install.
        install.initialize(None, InstallMode::VersionControlled)?;
        assert_eq!(git.count("clone"), 1);

        Ok(())
    }

    #[sealed_test]
    fn initialize_rejects_non_directory_target() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let target = std::env::current_dir()?.join("blocker");
        fs::write(&target, "not a directory")?;

        let mut install = resolver(&git)?;
        let result = install.initialize(Some(&target), InstallMode::VersionControlled);
        assert!(matches!(result, Err(InstallError::NotDirectory { .. })));
        assert_eq!(git.count("clone"), 0);

        Ok(())
    }

    #[sealed_test]
    fn initialize_unimplemented_mode_fails() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let mut install = resolver(&git)?;
        let result = install.initialize(None, InstallMode::Unpacked);
        assert!(matches!(
            result,
            Err(InstallError::Unimplemented(InstallMode::Unpacked))
        ));

        Ok(())
    }

    #[sealed_test]
    fn initialize_reports_clone_failure() -> anyhow::Result<()> {
        let git = FakeGit {
            fail_clone: true,
            ..Default::default()
        };
        let mut install = resolver(&git)?;
        let result = install.initialize(None, InstallMode::VersionControlled);
        assert!(matches!(result, Err(InstallError::Clone { .. })));
        assert_eq!(install.state().mode(), InstallMode::Unset);

        Ok(())
    }

    #[sealed_test]
    fn update_requires_version_control() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let cwd = std::env::current_dir()?;
        let unpacked = cwd.join("unpacked");
        fs::create_dir_all(unpacked.join("src"))?;
        fs::write(unpacked.join(UNPACKED_MARKER), "")?;

        let mut install = resolver(&git)?;
        assert!(matches!(install.update(), Err(InstallError::NotInstalled)));

        install.set_explicit(ManagedPath::new(&unpacked)?);
        assert!(matches!(
            install.update(),
            Err(InstallError::NotVersionControlled { .. })
        ));

        let root = cwd.join("dot");
        git.add_repo(&root, "https://github.com/hazelmollusk/dot");
        install.set_explicit(ManagedPath::new(&root)?);
        assert_eq!(install.update()?, "Already up to date.\n");
        assert_eq!(git.count("pull --all"), 1);

        Ok(())
    }
}
