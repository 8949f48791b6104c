// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotlink: personal dotfile manager.
//!
//! Dotlink keeps dotfiles in a __managed root__, i.e., a Git clone (or plain
//! unpacked copy) of a dotfile repository whose `adapters/` directory groups
//! configuration files per application. Each __adapter__ is installed by
//! symlinking its files into the user's home directory, backing up whatever
//! stood in the way.
//!
//! Startup flows through [`install`] to figure out where the managed root is,
//! cloning a fresh one if needed, and then through [`adapter`] once per
//! selected adapter. The [`dot`] module glues the two together.

pub mod adapter;
pub mod config;
pub mod dot;
pub mod install;
pub mod menu;
pub mod path;
pub mod syscall;
pub mod vcs;

pub use adapter::{
    registry::Registry, AdapterDeclaration, AdapterError, AdapterLinker, LinkOutcome,
};
pub use config::DotConfig;
pub use dot::{Dot, DotError, DotOptions, InstallReport};
pub use install::{Install, InstallError, InstallMode, InstallState, Origin};
pub use path::ManagedPath;
pub use syscall::{CommandLine, Shell, Syscall, SyscallError};
pub use vcs::{GitProbe, RemoteSet};
