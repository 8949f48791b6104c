// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive menu.
//!
//! Thin presentation layer over [`Dot`]. Cancelling any prompt quits.

use crate::{
    dot::{Dot, DotError},
    syscall::Syscall,
};

use inquire::{InquireError, MultiSelect, Select};
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{error, info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Choice {
    Install,
    Configure,
    Update,
    Quit,
}

impl Choice {
    const ALL: [Choice; 4] = [Choice::Install, Choice::Configure, Choice::Update, Choice::Quit];
}

impl Display for Choice {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Install => "Install",
            Self::Configure => "Configure adapters",
            Self::Update => "Update",
            Self::Quit => "Quit",
        })
    }
}

/// Run interactive menu until user quits.
///
/// Failures of individual actions are logged, and the menu keeps going.
///
/// # Errors
///
/// - Return [`MenuError::Prompt`] if terminal prompt fails.
pub fn run<S: Syscall>(dot: &mut Dot<S>) -> Result<()> {
    loop {
        let choice = match Select::new("dotlink", Choice::ALL.to_vec()).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(())
            }
            Err(err) => return Err(err.into()),
        };

        let result = match choice {
            Choice::Install => install(dot),
            Choice::Configure => match configure(dot) {
                Err(MenuError::Prompt(InquireError::OperationCanceled)) => Ok(()),
                result => result,
            },
            Choice::Update => dot
                .update()
                .map(|output| info!("{}", output.trim_end()))
                .map_err(Into::into),
            Choice::Quit => return Ok(()),
        };

        match result {
            Err(MenuError::Dot(err)) => error!("{err}"),
            result => result?,
        }
    }
}

fn install<S: Syscall>(dot: &mut Dot<S>) -> Result<()> {
    let report = dot.install()?;
    for failure in report.failures() {
        warn!("adapter {} was not fully installed", failure.name);
    }
    info!(
        "installed {} of {} adapters",
        report.adapters.len() - report.failures().count(),
        report.adapters.len()
    );

    Ok(())
}

fn configure<S: Syscall>(dot: &mut Dot<S>) -> Result<()> {
    let names = dot.registry().names().map(str::to_owned).collect::<Vec<_>>();
    let selected = dot
        .selected_adapters()
        .iter()
        .map(|adapter| adapter.name().to_owned())
        .collect::<Vec<_>>();
    let defaults = names
        .iter()
        .enumerate()
        .filter(|(_, name)| selected.contains(name))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let chosen = MultiSelect::new("adapters to install", names)
        .with_default(&defaults)
        .prompt()?;
    let path = dot.select_adapters(chosen)?;
    info!("saved adapter selection to {}", path.display());

    Ok(())
}

/// Interactive menu error types.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// Terminal prompt fails.
    #[error(transparent)]
    Prompt(#[from] InquireError),

    /// Selected action fails.
    #[error(transparent)]
    Dot(#[from] DotError),
}

/// Friendly result alias :3
pub type Result<T, E = MenuError> = std::result::Result<T, E>;
