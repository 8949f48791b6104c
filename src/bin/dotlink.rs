// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotlink::{menu, Dot, DotOptions, ManagedPath};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotlink [options] <dotlink-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Enable debug logging, and report errors in full detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to managed root installation.
    #[arg(short, long, global = true, value_name = "path")]
    pub root: Option<PathBuf>,

    /// Path to user configuration directory.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let mut options = DotOptions::default();
        if let Some(config) = self.config {
            options.config_dir = ManagedPath::new(config)?;
        }
        if let Some(root) = self.root {
            options.root = ManagedPath::new(root)?;
        }

        let mut dot = Dot::open(options)?;
        match self.command {
            Command::Install => run_install(&mut dot),
            Command::Update => run_update(&mut dot),
            Command::List => run_list(&mut dot),
            Command::Menu => run_menu(&mut dot),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install selected adapters, cloning managed root if needed.
    #[command(override_usage = "dotlink install [options]")]
    Install,

    /// Pull latest changes into managed root.
    #[command(override_usage = "dotlink update [options]")]
    Update,

    /// List known adapters, and show which are selected.
    #[command(override_usage = "dotlink list [options]")]
    List,

    /// Open interactive menu.
    #[command(override_usage = "dotlink menu [options]")]
    Menu,
}

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap()
    };
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        if verbose {
            error!("{error:?}");
        } else {
            error!("{error:#}");
        }
        exit(1);
    }

    exit(0)
}

fn run_install(dot: &mut Dot) -> Result<()> {
    let report = dot.install()?;
    let failed = report.failures().map(|failure| failure.name.as_str()).collect::<Vec<_>>();
    if !failed.is_empty() {
        bail!("failed to install adapters: {}", failed.join(", "));
    }

    info!("installed {} adapters", report.adapters.len());
    Ok(())
}

fn run_update(dot: &mut Dot) -> Result<()> {
    let output = dot.update()?;
    info!("{}", output.trim_end());
    Ok(())
}

fn run_list(dot: &mut Dot) -> Result<()> {
    if dot.is_installed() {
        let state = dot.install_state();
        if let Some(root) = state.root() {
            println!("managed root: {} ({:?})", root.display(), state.mode());
        }
    } else {
        println!("managed root: not installed");
    }

    let selected = dot
        .selected_adapters()
        .iter()
        .map(|adapter| adapter.name().to_owned())
        .collect::<Vec<_>>();
    for name in dot.registry().names() {
        let mark = if selected.iter().any(|entry| entry == name) { "x" } else { " " };
        let links = dot
            .registry()
            .get(name)
            .map(|adapter| adapter.links().join(", "))
            .unwrap_or_default();
        println!("[{mark}] {name:<8} {links}");
    }

    Ok(())
}

fn run_menu(dot: &mut Dot) -> Result<()> {
    Ok(menu::run(dot)?)
}
