/*
 * nestri - A CLI tool to manage your cloud gaming service
 * Copyright (C) 2025 Nestri <contact@nestri.io>
 *
 * This program is free software; you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation; either version 2 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along
 * with this program; if not, write to the Free Software Foundation, Inc.,
 * 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.
 */

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod banner;
mod color;
mod config;
mod container;
mod error;
mod host;
mod process;
mod run;
mod session;
mod specs;
mod terminal;

#[cfg(test)]
mod testing;

use crate::config::YamlConfigStore;
use crate::container::BackendConfig;
use crate::host::{HostEnv, SystemHost};
use crate::process::{ProcessRunner, SystemRunner};
use crate::run::{RunOptions, RunWorkflow};

#[derive(Parser, Debug)]
#[command(
    name = "nestri",
    version,
    about = "A CLI tool to manage your cloud gaming service"
)]
struct Cli {
    /// Config file that remembers the last game
    #[arg(short, long, global = true, env = "NESTRI_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show important system information
    Neofetch,

    /// Run a game using nestri
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path of the game executable; defaults to the last game run
    #[arg(value_name = "GAME")]
    game: Option<String>,

    /// Specify GPU index
    #[arg(long, value_name = "INDEX")]
    gpu: Option<u32>,

    /// Enable HDR mode
    #[arg(long)]
    hdr: bool,

    /// Directory mounted into the backend (default: ~/game)
    #[arg(long, value_name = "DIR")]
    games_dir: Option<PathBuf>,

    /// Seconds to wait for the backend display server
    #[arg(long, value_name = "SECS", default_value_t = 900)]
    ready_timeout: u64,

    /// Seconds between readiness checks
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    poll_interval: u64,

    /// Call docker directly instead of through sudo
    #[arg(long)]
    no_sudo: bool,
}

impl RunArgs {
    fn into_options(self) -> RunOptions {
        RunOptions {
            game: self.game,
            gpu: self.gpu,
            hdr: self.hdr,
            games_dir: self.games_dir,
            backend: BackendConfig {
                poll_interval: Duration::from_secs(self.poll_interval.max(1)),
                ready_timeout: Duration::from_secs(self.ready_timeout),
                sudo: !self.no_sudo,
                ..BackendConfig::default()
            },
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("interrupt received");
                token.cancel();
            }
            Err(e) => warn!("unable to listen for Ctrl-C: {}", e),
        }
    });
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());
    let host = SystemHost;

    match command {
        Commands::Neofetch => {
            let mut stdout = std::io::stdout();
            banner::neofetch(runner, host.platform(), &mut stdout).await
        }
        Commands::Run(args) => {
            let store = YamlConfigStore::new(cli.config.unwrap_or_else(YamlConfigStore::default_path));
            debug!(path = %store.path().display(), "using config file");

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let options = args.into_options();
            let mut workflow = RunWorkflow::new(runner.as_ref(), &host, &store, std::io::stdout());
            workflow.execute(&options, &cancel).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // module errors already carry their cause in the message
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
