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

//! The streaming backend container, driven through the docker CLI.

use std::path::Path;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{NestriError, Result};
use crate::process::{CommandSpec, ProcessError, ProcessRunner};

pub const DEFAULT_CONTAINER_NAME: &str = "netris";
pub const DEFAULT_IMAGE: &str = "ghcr.io/netrisdotme/netris/server:nightly";
pub const GAME_LAUNCHER: &str = "netris-proton -pr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Absent,
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Create,
    Start,
}

impl ContainerState {
    /// What has to happen for the container to end up running.
    pub fn required_action(self) -> Option<ContainerAction> {
        match self {
            ContainerState::Absent => Some(ContainerAction::Create),
            ContainerState::Stopped => Some(ContainerAction::Start),
            ContainerState::Running => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub name: String,
    pub image: String,
    /// Directory listed inside the container to look for the marker.
    pub marker_dir: String,
    /// Entry whose presence in `marker_dir` means the display server is up.
    pub marker: String,
    pub startup_script: String,
    pub udp_port: u16,
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
    /// Prefix docker invocations with `sudo`.
    pub sudo: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONTAINER_NAME.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            marker_dir: "/tmp".to_string(),
            marker: ".X11-unix".to_string(),
            startup_script: "/etc/startup.sh".to_string(),
            udp_port: 8080,
            poll_interval: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(15 * 60),
            sudo: true,
        }
    }
}

impl BackendConfig {
    pub fn marker_path(&self) -> String {
        format!("{}/{}", self.marker_dir.trim_end_matches('/'), self.marker)
    }
}

pub struct Backend<'a> {
    runner: &'a dyn ProcessRunner,
    config: &'a BackendConfig,
}

impl<'a> Backend<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, config: &'a BackendConfig) -> Self {
        Self { runner, config }
    }

    fn docker<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.config.sudo {
            CommandSpec::new("sudo").arg("docker").args(args)
        } else {
            CommandSpec::new("docker").args(args)
        }
    }

    fn name_filter(&self) -> String {
        format!("name=^{}$", self.config.name)
    }

    async fn query_ids(&self, all: bool, context: &str) -> Result<String> {
        let flag = if all { "-aq" } else { "-q" };
        let filter = self.name_filter();
        let cmd = self.docker(["ps", flag, "-f", filter.as_str()]);
        let output = self
            .runner
            .output(&cmd)
            .await
            .and_then(|out| out.into_checked(&cmd))
            .map_err(|e| NestriError::process(context, e))?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn state(&self) -> Result<ContainerState> {
        let running = self
            .query_ids(false, "error checking running Docker container")
            .await?;
        if !running.is_empty() {
            return Ok(ContainerState::Running);
        }

        let existing = self
            .query_ids(true, "error checking for existing Docker container")
            .await?;
        if existing.is_empty() {
            Ok(ContainerState::Absent)
        } else {
            Ok(ContainerState::Stopped)
        }
    }

    pub fn create_command(&self, session_id: &str, mount_dir: &Path) -> CommandSpec {
        let config = self.config;
        self.docker([
            "run".to_string(),
            "-d".to_string(),
            "--gpus".to_string(),
            "all".to_string(),
            "--device=/dev/dri".to_string(),
            "--name".to_string(),
            config.name.clone(),
            "-it".to_string(),
            "--entrypoint".to_string(),
            "/bin/bash".to_string(),
            "-e".to_string(),
            format!("SESSION_ID={}", session_id),
            "-v".to_string(),
            format!("{}:/game", mount_dir.display()),
            "-p".to_string(),
            format!("{0}:{0}/udp", config.udp_port),
            "--cap-add=SYS_NICE".to_string(),
            "--cap-add=SYS_ADMIN".to_string(),
            config.image.clone(),
        ])
    }

    async fn run_streamed(&self, cmd: &CommandSpec, context: &str) -> Result<()> {
        let code = self
            .runner
            .stream(cmd)
            .await
            .map_err(|e| NestriError::process(context, e))?;
        if code == Some(0) {
            Ok(())
        } else {
            Err(NestriError::process(
                context,
                ProcessError::Failed {
                    command: cmd.to_string(),
                    code,
                    stderr: String::new(),
                },
            ))
        }
    }

    /// Bring the container to the running state and return the state it
    /// was found in. Nothing is rolled back on failure.
    pub async fn ensure_running(&self, session_id: &str, mount_dir: &Path) -> Result<ContainerState> {
        let state = self.state().await?;
        debug!(container = %self.config.name, ?state, "container state");

        match state.required_action() {
            Some(ContainerAction::Create) => {
                info!(container = %self.config.name, "creating container");
                let cmd = self.create_command(session_id, mount_dir);
                self.run_streamed(&cmd, "error running docker command").await?;
            }
            Some(ContainerAction::Start) => {
                info!(container = %self.config.name, "starting existing container");
                let cmd = self.docker(["start", self.config.name.as_str()]);
                self.run_streamed(&cmd, "error starting existing Docker container")
                    .await?;
            }
            None => {
                info!(container = %self.config.name, "reusing running container");
            }
        }

        Ok(state)
    }

    pub async fn has_marker(&self) -> Result<bool> {
        let cmd = self.docker([
            "exec",
            self.config.name.as_str(),
            "ls",
            "-la",
            self.config.marker_dir.as_str(),
        ]);
        let context = format!("error checking {} in docker container", self.config.marker_dir);
        let output = self
            .runner
            .output(&cmd)
            .await
            .and_then(|out| out.into_checked(&cmd))
            .map_err(|e| NestriError::process(context, e))?;
        Ok(output.stdout.contains(self.config.marker.as_str()))
    }

    async fn launch_display(&self) -> Result<()> {
        let cmd = self.docker([
            "exec",
            "-d",
            self.config.name.as_str(),
            self.config.startup_script.as_str(),
        ]);
        self.run_streamed(&cmd, "error running startup command").await
    }

    /// Wait for the display marker, starting the in-container startup script
    /// first if the marker is missing.
    ///
    /// Polls every `poll_interval` and gives up after `ready_timeout` or as
    /// soon as `cancel` fires.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<()> {
        if self.has_marker().await? {
            debug!("display marker already present");
            return Ok(());
        }

        self.launch_display().await?;

        match tokio::time::timeout(self.config.ready_timeout, self.poll_marker(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(NestriError::ReadinessTimeout {
                marker: self.config.marker_path(),
                waited: self.config.ready_timeout,
            }),
        }
    }

    async fn poll_marker(&self, cancel: &CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NestriError::Cancelled),
                _ = ticker.tick() => {}
            }

            if self.has_marker().await? {
                return Ok(());
            }
            info!(marker = %self.config.marker_path(), "backend not ready yet");
        }
    }

    pub fn game_command(&self, game: &str) -> CommandSpec {
        let launch = compose_game_command(game);
        self.docker([
            "exec",
            self.config.name.as_str(),
            "bash",
            "-c",
            launch.as_str(),
        ])
    }

    /// Run the game inside the container with output on this terminal.
    pub async fn exec_game(&self, game: &str) -> Result<()> {
        let cmd = self.game_command(game);
        self.run_streamed(&cmd, "error executing game command in docker container")
            .await
    }
}

/// Shell command line that launches `game` through the in-container launcher.
pub fn compose_game_command(game: &str) -> String {
    format!("{} {}", GAME_LAUNCHER, shell_quote(game))
}

fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@%+=,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
