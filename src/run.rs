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

//! The `run` command: prepare the backend container and launch a game in it.
//!
//! Every step runs in order and the first failure aborts the command. Side
//! effects of earlier steps (a created container, a saved config) are left
//! in place.

use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ConfigStore};
use crate::container::{Backend, BackendConfig};
use crate::error::{NestriError, Result};
use crate::host::{HostEnv, Platform};
use crate::process::{CommandSpec, ProcessRunner};
use crate::session::generate_session_id;

pub const GAME_EXTENSION: &str = "exe";
pub const GAMES_SUBDIR: &str = "game";
pub const OS_RELEASE: &str = "/etc/os-release";
pub const UNSUPPORTED_OS_MESSAGE: &str = "This command is only supported on Linux.";

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Game given on the command line. Falls back to the stored one.
    pub game: Option<String>,
    /// GPU index. Announced only, the backend always gets every GPU.
    pub gpu: Option<u32>,
    /// Announced only.
    pub hdr: bool,
    /// Overrides `<home>/game`.
    pub games_dir: Option<PathBuf>,
    pub backend: BackendConfig,
}

fn has_game_extension(game: &str) -> bool {
    Path::new(game)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == GAME_EXTENSION)
}

/// Pick the game to run from the argument or the stored config.
///
/// An explicit argument is validated before it is persisted, so a rejected
/// path never reaches the config file.
pub fn resolve_game(arg: Option<&str>, store: &dyn ConfigStore) -> Result<String> {
    let game = match arg {
        Some(game) => {
            if !has_game_extension(game) {
                return Err(NestriError::Validation(format!(
                    "Make sure the game is a .{}",
                    GAME_EXTENSION
                )));
            }
            let mut config = store.load().unwrap_or_else(|e| {
                warn!("ignoring unreadable config: {}", e);
                Config::default()
            });
            config.game = Some(game.to_string());
            store.save(&config)?;
            game.to_string()
        }
        None => {
            let game = store.load()?.game.unwrap_or_default();
            if game.trim().is_empty() {
                return Err(NestriError::Validation(
                    "no game specified and no previous game selected".to_string(),
                ));
            }
            if !has_game_extension(&game) {
                return Err(NestriError::Validation(format!(
                    "Make sure the game is a .{}",
                    GAME_EXTENSION
                )));
            }
            game
        }
    };
    Ok(game)
}

pub struct RunWorkflow<'a, W: Write> {
    runner: &'a dyn ProcessRunner,
    host: &'a dyn HostEnv,
    store: &'a dyn ConfigStore,
    out: W,
}

impl<'a, W: Write> RunWorkflow<'a, W> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        host: &'a dyn HostEnv,
        store: &'a dyn ConfigStore,
        out: W,
    ) -> Self {
        Self {
            runner,
            host,
            store,
            out,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn execute(&mut self, options: &RunOptions, cancel: &CancellationToken) -> Result<()> {
        let platform = self.host.platform();
        if platform != Platform::Linux {
            info!(%platform, "run is not supported on this platform");
            writeln!(self.out, "{}", UNSUPPORTED_OS_MESSAGE)?;
            return Ok(());
        }

        let game = resolve_game(options.game.as_deref(), self.store)?;
        writeln!(self.out, "Running game: {}\n", game)?;
        if let Some(gpu) = options.gpu {
            writeln!(self.out, "Using gpu {}", gpu)?;
        }
        if options.hdr {
            writeln!(self.out, "Enabling HDR mode")?;
        }

        self.print_os_release().await?;

        let dir = self.enter_games_dir(options)?;
        writeln!(self.out, "Current directory: {}\n", dir.display())?;
        self.print_games(&dir).await?;

        let session_id = self.new_session_id()?;
        writeln!(self.out, "Your Session ID is: {}\n", session_id)?;

        let mut backend_config = options.backend.clone();
        if self.host.is_root() {
            backend_config.sudo = false;
        }
        let backend = Backend::new(self.runner, &backend_config);

        writeln!(self.out, "Installing Netris/Launching Netris Server\n")?;
        self.out.flush()?;
        backend.ensure_running(&session_id, &dir).await?;

        writeln!(self.out, "starting netris server\n")?;
        self.out.flush()?;
        backend.wait_until_ready(cancel).await?;

        info!(%game, "launching game");
        backend.exec_game(&game).await
    }

    async fn print_os_release(&mut self) -> Result<()> {
        let cmd = CommandSpec::new("grep").args(["VERSION", OS_RELEASE]);
        let output = self
            .runner
            .output(&cmd)
            .await
            .and_then(|out| out.into_checked(&cmd))
            .map_err(|e| NestriError::process("error getting linux version", e))?;
        writeln!(self.out, "Linux version:\n{}", output.stdout)?;
        Ok(())
    }

    fn enter_games_dir(&mut self, options: &RunOptions) -> Result<PathBuf> {
        let target = match &options.games_dir {
            Some(dir) => dir.clone(),
            None => self
                .host
                .home_dir()
                .ok_or(NestriError::HomeDirUnavailable)?
                .join(GAMES_SUBDIR),
        };
        writeln!(self.out, "changing to game dir.")?;
        self.host.change_dir(&target).map_err(|e| {
            NestriError::io(format!("error changing directory to {}", target.display()), e)
        })
    }

    async fn print_games(&mut self, dir: &Path) -> Result<()> {
        let cmd = CommandSpec::new("ls").args(["-la", "."]).current_dir(dir);
        match self.runner.output(&cmd).await.and_then(|o| o.into_checked(&cmd)) {
            Ok(output) => writeln!(self.out, "List of Games: \n{}", output.stdout)?,
            Err(e) => warn!("error listing games: {}", e),
        }
        Ok(())
    }

    fn new_session_id(&self) -> Result<String> {
        let source = self
            .host
            .entropy()
            .map_err(|e| NestriError::SessionId(e.to_string()))?;
        generate_session_id(BufReader::new(source)).map_err(|e| NestriError::SessionId(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::{FakeHost, FakeRunner, MemoryConfigStore};
    use std::time::Duration;

    struct Fixture {
        _home: tempfile::TempDir,
        host: FakeHost,
    }

    fn linux_home() -> Fixture {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join(GAMES_SUBDIR)).unwrap();
        let host = FakeHost::linux(home.path());
        Fixture { _home: home, host }
    }

    fn options(game: Option<&str>) -> RunOptions {
        RunOptions {
            game: game.map(str::to_string),
            backend: BackendConfig {
                sudo: false,
                poll_interval: Duration::from_millis(5),
                ready_timeout: Duration::from_millis(500),
                ..BackendConfig::default()
            },
            ..RunOptions::default()
        }
    }

    fn ready_runner() -> FakeRunner {
        FakeRunner::new().respond("exec netris ls", ProcessOutput::success("drwx .X11-unix\n"))
    }

    async fn run(
        runner: &FakeRunner,
        host: &FakeHost,
        store: &MemoryConfigStore,
        opts: &RunOptions,
    ) -> (Result<()>, String) {
        let mut workflow = RunWorkflow::new(runner, host, store, Vec::new());
        let result = workflow.execute(opts, &CancellationToken::new()).await;
        let out = String::from_utf8(workflow.into_output()).unwrap();
        (result, out)
    }

    #[test]
    fn test_explicit_game_with_wrong_suffix_is_not_saved() {
        let store = MemoryConfigStore::default();
        let err = resolve_game(Some("game.sh"), &store).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn test_explicit_game_is_saved() {
        let store = MemoryConfigStore::with_game("old.exe");
        let game = resolve_game(Some("new.exe"), &store).unwrap();
        assert_eq!(game, "new.exe");
        assert_eq!(store.current().game.as_deref(), Some("new.exe"));
    }

    #[test]
    fn test_extension_is_case_sensitive() {
        let store = MemoryConfigStore::with_game("old.exe");
        let err = resolve_game(Some("new.EXE"), &store).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.saves(), 0);
        assert_eq!(store.current().game.as_deref(), Some("old.exe"));
    }

    #[test]
    fn test_stored_game_is_used() {
        let store = MemoryConfigStore::with_game("/games/hades.exe");
        assert_eq!(resolve_game(None, &store).unwrap(), "/games/hades.exe");
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn test_stored_game_with_wrong_suffix_is_rejected() {
        let store = MemoryConfigStore::with_game("notes.txt");
        assert!(resolve_game(None, &store).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_fresh_linux_host_runs_game() {
        let fixture = linux_home();
        let runner = ready_runner();
        let store = MemoryConfigStore::default();

        let (result, out) = run(&runner, &fixture.host, &store, &options(Some("game.exe"))).await;

        result.unwrap();
        assert_eq!(runner.count_with_arg("run"), 1);
        assert_eq!(runner.count_with_arg("start"), 0);
        assert_eq!(fixture.host.entropy_reads(), 1);
        assert_eq!(runner.count_with_arg("netris-proton -pr game.exe"), 1);
        assert_eq!(store.current().game.as_deref(), Some("game.exe"));
        assert!(out.contains("Running game: game.exe"));
        assert!(out.contains("Your Session ID is: Qx7pL2mN9vR4tY8w"));

        let create = runner
            .calls()
            .into_iter()
            .find(|c| c.has_arg("run"))
            .unwrap();
        assert!(create.has_arg("SESSION_ID=Qx7pL2mN9vR4tY8w"));
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let fixture = linux_home();
        let runner = ready_runner();
        let store = MemoryConfigStore::default();

        let (result, _) = run(&runner, &fixture.host, &store, &options(Some("game.exe"))).await;
        result.unwrap();

        let rendered: Vec<String> = runner.calls().iter().map(ToString::to_string).collect();
        let position = |needle: &str| {
            rendered
                .iter()
                .position(|c| c.contains(needle))
                .unwrap_or_else(|| panic!("{} not run: {:?}", needle, rendered))
        };
        assert!(position("grep VERSION") < position("ls -la ."));
        assert!(position("ls -la .") < position("docker ps -q"));
        assert!(position("docker ps -q") < position("docker run"));
        assert!(position("docker run") < position("exec netris ls"));
        assert!(position("exec netris ls") < position("netris-proton"));
        assert_eq!(
            fixture.host.changed_to(),
            vec![fixture.host.home.clone().unwrap().join(GAMES_SUBDIR)]
        );
    }

    #[tokio::test]
    async fn test_stopped_container_is_started_not_created() {
        let fixture = linux_home();
        let runner = ready_runner().respond("ps -aq", ProcessOutput::success("c0ffee\n"));
        let store = MemoryConfigStore::with_game("game.exe");

        let (result, _) = run(&runner, &fixture.host, &store, &options(None)).await;

        result.unwrap();
        assert_eq!(runner.count_with_arg("start"), 1);
        assert_eq!(runner.count_with_arg("run"), 0);
    }

    #[tokio::test]
    async fn test_non_linux_host_does_nothing() {
        let fixture = linux_home();
        let host = FakeHost::linux(fixture.host.home.clone().unwrap()).with_platform(Platform::MacOS);
        let runner = FakeRunner::new();
        let store = MemoryConfigStore::default();

        let (result, out) = run(&runner, &host, &store, &options(Some("game.exe"))).await;

        result.unwrap();
        assert_eq!(out.trim(), UNSUPPORTED_OS_MESSAGE);
        assert!(runner.calls().is_empty());
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_bad_suffix_has_no_side_effects() {
        let fixture = linux_home();
        let runner = FakeRunner::new();
        let store = MemoryConfigStore::default();

        let (result, _) = run(&runner, &fixture.host, &store, &options(Some("setup.msi"))).await;

        assert!(result.unwrap_err().is_validation());
        assert!(runner.calls().is_empty());
        assert_eq!(store.saves(), 0);
        assert_eq!(fixture.host.entropy_reads(), 0);
    }

    #[tokio::test]
    async fn test_no_game_anywhere_fails_before_processes() {
        let fixture = linux_home();
        let runner = FakeRunner::new();
        let store = MemoryConfigStore::default();

        let (result, _) = run(&runner, &fixture.host, &store, &options(None)).await;

        let err = result.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "no game specified and no previous game selected");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_games_dir_aborts_before_container() {
        let home = tempfile::tempdir().unwrap();
        let host = FakeHost::linux(home.path());
        let runner = ready_runner();
        let store = MemoryConfigStore::default();

        let (result, _) = run(&runner, &host, &store, &options(Some("game.exe"))).await;

        assert!(matches!(result.unwrap_err(), NestriError::Io { .. }));
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(host.entropy_reads(), 0);
    }

    #[tokio::test]
    async fn test_os_release_failure_aborts() {
        let fixture = linux_home();
        let runner = FakeRunner::new().respond("grep", ProcessOutput::failure(2, "no such file"));
        let store = MemoryConfigStore::default();

        let (result, _) = run(&runner, &fixture.host, &store, &options(Some("game.exe"))).await;

        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("error getting linux version"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_is_not_fatal() {
        let fixture = linux_home();
        let runner = ready_runner().respond("ls -la .", ProcessOutput::failure(1, "denied"));
        let store = MemoryConfigStore::default();

        let (result, out) = run(&runner, &fixture.host, &store, &options(Some("game.exe"))).await;

        result.unwrap();
        assert!(!out.contains("List of Games"));
    }

    #[tokio::test]
    async fn test_gpu_and_hdr_are_announced() {
        let fixture = linux_home();
        let runner = ready_runner();
        let store = MemoryConfigStore::default();
        let mut opts = options(Some("game.exe"));
        opts.gpu = Some(1);
        opts.hdr = true;

        let (result, out) = run(&runner, &fixture.host, &store, &opts).await;

        result.unwrap();
        assert!(out.contains("Using gpu 1"));
        assert!(out.contains("Enabling HDR mode"));
        let create = runner.calls().into_iter().find(|c| c.has_arg("run")).unwrap();
        assert!(create.has_arg("all"));
    }

    #[tokio::test]
    async fn test_root_calls_docker_without_sudo() {
        let fixture = linux_home();
        let host = FakeHost::linux(fixture.host.home.clone().unwrap()).with_root();
        let runner = ready_runner();
        let store = MemoryConfigStore::default();
        let mut opts = options(Some("game.exe"));
        opts.backend.sudo = true;

        let (result, _) = run(&runner, &host, &store, &opts).await;

        result.unwrap();
        let calls = runner.calls();
        assert!(calls.iter().all(|c| c.program != "sudo"));
        assert_eq!(calls.iter().filter(|c| c.program == "docker").count(), 5);
    }

    #[tokio::test]
    async fn test_non_root_calls_docker_through_sudo() {
        let fixture = linux_home();
        let runner = ready_runner();
        let store = MemoryConfigStore::default();
        let mut opts = options(Some("game.exe"));
        opts.backend.sudo = true;

        let (result, _) = run(&runner, &fixture.host, &store, &opts).await;

        result.unwrap();
        let calls = runner.calls();
        assert!(calls.iter().all(|c| c.program != "docker"));
        assert_eq!(calls.iter().filter(|c| c.program == "sudo").count(), 5);
    }
}
