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

//! Best-effort hardware facts for the `neofetch` panel.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::host::Platform;
use crate::process::{CommandSpec, ProcessError, ProcessRunner};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("GPU information retrieval not implemented for {0}")]
    Unsupported(Platform),

    #[error("error retrieving GPU information on {platform}: {source}")]
    Command {
        platform: Platform,
        #[source]
        source: ProcessError,
    },

    #[error("error parsing GPU information on {0}")]
    Parse(Platform),
}

/// Everything the panel can show. Fields stay `None` until probed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemSpecs {
    pub user_host: Option<String>,
    pub os: Option<String>,
    pub kernel: Option<String>,
    pub uptime: Option<String>,
    pub shell: Option<String>,
    pub cpu: Option<String>,
    pub ram: Option<String>,
    pub gpu: Option<String>,
    pub arch: Option<String>,
    pub disk_usage: Option<String>,
}

impl SystemSpecs {
    /// Label/value pairs for the probed fields, in display order.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        [
            ("Host", &self.user_host),
            ("OS", &self.os),
            ("Kernel", &self.kernel),
            ("Uptime", &self.uptime),
            ("Shell", &self.shell),
            ("CPU", &self.cpu),
            ("GPU", &self.gpu),
            ("Memory", &self.ram),
            ("Disk", &self.disk_usage),
            ("Arch", &self.arch),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}

/// How to ask one platform for its GPU name.
pub trait GpuQuery: Send + Sync {
    fn command(&self) -> CommandSpec;

    fn parse(&self, output: &str) -> Option<String>;
}

pub struct WmicQuery;
pub struct SystemProfilerQuery;
pub struct LspciQuery;

impl GpuQuery for WmicQuery {
    fn command(&self) -> CommandSpec {
        CommandSpec::new("wmic").args(["path", "win32_VideoController", "get", "name"])
    }

    fn parse(&self, output: &str) -> Option<String> {
        parse_wmic(output)
    }
}

impl GpuQuery for SystemProfilerQuery {
    fn command(&self) -> CommandSpec {
        CommandSpec::new("system_profiler")
            .arg("SPDisplaysDataType")
            .env("LC_ALL", "C")
    }

    fn parse(&self, output: &str) -> Option<String> {
        parse_system_profiler(output)
    }
}

impl GpuQuery for LspciQuery {
    fn command(&self) -> CommandSpec {
        CommandSpec::new("lspci").arg("-vnn").env("LC_ALL", "C")
    }

    fn parse(&self, output: &str) -> Option<String> {
        parse_lspci(output)
    }
}

pub fn gpu_query(platform: Platform) -> Option<&'static dyn GpuQuery> {
    match platform {
        Platform::Windows => Some(&WmicQuery),
        Platform::MacOS => Some(&SystemProfilerQuery),
        Platform::Linux => Some(&LspciQuery),
        Platform::Other => None,
    }
}

/// `wmic ... get name` prints a `Name` header followed by one adapter per line.
pub fn parse_wmic(output: &str) -> Option<String> {
    let names: Vec<&str> = output
        .trim()
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(" "))
    }
}

pub fn parse_system_profiler(output: &str) -> Option<String> {
    output
        .lines()
        .find(|l| l.contains("Chipset Model:"))
        .and_then(|l| l.split_once(':'))
        .map(|(_, model)| model.trim().to_string())
        .filter(|model| !model.is_empty())
}

pub fn parse_lspci(output: &str) -> Option<String> {
    let line = output
        .lines()
        .find(|l| l.contains("VGA compatible controller"))
        .or_else(|| output.lines().find(|l| l.contains("3D controller")))?;

    // "01:00.0 VGA compatible controller [0300]: NVIDIA Corporation ..."
    if let Some((_, device)) = line.split_once("]: ").or_else(|| line.split_once(": ")) {
        let device = device.trim();
        if !device.is_empty() {
            return Some(device.to_string());
        }
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() > 2 {
        Some(fields[2..].join(" "))
    } else {
        None
    }
}

pub async fn probe_gpu(runner: &dyn ProcessRunner, platform: Platform) -> Result<String, ProbeError> {
    let query = gpu_query(platform).ok_or(ProbeError::Unsupported(platform))?;
    let cmd = query.command();
    let output = runner
        .output(&cmd)
        .await
        .and_then(|out| out.into_checked(&cmd))
        .map_err(|source| ProbeError::Command { platform, source })?;
    query
        .parse(&output.stdout)
        .ok_or(ProbeError::Parse(platform))
}

/// Gather the panel facts. The GPU probe runs on its own task and any
/// failure leaves the GPU empty.
pub async fn collect(runner: Arc<dyn ProcessRunner>, platform: Platform) -> SystemSpecs {
    let worker = tokio::spawn(async move { probe_gpu(runner.as_ref(), platform).await });

    let gpu = match worker.await {
        Ok(Ok(gpu)) => gpu,
        Ok(Err(e)) => {
            debug!("GPU probe failed: {}", e);
            String::new()
        }
        Err(e) => {
            debug!("GPU probe task failed: {}", e);
            String::new()
        }
    };

    SystemSpecs {
        os: Some(platform.to_string()),
        gpu: Some(gpu),
        arch: Some(std::env::consts::ARCH.to_string()),
        ..SystemSpecs::default()
    }
}
