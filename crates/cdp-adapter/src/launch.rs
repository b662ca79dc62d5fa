//! Local Chromium process: profile directory, flags, and DevTools endpoint discovery.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{CdpConfig, ENV_CHROME};
use crate::error::{AdapterError, AdapterErrorKind};

/// Lines of Chromium stderr quoted when it dies before printing its endpoint.
const STDERR_PREVIEW_LINES: usize = 8;

/// Quiet first-run behaviour; the observed profile must not sync or phone home.
const QUIET_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-sync",
    "--disable-default-apps",
    "--disable-component-update",
    "--disable-background-networking",
    "--password-store=basic",
    "--use-mock-keychain",
    "--remote-allow-origins=*",
];

/// Kills the launched browser when the transport goes away.
pub(crate) struct ChildGuard {
    child: Option<Child>,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: "cdp-transport", ?err, "failed to stop chromium");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to stop chromium"),
        }
    }
}

/// Starts Chromium and waits for its browser websocket endpoint.
pub(crate) async fn launch(cfg: &CdpConfig) -> Result<(ChildGuard, String), AdapterError> {
    let mut child = browser_config(cfg)?.launch().map_err(|err| {
        launch_error(format!("failed to launch chromium: {err}"))
    })?;
    let ws_url =
        read_devtools_endpoint(&mut child, Duration::from_millis(cfg.launch_timeout_ms)).await?;
    info!(target: "cdp-transport", headless = cfg.headless, "chromium launched");
    Ok((ChildGuard { child: Some(child) }, ws_url))
}

pub(crate) fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let explicit_executable = !cfg.executable.as_os_str().is_empty();
    if explicit_executable && !cfg.executable.exists() {
        return Err(launch_error(format!(
            "chrome executable not found at {}",
            cfg.executable.display()
        ))
        .with_data(json!({
            "expected": cfg.executable,
            "hint": format!("Set {ENV_CHROME} to the full path of chrome/chromium."),
        })));
    }

    let profile = profile_dir(cfg)?;
    let mut flags: Vec<&str> = QUIET_FLAGS.to_vec();
    if cfg.headless {
        flags.extend(["--headless=new", "--mute-audio"]);
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
        .user_data_dir(profile)
        .args(flags);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    if explicit_executable {
        builder = builder.chrome_executable(cfg.executable.clone());
    }

    builder
        .build()
        .map_err(|err| launch_error(format!("browser config error: {err}")))
}

/// Absolute profile directory, created if missing. Relative paths resolve from the cwd.
fn profile_dir(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
    let dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        std::env::current_dir()
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("cannot resolve profile directory: {err}"))
            })?
            .join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&dir)
        .map_err(|err| launch_error(format!("cannot create profile {}: {err}", dir.display())))?;
    Ok(dir)
}

/// Scans Chromium's stderr for `DevTools listening on ws://...`.
async fn read_devtools_endpoint(child: &mut Child, wait: Duration) -> Result<String, AdapterError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| launch_error("chromium process has no stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| launch_error(err.to_string()))?;
            if let Some(url) = devtools_endpoint(&line) {
                return Ok(url);
            }
            if preview.len() < STDERR_PREVIEW_LINES {
                preview.push(line);
            }
        }
        Err(launch_error(format!(
            "chromium exited before exposing its devtools endpoint; stderr: {}",
            preview.join(" | ")
        )))
    };

    timeout(wait, scan).await.map_err(|_| {
        launch_error("timed out waiting for the chromium devtools endpoint").retriable(true)
    })?
}

fn devtools_endpoint(line: &str) -> Option<String> {
    let (_, url) = line.rsplit_once("listening on ")?;
    let url = url.trim();
    (url.starts_with("ws") && url.contains("devtools/browser")).then(|| url.to_string())
}

fn launch_error(hint: impl Into<String>) -> AdapterError {
    AdapterError::new(AdapterErrorKind::Launch).with_hint(hint)
}
