use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use which::which;

pub const ENV_HEADLESS: &str = "CHECKOUT_PROBE_HEADLESS";
pub const ENV_CHROME: &str = "CHECKOUT_PROBE_CHROME";
pub const ENV_WS_URL: &str = "CHECKOUT_PROBE_WS_URL";
pub const ENV_PROFILE: &str = "CHECKOUT_PROBE_PROFILE";
pub const ENV_NO_SANDBOX: &str = "CHECKOUT_PROBE_NO_SANDBOX";

/// Configuration for launching or attaching to Chromium.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    /// Operator phases need a visible window, so headed is the default.
    pub headless: bool,
    pub no_sandbox: bool,
    pub default_deadline_ms: u64,
    pub launch_timeout_ms: u64,
    /// Keep-alive period while the operator is interacting; 0 disables it.
    pub heartbeat_interval_ms: u64,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: false,
            no_sandbox: false,
            default_deadline_ms: 30_000,
            launch_timeout_ms: 20_000,
            heartbeat_interval_ms: 15_000,
            websocket_url: None,
        }
        .with_env_overrides()
    }
}

impl CdpConfig {
    /// Applies `CHECKOUT_PROBE_*` variables on top of file or default values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(flag) = env::var(ENV_HEADLESS).ok().as_deref().and_then(parse_flag) {
            self.headless = flag;
        }
        if let Some(flag) = env::var(ENV_NO_SANDBOX).ok().as_deref().and_then(parse_flag) {
            self.no_sandbox = flag;
        }
        if let Some(path) = non_empty_var(ENV_CHROME) {
            self.executable = PathBuf::from(path);
        }
        if let Some(url) = non_empty_var(ENV_WS_URL) {
            self.websocket_url = Some(url);
        }
        if let Some(path) = non_empty_var(ENV_PROFILE) {
            self.user_data_dir = PathBuf::from(path);
        }
        self
    }
}

/// Interprets `1/true/yes/on` and `0/false/no/off`; anything else is `None`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_profile_dir() -> PathBuf {
    Path::new("./.checkout-probe-profile").into()
}

/// Locates a Chromium-family binary: env override, `PATH`, then well-known locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Some(raw) = non_empty_var(ENV_CHROME) {
        let candidate = PathBuf::from(raw);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Some(root) = non_empty_var(key) {
                let root = PathBuf::from(root);
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: CdpConfig = serde_json::from_str(r#"{ "default_deadline_ms": 5000 }"#).expect("config");
        assert_eq!(cfg.default_deadline_ms, 5000);
        assert_eq!(cfg.launch_timeout_ms, 20_000);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag(" YES "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn executable_names_are_not_empty() {
        assert!(!chrome_executable_names().is_empty());
    }
}
