use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::{
    debounce::{parse_quiescence_window, DEFAULT_QUIESCENCE_WINDOW},
    transport::DEFAULT_API_URL,
    DEFAULT_PAGE_SIZE,
};
use tracing::warn;

pub const CONFIG_FILE: &str = "taskdeck.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub page_size: u32,
    pub search_debounce: Duration,
    pub session_file: PathBuf,
    pub login_retry_attempts: usize,
    pub login_retry_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_QUIESCENCE_WINDOW,
            session_file: default_session_file(),
            login_retry_attempts: 3,
            login_retry_delay: Duration::from_millis(1000),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskdeck")
        .join("session.json")
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `config_path` when it exists, then environment overrides.
pub fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(config_path) {
        Ok(raw) => {
            let table = toml::from_str::<toml::Table>(&raw)
                .with_context(|| format!("failed to parse '{}'", config_path.display()))?;
            for (key, value) in &table {
                let Some(value) = scalar(value) else {
                    warn!(key = %key, "config: ignoring non-scalar key");
                    continue;
                };
                apply(&mut settings, key, &value);
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read '{}'", config_path.display()));
        }
    }

    if let Some(v) = env("TASKDECK_API_URL") {
        settings.api_url = v;
    }
    for (var, key) in [
        ("APP__API_URL", "api_url"),
        ("APP__PAGE_SIZE", "page_size"),
        ("APP__SEARCH_DEBOUNCE_MS", "search_debounce_ms"),
        ("APP__SESSION_FILE", "session_file"),
        ("APP__LOGIN_RETRY_ATTEMPTS", "login_retry_attempts"),
        ("APP__LOGIN_RETRY_DELAY_MS", "login_retry_delay_ms"),
    ] {
        if let Some(v) = env(var) {
            apply(&mut settings, key, &v);
        }
    }

    Ok(settings)
}

fn scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn apply(settings: &mut Settings, key: &str, value: &str) {
    match key {
        "api_url" => settings.api_url = value.trim().to_string(),
        "page_size" => match value.trim().parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.page_size = parsed,
            _ => warn!(
                value,
                page_size = settings.page_size,
                "config: invalid page_size, keeping previous value"
            ),
        },
        // Unusable values fall back to the default window rather than failing.
        "search_debounce_ms" => settings.search_debounce = parse_quiescence_window(value),
        "session_file" => settings.session_file = PathBuf::from(value.trim()),
        "login_retry_attempts" => {
            if let Ok(parsed) = value.trim().parse::<usize>() {
                settings.login_retry_attempts = parsed.max(1);
            }
        }
        "login_retry_delay_ms" => {
            if let Ok(parsed) = value.trim().parse::<u64>() {
                settings.login_retry_delay = Duration::from_millis(parsed);
            }
        }
        other => warn!(key = other, "config: unknown key"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
