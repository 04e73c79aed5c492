use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

fn temp_dir(label: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("taskdeck_config_{label}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    dir
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_and_env_yield_defaults() {
    let dir = temp_dir("defaults");
    let settings =
        load_settings_from(&dir.join("absent.toml"), env_from(&[])).expect("settings");

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.api_url, "http://localhost:5000/api");
    assert_eq!(settings.page_size, 6);
    assert_eq!(settings.search_debounce, Duration::from_millis(500));
    assert!(settings.session_file.ends_with("taskdeck/session.json"));
    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn file_values_are_overridden_by_env() {
    let dir = temp_dir("layered");
    let path = dir.join("taskdeck.toml");
    fs::write(
        &path,
        "api_url = \"http://tasks.internal/api\"\npage_size = 10\nsearch_debounce_ms = 250\n",
    )
    .expect("write config");

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("APP__PAGE_SIZE", "12"),
            ("APP__SESSION_FILE", "/tmp/td/session.json"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.api_url, "http://tasks.internal/api");
    assert_eq!(settings.page_size, 12);
    assert_eq!(settings.search_debounce, Duration::from_millis(250));
    assert_eq!(settings.session_file, PathBuf::from("/tmp/td/session.json"));
    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn app_prefixed_api_url_wins_over_short_name() {
    let dir = temp_dir("api_url");
    let settings = load_settings_from(
        &dir.join("absent.toml"),
        env_from(&[
            ("TASKDECK_API_URL", "http://short/api"),
            ("APP__API_URL", "http://prefixed/api"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.api_url, "http://prefixed/api");
    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn unusable_debounce_values_fall_back_to_default() {
    let dir = temp_dir("debounce");
    for raw in ["0", "-20", "soon", ""] {
        let settings = load_settings_from(
            &dir.join("absent.toml"),
            env_from(&[("APP__SEARCH_DEBOUNCE_MS", raw)]),
        )
        .expect("settings");
        assert_eq!(settings.search_debounce, DEFAULT_QUIESCENCE_WINDOW, "raw={raw:?}");
    }
    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn invalid_numbers_keep_previous_values() {
    let dir = temp_dir("numbers");
    let settings = load_settings_from(
        &dir.join("absent.toml"),
        env_from(&[
            ("APP__PAGE_SIZE", "0"),
            ("APP__LOGIN_RETRY_ATTEMPTS", "0"),
            ("APP__LOGIN_RETRY_DELAY_MS", "later"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(settings.login_retry_attempts, 1);
    assert_eq!(settings.login_retry_delay, Duration::from_millis(1000));
    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn malformed_file_is_an_error() {
    let dir = temp_dir("malformed");
    let path = dir.join("taskdeck.toml");
    fs::write(&path, "api_url = [unterminated").expect("write config");

    let err = load_settings_from(&path, env_from(&[])).expect_err("malformed");

    assert!(err.to_string().contains("failed to parse"));
    fs::remove_dir_all(dir).expect("cleanup");
}
