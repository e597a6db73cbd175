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
    env::temp_dir().join(format!("stagesync_{label}_{suffix}"))
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite:show.db"), "sqlite://show.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let root = temp_dir("db");
    let url = format!("sqlite://{}/nested/show.db", root.display());

    prepare_database_url(&url).expect("prepare db url");
    assert!(root.join("nested").exists());

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        "database_url = \"sqlite://show.db\"\nviewport_width = 1280\n",
    )
    .expect("parse");
    assert_eq!(settings.database_url, "sqlite://show.db");
    assert_eq!(settings.viewport_width, 1280);
    assert_eq!(settings.viewport_height, 1080);
    assert_eq!(settings.watch_interval_ms, 100);
}

#[test]
fn malformed_file_is_an_error() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "viewport_width = \"wide\"").is_err());
}

#[test]
fn prefixed_env_wins_over_plain_and_bad_numbers_are_ignored() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "sqlite://plain.db"),
        ("STAGESYNC__DATABASE_URL", "sqlite://prefixed.db"),
        ("STAGESYNC__WATCH_INTERVAL_MS", "25"),
        ("STAGESYNC__VIEWPORT_HEIGHT", "tall"),
    ]);
    let mut settings = Settings::default();
    apply_env(&mut settings, |name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(settings.database_url, "sqlite://prefixed.db");
    assert_eq!(settings.watch_interval_ms, 25);
    assert_eq!(settings.viewport_height, 1080);
}

#[test]
fn explicit_missing_config_file_fails() {
    let missing = temp_dir("missing").join("surface.toml");
    assert!(load_settings(Some(&missing)).is_err());
}
