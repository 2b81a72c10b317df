use super::*;

fn temp_settings() -> (tempfile::TempDir, ApplicationSettings) {
    let dir = tempfile::tempdir().unwrap();
    let settings = ApplicationSettings::new(dir.path().join("anisync").join("settings.toml"))
        .without_env();
    (dir, settings)
}

#[test]
fn defaults_without_file() {
    let (_dir, settings) = temp_settings();
    assert_eq!(settings.sync_interval(), Duration::from_secs(1800));
    assert!(!settings.wifi_only());
    assert_eq!(settings.image_budget_bytes(), 256 * 1024 * 1024);
    assert_eq!(settings.api_base(), DEFAULT_API_BASE);
    assert_eq!(settings.media_base(), DEFAULT_MEDIA_BASE);
    assert!(!settings.path().exists(), "reading must not create the file");
}

#[test]
fn mutation_is_persisted_immediately() {
    let (_dir, settings) = temp_settings();
    settings.set(SettingKey::WifiOnly, "yes").unwrap();
    settings.set(SettingKey::SyncInterval, "900").unwrap();

    let reloaded = ApplicationSettings::new(settings.path().to_path_buf()).without_env();
    assert!(reloaded.wifi_only());
    assert_eq!(reloaded.sync_interval(), Duration::from_secs(900));

    let text = std::fs::read_to_string(settings.path()).unwrap();
    assert!(text.contains("intervalSeconds = 900"), "{text}");
    assert!(text.contains("wifiOnly = true"), "{text}");
}

#[test]
fn keys_parse_by_dotted_name() {
    assert_eq!(
        "sync.intervalSeconds".parse::<SettingKey>().unwrap(),
        SettingKey::SyncInterval
    );
    assert_eq!(
        "CACHE.IMAGEBUDGETBYTES".parse::<SettingKey>().unwrap(),
        SettingKey::ImageBudget
    );
    assert!(matches!(
        "sync.nope".parse::<SettingKey>().unwrap_err(),
        SettingsError::UnknownKey(_)
    ));
}

#[test]
fn app_version_is_read_only() {
    let (_dir, settings) = temp_settings();
    assert_eq!(
        settings.get(SettingKey::AppVersion).unwrap(),
        SettingValue::Text(APPLICATION_VERSION.to_string())
    );
    assert!(matches!(
        settings.set(SettingKey::AppVersion, "9.9.9").unwrap_err(),
        SettingsError::ReadOnly(_)
    ));
}

#[test]
fn invalid_values_leave_state_untouched() {
    let (_dir, settings) = temp_settings();
    assert!(settings.set(SettingKey::SyncInterval, "10").is_err());
    assert!(settings.set(SettingKey::WifiOnly, "maybe").is_err());
    assert!(settings.set(SettingKey::ApiBase, "ftp://x").is_err());
    assert_eq!(settings.sync_interval(), Duration::from_secs(1800));
    assert!(!settings.path().exists());
}

#[test]
fn base_paths_are_normalized() {
    let (_dir, settings) = temp_settings();
    settings
        .set(SettingKey::MediaBase, "https://media.example.org/")
        .unwrap();
    assert_eq!(settings.media_base(), "https://media.example.org");
}

#[test]
fn unreadable_file_falls_back_to_defaults() {
    let (_dir, settings) = temp_settings();
    std::fs::create_dir_all(settings.path().parent().unwrap()).unwrap();
    std::fs::write(settings.path(), "this is [not toml").unwrap();
    assert_eq!(settings.image_budget_bytes(), 256 * 1024 * 1024);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let (_dir, settings) = temp_settings();
    std::fs::create_dir_all(settings.path().parent().unwrap()).unwrap();
    std::fs::write(settings.path(), "[cache]\nimageBudgetBytes = 1024\n").unwrap();
    assert_eq!(settings.image_budget_bytes(), 1024);
    assert_eq!(settings.sync_interval(), Duration::from_secs(1800));
}
