use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anisync_lib::SettingKey;

use super::AppContext;
use crate::error::CliError;

/// Show every setting with its current value.
pub(crate) fn run_config_show(ctx: &AppContext) -> Result<(), CliError> {
    let settings = ctx.settings();
    let path = settings.path();

    log::info!(
        "{}",
        "Application Settings".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("");
    if path.exists() {
        log::info!(
            "  Settings file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(exists)".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Settings file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found, using defaults)".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    for (key, value) in settings.entries()? {
        let note = if key.is_read_only() { " (read-only)" } else { "" };
        log::info!(
            "  {:<24} {}{}",
            key.name(),
            value.if_supports_color(Stdout, |t| t.cyan()),
            note.if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    Ok(())
}

/// Print one setting's value.
pub(crate) fn run_config_get(ctx: &AppContext, key: &str) -> Result<(), CliError> {
    let key: SettingKey = key.parse()?;
    let value = ctx.settings().get(key)?;
    log::info!("{}", value);
    Ok(())
}

/// Validate and persist a setting.
pub(crate) fn run_config_set(ctx: &AppContext, key: &str, value: &str) -> Result<(), CliError> {
    let key: SettingKey = key.parse()?;
    let settings = ctx.settings();
    let stored = settings.set(key, value)?;
    log::info!(
        "{} {} = {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        key.name(),
        stored.if_supports_color(Stdout, |t| t.cyan()),
    );
    Ok(())
}

/// Print the settings file path.
pub(crate) fn run_config_path(ctx: &AppContext) {
    log::info!("{}", ctx.settings().path().display());
}
