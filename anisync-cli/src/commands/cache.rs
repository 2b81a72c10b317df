use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use super::{AppContext, format_bytes, runtime};
use crate::error::CliError;

/// Fetch an image through the cache, optionally writing it to a file.
pub(crate) fn run_image(ctx: &AppContext, url: &str, output: Option<PathBuf>) -> Result<(), CliError> {
    let services = ctx.services()?;
    let url = anisync_core::media_url(&services.settings.media_base(), url);
    let rt = runtime()?;

    let cached = services.images.contains(&url);
    let bytes = rt.block_on(async {
        let result = services.images.get_or_fetch(&url).await;
        services.images.save_index().await;
        result
    })?;

    let source = if cached { "cache" } else { "network" };
    log::info!(
        "{} {} ({}, from {})",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        url.if_supports_color(Stdout, |t| t.cyan()),
        format_bytes(bytes.len() as u64),
        source,
    );
    if let Some(path) = output {
        std::fs::write(&path, bytes.as_slice())?;
        log::info!("  Written to {}", path.display());
    }
    Ok(())
}

/// Show image cache usage.
pub(crate) fn run_cache_stats(ctx: &AppContext) -> Result<(), CliError> {
    let services = ctx.services()?;
    let stats = services.images.stats();
    log::info!("{}", "Image cache".if_supports_color(Stdout, |t| t.bold()));
    log::info!(
        "  Directory: {}",
        services
            .images
            .dir()
            .display()
            .if_supports_color(Stdout, |t| t.cyan())
    );
    log::info!("  Entries:   {}", stats.entries);
    log::info!(
        "  Size:      {} of {}",
        format_bytes(stats.total_bytes),
        format_bytes(stats.budget_bytes)
    );
    Ok(())
}

/// Remove every cached image.
pub(crate) fn run_cache_clear(ctx: &AppContext) -> Result<(), CliError> {
    let services = ctx.services()?;
    let rt = runtime()?;
    let freed = rt.block_on(services.images.clear())?;
    log::info!(
        "{} Cache cleared ({} freed)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        format_bytes(freed),
    );
    Ok(())
}
