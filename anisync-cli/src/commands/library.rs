use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anisync_core::{Release, ReleaseId, SyncState, ViewMode};
use anisync_db::LocalStore;

use super::{AppContext, format_timestamp, runtime};
use crate::error::CliError;

/// Show store counts and sync bookkeeping.
pub(crate) fn run_status(ctx: &AppContext) -> Result<(), CliError> {
    let services = ctx.services()?;
    let store = &services.store;
    let stats = store.stats()?;

    log::info!("{}", "Library".if_supports_color(Stdout, |t| t.bold()));
    if let Some(path) = store.path() {
        log::info!(
            "  Database: {}",
            path.display().if_supports_color(Stdout, |t| t.cyan())
        );
    }
    log::info!("  Releases: {}", stats.releases);
    log::info!(
        "  History:  {} ({} pending)",
        stats.history,
        stats.pending_history
    );
    log::info!(
        "  Favorites: {} ({} pending)",
        stats.favorites,
        stats.pending_favorites
    );
    log::info!("");
    match store.last_success_at()? {
        Some(at) => log::info!("  Last sync: {}", format_timestamp(at)),
        None => log::info!(
            "  Last sync: {}",
            "never".if_supports_color(Stdout, |t| t.dimmed())
        ),
    }
    match store.cursor()? {
        Some(cursor) => log::info!("  Cursor:    {}", cursor),
        None => log::info!(
            "  Cursor:    {}",
            "(start of catalog)".if_supports_color(Stdout, |t| t.dimmed())
        ),
    }
    Ok(())
}

/// List releases for the catalog or history view.
pub(crate) fn run_releases(ctx: &AppContext, watched: bool, limit: usize) -> Result<(), CliError> {
    let services = ctx.services()?;
    let mode = if watched {
        ViewMode::WatchedReleaseCard
    } else {
        ViewMode::ReleaseCard
    };
    let releases = services.store.releases_for_view(mode, limit)?;
    if releases.is_empty() {
        log::info!(
            "{}",
            "No releases stored.".if_supports_color(Stdout, |t| t.dimmed())
        );
        log::info!("Run 'anisync sync' to fetch the catalog.");
        return Ok(());
    }
    for release in &releases {
        print_release_line(&services.store, release)?;
    }
    Ok(())
}

fn print_release_line(store: &LocalStore, release: &Release) -> Result<(), CliError> {
    let star = if store.is_favorite(release.id)? {
        "\u{2605}"
    } else {
        " "
    };
    log::info!(
        "{} {:>6}  {}  [{}, {} ep]  {}",
        star.if_supports_color(Stdout, |t| t.yellow()),
        release.id,
        release.title.if_supports_color(Stdout, |t| t.bold()),
        release.status,
        release.episode_count,
        format_timestamp(release.updated_at).if_supports_color(Stdout, |t| t.dimmed()),
    );
    Ok(())
}

/// Fetch details from the API, store them and print them.
pub(crate) fn run_details(ctx: &AppContext, id: ReleaseId) -> Result<(), CliError> {
    let services = ctx.services()?;
    let rt = runtime()?;
    let details = match rt.block_on(services.engine.fetch_details(id)) {
        Ok(details) => details,
        Err(e) => {
            log::warn!("Could not refresh details ({}), showing stored copy", e);
            services
                .store
                .release_details(id)?
                .ok_or_else(|| CliError::other(format!("Release {} not found", id)))?
        }
    };

    let release = &details.release;
    log::info!(
        "{} {}",
        release.title.if_supports_color(Stdout, |t| t.bold()),
        format!("#{}", release.id).if_supports_color(Stdout, |t| t.dimmed()),
    );
    log::info!("  Status:   {}", release.status);
    log::info!("  Episodes: {}", release.episode_count);
    if let Some(year) = details.year {
        log::info!("  Year:     {}", year);
    }
    if !details.genres.is_empty() {
        log::info!("  Genres:   {}", details.genres.join(", "));
    }
    if let Some(poster) = &release.poster {
        log::info!(
            "  Poster:   {}",
            anisync_core::media_url(&services.settings.media_base(), poster)
        );
    }
    if let Some(description) = &details.description {
        log::info!("");
        log::info!("{}", description);
    }

    let history = services.store.history_for_release(id)?;
    if !history.is_empty() {
        log::info!("");
        for entry in &history {
            log::info!(
                "  Episode {:>3}: {}  {}",
                entry.episode,
                format_position(entry.position_secs),
                format_timestamp(entry.watched_at).if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
    }
    Ok(())
}

/// Show watch history, most recent first.
pub(crate) fn run_history(ctx: &AppContext, limit: usize) -> Result<(), CliError> {
    let services = ctx.services()?;
    let entries = services.store.history(limit)?;
    if entries.is_empty() {
        log::info!(
            "{}",
            "No watch history.".if_supports_color(Stdout, |t| t.dimmed())
        );
        return Ok(());
    }
    for entry in &entries {
        let title = services
            .store
            .release(entry.release_id)?
            .map(|r| r.title)
            .unwrap_or_else(|| format!("Release {}", entry.release_id));
        log::info!(
            "{} {}  ep {}  {}  {}",
            sync_glyph(entry.sync_state),
            title.if_supports_color(Stdout, |t| t.bold()),
            entry.episode,
            format_position(entry.position_secs),
            format_timestamp(entry.watched_at).if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    Ok(())
}

/// List favorite releases.
pub(crate) fn run_favorites(ctx: &AppContext) -> Result<(), CliError> {
    let services = ctx.services()?;
    let releases = services.store.favorite_releases()?;
    if releases.is_empty() {
        log::info!(
            "{}",
            "No favorites.".if_supports_color(Stdout, |t| t.dimmed())
        );
        return Ok(());
    }
    for release in &releases {
        print_release_line(&services.store, release)?;
    }
    Ok(())
}

/// Record a watch position through the engine.
pub(crate) fn run_watched(
    ctx: &AppContext,
    release: ReleaseId,
    episode: u32,
    position: u32,
) -> Result<(), CliError> {
    let services = ctx.services()?;
    let rt = runtime()?;
    rt.block_on(services.engine.record_watched(release, episode, position))?;
    log::info!(
        "{} Release {} episode {} at {} (pending upload)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        release,
        episode,
        format_position(position),
    );
    Ok(())
}

/// Toggle a favorite through the engine.
pub(crate) fn run_favorite(ctx: &AppContext, release: ReleaseId) -> Result<(), CliError> {
    let services = ctx.services()?;
    let rt = runtime()?;
    let favorite = rt.block_on(services.engine.toggle_favorite(release))?;
    let verb = if favorite { "added to" } else { "removed from" };
    log::info!(
        "{} Release {} {} favorites (pending upload)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        release,
        verb,
    );
    Ok(())
}

fn sync_glyph(state: SyncState) -> String {
    match state {
        SyncState::Synced => format!("{}", "\u{2714}".if_supports_color(Stdout, |t| t.green())),
        SyncState::Pending => format!("{}", "\u{2191}".if_supports_color(Stdout, |t| t.yellow())),
    }
}

fn format_position(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
