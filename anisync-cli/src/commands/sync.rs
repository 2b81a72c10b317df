use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anisync_lib::async_util::run_with_events;
use anisync_lib::{NetworkState, Services, SessionSummary, SyncEvent, SyncReason, SyncRequest};
use tokio::sync::broadcast::error::RecvError;

use super::{AppContext, runtime};
use crate::error::CliError;
use crate::spinner::SyncSpinner;

/// Run one manual sync session with a spinner, then print its summary.
pub(crate) fn run_sync(ctx: &AppContext, network: NetworkState) -> Result<(), CliError> {
    let services = ctx.services()?;
    let rt = runtime()?;
    rt.block_on(sync_once(&services, network, ctx.quiet))
}

async fn sync_once(services: &Services, network: NetworkState, quiet: bool) -> Result<(), CliError> {
    let engine = &services.engine;
    engine.set_network(network);
    let events = engine.subscribe();

    let session = match engine.request_sync(SyncReason::Manual) {
        SyncRequest::Started(session) => session,
        other => {
            log::warn!(
                "{} Sync not started: {}",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                describe_refusal(&other),
            );
            return Ok(());
        }
    };

    let mut spinner = SyncSpinner::new(quiet);
    let result = run_with_events(session, events, |event: SyncEvent| spinner.update(&event)).await;
    spinner.finish();
    services.shutdown().await;

    let summary = result.map_err(|e| CliError::runtime(e.to_string()))??;
    print_summary(&summary);
    Ok(())
}

/// Sync on the configured interval until Ctrl-C.
pub(crate) fn run_daemon(ctx: &AppContext, network: NetworkState) -> Result<(), CliError> {
    let services = ctx.services()?;
    let rt = runtime()?;
    rt.block_on(daemon(&services, network));
    Ok(())
}

async fn daemon(services: &Services, network: NetworkState) {
    let interval = services.settings.sync_interval();
    let engine = &services.engine;
    engine.set_network(network);
    let mut events = engine.subscribe();
    let scheduler = engine.spawn_scheduler(interval);
    log::info!(
        "Syncing every {} (Ctrl-C to stop)",
        humanize(interval.as_secs()).if_supports_color(Stdout, |t| t.cyan()),
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    log::info!("Stopping...");
    scheduler.stop().await;
    services.shutdown().await;
}

fn describe_refusal(request: &SyncRequest) -> String {
    match request {
        SyncRequest::Started(_) => "already started".to_string(),
        SyncRequest::AlreadyActive => "a session is already running".to_string(),
        SyncRequest::Suspended => "credentials were rejected; re-authenticate first".to_string(),
        SyncRequest::Offline => "offline".to_string(),
        SyncRequest::MeteredRestricted => "metered network and sync.wifiOnly is set".to_string(),
        SyncRequest::Deferred { remaining } => {
            format!("backing off for {}", humanize(remaining.as_secs()))
        }
    }
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::Started { reason } => log::info!("Sync started ({})", reason),
        SyncEvent::Completed(summary) => print_summary(summary),
        SyncEvent::Failed { kind, message } => log::warn!(
            "{} Sync failed [{}]: {}",
            "\u{2718}".if_supports_color(Stdout, |t| t.red()),
            kind,
            message,
        ),
        SyncEvent::RetryScheduled { delay } => {
            log::info!("Next attempt in {}", humanize(delay.as_secs()))
        }
        SyncEvent::Phase(phase) => log::debug!("Phase: {}", phase),
        SyncEvent::Progress { count } => log::debug!("{} releases processed", count),
    }
}

fn print_summary(summary: &SessionSummary) {
    log::info!(
        "{} Sync complete in {:.1?}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        summary.duration,
    );
    log::info!(
        "  Catalog: {} page(s), {} new, {} updated, {} unchanged",
        summary.pages,
        summary.inserted,
        summary.updated,
        summary.unchanged,
    );
    log::info!(
        "  Uploaded: {} history, {} favorite(s)",
        summary.history_flushed,
        summary.favorites_flushed,
    );
    if summary.rejected > 0 {
        log::info!(
            "  {}",
            format!("{} change(s) not accepted, will retry", summary.rejected)
                .if_supports_color(Stdout, |t| t.yellow()),
        );
    }
}

fn humanize(secs: u64) -> String {
    match secs {
        s if s >= 3600 && s % 3600 == 0 => format!("{}h", s / 3600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s if s >= 60 => format!("{}m{}s", s / 60, s % 60),
        s => format!("{}s", s),
    }
}
