//! anisync CLI
//!
//! Command-line front end for the anime catalog client: runs sync sessions,
//! browses the local library, records watch progress and manages the image
//! cache and settings.

mod cli_types;
mod commands;
mod error;
mod spinner;

use std::io::Write;

use clap::Parser;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stderr;

use cli_types::{CacheAction, Cli, Commands, ConfigAction};
use commands::AppContext;
use error::CliError;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let ctx = AppContext {
        settings_path: cli.config,
        db: cli.db,
        cache_dir: cli.cache_dir,
        quiet: cli.quiet,
    };

    if let Err(e) = run(&ctx, cli.command) {
        log::error!("{} {}", "\u{2718}".if_supports_color(Stderr, |t| t.red()), e);
        std::process::exit(1);
    }
}

fn run(ctx: &AppContext, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Sync { network } => commands::sync::run_sync(ctx, network.into()),
        Commands::Daemon { network } => commands::sync::run_daemon(ctx, network.into()),
        Commands::Status => commands::library::run_status(ctx),
        Commands::Releases { watched, limit } => {
            commands::library::run_releases(ctx, watched, limit)
        }
        Commands::Details { id } => commands::library::run_details(ctx, id),
        Commands::History { limit } => commands::library::run_history(ctx, limit),
        Commands::Favorites => commands::library::run_favorites(ctx),
        Commands::Watched {
            release,
            episode,
            position,
        } => commands::library::run_watched(ctx, release, episode, position),
        Commands::Favorite { release } => commands::library::run_favorite(ctx, release),
        Commands::Image { url, output } => commands::cache::run_image(ctx, &url, output),
        Commands::Cache { action } => match action {
            CacheAction::Stats => commands::cache::run_cache_stats(ctx),
            CacheAction::Clear => commands::cache::run_cache_clear(ctx),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(ctx),
            ConfigAction::Get { key } => commands::config::run_config_get(ctx, &key),
            ConfigAction::Set { key, value } => commands::config::run_config_set(ctx, &key, &value),
            ConfigAction::Path => {
                commands::config::run_config_path(ctx);
                Ok(())
            }
        },
    }
}

/// Plain messages on stdout at info level; timestamps and module paths with
/// `--verbose`. `RUST_LOG` overrides the level.
fn init_logging(quiet: bool, verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else if quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .filter_module("hyper_util", log::LevelFilter::Warn)
        .filter_module("rustls", log::LevelFilter::Warn)
        .filter_module("reqwest", log::LevelFilter::Info)
        .target(env_logger::Target::Stdout)
        .parse_default_env();
    if verbose {
        builder.format_timestamp_millis().format_module_path(true);
    } else {
        builder.format(|buf, record| writeln!(buf, "{}", record.args()));
    }
    builder.init();
}
