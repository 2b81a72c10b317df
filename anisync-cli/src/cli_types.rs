//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use anisync_lib::NetworkState;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "anisync")]
#[command(about = "Keep a local anime catalog in sync with the content API", long_about = None)]
pub(crate) struct Cli {
    /// Library database (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Image cache directory (defaults to the platform cache directory)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run one sync session now
    Sync {
        /// Connectivity to assume for this run
        #[arg(long, value_enum, default_value_t = NetworkArg::Wifi)]
        network: NetworkArg,
    },

    /// Sync periodically until interrupted
    Daemon {
        /// Connectivity to assume
        #[arg(long, value_enum, default_value_t = NetworkArg::Wifi)]
        network: NetworkArg,
    },

    /// Show store contents and the last sync
    Status,

    /// List releases, most recently updated first
    Releases {
        /// Only releases with watch history
        #[arg(long)]
        watched: bool,

        /// Maximum number of releases to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Fetch and show full details for a release
    Details {
        /// Release id
        id: i64,
    },

    /// Show watch history
    History {
        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// List favorite releases
    Favorites,

    /// Record a watch position
    Watched {
        /// Release id
        release: i64,
        /// Episode number (starting at 1)
        episode: u32,
        /// Position in seconds
        position: u32,
    },

    /// Toggle a release's favorite flag
    Favorite {
        /// Release id
        release: i64,
    },

    /// Fetch an image through the cache
    Image {
        /// Absolute URL or path relative to the media base
        url: String,

        /// Write the bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the image cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage application settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show entry count, size and budget
    Stats,

    /// Remove all cached images
    Clear,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show every setting and its value
    Show,

    /// Print one setting
    Get {
        /// Setting name (e.g., sync.intervalSeconds)
        key: String,
    },

    /// Change a setting
    Set {
        /// Setting name (e.g., sync.wifiOnly)
        key: String,
        /// New value
        value: String,
    },

    /// Print the settings file path
    Path,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum NetworkArg {
    Wifi,
    Metered,
    Offline,
}

impl From<NetworkArg> for NetworkState {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Wifi => NetworkState::Wifi,
            NetworkArg::Metered => NetworkState::Metered,
            NetworkArg::Offline => NetworkState::Offline,
        }
    }
}
