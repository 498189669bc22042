use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::error::PlayerError;
use crate::queue::parse_m3u;

pub mod status;
pub use status::CacheDisplay;

/// Audio cache maintenance CLI
#[derive(Debug, Parser)]
#[command(name = "audiocache")]
#[command(about = "Inspect and manage the on-disk audio cache")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Override the cache root directory
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the playable URI for a remote URL, downloading it if needed
    Resolve {
        url: String,
    },
    /// Download several URLs into the cache
    Prefetch {
        /// Remote audio URLs
        urls: Vec<String>,
        /// M3U playlist whose entries are added to the list
        #[arg(long)]
        playlist: Option<String>,
    },
    /// Show whether a URL is cached
    Status {
        url: String,
    },
    /// List cached files
    #[command(alias = "ls")]
    List,
    /// Drop index entries whose files are gone
    Verify,
    /// Delete the cached copy of a URL
    Remove {
        url: String,
    },
    /// Delete every cached file
    Clear,
    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Restore the default configuration
    Reset,
    /// Change one setting and save it
    Set {
        #[command(subcommand)]
        setting: ConfigSetting,
    },
}

/// Settings that `config set` can change
#[derive(Debug, Subcommand)]
pub enum ConfigSetting {
    /// Start newly selected tracks once they finish loading
    AutoPlay {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Volume applied after every load (0-100)
    Volume {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },
    /// Default cache root directory
    CacheRoot {
        path: String,
    },
    /// Download timeout in seconds
    Timeout {
        secs: u64,
    },
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Cache root requested on the command line, if any
    pub fn cache_root(&self) -> Option<PathBuf> {
        self.cache_dir.as_deref().map(Self::expand_path)
    }

    /// Command-line URLs followed by the entries of an M3U file
    pub fn collect_urls(urls: &[String], playlist: Option<&Path>) -> Result<Vec<String>, PlayerError> {
        let mut all = urls.to_vec();
        if let Some(path) = playlist {
            let content = std::fs::read_to_string(path)?;
            all.extend(parse_m3u(&content));
        }

        let mut seen = std::collections::HashSet::new();
        all.retain(|url| seen.insert(url.clone()));
        Ok(all)
    }
}
