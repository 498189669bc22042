use audio_playlist::cli::{CacheDisplay, CliApp, Commands, ConfigAction, ConfigSetting};
use audio_playlist::config::ConfigManager;
use audio_playlist::error::{ConfigError, PlayerError};
use audio_playlist::logging::{PlayerLogger, LOG_LEVEL_ENV};
use audio_playlist::AudioCache;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wires configuration, logging and the cache together for one command
pub struct AppController {
    cache: AudioCache,
    config_manager: ConfigManager,
    interrupted: Arc<AtomicBool>,
}

impl AppController {
    pub fn new(cli: &CliApp) -> Result<Self, PlayerError> {
        // Quiet by default; the CLI prints its own results
        if std::env::var(LOG_LEVEL_ENV).is_err() {
            std::env::set_var(LOG_LEVEL_ENV, "warn");
        }
        if let Err(e) = PlayerLogger::init() {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let config_manager = ConfigManager::new()?;
        let mut cache_config = config_manager.get_config().cache.clone();
        if let Some(root) = cli.cache_root() {
            cache_config.cache_root = root;
        }

        let cache = AudioCache::with_defaults(cache_config)?.with_logger(PlayerLogger::new());
        info!("Using audio cache at {:?}", cache.audio_dir());

        Ok(Self {
            cache,
            config_manager,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn execute_command(&mut self, command: Commands) -> Result<(), PlayerError> {
        match command {
            Commands::Resolve { url } => {
                let resolved = self.cache.get_audio_uri(&url).await;
                if resolved == url && !self.cache.is_local(&url) {
                    eprintln!("Could not cache {}; it will be streamed directly", url);
                }
                println!("{}", resolved);
            }
            Commands::Prefetch { urls, playlist } => {
                let playlist = playlist.as_deref().map(CliApp::expand_path);
                let urls = CliApp::collect_urls(&urls, playlist.as_deref())?;
                self.prefetch(&urls).await;
            }
            Commands::Status { url } => {
                if self.cache.is_cached(&url).await {
                    println!("Cached: {}", self.cache.local_path_for(&url).display());
                } else {
                    println!("Not cached: {}", url);
                }
            }
            Commands::List => {
                let entries = self.cache.entries().await;
                let mut sizes = Vec::with_capacity(entries.len());
                for entry in &entries {
                    sizes.push(tokio::fs::metadata(&entry.local_path).await.ok().map(|m| m.len()));
                }
                CacheDisplay::display_entries(&entries, &sizes);
                CacheDisplay::display_stats(&self.cache.stats().await, &self.cache.audio_dir());
            }
            Commands::Verify => {
                let pruned = self.cache.verify().await;
                println!("OK: Dropped {} stale entries", pruned);
            }
            Commands::Remove { url } => {
                if self.cache.remove(&url).await {
                    println!("OK: Removed {}", url);
                } else {
                    println!("Not cached: {}", url);
                }
            }
            Commands::Clear => {
                let removed = self.cache.clear().await;
                println!("OK: Removed {} cached files", removed);
            }
            Commands::Config { action } => match action {
                ConfigAction::Show => {
                    let rendered = toml::to_string_pretty(self.config_manager.get_config())
                        .map_err(ConfigError::from)?;
                    println!("# {}", self.config_manager.config_path().display());
                    println!("{}", rendered);
                }
                ConfigAction::Reset => {
                    self.config_manager.reset_to_defaults()?;
                    println!("OK: Configuration reset to defaults");
                }
                ConfigAction::Set { setting } => self.apply_setting(setting)?,
            },
        }
        Ok(())
    }

    fn apply_setting(&mut self, setting: ConfigSetting) -> Result<(), ConfigError> {
        match setting {
            ConfigSetting::AutoPlay { enabled } => {
                self.config_manager.set_auto_play(enabled)?;
                println!("OK: Auto-play {}", if enabled { "enabled" } else { "disabled" });
            }
            ConfigSetting::Volume { level } => {
                self.config_manager.set_default_volume(level as f32 / 100.0)?;
                println!("OK: Default volume set to {}%", level);
            }
            ConfigSetting::CacheRoot { path } => {
                let root = CliApp::expand_path(&path);
                let shown = root.display().to_string();
                self.config_manager.set_cache_root(root)?;
                println!("OK: Cache root set to {}", shown);
            }
            ConfigSetting::Timeout { secs } => {
                self.config_manager
                    .update_config(|config| config.cache.request_timeout_secs = secs)?;
                println!("OK: Download timeout set to {}s", secs);
            }
        }
        Ok(())
    }

    /// Download each URL in turn. Ctrl-C stops between downloads.
    async fn prefetch(&self, urls: &[String]) {
        let flag = Arc::clone(&self.interrupted);
        if let Err(e) = ctrlc::set_handler(move || {
            eprintln!("\nInterrupted; finishing the current download");
            flag.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        let mut cached = 0;
        for (i, url) in urls.iter().enumerate() {
            if self.interrupted.load(Ordering::Relaxed) {
                println!("Stopped after {} of {} URLs", i, urls.len());
                break;
            }

            let resolved = self.cache.get_audio_uri(url).await;
            let ok = resolved != *url || self.cache.is_local(url);
            if ok {
                cached += 1;
            }
            println!("[{}/{}] {} {}", i + 1, urls.len(), if ok { "OK  " } else { "FAIL" }, url);
        }

        println!("{} of {} URLs cached", cached, urls.len());
    }
}

#[tokio::main]
async fn main() {
    let cli = CliApp::parse();

    let result = match AppController::new(&cli) {
        Ok(mut app) => app.execute_command(cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        CacheDisplay::display_error(&e);
        std::process::exit(1);
    }
}
