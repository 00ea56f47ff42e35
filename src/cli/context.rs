//! Command execution context
//!
//! Loads configuration and opens the cache once, then wires the production
//! capabilities into an [`Orchestrator`] for commands that need one.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheStorage, TtlOracle};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::{
    CompanionNotifier, HttpImageProbe, Notifier, OpenMeteoContext, UnsplashClient,
};
use crate::config::{AccessKey, Config, SettingsProvider, SettingsStore};
use crate::context::{LocalDebugInfo, SeasonalQueryBuilder};
use crate::error::{Error, Result};
use crate::orchestrator::{Capabilities, Orchestrator, Presenter, StateFileSurface, SystemClock};

/// Shared state for command execution.
pub struct CommandContext {
    /// Loaded configuration (defaults when no file exists yet)
    pub config: Config,
    /// Path the configuration was (or would be) loaded from
    pub config_path: PathBuf,
    /// Directory holding the cache database and surface state
    pub cache_dir: PathBuf,
    pub store: Arc<CacheStorage>,
    pub settings: Arc<SettingsStore>,
    pub access_key: AccessKey,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load config and open the cache.
    ///
    /// A missing config file is not an error here: the orchestrator runs with
    /// default settings and reports the missing key through diagnostics.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config_path = Config::resolve_path(opts.config_ref())?;
        let config = Config::load_or_default_at(opts.config_ref())?;

        let cache_dir = CacheStorage::resolve_dir(opts.cache_dir_ref())?;
        let store = Arc::new(CacheStorage::open_at(&cache_dir)?);

        let settings = Arc::new(SettingsStore::new(
            config_path.clone(),
            config.settings.clone(),
        ));
        let access_key = config.access_key();

        Ok(Self {
            config,
            config_path,
            cache_dir,
            store,
            settings,
            access_key,
            format: opts.format,
        })
    }

    /// Wire the production capabilities into an orchestrator.
    pub fn orchestrator(&self) -> Result<Arc<Orchestrator>> {
        let settings: Arc<dyn SettingsProvider> = self.settings.clone();
        let clock = Arc::new(SystemClock);

        let key = self
            .access_key
            .is_available()
            .then(|| self.access_key.value.clone())
            .flatten();
        let fetcher = UnsplashClient::new(key, Arc::clone(&settings))?;
        let context = OpenMeteoContext::new(self.config.location.clone(), Arc::clone(&settings))?;

        let probe =
            HttpImageProbe::new().map_err(|e| Error::Other(format!("Image probe: {}", e)))?;
        let notifier: Option<Arc<dyn Notifier>> = match &self.config.companion_url {
            Some(url) => Some(Arc::new(CompanionNotifier::new(url)?)),
            None => None,
        };
        let surface = Arc::new(StateFileSurface::in_dir(&self.cache_dir));
        let presenter = Presenter::new(surface, Arc::new(probe), notifier);

        let caps = Capabilities {
            store: self.store.clone(),
            settings: Arc::clone(&settings),
            context: Arc::new(context),
            queries: Arc::new(SeasonalQueryBuilder::new()),
            fetcher: Arc::new(fetcher),
            oracle: Arc::new(TtlOracle::new(settings, clock.clone())),
            clock,
        };

        Ok(Arc::new(Orchestrator::new(
            caps,
            presenter,
            self.config.viewport,
        )))
    }

    /// Diagnostic field provider for the debug report
    pub fn debug_info(&self) -> Arc<LocalDebugInfo> {
        Arc::new(LocalDebugInfo::new(
            self.access_key.clone(),
            self.settings.clone(),
        ))
    }
}
