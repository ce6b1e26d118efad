use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::BackendConfig;
use crate::detail::DetailLoader;
use crate::error::{Result, SyncError};
use crate::favourites::FavouritesStore;
use crate::gateway::{HttpGateway, RecipeGateway};
use crate::model::{Recipe, RecipeCard};
use crate::search::SearchSession;

/// Which list the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Search,
    Favourites,
}

/// One gateway wired into the search session, favourites store and detail
/// overlay. Cloning yields another handle to the same components.
#[derive(Clone)]
pub struct MealPlanner {
    gateway: Arc<dyn RecipeGateway>,
    search: SearchSession,
    favourites: FavouritesStore,
    detail: DetailLoader,
}

impl MealPlanner {
    /// Creates a new builder for the planner
    ///
    /// # Example
    /// ```
    /// use meal_planner_sync::MealPlanner;
    ///
    /// let builder = MealPlanner::builder().base_url("http://localhost:5000");
    /// ```
    pub fn builder() -> MealPlannerBuilder {
        MealPlannerBuilder::default()
    }

    pub fn new(gateway: Arc<dyn RecipeGateway>, results_per_page: u32) -> Self {
        MealPlanner {
            search: SearchSession::new(gateway.clone(), results_per_page),
            favourites: FavouritesStore::new(gateway.clone()),
            detail: DetailLoader::new(gateway.clone()),
            gateway,
        }
    }

    /// Load favourites from the backend.
    ///
    /// A failed load leaves the favourites empty and is only logged, so the
    /// planner stays usable. Returns the number of favourites loaded.
    pub async fn start(&self) -> usize {
        match self.favourites.load().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Starting without favourites: {}", e);
                0
            }
        }
    }

    pub fn search(&self) -> &SearchSession {
        &self.search
    }

    pub fn favourites(&self) -> &FavouritesStore {
        &self.favourites
    }

    pub fn detail(&self) -> &DetailLoader {
        &self.detail
    }

    pub fn gateway(&self) -> &Arc<dyn RecipeGateway> {
        &self.gateway
    }

    /// Cards for a tab, each flagged with its current favourite membership
    pub fn cards(&self, tab: Tab) -> Vec<RecipeCard> {
        let recipes: Vec<Recipe> = match tab {
            Tab::Search => self.search.items(),
            Tab::Favourites => self.favourites.favourites(),
        };
        self.favourites.cards(&recipes)
    }
}

/// Builder for configuring a [`MealPlanner`]
#[derive(Default)]
pub struct MealPlannerBuilder {
    config: Option<BackendConfig>,
    base_url: Option<String>,
    results_per_page: Option<u32>,
    timeout: Option<Duration>,
    gateway: Option<Arc<dyn RecipeGateway>>,
}

impl MealPlannerBuilder {
    /// Start from an explicit configuration instead of file and environment
    pub fn config(mut self, config: BackendConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the backend base address
    ///
    /// # Example
    /// ```
    /// use meal_planner_sync::MealPlanner;
    ///
    /// let builder = MealPlanner::builder().base_url("http://recipes.internal:8080");
    /// ```
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Number of recipes the backend returns per page
    pub fn results_per_page(mut self, count: u32) -> Self {
        self.results_per_page = Some(count);
        self
    }

    /// Set a timeout for HTTP requests
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Use a custom gateway instead of HTTP. `base_url` and `timeout` are
    /// ignored when a gateway is supplied.
    pub fn gateway(mut self, gateway: Arc<dyn RecipeGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Resolve configuration and build the planner
    ///
    /// Without an explicit config, settings come from `meal_planner.toml`
    /// and `MEAL_PLANNER__*` environment variables; builder values win.
    ///
    /// # Errors
    /// Returns `SyncError` if:
    /// - configuration cannot be loaded
    /// - the base address is not an http(s) URL
    /// - `results_per_page` is zero
    pub fn build(self) -> Result<MealPlanner> {
        let mut config = match self.config {
            Some(config) => config,
            None if self.gateway.is_some() => BackendConfig::default(),
            None => BackendConfig::load()?,
        };
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(count) = self.results_per_page {
            config.results_per_page = count;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout.as_secs().max(1);
        }

        if config.results_per_page == 0 {
            return Err(SyncError::Builder(
                "results_per_page must be at least 1".to_string(),
            ));
        }

        let gateway = match self.gateway {
            Some(gateway) => gateway,
            None => {
                validate_base_url(&config.base_url)?;
                info!("Using recipe backend at {}", config.base_url);
                Arc::new(HttpGateway::new(&config)?)
            }
        };

        Ok(MealPlanner::new(gateway, config.results_per_page))
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let base_url = base_url.trim();
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        Ok(())
    } else {
        Err(SyncError::Builder(format!(
            "Backend base URL must start with http:// or https://, got {:?}",
            base_url
        )))
    }
}
