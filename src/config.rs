use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Backend connection settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    /// Base address of the recipe backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Number of recipes the backend returns per search page
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            results_per_page: default_results_per_page(),
            timeout: default_timeout(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_results_per_page() -> u32 {
    10
}

fn default_timeout() -> u64 {
    30
}

impl BackendConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with MEAL_PLANNER__ prefix
    /// 2. meal_planner.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: MEAL_PLANNER__BASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }
}

/// Load configuration from file and environment variables
pub fn load_config() -> Result<BackendConfig, ConfigError> {
    load_from(environment())
}

fn environment() -> Environment {
    Environment::with_prefix("MEAL_PLANNER")
        .separator("__")
        .try_parsing(true)
}

fn load_from(environment: Environment) -> Result<BackendConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("meal_planner").required(false))
        .add_source(environment)
        .build()?;

    settings.try_deserialize()
}
