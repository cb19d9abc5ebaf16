use once_cell::sync::Lazy;
use std::env;
use std::sync::Arc;

use crate::shared::config::model::{Settings, load_settings_from};

/// Names the settings file; the extension may be omitted.
pub const CONFIG_PATH_ENV: &str = "GRIDSYNC_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config";

pub static CONFIG: Lazy<Arc<Settings>> =
    Lazy::new(|| Arc::new(load_settings().expect("Failed to load configuration")));

/// Settings file named by `GRIDSYNC_CONFIG`, or `config` when unset or blank.
pub fn config_path() -> String {
    env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    load_settings_from(&config_path())
}
