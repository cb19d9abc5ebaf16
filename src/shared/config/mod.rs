pub mod global;
pub mod model;

pub use global::{CONFIG, config_path, load_settings};
pub use model::{
    LoggingConfig, QueryConfig, RealtimeSettings, Settings, load_settings_from,
};
