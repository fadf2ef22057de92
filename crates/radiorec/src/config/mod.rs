pub mod loader;
pub mod schema;
pub mod template;

pub use loader::{load_config, load_config_from_str, parse_utc_offset};
pub use schema::{
    Config, LogFormat, LoggingConfig, MarginConfig, TemplateConfig, TranscodeSettings,
};
pub use template::PathTemplateEngine;
