mod config;
pub use config::{AppConfig, DEFAULT_MODELS, find_on_path};
