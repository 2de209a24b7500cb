pub mod config_cmd;
pub mod flows;
pub mod run;
pub mod serve;

use anyhow::Context;
use flowdeck_config::AppConfig;
use std::path::{Path, PathBuf};

/// The config file in use: `--config` if given, else the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let file = config_file(path);
    AppConfig::load_from(&file).with_context(|| format!("Failed to load config from {}", file.display()))
}
