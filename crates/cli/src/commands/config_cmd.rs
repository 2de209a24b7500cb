//! `flowdeck config`: Configuration management commands.

use anyhow::Context;
use flowdeck_config::AppConfig;
use std::path::Path;

pub fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", super::config_file(config_path).display());
}

pub fn init(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let file = super::config_file(config_path);
    if file.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", file.display());
    }
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(&file, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", file.display()))?;
    println!("Wrote {}", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_config_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("config.toml");

        init(Some(&file), false).unwrap();
        let config = AppConfig::load_from(&file).unwrap();
        assert_eq!(config.gateway.port, 3400);

        assert!(init(Some(&file), false).is_err());
        init(Some(&file), true).unwrap();
    }
}
