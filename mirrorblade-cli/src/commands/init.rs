//! `init`: create the default config file.

use crate::error::CliError;
use mirrorblade::config::{config_path, save_to, BridgeConfig};
use std::path::Path;

pub fn run(root: &Path) -> Result<(), CliError> {
    let path = config_path(root);
    if path.exists() {
        println!("Configuration file already exists: {}", path.display());
        return Ok(());
    }

    save_to(&path, &BridgeConfig::default())?;
    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize the sidecar; changes hot-reload");
    println!("while `mirrorblade serve` is running.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_config() {
        let dir = tempfile::TempDir::new().unwrap();
        run(dir.path()).unwrap();
        assert!(config_path(dir.path()).exists());
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"traffic_boost": 9.0}"#).unwrap();

        run(dir.path()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("9.0"));
    }
}
