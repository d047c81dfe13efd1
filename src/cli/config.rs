//! The `config` command

use crate::config::{AppPaths, Settings};
use crate::error::BackupResult;

/// Print resolved paths and settings
pub fn handle_config_command(paths: &AppPaths, settings: &Settings) -> BackupResult<()> {
    println!("mongo-backup Configuration");
    println!("==========================");
    println!("Home directory:   {}", paths.base_dir().display());
    println!(
        "Settings file:    {}{}",
        paths.settings_file().display(),
        if paths.is_initialized() { "" } else { " (not created, using defaults)" }
    );
    println!("Staging dir:      {}", settings.staging_dir.display());
    println!();
    println!("Settings:");
    println!("  Cipher backend:  {:?}", settings.cipher.backend);
    println!("  Catalog backend: {:?}", settings.catalog.backend);
    println!(
        "  Catalog:         {}.{} / {}",
        settings.catalog.database,
        settings.catalog.collection,
        settings.catalog_file(paths).display()
    );
    println!();
    println!("Settings JSON:");
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
