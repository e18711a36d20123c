use std::path::PathBuf;

/// Root directory for the database, config file and generated images.
/// Overridable with `PERSONA_ASSET_DIR` (tests point this at a temp dir).
pub fn asset_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PERSONA_ASSET_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("persona-studio")
}

pub fn upload_dir() -> PathBuf {
    asset_dir().join("uploads")
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}
