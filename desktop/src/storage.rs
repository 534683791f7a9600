use directories::ProjectDirs;
use kidoo_core::content::Language;
use kidoo_core::profile::ChildProgress;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "kidoo";
const ORG_NAME: &str = "kidoo";
const SAVE_FILE: &str = "progress.json";

/// Everything the desktop persists between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub language: Language,
    pub progress: ChildProgress,
}

impl Default for SavedState {
    fn default() -> Self {
        Self {
            language: Language::En,
            progress: ChildProgress::default(),
        }
    }
}

fn get_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", ORG_NAME, APP_NAME).map(|dirs| dirs.data_dir().to_path_buf())
}

pub fn save(state: &SavedState) -> Result<(), String> {
    let data_dir = get_data_dir().ok_or("Could not determine data directory")?;

    fs::create_dir_all(&data_dir)
        .map_err(|e| format!("Failed to create data directory: {}", e))?;

    let file_path = data_dir.join(SAVE_FILE);
    let json =
        serde_json::to_string_pretty(state).map_err(|e| format!("Failed to serialize: {}", e))?;

    fs::write(&file_path, json).map_err(|e| format!("Failed to write file: {}", e))?;

    Ok(())
}

pub fn load() -> Result<SavedState, String> {
    let data_dir = get_data_dir().ok_or("Could not determine data directory")?;
    let file_path = data_dir.join(SAVE_FILE);

    if !file_path.exists() {
        return Err("No save file found".to_string());
    }

    let content =
        fs::read_to_string(&file_path).map_err(|e| format!("Failed to read file: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to deserialize: {}", e))
}

pub fn load_or_default() -> SavedState {
    load().unwrap_or_default()
}
