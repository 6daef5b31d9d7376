//! Scene snapshot persistence using JSON file storage

use std::path::Path;

use tokio::fs;

use crate::store::{EntityStore, SceneRecord};

/// Load scene snapshots from a JSON file into the store
pub async fn load_scenes(path: &Path, store: &EntityStore) -> usize {
    match fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<Vec<SceneRecord>>(&contents) {
            Ok(records) => {
                let count = records.len();
                tracing::info!("Loaded {} scene snapshots from {:?}", count, path);
                store.import_scenes(records);
                count
            }
            Err(e) => {
                tracing::warn!("Failed to parse scenes file {:?}: {}", path, e);
                0
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No scenes file found at {:?}, starting fresh", path);
            0
        }
        Err(e) => {
            tracing::warn!("Failed to read scenes file {:?}: {}", path, e);
            0
        }
    }
}

/// Save the store's scene snapshots to a JSON file atomically
#[allow(clippy::missing_errors_doc)]
pub async fn save_scenes(path: &Path, store: &EntityStore) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let records = store.export_scenes();
    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Write to a temp file, then rename over the target
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;

    tracing::debug!("Saved {} scene snapshots to {:?}", records.len(), path);
    Ok(())
}
