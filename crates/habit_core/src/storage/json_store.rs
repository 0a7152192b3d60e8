use crate::error::AppError;
use crate::model::{CompletionRecord, Task};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "snapshot.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    schema_version: u32,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    completions: Vec<CompletionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    favorite_tasks: Vec<String>,
}

/// Tasks and completions as last fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub completions: Vec<CompletionRecord>,
    /// Task ids the user starred, without duplicates.
    pub favorite_tasks: Vec<String>,
}

impl Snapshot {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorite_tasks.iter().any(|favorite| favorite == id)
    }
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var("HABIT_STORE_PATH")
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("habit").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("habit")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot, AppError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no snapshot yet, starting empty");
        return Ok(Snapshot::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredSnapshot =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    // Completions of tasks deleted on the backend still count towards stats.
    let orphans = stored
        .completions
        .iter()
        .filter(|completion| !stored.tasks.iter().any(|task| task.id == completion.task_id))
        .count();
    if orphans > 0 {
        tracing::warn!(orphans, "completions reference tasks missing from the snapshot");
    }

    tracing::debug!(
        path = %path.display(),
        tasks = stored.tasks.len(),
        completions = stored.completions.len(),
        favorites = stored.favorite_tasks.len(),
        "loaded snapshot"
    );

    let mut favorite_tasks: Vec<String> = Vec::with_capacity(stored.favorite_tasks.len());
    for id in stored.favorite_tasks {
        if !favorite_tasks.contains(&id) {
            favorite_tasks.push(id);
        }
    }

    Ok(Snapshot {
        tasks: stored.tasks,
        completions: stored.completions,
        favorite_tasks,
    })
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredSnapshot {
        schema_version: SCHEMA_VERSION,
        tasks: snapshot.tasks.to_vec(),
        completions: snapshot.completions.to_vec(),
        favorite_tasks: snapshot.favorite_tasks.to_vec(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}
