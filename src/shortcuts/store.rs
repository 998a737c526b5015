use super::{sanitize_record, Shortcut, ShortcutInput};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shortcuts file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("shortcuts file {path} is not a JSON array: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("failed to encode shortcuts: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed shortcut list. Every mutation rewrites the whole file.
///
/// Writers inside this process are serialized; separate processes sharing the
/// file are not coordinated and the last write wins.
#[derive(Debug)]
pub struct ShortcutStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ShortcutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Reads every salvageable shortcut. A file that is not a JSON array is
    /// logged and read as empty; writes keep refusing it so it is never replaced.
    pub async fn list(&self) -> Result<Vec<Shortcut>, StoreError> {
        if !self.exists().await? {
            let _guard = self.write_lock.lock().await;
            self.ensure_file().await?;
        }
        match self.read_all().await {
            Err(err @ StoreError::Corrupt { .. }) => {
                error!(error = %err, "serving an empty shortcut list");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Appends a shortcut with a fresh id. Returns it with the new total count.
    pub async fn create(&self, input: ShortcutInput) -> Result<(Shortcut, usize), StoreError> {
        let normalized = input.normalized();
        let _guard = self.write_lock.lock().await;
        self.ensure_file().await?;

        let mut shortcuts = self.read_all().await?;
        let mut id = Uuid::new_v4().to_string();
        while shortcuts.iter().any(|s| s.id == id) {
            id = Uuid::new_v4().to_string();
        }

        let shortcut = Shortcut {
            id,
            title: normalized.title,
            url: normalized.url,
            icon: normalized.icon,
        };
        shortcuts.push(shortcut.clone());
        self.write_all(&shortcuts).await?;
        debug!(id = %shortcut.id, total = shortcuts.len(), "shortcut created");
        Ok((shortcut, shortcuts.len()))
    }

    /// Replaces the fields of the shortcut with `id`. `Ok(None)` when no such
    /// shortcut exists; the file is not touched in that case.
    pub async fn update(
        &self,
        id: &str,
        input: ShortcutInput,
    ) -> Result<Option<Shortcut>, StoreError> {
        let normalized = input.normalized();
        let _guard = self.write_lock.lock().await;
        self.ensure_file().await?;

        let mut shortcuts = self.read_all().await?;
        let Some(existing) = shortcuts.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };

        existing.title = normalized.title;
        existing.url = normalized.url;
        existing.icon = normalized.icon;
        let updated = existing.clone();

        self.write_all(&shortcuts).await?;
        debug!(id = %updated.id, "shortcut updated");
        Ok(Some(updated))
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        match fs::metadata(&self.path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(self.io_error(err)),
        }
    }

    /// Creates the file as `[]` when it is missing. Callers hold `write_lock`,
    /// so a file renamed into place by a writer is never replaced here.
    async fn ensure_file(&self) -> Result<(), StoreError> {
        if self.exists().await? {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error(err))?;
        }
        self.replace_contents("[]\n".to_string()).await?;
        debug!(path = %self.path.display(), "created empty shortcuts file");
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Shortcut>, StoreError> {
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|err| self.io_error(err))?;

        let parsed: Value = serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })?;
        let Value::Array(records) = parsed else {
            return Err(StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: "top-level value is not an array".to_string(),
            });
        };

        let total = records.len();
        let shortcuts: Vec<Shortcut> = records.iter().filter_map(sanitize_record).collect();
        let dropped = total - shortcuts.len();
        if dropped > 0 {
            warn!(
                path = %self.path.display(),
                dropped,
                kept = shortcuts.len(),
                "ignoring malformed shortcut records"
            );
        }
        Ok(shortcuts)
    }

    async fn write_all(&self, shortcuts: &[Shortcut]) -> Result<(), StoreError> {
        let mut text = serde_json::to_string_pretty(shortcuts)?;
        text.push('\n');
        self.replace_contents(text).await
    }

    /// Writes a sibling temp file and renames it over the store, so readers
    /// see either the old or the new contents.
    async fn replace_contents(&self, text: String) -> Result<(), StoreError> {
        let tmp = self.tmp_path();
        fs::write(&tmp, text)
            .await
            .map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| self.io_error(err))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "shortcuts.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
