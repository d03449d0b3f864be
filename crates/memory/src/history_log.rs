//! Append-only audit log of conversation text.
//!
//! Lives at `<workspace>/memory/HISTORY.md`, one entry per paragraph. It is
//! an observation record kept outside the bounded session history and is
//! never read back into a prompt.

use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub struct HistoryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// `<workspace>/memory/HISTORY.md`
    pub fn for_workspace(root: &Path) -> Self {
        Self::new(root.join("memory").join("HISTORY.md"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, creating the file and its directory as needed.
    pub async fn append(&self, entry: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = entry.trim_end().to_string();
        line.push_str("\n\n");
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), bytes = line.len(), "History entry appended");
        Ok(())
    }

    /// `[<timestamp>] [<channel>] <speaker>: <text>`
    pub async fn record(&self, channel: &str, speaker: &str, text: &str) -> std::io::Result<()> {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.append(&format!("[{ts}] [{channel}] {speaker}: {text}")).await
    }
}
