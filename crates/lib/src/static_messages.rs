//! Static line-oriented message source (`messages.txt`).

use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

const EMPTY_FILE_NOTICE: &str = "No messages available.";
const MISSING_FILE_NOTICE: &str = "Messages file not found.";

/// Reads the file on every pick so edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct StaticMessages {
    path: PathBuf,
}

impl StaticMessages {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blank lines, trimmed.
    pub async fn load_lines(&self) -> std::io::Result<Vec<String>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// A random line. A missing or empty file yields a notice string instead of an error.
    pub async fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self.load_lines().await {
            Ok(lines) => match lines.choose(rng) {
                Some(line) => line.clone(),
                None => {
                    log::warn!("messages file {} is empty", self.path.display());
                    EMPTY_FILE_NOTICE.to_string()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("messages file {} not found", self.path.display());
                MISSING_FILE_NOTICE.to_string()
            }
            Err(e) => {
                log::warn!("reading messages file {} failed: {}", self.path.display(), e);
                MISSING_FILE_NOTICE.to_string()
            }
        }
    }
}
