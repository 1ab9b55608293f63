use std::process::Stdio;
use std::time::Duration;

use serenity::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{PlayerError, Result};
use crate::models::{Track, YtDlpInfo};

/// Turns a user query or URL into something the voice transport can play.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track>;
}

pub struct YtDlp {
    program: String,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Fails unless the configured binary answers `--version`.
    pub async fn check_installed(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|why| {
                PlayerError::ExtractionFailure(format!("{} is not runnable: {}", self.program, why))
            })?;

        if !output.status.success() {
            return Err(PlayerError::ExtractionFailure(format!(
                "{} --version exited with {}",
                self.program, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn command(&self, query: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args([
                "--dump-single-json",
                "--quiet",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--playlist-items",
                "1",
                "--default-search",
                "auto",
                "--",
                query,
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn resolve(&self, query: &str) -> Result<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlayerError::ExtractionFailure("empty query".to_string()));
        }

        debug!(query, "running {}", self.program);

        let output = match tokio::time::timeout(self.timeout, self.command(query).output()).await {
            Ok(result) => result.map_err(|why| {
                PlayerError::ExtractionFailure(format!("could not run {}: {}", self.program, why))
            })?,
            Err(_) => {
                warn!(query, "extraction timed out after {:?}", self.timeout);
                return Err(PlayerError::ExtractionFailure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(query, status = %output.status, "extraction failed: {}", stderr.trim());
            return Err(PlayerError::ExtractionFailure(query.to_string()));
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout).map_err(|why| {
            PlayerError::ExtractionFailure(format!("unreadable extractor output: {}", why))
        })?;

        let track = info
            .into_track(query)
            .ok_or_else(|| PlayerError::ExtractionFailure(query.to_string()))?;

        info!(query, title = track.title(), "resolved track");
        Ok(track)
    }
}
