use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use super::types::TranscodeOutcome;
use crate::ui::prelude::*;

const LOG_FILE_NAME: &str = "transcode_jobs.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeLog {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub return_code: i32,
    pub outcome: String,
    pub output: Option<String>,
}

/// Appends finished transcode jobs to a JSON-lines file
#[derive(Debug, Clone)]
pub struct TranscodeLogger {
    log_dir: PathBuf,
    enabled: bool,
}

impl TranscodeLogger {
    /// Writes only happen when `enabled`; reading and clearing always work
    pub fn new(log_dir: PathBuf, enabled: bool) -> Self {
        Self { log_dir, enabled }
    }

    pub fn log_job(&self, command: &str, return_code: i32, outcome: &TranscodeOutcome) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let (label, output) = match outcome {
            TranscodeOutcome::Success(media) => ("success", media.as_ref().map(|m| m.to_string())),
            TranscodeOutcome::Cancelled => ("cancelled", None),
            TranscodeOutcome::Failed(_) => ("failed", None),
        };

        let entry = TranscodeLog {
            timestamp: Utc::now(),
            command: command.to_string(),
            return_code,
            outcome: label.to_string(),
            output,
        };

        create_dir_all(&self.log_dir).context("Failed to create transcode log directory")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file_path())
            .context("Failed to open transcode log file")?;

        let json_line =
            serde_json::to_string(&entry).context("Failed to serialize transcode log entry")?;
        writeln!(file, "{json_line}").context("Failed to write to transcode log file")?;

        Ok(())
    }

    fn log_file_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// Entries newest first
    pub fn get_logs(&self) -> Result<Vec<TranscodeLog>> {
        let log_file = self.log_file_path();
        if !log_file.exists() {
            return Ok(Vec::new());
        }

        let content =
            std::fs::read_to_string(&log_file).context("Failed to read transcode log file")?;

        let mut logs = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let log: TranscodeLog =
                serde_json::from_str(line).context("Failed to parse transcode log entry")?;
            logs.push(log);
        }

        logs.reverse();
        Ok(logs)
    }

    pub fn clear_logs(&self) -> Result<()> {
        let log_file = self.log_file_path();
        if log_file.exists() {
            std::fs::remove_file(&log_file).context("Failed to remove transcode log file")?;
        }
        Ok(())
    }

    pub fn print_recent_logs(&self, limit: usize) -> Result<()> {
        let logs = self.get_logs()?;

        if logs.is_empty() {
            emit(
                Level::Info,
                "edit.logs.empty",
                "No transcode jobs recorded. Run commands with --debug to record them.",
                None,
            );
            return Ok(());
        }

        for (i, log) in logs.iter().take(limit).enumerate() {
            let time_str = log.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string();
            let mut text_block = format!(
                "#{} {} [{} / code {}]\n  {}",
                i + 1,
                time_str,
                log.outcome,
                log.return_code,
                log.command
            );
            if let Some(output) = &log.output {
                text_block.push_str(&format!("\n  -> {output}"));
            }

            let data = serde_json::json!({
                "index": i + 1,
                "timestamp": time_str,
                "command": log.command,
                "return_code": log.return_code,
                "outcome": log.outcome,
                "output": log.output,
            });
            emit(Level::Info, "edit.logs.entry", &text_block, Some(data));
        }

        Ok(())
    }
}
