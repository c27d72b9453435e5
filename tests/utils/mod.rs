use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Parse every stdout line as one JSON event
    pub fn events(&self) -> Result<Vec<serde_json::Value>> {
        self.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).with_context(|| format!("bad event: {line}")))
            .collect()
    }
}

fn vedit_command(env: &TestEnvironment, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_vedit"));
    command
        .args(args)
        .env("VEDIT_CONFIG_DIR", env.config_dir())
        .env("VEDIT_DATA_DIR", env.data_dir())
        .env("VEDIT_CACHE_DIR", env.cache_dir())
        .env("VEDIT_VIDEOS_DIR", env.videos_dir())
        .env("NO_COLOR", "1");
    command
}

fn collect(output: Output) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

pub fn run_vedit_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    Ok(collect(vedit_command(env, args).output()?))
}

/// Start several invocations together and wait for all of them
pub fn run_vedit_commands_concurrently(
    env: &TestEnvironment,
    invocations: &[&[&str]],
) -> Result<Vec<CommandOutput>> {
    let children = invocations
        .iter()
        .map(|args| {
            vedit_command(env, args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    children
        .into_iter()
        .map(|child| Ok(collect(child.wait_with_output()?)))
        .collect()
}

/// `vedit --output json status`, returning the session state payload
pub fn session_status(env: &TestEnvironment) -> Result<serde_json::Value> {
    let output = run_vedit_command(env, &["--output", "json", "status"])?;
    anyhow::ensure!(output.exit_code == 0, "status failed: {}", output.stderr);
    let events = output.events()?;
    let status = events
        .into_iter()
        .find(|event| event["code"] == "edit.status")
        .context("status event missing")?;
    Ok(status["data"].clone())
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
