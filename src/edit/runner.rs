use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use duct::cmd;

use super::error::EditError;
use super::history::TranscodeLogger;
use super::logging::log_event;
use super::types::{MediaRef, TranscodeJob, TranscodeOutcome};
use crate::ui::prelude::Level;

pub const RETURN_CODE_SUCCESS: i32 = 0;
/// ffmpeg exits with 255 when interrupted
pub const RETURN_CODE_CANCEL: i32 = 255;
/// The transcoder could not be found or started
pub const RETURN_CODE_LAUNCH_FAILED: i32 = -1;
/// The command runner dropped the completion callback without calling it
pub const RETURN_CODE_ABANDONED: i32 = -2;

pub type CompletionCallback = Box<dyn FnOnce(i32) + Send + 'static>;

/// Runs one transcoder command on its own worker context and reports the
/// return code through `on_complete`, exactly once.
pub trait CommandRunner: Send + Sync {
    fn execute_async(&self, command: String, on_complete: CompletionCallback);
}

/// Runs the configured transcoder executable on a dedicated thread
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    program: String,
}

impl SystemCommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }
}

impl CommandRunner for SystemCommandRunner {
    fn execute_async(&self, command: String, on_complete: CompletionCallback) {
        let program = self.locate();
        let name = self.program.clone();

        let spawned = thread::Builder::new()
            .name("transcode-worker".to_string())
            .spawn(move || {
                let code = run_blocking(&name, program, &command);
                on_complete(code);
            });

        if let Err(err) = spawned {
            // The closure, and the callback with it, is dropped here; the
            // terminal guard reports the job as abandoned.
            log_event(
                Level::Error,
                "edit.runner.spawn",
                format!("Failed to start transcode worker: {err}"),
            );
        }
    }
}

fn run_blocking(name: &str, program: Option<PathBuf>, command: &str) -> i32 {
    let Some(program) = program else {
        log_event(
            Level::Error,
            "edit.runner.missing",
            format!("Transcoder '{name}' was not found on PATH"),
        );
        return RETURN_CODE_LAUNCH_FAILED;
    };

    let args = match shell_words::split(command) {
        Ok(args) => args,
        Err(err) => {
            log_event(
                Level::Error,
                "edit.runner.parse",
                format!("Could not parse transcoder command: {err}"),
            );
            return RETURN_CODE_LAUNCH_FAILED;
        }
    };

    let output = cmd(program.as_path(), &args)
        .stdin_null()
        .stdout_null()
        .stderr_capture()
        .unchecked()
        .run();

    match output {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if let Some(last) = stderr.lines().rev().find(|line| !line.trim().is_empty()) {
                log_event(Level::Debug, "edit.runner.stderr", last.trim());
            }
            // No exit code means the process was killed by a signal
            output.status.code().unwrap_or(RETURN_CODE_CANCEL)
        }
        Err(err) => {
            log_event(
                Level::Error,
                "edit.runner.launch",
                format!("Failed to launch {}: {err}", program.display()),
            );
            RETURN_CODE_LAUNCH_FAILED
        }
    }
}

/// Map the command runner's return-code contract onto a terminal outcome
pub fn outcome_from_code(code: i32, produced: &MediaRef) -> TranscodeOutcome {
    match code {
        RETURN_CODE_SUCCESS => TranscodeOutcome::Success(Some(produced.clone())),
        RETURN_CODE_CANCEL => TranscodeOutcome::Cancelled,
        other => TranscodeOutcome::Failed(other),
    }
}

type TerminalCallback = Box<dyn FnOnce(TranscodeOutcome) + Send + 'static>;

/// Delivers a job's outcome once: either from the runner's return code or,
/// if the runner drops its callback, as an abandoned failure.
struct TerminalGuard {
    callback: Option<TerminalCallback>,
    in_flight: Arc<AtomicBool>,
    produced: MediaRef,
    command: String,
    logger: Option<TranscodeLogger>,
}

impl TerminalGuard {
    fn fire(&mut self, code: i32) {
        let Some(callback) = self.callback.take() else {
            return;
        };

        let outcome = outcome_from_code(code, &self.produced);
        if let Some(logger) = &self.logger {
            if let Err(err) = logger.log_job(&self.command, code, &outcome) {
                log_event(
                    Level::Warn,
                    "edit.history.write",
                    format!("Failed to record transcode job: {err:#}"),
                );
            }
        }

        self.in_flight.store(false, Ordering::Release);
        callback(outcome);
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.callback.is_some() {
            log_event(
                Level::Warn,
                "edit.runner.abandoned",
                "Transcoder completion was dropped without a result",
            );
            self.fire(RETURN_CODE_ABANDONED);
        }
    }
}

/// Submits transcode jobs, one at a time
#[derive(Clone)]
pub struct JobRunner {
    runner: Arc<dyn CommandRunner>,
    in_flight: Arc<AtomicBool>,
    logger: Option<TranscodeLogger>,
}

impl JobRunner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            in_flight: Arc::new(AtomicBool::new(false)),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: TranscodeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start `command` for `job`. Returns immediately; `on_terminal` runs
    /// later on the runner's worker context, exactly once.
    pub fn submit(
        &self,
        job: &TranscodeJob,
        command: String,
        on_terminal: impl FnOnce(TranscodeOutcome) + Send + 'static,
    ) -> Result<(), EditError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EditError::SessionBusy);
        }

        log_event(
            Level::Debug,
            "edit.job.command",
            format!("{} {}", job.kind, command),
        );

        let mut guard = TerminalGuard {
            callback: Some(Box::new(on_terminal)),
            in_flight: Arc::clone(&self.in_flight),
            produced: MediaRef::from_path(&job.destination),
            command: command.clone(),
            logger: self.logger.clone(),
        };

        self.runner
            .execute_async(command, Box::new(move |code| guard.fire(code)));
        Ok(())
    }
}
