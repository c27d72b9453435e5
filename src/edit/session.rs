//! The edit session state machine.
//!
//! A session is `Idle` or `Editing`. Accepted intents move it to `Editing`
//! before anything else happens, and exactly one [`SessionEvent`] per accepted
//! intent moves it back. Runner callbacks arrive on worker threads; they only
//! post a [`Completion`] to the session's channel and every state change
//! happens when the owner drains that channel with [`EditSession::next_event`]
//! or [`EditSession::try_next_event`].

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::command;
use super::error::EditError;
use super::filters::{FilterCatalog, FilterId};
use super::logging::{log_event, log_event_with};
use super::paths::{OutputKind, PathResolver};
use super::runner::JobRunner;
use super::types::{
    EditSessionState, JobId, JobKind, MediaRef, PlaybackResumePoint, TranscodeJob,
    TranscodeOutcome,
};
use crate::ui::prelude::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Editing,
}

#[derive(Debug)]
struct Completion {
    job: JobId,
    result: Result<TranscodeOutcome, EditError>,
}

#[derive(Debug, Clone, Copy)]
struct PendingJob {
    id: JobId,
    kind: JobKind,
    filter: Option<FilterId>,
}

#[derive(Debug)]
pub enum EditOutcome {
    Success { output: MediaRef },
    Cancelled,
    Failed(EditError),
}

/// Terminal result of one accepted intent
#[derive(Debug)]
pub struct SessionEvent {
    pub job: JobId,
    pub kind: JobKind,
    pub filter: Option<FilterId>,
    pub outcome: EditOutcome,
    /// Media the session switched to, if the outcome replaced the current one
    adopted: Option<MediaRef>,
}

impl SessionEvent {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, EditOutcome::Success { .. })
    }

    /// Apply this outcome to `state`: the in-flight flag is cleared and only
    /// the fields the job changed are overwritten. Settling a freshly loaded
    /// snapshot keeps changes other processes made while the job ran.
    pub fn settle(&self, state: &mut EditSessionState) {
        state.job_in_flight = false;
        let Some(media) = &self.adopted else {
            return;
        };

        state.current_media = media.clone();
        state.resume = PlaybackResumePoint::UNSET;
        if self.kind == JobKind::ApplyFilter {
            state.filter.applied = self.filter.unwrap_or_default();
        }
    }

    /// User-facing message for this outcome
    pub fn notification(&self) -> String {
        match (&self.outcome, self.kind) {
            (EditOutcome::Success { output }, JobKind::SaveCopy) => {
                format!("Video saved at {output}")
            }
            (EditOutcome::Success { .. }, JobKind::ReplaceAudio) => {
                "Audio track replaced".to_string()
            }
            (EditOutcome::Success { .. }, JobKind::ApplyFilter) => {
                format!("{} filter applied", self.filter.unwrap_or_default())
            }
            (EditOutcome::Cancelled, _) => "Operation cancelled".to_string(),
            (EditOutcome::Failed(err), _) => format!("An error occurred: {err}"),
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.notification())
    }
}

pub struct EditSession {
    state: EditSessionState,
    pending: Option<PendingJob>,
    next_job: u64,
    resolver: PathResolver,
    jobs: JobRunner,
    catalog: FilterCatalog,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl EditSession {
    pub fn new(media: MediaRef, resolver: PathResolver, jobs: JobRunner) -> Self {
        Self::restore(EditSessionState::new(media), resolver, jobs)
    }

    /// Rebuild a session from a snapshot taken before the process died
    pub fn restore(state: EditSessionState, resolver: PathResolver, jobs: JobRunner) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            state,
            pending: None,
            next_job: 1,
            resolver,
            jobs,
            catalog: FilterCatalog::new(),
            completions_tx,
            completions_rx,
        }
    }

    pub fn snapshot(&self) -> EditSessionState {
        self.state.clone()
    }

    pub fn state(&self) -> &EditSessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        if self.state.job_in_flight {
            SessionPhase::Editing
        } else {
            SessionPhase::Idle
        }
    }

    pub fn is_editing(&self) -> bool {
        self.phase() == SessionPhase::Editing
    }

    /// True while a job started by this session still owes its outcome
    pub fn has_outstanding_job(&self) -> bool {
        self.pending.is_some()
    }

    pub fn current_media(&self) -> &MediaRef {
        &self.state.current_media
    }

    pub fn applied_filter(&self) -> FilterId {
        self.state.filter.applied
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn save_copy(&mut self) -> Result<JobId, EditError> {
        self.begin(JobKind::SaveCopy, None, None)
    }

    pub fn replace_audio(&mut self, audio: MediaRef) -> Result<JobId, EditError> {
        self.begin(JobKind::ReplaceAudio, None, Some(audio))
    }

    pub fn apply_filter(&mut self, filter: FilterId) -> Result<JobId, EditError> {
        if filter == FilterId::None {
            return Err(EditError::FilterNotSelectable(filter));
        }
        self.begin(JobKind::ApplyFilter, Some(filter), None)
    }

    /// Apply the filter shown at `position` in the catalog
    pub fn apply_catalog_filter(&mut self, position: usize) -> Result<JobId, EditError> {
        let entry = self
            .catalog
            .get(position)
            .ok_or(EditError::UnknownFilter(position))?;
        self.apply_filter(entry.filter)
    }

    /// Switch to a different source. The new media carries no filter.
    pub fn open_media(&mut self, media: MediaRef) -> Result<(), EditError> {
        if self.is_editing() {
            return Err(EditError::SessionBusy);
        }
        if media == self.state.current_media {
            return Ok(());
        }

        log_event(
            Level::Debug,
            "edit.session.open",
            format!("Switching media to {media}"),
        );
        self.state.current_media = media;
        self.state.filter.applied = FilterId::None;
        self.reset_resume_point();
        Ok(())
    }

    /// Delete the scratch area. Refused while a job may be writing into it.
    pub fn purge_scratch(&mut self) -> Result<bool, EditError> {
        if self.is_editing() {
            return Err(EditError::SessionBusy);
        }
        self.resolver.purge_scratch()
    }

    /// Clear an in-flight flag inherited from a snapshot whose job belonged
    /// to a process that no longer exists. Returns whether it was cleared.
    pub fn abandon_orphaned_job(&mut self) -> bool {
        if self.state.job_in_flight && self.pending.is_none() {
            self.state.job_in_flight = false;
            log_event(
                Level::Debug,
                "edit.session.recover",
                "Cleared in-flight flag left by an earlier process",
            );
            return true;
        }
        false
    }

    /// Record where playback stood just before the player goes away
    pub fn update_resume_point(
        &mut self,
        track_index: Option<u32>,
        position_millis: i64,
        should_autoplay: bool,
    ) {
        self.state.resume =
            PlaybackResumePoint::captured(track_index, position_millis, should_autoplay);
    }

    /// The stored point; it stays valid for repeated player rebuilds
    pub fn consume_resume_point(&self) -> PlaybackResumePoint {
        self.state.resume
    }

    pub fn reset_resume_point(&mut self) {
        self.state.resume = PlaybackResumePoint::UNSET;
    }

    fn begin(
        &mut self,
        kind: JobKind,
        filter: Option<FilterId>,
        audio: Option<MediaRef>,
    ) -> Result<JobId, EditError> {
        if self.state.job_in_flight || self.jobs.is_busy() {
            log_event(
                Level::Debug,
                "edit.session.busy",
                format!("Rejected {kind}: an edit is already in progress"),
            );
            return Err(EditError::SessionBusy);
        }

        self.state.job_in_flight = true;
        let id = JobId(self.next_job);
        self.next_job += 1;
        self.pending = Some(PendingJob { id, kind, filter });

        let submitted = self
            .prepare(kind, filter, audio.as_ref())
            .and_then(|job| self.submit(id, &job));

        if let Err(err) = submitted {
            log_event(
                Level::Debug,
                "edit.job.prepare",
                format!("Job {id} failed before reaching the transcoder: {err}"),
            );
            let _ = self.completions_tx.send(Completion {
                job: id,
                result: Err(err),
            });
        }

        Ok(id)
    }

    fn prepare(
        &self,
        kind: JobKind,
        filter: Option<FilterId>,
        audio: Option<&MediaRef>,
    ) -> Result<TranscodeJob, EditError> {
        let mut source_paths = vec![self.resolver.resolve_source_path(&self.state.current_media)?];
        if let Some(audio) = audio {
            source_paths.push(self.resolver.resolve_source_path(audio)?);
        }

        let output = match kind {
            JobKind::SaveCopy => OutputKind::Permanent,
            JobKind::ReplaceAudio | JobKind::ApplyFilter => OutputKind::Scratch,
        };
        self.resolver.ensure_output_directory(output)?;
        let destination = self.resolver.new_destination_path(output);

        Ok(TranscodeJob {
            kind,
            source_paths,
            destination,
            filter,
        })
    }

    fn submit(&self, id: JobId, job: &TranscodeJob) -> Result<(), EditError> {
        let command = command::build_for_job(job, self.state.filter.applied);
        let tx = self.completions_tx.clone();

        log_event_with(
            Level::Debug,
            "edit.job.submit",
            format!("Job {id}: {} -> {}", job.kind, job.destination.display()),
            serde_json::json!({
                "job": id.0,
                "kind": job.kind,
                "destination": job.destination,
            }),
        );

        self.jobs.submit(job, command, move |outcome| {
            // The receiver only goes away with the session itself
            let _ = tx.send(Completion {
                job: id,
                result: Ok(outcome),
            });
        })
    }

    /// Wait for the outstanding job's outcome and apply it. Returns `None`
    /// straight away when nothing is outstanding.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        while self.pending.is_some() {
            let completion = self.completions_rx.recv().await?;
            if let Some(event) = self.finish(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Apply an outcome that has already arrived, without waiting
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(event) = self.finish(completion) {
                return Some(event);
            }
        }
        None
    }

    fn finish(&mut self, completion: Completion) -> Option<SessionEvent> {
        let pending = match self.pending {
            Some(pending) if pending.id == completion.job => pending,
            _ => {
                log_event(
                    Level::Warn,
                    "edit.job.stale",
                    format!("Ignoring outcome of unknown job {}", completion.job),
                );
                return None;
            }
        };

        self.pending = None;

        let (outcome, adopted) = match completion.result {
            Ok(TranscodeOutcome::Success(produced)) => {
                let output = produced
                    .clone()
                    .unwrap_or_else(|| self.state.current_media.clone());
                let adopted = match pending.kind {
                    // The permanent copy is a side artifact
                    JobKind::SaveCopy => None,
                    JobKind::ReplaceAudio | JobKind::ApplyFilter => produced,
                };
                (EditOutcome::Success { output }, adopted)
            }
            Ok(TranscodeOutcome::Cancelled) => (EditOutcome::Cancelled, None),
            Ok(TranscodeOutcome::Failed(code)) => {
                (EditOutcome::Failed(EditError::TranscodeFailed(code)), None)
            }
            Err(err) => (EditOutcome::Failed(err), None),
        };

        let event = SessionEvent {
            job: pending.id,
            kind: pending.kind,
            filter: pending.filter,
            outcome,
            adopted,
        };
        event.settle(&mut self.state);

        log_event(
            Level::Debug,
            "edit.job.finish",
            format!("Job {} ({}): {}", event.job, event.kind, event.notification()),
        );
        Some(event)
    }
}
