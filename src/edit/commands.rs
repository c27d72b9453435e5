use std::sync::Arc;

use anyhow::{Context, Result, bail};

use super::cli::{AudioArgs, EditCommands, FilterArgs, LogsArgs, OpenArgs};
use super::config::EditorConfig;
use super::error::EditError;
use super::history::TranscodeLogger;
use super::paths::{PathResolver, StorageRoots};
use super::player::{MpvPlayer, initialize_player, teardown_player};
use super::runner::{JobRunner, SystemCommandRunner};
use super::session::{EditOutcome, EditSession, SessionEvent};
use super::store::SessionStore;
use super::types::{JobId, MediaRef};
use crate::common::paths;
use crate::ui::is_debug_enabled;
use crate::ui::prelude::*;

const BUSY_HINT: &str =
    "An edit is already in progress. Wait for it to finish, or run `vedit recover` if its process is gone.";

pub async fn handle_edit_command(command: EditCommands) -> Result<()> {
    let ctx = EditContext::load()?;
    match command {
        EditCommands::Open(args) => handle_open(&ctx, args),
        EditCommands::Status => handle_status(&ctx),
        EditCommands::Filters => handle_filters(&ctx),
        EditCommands::Filter(args) => handle_filter(&ctx, args).await,
        EditCommands::Audio(args) => handle_audio(&ctx, args).await,
        EditCommands::Save => run_intent(&ctx, |session| session.save_copy()).await,
        EditCommands::Preview => handle_preview(&ctx),
        EditCommands::ClearCache => handle_clear_cache(&ctx),
        EditCommands::Recover => handle_recover(&ctx),
        EditCommands::Close => handle_close(&ctx),
        EditCommands::Logs(args) => handle_logs(&ctx, args),
    }
}

/// Everything a command needs, built once per invocation
struct EditContext {
    config: EditorConfig,
    store: SessionStore,
    resolver: PathResolver,
    logger: TranscodeLogger,
}

impl EditContext {
    fn load() -> Result<Self> {
        let config = EditorConfig::load()?;
        let roots = StorageRoots::discover(&config)?;
        let resolver = PathResolver::new(roots, &config.output_folder, &config.output_extension);
        let logger = TranscodeLogger::new(paths::vedit_data_dir()?.join("logs"), is_debug_enabled());

        Ok(Self {
            store: SessionStore::default_location()?,
            config,
            resolver,
            logger,
        })
    }

    fn job_runner(&self) -> JobRunner {
        JobRunner::new(Arc::new(SystemCommandRunner::new(self.config.transcoder.clone())))
            .with_logger(self.logger.clone())
    }

    fn restore_session(&self) -> Result<Option<EditSession>> {
        let Some(state) = self.store.load()? else {
            return Ok(None);
        };
        Ok(Some(EditSession::restore(
            state,
            self.resolver.clone(),
            self.job_runner(),
        )))
    }

    fn require_session(&self) -> Result<EditSession> {
        self.restore_session()?
            .context("No active editing session. Run `vedit open <video>` first.")
    }

    fn persist(&self, session: &EditSession) -> Result<()> {
        self.store.save(&session.snapshot())
    }
}

fn busy_aware(err: EditError) -> anyhow::Error {
    match err {
        EditError::SessionBusy => anyhow::anyhow!(BUSY_HINT),
        other => other.into(),
    }
}

fn handle_open(ctx: &EditContext, args: OpenArgs) -> Result<()> {
    let video = std::fs::canonicalize(&args.video)
        .with_context(|| format!("Video {} not found", args.video.display()))?;
    if !video.is_file() {
        bail!("{} is not a file", video.display());
    }
    let media = MediaRef::from_path(&video);

    let _lock = ctx.store.lock()?;
    let session = match ctx.restore_session()? {
        Some(mut session) => {
            session.open_media(media.clone()).map_err(busy_aware)?;
            session
        }
        None => EditSession::new(media.clone(), ctx.resolver.clone(), ctx.job_runner()),
    };
    ctx.persist(&session)?;

    emit(
        Level::Success,
        "edit.session.open",
        &format!("Editing {media}"),
        Some(serde_json::json!({ "media": media })),
    );
    Ok(())
}

fn handle_status(ctx: &EditContext) -> Result<()> {
    let Some(session) = ctx.restore_session()? else {
        emit(
            Level::Info,
            "edit.status.none",
            "No active editing session.",
            None,
        );
        return Ok(());
    };

    let state = session.state();
    let resume = if state.resume.is_unset() {
        "from the start".to_string()
    } else {
        format!(
            "track {} at {:.1}s{}",
            state.resume.track_index.unwrap_or(0),
            state.resume.position_millis.unwrap_or(0) as f64 / 1000.0,
            if state.resume.should_autoplay { "" } else { " (paused)" }
        )
    };
    let mut text = format!(
        "Media:   {}\nFilter:  {}\nResume:  {}\nStatus:  {}",
        state.current_media,
        state.filter.applied,
        resume,
        if session.is_editing() { "editing" } else { "idle" }
    );
    if let Err(err) = session.resolver().resolve_source_path(&state.current_media) {
        text.push_str(&format!("\nWarning: {err}"));
    }

    emit(
        Level::Info,
        "edit.status",
        &text,
        Some(serde_json::to_value(state).context("serializing session state")?),
    );
    Ok(())
}

fn handle_filters(ctx: &EditContext) -> Result<()> {
    let session = ctx.restore_session()?;
    let catalog = session
        .as_ref()
        .map(|session| *session.catalog())
        .unwrap_or_default();
    let applied = session.as_ref().map(EditSession::applied_filter);
    let applied_position = applied.and_then(|filter| catalog.position_of(filter));

    for (position, entry) in catalog.list().iter().enumerate() {
        let is_applied = applied_position == Some(position);
        let marker = if is_applied { " (applied)" } else { "" };
        emit(
            Level::Info,
            "edit.filters.entry",
            &format!("{position}  {}{marker}", entry.filter),
            Some(serde_json::json!({
                "position": position,
                "filter": entry.filter,
                "code": entry.filter.code(),
                "asset": entry.display_asset,
                "applied": is_applied,
            })),
        );
    }
    Ok(())
}

async fn handle_filter(ctx: &EditContext, args: FilterArgs) -> Result<()> {
    match (args.filter, args.index) {
        (Some(filter), _) => run_intent(ctx, move |session| session.apply_filter(filter)).await,
        (None, Some(index)) => {
            run_intent(ctx, move |session| session.apply_catalog_filter(index)).await
        }
        (None, None) => bail!("Pass a filter name or --index"),
    }
}

async fn handle_audio(ctx: &EditContext, args: AudioArgs) -> Result<()> {
    let audio = std::fs::canonicalize(&args.audio)
        .with_context(|| format!("Audio source {} not found", args.audio.display()))?;
    let audio = MediaRef::from_path(&audio);
    run_intent(ctx, move |session| session.replace_audio(audio)).await
}

/// Submit one intent, persist the in-flight state so other invocations see
/// it, then block until the outcome arrives
async fn run_intent(
    ctx: &EditContext,
    intent: impl FnOnce(&mut EditSession) -> Result<JobId, EditError>,
) -> Result<()> {
    let (mut session, job) = {
        let _lock = ctx.store.lock()?;
        let mut session = ctx.require_session()?;
        let job = intent(&mut session).map_err(busy_aware)?;
        ctx.persist(&session)?;
        (session, job)
    };

    emit(
        Level::Info,
        "edit.job.started",
        "Processing... (Ctrl-C cancels)",
        Some(serde_json::json!({ "job": job.0 })),
    );

    let event = match session.try_next_event() {
        Some(event) => Some(event),
        None => wait_for_event(&mut session).await,
    };
    let Some(event) = event else {
        bail!("Transcode job {job} finished without an outcome");
    };

    settle_snapshot(ctx, &session, &event)?;
    report_event(&event)
}

/// Write the outcome back without clobbering what other invocations stored
/// while the job ran
fn settle_snapshot(ctx: &EditContext, session: &EditSession, event: &SessionEvent) -> Result<()> {
    let _lock = ctx.store.lock()?;
    let mut latest = ctx.store.load()?.unwrap_or_else(|| session.snapshot());
    event.settle(&mut latest);
    ctx.store.save(&latest)
}

async fn wait_for_event(session: &mut EditSession) -> Option<SessionEvent> {
    while session.has_outstanding_job() {
        tokio::select! {
            event = session.next_event() => return event,
            _ = tokio::signal::ctrl_c() => {
                // The transcoder receives the same interrupt and reports the cancel
                emit(
                    Level::Warn,
                    "edit.job.interrupt",
                    "Interrupt received, waiting for the transcoder to stop",
                    None,
                );
            }
        }
    }
    None
}

fn report_event(event: &SessionEvent) -> Result<()> {
    let message = event.notification();
    let mut data = serde_json::json!({
        "job": event.job.0,
        "kind": event.kind,
        "filter": event.filter,
    });

    match &event.outcome {
        EditOutcome::Success { output } => data["output"] = serde_json::json!(output),
        EditOutcome::Cancelled => {}
        EditOutcome::Failed(err) => {
            if let Some(code) = err.code() {
                data["code"] = serde_json::json!(code);
            }
            emit(Level::Debug, "edit.job.failed", &message, Some(data));
            bail!(message)
        }
    }

    if event.is_success() {
        emit(Level::Success, "edit.job.success", &message, Some(data));
    } else {
        emit(Level::Warn, "edit.job.cancelled", &message, Some(data));
    }
    Ok(())
}

fn handle_preview(ctx: &EditContext) -> Result<()> {
    let mut session = ctx.require_session()?;
    let media = session.current_media().clone();
    session.resolver().resolve_source_path(&media)?;

    let mut player = MpvPlayer::new(ctx.config.player.clone());
    initialize_player(&session, &mut player)?;
    let played = player.wait_for_exit();
    teardown_player(&mut session, &mut player);
    played?;

    // An edit in another process may have replaced the media meanwhile
    let _lock = ctx.store.lock()?;
    let Some(mut latest) = ctx.store.load()? else {
        return Ok(());
    };
    if latest.current_media == media {
        latest.resume = session.consume_resume_point();
        ctx.store.save(&latest)?;
    }
    Ok(())
}

fn handle_clear_cache(ctx: &EditContext) -> Result<()> {
    let _lock = ctx.store.lock()?;
    let (removed, current) = match ctx.restore_session()? {
        Some(mut session) => {
            let removed = session.purge_scratch().map_err(busy_aware)?;
            (removed, Some(session.current_media().clone()))
        }
        None => (ctx.resolver.purge_scratch()?, None),
    };

    let message = if removed {
        "Cache cleared"
    } else {
        "Cache was already empty"
    };
    emit(Level::Success, "edit.cache.clear", message, None);

    if let Some(media) = current.filter(|media| ctx.resolver.is_scratch(media)) {
        emit(
            Level::Warn,
            "edit.cache.current",
            &format!("The current media {media} was an intermediate file; run `vedit open` to pick a video again"),
            None,
        );
    }
    Ok(())
}

fn handle_recover(ctx: &EditContext) -> Result<()> {
    let _lock = ctx.store.lock()?;
    let mut session = ctx.require_session()?;
    if session.abandon_orphaned_job() {
        ctx.persist(&session)?;
        emit(
            Level::Success,
            "edit.session.recover",
            "Cleared the in-progress flag; the session accepts edits again",
            None,
        );
    } else {
        emit(
            Level::Info,
            "edit.session.recover",
            "No stuck edit found",
            None,
        );
    }
    Ok(())
}

fn handle_close(ctx: &EditContext) -> Result<()> {
    let _lock = ctx.store.lock()?;
    if let Some(state) = ctx.store.load()? {
        if state.job_in_flight {
            bail!(BUSY_HINT);
        }
    }

    let message = if ctx.store.clear()? {
        "Session closed"
    } else {
        "No active editing session."
    };
    emit(Level::Success, "edit.session.close", message, None);
    Ok(())
}

fn handle_logs(ctx: &EditContext, args: LogsArgs) -> Result<()> {
    if args.clear {
        ctx.logger.clear_logs()?;
        emit(Level::Success, "edit.logs.clear", "Transcode log cleared", None);
        return Ok(());
    }
    ctx.logger.print_recent_logs(args.limit)
}
