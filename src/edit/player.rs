use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use super::session::EditSession;
use super::types::MediaRef;

/// Playback engine driven by the edit session's resume point
pub trait Player {
    fn load(&mut self, media: &MediaRef) -> Result<()>;
    fn seek_to(&mut self, track_index: u32, position_millis: u64);
    fn set_autoplay(&mut self, autoplay: bool);
    fn current_position(&self) -> i64;
    fn current_track_index(&self) -> u32;
    fn is_playing(&self) -> bool;
    fn release(&mut self);
}

/// (Re)build the player for the session's current media, continuing from
/// the stored resume point when there is one
pub fn initialize_player(session: &EditSession, player: &mut dyn Player) -> Result<()> {
    let resume = session.consume_resume_point();
    player.set_autoplay(resume.should_autoplay);
    if let Some(position) = resume.position_millis {
        player.seek_to(resume.track_index.unwrap_or(0), position);
    }
    player.load(session.current_media())
}

/// Capture where playback stands, then release the player
pub fn teardown_player(session: &mut EditSession, player: &mut dyn Player) {
    session.update_resume_point(
        Some(player.current_track_index()),
        player.current_position(),
        player.is_playing(),
    );
    player.release();
}

const IPC_TIMEOUT: Duration = Duration::from_millis(500);
const IPC_POLL_INTERVAL: Duration = Duration::from_millis(250);
const TIME_POS_REQUEST: u64 = 1;
const PAUSE_REQUEST: u64 = 2;
const DURATION_REQUEST: u64 = 3;

/// Last playback state reported by mpv
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlaybackSample {
    position_millis: Option<u64>,
    paused: Option<bool>,
    duration_millis: Option<u64>,
}

impl PlaybackSample {
    fn merge(&mut self, newer: PlaybackSample) {
        self.position_millis = newer.position_millis.or(self.position_millis);
        self.paused = newer.paused.or(self.paused);
        self.duration_millis = newer.duration_millis.or(self.duration_millis);
    }
}

/// Plays media in an external mpv window and samples its playback state
/// over mpv's JSON IPC socket while the window is open. Without samples the
/// position falls back to the start offset plus the time spent playing.
pub struct MpvPlayer {
    program: String,
    ipc_socket: PathBuf,
    start_millis: u64,
    autoplay: bool,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    sample: PlaybackSample,
    child: Option<Child>,
}

impl MpvPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        let ipc_socket =
            std::env::temp_dir().join(format!("vedit-mpv-{}.sock", std::process::id()));
        Self {
            program: program.into(),
            ipc_socket,
            start_millis: 0,
            autoplay: true,
            started_at: None,
            stopped_at: None,
            sample: PlaybackSample::default(),
            child: None,
        }
    }

    /// Block until the user closes the player window
    pub fn wait_for_exit(&mut self) -> Result<()> {
        loop {
            let Some(child) = self.child.as_mut() else {
                return Ok(());
            };
            let exited = child
                .try_wait()
                .with_context(|| format!("Failed to wait for {}", self.program))?;

            if let Some(status) = exited {
                self.stopped_at = Some(Instant::now());
                self.child = None;
                if !status.success() {
                    bail!("{} exited with status {:?}", self.program, status.code());
                }
                return Ok(());
            }

            self.sample_playback();
            thread::sleep(IPC_POLL_INTERVAL);
        }
    }

    fn sample_playback(&mut self) {
        // The socket appears a moment after mpv starts
        if let Ok(sample) = query_playback(&self.ipc_socket) {
            self.sample.merge(sample);
        }
    }

    fn remove_socket(&self) {
        let _ = fs::remove_file(&self.ipc_socket);
    }
}

fn seconds_to_millis(value: &serde_json::Value) -> Option<u64> {
    value
        .as_f64()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0).round() as u64)
}

/// Ask mpv for position, pause state and duration in one round trip
fn query_playback(socket: &Path) -> Result<PlaybackSample> {
    let stream = UnixStream::connect(socket)
        .with_context(|| format!("Failed to connect to mpv at {}", socket.display()))?;
    stream.set_read_timeout(Some(IPC_TIMEOUT))?;
    stream.set_write_timeout(Some(IPC_TIMEOUT))?;

    let mut writer = stream.try_clone()?;
    for (request_id, property) in [
        (TIME_POS_REQUEST, "time-pos"),
        (PAUSE_REQUEST, "pause"),
        (DURATION_REQUEST, "duration"),
    ] {
        let request = serde_json::json!({
            "command": ["get_property", property],
            "request_id": request_id,
        });
        writeln!(writer, "{request}")?;
    }

    let mut sample = PlaybackSample::default();
    let mut answered = 0;
    for line in BufReader::new(stream).lines() {
        let line = line?;
        let Ok(reply) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        // Unsolicited events carry no request id
        let Some(request_id) = reply.get("request_id").and_then(|id| id.as_u64()) else {
            continue;
        };

        let data = reply.get("data");
        match request_id {
            TIME_POS_REQUEST => sample.position_millis = data.and_then(seconds_to_millis),
            PAUSE_REQUEST => sample.paused = data.and_then(|paused| paused.as_bool()),
            DURATION_REQUEST => sample.duration_millis = data.and_then(seconds_to_millis),
            _ => continue,
        }
        answered += 1;
        if answered == 3 {
            break;
        }
    }
    Ok(sample)
}

impl Player for MpvPlayer {
    fn load(&mut self, media: &MediaRef) -> Result<()> {
        self.remove_socket();
        let mut command = Command::new(&self.program);
        command
            .arg("--force-window=immediate")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", self.ipc_socket.display()))
            .arg(format!("--start={:.3}", self.start_millis as f64 / 1000.0));
        if !self.autoplay {
            command.arg("--pause");
        }
        let child = command
            .arg(media.as_path())
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}. Install it for previews.", self.program))?;

        self.started_at = Some(Instant::now());
        self.stopped_at = None;
        self.sample = PlaybackSample::default();
        self.child = Some(child);
        Ok(())
    }

    fn seek_to(&mut self, _track_index: u32, position_millis: u64) {
        self.start_millis = position_millis;
    }

    fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    fn current_position(&self) -> i64 {
        let position = match self.sample.position_millis {
            Some(position) => position,
            None => {
                let elapsed = match (self.autoplay, self.started_at) {
                    (true, Some(started)) => self
                        .stopped_at
                        .unwrap_or_else(Instant::now)
                        .duration_since(started)
                        .as_millis() as u64,
                    _ => 0,
                };
                self.start_millis.saturating_add(elapsed)
            }
        };

        let position = match self.sample.duration_millis {
            Some(duration) => position.min(duration),
            None => position,
        };
        position as i64
    }

    fn current_track_index(&self) -> u32 {
        0
    }

    fn is_playing(&self) -> bool {
        self.sample.paused.map(|paused| !paused).unwrap_or(self.autoplay)
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.started_at = None;
        self.stopped_at = None;
        self.remove_socket();
    }
}
