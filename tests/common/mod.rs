use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated set of vedit directories plus a sample video to edit
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let env = Self { temp_dir };

        fs::create_dir_all(env.media_dir())?;
        fs::write(env.sample_video(), b"sample video")?;
        fs::write(env.sample_audio(), b"sample audio")?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path().join("config")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join("cache")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.path().join("Videos")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.path().join("media")
    }

    pub fn sample_video(&self) -> PathBuf {
        self.media_dir().join("clip.mp4")
    }

    pub fn sample_audio(&self) -> PathBuf {
        self.media_dir().join("track.mp3")
    }

    pub fn session_file(&self) -> PathBuf {
        self.data_dir().join("session.json")
    }

    /// Point the editor at a different transcoder executable
    pub fn use_transcoder(&self, program: &Path) -> Result<()> {
        fs::create_dir_all(self.config_dir())?;
        fs::write(
            self.config_dir().join("editor.toml"),
            format!("transcoder = {:?}\nplayer = \"true\"\n", program.display().to_string()),
        )?;
        Ok(())
    }

    /// Write a transcoder script that writes its last argument and exits
    /// with `exit_code`
    #[cfg(unix)]
    pub fn fake_transcoder(&self, exit_code: i32) -> Result<PathBuf> {
        self.slow_fake_transcoder(exit_code, 0)
    }

    /// Like `fake_transcoder`, but each run is recorded in `invocations_log`
    /// and takes `delay_secs` seconds
    #[cfg(unix)]
    pub fn slow_fake_transcoder(&self, exit_code: i32, delay_secs: u32) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let script = self
            .path()
            .join(format!("fake-ffmpeg-{exit_code}-{delay_secs}"));
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$$ $*\" >> {log:?}\nsleep {delay_secs}\nfor last; do :; done\necho transcoded > \"$last\"\nexit {exit_code}\n",
                log = self.invocations_log().display().to_string(),
            ),
        )?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        Ok(script)
    }

    pub fn invocations_log(&self) -> PathBuf {
        self.path().join("transcoder-invocations.log")
    }

    pub fn transcoder_runs(&self) -> usize {
        fs::read_to_string(self.invocations_log())
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}
