use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::common::config::DocumentedConfig;
use crate::common::paths;
use crate::documented_config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Transcoder executable (ffmpeg-compatible command line)
    pub transcoder: String,
    /// Media player used by `vedit preview`
    pub player: String,
    /// Subfolder of the public videos directory for saved copies
    pub output_folder: String,
    /// Container extension for every produced file
    pub output_extension: String,
    /// Override for the public videos directory
    pub videos_dir: Option<String>,
    /// Override for the cache root holding scratch files
    pub cache_dir: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            transcoder: Self::DEFAULT_TRANSCODER.to_string(),
            player: Self::DEFAULT_PLAYER.to_string(),
            output_folder: Self::DEFAULT_OUTPUT_FOLDER.to_string(),
            output_extension: Self::DEFAULT_OUTPUT_EXTENSION.to_string(),
            videos_dir: None,
            cache_dir: None,
        }
    }
}

impl EditorConfig {
    pub const DEFAULT_TRANSCODER: &'static str = "ffmpeg";
    pub const DEFAULT_PLAYER: &'static str = "mpv";
    pub const DEFAULT_OUTPUT_FOLDER: &'static str = "VideoEditor";
    pub const DEFAULT_OUTPUT_EXTENSION: &'static str = "mp4";

    pub fn load() -> Result<Self> {
        Self::load_from_path(<Self as DocumentedConfig>::config_path()?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = <Self as DocumentedConfig>::load_from_path_documented(path.as_ref())?;
        Ok(config.sanitized())
    }

    /// Blank values fall back to their defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.transcoder.trim().is_empty() {
            self.transcoder = defaults.transcoder;
        }
        if self.player.trim().is_empty() {
            self.player = defaults.player;
        }
        if self.output_folder.trim().is_empty() {
            self.output_folder = defaults.output_folder;
        }
        let extension = self.output_extension.trim().trim_start_matches('.');
        self.output_extension = if extension.is_empty() {
            defaults.output_extension
        } else {
            extension.to_string()
        };
        self
    }
}

documented_config!(EditorConfig {
    fields: [
        transcoder, "Transcoder executable (ffmpeg-compatible)",
        player, "Media player used for previews",
        output_folder, "Subfolder of your videos directory for saved copies",
        output_extension, "Container extension for produced files",
    ],
    optional: [
        videos_dir, "Override for the public videos directory",
        cache_dir, "Override for the cache root holding scratch files",
    ],
    config_path: editor_config_path(),
});

fn editor_config_path() -> Result<PathBuf> {
    Ok(paths::vedit_config_dir()?.join("editor.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_config_is_written_with_documentation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("editor.toml");

        let config = EditorConfig::load_from_path(&path).unwrap();
        assert_eq!(config, EditorConfig::default());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("transcoder = \"ffmpeg\"  # Transcoder executable"));
        assert!(written.contains("# cache_dir = \"\""));
        assert_eq!(EditorConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("editor.toml");
        fs::write(
            &path,
            "transcoder = \"/opt/ffmpeg/bin/ffmpeg\"\noutput_folder = \" \"\noutput_extension = \".mkv\"\n",
        )
        .unwrap();

        let config = EditorConfig::load_from_path(&path).unwrap();
        assert_eq!(config.transcoder, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.output_folder, EditorConfig::DEFAULT_OUTPUT_FOLDER);
        assert_eq!(config.output_extension, "mkv");
        assert_eq!(config.player, EditorConfig::DEFAULT_PLAYER);
    }
}
