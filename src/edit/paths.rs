use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::config::EditorConfig;
use super::error::EditError;
use super::types::MediaRef;
use crate::common::paths;

const SCRATCH_DIR_NAME: &str = "scratch";
const PERMANENT_PREFIX: &str = "VID";
const MAX_NAME_ATTEMPTS: usize = 8;
const WRITE_CHECK_PREFIX: &str = ".vedit-write-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// User-visible copy under the public videos folder
    Permanent,
    /// Intermediate result in the purgeable cache
    Scratch,
}

/// Directory roots handed to the resolver at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoots {
    pub videos_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl StorageRoots {
    pub fn new(videos_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            videos_dir: videos_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Config overrides first, then the platform directories
    pub fn discover(config: &EditorConfig) -> Result<Self> {
        let videos_dir = match &config.videos_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => paths::public_videos_dir()?,
        };
        let cache_dir = match &config.cache_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => paths::vedit_cache_dir()?,
        };
        Ok(Self::new(videos_dir, cache_dir))
    }
}

/// Maps media handles to transcoder paths and hands out fresh destinations
#[derive(Debug, Clone)]
pub struct PathResolver {
    permanent_dir: PathBuf,
    scratch_dir: PathBuf,
    extension: String,
}

impl PathResolver {
    pub fn new(roots: StorageRoots, output_folder: &str, extension: &str) -> Self {
        Self {
            permanent_dir: roots.videos_dir.join(output_folder),
            scratch_dir: roots.cache_dir.join(SCRATCH_DIR_NAME),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn output_dir(&self, kind: OutputKind) -> &Path {
        match kind {
            OutputKind::Permanent => &self.permanent_dir,
            OutputKind::Scratch => &self.scratch_dir,
        }
    }

    /// Map a handle to an existing file. Called for every job: a handle that
    /// resolved earlier may be gone now.
    pub fn resolve_source_path(&self, media: &MediaRef) -> Result<PathBuf, EditError> {
        if media.as_str().trim().is_empty() {
            return Err(EditError::unresolvable(media.as_str(), "empty media reference"));
        }

        let path = media.as_path();
        let metadata = fs::metadata(&path)
            .map_err(|err| EditError::unresolvable(media.as_str(), err.to_string()))?;
        if !metadata.is_file() {
            return Err(EditError::unresolvable(media.as_str(), "not a regular file"));
        }

        fs::canonicalize(&path).map_err(|err| EditError::unresolvable(media.as_str(), err.to_string()))
    }

    /// Create the output directory tree if needed and check that it takes
    /// new files; safe to call repeatedly
    pub fn ensure_output_directory(&self, kind: OutputKind) -> Result<PathBuf, EditError> {
        let dir = self.output_dir(kind);
        fs::create_dir_all(dir).map_err(|source| EditError::StorageUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;

        if !dir.is_dir() {
            return Err(EditError::StorageUnavailable {
                path: dir.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        // An existing directory may still refuse new files
        tempfile::Builder::new()
            .prefix(WRITE_CHECK_PREFIX)
            .tempfile_in(dir)
            .map_err(|source| EditError::StorageUnavailable {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(dir.to_path_buf())
    }

    /// A destination no other call has returned: random token plus the
    /// configured extension, re-drawn if the name already exists on disk
    pub fn new_destination_path(&self, kind: OutputKind) -> PathBuf {
        let dir = self.output_dir(kind);
        let mut candidate = dir.join(self.file_name(kind));
        for _ in 1..MAX_NAME_ATTEMPTS {
            if !candidate.exists() {
                break;
            }
            candidate = dir.join(self.file_name(kind));
        }
        candidate
    }

    fn file_name(&self, kind: OutputKind) -> String {
        let token = format!("{:032x}", rand::random::<u128>());
        match kind {
            OutputKind::Permanent => format!("{PERMANENT_PREFIX}{token}.{}", self.extension),
            OutputKind::Scratch => format!("{token}.{}", self.extension),
        }
    }

    pub fn is_scratch(&self, media: &MediaRef) -> bool {
        media.as_path().starts_with(&self.scratch_dir)
    }

    /// Remove the whole scratch area. Returns whether anything was deleted.
    pub fn purge_scratch(&self) -> Result<bool, EditError> {
        match fs::remove_dir_all(&self.scratch_dir) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(EditError::StorageUnavailable {
                path: self.scratch_dir.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(root: &TempDir) -> PathResolver {
        let roots = StorageRoots::new(root.path().join("Movies"), root.path().join("cache"));
        PathResolver::new(roots, "VideoEditor", "mp4")
    }

    #[test]
    fn destination_paths_are_unique_under_rapid_calls() {
        let root = TempDir::new().unwrap();
        let resolver = resolver(&root);

        for kind in [OutputKind::Permanent, OutputKind::Scratch] {
            let first = resolver.new_destination_path(kind);
            let second = resolver.new_destination_path(kind);
            assert_ne!(first, second);
            assert_eq!(first.extension().and_then(|e| e.to_str()), Some("mp4"));
        }
    }

    #[test]
    fn permanent_paths_live_in_the_movies_subfolder() {
        let root = TempDir::new().unwrap();
        let resolver = resolver(&root);

        let path = resolver.new_destination_path(OutputKind::Permanent);
        assert_eq!(path.parent(), Some(root.path().join("Movies/VideoEditor").as_path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("VID"), "unexpected name {name}");

        let scratch = resolver.new_destination_path(OutputKind::Scratch);
        assert!(resolver.is_scratch(&MediaRef::from_path(&scratch)));
    }

    #[test]
    fn ensure_output_directory_is_idempotent() {
        let root = TempDir::new().unwrap();
        let resolver = resolver(&root);

        let dir = resolver.ensure_output_directory(OutputKind::Permanent).unwrap();
        assert!(dir.is_dir());
        let again = resolver.ensure_output_directory(OutputKind::Permanent).unwrap();
        assert_eq!(dir, again);
    }

    #[test]
    fn ensure_output_directory_reports_storage_unavailable() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let roots = StorageRoots::new(blocker.join("Movies"), root.path().join("cache"));
        let resolver = PathResolver::new(roots, "VideoEditor", "mp4");

        let err = resolver.ensure_output_directory(OutputKind::Permanent).unwrap_err();
        assert!(matches!(err, EditError::StorageUnavailable { .. }));
    }

    #[test]
    fn missing_media_is_unresolvable() {
        let root = TempDir::new().unwrap();
        let resolver = resolver(&root);

        let missing = MediaRef::from_path(&root.path().join("gone.mp4"));
        assert!(matches!(
            resolver.resolve_source_path(&missing),
            Err(EditError::UnresolvableReference { .. })
        ));
        assert!(matches!(
            resolver.resolve_source_path(&MediaRef::new("")),
            Err(EditError::UnresolvableReference { .. })
        ));
    }

    #[test]
    fn purged_scratch_media_becomes_unresolvable() {
        let root = TempDir::new().unwrap();
        let resolver = resolver(&root);

        resolver.ensure_output_directory(OutputKind::Scratch).unwrap();
        let scratch = resolver.new_destination_path(OutputKind::Scratch);
        fs::write(&scratch, b"frames").unwrap();
        let media = MediaRef::from_path(&scratch);
        assert!(resolver.resolve_source_path(&media).is_ok());

        assert!(resolver.purge_scratch().unwrap());
        assert!(!resolver.purge_scratch().unwrap());
        assert!(matches!(
            resolver.resolve_source_path(&media),
            Err(EditError::UnresolvableReference { .. })
        ));
    }

    #[test]
    fn configured_roots_override_platform_directories() {
        let config = EditorConfig {
            videos_dir: Some("/srv/videos".to_string()),
            cache_dir: Some("~/vedit-cache".to_string()),
            ..EditorConfig::default()
        };

        let roots = StorageRoots::discover(&config).unwrap();
        assert_eq!(roots.videos_dir, PathBuf::from("/srv/videos"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(roots.cache_dir, home.join("vedit-cache"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn read_only_output_directory_is_storage_unavailable() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let resolver = resolver(&root);
        let dir = resolver.ensure_output_directory(OutputKind::Scratch).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users write through permission bits; nothing to check then
        let writable = fs::write(dir.join("privileged"), b"").is_ok();
        let result = resolver.ensure_output_directory(OutputKind::Scratch);
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            return;
        }

        assert!(matches!(
            result,
            Err(EditError::StorageUnavailable { path, .. }) if path == dir
        ));
        assert!(resolver.ensure_output_directory(OutputKind::Scratch).is_ok());
    }
}
