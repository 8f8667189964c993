//! Local media cache for note attachments.
//!
//! # Responsibility
//! - Copy attached images and voice recordings into per-user app-private
//!   directories under fresh unique names.
//! - Delete cached files when they are detached, replaced, or their note is
//!   deleted.
//! - Resolve edit-flow media changes against the previously stored path,
//!   staging new files so a failed save can be undone.
//!
//! # Invariants
//! - Layout is `<root>/<owner>/images/<uuid>.jpg` and
//!   `<root>/<owner>/audios/<uuid>.<ext>`.
//! - A cached path belongs to exactly one note, so deleting it is always
//!   safe.
//! - Deleting an absent file is a silent no-op.

use crate::model::draft::{MediaChange, MediaSource};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use url::Url;
use uuid::Uuid;

const IMAGE_DIR_NAME: &str = "images";
const AUDIO_DIR_NAME: &str = "audios";
const IMAGE_EXTENSION: &str = "jpg";
const DEFAULT_AUDIO_EXTENSION: &str = "3gp";

pub type MediaResult<T> = Result<T, MediaError>;

/// Media cache failures.
#[derive(Debug)]
pub enum MediaError {
    /// Owner id cannot be used as a directory name.
    InvalidOwner(String),
    /// URI scheme other than `file` (or a malformed `file://` URI).
    UnsupportedUri(String),
    /// Source could not be read.
    ReadSource { path: PathBuf, source: io::Error },
    /// Destination could not be created or written.
    Write { path: PathBuf, source: io::Error },
    /// Cached file could not be removed.
    Delete { path: PathBuf, source: io::Error },
}

impl Display for MediaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOwner(owner) => write!(f, "invalid media owner id `{owner}`"),
            Self::UnsupportedUri(uri) => write!(f, "unsupported media uri `{uri}`"),
            Self::ReadSource { path, source } => {
                write!(f, "cannot read media source `{}`: {source}", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "cannot write cached media `{}`: {source}", path.display())
            }
            Self::Delete { path, source } => {
                write!(f, "cannot delete cached media `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for MediaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReadSource { source, .. }
            | Self::Write { source, .. }
            | Self::Delete { source, .. } => Some(source),
            Self::InvalidOwner(_) | Self::UnsupportedUri(_) => None,
        }
    }
}

/// Kind of attachment, which picks the subdirectory and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Image => IMAGE_DIR_NAME,
            Self::Audio => AUDIO_DIR_NAME,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    fn extension_for(self, source: Option<&Path>) -> String {
        match self {
            Self::Image => IMAGE_EXTENSION.to_string(),
            Self::Audio => source
                .and_then(Path::extension)
                .and_then(|ext| ext.to_str())
                .filter(|ext| !ext.is_empty())
                .unwrap_or(DEFAULT_AUDIO_EXTENSION)
                .to_string(),
        }
    }
}

/// One media slot resolved by [`MediaCache::stage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedMedia {
    /// Path the note references once saved.
    pub path: Option<String>,
    created: Option<String>,
    superseded: Option<String>,
}

impl StagedMedia {
    fn unchanged(path: Option<String>) -> Self {
        Self {
            path,
            created: None,
            superseded: None,
        }
    }
}

/// Filesystem cache rooted at an app-private directory.
#[derive(Debug, Clone)]
pub struct MediaCache {
    root: PathBuf,
}

impl MediaCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `owner`'s media of `kind`.
    pub fn kind_dir(&self, owner_id: &str, kind: MediaKind) -> MediaResult<PathBuf> {
        validate_owner(owner_id)?;
        Ok(self.root.join(owner_id).join(kind.dir_name()))
    }

    /// Copies an image given as a filesystem path or `file://` URI.
    pub fn store_image_from_uri(&self, owner_id: &str, uri: &str) -> MediaResult<String> {
        let source = resolve_source_path(uri)?;
        self.copy_into(owner_id, MediaKind::Image, &source)
    }

    /// Writes already encoded image bytes.
    pub fn store_image_from_bytes(&self, owner_id: &str, bytes: &[u8]) -> MediaResult<String> {
        self.write_into(owner_id, MediaKind::Image, None, bytes)
    }

    /// Copies a recorded audio clip, keeping its extension (default `3gp`).
    pub fn store_audio_from_file(&self, owner_id: &str, path: &str) -> MediaResult<String> {
        let source = resolve_source_path(path)?;
        self.copy_into(owner_id, MediaKind::Audio, &source)
    }

    /// Stores media of `kind` from any supported source.
    pub fn store(
        &self,
        owner_id: &str,
        kind: MediaKind,
        source: &MediaSource,
    ) -> MediaResult<String> {
        match source {
            MediaSource::Uri(uri) => {
                let path = resolve_source_path(uri)?;
                self.copy_into(owner_id, kind, &path)
            }
            MediaSource::Bytes(bytes) => self.write_into(owner_id, kind, None, bytes),
        }
    }

    /// Removes a cached file if present.
    ///
    /// Returns `true` when a file was actually deleted.
    pub fn delete_if_exists(&self, path: &str) -> MediaResult<bool> {
        let target = Path::new(path);
        match fs::remove_file(target) {
            Ok(()) => {
                debug!("event=media_delete module=media status=ok");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                error!("event=media_delete module=media status=error error={err}");
                Err(MediaError::Delete {
                    path: target.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Resolves one media slot of an edit against its previous path.
    ///
    /// - `Keep` reuses `previous`.
    /// - `Remove` deletes `previous` and clears the slot.
    /// - `Attach` reuses `previous` when the source is that same file,
    ///   otherwise stores the new media and deletes `previous`.
    pub fn apply_change(
        &self,
        owner_id: &str,
        kind: MediaKind,
        previous: Option<&str>,
        change: &MediaChange,
    ) -> MediaResult<Option<String>> {
        let staged = self.stage(owner_id, kind, previous, change)?;
        self.release_superseded(&staged)?;
        Ok(staged.path)
    }

    /// Like [`MediaCache::apply_change`] but deletes nothing yet.
    ///
    /// New media is written; the previous file stays on disk until
    /// [`MediaCache::release_superseded`]. [`MediaCache::rollback`] undoes
    /// the staging instead.
    pub fn stage(
        &self,
        owner_id: &str,
        kind: MediaKind,
        previous: Option<&str>,
        change: &MediaChange,
    ) -> MediaResult<StagedMedia> {
        let previous = previous.map(str::to_string);
        match change {
            MediaChange::Keep => Ok(StagedMedia::unchanged(previous)),
            MediaChange::Remove => Ok(StagedMedia {
                path: None,
                created: None,
                superseded: previous,
            }),
            MediaChange::Attach(source) => {
                if let (Some(old), MediaSource::Uri(uri)) = (previous.as_deref(), source) {
                    if refers_to(uri, old) {
                        return Ok(StagedMedia::unchanged(previous));
                    }
                }
                let stored = self.store(owner_id, kind, source)?;
                Ok(StagedMedia {
                    path: Some(stored.clone()),
                    created: Some(stored),
                    superseded: previous,
                })
            }
        }
    }

    /// Deletes the file a staged change replaced or removed.
    pub fn release_superseded(&self, staged: &StagedMedia) -> MediaResult<bool> {
        match staged.superseded.as_deref() {
            Some(old) => self.delete_if_exists(old),
            None => Ok(false),
        }
    }

    /// Deletes the file a staged change wrote, leaving the previous one.
    pub fn rollback(&self, staged: &StagedMedia) -> MediaResult<bool> {
        match staged.created.as_deref() {
            Some(new) => self.delete_if_exists(new),
            None => Ok(false),
        }
    }

    fn copy_into(&self, owner_id: &str, kind: MediaKind, source: &Path) -> MediaResult<String> {
        let bytes = fs::read(source).map_err(|err| {
            error!(
                "event=media_store module=media status=error kind={} error_code=read_failed error={err}",
                kind.label()
            );
            MediaError::ReadSource {
                path: source.to_path_buf(),
                source: err,
            }
        })?;
        self.write_into(owner_id, kind, Some(source), &bytes)
    }

    fn write_into(
        &self,
        owner_id: &str,
        kind: MediaKind,
        source: Option<&Path>,
        bytes: &[u8],
    ) -> MediaResult<String> {
        let dir = self.kind_dir(owner_id, kind)?;
        fs::create_dir_all(&dir).map_err(|err| MediaError::Write {
            path: dir.clone(),
            source: err,
        })?;

        let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension_for(source));
        let destination = dir.join(file_name);
        fs::write(&destination, bytes).map_err(|err| {
            error!(
                "event=media_store module=media status=error kind={} error_code=write_failed error={err}",
                kind.label()
            );
            MediaError::Write {
                path: destination.clone(),
                source: err,
            }
        })?;

        info!(
            "event=media_store module=media status=ok kind={} bytes={}",
            kind.label(),
            bytes.len()
        );
        Ok(destination.to_string_lossy().into_owned())
    }
}

/// Turns a plain path or `file://` URI into a filesystem path.
fn resolve_source_path(reference: &str) -> MediaResult<PathBuf> {
    let trimmed = reference.trim();
    if trimmed.starts_with("file:") {
        let url = Url::parse(trimmed).map_err(|_| MediaError::UnsupportedUri(trimmed.to_string()))?;
        return url
            .to_file_path()
            .map_err(|()| MediaError::UnsupportedUri(trimmed.to_string()));
    }
    if trimmed.contains("://") {
        return Err(MediaError::UnsupportedUri(trimmed.to_string()));
    }
    Ok(PathBuf::from(trimmed))
}

fn refers_to(reference: &str, stored_path: &str) -> bool {
    if reference == stored_path {
        return true;
    }
    resolve_source_path(reference)
        .map(|path| path == Path::new(stored_path))
        .unwrap_or(false)
}

fn validate_owner(owner_id: &str) -> MediaResult<()> {
    let mut components = Path::new(owner_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(MediaError::InvalidOwner(owner_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_source_path, MediaCache, MediaError, MediaKind};
    use crate::model::draft::{MediaChange, MediaSource};
    use std::path::{Path, PathBuf};

    #[test]
    fn owner_must_be_a_single_path_segment() {
        let cache = MediaCache::new("/data");
        for bad in ["", "..", "a/b", "/abs"] {
            assert!(matches!(
                cache.kind_dir(bad, MediaKind::Image),
                Err(MediaError::InvalidOwner(_))
            ));
        }
        assert_eq!(
            cache.kind_dir("user-1", MediaKind::Audio).unwrap(),
            PathBuf::from("/data/user-1/audios")
        );
    }

    #[test]
    fn audio_extension_defaults_to_3gp() {
        assert_eq!(MediaKind::Audio.extension_for(None), "3gp");
        assert_eq!(
            MediaKind::Audio.extension_for(Some(PathBuf::from("/tmp/rec.m4a").as_path())),
            "m4a"
        );
        assert_eq!(
            MediaKind::Image.extension_for(Some(PathBuf::from("/tmp/x.png").as_path())),
            "jpg"
        );
    }

    #[test]
    fn file_uris_resolve_and_other_schemes_are_rejected() {
        assert_eq!(
            resolve_source_path("file:///tmp/pic.jpg").unwrap(),
            PathBuf::from("/tmp/pic.jpg")
        );
        assert_eq!(
            resolve_source_path("/tmp/pic.jpg").unwrap(),
            PathBuf::from("/tmp/pic.jpg")
        );
        assert!(matches!(
            resolve_source_path("content://media/external/images/1"),
            Err(MediaError::UnsupportedUri(_))
        ));
    }

    #[test]
    fn staged_replacement_keeps_previous_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        let old = cache.store_image_from_bytes("user-1", b"old").unwrap();
        let change = MediaChange::Attach(MediaSource::Bytes(b"new".to_vec()));

        let staged = cache
            .stage("user-1", MediaKind::Image, Some(&old), &change)
            .unwrap();
        let new = staged.path.clone().unwrap();
        assert!(Path::new(&old).exists());
        assert!(Path::new(&new).exists());

        assert!(cache.rollback(&staged).unwrap());
        assert!(!Path::new(&new).exists());
        assert!(Path::new(&old).exists());

        let staged = cache
            .stage("user-1", MediaKind::Image, Some(&old), &change)
            .unwrap();
        assert!(cache.release_superseded(&staged).unwrap());
        assert!(!Path::new(&old).exists());
    }

    #[test]
    fn staged_removal_deletes_nothing_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        let old = cache.store_image_from_bytes("user-1", b"old").unwrap();

        let staged = cache
            .stage("user-1", MediaKind::Image, Some(&old), &MediaChange::Remove)
            .unwrap();
        assert_eq!(staged.path, None);
        assert!(!cache.rollback(&staged).unwrap());
        assert!(Path::new(&old).exists());
    }
}
