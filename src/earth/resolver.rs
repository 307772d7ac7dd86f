/// Latest earth image lookup
///
/// Scans the image directory once, picks the newest capture, loads it and
/// prepares everything the UI needs to show it. The resolver holds no state
/// between calls and never touches the application store; the caller
/// decides whether and where to publish the result.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::encode::to_data_uri;
use super::pattern::{select_latest, CaptureTime};
use super::source::ImageSource;
use crate::state::ResolvedImage;

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Nothing to show yet. Not a failure from the user's point of view.
    #[error("no earth image found in {}", .dir.display())]
    NoImageFound { dir: PathBuf },

    #[error("failed to list image directory {}", .dir.display())]
    ListFailed {
        dir: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to read image {}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// A selected name lost its date/time groups. Indicates a bug in the
    /// filename rules, never bad input.
    #[error("selected image name {name:?} has no capture time")]
    PatternMismatch { name: String },
}

impl ResolveError {
    /// True for outcomes that only mean "nothing to show"
    pub fn is_soft(&self) -> bool {
        matches!(self, ResolveError::NoImageFound { .. })
    }
}

/// Find, load and encode the newest `earth_YYYYMMDD_HHMM_black.png` in `dir`.
///
/// Listing and reading are the only suspension points. Any failure leaves
/// nothing half-built: either a complete [`ResolvedImage`] comes back or an error.
pub async fn resolve_latest<S: ImageSource>(source: &S, dir: &Path) -> Result<ResolvedImage, ResolveError> {
    let entries = source.list_entries(dir).await.map_err(|e| ResolveError::ListFailed {
        dir: dir.to_path_buf(),
        source: Arc::new(e),
    })?;

    let name = select_latest(&entries)
        .ok_or_else(|| ResolveError::NoImageFound { dir: dir.to_path_buf() })?
        .to_string();
    let path = dir.join(&name);

    let bytes = source.read_bytes(&path).await.map_err(|e| ResolveError::ReadFailed {
        path: path.clone(),
        source: Arc::new(e),
    })?;

    let capture = CaptureTime::from_name(&name)
        .ok_or_else(|| ResolveError::PatternMismatch { name: name.clone() })?;

    Ok(ResolvedImage {
        encoded_data: to_data_uri(&bytes),
        absolute_path: path,
        local_timestamp: capture.to_local_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earth::encode::from_data_uri;
    use crate::earth::pattern::LOCAL_TIME_FORMAT;
    use crate::earth::source::TokioFs;
    use crate::state::{AppState, ImageEntry};
    use chrono::{Local, NaiveDateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// In-memory directory with optional failure injection
    #[derive(Default)]
    struct FakeSource {
        entries: Vec<ImageEntry>,
        files: HashMap<PathBuf, Vec<u8>>,
        list_error: Option<io::ErrorKind>,
    }

    impl FakeSource {
        fn with_file(mut self, dir: &Path, name: &str, bytes: &[u8]) -> Self {
            self.entries.push(ImageEntry { name: name.to_string(), is_file: true });
            self.files.insert(dir.join(name), bytes.to_vec());
            self
        }

        /// Listed but unreadable
        fn with_broken_file(mut self, name: &str) -> Self {
            self.entries.push(ImageEntry { name: name.to_string(), is_file: true });
            self
        }
    }

    impl ImageSource for FakeSource {
        async fn list_entries(&self, _dir: &Path) -> io::Result<Vec<ImageEntry>> {
            match self.list_error {
                Some(kind) => Err(io::Error::from(kind)),
                None => Ok(self.entries.clone()),
            }
        }

        async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[tokio::test]
    async fn test_resolves_newest_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("earth_20240101_0000_black.png"), b"old").unwrap();
        fs::write(dir.path().join("earth_20240102_2359_black.png"), b"new").unwrap();
        fs::write(dir.path().join("earth_20231231_2359_black.png"), b"older").unwrap();
        fs::write(dir.path().join("earth_20240103_0000.png"), b"unbordered").unwrap();
        fs::create_dir(dir.path().join("tiles")).unwrap();

        let image = resolve_latest(&TokioFs, dir.path()).await.unwrap();

        assert_eq!(image.absolute_path, dir.path().join("earth_20240102_2359_black.png"));
        assert_eq!(image.encoded_data, "data:image/png;base64,bmV3");
        assert_eq!(from_data_uri(&image.encoded_data).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_local_timestamp_matches_capture_instant() {
        let dir = PathBuf::from("/images");
        let source = FakeSource::default().with_file(&dir, "earth_20240713_1230_black.png", b"png");

        let image = resolve_latest(&source, &dir).await.unwrap();

        let naive = NaiveDateTime::parse_from_str(&image.local_timestamp, LOCAL_TIME_FORMAT).unwrap();
        let local = Local.from_local_datetime(&naive).earliest().unwrap();
        assert_eq!(local.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 7, 13, 12, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_invalid_date_still_resolves() {
        let dir = PathBuf::from("/images");
        let source = FakeSource::default().with_file(&dir, "earth_20241301_1230_black.png", b"png");

        let image = resolve_latest(&source, &dir).await.unwrap();
        assert_eq!(image.local_timestamp, "Invalid Date");
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let err = resolve_latest(&TokioFs, dir.path()).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoImageFound { .. }));
        assert!(err.is_soft());
    }

    #[tokio::test]
    async fn test_no_matching_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("earth_2024011_1230_black.png"), b"x").unwrap();
        fs::write(dir.path().join("foo_20240101_1230_black.png"), b"x").unwrap();

        let err = resolve_latest(&TokioFs, dir.path()).await.unwrap_err();
        assert!(err.is_soft());
    }

    #[tokio::test]
    async fn test_list_failure() {
        let source = FakeSource { list_error: Some(io::ErrorKind::NotFound), ..Default::default() };
        let err = resolve_latest(&source, Path::new("/missing")).await.unwrap_err();
        assert!(matches!(err, ResolveError::ListFailed { .. }));
        assert!(!err.is_soft());
    }

    #[tokio::test]
    async fn test_read_failure_of_selected_file() {
        let dir = PathBuf::from("/images");
        // The older file is readable, the newest is not; no fallback happens
        let source = FakeSource::default()
            .with_file(&dir, "earth_20240101_0000_black.png", b"old")
            .with_broken_file("earth_20240102_0000_black.png");

        let err = resolve_latest(&source, &dir).await.unwrap_err();
        match err {
            ResolveError::ReadFailed { path, source } => {
                assert_eq!(path, dir.join("earth_20240102_0000_black.png"));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_failure_leaves_published_state() {
        let dir = PathBuf::from("/images");
        let mut state = AppState::default();

        let good = FakeSource::default().with_file(&dir, "earth_20240101_0000_black.png", b"old");
        let ticket = state.begin_resolution();
        let image = resolve_latest(&good, &dir).await.unwrap();
        assert!(state.publish(ticket, image));
        let before = state.preview().cloned();

        let broken = FakeSource::default()
            .with_file(&dir, "earth_20240101_0000_black.png", b"old")
            .with_broken_file("earth_20240102_0000_black.png");
        let ticket = state.begin_resolution();
        if let Ok(image) = resolve_latest(&broken, &dir).await {
            state.publish(ticket, image);
        }

        assert_eq!(state.preview().cloned(), before);
    }

    #[tokio::test]
    async fn test_no_image_leaves_published_state() {
        let mut state = AppState::default();
        let dir = tempdir().unwrap();

        let ticket = state.begin_resolution();
        if let Ok(image) = resolve_latest(&TokioFs, dir.path()).await {
            state.publish(ticket, image);
        }

        assert!(state.preview().is_none());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("earth_20240713_1230_black.png"), [1u8, 2, 3, 4]).unwrap();

        let first = resolve_latest(&TokioFs, dir.path()).await.unwrap();
        let second = resolve_latest(&TokioFs, dir.path()).await.unwrap();
        assert_eq!(first, second);
    }
}
