/// Filesystem access used by the resolver
///
/// Kept behind a trait so tests can inject listing and read failures.

use std::future::Future;
use std::io;
use std::path::Path;

use crate::state::ImageEntry;

pub trait ImageSource {
    /// List the entries directly inside `dir` (not recursive).
    fn list_entries(&self, dir: &Path) -> impl Future<Output = io::Result<Vec<ImageEntry>>> + Send;

    /// Read the whole file at `path`.
    fn read_bytes(&self, path: &Path) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// The real filesystem, through tokio's async fs API
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

impl ImageSource for TokioFs {
    async fn list_entries(&self, dir: &Path) -> io::Result<Vec<ImageEntry>> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let is_file = entry.file_type().await?.is_file();
            entries.push(ImageEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_file,
            });
        }

        Ok(entries)
    }

    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}
