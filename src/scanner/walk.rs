//! Recursive directory traversal.

use futures::stream::Stream;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// A directory containing this file is skipped, together with everything below it.
pub const EXCLUDE_FILE_NAME: &str = ".indexignore";

/// A regular file found below a library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub file_size: i64,
    /// Unix time in milliseconds
    pub last_write_time: i64,
}

/// Streams every regular file below `root`, depth first.
///
/// The traversal runs on a blocking thread and stops as soon as the stream is
/// dropped. Unreadable entries are logged and skipped.
pub fn walk(root: PathBuf) -> impl Stream<Item = WalkedFile> {
    let (tx, rx) = mpsc::channel(100);

    tokio::task::spawn_blocking(move || {
        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.file_type().is_dir() || !e.path().join(EXCLUDE_FILE_NAME).exists());

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(target: "scanner::walk", root = %root.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(target: "scanner::walk", path = %entry.path().display(), error = %e, "Cannot stat file");
                    continue;
                }
            };
            let Some(last_write_time) = modified_millis(&metadata) else {
                tracing::warn!(target: "scanner::walk", path = %entry.path().display(), "Cannot read modification time");
                continue;
            };

            let file = WalkedFile {
                path: entry.into_path(),
                file_size: metadata.len() as i64,
                last_write_time,
            };

            // Receiver dropped: the scan was aborted
            if tx.blocking_send(file).is_err() {
                break;
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|file| (file, rx))
    })
}

/// Modification time of a file in unix milliseconds.
pub fn modified_millis(metadata: &std::fs::Metadata) -> Option<i64> {
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}

/// Whether `path` lies below one of `roots` without crossing an excluded directory.
pub fn is_within_roots(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| {
        path.starts_with(root)
            && path
                .ancestors()
                .skip(1)
                .take_while(|dir| dir.starts_with(root))
                .all(|dir| !dir.join(EXCLUDE_FILE_NAME).exists())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::fs::File;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_walk_finds_all_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("song.mp3")).unwrap();
        File::create(root.join("cover.jpg")).unwrap();
        File::create(root.join("UPPERCASE.OGG")).unwrap();

        let subdir = root.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("track.wav")).unwrap();

        let files: Vec<WalkedFile> = walk(root.to_path_buf()).collect().await;
        assert_eq!(files.len(), 4);

        let names: Vec<String> = files
            .iter()
            .filter_map(|f| f.path.file_name().and_then(|n| n.to_str()).map(|s| s.to_string()))
            .collect();
        assert!(names.contains(&"track.wav".to_string()));
        assert!(files.iter().all(|f| f.last_write_time > 0));
    }

    #[tokio::test]
    async fn test_walk_skips_excluded_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("kept.mp3")).unwrap();
        let hidden = root.join("hidden");
        std::fs::create_dir_all(hidden.join("deeper")).unwrap();
        File::create(hidden.join(EXCLUDE_FILE_NAME)).unwrap();
        File::create(hidden.join("skipped.mp3")).unwrap();
        File::create(hidden.join("deeper").join("skipped.flac")).unwrap();

        let files: Vec<WalkedFile> = walk(root.to_path_buf()).collect().await;
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("kept.mp3"));
    }

    #[tokio::test]
    async fn test_walk_missing_root_is_empty() {
        let files: Vec<WalkedFile> = walk(PathBuf::from("/nonexistent/music/root"))
            .collect()
            .await;
        assert!(files.is_empty());
    }

    #[test]
    fn test_is_within_roots() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let excluded = root.join("excluded");
        std::fs::create_dir_all(&excluded).unwrap();
        File::create(excluded.join(EXCLUDE_FILE_NAME)).unwrap();

        let roots = vec![root.clone()];
        assert!(is_within_roots(&root.join("a").join("b.mp3"), &roots));
        assert!(!is_within_roots(&excluded.join("b.mp3"), &roots));
        assert!(!is_within_roots(Path::new("/elsewhere/b.mp3"), &roots));
    }
}
