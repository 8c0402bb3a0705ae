//! Directory moves that work across filesystems.

use std::io;
use std::path::{Path, PathBuf};

/// Rename `from` to `to`, copying and deleting when they are on different
/// filesystems.
pub(crate) async fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "Rename crosses devices, copying");
            copy_dir(from, to).await?;
            tokio::fs::remove_dir_all(from).await
        }
        Err(e) => Err(e),
    }
}

/// Recursively copy the directory `from` to the new directory `to`.
///
/// Symlinks are followed.
pub(crate) async fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());
            if tokio::fs::metadata(&src_path).await?.is_dir() {
                pending.push((src_path, dst_path));
            } else {
                tokio::fs::copy(&src_path, &dst_path).await?;
            }
        }
    }
    Ok(())
}

/// Remove a file, treating "not found" as success.
pub(crate) async fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[tokio::test]
    async fn test_copy_dir_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("top.md"), "top").unwrap();
        fs::write(src.join("a/b/deep.md"), "deep").unwrap();

        let dst = dir.path().join("dst");
        copy_dir(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(dst.join("top.md")).unwrap(), "top");
        assert_eq!(fs::read_to_string(dst.join("a/b/deep.md")).unwrap(), "deep");
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_move_dir_same_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("f"), "x").unwrap();

        let dst = dir.path().join("dst");
        move_dir(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("f")).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_file_if_exists(&dir.path().join("nope")).await.unwrap();
    }
}
