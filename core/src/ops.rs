use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// Filesystem mutations the pipelines need from their environment. Kept
/// behind a trait so tests and alternative platforms can substitute the
/// implementation.
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Copies `src` to `dst`, creating parent directories on demand.
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Creates `dst` as a symbolic link pointing at `src`.
    async fn create_link(&self, dst: &Path, src: &Path) -> Result<()>;

    async fn remove_file(&self, path: &Path) -> Result<()>;
}

/// [`FileOps`] over the local filesystem.
pub struct LocalOps;

#[async_trait]
impl FileOps for LocalOps {
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }

        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        let task = format!("copy '{}' to '{}'", src.display(), dst.display());

        // Copies must carry the source mtime over, or the next run's
        // size+mtime comparison would reclassify every copied file.
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mtime = std::fs::metadata(&src)?.modified()?;
            std::fs::copy(&src, &dst)?;

            let file = std::fs::OpenOptions::new().write(true).open(&dst)?;
            file.set_times(std::fs::FileTimes::new().set_modified(mtime))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("copy task panicked: {e}")))?
        .map_err(|e| Error::IoTask {
            task,
            message: e.to_string(),
        })
    }

    async fn create_link(&self, dst: &Path, src: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }

        #[cfg(unix)]
        let result = fs::symlink(src, dst).await;
        #[cfg(windows)]
        let result = fs::symlink_file(src, dst).await;

        result.map_err(|e| Error::IoTask {
            task: format!("link '{}' to '{}'", dst.display(), src.display()),
            message: e.to_string(),
        })
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(|e| Error::IoTask {
            task: format!("remove '{}'", path.display()),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("deep/nested/dst.txt");
        fs::write(&src, b"payload").await.unwrap();

        LocalOps.copy_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn copy_preserves_the_source_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"payload").await.unwrap();

        LocalOps.copy_file(&src, &dst).await.unwrap();

        let src_mtime = fs::metadata(&src).await.unwrap().modified().unwrap();
        let dst_mtime = fs::metadata(&dst).await.unwrap().modified().unwrap();
        assert_eq!(src_mtime, dst_mtime);
    }

    #[tokio::test]
    async fn remove_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalOps.remove_file(&dir.path().join("absent")).await;

        assert!(matches!(result, Err(Error::IoTask { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn link_points_at_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"payload").await.unwrap();

        LocalOps.create_link(&dst, &src).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"payload");
        assert!(fs::symlink_metadata(&dst)
            .await
            .unwrap()
            .file_type()
            .is_symlink());
    }
}
