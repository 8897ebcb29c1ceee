//! Moving rendered artifacts out of the work directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// EXDEV on Linux and macOS.
const EXDEV: i32 = 18;

/// Move a rendered file to its destination, replacing any existing file.
///
/// Tries a rename first. When source and destination live on different
/// filesystems the file is copied next to the destination under a `.partial`
/// name, renamed into place, and the source removed.
pub async fn move_artifact(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !fs::try_exists(src).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => {
            debug!(from = %src.display(), to = %dst.display(), "Moved artifact");
            Ok(())
        }
        Err(e) if e.raw_os_error() == Some(EXDEV) => copy_across_devices(src, dst).await,
        Err(e) => Err(e.into()),
    }
}

async fn copy_across_devices(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = partial_path(dst);

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(path = %src.display(), error = %e, "Could not remove source after copy");
    }

    debug!(from = %src.display(), to = %dst.display(), "Copied artifact across devices");
    Ok(())
}

/// `out.mp4` -> `out.mp4.partial`
fn partial_path(dst: &Path) -> PathBuf {
    let mut name: OsString = dst.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_move_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("final.mp4");
        let dst = dir.path().join("out").join("short.mp4");
        fs::write(&src, b"render").await.unwrap();

        assert_ok!(move_artifact(&src, &dst).await);

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"render");
    }

    #[tokio::test]
    async fn test_move_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("final.mp4");
        let dst = dir.path().join("short.mp4");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_artifact(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = move_artifact(dir.path().join("nope.mp4"), dir.path().join("x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_cross_device_copy_path() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp4");
        let dst = dir.path().join("b.mp4");
        fs::write(&src, b"data").await.unwrap();

        copy_across_devices(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(!partial_path(&dst).exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"data");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(partial_path(Path::new("out/short.mp4")), PathBuf::from("out/short.mp4.partial"));
    }
}
