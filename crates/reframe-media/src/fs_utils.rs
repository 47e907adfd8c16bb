//! Filesystem helpers for render artifacts.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// EXDEV on Linux and macOS.
const EXDEV: i32 = 18;

/// Move `src` to `dst`, creating the parent directory if needed.
///
/// Falls back to copy + remove when the rename crosses filesystems. The copy
/// lands in a sibling `.part` file first so `dst` never holds a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            let partial = dst.with_extension("part");
            fs::copy(src, &partial).await?;
            if let Err(e) = fs::rename(&partial, dst).await {
                remove_quietly(&partial).await;
                return Err(e.into());
            }
            remove_quietly(src).await;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Best-effort delete. A missing file is not an error; anything else is logged.
pub async fn remove_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Best-effort delete of every path in `paths`.
pub async fn remove_all_quietly<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        remove_quietly(path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("raw.mp4");
        let dst = dir.path().join("out").join("clip.mp4");

        fs::write(&src, b"frames").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("old.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_remove_quietly_ignores_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("seg_0.mp4");
        fs::write(&present, b"x").await.unwrap();

        remove_all_quietly(&[present.clone(), dir.path().join("never_written.mp4")]).await;
        assert!(!present.exists());
    }
}
