use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::PlatformClass;
use crate::utils::available_path;

pub const SHARE_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Share failed: {0}")]
    Share(String),
}

/// A file handed to the platform share sheet.
#[derive(Debug)]
pub struct SharePayload<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub mime: &'a str,
    pub title: String,
    pub text: String,
}

/// The OS share surface. Cancellation by the user is reported as an error.
#[async_trait]
pub trait ShareSurface: Send + Sync {
    fn supports_files(&self) -> bool;
    async fn share(&self, payload: SharePayload<'_>) -> Result<(), SaveError>;

    /// Called once before a run hands over its first file.
    async fn begin_run(&self) -> Result<(), SaveError> {
        Ok(())
    }
}

/// Where a save actually ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedVia {
    File(PathBuf),
    Share,
}

/// A file that is removed when dropped unless kept.
struct StagedFile {
    path: PathBuf,
    keep: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.keep {
            // already renamed away on the happy path
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Writes straight into the save directory.
#[derive(Debug, Clone)]
pub struct DirectSave {
    dir: PathBuf,
}

impl DirectSave {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stage the bytes next to the target, then promote them under the first
    /// free name. The staging file is gone afterwards on every path.
    pub async fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, SaveError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let staged = StagedFile::new(self.dir.join(format!(".{}.part", filename)));
        tokio::fs::write(staged.path(), bytes).await?;

        let target = available_path(&self.dir, filename).await;
        tokio::fs::rename(staged.path(), &target).await?;

        tracing::debug!(path = %target.display(), "saved image");
        Ok(target)
    }
}

/// Hands files to Android's share sheet through the Termux `termux-share`
/// helper.
#[derive(Debug, Clone)]
pub struct TermuxShare {
    program: String,
    spool_dir: PathBuf,
}

impl TermuxShare {
    pub fn new(program: impl Into<String>, spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            spool_dir: spool_dir.into(),
        }
    }

    fn resolve_program(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl ShareSurface for TermuxShare {
    fn supports_files(&self) -> bool {
        self.resolve_program().is_some()
    }

    /// Files shared by an earlier run have been picked up by now.
    async fn begin_run(&self) -> Result<(), SaveError> {
        match tokio::fs::remove_dir_all(&self.spool_dir).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        tokio::fs::create_dir_all(&self.spool_dir).await?;
        Ok(())
    }

    async fn share(&self, payload: SharePayload<'_>) -> Result<(), SaveError> {
        let program = self
            .resolve_program()
            .ok_or_else(|| SaveError::Share(format!("{} not found", self.program)))?;

        tokio::fs::create_dir_all(&self.spool_dir).await?;
        // the receiving app reads the file after we return, so it stays
        // spooled unless the handoff fails
        let spooled = StagedFile::new(self.spool_dir.join(payload.filename));
        tokio::fs::write(spooled.path(), payload.bytes).await?;

        // termux-share has a single caption slot
        let caption = format!("{}: {}", payload.title, payload.text);
        tracing::debug!(%caption, "opening share sheet");
        let status = tokio::process::Command::new(program)
            .args(["-a", "send", "-c", payload.mime, "-t", caption.as_str()])
            .arg(spooled.path())
            .status()
            .await?;

        if !status.success() {
            return Err(SaveError::Share(format!("share exited with {}", status)));
        }
        spooled.keep();
        Ok(())
    }
}

/// How a finished JPEG leaves the application.
#[derive(Clone)]
pub enum SaveStrategy {
    Direct(DirectSave),
    ShareFirst {
        share: Arc<dyn ShareSurface>,
        direct: DirectSave,
        prefix: String,
    },
}

impl SaveStrategy {
    pub fn for_platform(
        platform: PlatformClass,
        dir: impl Into<PathBuf>,
        share: Arc<dyn ShareSurface>,
        prefix: &str,
    ) -> Self {
        let direct = DirectSave::new(dir);
        match platform {
            PlatformClass::Desktop | PlatformClass::Ios => SaveStrategy::Direct(direct),
            PlatformClass::Android => SaveStrategy::ShareFirst {
                share,
                direct,
                prefix: prefix.to_string(),
            },
        }
    }

    pub async fn persist(&self, bytes: &[u8], filename: &str) -> Result<SavedVia, SaveError> {
        match self {
            SaveStrategy::Direct(direct) => direct.save(bytes, filename).await.map(SavedVia::File),
            SaveStrategy::ShareFirst {
                share,
                direct,
                prefix,
            } => {
                if share.supports_files() {
                    let payload = SharePayload {
                        bytes,
                        filename,
                        mime: SHARE_MIME,
                        title: format!("{} images", prefix),
                        text: format!("Image {} from {}", filename, prefix),
                    };
                    match share.share(payload).await {
                        Ok(()) => return Ok(SavedVia::Share),
                        Err(e) => {
                            tracing::debug!(filename, error = %e, "share failed, saving directly")
                        }
                    }
                }
                direct.save(bytes, filename).await.map(SavedVia::File)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Share surface with scripted behaviour. Records `(filename, title, text)`
    /// of every payload it is handed.
    pub(crate) struct FakeShare {
        pub supports: bool,
        pub fails: bool,
        pub calls: AtomicUsize,
        pub runs: AtomicUsize,
        pub shared: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeShare {
        pub(crate) fn new(supports: bool, fails: bool) -> Self {
            Self {
                supports,
                fails,
                calls: AtomicUsize::new(0),
                runs: AtomicUsize::new(0),
                shared: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ShareSurface for FakeShare {
        fn supports_files(&self) -> bool {
            self.supports
        }

        async fn begin_run(&self) -> Result<(), SaveError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn share(&self, payload: SharePayload<'_>) -> Result<(), SaveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(payload.mime, "image/jpeg");
            self.shared.lock().unwrap().push((
                payload.filename.to_string(),
                payload.title,
                payload.text,
            ));
            if self.fails {
                Err(SaveError::Share("user cancelled".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_direct_save_leaves_only_the_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let direct = DirectSave::new(dir.path().join("out"));

        let path = direct.save(b"jpeg", "images_1.jpg").await.unwrap();
        assert_eq!(path, dir.path().join("out").join("images_1.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
        assert_eq!(entries(&dir.path().join("out")), vec!["images_1.jpg"]);
    }

    #[tokio::test]
    async fn test_direct_save_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let direct = DirectSave::new(dir.path());

        direct.save(b"one", "images_1.jpg").await.unwrap();
        let second = direct.save(b"two", "images_1.jpg").await.unwrap();

        assert_eq!(second, dir.path().join("images_1 (1).jpg"));
        assert_eq!(entries(dir.path()), vec!["images_1 (1).jpg", "images_1.jpg"]);
    }

    #[test]
    fn test_staged_file_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();

        let dropped = dir.path().join(".a.jpg.part");
        std::fs::write(&dropped, b"x").unwrap();
        drop(StagedFile::new(dropped.clone()));
        assert!(!dropped.exists());

        let kept = dir.path().join("b.jpg");
        std::fs::write(&kept, b"x").unwrap();
        StagedFile::new(kept.clone()).keep();
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_platforms_pick_their_strategy() {
        let share: Arc<dyn ShareSurface> = Arc::new(FakeShare::new(true, false));
        let dir = tempfile::tempdir().unwrap();

        for platform in [PlatformClass::Desktop, PlatformClass::Ios] {
            let strategy = SaveStrategy::for_platform(platform, dir.path(), share.clone(), "p");
            assert!(matches!(strategy, SaveStrategy::Direct(_)));
        }
        let strategy =
            SaveStrategy::for_platform(PlatformClass::Android, dir.path(), share, "p");
        assert!(matches!(strategy, SaveStrategy::ShareFirst { .. }));
    }

    #[tokio::test]
    async fn test_android_share_success_skips_direct_save() {
        let dir = tempfile::tempdir().unwrap();
        let share = Arc::new(FakeShare::new(true, false));
        let strategy = SaveStrategy::for_platform(
            PlatformClass::Android,
            dir.path(),
            share.clone(),
            "condo_park_1204",
        );

        let via = strategy.persist(b"jpeg", "condo_park_1204_1.jpg").await.unwrap();
        assert_eq!(via, SavedVia::Share);
        assert_eq!(share.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *share.shared.lock().unwrap(),
            vec![(
                "condo_park_1204_1.jpg".to_string(),
                "condo_park_1204 images".to_string(),
                "Image condo_park_1204_1.jpg from condo_park_1204".to_string(),
            )]
        );
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_android_share_failure_falls_back_to_direct_save() {
        let dir = tempfile::tempdir().unwrap();
        let share = Arc::new(FakeShare::new(true, true));
        let strategy = SaveStrategy::for_platform(
            PlatformClass::Android,
            dir.path(),
            share.clone(),
            "condo_park_1204",
        );

        let via = strategy.persist(b"jpeg", "condo_park_1204_1.jpg").await.unwrap();
        assert_eq!(via, SavedVia::File(dir.path().join("condo_park_1204_1.jpg")));
        assert_eq!(share.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_android_without_file_share_saves_directly() {
        let dir = tempfile::tempdir().unwrap();
        let share = Arc::new(FakeShare::new(false, false));
        let strategy = SaveStrategy::for_platform(
            PlatformClass::Android,
            dir.path(),
            share.clone(),
            "condo_park_1204",
        );

        let via = strategy.persist(b"jpeg", "x.jpg").await.unwrap();
        assert!(matches!(via, SavedVia::File(_)));
        assert_eq!(share.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_termux_share_unavailable_for_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let share = TermuxShare::new("/definitely/not/here/termux-share", dir.path());
        assert!(!share.supports_files());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_termux_share_passes_title_and_text_as_caption() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("termux-share");
        let args_file = dir.path().join("args.txt");
        std::fs::write(
            &program,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", args_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let spool = dir.path().join("spool");
        let share = TermuxShare::new(program.to_string_lossy(), &spool);
        assert!(share.supports_files());

        let payload = SharePayload {
            bytes: b"jpeg",
            filename: "condo_park_1204_1.jpg",
            mime: SHARE_MIME,
            title: "condo_park_1204 images".to_string(),
            text: "Image condo_park_1204_1.jpg from condo_park_1204".to_string(),
        };
        share.share(payload).await.unwrap();

        let args = std::fs::read_to_string(&args_file).unwrap();
        let args: Vec<&str> = args.lines().collect();
        let spooled = spool.join("condo_park_1204_1.jpg");
        assert_eq!(
            args,
            vec![
                "-a",
                "send",
                "-c",
                "image/jpeg",
                "-t",
                "condo_park_1204 images: Image condo_park_1204_1.jpg from condo_park_1204",
                spooled.to_str().unwrap(),
            ]
        );
        assert_eq!(std::fs::read(&spooled).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_termux_share_run_starts_with_empty_spool() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("spool");
        let share = TermuxShare::new("termux-share", &spool);

        share.begin_run().await.unwrap();
        assert!(entries(&spool).is_empty());

        std::fs::write(spool.join("condo_park_1204_1.jpg"), b"old").unwrap();
        std::fs::write(spool.join("images_3.jpg"), b"old").unwrap();
        share.begin_run().await.unwrap();
        assert!(entries(&spool).is_empty());
    }
}
