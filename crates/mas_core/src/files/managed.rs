//! Input and output files owned by a job.
//!
//! A `ManagedFile` starts as the raw path the user typed. During validation
//! it is resolved either as an input (must exist, extension must be accepted)
//! or as an output (directory must exist, file name chosen so it collides
//! with nothing on disk and nothing claimed). Only a resolved file can be
//! locked, and a locked file is released exactly once.

use std::fs;
use std::path::{Path, PathBuf};

use super::lock::ResourceLock;
use super::types::{FileRole, FileType};
use crate::jobs::{JobError, JobResult};

/// A fully computed path split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute directory.
    pub directory: PathBuf,
    /// File name without extension.
    pub stem: String,
    /// Extension without the leading dot.
    pub extension: String,
}

impl ResolvedPath {
    /// `directory/stem.extension`.
    pub fn full_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.stem, self.extension))
    }
}

/// One input or output path of a job.
#[derive(Debug)]
pub struct ManagedFile {
    origin: PathBuf,
    role: Option<FileRole>,
    resolved: Option<ResolvedPath>,
    locked: bool,
}

impl ManagedFile {
    /// Wrap a candidate path. Nothing is touched until resolution.
    pub fn new(origin: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            role: None,
            resolved: None,
            locked: false,
        }
    }

    /// The path as originally given.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Role assigned by resolution.
    pub fn role(&self) -> Option<FileRole> {
        self.role
    }

    pub fn resolved(&self) -> Option<&ResolvedPath> {
        self.resolved.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Full resolved path, if resolved.
    pub fn full_path(&self) -> Option<PathBuf> {
        self.resolved.as_ref().map(ResolvedPath::full_path)
    }

    /// Base name without extension, if resolved.
    pub fn stem(&self) -> Option<&str> {
        self.resolved.as_ref().map(|r| r.stem.as_str())
    }

    /// Extension, if resolved.
    pub fn extension(&self) -> Option<&str> {
        self.resolved.as_ref().map(|r| r.extension.as_str())
    }

    /// Resolve as an input file.
    ///
    /// Fails with `InputNotFound` if the path is not an existing file and
    /// with `IncorrectFileType` if its extension is not in `allowed`.
    pub fn resolve_as_input(&mut self, allowed: &[FileType]) -> JobResult<()> {
        self.ensure_unlocked("resolve")?;

        if !self.origin.is_file() {
            return Err(JobError::InputNotFound {
                path: self.origin.clone(),
            });
        }
        let canonical = fs::canonicalize(&self.origin).map_err(|_| JobError::InputNotFound {
            path: self.origin.clone(),
        })?;

        let extension = canonical
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let accepted = FileType::from_extension(&extension)
            .map(|t| allowed.contains(&t))
            .unwrap_or(false);
        if !accepted {
            return Err(JobError::IncorrectFileType {
                path: canonical,
                extension,
                allowed: allowed
                    .iter()
                    .map(|t| t.extension())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let stem = canonical
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        self.role = Some(FileRole::Input);
        self.resolved = Some(ResolvedPath {
            directory,
            stem,
            extension,
        });
        Ok(())
    }

    /// Resolve as an output file inside the directory given at construction.
    ///
    /// Tries `base_hint.extension`; if that exists on disk or is claimed,
    /// appends `_0`, `_1`, ... until a free name is found.
    pub fn resolve_as_output(
        &mut self,
        base_hint: &str,
        extension: &str,
        lock: &ResourceLock,
    ) -> JobResult<()> {
        self.ensure_unlocked("resolve")?;

        if !self.origin.is_dir() {
            return Err(JobError::OutputDirectoryNotFound {
                path: self.origin.clone(),
            });
        }
        let directory =
            fs::canonicalize(&self.origin).map_err(|_| JobError::OutputDirectoryNotFound {
                path: self.origin.clone(),
            })?;

        let taken = |stem: &str| {
            let candidate = directory.join(format!("{}.{}", stem, extension));
            candidate.exists() || lock.is_claimed(&candidate)
        };

        let stem = if !taken(base_hint) {
            base_hint.to_string()
        } else {
            let mut index: u64 = 0;
            loop {
                let candidate = format!("{}_{}", base_hint, index);
                if !taken(&candidate) {
                    break candidate;
                }
                index += 1;
            }
        };

        self.role = Some(FileRole::Output);
        self.resolved = Some(ResolvedPath {
            directory,
            stem,
            extension: extension.to_string(),
        });
        Ok(())
    }

    /// Claim the resolved path in `lock`.
    pub fn acquire_lock(&mut self, lock: &ResourceLock) -> JobResult<()> {
        let path = self.require_resolved("lock")?;
        if self.locked {
            return Err(JobError::invalid_file_state(format!(
                "{} is already locked",
                path.display()
            )));
        }
        if !lock.try_claim(&path) {
            return Err(JobError::ResourceInUse {
                role: self.role.unwrap_or(FileRole::Input),
                path,
            });
        }
        self.locked = true;
        Ok(())
    }

    /// Give the claim back. Does nothing if this file holds no claim.
    pub fn release_lock(&mut self, lock: &ResourceLock) -> JobResult<()> {
        let path = self.require_resolved("unlock")?;
        if self.locked {
            lock.release(&path);
            self.locked = false;
        }
        Ok(())
    }

    fn require_resolved(&self, action: &str) -> JobResult<PathBuf> {
        self.full_path().ok_or_else(|| {
            JobError::invalid_file_state(format!(
                "cannot {} unresolved file {}",
                action,
                self.origin.display()
            ))
        })
    }

    fn ensure_unlocked(&self, action: &str) -> JobResult<()> {
        if self.locked {
            return Err(JobError::invalid_file_state(format!(
                "cannot {} {} while it is locked",
                action,
                self.origin.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn input_resolution_splits_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cat.photo.png");
        fs::write(&path, b"png").unwrap();

        let mut file = ManagedFile::new(&path);
        file.resolve_as_input(&[FileType::Png]).unwrap();

        let resolved = file.resolved().unwrap();
        assert_eq!(resolved.stem, "cat.photo");
        assert_eq!(resolved.extension, "png");
        assert_eq!(resolved.directory, fs::canonicalize(dir.path()).unwrap());
        assert_eq!(file.role(), Some(FileRole::Input));
    }

    #[test]
    fn missing_input_is_not_found() {
        let dir = tempdir().unwrap();
        let mut file = ManagedFile::new(dir.path().join("nope.png"));

        let err = file.resolve_as_input(&[FileType::Png]).unwrap_err();
        assert!(matches!(err, JobError::InputNotFound { .. }));
        assert!(!file.is_resolved());
    }

    #[test]
    fn directory_as_input_is_not_found() {
        let dir = tempdir().unwrap();
        let mut file = ManagedFile::new(dir.path());

        let err = file.resolve_as_input(&[FileType::Png]).unwrap_err();
        assert!(matches!(err, JobError::InputNotFound { .. }));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"mp4").unwrap();

        let mut file = ManagedFile::new(&path);
        let err = file
            .resolve_as_input(&[FileType::Png, FileType::Gif])
            .unwrap_err();
        match err {
            JobError::IncorrectFileType {
                extension, allowed, ..
            } => {
                assert_eq!(extension, "mp4");
                assert_eq!(allowed, "png, gif");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn output_in_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let lock = ResourceLock::new();
        let mut file = ManagedFile::new(dir.path().join("missing"));

        let err = file.resolve_as_output("out", "png", &lock).unwrap_err();
        assert!(matches!(err, JobError::OutputDirectoryNotFound { .. }));
    }

    #[test]
    fn output_resolution_is_idempotent_while_name_is_free() {
        let dir = tempdir().unwrap();
        let lock = ResourceLock::new();

        let mut first = ManagedFile::new(dir.path());
        first.resolve_as_output("pic_Asciify", "txt", &lock).unwrap();
        let mut second = ManagedFile::new(dir.path());
        second.resolve_as_output("pic_Asciify", "txt", &lock).unwrap();

        assert_eq!(first.full_path(), second.full_path());
        assert_eq!(first.stem(), Some("pic_Asciify"));
    }

    #[test]
    fn output_skips_names_on_disk() {
        let dir = tempdir().unwrap();
        let lock = ResourceLock::new();
        fs::write(dir.path().join("pic_Asciify.txt"), b"").unwrap();
        fs::write(dir.path().join("pic_Asciify_0.txt"), b"").unwrap();

        let mut file = ManagedFile::new(dir.path());
        file.resolve_as_output("pic_Asciify", "txt", &lock).unwrap();

        assert_eq!(file.stem(), Some("pic_Asciify_1"));
    }

    #[test]
    fn output_skips_names_that_are_locked() {
        let dir = tempdir().unwrap();
        let lock = ResourceLock::new();

        let mut first = ManagedFile::new(dir.path());
        first.resolve_as_output("GAN", "png", &lock).unwrap();
        first.acquire_lock(&lock).unwrap();

        let mut second = ManagedFile::new(dir.path());
        second.resolve_as_output("GAN", "png", &lock).unwrap();
        assert_eq!(second.stem(), Some("GAN_0"));

        second.acquire_lock(&lock).unwrap();
        let mut third = ManagedFile::new(dir.path());
        third.resolve_as_output("GAN", "png", &lock).unwrap();
        assert_eq!(third.stem(), Some("GAN_1"));
    }

    #[test]
    fn lock_requires_resolution_and_is_single_shot() {
        let dir = tempdir().unwrap();
        let lock = ResourceLock::new();
        let mut file = ManagedFile::new(dir.path());

        assert!(matches!(
            file.acquire_lock(&lock),
            Err(JobError::InvalidFileState(_))
        ));
        assert!(matches!(
            file.release_lock(&lock),
            Err(JobError::InvalidFileState(_))
        ));

        file.resolve_as_output("x", "png", &lock).unwrap();
        file.acquire_lock(&lock).unwrap();
        assert!(matches!(
            file.acquire_lock(&lock),
            Err(JobError::InvalidFileState(_))
        ));
        assert_eq!(lock.len(), 1);

        file.release_lock(&lock).unwrap();
        file.release_lock(&lock).unwrap();
        assert!(lock.is_empty());
        assert!(!file.is_locked());
    }

    #[test]
    fn contended_lock_reports_resource_in_use() {
        let dir = tempdir().unwrap();
        let lock = ResourceLock::new();

        let mut a = ManagedFile::new(dir.path());
        let mut b = ManagedFile::new(dir.path());
        a.resolve_as_output("same", "gif", &lock).unwrap();
        b.resolve_as_output("same", "gif", &lock).unwrap();

        a.acquire_lock(&lock).unwrap();
        let err = b.acquire_lock(&lock).unwrap_err();
        assert!(matches!(
            err,
            JobError::ResourceInUse {
                role: FileRole::Output,
                ..
            }
        ));
        assert!(!b.is_locked());
    }
}
