//! Process-wide registry of file paths claimed by running jobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Set of paths currently claimed by an in-flight job.
///
/// One mutex guards the whole set so that check-then-insert is a single
/// critical section. Claims never block or queue: a contended claim simply
/// returns `false`.
#[derive(Debug, Default)]
pub struct ResourceLock {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl ResourceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` if nobody holds it.
    ///
    /// Returns `false` without side effects when the path is already claimed.
    pub fn try_claim(&self, path: &Path) -> bool {
        let inserted = self.claimed.lock().insert(path.to_path_buf());
        if inserted {
            tracing::debug!(path = %path.display(), "claimed resource");
        } else {
            tracing::debug!(path = %path.display(), "resource already claimed");
        }
        inserted
    }

    /// Release a claim. Releasing an unclaimed path is a no-op.
    pub fn release(&self, path: &Path) {
        if self.claimed.lock().remove(path) {
            tracing::debug!(path = %path.display(), "released resource");
        }
    }

    /// Whether `path` is currently claimed.
    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.lock().contains(path)
    }

    /// Number of claimed paths.
    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.lock().is_empty()
    }

    /// Snapshot of every claimed path, sorted.
    pub fn claimed(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.claimed.lock().iter().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn second_claim_fails_until_release() {
        let lock = ResourceLock::new();
        let path = Path::new("/tmp/out/picture_Asciify.txt");

        assert!(lock.try_claim(path));
        assert!(!lock.try_claim(path));
        assert!(!lock.try_claim(path));

        lock.release(path);
        assert!(lock.try_claim(path));
    }

    #[test]
    fn releasing_unclaimed_path_is_silent() {
        let lock = ResourceLock::new();
        lock.release(Path::new("/never/claimed"));
        assert!(lock.is_empty());
    }

    #[test]
    fn distinct_paths_do_not_contend() {
        let lock = ResourceLock::new();
        assert!(lock.try_claim(Path::new("/a.png")));
        assert!(lock.try_claim(Path::new("/b.png")));
        assert_eq!(lock.len(), 2);
        assert_eq!(
            lock.claimed(),
            vec![PathBuf::from("/a.png"), PathBuf::from("/b.png")]
        );
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let lock = Arc::new(ResourceLock::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    if lock.try_claim(Path::new("/shared/output.gif")) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(lock.is_claimed(Path::new("/shared/output.gif")));
    }
}
