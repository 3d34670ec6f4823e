use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// "A creation flow owned by this session is in flight."
///
/// While held, INSERT notifications are ignored: the creating session applies
/// the server-returned rows from the insert response instead. The flag is
/// only ever set through a [`CreationGuard`], so an early return or a panic
/// in the creation flow cannot leave it set.
#[derive(Debug, Clone, Default)]
pub struct CreationFlag {
    in_flight: Arc<AtomicUsize>,
}

impl CreationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a creation as in flight until the returned guard drops.
    #[must_use = "the flag is released as soon as the guard is dropped"]
    pub fn acquire(&self) -> CreationGuard {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(in_flight = previous + 1, "creation guard acquired");
        CreationGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// True while at least one guard is alive.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

/// RAII guard returned by [`CreationFlag::acquire`].
#[derive(Debug)]
pub struct CreationGuard {
    in_flight: Arc<AtomicUsize>,
}

impl CreationGuard {
    /// Explicitly release the flag. Release also happens automatically on drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        let previous = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(in_flight = previous.saturating_sub(1), "creation guard released");
    }
}

#[cfg(test)]
mod tests {
    use super::CreationFlag;

    #[test]
    fn guard_sets_and_releases() {
        let flag = CreationFlag::new();
        assert!(!flag.is_set());
        let guard = flag.acquire();
        assert!(flag.is_set());
        guard.release();
        assert!(!flag.is_set());
    }

    #[test]
    fn overlapping_creations_stay_suppressed_until_last_release() {
        let flag = CreationFlag::new();
        let first = flag.acquire();
        let second = flag.clone().acquire();
        drop(first);
        assert!(flag.is_set());
        drop(second);
        assert!(!flag.is_set());
    }

    #[test]
    fn early_return_releases_flag() {
        fn failing_creation(flag: &CreationFlag) -> Result<(), &'static str> {
            let _guard = flag.acquire();
            let insert: Result<(), &'static str> = Err("insert rejected");
            insert?;
            Ok(())
        }

        let flag = CreationFlag::new();
        assert!(failing_creation(&flag).is_err());
        assert!(!flag.is_set());
    }

    #[test]
    fn panic_in_creation_releases_flag() {
        let flag = CreationFlag::new();
        let inner = flag.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.acquire();
            panic!("creation blew up");
        });
        assert!(result.is_err());
        assert!(!flag.is_set());
    }
}
