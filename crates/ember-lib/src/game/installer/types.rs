//! Shared download types: plans, pending files, progress, cancellation and
//! the per-id single-flight guard.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Progress callback shape used by every `download*` operation:
/// `(bytes_this_chunk, total_size, running_downloaded)`. The running value
/// is monotone non-decreasing and never exceeds the total within one call.
pub type ProgressFn<'a> = dyn Fn(u64, u64, u64) + Send + Sync + 'a;

/// Cancellation token honored at batch boundaries and before the
/// runtime-install step. Mid-stream cancellation of a single file is not
/// attempted; the next plan computation re-detects it as pending.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A token that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

/// Owning side of a cancellation token.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// An artifact whose local verification failed and which is scheduled for
/// (re)download.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub path: PathBuf,
    pub url: String,
    pub size: Option<u64>,

    /// Native classifiers are unpacked into this directory right after the
    /// archive write completes.
    pub extract_to: Option<PathBuf>,
}

/// Byte-accurate account of what a version still needs.
#[derive(Debug, Clone, Default)]
pub struct DownloadPlan {
    pub total_size: u64,
    pub downloaded_size: u64,
    pub pending: Vec<PendingFile>,
    pub runtime_to_install: Option<u32>,
}

impl DownloadPlan {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.runtime_to_install.is_none()
    }

    /// Fraction already on disk, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.downloaded_size as f64 / self.total_size as f64
        }
    }
}

/// Mutex-guarded set of ids with an operation currently in flight.
///
/// `try_acquire` either claims the id or reports it busy; the returned
/// guard releases the id on drop, so every exit path (success, failure,
/// panic unwind) gives the slot back.
#[derive(Clone, Default)]
pub struct FlightSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl FlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, id: &str) -> Option<FlightGuard> {
        let mut set = self.inner.lock().unwrap();
        if !set.insert(id.to_string()) {
            return None;
        }
        Some(FlightGuard {
            set: self.inner.clone(),
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().unwrap().contains(id)
    }
}

pub struct FlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_set_rejects_duplicate_and_releases_on_drop() {
        let set = FlightSet::new();

        let guard = set.try_acquire("1.20").expect("first acquire succeeds");
        assert!(set.contains("1.20"));
        assert!(set.try_acquire("1.20").is_none());
        // A different id is unaffected.
        assert!(set.try_acquire("1.19").is_some());

        drop(guard);
        assert!(!set.contains("1.20"));
        assert!(set.try_acquire("1.20").is_some());
    }

    #[test]
    fn cancel_pair_round_trip() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_survives_dropped_sender() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn empty_plan_is_complete() {
        let plan = DownloadPlan::default();
        assert!(plan.is_complete());
        assert_eq!(plan.fraction(), 1.0);
    }
}
