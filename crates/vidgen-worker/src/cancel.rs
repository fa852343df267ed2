//! Per-run cancellation flags.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use vidgen_models::VideoId;

/// Shared flag checked by the orchestrator between segments and phases.
/// In-flight provider calls are not preempted; their results are dropped
/// once the flag is observed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Registry mapping active runs to their cancel flags.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    flags: Arc<Mutex<HashMap<String, CancelFlag>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run, replacing any stale flag for the same id.
    pub fn register(&self, video_id: &VideoId) -> CancelFlag {
        let flag = CancelFlag::default();
        self.flags
            .lock()
            .expect("cancel registry poisoned")
            .insert(video_id.to_string(), flag.clone());
        flag
    }

    /// Request cancellation. Returns whether a run was active.
    pub fn cancel(&self, video_id: &VideoId) -> bool {
        let flags = self.flags.lock().expect("cancel registry poisoned");
        match flags.get(video_id.as_str()) {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }

    /// True while a run owns a registered flag.
    pub fn is_active(&self, video_id: &VideoId) -> bool {
        self.flags
            .lock()
            .expect("cancel registry poisoned")
            .contains_key(video_id.as_str())
    }

    pub fn unregister(&self, video_id: &VideoId) {
        self.flags
            .lock()
            .expect("cancel registry poisoned")
            .remove(video_id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_registered_flag() {
        let registry = CancelRegistry::new();
        let id = VideoId::from_string("vid-1");

        let flag = registry.register(&id);
        assert!(!flag.is_cancelled());
        assert!(registry.is_active(&id));

        assert!(registry.cancel(&id));
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_without_run_is_noop() {
        let registry = CancelRegistry::new();
        assert!(!registry.cancel(&VideoId::from_string("ghost")));
    }

    #[test]
    fn test_unregister_clears_flag() {
        let registry = CancelRegistry::new();
        let id = VideoId::from_string("vid-1");
        registry.register(&id);
        registry.unregister(&id);
        assert!(!registry.is_active(&id));
        assert!(!registry.cancel(&id));
    }
}
