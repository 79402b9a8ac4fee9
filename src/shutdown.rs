use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide stop request shared by the signal task and every execution unit.
///
/// Units only need to see the flag eventually; a late observation costs one extra pass over the
/// ports, so relaxed ordering is enough.
#[derive(Debug, Default)]
pub struct ShutdownController {
    requested: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `true` only for the call that actually raised it, so the caller
    /// that wins can run one-shot shutdown work (the stats report).
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::Relaxed)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}
