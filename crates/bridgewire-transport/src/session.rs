use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

static LIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Scoped networking lifecycle.
///
/// Acquire one before opening the first connection and hand a clone to every
/// connection built on it. The session is released when the last clone is
/// dropped, so it always outlives the connections that reference it.
///
/// The standard library initialises the platform socket subsystem on first
/// use, so the session holds no OS handle; it exists to make that lifetime
/// explicit instead of ambient.
#[derive(Clone)]
pub struct NetworkSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: u64,
}

impl NetworkSession {
    /// Start a new networking session.
    pub fn start() -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let live = LIVE_SESSIONS.fetch_add(1, Ordering::SeqCst) + 1;
        info!(session = id, live, "network session started");
        Self {
            inner: Arc::new(SessionInner { id }),
        }
    }

    /// Process-unique session identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Number of handles (this one included) keeping the session alive.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Number of sessions currently alive in this process.
    pub fn live_sessions() -> usize {
        LIVE_SESSIONS.load(Ordering::SeqCst)
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let live = LIVE_SESSIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(session = self.id, live, "network session released");
    }
}

impl std::fmt::Debug for NetworkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSession")
            .field("id", &self.inner.id)
            .field("handles", &self.handle_count())
            .finish()
    }
}
