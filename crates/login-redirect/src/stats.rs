//! Atomic redirect counters.
//!
//! Lock-free counters for decisions made per client class. All atomics use
//! `Relaxed` ordering: these are monotonic display counters and never feed
//! back into a redirect decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::dispatch::ClientClass;

#[derive(Default)]
struct StatsInner {
    native_app: AtomicU64,
    web: AtomicU64,
}

/// Thread-safe redirect statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct RedirectStats {
    inner: Arc<StatsInner>,
}

/// Snapshot of current counter values, serializable to JSON.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_redirects: u64,
    pub native_app: u64,
    pub web: u64,
}

impl RedirectStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, class: ClientClass) {
        let counter = match class {
            ClientClass::NativeApp => &self.inner.native_app,
            ClientClass::Web => &self.inner.web,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let native_app = self.inner.native_app.load(Ordering::Relaxed);
        let web = self.inner.web.load(Ordering::Relaxed);
        StatsSnapshot {
            total_redirects: native_app + web,
            native_app,
            web,
        }
    }
}
