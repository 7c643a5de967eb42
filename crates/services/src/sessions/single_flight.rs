//! Per-key async locks collapsing concurrent refreshes
//!
//! Two requests observing the same expired session must not both hit the
//! platform's token endpoint; some providers invalidate the first refresh
//! token when issuing the second. The loser of the race waits on the
//! winner's lock and then re-reads the stored row.

use ad_platforms::Platform;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct RefreshLocks {
    // Bounded by users x platforms, so entries are never reaped
    inner: Mutex<HashMap<(Uuid, Platform), Arc<AsyncMutex<()>>>>,
}

impl RefreshLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, user: Uuid, platform: Platform) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("refresh lock map poisoned");
            map.entry((user, platform))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
