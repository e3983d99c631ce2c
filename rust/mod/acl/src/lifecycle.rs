//! Background refresh for a signed-in session.
//!
//! One task per session drives every load: the initial one, the periodic
//! refresh, storage-change wake-ups and manual refresh requests. Loads are
//! therefore serialised and never overlap from this side.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::USER_KEY;
use crate::storage::{ListenerId, SessionStorage};
use crate::store::PermissionStore;

/// Owns the refresh loop and the storage listener for one store.
///
/// Dropping it stops the loop and unregisters the listener. Call
/// [`teardown`](Self::teardown) on logout to also clear the store.
pub struct PermissionSession {
    store: Arc<PermissionStore>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    listener: Mutex<Option<(Arc<SessionStorage>, ListenerId)>>,
}

impl PermissionSession {
    /// Spawn the refresh loop. Must be called within a tokio runtime.
    ///
    /// The first load starts immediately. With `storage`, any write to the
    /// `user` key triggers a reload.
    pub fn start(
        store: Arc<PermissionStore>,
        storage: Option<Arc<SessionStorage>>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());

        let listener = storage.map(|storage| {
            let wake = Arc::clone(&wake);
            let id = storage.subscribe(USER_KEY, move |_, _| {
                debug!("session changed in storage; scheduling permission reload");
                wake.notify_one();
            });
            (storage, id)
        });

        tokio::spawn(refresh_loop(
            Arc::clone(&store),
            cancel.clone(),
            Arc::clone(&wake),
            interval,
        ));

        Self {
            store,
            cancel,
            wake,
            listener: Mutex::new(listener),
        }
    }

    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Schedule a reload on the loop. Returns immediately.
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }

    /// Logout: stop the loop, drop the listener and clear the store.
    pub fn teardown(&self) {
        self.stop();
        self.store.teardown();
    }

    fn stop(&self) {
        self.cancel.cancel();
        let entry = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((storage, id)) = entry {
            storage.unsubscribe(id);
        }
    }
}

impl Drop for PermissionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh_loop(
    store: Arc<PermissionStore>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    interval: Duration,
) {
    info!("permission refresh loop started (interval={interval:?})");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            // Ahead of the tick so a coinciding wake-up is consumed here
            // rather than left stored for a second load.
            _ = wake.notified() => {
                // Manual and storage wake-ups restart the period.
                ticker.reset();
            }
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = store.load() => {}
        }
    }
    info!("permission refresh loop stopped");
}
