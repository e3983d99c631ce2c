//! Permission store. Owns the snapshot for the signed-in session.
//!
//! State machine:
//!
//! ```text
//! Uninitialized → Loading → Loaded | LoadFailed → Loading → …
//!                                    (any) → TornDown (terminal)
//! ```
//!
//! A failed fetch keeps the previous snapshot (stale-cache-on-error). A user
//! whose grants were just revoked keeps the old access until the next
//! successful refresh.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::AclError;
use crate::grants::GrantSource;
use crate::model::PermissionSnapshot;
use crate::session::SessionSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Uninitialized,
    Loading,
    Loaded,
    /// Last fetch failed; the snapshot is whatever was loaded before.
    LoadFailed,
    TornDown,
}

impl LoadPhase {
    /// True once a load attempt has finished (or the store is gone).
    pub fn is_settled(self) -> bool {
        matches!(self, LoadPhase::Loaded | LoadPhase::LoadFailed | LoadPhase::TornDown)
    }
}

struct State {
    phase: LoadPhase,
    snapshot: Arc<PermissionSnapshot>,
    /// Set by the first settled load; until then the shell must wait.
    settled_once: bool,
    last_error: Option<String>,
}

pub struct PermissionStore {
    session: Arc<dyn SessionSource>,
    grants: Arc<dyn GrantSource>,
    state: RwLock<State>,
    in_flight: AtomicBool,
    /// Bumped by teardown; loads started under an older generation are dropped.
    generation: AtomicU64,
    phase_tx: watch::Sender<LoadPhase>,
}

/// Clears the in-flight flag on every exit path, including a dropped future.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PermissionStore {
    pub fn new(session: Arc<dyn SessionSource>, grants: Arc<dyn GrantSource>) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(LoadPhase::Uninitialized);
        Arc::new(Self {
            session,
            grants,
            state: RwLock::new(State {
                phase: LoadPhase::Uninitialized,
                snapshot: Arc::new(PermissionSnapshot::empty()),
                settled_once: false,
                last_error: None,
            }),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            phase_tx,
        })
    }

    // ====================================================================
    // Reads (synchronous, never fetch)
    // ====================================================================

    pub fn current_snapshot(&self) -> Arc<PermissionSnapshot> {
        Arc::clone(&self.read_state().snapshot)
    }

    pub fn phase(&self) -> LoadPhase {
        self.read_state().phase
    }

    /// True until the first load settles. Later refreshes do not count.
    pub fn is_loading(&self) -> bool {
        let st = self.read_state();
        match st.phase {
            LoadPhase::Uninitialized => true,
            LoadPhase::Loading => !st.settled_once,
            _ => false,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.read_state().last_error.clone()
    }

    /// Phase change notifications, for shells that re-render on change.
    pub fn watch_phase(&self) -> watch::Receiver<LoadPhase> {
        self.phase_tx.subscribe()
    }

    // ====================================================================
    // Load / refresh / teardown
    // ====================================================================

    /// Resolve the session's role and replace the snapshot.
    ///
    /// - no session, or a role without an id → empty snapshot
    /// - hierarchy level 0 → `AllAccess`, no fetch
    /// - otherwise fetch; on failure keep the previous snapshot
    ///
    /// A call made while another load is in flight returns the current
    /// snapshot without fetching. After teardown this is a no-op.
    pub async fn load(&self) -> Arc<PermissionSnapshot> {
        if self.phase() == LoadPhase::TornDown {
            debug!("permission store torn down; load ignored");
            return self.current_snapshot();
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("permission load already in flight");
            return self.current_snapshot();
        }
        let _in_flight = InFlight(&self.in_flight);
        let generation = self.generation.load(Ordering::Acquire);

        self.transition(generation, LoadPhase::Loading);

        let outcome = match self.session.current_role() {
            None => {
                debug!("no session role; clearing permissions");
                Ok(PermissionSnapshot::empty())
            }
            Some(role) if role.is_super_admin() => {
                debug!(role = %role.name, "super-admin role; all access");
                Ok(PermissionSnapshot::AllAccess)
            }
            Some(role) => match role.role_id() {
                None => {
                    warn!(role = %role.name, "session role has no id; clearing permissions");
                    Ok(PermissionSnapshot::empty())
                }
                Some(role_id) => self
                    .grants
                    .fetch_grants(role_id)
                    .await
                    .map(PermissionSnapshot::Grants),
            },
        };

        self.settle(generation, outcome)
    }

    /// Re-run [`load`](Self::load) against the current session.
    pub async fn refresh(&self) -> Arc<PermissionSnapshot> {
        debug!("refreshing permissions");
        self.load().await
    }

    /// Clear the snapshot and stop accepting loads. Fetches still in flight
    /// are discarded when they complete.
    pub fn teardown(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        {
            let mut st = self.write_state();
            st.phase = LoadPhase::TornDown;
            st.snapshot = Arc::new(PermissionSnapshot::empty());
            st.last_error = None;
        }
        self.phase_tx.send_replace(LoadPhase::TornDown);
        info!("permission store torn down");
    }

    // ====================================================================
    // Internals
    // ====================================================================

    fn transition(&self, generation: u64, phase: LoadPhase) {
        {
            let mut st = self.write_state();
            if self.is_stale(generation, &st) {
                return;
            }
            st.phase = phase;
        }
        self.phase_tx.send_replace(phase);
    }

    fn settle(
        &self,
        generation: u64,
        outcome: Result<PermissionSnapshot, AclError>,
    ) -> Arc<PermissionSnapshot> {
        let (phase, snapshot) = {
            let mut st = self.write_state();
            if self.is_stale(generation, &st) {
                debug!("discarding permission load finished after teardown");
                return Arc::clone(&st.snapshot);
            }
            match outcome {
                Ok(snapshot) => {
                    st.snapshot = Arc::new(snapshot);
                    st.phase = LoadPhase::Loaded;
                    st.last_error = None;
                }
                Err(e) => {
                    warn!(error = %e, "permission fetch failed; keeping previous permissions");
                    st.phase = LoadPhase::LoadFailed;
                    st.last_error = Some(e.to_string());
                }
            }
            st.settled_once = true;
            (st.phase, Arc::clone(&st.snapshot))
        };
        self.phase_tx.send_replace(phase);
        snapshot
    }

    fn is_stale(&self, generation: u64, st: &State) -> bool {
        st.phase == LoadPhase::TornDown || self.generation.load(Ordering::Acquire) != generation
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use crate::grants::StaticGrants;
    use crate::model::{PermissionGrant, Role};
    use crate::session::FixedSession;

    fn cashier() -> Arc<FixedSession> {
        Arc::new(FixedSession(Some(Role::new("cashier", "Cajero", 3))))
    }

    fn products_grant() -> PermissionGrant {
        PermissionGrant::new("cashier", "products", &["Listar Productos"])
    }

    // ========================================================================
    // Initial state
    // ========================================================================

    #[test]
    fn new_store_is_loading_and_empty() {
        let store = PermissionStore::new(cashier(), Arc::new(StaticGrants::new(vec![])));
        assert_eq!(store.phase(), LoadPhase::Uninitialized);
        assert!(store.is_loading());
        assert!(store.current_snapshot().is_empty());
    }

    // ========================================================================
    // Load outcomes
    // ========================================================================

    #[tokio::test]
    async fn load_fetches_grants_for_role() {
        let grants = Arc::new(StaticGrants::new(vec![products_grant()]));
        let store = PermissionStore::new(cashier(), grants.clone());

        let snap = store.load().await;
        assert_eq!(snap.grants(), &[products_grant()]);
        assert_eq!(store.phase(), LoadPhase::Loaded);
        assert!(!store.is_loading());
        assert_eq!(grants.calls(), 1);
    }

    #[tokio::test]
    async fn super_admin_skips_fetch() {
        let grants = Arc::new(StaticGrants::new(vec![]));
        let session = Arc::new(FixedSession(Some(Role::new("root", "Admin", 0))));
        let store = PermissionStore::new(session, grants.clone());

        assert!(store.load().await.is_all_access());
        assert_eq!(grants.calls(), 0);
    }

    #[tokio::test]
    async fn no_session_is_empty_without_fetch() {
        let grants = Arc::new(StaticGrants::new(vec![products_grant()]));
        let store = PermissionStore::new(Arc::new(FixedSession(None)), grants.clone());

        assert!(store.load().await.is_empty());
        assert_eq!(store.phase(), LoadPhase::Loaded);
        assert_eq!(grants.calls(), 0);
    }

    #[tokio::test]
    async fn role_without_id_is_empty_without_fetch() {
        let grants = Arc::new(StaticGrants::new(vec![products_grant()]));
        let role = Role {
            id: None,
            name: "Cajero".into(),
            hierarchy_level: Some(3),
        };
        let store = PermissionStore::new(Arc::new(FixedSession(Some(role))), grants.clone());

        assert!(store.load().await.is_empty());
        assert_eq!(grants.calls(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_snapshot() {
        let grants = Arc::new(StaticGrants::new(vec![products_grant()]));
        let store = PermissionStore::new(cashier(), grants.clone());
        store.load().await;

        grants.fail_with("gateway timeout");
        let snap = store.refresh().await;

        assert_eq!(snap.grants(), &[products_grant()]);
        assert_eq!(store.phase(), LoadPhase::LoadFailed);
        assert!(store.last_error().unwrap().contains("gateway timeout"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn failed_first_fetch_settles_empty() {
        let grants = Arc::new(StaticGrants::new(vec![]));
        grants.fail_with("down");
        let store = PermissionStore::new(cashier(), grants);

        assert!(store.load().await.is_empty());
        assert!(!store.is_loading());
        assert_eq!(store.phase(), LoadPhase::LoadFailed);
    }

    #[tokio::test]
    async fn success_after_failure_clears_error() {
        let grants = Arc::new(StaticGrants::new(vec![]));
        grants.fail_with("down");
        let store = PermissionStore::new(cashier(), grants.clone());
        store.load().await;

        grants.set_grants(vec![products_grant()]);
        store.refresh().await;
        assert_eq!(store.phase(), LoadPhase::Loaded);
        assert!(store.last_error().is_none());
        assert_eq!(store.current_snapshot().grants().len(), 1);
    }

    #[tokio::test]
    async fn refresh_reflects_revocation() {
        let grants = Arc::new(StaticGrants::new(vec![
            products_grant(),
            PermissionGrant::new("cashier", "sales", &["Punto de Venta"]),
        ]));
        let store = PermissionStore::new(cashier(), grants.clone());
        assert_eq!(store.load().await.grants().len(), 2);

        grants.set_grants(vec![products_grant()]);
        assert_eq!(store.refresh().await.grants().len(), 1);
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    #[tokio::test]
    async fn teardown_clears_and_blocks_loads() {
        let grants = Arc::new(StaticGrants::new(vec![products_grant()]));
        let store = PermissionStore::new(cashier(), grants.clone());
        store.load().await;

        store.teardown();
        assert!(store.current_snapshot().is_empty());
        assert_eq!(store.phase(), LoadPhase::TornDown);
        assert!(!store.is_loading());

        store.load().await;
        assert!(store.current_snapshot().is_empty());
        assert_eq!(grants.calls(), 1);
    }

    #[tokio::test]
    async fn watch_reports_phases() {
        let store = PermissionStore::new(cashier(), Arc::new(StaticGrants::new(vec![])));
        let mut rx = store.watch_phase();
        assert_eq!(*rx.borrow(), LoadPhase::Uninitialized);

        store.load().await;
        assert_eq!(*rx.borrow_and_update(), LoadPhase::Loaded);

        store.teardown();
        assert_eq!(*rx.borrow_and_update(), LoadPhase::TornDown);
    }

    // ========================================================================
    // In-flight guard and late completions
    // ========================================================================

    /// Blocks every fetch until released.
    struct GatedGrants {
        gate: Notify,
        calls: AtomicUsize,
        grants: Vec<PermissionGrant>,
    }

    #[async_trait::async_trait]
    impl GrantSource for GatedGrants {
        async fn fetch_grants(&self, _role_id: &str) -> Result<Vec<PermissionGrant>, AclError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(self.grants.clone())
        }
    }

    fn gated() -> Arc<GatedGrants> {
        Arc::new(GatedGrants {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
            grants: vec![products_grant()],
        })
    }

    #[tokio::test]
    async fn overlapping_load_does_not_fetch_twice() {
        let grants = gated();
        let store = PermissionStore::new(cashier(), grants.clone());

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        while grants.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(store.is_loading());
        assert_eq!(store.phase(), LoadPhase::Loading);

        // Second load returns immediately with the current (empty) snapshot.
        assert!(store.load().await.is_empty());
        assert_eq!(grants.calls.load(Ordering::SeqCst), 1);

        grants.gate.notify_one();
        let snap = first.await.unwrap();
        assert_eq!(snap.grants().len(), 1);
    }

    #[tokio::test]
    async fn fetch_finishing_after_teardown_is_discarded() {
        let grants = gated();
        let store = PermissionStore::new(cashier(), grants.clone());

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        while grants.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        store.teardown();
        grants.gate.notify_one();
        pending.await.unwrap();

        assert!(store.current_snapshot().is_empty());
        assert_eq!(store.phase(), LoadPhase::TornDown);
    }

    #[tokio::test]
    async fn dropped_load_releases_in_flight_flag() {
        let grants = gated();
        let store = PermissionStore::new(cashier(), grants.clone());

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        while grants.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        pending.abort();
        let _ = pending.await;

        let next = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        while grants.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        grants.gate.notify_one();
        assert_eq!(next.await.unwrap().grants().len(), 1);
    }
}
