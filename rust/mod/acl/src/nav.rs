//! Navigation access: the checks the shell calls, bound to a live session.

use std::sync::Arc;

use tracing::info;

use crate::config::AclConfig;
use crate::error::AclError;
use crate::grants::GrantSource;
use crate::lifecycle::PermissionSession;
use crate::routes::{FirstRoute, RouteResolver, RouteTree, RouteView, VisibleRoute};
use crate::storage::SessionStorage;
use crate::store::PermissionStore;

/// What the navigation shell holds after sign-in.
///
/// Every check reads the store's current snapshot and never waits on a
/// fetch.
pub struct NavigationAccess {
    session: PermissionSession,
    resolver: RouteResolver,
    tree: RouteTree,
}

impl NavigationAccess {
    pub fn new(session: PermissionSession, resolver: RouteResolver, tree: RouteTree) -> Self {
        Self {
            session,
            resolver,
            tree,
        }
    }

    /// Build the whole stack from config and start the refresh loop.
    /// Must be called within a tokio runtime.
    pub fn start(
        config: &AclConfig,
        storage: Arc<SessionStorage>,
        grants: Arc<dyn GrantSource>,
    ) -> Result<Self, AclError> {
        config.validate()?;
        let taxonomy = config.taxonomy()?;
        let tree = config.route_tree(&taxonomy)?;
        let resolver = config.resolver(taxonomy);
        let store = PermissionStore::new(storage.clone(), grants);
        let session = PermissionSession::start(store, Some(storage), config.refresh_interval());
        info!(
            categories = resolver.evaluator().taxonomy().len(),
            "navigation access started"
        );
        Ok(Self::new(session, resolver, tree))
    }

    pub fn store(&self) -> &Arc<PermissionStore> {
        self.session.store()
    }

    pub fn route_tree(&self) -> &RouteTree {
        &self.tree
    }

    pub fn has_access_to_category(&self, display_name: &str) -> bool {
        let snapshot = self.store().current_snapshot();
        self.resolver
            .evaluator()
            .has_access_to_category(&snapshot, display_name)
    }

    pub fn has_access_to_submenu(&self, category_display_name: &str, submenu: &str) -> bool {
        let snapshot = self.store().current_snapshot();
        self.resolver
            .evaluator()
            .has_access_to_submenu(&snapshot, category_display_name, submenu)
    }

    pub fn is_permissions_loading(&self) -> bool {
        self.store().is_loading()
    }

    /// Fire-and-forget reload.
    pub fn refresh_permissions(&self) {
        self.session.request_refresh();
    }

    pub fn visible_routes(&self) -> Vec<VisibleRoute<'_>> {
        let snapshot = self.store().current_snapshot();
        self.resolver.visible_routes(&self.tree, &snapshot)
    }

    pub fn first_accessible_route(&self) -> FirstRoute {
        // Loading flag first: a snapshot read before it may predate the load.
        let loading = self.is_permissions_loading();
        let snapshot = self.store().current_snapshot();
        self.resolver
            .first_accessible_route(&self.tree, &snapshot, loading)
    }

    /// Title lookup for the current location.
    pub fn active_route(&self, location: &str) -> Option<&RouteView> {
        self.tree.active_route(location)
    }

    /// Stop refreshing and clear permissions. Checks answer from an empty
    /// snapshot afterwards.
    pub fn logout(&self) {
        self.session.teardown();
        info!("navigation access logged out");
    }
}
