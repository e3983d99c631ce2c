//! End-to-end permission behaviour for a signed-in shell: sign-in, refresh,
//! backend outages, revocation and logout.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use posadmin_acl::*;

const CASHIER: &str = "cashier";

struct Shell {
    storage: Arc<SessionStorage>,
    grants: Arc<StaticGrants>,
    nav: NavigationAccess,
}

fn shell(grants: Vec<PermissionGrant>) -> Shell {
    let storage = Arc::new(SessionStorage::new());
    session::sign_in(&storage, &Role::new(CASHIER, "Cajero", 2)).unwrap();
    let grants = Arc::new(StaticGrants::new(grants));
    let config = AclConfig {
        refresh_interval_secs: 60,
        ..AclConfig::default()
    };
    let nav = NavigationAccess::start(&config, storage.clone(), grants.clone()).unwrap();
    Shell {
        storage,
        grants,
        nav,
    }
}

async fn next_settle(nav: &NavigationAccess, calls: &StaticGrants, n: usize) {
    while calls.calls() < n {
        tokio::task::yield_now().await;
    }
    let mut rx = nav.store().watch_phase();
    rx.wait_for(|p| p.is_settled()).await.unwrap();
}

fn products_and_sales() -> Vec<PermissionGrant> {
    vec![
        PermissionGrant::new(CASHIER, "products", &["Listar Productos"]),
        PermissionGrant::new(CASHIER, "sales", &["Punto de Venta", "Historial de Ventas"]),
    ]
}

#[tokio::test(start_paused = true)]
async fn first_route_waits_for_load_then_resolves() {
    let s = shell(products_and_sales());
    assert_eq!(s.nav.first_accessible_route(), FirstRoute::Pending);

    next_settle(&s.nav, &s.grants, 1).await;
    // Dashboard is a standalone, always-visible entry and comes first.
    assert_eq!(
        s.nav.first_accessible_route(),
        FirstRoute::Route("/admin/dashboard".into())
    );
    let names: Vec<&str> = s
        .nav
        .visible_routes()
        .iter()
        .map(|r| r.view.display_name.as_str())
        .collect();
    assert!(names.contains(&"Listar Productos"));
    assert!(names.contains(&"Historial de Ventas"));
    assert!(!names.contains(&"Registrar Producto"));
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_picks_up_revocation() {
    let s = shell(products_and_sales());
    next_settle(&s.nav, &s.grants, 1).await;
    assert!(s.nav.has_access_to_category("Ventas"));

    s.grants.set_grants(vec![PermissionGrant::new(
        CASHIER,
        "products",
        &["Listar Productos"],
    )]);
    // Still the cached answer until the next refresh.
    assert!(s.nav.has_access_to_category("Ventas"));

    tokio::time::sleep(Duration::from_secs(61)).await;
    next_settle(&s.nav, &s.grants, 2).await;
    while s.nav.has_access_to_category("Ventas") {
        tokio::task::yield_now().await;
    }
    assert!(s.nav.has_access_to_submenu("Productos e Inventario", "Listar Productos"));
}

#[tokio::test(start_paused = true)]
async fn outage_keeps_previous_permissions() {
    let s = shell(products_and_sales());
    next_settle(&s.nav, &s.grants, 1).await;

    s.grants.fail_with("backend unavailable");
    s.nav.refresh_permissions();
    next_settle(&s.nav, &s.grants, 2).await;
    while s.nav.store().phase() != LoadPhase::LoadFailed {
        tokio::task::yield_now().await;
    }

    assert!(s.nav.has_access_to_submenu("Ventas", "Punto de Venta"));
    assert!(!s.nav.is_permissions_loading());
    assert!(s.nav.store().last_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn sign_in_elsewhere_reloads_for_new_role() {
    let s = shell(products_and_sales());
    next_settle(&s.nav, &s.grants, 1).await;

    session::sign_in(&s.storage, &Role::new("root", "Admin", 0)).unwrap();
    while !s.nav.store().current_snapshot().is_all_access() {
        tokio::task::yield_now().await;
    }
    assert!(s.nav.has_access_to_submenu("Usuarios", "Roles y Permisos"));
    // Super-admin never fetches.
    assert_eq!(s.grants.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn logout_tears_down_and_stops_fetching() {
    let s = shell(products_and_sales());
    next_settle(&s.nav, &s.grants, 1).await;

    s.nav.logout();
    session::sign_out(&s.storage);

    assert!(!s.nav.has_access_to_category("Ventas"));
    assert!(!s.nav.has_access_to_submenu("Productos e Inventario", "Listar Productos"));
    assert_eq!(s.storage.listener_count(), 0);

    s.nav.refresh_permissions();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(s.grants.calls(), 1);
    assert_eq!(s.nav.store().phase(), LoadPhase::TornDown);
}

#[tokio::test(start_paused = true)]
async fn nothing_accessible_falls_back_to_logout() {
    let storage = Arc::new(SessionStorage::new());
    session::sign_in(&storage, &Role::new(CASHIER, "Cajero", 2)).unwrap();
    let grants = Arc::new(StaticGrants::new(vec![]));
    let config = AclConfig {
        always_visible: vec![],
        routes: Some(vec![routes::RouteNode::Group(routes::RouteGroup {
            display_name: "Ventas".into(),
            category: CategoryId::new("sales"),
            views: vec![routes::RouteView::new("/pos", "Punto de Venta", "PointOfSale")],
        })]),
        ..AclConfig::default()
    };
    let nav = NavigationAccess::start(&config, storage, grants.clone()).unwrap();
    assert_eq!(nav.first_accessible_route(), FirstRoute::Pending);

    next_settle(&nav, &grants, 1).await;
    assert_eq!(
        nav.first_accessible_route(),
        FirstRoute::Fallback("/auth/logout".into())
    );
}

#[test]
fn assignment_matrix_feeds_the_evaluator() {
    let config = AclConfig::default();
    let taxonomy = config.taxonomy().unwrap();
    let excluded: HashSet<CategoryId> = config.assignment_excluded.iter().cloned().collect();
    let mut matrix = PermissionMatrix::new(&taxonomy, &excluded, CASHIER);
    matrix.set_submenu("products", "Listar Productos", true).unwrap();

    let eval = config.evaluator(taxonomy);
    let snapshot = PermissionSnapshot::Grants(matrix.grants());
    assert!(eval.has_access_to_submenu(&snapshot, "Productos e Inventario", "Listar Productos"));
    assert!(!eval.has_access_to_submenu(&snapshot, "Productos e Inventario", "Registrar Producto"));
}
