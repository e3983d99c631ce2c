//! Route tree and route resolution.
//!
//! Resolution is a pure pass over the tree: it produces the routes to mount
//! and the redirect target for a bare `/admin` entry. Rendering consumes the
//! result and never calls back into permission checks.

use serde::{Deserialize, Serialize};

use crate::evaluator::AccessEvaluator;
use crate::model::PermissionSnapshot;
use crate::taxonomy::CategoryId;

/// Path the shell sends a user to when nothing is accessible.
pub const DEFAULT_FALLBACK_PATH: &str = "/auth/logout";

/// Layout prefix of the back-office screens.
pub const ADMIN_LAYOUT: &str = "/admin";

fn admin_layout() -> String {
    ADMIN_LAYOUT.to_string()
}

/// A mountable screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteView {
    pub path: String,
    pub display_name: String,
    #[serde(default = "admin_layout")]
    pub layout: String,
    /// Component key the rendering layer maps to a screen.
    #[serde(default)]
    pub component: String,
}

impl RouteView {
    pub fn new(path: &str, display_name: &str, component: &str) -> Self {
        Self {
            path: path.to_string(),
            display_name: display_name.to_string(),
            layout: admin_layout(),
            component: component.to_string(),
        }
    }

    pub fn full_path(&self) -> String {
        format!("{}{}", self.layout, self.path)
    }
}

/// A menu category and its submenu screens, in menu order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub display_name: String,
    pub category: CategoryId,
    #[serde(default)]
    pub views: Vec<RouteView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteNode {
    Group(RouteGroup),
    View(RouteView),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
}

/// A route the shell should mount, with the category it sits under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRoute<'t> {
    pub category: Option<&'t str>,
    pub view: &'t RouteView,
}

/// Redirect target for a bare layout entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstRoute {
    /// Permissions have not loaded yet; do not redirect.
    Pending,
    Route(String),
    /// Nothing is accessible; force sign-out.
    Fallback(String),
}

impl FirstRoute {
    /// Where to redirect, or `None` while pending.
    pub fn redirect_path(&self) -> Option<&str> {
        match self {
            FirstRoute::Pending => None,
            FirstRoute::Route(p) | FirstRoute::Fallback(p) => Some(p),
        }
    }
}

impl RouteTree {
    pub fn new(nodes: Vec<RouteNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every view in declaration order, with its group name if any.
    pub fn views(&self) -> impl Iterator<Item = VisibleRoute<'_>> {
        self.nodes.iter().flat_map(|node| -> Vec<VisibleRoute<'_>> {
            match node {
                RouteNode::View(view) => vec![VisibleRoute { category: None, view }],
                RouteNode::Group(group) => group
                    .views
                    .iter()
                    .map(|view| VisibleRoute {
                        category: Some(group.display_name.as_str()),
                        view,
                    })
                    .collect(),
            }
        })
    }

    /// The view whose full path is the longest prefix of `location`.
    pub fn active_route(&self, location: &str) -> Option<&RouteView> {
        self.views()
            .map(|r| r.view)
            .filter(|v| {
                let full = v.full_path();
                location == full
                    || location
                        .strip_prefix(full.as_str())
                        .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
            })
            .max_by_key(|v| v.full_path().len())
    }

    /// Built-in back-office navigation, mirroring [`MenuTaxonomy::pos`](crate::taxonomy::MenuTaxonomy::pos).
    pub fn pos() -> Self {
        let group = |name: &str, category: &str, views: &[(&str, &str, &str)]| {
            RouteNode::Group(RouteGroup {
                display_name: name.to_string(),
                category: CategoryId::new(category),
                views: views
                    .iter()
                    .map(|(path, view, component)| RouteView::new(path, view, component))
                    .collect(),
            })
        };
        Self::new(vec![
            RouteNode::View(RouteView::new("/dashboard", "Dashboard", "Dashboard")),
            group(
                "Usuarios",
                "users",
                &[
                    ("/users", "Listar Usuarios", "UserList"),
                    ("/users/new", "Registrar Usuario", "UserForm"),
                    ("/roles", "Roles y Permisos", "RolePermissions"),
                ],
            ),
            group(
                "Productos e Inventario",
                "products",
                &[
                    ("/products", "Listar Productos", "ProductList"),
                    ("/products/new", "Registrar Producto", "ProductForm"),
                    ("/categories", "Categorías", "CategoryList"),
                    ("/inventory", "Inventario", "Inventory"),
                ],
            ),
            group(
                "Ventas",
                "sales",
                &[
                    ("/pos", "Punto de Venta", "PointOfSale"),
                    ("/sales", "Historial de Ventas", "SalesHistory"),
                ],
            ),
            group(
                "Pedidos",
                "orders",
                &[
                    ("/orders", "Listar Pedidos", "OrderList"),
                    ("/orders/new", "Registrar Pedido", "OrderForm"),
                ],
            ),
            group(
                "Promociones",
                "promotions",
                &[
                    ("/promotions", "Listar Promociones", "PromotionList"),
                    ("/promotions/new", "Registrar Promoción", "PromotionForm"),
                ],
            ),
            group(
                "Pagos",
                "payments",
                &[
                    ("/payment-methods", "Métodos de Pago", "PaymentMethods"),
                    ("/payments", "Historial de Pagos", "PaymentHistory"),
                ],
            ),
            group(
                "Proveedores",
                "suppliers",
                &[
                    ("/suppliers", "Listar Proveedores", "SupplierList"),
                    ("/suppliers/new", "Registrar Proveedor", "SupplierForm"),
                ],
            ),
            group(
                "Configuración",
                "settings",
                &[
                    ("/profile", "Perfil", "Profile"),
                    ("/business", "Negocio", "BusinessSettings"),
                ],
            ),
        ])
    }
}

/// Filters a route tree and picks the entry redirect.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    evaluator: AccessEvaluator,
    fallback_path: String,
}

impl RouteResolver {
    pub fn new(evaluator: AccessEvaluator, fallback_path: impl Into<String>) -> Self {
        Self {
            evaluator,
            fallback_path: fallback_path.into(),
        }
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    pub fn fallback_path(&self) -> &str {
        &self.fallback_path
    }

    /// Routes to mount. Grouped views need submenu access; standalone views
    /// are always mounted.
    pub fn visible_routes<'t>(
        &self,
        tree: &'t RouteTree,
        snapshot: &PermissionSnapshot,
    ) -> Vec<VisibleRoute<'t>> {
        tree.views()
            .filter(|r| match r.category {
                None => true,
                Some(category) => {
                    self.evaluator
                        .has_access_to_submenu(snapshot, category, &r.view.display_name)
                }
            })
            .collect()
    }

    /// First accessible route in declaration order.
    ///
    /// `loading` is the store's initial-load flag; while set the answer is
    /// [`FirstRoute::Pending`], never the fallback.
    pub fn first_accessible_route(
        &self,
        tree: &RouteTree,
        snapshot: &PermissionSnapshot,
        loading: bool,
    ) -> FirstRoute {
        if loading {
            return FirstRoute::Pending;
        }
        for node in tree.nodes() {
            match node {
                RouteNode::View(view) => {
                    if self.evaluator.has_access_to_category(snapshot, &view.display_name) {
                        return FirstRoute::Route(view.full_path());
                    }
                }
                RouteNode::Group(group) => {
                    if !self.evaluator.has_access_to_category(snapshot, &group.display_name) {
                        continue;
                    }
                    let first = group.views.iter().find(|view| {
                        self.evaluator.has_access_to_submenu(
                            snapshot,
                            &group.display_name,
                            &view.display_name,
                        )
                    });
                    if let Some(view) = first {
                        return FirstRoute::Route(view.full_path());
                    }
                }
            }
        }
        FirstRoute::Fallback(self.fallback_path.clone())
    }
}
