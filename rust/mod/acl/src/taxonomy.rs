//! Menu taxonomy: the navigation categories and their submenus.
//!
//! Single source of truth for display-name → category-id and
//! category-id → submenu list. Built once, read-only afterwards.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::AclError;

/// Stable category identifier, e.g. `"products"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CategoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A navigation category and the submenus shown under it, in menu order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub id: CategoryId,
    pub display_name: String,
    #[serde(default)]
    pub submenus: Vec<String>,
}

impl MenuCategory {
    pub fn new(id: &str, display_name: &str, submenus: &[&str]) -> Self {
        Self {
            id: CategoryId::new(id),
            display_name: display_name.to_string(),
            submenus: submenus.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has_submenu(&self, name: &str) -> bool {
        self.submenus.iter().any(|s| s == name)
    }
}

/// Indexed, immutable category list.
#[derive(Debug, Clone)]
pub struct MenuTaxonomy {
    categories: Vec<MenuCategory>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<CategoryId, usize>,
}

/// Id of the settings category, kept out of the permission-assignment screen.
pub const SETTINGS_CATEGORY: &str = "settings";

static POS_TAXONOMY: LazyLock<MenuTaxonomy> =
    LazyLock::new(|| MenuTaxonomy::indexed(pos_categories()));

fn pos_categories() -> Vec<MenuCategory> {
    vec![
        MenuCategory::new(
            "users",
            "Usuarios",
            &["Listar Usuarios", "Registrar Usuario", "Roles y Permisos"],
        ),
        MenuCategory::new(
            "products",
            "Productos e Inventario",
            &["Listar Productos", "Registrar Producto", "Categorías", "Inventario"],
        ),
        MenuCategory::new("sales", "Ventas", &["Punto de Venta", "Historial de Ventas"]),
        MenuCategory::new("orders", "Pedidos", &["Listar Pedidos", "Registrar Pedido"]),
        MenuCategory::new(
            "promotions",
            "Promociones",
            &["Listar Promociones", "Registrar Promoción"],
        ),
        MenuCategory::new("payments", "Pagos", &["Métodos de Pago", "Historial de Pagos"]),
        MenuCategory::new(
            "suppliers",
            "Proveedores",
            &["Listar Proveedores", "Registrar Proveedor"],
        ),
        MenuCategory::new(SETTINGS_CATEGORY, "Configuración", &["Perfil", "Negocio"]),
    ]
}

impl MenuTaxonomy {
    /// Build a taxonomy, rejecting duplicate ids, duplicate display names
    /// and duplicate submenus within a category.
    pub fn new(categories: Vec<MenuCategory>) -> Result<Self, AclError> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for cat in &categories {
            if cat.id.as_str().is_empty() {
                return Err(AclError::Taxonomy("category id cannot be empty".into()));
            }
            if !ids.insert(&cat.id) {
                return Err(AclError::Taxonomy(format!("duplicate category id '{}'", cat.id)));
            }
            if !names.insert(cat.display_name.as_str()) {
                return Err(AclError::Taxonomy(format!(
                    "duplicate category name '{}'",
                    cat.display_name
                )));
            }
            let mut subs = HashSet::new();
            for sub in &cat.submenus {
                if !subs.insert(sub.as_str()) {
                    return Err(AclError::Taxonomy(format!(
                        "duplicate submenu '{}' in '{}'",
                        sub, cat.id
                    )));
                }
            }
        }
        Ok(Self::indexed(categories))
    }

    fn indexed(categories: Vec<MenuCategory>) -> Self {
        let by_name = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.display_name.clone(), i))
            .collect();
        let by_id = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self {
            categories,
            by_name,
            by_id,
        }
    }

    /// The built-in point-of-sale back-office taxonomy.
    pub fn pos() -> &'static MenuTaxonomy {
        &POS_TAXONOMY
    }

    pub fn category_id_for(&self, display_name: &str) -> Option<&CategoryId> {
        self.by_name
            .get(display_name)
            .map(|&i| &self.categories[i].id)
    }

    /// Submenus of a category in menu order; empty for unknown ids.
    pub fn submenus_for(&self, id: &str) -> &[String] {
        self.category(id).map(|c| c.submenus.as_slice()).unwrap_or(&[])
    }

    pub fn category(&self, id: &str) -> Option<&MenuCategory> {
        self.by_id.get(id).map(|&i| &self.categories[i])
    }

    /// Categories minus the excluded ids, in declaration order.
    pub fn all_categories_except(&self, excluded: &HashSet<CategoryId>) -> Vec<&MenuCategory> {
        self.categories
            .iter()
            .filter(|c| !excluded.contains(&c.id))
            .collect()
    }

    pub fn categories(&self) -> &[MenuCategory] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
