//! Access evaluator: pure visibility decisions over a snapshot.
//!
//! Both checks are total and side-effect free, cheap enough to run on every
//! render. Order of evaluation:
//!
//! 1. always-visible category name → allowed
//! 2. `AllAccess` snapshot → allowed (before any taxonomy lookup)
//! 3. unmapped category name → denied
//! 4. grant lookup

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::PermissionSnapshot;
use crate::taxonomy::MenuTaxonomy;

/// Category names exempt from permission checks.
pub const DEFAULT_ALWAYS_VISIBLE: &[&str] = &["Dashboard", "Configuración"];

#[derive(Debug, Clone)]
pub struct AccessEvaluator {
    taxonomy: Arc<MenuTaxonomy>,
    always_visible: HashSet<String>,
}

impl AccessEvaluator {
    pub fn new<I, S>(taxonomy: Arc<MenuTaxonomy>, always_visible: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taxonomy,
            always_visible: always_visible.into_iter().map(Into::into).collect(),
        }
    }

    /// Built-in POS taxonomy with the default always-visible set.
    pub fn pos() -> Self {
        Self::new(
            Arc::new(MenuTaxonomy::pos().clone()),
            DEFAULT_ALWAYS_VISIBLE.iter().copied(),
        )
    }

    pub fn taxonomy(&self) -> &MenuTaxonomy {
        &self.taxonomy
    }

    pub fn is_always_visible(&self, display_name: &str) -> bool {
        self.always_visible.contains(display_name)
    }

    pub fn has_access_to_category(&self, snapshot: &PermissionSnapshot, display_name: &str) -> bool {
        if self.is_always_visible(display_name) || snapshot.is_all_access() {
            return true;
        }
        match self.taxonomy.category_id_for(display_name) {
            Some(id) => snapshot.grant_for(id).is_some(),
            None => false,
        }
    }

    pub fn has_access_to_submenu(
        &self,
        snapshot: &PermissionSnapshot,
        category_display_name: &str,
        submenu: &str,
    ) -> bool {
        if self.is_always_visible(category_display_name) || snapshot.is_all_access() {
            return true;
        }
        self.taxonomy
            .category_id_for(category_display_name)
            .and_then(|id| snapshot.grant_for(id))
            .map(|grant| grant.allows_submenu(submenu))
            .unwrap_or(false)
    }
}
