//! Permission matrix for the role-permission assignment screen.
//!
//! One row per assignable category with a category checkbox and one
//! checkbox per submenu. The matrix turns the checked state into the grants
//! saved for the role.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use posadmin_client::PermissionRecord;

use crate::error::AclError;
use crate::model::PermissionGrant;
use crate::taxonomy::{CategoryId, MenuCategory, MenuTaxonomy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub category: MenuCategory,
    pub enabled: bool,
    pub selected: BTreeSet<String>,
}

impl MatrixRow {
    fn new(category: &MenuCategory) -> Self {
        Self {
            category: category.clone(),
            enabled: false,
            selected: BTreeSet::new(),
        }
    }

    pub fn is_selected(&self, submenu: &str) -> bool {
        self.selected.contains(submenu)
    }

    pub fn all_selected(&self) -> bool {
        self.category.submenus.iter().all(|s| self.selected.contains(s))
    }
}

#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    role_id: String,
    rows: Vec<MatrixRow>,
}

impl PermissionMatrix {
    /// Every taxonomy category except `excluded`, all unchecked.
    pub fn new(taxonomy: &MenuTaxonomy, excluded: &HashSet<CategoryId>, role_id: &str) -> Self {
        Self {
            role_id: role_id.to_string(),
            rows: taxonomy
                .all_categories_except(excluded)
                .into_iter()
                .map(MatrixRow::new)
                .collect(),
        }
    }

    /// Check what `grants` already allow. Grants for categories not in the
    /// matrix and submenus the taxonomy doesn't list are ignored.
    pub fn with_grants(mut self, grants: &[PermissionGrant]) -> Self {
        for grant in grants {
            let Some(row) = self
                .rows
                .iter_mut()
                .find(|r| r.category.id == grant.menu_category)
            else {
                debug!(category = %grant.menu_category, "grant outside assignable categories");
                continue;
            };
            row.enabled = true;
            row.selected.extend(
                grant
                    .submenus
                    .iter()
                    .filter(|s| row.category.has_submenu(s))
                    .cloned(),
            );
        }
        self
    }

    pub fn role_id(&self) -> &str {
        &self.role_id
    }

    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&MatrixRow> {
        self.rows.iter().find(|r| r.category.id.as_str() == id)
    }

    /// Toggle a category. Turning it off clears its submenus.
    pub fn set_category(&mut self, id: &str, on: bool) -> Result<(), AclError> {
        let row = self.row_mut(id)?;
        row.enabled = on;
        if !on {
            row.selected.clear();
        }
        Ok(())
    }

    /// Toggle a submenu. Turning one on also enables its category.
    pub fn set_submenu(&mut self, id: &str, submenu: &str, on: bool) -> Result<(), AclError> {
        let row = self.row_mut(id)?;
        if !row.category.has_submenu(submenu) {
            return Err(AclError::Validation(format!(
                "'{}' is not a submenu of '{}'",
                submenu, id
            )));
        }
        if on {
            row.enabled = true;
            row.selected.insert(submenu.to_string());
        } else {
            row.selected.remove(submenu);
        }
        Ok(())
    }

    /// Enable a category with every submenu checked.
    pub fn select_all(&mut self, id: &str) -> Result<(), AclError> {
        let row = self.row_mut(id)?;
        row.enabled = true;
        row.selected = row.category.submenus.iter().cloned().collect();
        Ok(())
    }

    /// Grants for the enabled rows, in taxonomy order.
    pub fn grants(&self) -> Vec<PermissionGrant> {
        self.rows
            .iter()
            .filter(|r| r.enabled)
            .map(|r| PermissionGrant {
                role_id: self.role_id.clone(),
                menu_category: r.category.id.clone(),
                submenus: r.selected.clone(),
            })
            .collect()
    }

    /// Wire form of [`grants`](Self::grants).
    pub fn records(&self) -> Vec<PermissionRecord> {
        self.grants().iter().map(PermissionGrant::to_record).collect()
    }

    fn row_mut(&mut self, id: &str) -> Result<&mut MatrixRow, AclError> {
        self.rows
            .iter_mut()
            .find(|r| r.category.id.as_str() == id)
            .ok_or_else(|| AclError::Validation(format!("category '{}' is not assignable", id)))
    }
}
