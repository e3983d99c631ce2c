use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use posadmin_client::PermissionRecord;

use crate::taxonomy::CategoryId;

/// The role attached to a signed-in user.
///
/// Only `id` and `hierarchy_level` drive permission decisions. Both may be
/// missing in a stored session; a missing level is never super-admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_level: Option<i64>,
}

impl Role {
    /// Level reserved for the super-admin role.
    pub const SUPER_ADMIN_LEVEL: i64 = 0;

    pub fn new(id: impl Into<String>, name: impl Into<String>, hierarchy_level: i64) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            hierarchy_level: Some(hierarchy_level),
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.hierarchy_level == Some(Self::SUPER_ADMIN_LEVEL)
    }

    /// Role id, if present and non-empty.
    pub fn role_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A role's access to one menu category and exactly these submenus.
///
/// An empty `submenus` set still grants the category itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub role_id: String,
    pub menu_category: CategoryId,
    #[serde(default)]
    pub submenus: BTreeSet<String>,
}

impl PermissionGrant {
    pub fn new(role_id: &str, category: &str, submenus: &[&str]) -> Self {
        Self {
            role_id: role_id.to_string(),
            menu_category: CategoryId::new(category),
            submenus: submenus.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build from a wire record; `role_id` fills in when the record omits it.
    pub fn from_record(record: PermissionRecord, role_id: &str) -> Self {
        Self {
            role_id: record.role.unwrap_or_else(|| role_id.to_string()),
            menu_category: CategoryId::new(record.menu_category),
            submenus: record.submenus.into_iter().collect(),
        }
    }

    pub fn to_record(&self) -> PermissionRecord {
        PermissionRecord {
            menu_category: self.menu_category.to_string(),
            submenus: self.submenus.iter().cloned().collect(),
            description: None,
            role: Some(self.role_id.clone()),
        }
    }

    pub fn allows_submenu(&self, name: &str) -> bool {
        self.submenus.contains(name)
    }
}

/// The permission store's materialized view for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSnapshot {
    /// Super-admin: everything is visible, grants are never consulted.
    AllAccess,
    /// Explicit grants, in the order the backend returned them. Empty when
    /// nothing is loaded (no session, logged out, not fetched yet).
    Grants(Vec<PermissionGrant>),
}

impl Default for PermissionSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PermissionSnapshot {
    pub fn empty() -> Self {
        PermissionSnapshot::Grants(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PermissionSnapshot::Grants(g) if g.is_empty())
    }

    pub fn is_all_access(&self) -> bool {
        matches!(self, PermissionSnapshot::AllAccess)
    }

    /// Grants of this snapshot; empty for `AllAccess`.
    pub fn grants(&self) -> &[PermissionGrant] {
        match self {
            PermissionSnapshot::Grants(grants) => grants,
            PermissionSnapshot::AllAccess => &[],
        }
    }

    /// First grant for the category. Backends send one per category.
    pub fn grant_for(&self, category: &CategoryId) -> Option<&PermissionGrant> {
        self.grants().iter().find(|g| &g.menu_category == category)
    }
}
