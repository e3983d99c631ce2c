//! Permission core configuration.
//!
//! Read from a TOML file such as:
//!
//! ```toml
//! api_base = "https://pos.example.com/api"
//! refresh_interval_secs = 300
//! fallback_path = "/auth/logout"
//! always_visible = ["Dashboard", "Configuración"]
//! assignment_excluded = ["settings"]
//! ```
//!
//! `categories` and `routes` may be given to replace the built-in POS
//! taxonomy and route tree.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AclError;
use crate::evaluator::{AccessEvaluator, DEFAULT_ALWAYS_VISIBLE};
use crate::routes::{RouteNode, RouteResolver, RouteTree, DEFAULT_FALLBACK_PATH};
use crate::taxonomy::{CategoryId, MenuCategory, MenuTaxonomy, SETTINGS_CATEGORY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Base URL of the REST backend, including the `/api` prefix.
    pub api_base: String,

    /// Seconds between background permission refreshes.
    pub refresh_interval_secs: u64,

    /// Redirect target when no route is accessible.
    pub fallback_path: String,

    /// Category display names exempt from permission checks.
    pub always_visible: Vec<String>,

    /// Category ids hidden from the permission-assignment screen.
    pub assignment_excluded: Vec<CategoryId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<MenuCategory>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteNode>>,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3000/api".to_string(),
            refresh_interval_secs: 300,
            fallback_path: DEFAULT_FALLBACK_PATH.to_string(),
            always_visible: DEFAULT_ALWAYS_VISIBLE.iter().map(|s| s.to_string()).collect(),
            assignment_excluded: vec![CategoryId::new(SETTINGS_CATEGORY)],
            categories: None,
            routes: None,
        }
    }
}

impl AclConfig {
    /// Load config from disk, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, AclError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AclConfig =
            toml::from_str(&content).map_err(|e| AclError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), AclError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AclError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AclError> {
        if self.refresh_interval_secs == 0 {
            return Err(AclError::Config("refresh_interval_secs must be positive".into()));
        }
        if self.api_base.trim().is_empty() {
            return Err(AclError::Config("api_base cannot be empty".into()));
        }
        if !self.fallback_path.starts_with('/') {
            return Err(AclError::Config(format!(
                "fallback_path '{}' must be absolute",
                self.fallback_path
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// The configured taxonomy, or the built-in one.
    pub fn taxonomy(&self) -> Result<Arc<MenuTaxonomy>, AclError> {
        match &self.categories {
            Some(categories) => Ok(Arc::new(MenuTaxonomy::new(categories.clone())?)),
            None => Ok(Arc::new(MenuTaxonomy::pos().clone())),
        }
    }

    /// The configured route tree, or the built-in one. Every group must name
    /// a category of `taxonomy`.
    pub fn route_tree(&self, taxonomy: &MenuTaxonomy) -> Result<RouteTree, AclError> {
        let tree = match &self.routes {
            Some(nodes) => RouteTree::new(nodes.clone()),
            None => RouteTree::pos(),
        };
        for node in tree.nodes() {
            if let RouteNode::Group(group) = node {
                match taxonomy.category(group.category.as_str()) {
                    Some(cat) if cat.display_name == group.display_name => {}
                    Some(cat) => {
                        return Err(AclError::Config(format!(
                            "route group '{}' does not match category '{}' ({})",
                            group.display_name, cat.id, cat.display_name
                        )))
                    }
                    None => {
                        return Err(AclError::Config(format!(
                            "route group '{}' names unknown category '{}'",
                            group.display_name, group.category
                        )))
                    }
                }
            }
        }
        Ok(tree)
    }

    pub fn evaluator(&self, taxonomy: Arc<MenuTaxonomy>) -> AccessEvaluator {
        AccessEvaluator::new(taxonomy, self.always_visible.iter().cloned())
    }

    pub fn resolver(&self, taxonomy: Arc<MenuTaxonomy>) -> RouteResolver {
        RouteResolver::new(self.evaluator(taxonomy), self.fallback_path.clone())
    }
}
