//! Role-based menu permissions for the POS back office.
//!
//! Pieces, leaf to root:
//!
//! - [`taxonomy`]: categories and submenus, name → id lookup
//! - [`store`]: the current session's [`PermissionSnapshot`], fetched and cached
//! - [`evaluator`]: pure category/submenu visibility checks
//! - [`routes`]: visible routes and the first accessible route
//! - [`lifecycle`]: refresh loop and storage listener for a session
//! - [`nav`]: the checks the navigation shell calls
//! - [`assignment`]: checkbox matrix for editing a role's grants

pub mod assignment;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod grants;
pub mod lifecycle;
pub mod model;
pub mod nav;
pub mod routes;
pub mod session;
pub mod storage;
pub mod store;
pub mod taxonomy;

pub use assignment::PermissionMatrix;
pub use config::AclConfig;
pub use error::AclError;
pub use evaluator::AccessEvaluator;
pub use grants::{GrantSource, StaticGrants};
pub use lifecycle::PermissionSession;
pub use model::{PermissionGrant, PermissionSnapshot, Role};
pub use nav::NavigationAccess;
pub use routes::{FirstRoute, RouteResolver, RouteTree};
pub use session::{SessionSource, USER_KEY};
pub use storage::SessionStorage;
pub use store::{LoadPhase, PermissionStore};
pub use taxonomy::{CategoryId, MenuCategory, MenuTaxonomy};
