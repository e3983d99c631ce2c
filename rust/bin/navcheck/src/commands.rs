//! Subcommand implementations.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::info;

use posadmin_acl::session::FixedSession;
use posadmin_acl::{
    AclConfig, FirstRoute, GrantSource, LoadPhase, MenuTaxonomy, PermissionGrant,
    PermissionMatrix, PermissionSnapshot, PermissionStore, Role, RouteResolver, RouteTree,
    StaticGrants,
};
use posadmin_client::{NoAuth, PermissionClient, PermissionRecord, StaticToken, TokenSource};

/// Everything a subcommand needs, resolved once from the CLI flags.
pub struct Context {
    config: AclConfig,
    taxonomy: Arc<MenuTaxonomy>,
    tree: RouteTree,
    resolver: RouteResolver,
    token: Option<String>,
    file_records: Option<Vec<PermissionRecord>>,
    json: bool,
}

impl Context {
    pub fn load(
        config_path: &Path,
        token: Option<&str>,
        grants_file: Option<&Path>,
        json: bool,
    ) -> Result<Self> {
        let config = AclConfig::load(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        config.validate()?;
        let taxonomy = config.taxonomy()?;
        let tree = config.route_tree(&taxonomy)?;
        let resolver = config.resolver(Arc::clone(&taxonomy));

        let file_records = match grants_file {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let records: Vec<PermissionRecord> = serde_json::from_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?;
                Some(records)
            }
            None => None,
        };

        Ok(Self {
            config,
            taxonomy,
            tree,
            resolver,
            token: token.map(str::to_string),
            file_records,
            json,
        })
    }

    fn client(&self) -> PermissionClient {
        let tokens: Arc<dyn TokenSource> = match &self.token {
            Some(t) => Arc::new(StaticToken::new(t.clone())),
            None => Arc::new(NoAuth),
        };
        PermissionClient::new(self.config.api_base.clone(), tokens)
    }

    fn grant_source(&self, role_id: &str) -> Arc<dyn GrantSource> {
        match &self.file_records {
            Some(records) => Arc::new(StaticGrants::new(
                records
                    .iter()
                    .cloned()
                    .map(|r| PermissionGrant::from_record(r, role_id))
                    .collect(),
            )),
            None => Arc::new(self.client()),
        }
    }

    /// Load the snapshot a session with this role would see.
    async fn snapshot(&self, role_id: &str, level: Option<i64>) -> Result<Arc<PermissionSnapshot>> {
        let role = Role {
            id: Some(role_id.to_string()),
            name: role_id.to_string(),
            hierarchy_level: level,
        };
        let store = PermissionStore::new(
            Arc::new(FixedSession(Some(role))),
            self.grant_source(role_id),
        );
        let snapshot = store.load().await;
        if store.phase() == LoadPhase::LoadFailed {
            anyhow::bail!(
                "failed to load permissions for role '{}': {}",
                role_id,
                store.last_error().unwrap_or_default()
            );
        }
        Ok(snapshot)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn taxonomy(ctx: &Context) -> Result<()> {
    if ctx.json {
        return print_json(&ctx.taxonomy.categories());
    }
    println!("{:<14} {:<26} SUBMENUS", "ID", "NAME");
    for cat in ctx.taxonomy.categories() {
        println!(
            "{:<14} {:<26} {}",
            cat.id,
            cat.display_name,
            cat.submenus.join(", ")
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct RouteRow<'a> {
    path: String,
    category: Option<&'a str>,
    name: &'a str,
}

#[derive(Serialize)]
struct RoutesReport<'a> {
    routes: Vec<RouteRow<'a>>,
    redirect: String,
    fallback: bool,
}

pub async fn routes(ctx: &Context, role_id: &str, level: Option<i64>) -> Result<()> {
    let snapshot = ctx.snapshot(role_id, level).await?;
    let visible = ctx.resolver.visible_routes(&ctx.tree, &snapshot);
    let first = ctx
        .resolver
        .first_accessible_route(&ctx.tree, &snapshot, false);

    let (redirect, fallback) = match first {
        FirstRoute::Route(path) => (path, false),
        FirstRoute::Fallback(path) => (path, true),
        FirstRoute::Pending => anyhow::bail!("permissions still loading"),
    };
    let report = RoutesReport {
        routes: visible
            .iter()
            .map(|r| RouteRow {
                path: r.view.full_path(),
                category: r.category,
                name: &r.view.display_name,
            })
            .collect(),
        redirect,
        fallback,
    };

    if ctx.json {
        return print_json(&report);
    }
    println!("{:<28} {:<24} SCREEN", "ROUTE", "CATEGORY");
    for row in &report.routes {
        println!(
            "{:<28} {:<24} {}",
            row.path,
            row.category.unwrap_or("-"),
            row.name
        );
    }
    if report.fallback {
        println!("\nnothing accessible; /admin redirects to {}", report.redirect);
    } else {
        println!("\n/admin redirects to {}", report.redirect);
    }
    Ok(())
}

/// Returns whether access is allowed.
pub async fn check(
    ctx: &Context,
    role_id: &str,
    level: Option<i64>,
    category: &str,
    submenu: Option<&str>,
) -> Result<bool> {
    let snapshot = ctx.snapshot(role_id, level).await?;
    let evaluator = ctx.resolver.evaluator();
    let allowed = match submenu {
        Some(sub) => evaluator.has_access_to_submenu(&snapshot, category, sub),
        None => evaluator.has_access_to_category(&snapshot, category),
    };

    if ctx.json {
        print_json(&serde_json::json!({
            "roleId": role_id,
            "category": category,
            "submenu": submenu,
            "allowed": allowed,
        }))?;
    } else {
        let target = match submenu {
            Some(sub) => format!("{} / {}", category, sub),
            None => category.to_string(),
        };
        println!("{}: {}", target, if allowed { "allowed" } else { "denied" });
    }
    Ok(allowed)
}

/// Split `category:submenu`; a bare category has no submenu.
fn parse_grant(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once(':') {
        Some((cat, sub)) => (cat.trim(), Some(sub.trim())),
        None => (entry.trim(), None),
    }
}

fn build_matrix(ctx: &Context, role_id: &str, entries: &[String]) -> Result<PermissionMatrix> {
    let excluded: HashSet<_> = ctx.config.assignment_excluded.iter().cloned().collect();
    let mut matrix = PermissionMatrix::new(&ctx.taxonomy, &excluded, role_id);
    for entry in entries {
        match parse_grant(entry) {
            (cat, Some("*")) => matrix.select_all(cat)?,
            (cat, Some(sub)) => matrix.set_submenu(cat, sub, true)?,
            (cat, None) => matrix.set_category(cat, true)?,
        }
    }
    Ok(matrix)
}

pub async fn assign(ctx: &Context, role_id: &str, entries: &[String], dry_run: bool) -> Result<()> {
    let matrix = build_matrix(ctx, role_id, entries)?;
    let records = matrix.records();

    if dry_run {
        return print_json(&records);
    }
    let saved = ctx.client().replace_for_role(role_id, &records).await?;
    info!(role_id, records = saved.len(), "role permissions saved");
    if ctx.json {
        print_json(&saved)?;
    } else {
        println!("saved {} permission records for role '{}'", saved.len(), role_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_grants(records: &str) -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let grants = dir.path().join("grants.json");
        std::fs::write(&grants, records).unwrap();
        let ctx = Context::load(&dir.path().join("absent.toml"), None, Some(&grants), false).unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_parse_grant() {
        assert_eq!(parse_grant("sales"), ("sales", None));
        assert_eq!(
            parse_grant("sales: Punto de Venta"),
            ("sales", Some("Punto de Venta"))
        );
        assert_eq!(parse_grant("orders:*"), ("orders", Some("*")));
    }

    #[tokio::test]
    async fn test_snapshot_from_file() {
        let (_dir, ctx) = context_with_grants(
            r#"[{"menuCategory":"sales","submenus":["Punto de Venta"]},
                {"menuCategory":"orders","submenus":[],"role":"other"}]"#,
        );
        let snapshot = ctx.snapshot("cashier", Some(2)).await.unwrap();
        assert_eq!(snapshot.grants().len(), 1);
        assert!(check(&ctx, "cashier", Some(2), "Ventas", Some("Punto de Venta"))
            .await
            .unwrap());
        assert!(!check(&ctx, "cashier", Some(2), "Pedidos", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_super_admin_level() {
        let (_dir, ctx) = context_with_grants("[]");
        assert!(check(&ctx, "root", Some(0), "Pagos", Some("Historial de Pagos"))
            .await
            .unwrap());
    }

    #[test]
    fn test_build_matrix() {
        let (_dir, ctx) = context_with_grants("[]");
        let entries = vec![
            "orders:*".to_string(),
            "sales:Punto de Venta".to_string(),
            "suppliers".to_string(),
        ];
        let grants = build_matrix(&ctx, "cashier", &entries).unwrap().grants();
        let ids: Vec<&str> = grants.iter().map(|g| g.menu_category.as_str()).collect();
        assert_eq!(ids, vec!["sales", "orders", "suppliers"]);
        assert_eq!(grants[1].submenus.len(), 2);
        assert!(grants[2].submenus.is_empty());
    }

    #[test]
    fn test_build_matrix_rejects_settings() {
        let (_dir, ctx) = context_with_grants("[]");
        assert!(build_matrix(&ctx, "cashier", &["settings:Perfil".to_string()]).is_err());
    }

    #[test]
    fn test_bad_grants_file() {
        let dir = tempfile::tempdir().unwrap();
        let grants = dir.path().join("grants.json");
        std::fs::write(&grants, "{oops").unwrap();
        assert!(Context::load(&dir.path().join("absent.toml"), None, Some(&grants), false).is_err());
    }
}
