//! Role → permission resolution from a static catalog.
//!
//! The catalog is a JSON resource:
//!
//! ```json
//! { "roles": [ { "name": "admin", "describe": "...", "permissions": ["create_user"] } ] }
//! ```
//!
//! It is loaded once at startup and shared read-only for the process lifetime.
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const VIEW_USER_PROFILE: &str = "view_user_profile";
pub const INIT_USER_PASSWORD: &str = "init_user_password";
pub const CREATE_USER: &str = "create_user";
pub const GET_ALL: &str = "get_all";
pub const FIND_ALL: &str = "find_all";
pub const UPDATE_USER_PROFILE: &str = "update_user_profile";
pub const REMOVE_USER: &str = "remove_user";
pub const ASSIGN_ROLE: &str = "assign_role";

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    roles: Vec<CatalogRole>,
}

#[derive(Debug, Deserialize)]
struct CatalogRole {
    name: String,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Ordered, duplicate-free set of permission identifiers. Cheap to clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(Arc<[String]>);

impl PermissionSet {
    pub fn contains(&self, permission: &str) -> bool {
        self.0.iter().any(|p| p == permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut out: Vec<String> = Vec::new();
        for p in iter {
            let p = p.into();
            if !out.contains(&p) {
                out.push(p);
            }
        }
        Self(out.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    roles: HashMap<String, PermissionSet>,
}

impl PermissionCatalog {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        let roles = file
            .roles
            .into_iter()
            .map(|r| (r.name, r.permissions.into_iter().collect()))
            .collect();
        Ok(Self { roles })
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Read the catalog resource.
///
/// A missing, unreadable or malformed resource yields an empty catalog (every guarded
/// operation denied), never an error.
pub fn load_permission_catalog(path: &Path) -> PermissionCatalog {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "permission catalog not readable; denying all");
            return PermissionCatalog::default();
        }
    };

    match PermissionCatalog::from_json(&raw) {
        Ok(catalog) => {
            debug!(path = %path.display(), roles = catalog.len(), "permission catalog loaded");
            catalog
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "permission catalog malformed; denying all");
            PermissionCatalog::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
    catalog: Arc<PermissionCatalog>,
}

impl PermissionResolver {
    pub fn new(catalog: PermissionCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// Total: an unknown role resolves to the empty set.
    pub fn resolve(&self, role_name: &str) -> PermissionSet {
        self.catalog
            .roles
            .get(role_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn authorize(resolved: &PermissionSet, required: &str) -> bool {
        resolved.contains(required)
    }
}
