use crate::error::AccessError;
use crate::models::{
    LanguageCode, Role, RoleLanguageAccess, RolePermission, Route, RouteTranslation,
    UserRoleAssignment, UserRoutePermission,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// AccessRepository Trait
///
/// Defines the abstract contract for every read the resolution engine performs.
/// This is the core of the Repository Abstraction pattern: the engine and handlers
/// interact with the stores without knowing the concrete implementation
/// (Postgres, in-memory, etc.).
///
/// All operations are pure reads; the engine holds no locks and no mutable state,
/// so concurrent resolutions are independent by construction. Every method can
/// fail with `AccessError::DataAccess`, and any such failure aborts the enclosing
/// resolution (fail closed).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn AccessRepository>`) safely shareable across Axum's asynchronous
/// task boundaries.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    // --- RoleCatalog / AssignmentStore ---
    /// Roles the user holds through an *effective* assignment: the assignment is
    /// active and unrevoked, and the role row itself is active.
    async fn effective_roles(&self, user_id: Uuid) -> Result<Vec<Role>, AccessError>;

    // --- RouteCatalog ---
    /// All routes that are public, active, and not soft-deleted.
    async fn public_routes(&self) -> Result<Vec<Route>, AccessError>;
    /// Active, non-deleted routes among `ids`. Dangling ids simply produce no row.
    async fn routes_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Route>, AccessError>;
    /// Active translations for the given routes in one language.
    async fn route_translations(
        &self,
        route_ids: &[Uuid],
        language: LanguageCode,
    ) -> Result<Vec<RouteTranslation>, AccessError>;

    // --- RolePermissionStore ---
    /// Routes granted to any of `role_names` through an active RolePermission row,
    /// restricted to active, non-deleted routes.
    async fn role_granted_routes(&self, role_names: &[String]) -> Result<Vec<Route>, AccessError>;

    // --- OverrideStore ---
    /// All active individual overrides for the user. Expiry is *not* applied here:
    /// the engine evaluates it against a single `now` so one resolution sees one
    /// consistent clock.
    async fn user_overrides(&self, user_id: Uuid)
    -> Result<Vec<UserRoutePermission>, AccessError>;

    // --- LanguageAccessStore ---
    /// Active language-access rows for any of `role_names`.
    async fn role_languages(
        &self,
        role_names: &[String],
    ) -> Result<Vec<RoleLanguageAccess>, AccessError>;

    // --- Point Decision ---
    /// The single-round-trip point decision. In Postgres this is the
    /// `can_access_route` stored procedure: the entire resolution happens as one
    /// atomic read, closing the cross-store time-of-check gap that the multi-read
    /// `resolve` path accepts. The truth table must equal membership in the
    /// engine's resolved set, including treating errors as deny.
    async fn can_access_route(
        &self,
        user_id: Uuid,
        pathname: &str,
        language: LanguageCode,
    ) -> Result<bool, AccessError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn AccessRepository>;

/// PostgresAccessRepository
///
/// The concrete implementation of the `AccessRepository` trait, backed by the
/// PostgreSQL database created by `./migrations`.
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Shared column list for Route selects; FromRow maps by name.
const ROUTE_COLUMNS: &str = "id, pathname, display_name, description, icon, show_in_menu, \
     menu_order, parent_route_id, is_active, is_public, requires_verification, deleted_at, \
     created_at, updated_at, created_by";

#[async_trait]
impl AccessRepository for PostgresAccessRepository {
    /// effective_roles
    ///
    /// Joins assignments to roles, applying the full effectiveness invariant in SQL:
    /// `a.is_active AND a.revoked_at IS NULL AND r.is_active`.
    async fn effective_roles(&self, user_id: Uuid) -> Result<Vec<Role>, AccessError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.display_name, r.description, r.hierarchy_level,
                   r.is_active, r.is_system_role, r.created_at, r.updated_at, r.created_by
            FROM roles r
            JOIN user_role_assignments a ON a.role_id = r.id
            WHERE a.user_id = $1
              AND a.is_active = true
              AND a.revoked_at IS NULL
              AND r.is_active = true
            ORDER BY r.hierarchy_level DESC, r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    /// public_routes
    ///
    /// The base set: `is_public AND is_active AND deleted_at IS NULL`, enforced
    /// unconditionally in the query so anonymous visibility can never widen.
    async fn public_routes(&self) -> Result<Vec<Route>, AccessError> {
        let routes = sqlx::query_as::<_, Route>(&format!(
            "SELECT {ROUTE_COLUMNS} FROM routes \
             WHERE is_public = true AND is_active = true AND deleted_at IS NULL"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(routes)
    }

    /// routes_by_ids
    ///
    /// Resolves explicit-grant route ids to route rows. The activity filter here is
    /// what makes a grant on a soft-deleted or inactive route a harmless no-op, and
    /// what silently absorbs dangling references.
    async fn routes_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Route>, AccessError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let routes = sqlx::query_as::<_, Route>(&format!(
            "SELECT {ROUTE_COLUMNS} FROM routes \
             WHERE id = ANY($1) AND is_active = true AND deleted_at IS NULL"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(routes)
    }

    /// route_translations
    ///
    /// Active translations for the final route set in the requested language.
    async fn route_translations(
        &self,
        route_ids: &[Uuid],
        language: LanguageCode,
    ) -> Result<Vec<RouteTranslation>, AccessError> {
        if route_ids.is_empty() {
            return Ok(vec![]);
        }
        let translations = sqlx::query_as::<_, RouteTranslation>(
            r#"
            SELECT id, route_id, language_code, translated_path, translated_name,
                   is_active, created_at, updated_at, created_by
            FROM route_translations
            WHERE route_id = ANY($1) AND language_code = $2 AND is_active = true
            "#,
        )
        .bind(route_ids)
        .bind(language.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(translations)
    }

    /// role_granted_routes
    ///
    /// Joins `role_permissions` (keyed by role *name*) to routes, applying the same
    /// active/non-deleted route constraint as the base set. DISTINCT because several
    /// roles may grant the same route.
    async fn role_granted_routes(&self, role_names: &[String]) -> Result<Vec<Route>, AccessError> {
        if role_names.is_empty() {
            return Ok(vec![]);
        }
        let routes = sqlx::query_as::<_, Route>(
            r#"
            SELECT DISTINCT rt.id, rt.pathname, rt.display_name, rt.description, rt.icon,
                   rt.show_in_menu, rt.menu_order, rt.parent_route_id, rt.is_active,
                   rt.is_public, rt.requires_verification, rt.deleted_at,
                   rt.created_at, rt.updated_at, rt.created_by
            FROM routes rt
            JOIN role_permissions rp ON rp.route_id = rt.id
            WHERE rp.role_name = ANY($1) AND rp.is_active = true
              AND rt.is_active = true AND rt.deleted_at IS NULL
            "#,
        )
        .bind(role_names)
        .fetch_all(&self.pool)
        .await?;
        Ok(routes)
    }

    /// user_overrides
    ///
    /// Active override rows for the user, expired ones included; the engine applies
    /// the expiry cutoff against its own clock.
    async fn user_overrides(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserRoutePermission>, AccessError> {
        let overrides = sqlx::query_as::<_, UserRoutePermission>(
            r#"
            SELECT id, user_id, route_id, permission_type, reason, is_active,
                   granted_by, expires_at, created_at, updated_at
            FROM user_route_permissions
            WHERE user_id = $1 AND is_active = true
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(overrides)
    }

    /// role_languages
    ///
    /// Active language-access rows for the user's effective roles.
    async fn role_languages(
        &self,
        role_names: &[String],
    ) -> Result<Vec<RoleLanguageAccess>, AccessError> {
        if role_names.is_empty() {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, RoleLanguageAccess>(
            r#"
            SELECT id, role_name, language_code, is_active, created_at, updated_at, created_by
            FROM role_language_access
            WHERE role_name = ANY($1) AND is_active = true
            "#,
        )
        .bind(role_names)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// can_access_route
    ///
    /// Delegates to the server-side `can_access_route` function (see
    /// `migrations/0002_can_access_route.sql`), which performs the whole resolution
    /// in one statement. This is the atomic path the point-decision endpoint uses.
    async fn can_access_route(
        &self,
        user_id: Uuid,
        pathname: &str,
        language: LanguageCode,
    ) -> Result<bool, AccessError> {
        let allowed: bool = sqlx::query_scalar("SELECT can_access_route($1, $2, $3)")
            .bind(user_id)
            .bind(pathname)
            .bind(language.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(allowed)
    }
}

/// MemoryAccessRepository
///
/// An in-memory implementation of `AccessRepository` over plain vectors of rows.
/// It applies the same effectiveness/activity invariants as the SQL queries, which
/// makes the engine trivially testable without a database and gives local
/// development a zero-dependency backend.
///
/// `should_fail` switches every read into a `DataAccess` error, for exercising the
/// fail-closed path.
#[derive(Default)]
pub struct MemoryAccessRepository {
    pub roles: Vec<Role>,
    pub routes: Vec<Route>,
    pub translations: Vec<RouteTranslation>,
    pub assignments: Vec<UserRoleAssignment>,
    pub role_permissions: Vec<RolePermission>,
    pub overrides: Vec<UserRoutePermission>,
    pub language_access: Vec<RoleLanguageAccess>,
    pub should_fail: bool,
}

impl MemoryAccessRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<(), AccessError> {
        if self.should_fail {
            Err(AccessError::DataAccess("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn effective_role_names(&self, user_id: Uuid) -> Vec<String> {
        self.assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.is_effective())
            .filter_map(|a| {
                self.roles
                    .iter()
                    .find(|r| r.id == a.role_id && r.is_active)
            })
            .map(|r| r.name.clone())
            .collect()
    }

    /// The set-algebra core shared by `can_access_route`: public union role-granted
    /// union user-granted, minus effective denies, all over accessible routes.
    fn allowed_route_ids(&self, user_id: Uuid) -> BTreeSet<Uuid> {
        let now = Utc::now();
        let role_names = self.effective_role_names(user_id);

        let mut allowed: BTreeSet<Uuid> = self
            .routes
            .iter()
            .filter(|r| r.is_public && r.is_accessible())
            .map(|r| r.id)
            .collect();

        allowed.extend(
            self.role_permissions
                .iter()
                .filter(|p| p.is_active && role_names.contains(&p.role_name))
                .filter(|p| self.route_is_accessible(p.route_id))
                .map(|p| p.route_id),
        );

        allowed.extend(
            self.overrides
                .iter()
                .filter(|o| o.user_id == user_id && o.is_grant() && o.is_effective(now))
                .filter(|o| self.route_is_accessible(o.route_id))
                .map(|o| o.route_id),
        );

        // Denies subtract last, after every union.
        for deny in self
            .overrides
            .iter()
            .filter(|o| o.user_id == user_id && o.is_deny() && o.is_effective(now))
        {
            allowed.remove(&deny.route_id);
        }

        allowed
    }

    fn route_is_accessible(&self, route_id: Uuid) -> bool {
        self.routes
            .iter()
            .any(|r| r.id == route_id && r.is_accessible())
    }
}

#[async_trait]
impl AccessRepository for MemoryAccessRepository {
    async fn effective_roles(&self, user_id: Uuid) -> Result<Vec<Role>, AccessError> {
        self.guard()?;
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.is_effective())
            .filter_map(|a| {
                self.roles
                    .iter()
                    .find(|r| r.id == a.role_id && r.is_active)
            })
            .cloned()
            .collect())
    }

    async fn public_routes(&self) -> Result<Vec<Route>, AccessError> {
        self.guard()?;
        Ok(self
            .routes
            .iter()
            .filter(|r| r.is_public && r.is_accessible())
            .cloned()
            .collect())
    }

    async fn routes_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Route>, AccessError> {
        self.guard()?;
        Ok(self
            .routes
            .iter()
            .filter(|r| ids.contains(&r.id) && r.is_accessible())
            .cloned()
            .collect())
    }

    async fn route_translations(
        &self,
        route_ids: &[Uuid],
        language: LanguageCode,
    ) -> Result<Vec<RouteTranslation>, AccessError> {
        self.guard()?;
        Ok(self
            .translations
            .iter()
            .filter(|t| {
                t.is_active
                    && t.language_code == language.as_str()
                    && route_ids.contains(&t.route_id)
            })
            .cloned()
            .collect())
    }

    async fn role_granted_routes(&self, role_names: &[String]) -> Result<Vec<Route>, AccessError> {
        self.guard()?;
        let granted_ids: BTreeSet<Uuid> = self
            .role_permissions
            .iter()
            .filter(|p| p.is_active && role_names.contains(&p.role_name))
            .map(|p| p.route_id)
            .collect();
        Ok(self
            .routes
            .iter()
            .filter(|r| granted_ids.contains(&r.id) && r.is_accessible())
            .cloned()
            .collect())
    }

    async fn user_overrides(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserRoutePermission>, AccessError> {
        self.guard()?;
        Ok(self
            .overrides
            .iter()
            .filter(|o| o.user_id == user_id && o.is_active)
            .cloned()
            .collect())
    }

    async fn role_languages(
        &self,
        role_names: &[String],
    ) -> Result<Vec<RoleLanguageAccess>, AccessError> {
        self.guard()?;
        Ok(self
            .language_access
            .iter()
            .filter(|l| l.is_active && role_names.contains(&l.role_name))
            .cloned()
            .collect())
    }

    /// can_access_route
    ///
    /// Mirrors `migrations/0002_can_access_route.sql`: resolve the supplied path
    /// (canonical or translated-for-language) to route ids, then test membership
    /// in the allowed set.
    async fn can_access_route(
        &self,
        user_id: Uuid,
        pathname: &str,
        language: LanguageCode,
    ) -> Result<bool, AccessError> {
        self.guard()?;

        let mut target_ids: BTreeSet<Uuid> = self
            .routes
            .iter()
            .filter(|r| r.pathname == pathname)
            .map(|r| r.id)
            .collect();
        target_ids.extend(
            self.translations
                .iter()
                .filter(|t| {
                    t.is_active
                        && t.language_code == language.as_str()
                        && t.translated_path == pathname
                })
                .map(|t| t.route_id),
        );

        let allowed = self.allowed_route_ids(user_id);
        Ok(target_ids.iter().any(|id| allowed.contains(id)))
    }
}
