use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{LanguageCode, ResolvedAccess};
use crate::repository::RepositoryState;

/// ResolutionEngine
///
/// The route-access resolution core: given the stores behind the
/// `AccessRepository` port plus (user, language), computes the effective
/// accessible-route set and the effective allowed-language set.
///
/// The engine is stateless between calls. Every resolution performs a fresh read
/// of the stores, so a decision never outlives the administrative mutation that
/// invalidates it, and concurrent resolutions are fully independent pure reads.
#[derive(Clone)]
pub struct ResolutionEngine {
    repo: RepositoryState,
}

impl ResolutionEngine {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// resolve
    ///
    /// The full resolution algorithm:
    ///
    /// 1. Effective roles `R` for the user (active, unrevoked assignment to an
    ///    active role).
    /// 2. Base set `B`: public, active, non-deleted routes.
    /// 3. Role-granted set: routes granted to any role in `R` by an active
    ///    RolePermission, same route-activity constraint.
    /// 4. Explicit grants: effective individual `grant` overrides, resolved to
    ///    active routes (dangling or deactivated targets contribute nothing).
    /// 5. Explicit denies: effective individual `deny` overrides.
    /// 6. Final id set = (B ∪ role-granted ∪ grants) \ denies. The subtraction
    ///    runs strictly after all unions: a deny wins no matter how many other
    ///    sources grant the route.
    /// 7. Each surviving route contributes its canonical pathname and, when an
    ///    active translation for `language` exists, the translated path.
    /// 8. Allowed languages: union of the roles' active language-access rows, or
    ///    `{es}` when `R` is empty.
    ///
    /// The four reads with no data dependency run concurrently; the deny
    /// subtraction only ever sees completed unions. Any store failure aborts the
    /// whole call with `Err` — callers translate that into an empty set or a
    /// `false` decision, never a partial result.
    pub async fn resolve(
        &self,
        user_id: Uuid,
        language: LanguageCode,
    ) -> Result<ResolvedAccess, AccessError> {
        // Step 1: the role set gates two of the reads below, so it comes first.
        let roles = self.repo.effective_roles(user_id).await?;
        let role_names: Vec<String> = roles.iter().map(|r| r.name.clone()).collect();

        // Steps 2-5 + 8: independent reads, resolved concurrently. A failure in
        // any one of them fails the join, and with it the whole resolution.
        let (public_routes, role_routes, overrides, language_rows) = tokio::try_join!(
            self.repo.public_routes(),
            self.repo.role_granted_routes(&role_names),
            self.repo.user_overrides(user_id),
            self.repo.role_languages(&role_names),
        )?;

        // One clock per resolution: every expiry decision in this call agrees.
        let now = Utc::now();
        let mut grant_ids: Vec<Uuid> = Vec::new();
        let mut deny_ids: BTreeSet<Uuid> = BTreeSet::new();
        for o in overrides.iter().filter(|o| o.is_effective(now)) {
            if o.is_grant() {
                grant_ids.push(o.route_id);
            } else if o.is_deny() {
                deny_ids.insert(o.route_id);
            }
        }

        // Step 4 resolution: the activity filter in routes_by_ids is what turns a
        // grant on a deleted/inactive route into a no-op.
        let grant_routes = self.repo.routes_by_ids(&grant_ids).await?;

        // Step 6, unions first. Keyed by route id so a route granted by several
        // sources appears once.
        let mut candidates: BTreeMap<Uuid, String> = BTreeMap::new();
        for route in public_routes
            .iter()
            .chain(role_routes.iter())
            .chain(grant_routes.iter())
            .filter(|r| r.is_accessible())
        {
            candidates.insert(route.id, route.pathname.clone());
        }

        // Step 6, deny subtraction — strictly after all unions have completed.
        for id in &deny_ids {
            candidates.remove(id);
        }

        // Step 7: both identifier forms are valid entry points.
        let ids: Vec<Uuid> = candidates.keys().copied().collect();
        let translations = self.repo.route_translations(&ids, language).await?;

        let mut accessible_routes: BTreeSet<String> = candidates.values().cloned().collect();
        for t in translations
            .iter()
            .filter(|t| t.is_active && candidates.contains_key(&t.route_id))
        {
            accessible_routes.insert(t.translated_path.clone());
        }

        // Step 8: role-less users get the documented default, never an empty set.
        let allowed_languages: BTreeSet<LanguageCode> = if roles.is_empty() {
            BTreeSet::from([LanguageCode::default()])
        } else {
            language_rows
                .iter()
                .filter(|l| l.is_active)
                .filter_map(|l| l.language_code.parse().ok())
                .collect()
        };

        Ok(ResolvedAccess {
            accessible_routes,
            allowed_languages,
        })
    }

    /// allowed_routes
    ///
    /// Fail-closed wrapper over `resolve` for the bulk read: a store failure is
    /// logged for operators and surfaces to the caller as the empty set — never a
    /// partial or stale result.
    pub async fn allowed_routes(
        &self,
        user_id: Uuid,
        language: LanguageCode,
    ) -> BTreeSet<String> {
        match self.resolve(user_id, language).await {
            Ok(resolved) => resolved.accessible_routes,
            Err(e) => {
                tracing::error!("route resolution failed for user {user_id}: {e}");
                BTreeSet::new()
            }
        }
    }

    /// allowed_languages
    ///
    /// Fail-closed wrapper for the language read. Uses the default language for the
    /// translation leg, which cannot affect the language result.
    pub async fn allowed_languages(&self, user_id: Uuid) -> BTreeSet<LanguageCode> {
        match self.resolve(user_id, LanguageCode::default()).await {
            Ok(resolved) => resolved.allowed_languages,
            Err(e) => {
                tracing::error!("language resolution failed for user {user_id}: {e}");
                BTreeSet::new()
            }
        }
    }

    /// can_access
    ///
    /// The point decision as set membership: `pathname` (canonical or translated)
    /// against the resolved accessible set. Errors become `false` — the caller can
    /// never distinguish a store failure from a legitimate denial.
    ///
    /// The HTTP surface serves this decision through the `can_access_route` stored
    /// procedure instead (one atomic read); the two must agree, and the test suite
    /// pins that equivalence.
    pub async fn can_access(
        &self,
        user_id: Uuid,
        pathname: &str,
        language: LanguageCode,
    ) -> bool {
        match self.resolve(user_id, language).await {
            Ok(resolved) => resolved.accessible_routes.contains(pathname),
            Err(e) => {
                tracing::error!("access check failed closed for user {user_id}: {e}");
                false
            }
        }
    }
}
