use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AccessError;

// --- Language Handling ---

/// LanguageCode
///
/// The closed set of UI languages the portal ships. Every per-language lookup
/// (route translations, role language access) is keyed by one of these codes.
///
/// `es` is the documented default: it is substituted whenever a caller supplies a
/// missing or unsupported code, and it is the language set granted to users with
/// no effective role assignment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LanguageCode {
    #[default]
    Es,
    En,
    Fr,
    It,
}

impl LanguageCode {
    /// The wire/database representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::Es => "es",
            LanguageCode::En => "en",
            LanguageCode::Fr => "fr",
            LanguageCode::It => "it",
        }
    }

    /// parse_or_default
    ///
    /// Lenient variant used at the API boundary: a missing or unsupported code is
    /// recovered locally by falling back to `es`, logging the substitution. A bad
    /// language code must never fail a whole resolution.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            None => LanguageCode::default(),
            Some(s) => s.parse().unwrap_or_else(|e: AccessError| {
                tracing::warn!("{e}; falling back to default language");
                LanguageCode::default()
            }),
        }
    }
}

impl FromStr for LanguageCode {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "es" => Ok(LanguageCode::Es),
            "en" => Ok(LanguageCode::En),
            "fr" => Ok(LanguageCode::Fr),
            "it" => Ok(LanguageCode::It),
            other => Err(AccessError::Validation(other.to_string())),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// A named bundle of route grants, stored in the `roles` table. The `name` slug is
/// the stable identifier other tables reference (see `RolePermission.role_name`):
/// it survives even if the row is recreated, which a surrogate id would not.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: Uuid,
    // Immutable, globally unique slug (e.g., 'student', 'teacher', 'admin').
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    // Informational ordering only. The resolution algorithm derives no
    // inheritance from it: each role's grants stand alone.
    pub hierarchy_level: i32,
    pub is_active: bool,
    // System roles are protected from edit/delete by the admin surface.
    pub is_system_role: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// Route
///
/// An addressable page/section of the portal, identified by its canonical,
/// locale-neutral `pathname`. The menu metadata (`show_in_menu`, `menu_order`,
/// `icon`, `parent_route_id`) rides along for the navigation renderer but plays
/// no part in access resolution.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Route {
    pub id: Uuid,
    // Canonical, locale-neutral identifier (e.g., '/library').
    pub pathname: String,
    pub display_name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub show_in_menu: bool,
    pub menu_order: i32,
    // Optional self-reference forming a menu tree. Not used by resolution.
    pub parent_route_id: Option<Uuid>,
    pub is_active: bool,
    // Public routes are reachable without any role or individual grant.
    pub is_public: bool,
    pub requires_verification: bool,
    // Soft delete marker. A soft-deleted route is unreachable through every
    // authority source, including explicit individual grants.
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Route {
    /// A route contributes to any authority source only while it is active and
    /// not soft-deleted.
    pub fn is_accessible(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// RouteTranslation
///
/// A language-specific path/name alias for a route (e.g., '/library' ->
/// '/biblioteca' for 'es'). At most one active translation is expected per
/// (route, language) pair; the admin surface is responsible for upholding that.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RouteTranslation {
    pub id: Uuid,
    pub route_id: Uuid,
    pub language_code: String,
    pub translated_path: String,
    pub translated_name: String,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// UserRoleAssignment
///
/// Raw Database Row (Internal Use). Links a user to a role. Revocation is the
/// canonical removal: `is_active=false` plus `revoked_at`/`revoked_by`, preserving
/// the audit trail. Hard deletes are a separate, rarer admin operation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct UserRoleAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
    pub revoked_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRoleAssignment {
    /// An assignment is effective iff it is active and unrevoked. The third leg of
    /// the invariant (the role itself being active) is applied where the role row
    /// is in hand: in the store join.
    pub fn is_effective(&self) -> bool {
        self.is_active && self.revoked_at.is_none()
    }
}

/// RolePermission
///
/// Raw Database Row (Internal Use). "Members of role `role_name` may access
/// `route_id`." Keyed by the role's name slug, not its id, so permissions attach
/// to the role concept rather than a particular row incarnation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct RolePermission {
    pub id: Uuid,
    pub role_name: String,
    pub route_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// UserRoutePermission
///
/// Raw Database Row (Internal Use). A per-user, per-route individual override:
/// either an explicit grant or an explicit deny, optionally expiring. Expired
/// overrides fall out of resolution naturally without requiring a delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct UserRoutePermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub route_id: Uuid,
    // 'grant' or 'deny'.
    pub permission_type: String,
    pub reason: Option<String>,
    pub is_active: bool,
    pub granted_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRoutePermission {
    /// An override is effective iff it is active and not yet expired at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }

    pub fn is_grant(&self) -> bool {
        self.permission_type == "grant"
    }

    pub fn is_deny(&self) -> bool {
        self.permission_type == "deny"
    }
}

/// RoleLanguageAccess
///
/// Raw Database Row (Internal Use). Which UI languages members of a role may use.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct RoleLanguageAccess {
    pub id: Uuid,
    pub role_name: String,
    pub language_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

// --- Engine Output ---

/// ResolvedAccess
///
/// The complete answer to "which routes can this user see, in this language,
/// right now". Both ordered sets guarantee deterministic output: two resolutions
/// over unchanged data serialize identically.
///
/// `accessible_routes` holds *both* the canonical pathname and, where an active
/// translation exists for the requested language, the translated path. Either
/// form is a valid entry point for the membership check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ResolvedAccess {
    pub accessible_routes: BTreeSet<String>,
    pub allowed_languages: BTreeSet<LanguageCode>,
}

// --- API Response Schemas (Output) ---

/// AllowedRoutesResponse
///
/// Output schema for the bulk read used by the navigation guard and menu renderer
/// (GET /access/routes/{user_id}). An empty list means "nothing beyond nowhere":
/// consumers must treat it as deny-and-redirect, never as unknown-so-allow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AllowedRoutesResponse {
    pub routes: Vec<String>,
    /// The language the translated identifiers were resolved for (after any
    /// fallback to the default).
    pub language: LanguageCode,
}

/// AllowedLanguagesResponse
///
/// Output schema for GET /access/languages/{user_id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AllowedLanguagesResponse {
    pub languages: Vec<LanguageCode>,
}

/// AccessDecision
///
/// Output schema for the point decision (GET /access/check). Deliberately opaque:
/// a store failure and a legitimate denial are indistinguishable to the caller,
/// so error states leak nothing about why access was refused.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccessDecision {
    pub allowed: bool,
}
