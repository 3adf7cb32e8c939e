use crate::{
    AppState,
    models::{AccessDecision, AllowedLanguagesResponse, AllowedRoutesResponse, LanguageCode},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// LanguageFilter
///
/// Accepted query parameters for the bulk route read. The language is optional:
/// a missing or unsupported code falls back to the default (`es`) rather than
/// failing the request.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LanguageFilter {
    /// UI language the translated route identifiers should be resolved for.
    pub language: Option<String>,
}

/// CheckAccessParams
///
/// Query parameters for the point decision. Mirrors the signature of the
/// `can_access_route` stored procedure.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CheckAccessParams {
    /// Opaque, already-verified user identifier.
    pub user_id: Uuid,
    /// Canonical pathname or a language-specific translated path.
    pub pathname: String,
    /// Optional language code; defaults to `es` when missing or invalid.
    pub language: Option<String>,
}

// --- Handlers ---

/// get_allowed_routes
///
/// [Guard Route] The bulk read used by the navigation guard and the menu renderer:
/// every route identifier the user may currently reach, in the requested language.
/// Contains both canonical pathnames and, where an active translation exists, the
/// translated paths.
///
/// *Fail closed*: a store failure produces an empty list, indistinguishable from a
/// user with no access. Consumers must treat an empty list as deny-and-redirect.
#[utoipa::path(
    get,
    path = "/access/routes/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID"), LanguageFilter),
    responses((status = 200, description = "Accessible route identifiers", body = AllowedRoutesResponse))
)]
pub async fn get_allowed_routes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<LanguageFilter>,
) -> Json<AllowedRoutesResponse> {
    let language = LanguageCode::parse_or_default(filter.language.as_deref());
    let routes = state.engine.allowed_routes(user_id, language).await;
    Json(AllowedRoutesResponse {
        routes: routes.into_iter().collect(),
        language,
    })
}

/// get_allowed_languages
///
/// [Guard Route] The UI languages the user's effective roles allow. Users with no
/// effective role get the documented default `["es"]`, not an empty set; a store
/// failure yields the empty set (fail closed).
#[utoipa::path(
    get,
    path = "/access/languages/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Allowed UI languages", body = AllowedLanguagesResponse))
)]
pub async fn get_allowed_languages(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Json<AllowedLanguagesResponse> {
    let languages = state.engine.allowed_languages(user_id).await;
    Json(AllowedLanguagesResponse {
        languages: languages.into_iter().collect(),
    })
}

/// check_access
///
/// [Guard Route] The single-route point decision. Served by the `can_access_route`
/// stored procedure so the entire resolution happens as one atomic database read,
/// closing the cross-store consistency gap the multi-read bulk path accepts.
///
/// *Fail closed*: any error maps to `allowed: false` inside a 200 response. The
/// endpoint never surfaces a 5xx a guard could misread as "unknown, allow", and a
/// failure is externally indistinguishable from a legitimate denial.
#[utoipa::path(
    get,
    path = "/access/check",
    params(CheckAccessParams),
    responses((status = 200, description = "Access decision", body = AccessDecision))
)]
pub async fn check_access(
    State(state): State<AppState>,
    Query(params): Query<CheckAccessParams>,
) -> Json<AccessDecision> {
    let language = LanguageCode::parse_or_default(params.language.as_deref());
    let allowed = match state
        .repo
        .can_access_route(params.user_id, &params.pathname, language)
        .await
    {
        Ok(allowed) => allowed,
        Err(e) => {
            tracing::error!(
                "point decision failed closed for user {}: {e}",
                params.user_id
            );
            false
        }
    };
    Json(AccessDecision { allowed })
}
