use aula_portal::error::AccessError;
use aula_portal::models::{
    AccessDecision, LanguageCode, Route, UserRoleAssignment, UserRoutePermission,
};
use chrono::{Duration, Utc};

// --- LanguageCode ---

#[test]
fn language_code_parses_the_supported_set() {
    assert_eq!("es".parse::<LanguageCode>().unwrap(), LanguageCode::Es);
    assert_eq!("en".parse::<LanguageCode>().unwrap(), LanguageCode::En);
    assert_eq!("fr".parse::<LanguageCode>().unwrap(), LanguageCode::Fr);
    assert_eq!("it".parse::<LanguageCode>().unwrap(), LanguageCode::It);
}

#[test]
fn language_code_rejects_unknown_codes() {
    let err = "de".parse::<LanguageCode>().unwrap_err();
    assert!(matches!(err, AccessError::Validation(code) if code == "de"));
}

#[test]
fn language_code_fallback_recovers_to_spanish() {
    assert_eq!(LanguageCode::parse_or_default(None), LanguageCode::Es);
    assert_eq!(LanguageCode::parse_or_default(Some("xx")), LanguageCode::Es);
    assert_eq!(LanguageCode::parse_or_default(Some("fr")), LanguageCode::Fr);
}

#[test]
fn language_code_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&LanguageCode::En).unwrap(), "\"en\"");
    let parsed: LanguageCode = serde_json::from_str("\"it\"").unwrap();
    assert_eq!(parsed, LanguageCode::It);
}

// --- Invariant Helpers ---

#[test]
fn override_effectiveness_tracks_activity_and_expiry() {
    let now = Utc::now();
    let mut o = UserRoutePermission {
        is_active: true,
        expires_at: None,
        ..UserRoutePermission::default()
    };
    assert!(o.is_effective(now));

    o.expires_at = Some(now + Duration::minutes(5));
    assert!(o.is_effective(now));

    o.expires_at = Some(now - Duration::minutes(5));
    assert!(!o.is_effective(now));

    o.expires_at = None;
    o.is_active = false;
    assert!(!o.is_effective(now));
}

#[test]
fn override_type_predicates() {
    let grant = UserRoutePermission {
        permission_type: "grant".to_string(),
        ..UserRoutePermission::default()
    };
    let deny = UserRoutePermission {
        permission_type: "deny".to_string(),
        ..UserRoutePermission::default()
    };
    assert!(grant.is_grant() && !grant.is_deny());
    assert!(deny.is_deny() && !deny.is_grant());
}

#[test]
fn route_accessibility_requires_active_and_undeleted() {
    let mut route = Route {
        is_active: true,
        deleted_at: None,
        ..Route::default()
    };
    assert!(route.is_accessible());

    route.deleted_at = Some(Utc::now());
    assert!(!route.is_accessible());

    route.deleted_at = None;
    route.is_active = false;
    assert!(!route.is_accessible());
}

#[test]
fn assignment_effectiveness_requires_active_and_unrevoked() {
    let mut assignment = UserRoleAssignment {
        is_active: true,
        revoked_at: None,
        ..UserRoleAssignment::default()
    };
    assert!(assignment.is_effective());

    assignment.revoked_at = Some(Utc::now());
    assert!(!assignment.is_effective());
}

// --- API Schemas ---

#[test]
fn access_decision_wire_shape() {
    let json = serde_json::to_value(AccessDecision { allowed: false }).unwrap();
    assert_eq!(json, serde_json::json!({ "allowed": false }));
}
