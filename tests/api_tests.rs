use aula_portal::{
    AppConfig, AppState, MemoryAccessRepository, create_router,
    engine::ResolutionEngine,
    models::{
        AccessDecision, AllowedLanguagesResponse, AllowedRoutesResponse, Role,
        RoleLanguageAccess, RolePermission, Route, RouteTranslation, UserRoleAssignment,
        UserRoutePermission,
    },
    repository::RepositoryState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

const STUDENT_ID: Uuid = Uuid::from_u128(0xA11CE);
const VISITOR_ID: Uuid = Uuid::from_u128(0xB0B);

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

/// Seeds the in-memory store with the canonical fixture: a public welcome page,
/// a student-only library with a Spanish alias, and a route the student is
/// individually denied.
fn seeded_store() -> MemoryAccessRepository {
    let student = Role {
        id: Uuid::new_v4(),
        name: "student".to_string(),
        display_name: "Student".to_string(),
        is_active: true,
        ..Role::default()
    };
    let welcome = Route {
        id: Uuid::new_v4(),
        pathname: "/welcome".to_string(),
        display_name: "Welcome".to_string(),
        is_active: true,
        is_public: true,
        ..Route::default()
    };
    let library = Route {
        id: Uuid::new_v4(),
        pathname: "/library".to_string(),
        display_name: "Library".to_string(),
        is_active: true,
        ..Route::default()
    };
    let exams = Route {
        id: Uuid::new_v4(),
        pathname: "/exams".to_string(),
        display_name: "Exams".to_string(),
        is_active: true,
        ..Route::default()
    };

    MemoryAccessRepository {
        translations: vec![RouteTranslation {
            id: Uuid::new_v4(),
            route_id: library.id,
            language_code: "es".to_string(),
            translated_path: "/biblioteca".to_string(),
            translated_name: "Biblioteca".to_string(),
            is_active: true,
            ..RouteTranslation::default()
        }],
        assignments: vec![UserRoleAssignment {
            id: Uuid::new_v4(),
            user_id: STUDENT_ID,
            role_id: student.id,
            is_active: true,
            ..UserRoleAssignment::default()
        }],
        role_permissions: vec![
            RolePermission {
                id: Uuid::new_v4(),
                role_name: student.name.clone(),
                route_id: library.id,
                is_active: true,
                ..RolePermission::default()
            },
            RolePermission {
                id: Uuid::new_v4(),
                role_name: student.name.clone(),
                route_id: exams.id,
                is_active: true,
                ..RolePermission::default()
            },
        ],
        overrides: vec![UserRoutePermission {
            id: Uuid::new_v4(),
            user_id: STUDENT_ID,
            route_id: exams.id,
            permission_type: "deny".to_string(),
            is_active: true,
            ..UserRoutePermission::default()
        }],
        language_access: vec![
            RoleLanguageAccess {
                id: Uuid::new_v4(),
                role_name: student.name.clone(),
                language_code: "es".to_string(),
                is_active: true,
                ..RoleLanguageAccess::default()
            },
            RoleLanguageAccess {
                id: Uuid::new_v4(),
                role_name: student.name.clone(),
                language_code: "en".to_string(),
                is_active: true,
                ..RoleLanguageAccess::default()
            },
        ],
        roles: vec![student],
        routes: vec![welcome, library, exams],
        ..MemoryAccessRepository::default()
    }
}

async fn spawn_app() -> TestApp {
    let repo: RepositoryState = Arc::new(seeded_store());
    let engine = ResolutionEngine::new(repo.clone());

    let state = AppState {
        repo,
        engine,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to reach /health");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_allowed_routes_for_student_in_spanish() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let body: AllowedRoutesResponse = client
        .get(format!(
            "{}/access/routes/{}?language=es",
            app.address, STUDENT_ID
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body.routes.contains(&"/welcome".to_string()));
    assert!(body.routes.contains(&"/library".to_string()));
    assert!(body.routes.contains(&"/biblioteca".to_string()));
    // Role-granted but individually denied.
    assert!(!body.routes.contains(&"/exams".to_string()));
}

#[tokio::test]
async fn test_allowed_routes_for_visitor_is_public_only() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let body: AllowedRoutesResponse = client
        .get(format!("{}/access/routes/{}", app.address, VISITOR_ID))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body.routes, vec!["/welcome".to_string()]);
}

#[tokio::test]
async fn test_unknown_language_falls_back_to_default() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let body: AllowedRoutesResponse = client
        .get(format!(
            "{}/access/routes/{}?language=tlh",
            app.address, STUDENT_ID
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Klingon is not a portal language; the Spanish aliases answer instead.
    assert!(body.routes.contains(&"/biblioteca".to_string()));
}

#[tokio::test]
async fn test_allowed_languages_endpoints() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let student: AllowedLanguagesResponse = client
        .get(format!("{}/access/languages/{}", app.address, STUDENT_ID))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let visitor: AllowedLanguagesResponse = client
        .get(format!("{}/access/languages/{}", app.address, VISITOR_ID))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(student.languages.len(), 2);
    // Role-less users get the documented default, not an empty set.
    assert_eq!(visitor.languages.len(), 1);
}

#[tokio::test]
async fn test_check_access_decisions() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let check = |pathname: &str, user: Uuid| {
        let url = format!(
            "{}/access/check?user_id={}&pathname={}&language=es",
            app.address, user, pathname
        );
        let client = client.clone();
        async move {
            let decision: AccessDecision = client
                .get(url)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            decision.allowed
        }
    };

    // Translated alias is a valid entry point for the student.
    assert!(check("/biblioteca", STUDENT_ID).await);
    assert!(check("/library", STUDENT_ID).await);
    // Individual deny wins over the role grant.
    assert!(!check("/exams", STUDENT_ID).await);
    // Visitors only reach public routes.
    assert!(check("/welcome", VISITOR_ID).await);
    assert!(!check("/library", VISITOR_ID).await);
    // Unknown paths are denied, not erroring.
    assert!(!check("/nowhere", VISITOR_ID).await);
}
