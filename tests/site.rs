mod common;

use axum::http::StatusCode;
use uuid::Uuid;

use common::TestApp;

#[tokio::test]
async fn unknown_routes_render_not_found() {
    let app = TestApp::new();

    let page = app.get("/no/such/page", None).await;

    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert!(page.body.contains("Not found"));
}

#[tokio::test]
async fn missing_program_is_not_found() {
    let app = TestApp::new();
    app.seed_program("MSc Data Science", "uk");

    let page = app.get(&format!("/programs/{}", Uuid::new_v4()), None).await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_lists_and_filters_programs() {
    let app = TestApp::new();
    let data = app.seed_program("MSc Data Science", "uk");
    app.seed_program("BSc Nursing", "ca");

    let page = app.get("/programs", None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("MSc Data Science"));
    assert!(page.body.contains("BSc Nursing"));

    let page = app.get("/programs?search=data", None).await;
    assert!(page.body.contains("MSc Data Science"));
    assert!(!page.body.contains("BSc Nursing"));

    let page = app.get(&format!("/programs/{data}"), None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(&format!("/dashboard/applications?program={data}")));
}

#[tokio::test]
async fn dashboard_sends_visitors_to_login() {
    let app = TestApp::new();

    let page = app.get("/dashboard", None).await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/login?return_url=%2Fdashboard"));
}

#[tokio::test]
async fn wrong_password_stays_on_login() {
    let app = TestApp::new();
    app.gateway.add_user("amara@example.com", common::PASSWORD);

    let page = app
        .post("/login", "email=amara%40example.com&password=nope", None)
        .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/login"));

    let cookie = page.cookie.expect("toast is kept in the session");
    let page = app.get("/login", Some(&cookie)).await;
    assert!(page.body.contains("Sign in failed"));

    let page = app.get("/dashboard", Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn signed_in_users_reach_the_dashboard() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;

    let page = app.get("/dashboard", Some(&cookie)).await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Amara Okafor"));
}
