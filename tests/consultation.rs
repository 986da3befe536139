mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

const STEPS: [(&str, &str); 4] = [
    ("budget", "budget_min=10000&budget_max=30000"),
    ("study", "level=master&field=Computing&duration_months=12"),
    ("destination", "country=uk&language=English"),
    ("extras", "halal_food=on&international_community=on"),
];

/// Answers every step and returns the final redirect target.
async fn walk(app: &TestApp, cookie: &str) -> String {
    let mut location = String::new();
    for (step, form) in STEPS {
        let page = app.post(&format!("/consultation/{step}"), form, Some(cookie)).await;
        assert_eq!(page.status, StatusCode::SEE_OTHER, "step {step}: {}", page.body);
        location = page.location.unwrap_or_default();
    }
    location
}

#[tokio::test]
async fn steps_cannot_be_skipped() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;

    let page = app.get("/consultation?step=extras", Some(&cookie)).await;

    assert!(page.body.contains(r#"action="/consultation/budget""#));
}

#[tokio::test]
async fn finished_consultation_shows_matches() {
    let app = TestApp::new();
    let program = app.seed_program("MSc Data Science", "uk");
    app.gateway.register("match_programs", move |_, args| {
        assert_eq!(args["field"], "Computing");
        Ok(json!([{ "program_id": program, "total_score": 88.0 }]))
    });
    let (_, cookie) = app.sign_in().await;

    let location = walk(&app, &cookie).await;
    assert!(location.starts_with("/consultation/result/"), "{location}");
    assert_eq!(app.gateway.rows("consultations").len(), 1);

    let page = app.get(&location, Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("MSc Data Science"));
}

#[tokio::test]
async fn failed_consultation_shows_one_message() {
    let app = TestApp::new();
    app.gateway.fail("rpc:match_programs", "statement timeout");
    let (_, cookie) = app.sign_in().await;

    let location = walk(&app, &cookie).await;
    assert_eq!(location, "/consultation?step=extras");

    let page = app.get(&location, Some(&cookie)).await;
    assert_eq!(page.body.matches("Consultation failed").count(), 1);
    assert!(page.body.contains("complete your consultation. Please try again."));
    assert!(!page.body.contains("statement timeout"));
}

#[tokio::test]
async fn someone_elses_result_is_not_found() {
    let app = TestApp::new();
    let program = app.seed_program("MSc Data Science", "uk");
    app.gateway.register("match_programs", move |_, _| {
        Ok(json!([{ "program_id": program, "total_score": 70.0 }]))
    });
    let (_, owner) = app.sign_in().await;
    let location = walk(&app, &owner).await;

    let (_, other) = app.sign_in_as("bilal@example.com", "client").await;
    let page = app.get(&location, Some(&other)).await;

    assert_eq!(page.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_matched_program_fails_the_consultation() {
    let app = TestApp::new();
    let program = app.seed_program("MSc Data Science", "uk");
    let missing = uuid::Uuid::new_v4();
    app.gateway.register("match_programs", move |_, _| {
        Ok(json!([
            { "program_id": program, "total_score": 88.0 },
            { "program_id": missing, "total_score": 61.0 },
        ]))
    });
    let (_, cookie) = app.sign_in().await;

    let location = walk(&app, &cookie).await;
    assert_eq!(location, "/consultation?step=extras");

    let page = app.get(&location, Some(&cookie)).await;
    assert_eq!(page.body.matches("Consultation failed").count(), 1);
    assert!(!page.body.contains("MSc Data Science"));
}
