mod common;

use axum::http::StatusCode;
use pathway::models::timestamp;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use common::TestApp;

#[tokio::test]
async fn application_without_program_never_reaches_backend() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;
    let calls = app.gateway.calls();

    let page = app
        .post("/dashboard/applications", "program_id=&priority=normal&submit=on", Some(&cookie))
        .await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/dashboard/applications"));
    assert_eq!(app.gateway.calls(), calls);
    assert!(app.gateway.rows("applications").is_empty());

    let page = app.get("/dashboard/applications", Some(&cookie)).await;
    assert!(page.body.contains("Please select a program"));
}

#[tokio::test]
async fn submitted_application_is_in_review() {
    let app = TestApp::new();
    let program = app.seed_program("MSc Data Science", "uk");
    let (user, cookie) = app.sign_in().await;

    let form = format!("program_id={program}&priority=high&notes=Scholarship+please&submit=on");
    let page = app.post("/dashboard/applications", &form, Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    let rows = app.gateway.rows("applications");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "in_review");
    assert_eq!(rows[0]["priority"], "high");
    assert_eq!(rows[0]["user_id"], user.to_string());
    assert!(rows[0]["submitted_at"].is_string());

    let page = app.get("/dashboard/applications", Some(&cookie)).await;
    assert!(page.body.contains("Application submitted"));
    assert!(page.body.contains("MSc Data Science"));
}

#[tokio::test]
async fn only_open_applications_can_be_cancelled() {
    let app = TestApp::new();
    let program = app.seed_program("MSc Data Science", "uk");
    let (user, cookie) = app.sign_in().await;
    let accepted = Uuid::new_v4();
    app.gateway.seed(
        "applications",
        [json!({
            "id": accepted, "user_id": user, "program_id": program,
            "status": "accepted", "priority": "normal",
        })],
    );

    app.post(&format!("/dashboard/applications/{accepted}/cancel"), "", Some(&cookie))
        .await;

    assert_eq!(app.gateway.rows("applications")[0]["status"], "accepted");
    let page = app.get("/dashboard/applications", Some(&cookie)).await;
    assert!(page.body.contains("This application can no longer be cancelled"));
}

#[tokio::test]
async fn failing_load_shows_one_toast() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;
    app.gateway.fail("payments", "connection reset");

    let page = app.get("/dashboard/payments", Some(&cookie)).await;

    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body.matches("Could not load payments").count(), 1);
    assert!(page.body.contains("connection reset"));
}

#[tokio::test]
async fn booking_takes_a_place_in_the_slot() {
    let app = TestApp::new();
    let (user, cookie) = app.sign_in().await;
    let service = Uuid::new_v4();
    let slot = Uuid::new_v4();
    let starts_at = OffsetDateTime::now_utc() + Duration::days(3);
    app.gateway
        .seed("services", [json!({ "id": service, "name": "Visa consultation" })])
        .seed(
            "appointment_slots",
            [json!({
                "id": slot, "service_id": service,
                "starts_at": timestamp::to_text(starts_at),
                "max_bookings": 2, "current_bookings": 0,
            })],
        );

    let page = app.get("/dashboard/appointments", Some(&cookie)).await;
    assert!(page.body.contains(&slot.to_string()));

    let page = app
        .post("/dashboard/appointments", &format!("slot_id={slot}"), Some(&cookie))
        .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    let appointments = app.gateway.rows("appointments");
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["user_id"], user.to_string());
    assert_eq!(appointments[0]["status"], "scheduled");
    assert_eq!(app.gateway.rows("appointment_slots")[0]["current_bookings"], 1);

    let page = app.get("/dashboard/appointments", Some(&cookie)).await;
    assert!(page.body.contains("Appointment booked for"));
}

#[tokio::test]
async fn full_slots_are_refused() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;
    let slot = Uuid::new_v4();
    app.gateway.seed(
        "appointment_slots",
        [json!({
            "id": slot, "service_id": Uuid::new_v4(),
            "starts_at": timestamp::to_text(OffsetDateTime::now_utc() + Duration::days(1)),
            "max_bookings": 1, "current_bookings": 1,
        })],
    );

    app.post("/dashboard/appointments", &format!("slot_id={slot}"), Some(&cookie))
        .await;

    assert!(app.gateway.rows("appointments").is_empty());
}

#[tokio::test]
async fn mark_all_read_clears_unread() {
    let app = TestApp::new();
    let (user, cookie) = app.sign_in().await;
    app.gateway.seed(
        "notifications",
        [
            json!({ "id": Uuid::new_v4(), "user_id": user, "type": "application", "title": "Offer received", "read": false }),
            json!({ "id": Uuid::new_v4(), "user_id": user, "type": "payment", "title": "Invoice due", "read": false }),
        ],
    );

    app.post("/dashboard/notifications/read-all", "", Some(&cookie)).await;

    assert!(app.gateway.rows("notifications").iter().all(|n| n["read"] == true));

    // a second time there is nothing left to update
    app.post("/dashboard/notifications/read-all", "", Some(&cookie)).await;
    let page = app.get("/dashboard/notifications", Some(&cookie)).await;
    assert!(page.body.contains("All notifications marked as read"));
}

#[tokio::test]
async fn admin_pages_are_hidden_from_clients() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;

    let page = app.get("/admin/programs", Some(&cookie)).await;

    assert_eq!(page.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_add_programs() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in_as("staff@example.com", "admin").await;

    let page = app
        .post(
            "/admin/programs",
            "name=MBA&university=Toronto&country=ca&level=master&field=Business&currency=CAD",
            Some(&cookie),
        )
        .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    let programs = app.gateway.rows("programs");
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0]["university"], "Toronto");

    let page = app.get("/programs", None).await;
    assert!(page.body.contains("MBA"));
}

#[tokio::test]
async fn unknown_tab_falls_back_to_the_default() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;

    let page = app.get("/dashboard/applications?tab=bogus", Some(&cookie)).await;

    assert_eq!(page.status, StatusCode::OK);
}

const TWO_MB: usize = 2 * 1024 * 1024;

#[tokio::test]
async fn oversized_avatars_are_refused_with_a_message() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;

    for size in [TWO_MB + 10, 3 * TWO_MB] {
        let image = vec![0u8; size];
        let page = app
            .post_file("/dashboard/profile/avatar", "avatar", "image/png", &image, &cookie)
            .await;
        assert_eq!(page.status, StatusCode::SEE_OTHER, "{size} bytes: {}", page.body);

        let page = app.get("/dashboard/profile", Some(&cookie)).await;
        assert_eq!(page.body.matches("Avatars must be 2 MB or smaller").count(), 1);
    }
    assert!(app.gateway.rows("profiles")[0].get("avatar_url").is_none());
}

#[tokio::test]
async fn slots_that_already_started_cannot_be_booked() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in().await;
    let slot = Uuid::new_v4();
    app.gateway.seed(
        "appointment_slots",
        [json!({
            "id": slot, "service_id": Uuid::new_v4(),
            "starts_at": timestamp::to_text(OffsetDateTime::now_utc() - Duration::minutes(5)),
            "max_bookings": 2, "current_bookings": 0,
        })],
    );

    let page = app.get("/dashboard/appointments", Some(&cookie)).await;
    assert!(!page.body.contains(&slot.to_string()));

    app.post("/dashboard/appointments", &format!("slot_id={slot}"), Some(&cookie))
        .await;
    assert!(app.gateway.rows("appointments").is_empty());
}

#[tokio::test]
async fn login_returns_to_the_requested_page() {
    let app = TestApp::new();
    let id = app.gateway.add_user("amara@example.com", common::PASSWORD);
    app.gateway.seed(
        "profiles",
        [json!({ "id": id, "email": "amara@example.com", "full_name": "Amara Okafor", "role": "client" })],
    );

    let page = app.get("/dashboard/applications?tab=cancelled", None).await;
    let login = page.location.unwrap();
    assert_eq!(login, "/login?return_url=%2Fdashboard%2Fapplications%3Ftab%3Dcancelled");

    let page = app.get(&login, None).await;
    let cookie = page.cookie;
    let page = app
        .post(
            &login,
            "email=amara%40example.com&password=correct+horse",
            cookie.as_deref(),
        )
        .await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/dashboard/applications?tab=cancelled"));
}
