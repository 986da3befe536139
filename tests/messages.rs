mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::TestApp;

fn support_desk(app: &TestApp, client: Uuid) {
    app.gateway.register("create_chat", move |gateway, args| {
        let id = Uuid::new_v4();
        gateway.seed(
            "chats",
            [json!({ "id": id, "client_id": client, "subject": args["subject"] })],
        );
        Ok(json!(id))
    });
}

#[tokio::test]
async fn support_chat_is_opened_once() {
    let app = TestApp::new();
    let (user, cookie) = app.sign_in().await;
    support_desk(&app, user);

    let first = app.get("/dashboard/chat", Some(&cookie)).await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);
    let second = app.get("/dashboard/chat", Some(&cookie)).await;

    assert_eq!(app.gateway.rows("chats").len(), 1);
    assert_eq!(first.location, second.location);
}

#[tokio::test]
async fn sent_messages_show_in_the_chat() {
    let app = TestApp::new();
    let (user, cookie) = app.sign_in().await;
    support_desk(&app, user);
    let chat = app.get("/dashboard/chat", Some(&cookie)).await.location.unwrap();

    let page = app
        .post(&chat, "content=When+is+my+**visa**+interview%3F", Some(&cookie))
        .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    let messages = app.gateway.rows("messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender_role"], "client");

    let page = app.get(&chat, Some(&cookie)).await;
    assert!(page.body.contains("<strong>visa</strong>"));
}

#[tokio::test]
async fn blank_messages_are_refused() {
    let app = TestApp::new();
    let (user, cookie) = app.sign_in().await;
    support_desk(&app, user);
    let chat = app.get("/dashboard/chat", Some(&cookie)).await.location.unwrap();

    app.post(&chat, "content=+++", Some(&cookie)).await;

    assert!(app.gateway.rows("messages").is_empty());
    let page = app.get(&chat, Some(&cookie)).await;
    assert!(page.body.contains("Message cannot be empty"));
}

#[tokio::test]
async fn other_clients_chats_are_hidden() {
    let app = TestApp::new();
    let chat = Uuid::new_v4();
    app.gateway
        .seed("chats", [json!({ "id": chat, "client_id": Uuid::new_v4() })]);
    let (_, cookie) = app.sign_in().await;

    let page = app.get(&format!("/dashboard/messages/{chat}"), Some(&cookie)).await;

    assert_eq!(page.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn advisors_see_new_chats_once_a_client_writes() {
    let app = TestApp::new();
    let (_, admin) = app.sign_in_as("staff@example.com", "admin").await;
    let page = app.get("/dashboard/messages", Some(&admin)).await;
    assert!(page.body.contains("No conversations yet."));

    let (client, cookie) = app.sign_in().await;
    let chat = Uuid::new_v4();
    app.gateway.seed(
        "chats",
        [json!({ "id": chat, "client_id": client, "subject": "Student visa timeline" })],
    );
    let page = app
        .post(&format!("/dashboard/messages/{chat}"), "content=Hello", Some(&cookie))
        .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    let page = app.get("/dashboard/messages", Some(&admin)).await;
    assert!(page.body.contains("Student visa timeline"));
}
