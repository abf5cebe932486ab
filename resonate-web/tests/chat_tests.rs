//! Integration tests for chat threads and the inbox

mod helpers;

use axum::http::StatusCode;
use helpers::{json_body, redirect_target, test_app, TestApp};
use serde_json::json;
use std::time::Duration;

/// Open the thread between the token's owner and `username`, returning its id
async fn start(app: &TestApp, token: &str, username: &str) -> i64 {
    let response = app.get(&format!("/chats/start/{}/", username), token).await;
    let location = redirect_target(&response);
    location
        .trim_start_matches("/chats/")
        .trim_end_matches('/')
        .parse()
        .expect("thread id in redirect")
}

#[tokio::test]
async fn test_start_thread_is_symmetric_and_idempotent() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;

    let first = start(&app, &nina, "miles").await;
    let again = start(&app, &nina, "miles").await;
    let reverse = start(&app, &miles, "nina").await;

    assert_eq!(first, again);
    assert_eq!(first, reverse);
    assert_eq!(app.count("chat_threads").await, 1);
}

#[tokio::test]
async fn test_start_thread_with_self_or_unknown() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;

    let response = app.get("/chats/start/nina/", &nina).await;
    assert_eq!(redirect_target(&response), "/chats/");
    assert_eq!(app.count("chat_threads").await, 0);

    let response = app.get("/chats/start/ghost/", &nina).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_and_view_messages_in_order() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;
    let thread = start(&app, &nina, "miles").await;
    let url = format!("/chats/{}/", thread);

    let response = app.post(&url, &nina, json!({ "content": "Rehearsal at 7?" })).await;
    assert_eq!(redirect_target(&response), url);
    let response = app.post(&url, &miles, json!({ "content": "Make it 8" })).await;
    assert_eq!(redirect_target(&response), url);

    let page = json_body(app.get(&url, &miles).await).await;
    assert_eq!(page["other_user"]["username"], "nina");
    let messages: Vec<_> = page["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["sender"]["username"].as_str().unwrap().to_string(),
                m["content"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        messages,
        vec![
            ("nina".to_string(), "Rehearsal at 7?".to_string()),
            ("miles".to_string(), "Make it 8".to_string()),
        ]
    );
    assert!(page.get("errors").is_none());
}

#[tokio::test]
async fn test_empty_message_rerenders_thread_with_errors() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    app.user("miles").await;
    let thread = start(&app, &nina, "miles").await;
    let url = format!("/chats/{}/", thread);
    app.post(&url, &nina, json!({ "content": "hello" })).await;

    let response = app.post(&url, &nina, json!({ "content": "   " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = json_body(response).await;
    assert_eq!(page["errors"]["content"][0], "This field is required.");
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
    assert_eq!(app.count("messages").await, 1);
}

#[tokio::test]
async fn test_outsider_is_redirected_to_inbox() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    app.user("miles").await;
    let (_, charles) = app.user("charles").await;
    let thread = start(&app, &nina, "miles").await;
    let url = format!("/chats/{}/", thread);

    let response = app.get(&url, &charles).await;
    assert_eq!(redirect_target(&response), "/chats/");

    let response = app.post(&url, &charles, json!({ "content": "let me in" })).await;
    assert_eq!(redirect_target(&response), "/chats/");
    assert_eq!(app.count("messages").await, 0);

    let response = app.get("/chats/999/", &charles).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inbox_lists_most_recent_first() {
    let app = test_app().await;
    let (_, a) = app.user("alice").await;
    let (_, b) = app.user("bob").await;
    app.user("carol").await;
    let (_, d) = app.user("dave").await;

    let with_b = start(&app, &a, "bob").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let with_c = start(&app, &a, "carol").await;
    start(&app, &d, "bob").await;

    let inbox = json_body(app.get("/chats/", &a).await).await;
    let order: Vec<_> = inbox
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["thread_id"].as_i64().unwrap())
        .collect();
    assert_eq!(order, vec![with_c, with_b]);
    assert_eq!(inbox[0]["other_user"]["username"], "carol");

    tokio::time::sleep(Duration::from_millis(5)).await;
    app.post(&format!("/chats/{}/", with_b), &b, json!({ "content": "ping" })).await;

    let inbox = json_body(app.get("/chats/", &a).await).await;
    assert_eq!(inbox[0]["thread_id"], with_b);
    assert_eq!(inbox[0]["last_message"], "ping");
    assert_eq!(inbox.as_array().unwrap().len(), 2);
}
