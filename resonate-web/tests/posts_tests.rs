//! Integration tests for posts, timelines, likes and comments

mod helpers;

use axum::http::StatusCode;
use helpers::{json_body, redirect_target, test_app, TestApp};
use serde_json::{json, Value};
use std::time::Duration;

async fn create_post(app: &TestApp, token: &str, content: &str) -> i64 {
    let response = app
        .post("/accounts/posts/create/", token, json!({ "content": content }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_i64().unwrap()
}

fn ids(page: &Value) -> Vec<i64> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect()
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_create_post_validation() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;

    let response = app
        .post("/accounts/posts/create/", &nina, json!({ "content": "  New trio record out Friday  " }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["content"], "New trio record out Friday");
    assert_eq!(body["author"]["username"], "nina");
    assert_eq!(body["like_count"], 0);

    let response = app.post("/accounts/posts/create/", &nina, json!({ "content": "   " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"]["fields"]["non_field_errors"].is_array());

    let response = app
        .post(
            "/accounts/posts/create/",
            &nina,
            json!({ "media_url": "https://cdn.example/take2.mp3" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.count("posts").await, 2);
}

#[tokio::test]
async fn test_home_and_feed_ordering() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;
    let (_, charles) = app.user("charles").await;

    let own = create_post(&app, &nina, "mine").await;
    tick().await;
    let followed = create_post(&app, &miles, "kind of blue").await;
    tick().await;
    let stranger = create_post(&app, &charles, "ah um").await;

    app.post("/accounts/follow_toggle/miles/", &nina, json!({})).await;

    let home = json_body(app.get("/accounts/", &nina).await).await;
    assert_eq!(ids(&home), vec![stranger, followed, own]);
    assert_eq!(home["total_results"], 3);

    let feed = json_body(app.get("/accounts/feed/", &nina).await).await;
    assert_eq!(ids(&feed), vec![followed, own]);
}

#[tokio::test]
async fn test_like_toggle_parity() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;
    let post = create_post(&app, &nina, "listen to this").await;
    let url = format!("/accounts/like_toggle/{}/", post);

    let body = json_body(app.post(&url, &miles, json!({})).await).await;
    assert_eq!(body, json!({"liked": true, "likes": 1}));

    let body = json_body(app.post(&url, &miles, json!({})).await).await;
    assert_eq!(body, json!({"liked": false, "likes": 0}));

    for _ in 0..3 {
        app.post(&url, &miles, json!({})).await;
    }
    let view = json_body(app.get(&format!("/accounts/view_post/{}/", post), &miles).await).await;
    assert_eq!(view["liked"], true);
    assert_eq!(view["post"]["like_count"], 1);
}

#[tokio::test]
async fn test_like_own_or_missing_post() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let post = create_post(&app, &nina, "mine").await;

    let response = app.post(&format!("/accounts/like_toggle/{}/", post), &nina, json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.count("likes").await, 0);

    let response = app.post("/accounts/like_toggle/999/", &nina, json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_on_post_view() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;
    let post = create_post(&app, &nina, "gig tonight").await;
    let url = format!("/accounts/post/{}/comment/", post);

    let response = app.post(&url, &miles, json!({ "content": "I'll be there" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    tick().await;
    app.post(&url, &nina, json!({ "content": "see you" })).await;

    let response = app.post(&url, &miles, json!({ "content": "  " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post("/accounts/post/999/comment/", &miles, json!({ "content": "hello?" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let view = json_body(app.get(&format!("/accounts/view_post/{}/", post), &miles).await).await;
    let comments: Vec<_> = view["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(comments, vec!["I'll be there", "see you"]);
    assert_eq!(view["post"]["comment_count"], 2);

    assert_eq!(app.get("/accounts/view_post/999/", &miles).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_post_owner_only_with_cascade() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;
    let post = create_post(&app, &nina, "delete me later").await;
    app.post(&format!("/accounts/post/{}/comment/", post), &miles, json!({ "content": "nice" }))
        .await;
    app.post(&format!("/accounts/like_toggle/{}/", post), &miles, json!({})).await;

    let delete_url = format!("/accounts/post/{}/delete/", post);
    let response = app.post(&delete_url, &miles, json!({})).await;
    assert_eq!(redirect_target(&response), format!("/accounts/view_post/{}/", post));
    assert_eq!(app.count("posts").await, 1);

    let response = app.post(&delete_url, &nina, json!({})).await;
    assert_eq!(redirect_target(&response), "/accounts/profile/");
    assert_eq!(app.count("posts").await, 0);
    assert_eq!(app.count("comments").await, 0);
    assert_eq!(app.count("likes").await, 0);

    let response = app.post(&delete_url, &nina, json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_comment_owner_only() {
    let app = test_app().await;
    let (_, nina) = app.user("nina").await;
    let (_, miles) = app.user("miles").await;
    let post = create_post(&app, &nina, "thoughts?").await;

    let response = app
        .post(&format!("/accounts/post/{}/comment/", post), &miles, json!({ "content": "hmm" }))
        .await;
    let comment = json_body(response).await["id"].as_i64().unwrap();
    let delete_url = format!("/accounts/comment/{}/delete/", comment);
    let post_url = format!("/accounts/view_post/{}/", post);

    // The post author does not own the comment
    let response = app.post(&delete_url, &nina, json!({})).await;
    assert_eq!(redirect_target(&response), post_url);
    assert_eq!(app.count("comments").await, 1);

    let response = app.post(&delete_url, &miles, json!({})).await;
    assert_eq!(redirect_target(&response), post_url);
    assert_eq!(app.count("comments").await, 0);

    let response = app.post("/accounts/comment/999/delete/", &miles, json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
