//! Feed Tests
//!
//! Covers post creation and the annotated feed: like counts, per-viewer
//! liked flags, and comment totals, all batched per page.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use std::collections::HashMap;

use kudos::app::karma::KarmaService;
use kudos::domain::karma::TargetRef;

#[tokio::test]
async fn create_post_and_see_it_in_the_feed() {
    let app = app().await;
    let user = app.create_user("feed_author").await;

    let resp = app
        .post_json("/posts", json!({"content": "first post"}), Some(&user.token))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["author"], user.username.as_str());
    assert_eq!(body["like_count"], 0);

    let resp = app.get("/posts", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let feed = resp.json();
    let posts = feed.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], "first post");
}

#[tokio::test]
async fn feed_is_newest_first() {
    let app = app().await;
    let user = app.create_user("feed_order").await;
    app.create_post(&user.token, "older").await;
    app.create_post(&user.token, "newer").await;

    let resp = app.get("/posts", None).await;
    let feed = resp.json();
    let contents: Vec<&str> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["newer", "older"]);
}

#[tokio::test]
async fn feed_annotations_depend_on_the_viewer() {
    let app = app().await;
    let author = app.create_user("feed_annot_author").await;
    let liker = app.create_user("feed_annot_liker").await;
    let bystander = app.create_user("feed_annot_bystander").await;
    let post_id = app.create_post(&author.token, "annotated post").await;
    app.create_comment(&liker.token, post_id, None, "first!").await;

    let resp = app
        .post_json(
            "/likes/toggle",
            json!({"type": "post", "id": post_id}),
            Some(&liker.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get("/posts", Some(&liker.token)).await;
    let feed = resp.json();
    assert_eq!(feed[0]["like_count"], 1);
    assert_eq!(feed[0]["is_liked"], true);
    assert_eq!(feed[0]["comments_count"], 1);

    let resp = app.get("/posts", Some(&bystander.token)).await;
    let feed = resp.json();
    assert_eq!(feed[0]["like_count"], 1);
    assert_eq!(feed[0]["is_liked"], false);
}

#[tokio::test]
async fn creating_a_post_requires_authentication() {
    let app = app().await;

    let resp = app.post_json("/posts", json!({"content": "anon"}), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_post_is_rejected() {
    let app = app().await;
    let user = app.create_user("empty_poster").await;

    let resp = app
        .post_json("/posts", json!({"content": "  "}), Some(&user.token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_annotate_handles_mixed_targets_in_one_call() {
    let app = app().await;
    let author = app.create_user("mixed_author").await;
    let actor = app.create_user("mixed_actor").await;
    let post_id = app.create_post(&author.token, "post").await;
    let comment_id = app
        .create_comment(&author.token, post_id, None, "comment")
        .await;

    let resp = app
        .post_json(
            "/likes/toggle",
            json!({"type": "post", "id": post_id}),
            Some(&actor.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let targets = vec![
        TargetRef::post(post_id),
        TargetRef::comment(comment_id),
        TargetRef::post(999_999),
    ];
    let annotations = KarmaService::new(app.state.db.clone())
        .batch_annotate(&targets, Some(actor.id))
        .await
        .unwrap();

    assert_eq!(annotations.len(), 3);
    let post_annotation = annotations[&TargetRef::post(post_id)];
    assert_eq!(post_annotation.like_count, 1);
    assert!(post_annotation.is_liked);

    let comment_annotation = annotations[&TargetRef::comment(comment_id)];
    assert_eq!(comment_annotation.like_count, 0);
    assert!(!comment_annotation.is_liked);

    // Unknown targets still annotate, as zero.
    let missing = annotations[&TargetRef::post(999_999)];
    assert_eq!(missing.like_count, 0);
    assert!(!missing.is_liked);
}

#[tokio::test]
async fn batch_annotate_with_no_targets_is_empty() {
    let app = app().await;

    let annotations: HashMap<_, _> = KarmaService::new(app.state.db.clone())
        .batch_annotate(&[], Some(1))
        .await
        .unwrap();
    assert!(annotations.is_empty());
}
