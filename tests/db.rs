//! Handler tests against a real Postgres database.
//!
//! `#[sqlx::test]` creates a fresh database per test from `DATABASE_URL`
//! and applies `migrations/`, so the counter triggers run for real.

use std::{net::SocketAddr, path::PathBuf};

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use threadup::{app, auth::jwt, config::settings::Settings, email::Mailer, AppState};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "db-test-secret";

fn settings() -> Settings {
    Settings {
        port: 3000,
        addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        database_url: String::new(),
        database_max_connections: 1,
        jwt_secret: SECRET.to_string(),
        jwt_ttl_hours: 1,
        cookie_secure: false,
        frontend_url: "http://localhost:5173".to_string(),
        public_url: "http://localhost:3000".to_string(),
        upload_dir: PathBuf::from("uploads"),
        max_upload_bytes: 1024 * 1024,
        email: None,
    }
}

fn token(user: Uuid) -> String {
    jwt::create_token(user, SECRET, 1).unwrap()
}

async fn call(
    pool: &PgPool,
    method: &str,
    uri: &str,
    body: Option<Value>,
    user: Option<Uuid>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let router = app(AppState {
        pool: pool.clone(),
        settings: settings(),
        mailer: Mailer::default(),
    });
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn insert_user(pool: &PgPool, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, 'x')",
    )
    .bind(id)
    .bind(username)
    .bind(format!("{username}@example.com"))
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Insert a post created `minutes_ago` minutes in the past.
async fn insert_post(pool: &PgPool, author: Uuid, content: &str, minutes_ago: i32) -> Uuid {
    sqlx::query(
        r#"
        INSERT INTO posts (author_id, content, created_at)
        VALUES ($1, $2, NOW() - make_interval(mins => $3))
        RETURNING id
        "#,
    )
    .bind(author)
    .bind(content)
    .bind(minutes_ago)
    .fetch_one(pool)
    .await
    .unwrap()
    .get("id")
}

async fn follow(pool: &PgPool, follower: Uuid, following: Uuid) {
    sqlx::query("INSERT INTO follows (follower_id, following_id) VALUES ($1, $2)")
        .bind(follower)
        .bind(following)
        .execute(pool)
        .await
        .unwrap();
}

async fn user_counts(pool: &PgPool, user: Uuid) -> (i32, i32) {
    let row = sqlx::query("SELECT followers_count, following_count FROM users WHERE id = $1")
        .bind(user)
        .fetch_one(pool)
        .await
        .unwrap();
    (row.get("followers_count"), row.get("following_count"))
}

#[sqlx::test(migrations = "./migrations")]
async fn like_toggle_tracks_count_per_viewer(pool: PgPool) {
    let author = insert_user(&pool, "author").await;
    let fan = insert_user(&pool, "fan").await;
    let post = insert_post(&pool, author, "hello", 0).await;
    let uri = format!("/api/posts/{post}/like");

    let (status, body) = call(&pool, "POST", &uri, None, Some(fan)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "liked": true, "like_count": 1 }));

    let (_, body) = call(&pool, "POST", &uri, None, Some(author)).await;
    assert_eq!(body["data"], json!({ "liked": true, "like_count": 2 }));

    let (_, body) = call(&pool, "POST", &uri, None, Some(fan)).await;
    assert_eq!(body["data"], json!({ "liked": false, "like_count": 1 }));

    let (_, body) = call(&pool, "GET", &format!("/api/posts/{post}"), None, Some(fan)).await;
    assert_eq!(body["data"]["liked_by_me"], false);
    assert_eq!(body["data"]["like_count"], 1);

    let (status, _) = call(
        &pool,
        "POST",
        &format!("/api/posts/{}/like", Uuid::new_v4()),
        None,
        Some(fan),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_toggle_updates_both_counters(pool: PgPool) {
    let viewer = insert_user(&pool, "viewer").await;
    let target = insert_user(&pool, "target").await;
    let uri = format!("/api/users/{target}/follow");

    let (status, body) = call(&pool, "POST", &uri, None, Some(viewer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "following": true, "followers_count": 1, "following_count": 1 })
    );
    assert_eq!(user_counts(&pool, target).await, (1, 0));
    assert_eq!(user_counts(&pool, viewer).await, (0, 1));

    let (_, body) = call(&pool, "POST", &uri, None, Some(viewer)).await;
    assert_eq!(
        body["data"],
        json!({ "following": false, "followers_count": 0, "following_count": 0 })
    );

    let (status, _) = call(
        &pool,
        "POST",
        &format!("/api/users/{viewer}/follow"),
        None,
        Some(viewer),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(
        &pool,
        "POST",
        &format!("/api/users/{}/follow", Uuid::new_v4()),
        None,
        Some(viewer),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn counters_never_drop_below_zero(pool: PgPool) {
    let viewer = insert_user(&pool, "viewer").await;
    let target = insert_user(&pool, "target").await;
    follow(&pool, viewer, target).await;

    sqlx::query("UPDATE users SET followers_count = 0 WHERE id = $1")
        .bind(target)
        .execute(&pool)
        .await
        .unwrap();

    let (_, body) = call(
        &pool,
        "POST",
        &format!("/api/users/{target}/follow"),
        None,
        Some(viewer),
    )
    .await;
    assert_eq!(body["data"]["following"], false);
    assert_eq!(body["data"]["followers_count"], 0);
    assert_eq!(user_counts(&pool, target).await, (0, 0));
}

#[sqlx::test(migrations = "./migrations")]
async fn following_feed_shows_followed_authors_and_own_posts(pool: PgPool) {
    let viewer = insert_user(&pool, "viewer").await;
    let friend = insert_user(&pool, "friend").await;
    let stranger = insert_user(&pool, "stranger").await;
    follow(&pool, viewer, friend).await;

    let own = insert_post(&pool, viewer, "mine", 30).await;
    let friends = insert_post(&pool, friend, "theirs", 10).await;
    insert_post(&pool, stranger, "unrelated", 0).await;

    let (status, body) = call(
        &pool,
        "GET",
        "/api/posts?scope=following&limit=1",
        None,
        Some(viewer),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["has_more"], true);
    assert_eq!(body["data"]["posts"][0]["id"], friends.to_string());

    let (_, body) = call(
        &pool,
        "GET",
        "/api/posts?scope=following&limit=1&offset=1",
        None,
        Some(viewer),
    )
    .await;
    assert_eq!(body["data"]["has_more"], false);
    assert_eq!(body["data"]["posts"][0]["id"], own.to_string());

    let (_, body) = call(&pool, "GET", "/api/posts", None, None).await;
    assert_eq!(body["data"]["total"], 3);

    let (status, _) = call(&pool, "GET", "/api/posts?scope=following", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn suggestions_rank_mutuals_then_pad_with_popular(pool: PgPool) {
    let viewer = insert_user(&pool, "viewer").await;
    let f1 = insert_user(&pool, "f1").await;
    let f2 = insert_user(&pool, "f2").await;
    let shared = insert_user(&pool, "shared").await;
    let single = insert_user(&pool, "single").await;
    let popular = insert_user(&pool, "popular").await;

    follow(&pool, viewer, f1).await;
    follow(&pool, viewer, f2).await;
    follow(&pool, f1, shared).await;
    follow(&pool, f2, shared).await;
    follow(&pool, f1, single).await;
    // popular ends up with four followers
    follow(&pool, shared, popular).await;
    follow(&pool, single, popular).await;
    follow(&pool, f1, popular).await;
    follow(&pool, f2, popular).await;

    let (status, body) = call(&pool, "GET", "/api/users/suggestions", None, Some(viewer)).await;
    assert_eq!(status, StatusCode::OK);

    let cards = body["data"].as_array().unwrap();
    let ids: Vec<&str> = cards.iter().filter_map(|c| c["id"].as_str()).collect();
    // Ties on mutuals break on follower count
    assert_eq!(
        ids,
        vec![
            popular.to_string(),
            shared.to_string(),
            single.to_string()
        ]
    );
    assert_eq!(cards[0]["mutual_followers_count"], 2);
    assert_eq!(cards[0]["followers_count"], 4);
    assert_eq!(cards[2]["mutual_followers_count"], 1);
    assert!(!ids.contains(&viewer.to_string().as_str()));
    assert!(!ids.contains(&f1.to_string().as_str()));

    let (_, body) = call(
        &pool,
        "GET",
        "/api/users/suggestions?limit=1",
        None,
        Some(viewer),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn suggestions_pad_with_popular_accounts_for_new_users(pool: PgPool) {
    let newcomer = insert_user(&pool, "newcomer").await;
    let quiet = insert_user(&pool, "quiet").await;
    let star = insert_user(&pool, "star").await;
    follow(&pool, quiet, star).await;

    let (_, body) = call(&pool, "GET", "/api/users/suggestions", None, Some(newcomer)).await;
    let cards = body["data"].as_array().unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["id"], star.to_string());
    assert_eq!(cards[0]["mutual_followers_count"], 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn blank_edits_and_comments_are_rejected(pool: PgPool) {
    let author = insert_user(&pool, "author").await;
    let post = insert_post(&pool, author, "original", 0).await;

    let (status, _) = call(
        &pool,
        "PUT",
        &format!("/api/posts/{post}"),
        Some(json!({ "content": "   " })),
        Some(author),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(
        &pool,
        "POST",
        &format!("/api/posts/{post}/comments"),
        Some(json!({ "content": " \n " })),
        Some(author),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = call(&pool, "GET", &format!("/api/posts/{post}"), None, None).await;
    assert_eq!(body["data"]["content"], "original");
    assert_eq!(body["data"]["comment_count"], 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn posts_cannot_reference_another_users_upload(pool: PgPool) {
    let owner = insert_user(&pool, "owner").await;
    let thief = insert_user(&pool, "thief").await;
    let image = settings().upload_url(owner, "pic.jpg");

    let (status, _) = call(
        &pool,
        "POST",
        "/api/posts",
        Some(json!({ "image_url": image })),
        Some(thief),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(
        &pool,
        "POST",
        "/api/posts",
        Some(json!({ "image_url": image })),
        Some(owner),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["image_url"], image);
}
