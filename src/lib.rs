use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod auth;
pub mod client;
pub mod comments;
pub mod config;
pub mod email;
pub mod error;
pub mod follows;
pub mod pages;
pub mod posts;
pub mod response;
pub mod sync;
pub mod uploads;
pub mod users;

use config::settings::Settings;
use email::Mailer;
use response::ApiResponse;

// Room for the multipart framing and crop fields around the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub mailer: Mailer,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> PgPool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

impl FromRef<AppState> for Mailer {
    fn from_ref(app_state: &AppState) -> Mailer {
        app_state.mailer.clone()
    }
}

async fn health() -> ApiResponse<response::EmptyData> {
    ApiResponse::ok("ok")
}

/// Build the full HTTP application.
pub fn app(state: AppState) -> Router {
    let settings = state.settings.clone();

    let auth_router = Router::new()
        .route("/sign-up", post(auth::handler::signup))
        .route("/sign-in", post(auth::handler::login))
        .route("/sign-out", post(auth::handler::logout))
        .route("/me", get(auth::handler::get_me))
        .route("/verify-email", post(auth::handler::verify_email))
        .route(
            "/resend-verification",
            post(auth::handler::resend_verification),
        )
        .route("/forgot-password", post(auth::handler::forgot_password))
        .route("/reset-password", post(auth::handler::reset_password));

    let user_router = Router::new()
        .route("/me", patch(users::handler::update_me))
        .route("/search", get(users::handler::search_users))
        .route("/suggestions", get(follows::handler::get_follow_suggestions))
        .route(
            "/following-status",
            post(follows::handler::check_following_bulk),
        )
        .route(
            "/by-username/:username",
            get(users::handler::get_user_by_username),
        )
        .route("/:id", get(users::handler::get_user_profile))
        .route(
            "/:id/follow",
            post(follows::handler::toggle_follow).delete(follows::handler::unfollow_user),
        )
        .route("/:id/followers", get(follows::handler::get_followers))
        .route("/:id/following", get(follows::handler::get_following));

    let post_router = Router::new()
        .route(
            "/",
            post(posts::handler::create_post).get(posts::handler::get_feed),
        )
        .route(
            "/:id",
            get(posts::handler::get_post)
                .put(posts::handler::update_post)
                .delete(posts::handler::delete_post),
        )
        .route("/:id/like", post(posts::handler::toggle_like))
        .route("/:id/likes", get(posts::handler::get_post_likes))
        .route(
            "/:id/comments",
            get(comments::handler::get_post_comments).post(comments::handler::create_comment),
        );

    let comment_router = Router::new().route(
        "/:id",
        put(comments::handler::update_comment).delete(comments::handler::delete_comment),
    );

    let upload_router = Router::new()
        .route("/image", post(uploads::handler::upload_image))
        .layer(DefaultBodyLimit::max(
            settings.max_upload_bytes + MULTIPART_OVERHEAD,
        ));

    let page_router = Router::new()
        .route("/", get(pages::handler::list_pages))
        .route("/:slug", get(pages::handler::get_page));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth_router)
        .nest("/api/users", user_router)
        .nest("/api/posts", post_router)
        .nest("/api/comments", comment_router)
        .nest("/api/uploads", upload_router)
        .nest("/api/pages", page_router)
        .route("/legal/:slug", get(pages::handler::legal_html))
        .nest_service("/uploads", ServeDir::new(&settings.upload_dir))
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origin = match HeaderValue::from_str(&settings.frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(
                "FRONTEND_URL {:?} is not a valid origin, cross-origin requests will be refused",
                settings.frontend_url
            );
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT_LANGUAGE])
}
