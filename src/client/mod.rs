//! Typed HTTP client for the ThreadUp API.

use axum::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::{AuthResponse, LoginUser, UserResponse},
    comments::{CommentBody, CommentResponse, CommentsListResponse},
    follows::{FollowActionResponse, FollowListResponse, FollowSuggestionResponse},
    posts::{CreatePost, FeedScope, LikeActionResponse, PostListResponse, PostResponse},
    response::ApiResponse,
    users::UserProfileResponse,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// The calls the state stores depend on. Implemented by [`ApiClient`] and by
/// test doubles.
#[async_trait]
pub trait SocialApi: Send + Sync {
    async fn feed_page(
        &self,
        scope: FeedScope,
        offset: i64,
        limit: i64,
    ) -> Result<PostListResponse, ClientError>;

    async fn toggle_like(&self, post_id: Uuid) -> Result<LikeActionResponse, ClientError>;

    async fn toggle_follow(&self, user_id: Uuid) -> Result<FollowActionResponse, ClientError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}/api{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let envelope: ApiResponse<T> = self.envelope(req).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("response has no data".to_string()))
    }

    /// Send a request whose success response carries only a message.
    async fn send_message(&self, req: RequestBuilder) -> Result<Option<String>, ClientError> {
        let envelope: ApiResponse<serde_json::Value> = self.envelope(req).await?;
        Ok(envelope.message)
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<ApiResponse<T>, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        decode_envelope(status, &bytes)
    }

    async fn json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.request(method, path).json(body)).await
    }

    /// Signs in and keeps the token for later requests.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<UserResponse, ClientError> {
        let body = LoginUser {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self.json(Method::POST, "/auth/sign-in", &body).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.send(self.request(Method::GET, "/auth/me")).await
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfileResponse, ClientError> {
        self.send(self.request(Method::GET, &format!("/users/{}", user_id)))
            .await
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<PostResponse, ClientError> {
        self.json(Method::POST, "/posts", post).await
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<Option<String>, ClientError> {
        self.send_message(self.request(Method::DELETE, &format!("/posts/{}", post_id)))
            .await
    }

    pub async fn followers(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<FollowListResponse, ClientError> {
        let req = self
            .request(Method::GET, &format!("/users/{}/followers", user_id))
            .query(&[("offset", offset), ("limit", limit)]);
        self.send(req).await
    }

    pub async fn following(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<FollowListResponse, ClientError> {
        let req = self
            .request(Method::GET, &format!("/users/{}/following", user_id))
            .query(&[("offset", offset), ("limit", limit)]);
        self.send(req).await
    }

    pub async fn suggestions(&self, limit: i64) -> Result<Vec<FollowSuggestionResponse>, ClientError> {
        let req = self
            .request(Method::GET, "/users/suggestions")
            .query(&[("limit", limit)]);
        self.send(req).await
    }

    pub async fn comments(
        &self,
        post_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<CommentsListResponse, ClientError> {
        let req = self
            .request(Method::GET, &format!("/posts/{}/comments", post_id))
            .query(&[("offset", offset), ("limit", limit)]);
        self.send(req).await
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        content: &str,
    ) -> Result<CommentResponse, ClientError> {
        let body = CommentBody {
            content: content.to_string(),
        };
        self.json(Method::POST, &format!("/posts/{}/comments", post_id), &body)
            .await
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<Option<String>, ClientError> {
        self.send_message(self.request(Method::DELETE, &format!("/comments/{}", comment_id)))
            .await
    }
}

#[async_trait]
impl SocialApi for ApiClient {
    async fn feed_page(
        &self,
        scope: FeedScope,
        offset: i64,
        limit: i64,
    ) -> Result<PostListResponse, ClientError> {
        let req = self.request(Method::GET, "/posts").query(&[
            ("scope", scope.as_str().to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ]);
        self.send(req).await
    }

    async fn toggle_like(&self, post_id: Uuid) -> Result<LikeActionResponse, ClientError> {
        self.send(self.request(Method::POST, &format!("/posts/{}/like", post_id)))
            .await
    }

    async fn toggle_follow(&self, user_id: Uuid) -> Result<FollowActionResponse, ClientError> {
        self.send(self.request(Method::POST, &format!("/users/{}/follow", user_id)))
            .await
    }
}

/// Turn a status and body into the envelope, mapping failures to
/// [`ClientError::Api`] with the server's message when there is one.
fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    bytes: &[u8],
) -> Result<ApiResponse<T>, ClientError> {
    let parsed: Result<ApiResponse<T>, _> = serde_json::from_slice(bytes);

    match parsed {
        Ok(envelope) if status.is_success() && envelope.success => Ok(envelope),
        Ok(envelope) => Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string()),
        }),
        Err(_) if !status.is_success() => {
            // Not our envelope (proxy error page, extractor rejection)
            let message = failure_message(bytes)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string());
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
        Err(e) => Err(ClientError::Decode(e.to_string())),
    }
}

/// Message of a failure envelope whose `data` does not match the success type.
fn failure_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}
