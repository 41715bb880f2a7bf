use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub cookie_secure: bool,
    pub frontend_url: String,
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub email: Option<EmailSettings>,
}

/// SMTP relay settings. Defaults target Resend's SMTP endpoint.
#[derive(Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub templates_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let port: u16 = parse_env("PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();
        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            port,
            addr,
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            jwt_ttl_hours: parse_env("JWT_TTL_HOURS", 24)?,
            cookie_secure: parse_env("COOKIE_SECURE", false)?,
            frontend_url,
            public_url,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            email: EmailSettings::from_env()?,
        })
    }

    /// Public URL of a file uploaded by `owner`.
    pub fn upload_url(&self, owner: Uuid, file_name: &str) -> String {
        format!("{}/uploads/{}/{}", self.public_url, owner, file_name)
    }
}

impl EmailSettings {
    /// Email is enabled only when a Resend API key is present.
    fn from_env() -> Result<Option<Self>> {
        let Some(api_key) = env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.resend.com".to_string()),
            smtp_port: parse_env("SMTP_PORT", 465)?,
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_else(|_| "resend".to_string()),
            smtp_password: api_key,
            from_email: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@threadup.app".to_string()),
            from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "ThreadUp".to_string()),
            templates_dir: env::var("EMAIL_TEMPLATES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("templates/emails")),
        }))
    }
}

/// Parse `key` from the environment, or use `default` when it is unset.
/// A value that is set but malformed is an error.
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Settings {
    /// Settings for tests; nothing here touches the environment.
    pub fn for_tests() -> Self {
        Self {
            port: 3000,
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: "postgres://localhost/threadup_test".to_string(),
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: 1,
            cookie_secure: false,
            frontend_url: "http://localhost:5173".to_string(),
            public_url: "http://localhost:3000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_url_joins_public_base() {
        let settings = Settings::for_tests();
        assert_eq!(
            settings.upload_url(Uuid::nil(), "abc.jpg"),
            "http://localhost:3000/uploads/00000000-0000-0000-0000-000000000000/abc.jpg"
        );
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u16 = parse_env("THREADUP_TEST_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_env_rejects_malformed_value() {
        env::set_var("THREADUP_TEST_MALFORMED_PORT", "abc");
        let parsed: Result<u16> = parse_env("THREADUP_TEST_MALFORMED_PORT", 3000);
        env::remove_var("THREADUP_TEST_MALFORMED_PORT");

        let err = parsed.unwrap_err();
        assert!(err.to_string().contains("THREADUP_TEST_MALFORMED_PORT"));

        env::set_var("THREADUP_TEST_PADDED_FLAG", " true ");
        let flag: bool = parse_env("THREADUP_TEST_PADDED_FLAG", false).unwrap();
        env::remove_var("THREADUP_TEST_PADDED_FLAG");
        assert!(flag);
    }
}
