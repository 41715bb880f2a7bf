use anyhow::Result;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::config::settings::EmailSettings;

/// Mail purposes, each with an HTML template and a plain-text fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Verification,
    PasswordReset,
    Welcome,
}

impl MailKind {
    fn template(self) -> &'static str {
        match self {
            MailKind::Verification => "verification.html",
            MailKind::PasswordReset => "password_reset.html",
            MailKind::Welcome => "welcome.html",
        }
    }

    fn subject(self) -> &'static str {
        match self {
            MailKind::Verification => "Verify your email - ThreadUp",
            MailKind::PasswordReset => "Reset your password - ThreadUp",
            MailKind::Welcome => "Welcome to ThreadUp!",
        }
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    frontend_url: String,
    templates_dir: PathBuf,
}

impl EmailService {
    pub fn new(settings: &EmailSettings, frontend_url: &str) -> Result<Self> {
        let creds = Credentials::new(
            settings.smtp_username.clone(),
            settings.smtp_password.clone(),
        );

        // Port 465 is implicit TLS, anything else upgrades with STARTTLS
        let mailer: AsyncSmtpTransport<Tokio1Executor> = if settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
                .port(settings.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
                .port(settings.smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from: format!("{} <{}>", settings.from_name, settings.from_email),
            frontend_url: frontend_url.to_string(),
            templates_dir: settings.templates_dir.clone(),
        })
    }

    pub async fn send_verification_email(&self, to_email: &str, token: &str) -> Result<()> {
        let link = format!("{}/verify-email?token={}", self.frontend_url, token);
        let mut variables = HashMap::new();
        variables.insert("verification_link", link.clone());

        self.send_kind(MailKind::Verification, to_email, &variables, &link, None)
            .await
    }

    pub async fn send_password_reset_email(&self, to_email: &str, token: &str) -> Result<()> {
        let link = format!("{}/reset-password?token={}", self.frontend_url, token);
        let mut variables = HashMap::new();
        variables.insert("reset_link", link.clone());

        self.send_kind(MailKind::PasswordReset, to_email, &variables, &link, None)
            .await
    }

    pub async fn send_welcome_email(&self, to_email: &str, username: &str) -> Result<()> {
        let link = format!("{}/feed", self.frontend_url);
        let mut variables = HashMap::new();
        variables.insert("username", username.to_string());
        variables.insert("feed_link", link.clone());

        self.send_kind(MailKind::Welcome, to_email, &variables, &link, Some(username))
            .await
    }

    async fn send_kind(
        &self,
        kind: MailKind,
        to_email: &str,
        variables: &HashMap<&str, String>,
        link: &str,
        username: Option<&str>,
    ) -> Result<()> {
        let template = load_template(&self.templates_dir, kind).await?;
        let html_body = render_template(&template, variables);
        let plain_body = plain_text(kind, link, username);

        self.send_email(to_email, kind.subject(), &plain_body, &html_body)
            .await
    }

    /// Send multipart email (HTML + plain text fallback)
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!("Email sent to {}", to_email);
        Ok(())
    }
}

/// Background dispatcher used by handlers. Delivery never blocks or fails a
/// request; without email settings every send is skipped.
#[derive(Clone, Default)]
pub struct Mailer {
    service: Option<EmailService>,
}

impl Mailer {
    pub fn new(service: Option<EmailService>) -> Self {
        Self { service }
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    pub fn verification(&self, to_email: String, token: String) {
        self.dispatch(MailKind::Verification, move |s| async move {
            s.send_verification_email(&to_email, &token).await
        });
    }

    pub fn password_reset(&self, to_email: String, token: String) {
        self.dispatch(MailKind::PasswordReset, move |s| async move {
            s.send_password_reset_email(&to_email, &token).await
        });
    }

    pub fn welcome(&self, to_email: String, username: String) {
        self.dispatch(MailKind::Welcome, move |s| async move {
            s.send_welcome_email(&to_email, &username).await
        });
    }

    fn dispatch<F, Fut>(&self, kind: MailKind, send: F)
    where
        F: FnOnce(EmailService) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let Some(service) = self.service.clone() else {
            tracing::warn!("Email disabled, skipping {:?} mail", kind);
            return;
        };

        let fut = send(service);
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::error!("Failed to send {:?} mail: {:?}", kind, e);
            }
        });
    }
}

/// Replace all `{{variable}}` placeholders.
pub fn render_template(template: &str, variables: &HashMap<&str, String>) -> String {
    let mut html = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        html = html.replace(&placeholder, value);
    }
    html
}

fn plain_text(kind: MailKind, link: &str, username: Option<&str>) -> String {
    match kind {
        MailKind::Verification => format!(
            r#"Welcome to ThreadUp!

Please verify your email address by opening the link below:

{}

This link will expire in 24 hours.

If you didn't create an account, you can safely ignore this email.

The ThreadUp Team"#,
            link
        ),
        MailKind::PasswordReset => format!(
            r#"Hi there,

You requested to reset your password. Open the link below to set a new password:

{}

This link will expire in 1 hour.

If you didn't request a password reset, you can safely ignore this email.

The ThreadUp Team"#,
            link
        ),
        MailKind::Welcome => format!(
            r#"Hi {},

Your email has been verified. Welcome to ThreadUp!

See what people are sharing: {}

The ThreadUp Team"#,
            username.unwrap_or("there"),
            link
        ),
    }
}

async fn load_template(templates_dir: &Path, kind: MailKind) -> Result<String> {
    tokio::fs::read_to_string(templates_dir.join(kind.template()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read template {}: {}", kind.template(), e))
}
