use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use threadup::{
    app,
    config::settings::Settings,
    email::{EmailService, Mailer},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("threadup=debug,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.database_max_connections)
        .connect(&settings.database_url)
        .await?;

    info!("database connected");

    sqlx::migrate!("./migrations").run(&pool).await?;

    let mailer = match &settings.email {
        Some(email) => Mailer::new(Some(EmailService::new(email, &settings.frontend_url)?)),
        None => {
            tracing::warn!("RESEND_API_KEY not set, emails are disabled");
            Mailer::default()
        }
    };

    let app_state = AppState {
        pool,
        settings: settings.clone(),
        mailer,
    };

    let app = app(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
