use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use uuid::Uuid;

use fastfeet::auth::password::hash_password;
use fastfeet::clock::{Clock, SystemClock};
use fastfeet::config::AppConfig;
use fastfeet::db;
use fastfeet::mail::{LogMailer, Mailer, SmtpMailer};
use fastfeet::models::NewUser;
use fastfeet::routes;
use fastfeet::state::AppState;
use fastfeet::store::{MemoryStore, PgStore, Store, UserStore};
use fastfeet::uploads::DiskStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        upload_dir = %config.upload_dir,
        smtp_enabled = config.smtp_host.is_some(),
        "loaded fastfeet configuration"
    );

    let store: Arc<dyn Store> = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::init_pool(database_url, config.database_max_pool_size)?;
            db::run_migrations(&pool)?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is volatile");
            let store = Arc::new(MemoryStore::new());
            seed_admin(&config, store.as_ref()).await?;
            store
        }
    };

    let mailer: Arc<dyn Mailer> = match config.smtp_host.as_deref() {
        Some(host) => Arc::new(SmtpMailer::from_config(&config, host)?),
        None => {
            tracing::warn!("MAIL_HOST not set; notifications will only be logged");
            Arc::new(LogMailer)
        }
    };

    let uploads = Arc::new(DiskStorage::new(config.upload_dir.clone()));

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(config, store, mailer, uploads, Arc::new(SystemClock));
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// The in-memory store starts empty; without a seeded user every protected
/// route would refuse all callers.
async fn seed_admin(config: &AppConfig, store: &MemoryStore) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set; no user can log in");
        return Ok(());
    };

    store
        .create_user(
            NewUser {
                id: Uuid::new_v4(),
                name: config.admin_name.clone(),
                email: email.clone(),
                password_hash: hash_password(password)?,
            },
            SystemClock.now(),
        )
        .await?;
    tracing::info!(email = %email, "seeded admin user into the in-memory store");
    Ok(())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        tracing::info!("received shutdown signal");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
