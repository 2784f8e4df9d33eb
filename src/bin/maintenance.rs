use std::env;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use fastfeet::{
    auth::password::hash_password,
    clock::{Clock, SystemClock},
    config::AppConfig,
    db,
    models::NewUser,
    store::{PgStore, UserStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("create-user") => {
            let (Some(name), Some(email), Some(password)) =
                (args.next(), args.next(), args.next())
            else {
                eprintln!("Usage: maintenance create-user <name> <email> <password>");
                std::process::exit(1);
            };
            create_user(name, email, password).await?;
        }
        Some(cmd) => {
            eprintln!(
                "Unknown command: {cmd}\nUsage: maintenance create-user <name> <email> <password>"
            );
            std::process::exit(1);
        }
        None => {
            eprintln!("Usage: maintenance create-user <name> <email> <password>");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn create_user(name: String, email: String, password: String) -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        "loaded fastfeet configuration"
    );
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to manage users")?;
    let pool = db::init_pool(database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;

    let store = PgStore::new(pool);

    if store.find_user_by_email(&email).await?.is_some() {
        bail!("a user with email {email} already exists");
    }

    let password_hash = hash_password(&password)?;
    let user = store
        .create_user(
            NewUser {
                id: Uuid::new_v4(),
                name,
                email,
                password_hash,
            },
            SystemClock.now(),
        )
        .await?;

    println!("Created user {} <{}>.", user.name, user.email);
    Ok(())
}
