use std::env;

use anyhow::{anyhow, bail, Context, Result};
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use docdesk::{
    auth::{password::hash_password, session, Role},
    config::AppConfig,
    db,
    models::NewUser,
    schema::users,
};

const USAGE: &str = "Usage:
  manage create-user <username> <full-name> <role> <password>
  manage purge-sessions";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("create-user") => create_user(&args[1..]),
        Some("purge-sessions") => purge_sessions(),
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn create_user(args: &[String]) -> Result<()> {
    let [username, full_name, role, password] = args else {
        bail!("create-user expects 4 arguments\n{USAGE}");
    };
    let role: Role = role.parse().map_err(|err| anyhow!("{err}"))?;

    let pool = open_pool()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: username.trim().to_string(),
        password_hash: hash_password(password)?,
        full_name: full_name.trim().to_string(),
        role: role.as_str().to_string(),
    };
    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
        .context("failed to insert user")?;

    println!("Created {role} {} ({})", new_user.username, new_user.id);
    Ok(())
}

fn purge_sessions() -> Result<()> {
    let pool = open_pool()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let removed = session::purge_expired(&mut conn).context("failed to purge sessions")?;
    println!("Removed {removed} expired sessions.");
    Ok(())
}

fn open_pool() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "manage",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(pool)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
