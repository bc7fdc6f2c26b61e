//! # Rusty-Feed Binary
//!
//! The entry point that assembles the application based on compile-time features.
//!
//! `rusty-feed` serves the API. `rusty-feed issue-token <user-uuid> [--admin]`
//! prints a bearer token for that identity and exits.

mod settings;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, bail, Context};
use rf_api::middleware::{cors_policy, standard_middleware};
use rf_api::{configure_routes, AppState};
use rf_core::traits::{AuthProvider, MediaStore, PostRepo};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::settings::Settings;

// Feature-gated imports: each port is filled by exactly one plugin
#[cfg(feature = "db-sqlite")]
use rf_db_sqlite::SqlitePostRepo;

#[cfg(feature = "storage-local")]
use rf_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use rf_auth_simple::SimpleAuthProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "storage-local", feature = "auth-simple")))]
compile_error!("rusty-feed needs one plugin per port: enable db-sqlite, storage-local and auth-simple");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::load()?;

    // 1. Initialize Auth Implementation
    let auth: Arc<dyn AuthProvider> = Arc::new(
        SimpleAuthProvider::new(settings.auth_secret.expose_secret())
            .map_err(|_| anyhow!("RF_AUTH_SECRET is not a usable HMAC key"))?,
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        return run_command(command, &args[1..], auth.as_ref());
    }

    // 2. Initialize Database Implementation
    let repo: Arc<dyn PostRepo> = Arc::new(
        SqlitePostRepo::new(&settings.database_url)
            .await
            .context("Failed to init SQLite")?,
    );

    // 3. Initialize Storage Implementation
    std::fs::create_dir_all(&settings.media_root)
        .with_context(|| format!("Failed to create media root {}", settings.media_root))?;
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(
        settings.media_root.clone(),
        settings.media_url.clone(),
    ));

    let state = web::Data::new(AppState::new(repo, media, auth));
    let cors_origins = settings.cors_origins.clone();
    // Only a path prefix can be served from here; a full URL points elsewhere.
    let serve_media = settings.media_url.starts_with('/');
    let media_url = settings.media_url.clone();
    let media_root = settings.media_root.clone();

    log::info!("Rusty-Feed starting on http://{}", settings.bind_addr);

    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(state.clone())
            .wrap(cors_policy(&cors_origins))
            .wrap(standard_middleware());
        if serve_media {
            app = app.service(actix_files::Files::new(&media_url, &media_root));
        }
        app.configure(configure_routes)
    })
    .bind(&settings.bind_addr)?
    .run()
    .await?;

    Ok(())
}

fn run_command(command: &str, args: &[String], auth: &dyn AuthProvider) -> anyhow::Result<()> {
    match command {
        "issue-token" => {
            let Some(raw_id) = args.first() else {
                bail!("usage: rusty-feed issue-token <user-uuid> [--admin]");
            };
            let user_id = Uuid::parse_str(raw_id).with_context(|| format!("Invalid user id {raw_id}"))?;
            let is_admin = args.iter().any(|arg| arg == "--admin");
            println!("{}", auth.issue_token(user_id, is_admin));
            Ok(())
        }
        other => bail!("unknown command {other:?}"),
    }
}
