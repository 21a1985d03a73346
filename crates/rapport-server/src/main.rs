mod config;

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use rapport_api::auth::{AppState, AppStateInner};
use rapport_api::routes;
use rapport_api::storage::DiskBlobStore;
use rapport_core::members;
use rapport_core::tokens::TokenIssuer;
use rapport_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rapport=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let blobs = DiskBlobStore::new(config.upload_dir.clone(), &config.public_url)?;
    let issuer = TokenIssuer::new(config.token_secret.as_bytes(), config.token_ttl)?;

    if let Some((username, password)) = &config.admin {
        let db = db.clone();
        let (username, password) = (username.clone(), password.clone());
        let seeded = tokio::task::spawn_blocking(move || {
            members::seed_admin(db.as_ref(), &username, &password, Utc::now())
        })
        .await??;
        if let Some(admin) = seeded {
            info!("Seeded administrator {}", admin.username);
        }
    }

    let state: AppState = Arc::new(AppStateInner {
        store: db,
        blobs: Arc::new(blobs),
        issuer,
    });

    let app = Router::new()
        .merge(routes::router(state))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Rapport server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
