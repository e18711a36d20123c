use std::{sync::Arc, time::Duration};

use db::{
    DBService, DbErr,
    models::user::{CreateUser, User},
};
use server::{AppState, http};
use services::services::{
    auth::DbTokenUserProvider,
    caption::CaptionService,
    config::{load_config_from_file, save_config_to_file},
    diffusion::DiffusionService,
    generation::GenerationService,
    storage::ImageStorage,
};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::assets::{asset_dir, config_path};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersonaServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

#[tokio::main]
async fn main() -> Result<(), PersonaServerError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    // Create asset directory if it doesn't exist
    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }

    let config = load_config_from_file(&config_path()).await.with_env_overrides();
    if let Err(err) = save_config_to_file(&config, &config_path()).await {
        tracing::warn!("Failed to persist config file: {}", err);
    }

    let db = DBService::new().await?;
    bootstrap_user_if_needed(&db).await?;

    let diffusion = Arc::new(DiffusionService::new(
        config.diffusion.api_url.clone(),
        Duration::from_secs(config.diffusion.timeout_secs),
    ));
    let caption = Arc::new(CaptionService::new(
        config.caption.api_url.clone(),
        Duration::from_secs(config.caption.timeout_secs),
        config.caption.model.clone(),
        config.caption.default_prompt.clone(),
    ));
    let storage = ImageStorage::with_default_root();
    let generation = Arc::new(GenerationService::new(
        diffusion,
        caption,
        storage,
        config.generation.auto_set_main_image,
    ));

    let state = AppState::new(db, config, Arc::new(DbTokenUserProvider), generation);
    let app_router = http::router(state);

    let port = std::env::var("BACKEND_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(3001);
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();

    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Creates a local user on first startup so the instance is usable without
/// any manual account provisioning. The token is only printed once.
async fn bootstrap_user_if_needed(db: &DBService) -> Result<(), DbErr> {
    if User::count(&db.conn).await? > 0 {
        return Ok(());
    }

    let config = load_config_from_file(&config_path()).await;
    let api_token = Uuid::new_v4().to_string();
    let user = User::create(
        &db.conn,
        &CreateUser {
            username: config.bootstrap_user.username.clone(),
            email: config.bootstrap_user.email.clone(),
            api_token: api_token.clone(),
        },
    )
    .await?;
    tracing::info!(
        "Created bootstrap user '{}'; API token: {}",
        user.username,
        api_token
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    tracing::info!("Shutdown signal received, stopping server");
}
