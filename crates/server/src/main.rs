use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use config::Config;
use crm_client::CrmClient;
use db::DBService;
use lock::LockService;
use server::error::ServerError;
use server::{AppState, routes};
use token_store::TokenStore;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!("configuration loaded");

    let db = DBService::new(&config.db.dsn()).await?;
    tracing::info!("connected to database and ran migrations");

    let token_store = Arc::new(TokenStore::new(&config.encryption_key)?);
    let crm = Arc::new(CrmClient::new(config.crm.clone(), token_store, config.service_user_id));
    let locks = Arc::new(LockService::new());

    let broker_connection = workers::spawn(&config, db.pool.clone(), (*crm).clone()).await?;
    tracing::info!("background workers started");

    let state = AppState { config: Arc::new(config), pool: db.pool, crm, locks };
    let app = routes::router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!("listening on {host}:{port}");

    axum::serve(listener, app).await?;

    drop(broker_connection);
    Ok(())
}
