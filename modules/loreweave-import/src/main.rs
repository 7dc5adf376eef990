use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use loreweave_common::config::ServiceConfig;
use loreweave_import::api::{self, AppState};
use loreweave_import::pipeline::Importer;
use loreweave_store::files::FileStore;
use loreweave_store::Store;
use mediawiki_client::WikiClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("loreweave=info".parse()?))
        .init();

    let config = ServiceConfig::from_env()?;
    config.log_redacted();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = Store::new(pool);
    store.migrate().await?;
    info!("Migrations complete");

    let files = FileStore::new(&config.storage_root);
    let wiki = WikiClient::new();

    let importer = Importer::new(
        Arc::new(wiki),
        Arc::new(store),
        Arc::new(files),
        config.fallback_langs.clone(),
        config.limits.clone(),
    );

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let app = api::router(Arc::new(AppState { importer, config }));

    info!("Loreweave import service listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
