use anyhow::Result;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resumedav::config::Config;
use resumedav::routes;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resumedav=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let app = routes::router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    info!("WebDAV relay listening on {}", config.server_address);
    axum::serve(listener, app).await?;

    Ok(())
}
