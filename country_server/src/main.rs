//! Country refresh server: loads settings, opens the pool, provisions tables and serves the routes.
//!
//! Run from repo root: `cargo run -p country-server`

use axum::Router;
use country_refresh::{
    common_routes, country_routes, ensure_country_tables, ensure_database_exists, load_from_env, AppState,
    CountryService, PgCountryStore, RefreshOrchestrator, SummaryArtifactGenerator,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("country_refresh=info,country_server=info,tower_http=info")
            }),
        )
        .init();

    let settings = load_from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(&settings.database_url)
        .await?;
    ensure_country_tables(&pool, &settings.schema).await?;

    let store = Arc::new(PgCountryStore::new(pool.clone(), settings.schema.clone()));
    let artifact = Arc::new(SummaryArtifactGenerator::new(
        store.clone(),
        settings.summary_image_path.clone(),
    ));
    let refresher = RefreshOrchestrator::from_settings(&settings, store.clone(), artifact.clone())?;
    let state = AppState {
        countries: Arc::new(CountryService::new(store, artifact)),
        refresher: Arc::new(refresher),
    };

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .merge(country_routes(state))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    pool.close().await;
    Ok(())
}
