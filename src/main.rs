use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use deathcards::config::Config;
use deathcards::database::{catalog, init};
use deathcards::model::AppState;
use deathcards::routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    let pool = init::connect(&config.database_url).await?;
    let catalog = catalog::seed(&pool).await?;
    tracing::info!(database = %config.database_url, "schema ready, catalog seeded");

    let port = config.port;
    let app_state = AppState::new(pool, catalog, config);
    let app = routes::router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
