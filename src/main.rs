mod capability;
mod config;
mod db;
mod error;
mod exchange;
mod routes;
mod state;

use tokio::net::TcpListener;

use config::{generate_config_template, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "notacloud_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "notacloud_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("notacloud server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database. Fail fast before serving anything.
    let db = db::init_db(&config.data_dir)?;

    let exchange_config = config.exchange.clone().unwrap_or_default();

    // Spawn the periodic retention sweep (0 disables it; lazy eviction on
    // the read path keeps expired data unservable either way)
    if exchange_config.sweep_interval_secs > 0 {
        exchange::retention::spawn_retention_sweep(
            db.clone(),
            exchange_config.sweep_interval_secs,
        );
        tracing::info!(
            "Retention sweep every {}s, retention period {} days",
            exchange_config.sweep_interval_secs,
            exchange_config.retention_days
        );
    } else {
        tracing::info!(
            "Retention sweep disabled, relying on lazy eviction (retention period {} days)",
            exchange_config.retention_days
        );
    }

    // Build application state
    let app_state = state::AppState {
        db,
        retention_days: exchange_config.retention_days,
        max_upload_size_mb: exchange_config.max_upload_size_mb,
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
