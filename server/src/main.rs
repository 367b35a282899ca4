use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use taskboard_server::config::{generate_config_template, Cli, Config};
use taskboard_server::{routes, state};

const DEFAULT_LOG_FILTER: &str = "taskboard_server=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    // Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("Taskboard server v{} starting", env!("CARGO_PKG_VERSION"));

    if config.uses_dev_secret() {
        tracing::warn!("Using the built-in development JWT secret; set TASKBOARD_JWT_SECRET");
    }

    // Single registry and user directory for the process lifetime, shared through AppState
    let app_state = state::AppState::new(config.jwt_secret.as_bytes().to_vec())
        .with_token_ttl(config.access_token_expire_minutes);

    let app = routes::build_router(app_state).layer(routes::cors_layer(&config.cors_origins));

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
