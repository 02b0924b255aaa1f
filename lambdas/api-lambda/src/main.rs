use lambda_http::{run, service_fn, Error, Request};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use user_console_shared::{config::ConsoleConfig, AppState};

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = ConsoleConfig::from_env()?;
    tracing::info!(
        "Starting user console API (table: {}, backend: {:?})",
        config.table_name,
        config.backend
    );

    // One table client per warm container; stores are opened per session
    let state = AppState::new(config.build_table().await);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
