use anyhow::Context;
use clap::{value_parser, Arg};
use pipeshape::{config::services, AppState};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = clap::Command::new("Pipeshape")
        .about("Serves configured JSON transform and URL redirect pipelines")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG")
                .help("Path to a YAML file containing services")
                .default_value(services::DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .value_parser(value_parser!(u16))
                .default_value("3000"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let port = matches.get_one::<u16>("port").copied().unwrap_or(DEFAULT_PORT);

    let services = services::load_services(config_path)?;
    info!(count = services.len(), "loaded services");

    let app = pipeshape::create_router(Arc::new(AppState { services }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
