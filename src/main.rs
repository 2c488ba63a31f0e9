use std::sync::Arc;

use clap::Parser;
use tracing::info;

use lms_autoflow::app_state::AppState;
use lms_autoflow::config::load_config;
use lms_autoflow::web::build_router;

#[derive(Parser, Debug)]
#[command(name = "lms_autoflow", about = "Scripted automation flows against an external LMS")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lms_autoflow=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let listen = cli.listen.unwrap_or_else(|| config.listen.clone());

    let state = Arc::new(AppState::from_config(&config)?);
    let app = build_router(state);

    info!(%listen, "starting lms_autoflow");
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
