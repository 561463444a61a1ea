mod api;
mod config;
mod engine;
mod model;
mod ui;

use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::server::AppState;
use crate::config::{GatewayConfig, ServerConfig};
use crate::engine::llm_client::OpenAiGateway;

#[derive(Parser)]
#[command(name = "care-report")]
#[command(about = "Incident report hearing assistant for care facilities")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the desktop hearing window (default)
    Ui,
    /// Serve the evaluate-report endpoint over HTTP
    Serve {
        /// Listen address, overrides CARE_REPORT_ADDR
        #[arg(long)]
        addr: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("care_report_hearing=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Ui) {
        Commands::Ui => run_ui(),
        Commands::Serve { addr } => run_server(addr),
    }
}

fn run_ui() -> anyhow::Result<()> {
    let gateway = GatewayConfig::from_env()?;
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "介護記録ヒアリング",
        options,
        Box::new(move |cc| Ok(Box::new(ui::app::MyApp::new(cc, gateway)))),
    )
    .map_err(|e| anyhow!("{e}"))
}

fn run_server(addr: Option<String>) -> anyhow::Result<()> {
    let config = ServerConfig::from_env(addr)?;

    let state = match OpenAiGateway::new(&config.gateway) {
        Ok(gateway) => AppState::ready(Arc::new(gateway)),
        Err(err) => {
            tracing::error!(error = %err, "generation gateway unavailable; every request will fail");
            AppState::unavailable(err.to_string())
        }
    };

    // The blocking HTTP client must not be dropped inside the async runtime.
    let keep_alive = state.clone();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(api::server::serve(config.addr, state));

    drop(runtime);
    drop(keep_alive);
    result
}
