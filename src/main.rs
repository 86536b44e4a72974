mod api;
mod config;
mod handler;
mod line;
mod scheduler;
mod store;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "medremind",
    version,
    about = "LINE bot that keeps reminding you to take your medicine"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.medremind/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the webhook and run the reminder scheduler
    Run {
        /// Listen port (overrides config)
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Write a default config to ~/.medremind/config.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run { port: None }) {
        Commands::Init => {
            let path = config::init_config_dir().await?;
            tracing::info!("Initialized {}", path.display());
        }
        Commands::Run { port } => run(&cli.config, port).await?,
    }
    Ok(())
}

async fn run(config_path: &str, port: Option<u16>) -> Result<()> {
    let cfg = config::load(config_path, port)?;
    cfg.validate()?;
    let messages = cfg.messages()?;

    let store = Arc::new(store::ReminderStore::new());
    let messenger: Arc<dyn line::Messenger> = Arc::new(line::LineClient::new(&cfg.line)?);

    let cancel = CancellationToken::new();
    let scheduler = scheduler::Scheduler::new(
        store.clone(),
        messenger.clone(),
        &cfg.reminder,
        messages.reminder.clone(),
    )?;
    let scheduler_task = scheduler.spawn(cancel.clone());

    let handler = handler::WebhookHandler::new(
        store.clone(),
        messenger,
        &cfg.reminder.keywords,
        messages,
    );
    let state = api::AppState {
        handler: Arc::new(handler),
        store,
        channel_secret: cfg.line.channel_secret.as_str().into(),
        name: env!("CARGO_PKG_NAME").to_string(),
    };

    let bind = cfg.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("Webhook listening on {bind} (POST /callback)");

    let shutdown = cancel.clone();
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    scheduler_task.await?;
    Ok(())
}
