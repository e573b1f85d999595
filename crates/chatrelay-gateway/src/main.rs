use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use chatrelay_agent::{OpenAiGateway, Pipeline, WorkerPool};
use chatrelay_channels::{ChannelManager, HttpImageFetcher, ReplyDispatcher};
use chatrelay_core::RelayConfig;
use chatrelay_im::ImChannel;

mod app;
mod auth;
mod http;

#[derive(Parser)]
#[command(name = "chatrelay-gateway", about = "Chat relay between IM conversations and OpenAI")]
struct Cli {
    /// Config file (default ~/.chatrelay/chatrelay.toml).
    #[arg(long, env = "CHATRELAY_CONFIG")]
    config: Option<String>,
    /// OpenAI API key (overrides config value).
    #[arg(long)]
    api_key: Option<String>,
    /// Only answer chat-client messages from this conversation id.
    #[arg(long)]
    group_id_only: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chatrelay_gateway=info,chatrelay_agent=info,tower_http=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > CHATRELAY_CONFIG env > ~/.chatrelay/chatrelay.toml
    let mut config = RelayConfig::load(cli.config.as_deref())?;
    if let Some(key) = cli.api_key {
        config.openai.api_key = key;
    }
    if let Some(group) = cli.group_id_only {
        config.client.group_id_only = Some(group);
    }
    config.validate()?;

    info!(
        model = %config.openai.chat_model,
        history = ?config.history.strategy,
        group_id_only = ?config.client.group_id_only,
        im = config.im.enabled,
        "configuration loaded"
    );

    let history = chatrelay_memory::build_store(&config.history);
    let gateway = Arc::new(OpenAiGateway::new(&config.openai)?);
    let fetcher = Arc::new(HttpImageFetcher::new(Duration::from_secs(
        config.dispatch.fetch_timeout_secs,
    ))?);
    let pipeline = Arc::new(Pipeline::new(
        history,
        gateway,
        ReplyDispatcher::new(fetcher),
    ));

    let mut channels = ChannelManager::new();
    if config.im.enabled {
        let im = ImChannel::new(&config.im)?;
        channels.register(Arc::new(im));
        info!(admin = %config.im.admin_account, "IM channel enabled");
    }
    let channels = Arc::new(channels);

    let (workers, worker_handle) =
        WorkerPool::spawn(Arc::clone(&pipeline), Arc::clone(&channels), &config.workers);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, pipeline, channels, workers));
    let router = app::build_router(state);

    info!("chatrelay gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    // The router (and with it the last WorkerPool sender) is gone; let the
    // queued events finish.
    worker_handle.await?;
    Ok(())
}
