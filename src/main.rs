use std::sync::Arc;

use anyhow::Context;
use line_summon_bot::channels::LineReplyClient;
use line_summon_bot::config::BotConfig;
use line_summon_bot::llm::{LlmConfig, create_provider};
use line_summon_bot::pipeline::EventDispatcher;
use line_summon_bot::server::webhook_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("failed to load configuration")?;

    eprintln!("🤖 LINE summon bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Summon keyword: {}", config.summon_keyword);
    eprintln!("   Webhook: http://0.0.0.0:{}/callback\n", config.port);

    // ── Collaborators ───────────────────────────────────────────────────
    let provider = create_provider(&LlmConfig {
        api_key: config.gemini_api_key.clone(),
        model: config.model.clone(),
        base_url: config.gemini_api_base.clone(),
    });

    let mut line = LineReplyClient::new(config.channel_access_token.clone());
    if let Some(base) = &config.line_api_base {
        line = line.with_base_url(base.clone());
    }

    // ── Pipeline + HTTP ─────────────────────────────────────────────────
    let dispatcher = Arc::new(EventDispatcher::from_config(
        &config,
        provider,
        Arc::new(line),
    ));
    let app = webhook_routes(dispatcher);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
