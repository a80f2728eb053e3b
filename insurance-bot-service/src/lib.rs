pub mod config;
pub mod providers;
pub mod service;
pub mod telegram;

#[cfg(test)]
mod test_support;

use anyhow::Context as _;
use insurance_flow::{
    Collaborators, Dispatcher, DocumentExtractor, InMemorySessionStore, PostgresSessionStore,
    SessionRegistry, SessionStore, StateMachine, TextAssistant,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub use config::{BotConfig, ExtractorKind, TransportMode};
pub use service::{AppState, build_router};

use crate::{
    providers::{MockExtractor, RigAssistant, TemplatePolicyGenerator, VisionExtractor},
    telegram::{TelegramClient, UpdateQueue, run_polling},
};

/// Assemble every component from `config` and serve until ctrl-c.
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let session_store = create_session_store(&config).await;
    let registry = Arc::new(SessionRegistry::new(session_store));
    let reaper = registry.spawn_reaper(config.reaper_interval, config.session_idle_ttl);

    let telegram = TelegramClient::new(&config.telegram_api_url, &config.telegram_token)?;
    let me = telegram
        .get_me()
        .await
        .context("failed to reach the Telegram Bot API")?;
    info!(
        bot_id = me.id,
        bot = me.username.as_deref().unwrap_or("unknown"),
        "Bot started"
    );

    let collaborators = create_collaborators(&config, telegram.clone())?;
    let dispatcher = Dispatcher::new(
        registry,
        StateMachine::new(config.machine.clone()),
        collaborators,
    );

    let updates = UpdateQueue::new(dispatcher);
    let app_state = AppState {
        updates: updates.clone(),
        webhook_secret: config.webhook_secret.clone(),
    };
    let app = build_router(app_state, config.transport == TransportMode::Webhook);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    if config.transport == TransportMode::Polling {
        run_polling(telegram, updates, shutdown_signal()).await;
    } else {
        info!("Waiting for Telegram webhook calls on /telegram/webhook");
    }

    server.await??;
    reaper.abort();
    info!("Shut down cleanly");
    Ok(())
}

async fn create_session_store(config: &BotConfig) -> Arc<dyn SessionStore> {
    if let Some(database_url) = &config.database_url {
        info!("Using PostgreSQL session storage");
        match PostgresSessionStore::connect(database_url).await {
            Ok(postgres_store) => return Arc::new(postgres_store),
            Err(e) => {
                error!(
                    "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                    e
                );
            }
        }
    } else {
        info!("Using in-memory session storage (set DATABASE_URL to use PostgreSQL)");
    }
    Arc::new(InMemorySessionStore::with_capacity_limit(config.session_max))
}

fn create_collaborators(
    config: &BotConfig,
    telegram: TelegramClient,
) -> anyhow::Result<Collaborators> {
    let extractor: Arc<dyn DocumentExtractor> = match config.extractor {
        ExtractorKind::Mock => {
            info!("Using mock document extractor");
            Arc::new(MockExtractor::default())
        }
        ExtractorKind::Vision => {
            let api_key = config
                .openrouter_api_key
                .as_deref()
                .context("OPENROUTER_API_KEY not set")?;
            info!(model = %config.extraction_model, "Using LLM vision document extractor");
            Arc::new(VisionExtractor::new(api_key, &config.extraction_model)?)
        }
    };

    let assistant: Option<Arc<dyn TextAssistant>> = match &config.openrouter_api_key {
        Some(api_key) if config.machine.assistant_replies => {
            info!(model = %config.assistant_model, "Assistant replies enabled");
            Some(Arc::new(RigAssistant::new(api_key, &config.assistant_model)))
        }
        _ => None,
    };

    Ok(Collaborators {
        extractor,
        policy: Arc::new(TemplatePolicyGenerator::new(config.machine.price_usd)),
        messenger: Arc::new(telegram),
        assistant,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
