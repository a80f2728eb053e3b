use insurance_bot_service::{BotConfig, run};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "insurance_bot_service=debug,insurance_flow=debug,tower_http=debug";

/// JSON logs unless `LOG_FORMAT=pretty`; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "pretty");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let pretty_layer = pretty.then(|| fmt::layer().pretty());
    let json_layer = (!pretty).then(|| fmt::layer().json().with_target(true).with_level(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty_layer)
        .with(json_layer)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %format!("{:#}", e), "bot stopped with an error");
        std::process::exit(1);
    }
}
