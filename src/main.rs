use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use weather_bot::channels::{Channel, CliChannel, TelegramChannel};
use weather_bot::config::{BotConfig, TransportConfig};
use weather_bot::dialog::DialogController;
use weather_bot::navigation::NavigationStateMachine;
use weather_bot::weather::WeatherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export WEATHER_API_KEY=... TELEGRAM_BOT_TOKEN=...");
        std::process::exit(1);
    });

    let _log_guard = init_tracing(&config);

    let channel: Arc<dyn Channel> = match &config.transport {
        TransportConfig::Telegram(telegram) => Arc::new(TelegramChannel::new(telegram)?),
        TransportConfig::Cli => Arc::new(CliChannel::new()),
    };

    eprintln!("🌦  Weather Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {}", channel.name());
    eprintln!("   Weather API: {}", config.weather.base_url);
    if let Some(dir) = &config.log_dir {
        eprintln!("   Logs: {}", dir.display());
    }
    if matches!(config.transport, TransportConfig::Cli) {
        eprintln!("   Type a city or /start. Use 'tap <token>' to press a button.\n");
    }

    let weather = WeatherClient::new(&config.weather).context("creating weather client")?;
    let machine = NavigationStateMachine::new(Arc::new(weather));
    let controller = Arc::new(DialogController::new(machine, channel, config.dialog.clone()));

    controller.run().await?;
    Ok(())
}

/// Console logging, or a daily-rolling file when a log directory is set.
fn init_tracing(config: &BotConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "weather-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}
