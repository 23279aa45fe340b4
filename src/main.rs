use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;

use crate::bot::router::Router;
use crate::bot::telegram::{TelegramClient, TelegramError};
use crate::config::BotConfig;
use crate::lifecycle::{executor::Executor, ledger::Ledgers, monitor::Monitor};
use crate::runtime::{ContainerGateway, docker::DockerGateway};

mod bot;
mod cli;
mod config;
mod lifecycle;
mod notify;
mod runtime;
mod signals;
#[cfg(test)]
mod testing;

/// HTTP client crates are chatty at info level.
const DEFAULT_LOG_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::get_cli_args();
    let env_file = dotenv::from_path(&args.env_file);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();

    if let Err(e) = env_file {
        log::debug!("Environment file {:?} not loaded: {e}", args.env_file);
    }

    let config = match BotConfig::try_init() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let gateway: Arc<dyn ContainerGateway> = match DockerGateway::connect() {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            log::error!("Unable to connect to Docker: {e}");
            return ExitCode::FAILURE;
        }
    };

    let telegram = match TelegramClient::new(&config.token) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("Unable to build Telegram client: {e}");
            return ExitCode::FAILURE;
        }
    };

    match telegram.get_me().await {
        Ok(me) => log::info!(
            "Authenticated as @{}",
            me.username.as_deref().unwrap_or("unknown")
        ),
        Err(TelegramError::Api(e)) => {
            log::error!("Telegram rejected the bot token: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => log::warn!("Unable to reach Telegram, will keep retrying: {e}"),
    }

    let ledgers = Arc::new(Ledgers::new());
    let executor = Arc::new(Executor::new(Arc::clone(&gateway), Arc::clone(&ledgers)));
    let router = Arc::new(Router::new(
        executor,
        config.allowed_users.iter().copied(),
        config.monitoring.enabled,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = signals::handle_shutdown(shutdown_tx) {
        log::error!("Unable to install signal handlers: {e}");
        return ExitCode::FAILURE;
    }

    let monitor = if config.monitoring.enabled {
        let monitor = Monitor::new(
            gateway,
            telegram.clone(),
            ledgers,
            config.allowed_users.clone(),
            config.monitoring.interval(),
        );
        Some(tokio::spawn(monitor.run(shutdown_rx.clone())))
    } else {
        log::info!("Container monitoring is disabled");
        None
    };

    log::info!("Bot is starting...");
    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

    bot::telegram::run_updates(telegram, router, shutdown_rx).await;

    if let Some(monitor) = monitor {
        if let Err(e) = monitor.await {
            log::error!("Monitoring task failed: {e}");
        }
    }

    log::info!("Bot stopped");
    ExitCode::SUCCESS
}
