//! Application entry point.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bank_console::api::create_router;
use bank_console::app::{AppState, ConfirmationConfig, Controller};
use bank_console::domain::{ConfigError, ContractAddresses};
use bank_console::infra::{HttpWalletBridge, LcdChainClient, LcdClientConfig, WalletBridgeConfig};

/// Application configuration
struct Config {
    host: String,
    port: u16,
    lcd_url: String,
    lcd_config: LcdClientConfig,
    contracts: ContractAddresses,
    wallet_bridge_url: String,
    wallet_bridge_config: WalletBridgeConfig,
    confirmation: ConfirmationConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let lcd_url = env::var("LCD_URL")
            .unwrap_or_else(|_| "https://pisco-lcd.terra.dev".to_string());
        let chain_id = env::var("CHAIN_ID").unwrap_or_else(|_| "pisco-1".to_string());

        let contracts = ContractAddresses {
            bank: required("BANK_CONTRACT_ADDRESS")?,
            token: required("TOKEN_CONTRACT_ADDRESS")?,
        };

        let wallet_bridge_url = env::var("WALLET_BRIDGE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:7070".to_string());
        let token = env::var("WALLET_BRIDGE_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let lcd_config = LcdClientConfig {
            timeout: Duration::from_secs(env_u64("LCD_TIMEOUT_SECS")?.unwrap_or(30)),
            ..Default::default()
        };

        let defaults = ConfirmationConfig::default();
        let confirmation = ConfirmationConfig {
            fast_interval: env_u64("CONFIRM_FAST_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.fast_interval),
            fast_window: env_u64("CONFIRM_FAST_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.fast_window),
            slow_interval: env_u64("CONFIRM_SLOW_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.slow_interval),
            deadline: env_u64("CONFIRM_DEADLINE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.deadline),
        };

        Ok(Self {
            host,
            port,
            lcd_url,
            lcd_config,
            contracts,
            wallet_bridge_url,
            wallet_bridge_config: WalletBridgeConfig {
                chain_id,
                token,
                ..Default::default()
            },
            confirmation,
        })
    }
}

fn required(name: &str) -> Result<String> {
    let value = env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))?;
    Ok(value)
}

/// Optional numeric variable; present but unparsable is an error
fn env_u64(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }
            .into()),
        },
        Err(_) => Ok(None),
    }
}

/// `LOG_FORMAT=json` switches to structured JSON lines
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM, after cancelling pending confirmations so
/// in-flight `/commands` requests can drain.
async fn shutdown_signal(controller: Arc<Controller>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }

    controller.shutdown();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("Bank Console v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!(lcd_url = %config.lcd_url, "Connecting to chain");
    let chain_client = LcdChainClient::new(&config.lcd_url, config.lcd_config.clone())
        .context("Failed to create LCD client")?;

    info!(bridge_url = %config.wallet_bridge_url, "Connecting to wallet bridge");
    let wallet = HttpWalletBridge::new(&config.wallet_bridge_url, config.wallet_bridge_config)
        .context("Failed to create wallet bridge client")?;

    info!(
        bank = %config.contracts.bank,
        token = %config.contracts.token,
        deadline_secs = config.confirmation.deadline.as_secs(),
        "Contracts configured"
    );

    let app_state = Arc::new(AppState::new(
        Arc::new(chain_client),
        Arc::new(wallet),
        config.contracts.clone(),
        config.confirmation.clone(),
    ));

    let session = app_state.controller.sync_wallet().await;
    info!(
        wallet = ?session.wallet,
        accounts = session.balances.accounts.len(),
        "Initial prefetch complete"
    );

    let controller = Arc::clone(&app_state.controller);
    let router = create_router(app_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server starting on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(controller))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
