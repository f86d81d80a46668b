use std::env;

use log::*;
use vpg_common::{parse_boolean_flag, Secret};

const DEFAULT_VPG_HOST: &str = "127.0.0.1";
const DEFAULT_VPG_PORT: u16 = 8650;
const DEFAULT_NODE_URL: &str = "http://127.0.0.1:48132";
/// How long a merchant's customer gets to pay, in seconds.
const DEFAULT_PAY_TIMEOUT_SECS: i64 = 600;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// JSON-RPC endpoint of the Vite full node the gateway polls and broadcasts through.
    pub node_url: String,
    /// The gateway's receiving address. Single-wallet by design.
    pub wallet_address: String,
    pub wallet_secret_key: Secret<String>,
    /// Starting value of the payment-offer countdown, in milliseconds.
    pub pay_timeout_millis: i64,
    /// Where settlement webhooks go when the merchant may not (or did not) name a callback.
    pub default_callback_url: String,
    /// When false, the callbackAddress request parameter is ignored and every webhook goes to the default URL.
    pub allow_external_callbacks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VPG_HOST.to_string(),
            port: DEFAULT_VPG_PORT,
            database_url: String::default(),
            node_url: DEFAULT_NODE_URL.to_string(),
            wallet_address: String::default(),
            wallet_secret_key: Secret::default(),
            pay_timeout_millis: DEFAULT_PAY_TIMEOUT_SECS * 1000,
            default_callback_url: String::default(),
            allow_external_callbacks: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VPG_HOST").ok().unwrap_or_else(|| DEFAULT_VPG_HOST.into());
        let port = env::var("VPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for VPG_PORT. {e} Using the default, {DEFAULT_VPG_PORT}, instead."
                    );
                    DEFAULT_VPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VPG_PORT);
        let database_url = env::var("VPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let node_url = env::var("VPG_NODE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ VPG_NODE_URL is not set. Using the default, {DEFAULT_NODE_URL}.");
            DEFAULT_NODE_URL.into()
        });
        let wallet_address = env::var("VPG_WALLET_ADDRESS").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_WALLET_ADDRESS is not set. The gateway cannot receive payments without it.");
            String::default()
        });
        let wallet_secret_key = Secret::new(env::var("VPG_WALLET_SECRET_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_WALLET_SECRET_KEY is not set. The gateway cannot acknowledge payments without it.");
            String::default()
        }));
        let pay_timeout_millis = env::var("VPG_PAY_TIMEOUT")
            .map_err(|_| {
                info!("🪛️ VPG_PAY_TIMEOUT is not set. Using the default of {DEFAULT_PAY_TIMEOUT_SECS} seconds.")
            })
            .and_then(|s| {
                s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for VPG_PAY_TIMEOUT. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_PAY_TIMEOUT_SECS)
            * 1000;
        let default_callback_url = env::var("VPG_DEFAULT_CALLBACK_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ VPG_DEFAULT_CALLBACK_URL is not set. Settlement webhooks without a callback will be dropped.");
            String::default()
        });
        let allow_external_callbacks = parse_boolean_flag(env::var("VPG_ALLOW_EXTERNAL_CALLBACKS").ok(), false);
        Self {
            host,
            port,
            database_url,
            node_url,
            wallet_address,
            wallet_secret_key,
            pay_timeout_millis,
            default_callback_url,
            allow_external_callbacks,
        }
    }
}

//-------------------------------------------------  GatewayOptions  --------------------------------------------------
/// The slice of configuration the request handlers need. Deliberately small, and excludes the wallet key so that
/// secrets never travel through actix app data.
#[derive(Clone, Debug)]
pub struct GatewayOptions {
    pub wallet_address: String,
    pub default_callback_url: String,
    pub allow_external_callbacks: bool,
}

impl GatewayOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            wallet_address: config.wallet_address.clone(),
            default_callback_url: config.default_callback_url.clone(),
            allow_external_callbacks: config.allow_external_callbacks,
        }
    }

    /// Applies the callback policy to whatever the merchant sent.
    pub fn callback_address(&self, requested: Option<&str>) -> String {
        if self.allow_external_callbacks {
            requested.unwrap_or(&self.default_callback_url).to_string()
        } else {
            self.default_callback_url.clone()
        }
    }
}
