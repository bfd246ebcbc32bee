// Configuration structure for:
// - Ethereum node JSON-RPC endpoint and block explorer API
// - Database connection string
// - Server listening address/port
// - Sync loop periods, confirmation depth and seeding batch size
// - Rate normalization service and tally cache settings

use dotenv::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub eth_rpc_url: String,
    pub etherscan_url: String,
    pub etherscan_key: String,
    pub rates_url: String,
    pub rates_token: String,
    pub expected_confirmations: u64,
    pub update_latest_period: Duration,
    pub seed_older_period: Duration,
    pub seed_older_batch: u64,
    pub seed_older_enabled: bool,
    pub rpc_timeout_secs: u64,
    pub rpc_rate_limit: Option<u32>,
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:ledger.db".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let eth_rpc_url = env::var("ETH_RPC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());
        let etherscan_url = env::var("ETHERSCAN_URL")
            .unwrap_or_else(|_| "https://api.etherscan.io/api".to_string());
        let etherscan_key = env::var("ETHERSCAN_KEY").unwrap_or_default();
        let rates_url = env::var("RATES_URL")
            .unwrap_or_else(|_| "https://rates.overhide.io".to_string());
        let rates_token = env::var("RATES_TOKEN").unwrap_or_default();
        let expected_confirmations = env::var("EXPECTED_CONFIRMATIONS")
            .map(|v| v.parse().unwrap_or(7))
            .unwrap_or(7);
        let update_latest_period = env::var("UPDATE_LATEST_PERIOD_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        let seed_older_period = env::var("SEED_OLDER_PERIOD_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        let seed_older_batch = env::var("SEED_OLDER_BATCH")
            .map(|v| v.parse().unwrap_or(5))
            .unwrap_or(5);
        let seed_older_enabled = env::var("SEED_OLDER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let rpc_timeout_secs = env::var("RPC_TIMEOUT_SECS")
            .map(|v| v.parse().unwrap_or(30))
            .unwrap_or(30);
        let rpc_rate_limit = env::var("RPC_RATE_LIMIT")
            .map(|v| v.parse().ok())
            .unwrap_or(None);
        let cache_ttl = env::var("CACHE_TTL")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));
        let cache_max_capacity = env::var("CACHE_MAX_CAPACITY")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .unwrap_or(10000);

        Self {
            database_url,
            server_host,
            server_port,
            eth_rpc_url,
            etherscan_url,
            etherscan_key,
            rates_url,
            rates_token,
            expected_confirmations,
            update_latest_period,
            seed_older_period,
            seed_older_batch,
            seed_older_enabled,
            rpc_timeout_secs,
            rpc_rate_limit,
            cache_ttl,
            cache_max_capacity,
        }
    }
}
