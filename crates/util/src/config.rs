use std::{env, fmt, net::SocketAddr, time::Duration};

use chrono_tz::Tz;
use domain_wrap_core::FailedMintIdPolicy;

use super::server_bind_address;

pub const DEFAULT_TOKEN_ID_START: u64 = 1001;
pub const DEFAULT_MINT_DELAY_MS: u64 = 2500;
pub const DEFAULT_MINT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SUCCESS_DISPLAY_MS: u64 = 3000;
pub const DEFAULT_WALLET_ADDRESS: &str = "0x742d35Cc6634C0532925a3b8D4C7fA2C6f1e8b2A";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Settings that shape the simulated mint workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct MintConfig {
    pub token_id_start: u64,
    pub mint_delay: Duration,
    pub mint_timeout: Duration,
    pub success_display: Duration,
    pub failed_mint_ids: FailedMintIdPolicy,
    /// Probability in `0.0..=1.0` that the simulated chain rejects a mint.
    pub chain_failure_rate: f64,
    pub wallet_address: String,
    pub display_timezone: Tz,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            token_id_start: DEFAULT_TOKEN_ID_START,
            mint_delay: Duration::from_millis(DEFAULT_MINT_DELAY_MS),
            mint_timeout: Duration::from_millis(DEFAULT_MINT_TIMEOUT_MS),
            success_display: Duration::from_millis(DEFAULT_SUCCESS_DISPLAY_MS),
            failed_mint_ids: FailedMintIdPolicy::default(),
            chain_failure_rate: 0.0,
            wallet_address: DEFAULT_WALLET_ADDRESS.to_string(),
            display_timezone: Tz::UTC,
        }
    }
}

impl MintConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let failed_mint_ids = match env::var("APP_FAILED_MINT_IDS") {
            Ok(value) => value.parse().map_err(ConfigError::InvalidIdPolicy)?,
            Err(_) => defaults.failed_mint_ids,
        };

        let chain_failure_rate = match env::var("APP_CHAIN_FAILURE_RATE") {
            Ok(value) => value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|rate| (0.0..=1.0).contains(rate))
                .ok_or(ConfigError::InvalidFailureRate(value))?,
            Err(_) => defaults.chain_failure_rate,
        };

        let display_timezone = match env::var("APP_DISPLAY_TZ") {
            Ok(value) => value
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(value))?,
            Err(_) => defaults.display_timezone,
        };

        Ok(Self {
            token_id_start: read_u64("APP_TOKEN_ID_START", defaults.token_id_start)?,
            mint_delay: read_millis("APP_MINT_DELAY_MS", defaults.mint_delay)?,
            mint_timeout: read_millis("APP_MINT_TIMEOUT_MS", defaults.mint_timeout)?,
            success_display: read_millis("APP_SUCCESS_DISPLAY_MS", defaults.success_display)?,
            failed_mint_ids,
            chain_failure_rate,
            wallet_address: env::var("APP_WALLET_ADDRESS").unwrap_or(defaults.wallet_address),
            display_timezone,
        })
    }
}

fn read_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

fn read_millis(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = read_u64(name, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub mint: MintConfig,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let mint = MintConfig::from_env()?;

        Ok(Self {
            bind_addr,
            environment,
            mint,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidNumber { name: &'static str, value: String },
    InvalidIdPolicy(String),
    InvalidFailureRate(String),
    InvalidTimezone(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer (got {value})")
            }
            Self::InvalidIdPolicy(value) => write!(
                f,
                "APP_FAILED_MINT_IDS must be 'release' or 'retain' (got {value})"
            ),
            Self::InvalidFailureRate(value) => write!(
                f,
                "APP_CHAIN_FAILURE_RATE must be a number between 0 and 1 (got {value})"
            ),
            Self::InvalidTimezone(value) => {
                write!(f, "APP_DISPLAY_TZ must be an IANA timezone name (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
