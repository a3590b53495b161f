use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub reconciliation: ReconciliationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            reconciliation: ReconciliationConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs shared by the roll importer, the matcher, and the duplicate detector.
///
/// Injected at construction; nothing in the engine reads the environment directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationConfig {
    /// Country calling code stripped from phone numbers, e.g. `1` for NANP numbers.
    pub country_prefix: String,
    /// Digits in a national number; a prefixed number must carry at least this many after the prefix.
    pub national_number_length: usize,
    /// Minimum trigram similarity for both first and last name in fuzzy matching.
    pub fuzzy_threshold: f32,
    pub fuzzy_limit: usize,
    pub preview_rows: usize,
    pub revet_chunk_size: usize,
    pub duplicate_chunk_size: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            country_prefix: "1".to_string(),
            national_number_length: 10,
            fuzzy_threshold: 0.4,
            fuzzy_limit: 5,
            preview_rows: 20,
            revet_chunk_size: 500,
            duplicate_chunk_size: 1000,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let country_prefix = env::var("ROLL_COUNTRY_PREFIX")
            .map(|value| value.trim().to_string())
            .unwrap_or(defaults.country_prefix);
        if !country_prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidValue {
                var: "ROLL_COUNTRY_PREFIX",
                value: country_prefix,
            });
        }

        let fuzzy_threshold = parse_var("ROLL_FUZZY_THRESHOLD", defaults.fuzzy_threshold)?;
        if !(0.0..=1.0).contains(&fuzzy_threshold) {
            return Err(ConfigError::InvalidValue {
                var: "ROLL_FUZZY_THRESHOLD",
                value: fuzzy_threshold.to_string(),
            });
        }

        Ok(Self {
            country_prefix,
            national_number_length: parse_var(
                "ROLL_NATIONAL_NUMBER_LENGTH",
                defaults.national_number_length,
            )?,
            fuzzy_threshold,
            fuzzy_limit: parse_var("ROLL_FUZZY_LIMIT", defaults.fuzzy_limit)?,
            preview_rows: parse_var("ROLL_PREVIEW_ROWS", defaults.preview_rows)?,
            revet_chunk_size: positive_var("ROLL_REVET_CHUNK_SIZE", defaults.revet_chunk_size)?,
            duplicate_chunk_size: positive_var(
                "ROLL_DUPLICATE_CHUNK_SIZE",
                defaults.duplicate_chunk_size,
            )?,
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

fn positive_var(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    let value = parse_var(var, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { var, value } => {
                write!(f, "{var} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ROLL_COUNTRY_PREFIX",
            "ROLL_NATIONAL_NUMBER_LENGTH",
            "ROLL_FUZZY_THRESHOLD",
            "ROLL_FUZZY_LIMIT",
            "ROLL_PREVIEW_ROWS",
            "ROLL_REVET_CHUNK_SIZE",
            "ROLL_DUPLICATE_CHUNK_SIZE",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.reconciliation, ReconciliationConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reconciliation_overrides_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ROLL_COUNTRY_PREFIX", "44");
        env::set_var("ROLL_FUZZY_THRESHOLD", "0.55");
        env::set_var("ROLL_REVET_CHUNK_SIZE", "50");
        let config = ReconciliationConfig::from_env().expect("config loads");
        assert_eq!(config.country_prefix, "44");
        assert!((config.fuzzy_threshold - 0.55).abs() < f32::EPSILON);
        assert_eq!(config.revet_chunk_size, 50);
        assert_eq!(config.duplicate_chunk_size, 1000);
        reset_env();
    }

    #[test]
    fn rejects_zero_chunk_sizes_and_out_of_range_thresholds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ROLL_DUPLICATE_CHUNK_SIZE", "0");
        match ReconciliationConfig::from_env() {
            Err(ConfigError::InvalidValue { var, .. }) => {
                assert_eq!(var, "ROLL_DUPLICATE_CHUNK_SIZE")
            }
            other => panic!("expected invalid chunk size, got {other:?}"),
        }

        reset_env();
        env::set_var("ROLL_FUZZY_THRESHOLD", "1.5");
        assert!(matches!(
            ReconciliationConfig::from_env(),
            Err(ConfigError::InvalidValue {
                var: "ROLL_FUZZY_THRESHOLD",
                ..
            })
        ));
        reset_env();
    }
}
