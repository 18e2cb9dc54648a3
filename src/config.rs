use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    pub event_buffer_size: usize,
    /// State used to filter candidate markets and districts.
    pub operating_region: String,
    pub transport_rate_per_km: f64,
    pub default_quantity_kg: u32,
    pub driver_search_radius_km: f64,
    pub distance_tie_break_km: f64,
    pub default_route_km: f64,
    pub top_markets: usize,
    pub top_drivers: usize,
    pub ml_service_url: Option<String>,
    pub ml_predict_timeout: Duration,
    pub ml_health_timeout: Duration,
    pub retry: RetryPolicy,
    pub geocoder_url: Option<String>,
    pub geocoder_timeout: Duration,
    pub fallback_tables: FallbackTables,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let fallback_tables = match env::var("FALLBACK_TABLES_PATH") {
            Ok(path) => FallbackTables::load(&path)?,
            Err(_) => FallbackTables::default(),
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            allowed_origins,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            operating_region: env::var("OPERATING_REGION")
                .unwrap_or_else(|_| "Andhra Pradesh".to_string()),
            transport_rate_per_km: parse_or_default("TRANSPORT_RATE_PER_KM", 10.0)?,
            default_quantity_kg: parse_or_default("DEFAULT_QUANTITY_KG", 1000)?,
            driver_search_radius_km: parse_or_default("DRIVER_SEARCH_RADIUS_KM", 50.0)?,
            distance_tie_break_km: parse_or_default("DISTANCE_TIE_BREAK_KM", 5.0)?,
            default_route_km: parse_or_default("DEFAULT_ROUTE_KM", 30.0)?,
            top_markets: parse_or_default("TOP_MARKETS", 3)?,
            top_drivers: parse_or_default("TOP_DRIVERS", 10)?,
            ml_service_url: env::var("ML_SERVICE_URL").ok(),
            ml_predict_timeout: Duration::from_secs(parse_or_default(
                "ML_PREDICT_TIMEOUT_SECS",
                30,
            )?),
            ml_health_timeout: Duration::from_secs(parse_or_default("ML_HEALTH_TIMEOUT_SECS", 5)?),
            retry: RetryPolicy {
                max_attempts: parse_or_default("ML_RETRY_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(parse_or_default("ML_RETRY_BASE_MS", 1000)?),
                max_delay: Duration::from_millis(parse_or_default("ML_RETRY_MAX_MS", 5000)?),
            },
            geocoder_url: env::var("GEOCODER_URL").ok(),
            geocoder_timeout: Duration::from_secs(parse_or_default("GEOCODER_TIMEOUT_SECS", 5)?),
            fallback_tables,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            allowed_origins: vec!["*".to_string()],
            event_buffer_size: 1024,
            operating_region: "Andhra Pradesh".to_string(),
            transport_rate_per_km: 10.0,
            default_quantity_kg: 1000,
            driver_search_radius_km: 50.0,
            distance_tie_break_km: 5.0,
            default_route_km: 30.0,
            top_markets: 3,
            top_drivers: 10,
            ml_service_url: None,
            ml_predict_timeout: Duration::from_secs(30),
            ml_health_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            geocoder_url: None,
            geocoder_timeout: Duration::from_secs(5),
            fallback_tables: FallbackTables::default(),
        }
    }
}

/// Retry schedule for the external prediction service, kept as data so the
/// backoff parameters are testable without sleeping.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based attempt fails. Doubles per
    /// attempt, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Lookup tables for the estimator of last resort. Loaded from a JSON file
/// when `FALLBACK_TABLES_PATH` is set, otherwise the built-in defaults apply.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackTables {
    /// Ordered (commodity substring, base price) pairs; first match wins.
    pub base_prices: Vec<(String, f64)>,
    pub default_base_price: f64,
    /// January..December.
    pub monthly_multipliers: [f64; 12],
    pub premium_markets: Vec<String>,
    pub premium_multiplier: f64,
    pub discount_markets: Vec<String>,
    pub discount_multiplier: f64,
    /// Display labels per commodity; presentation only, never a real model.
    pub method_labels: Vec<(String, Vec<String>)>,
    pub default_method_labels: Vec<String>,
    pub confidence: f64,
}

impl FallbackTables {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AppError::Internal(format!("cannot read {path}: {err}")))?;
        serde_json::from_str(&raw)
            .map_err(|err| AppError::Internal(format!("invalid fallback tables in {path}: {err}")))
    }
}

impl Default for FallbackTables {
    fn default() -> Self {
        let base = |name: &str, price: f64| (name.to_string(), price);
        let labels = |name: &str, list: &[&str]| {
            (
                name.to_string(),
                list.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
            )
        };

        Self {
            base_prices: vec![
                base("rice", 2500.0),
                base("banana", 3000.0),
                base("tomato", 4000.0),
                base("cotton", 5500.0),
                base("groundnut", 7000.0),
                base("maize", 2200.0),
                base("mango", 5000.0),
                base("wheat", 2300.0),
                base("turmeric", 8000.0),
                base("green chilli", 8500.0),
                base("chilli", 10000.0),
                base("brinjal", 2500.0),
                base("papaya", 1500.0),
                base("jowar", 2800.0),
                base("sorghum", 2800.0),
                base("arhar", 6000.0),
                base("bajra", 2400.0),
                base("black gram", 5500.0),
            ],
            default_base_price: 2500.0,
            monthly_multipliers: [
                1.10, 1.15, 1.05, 0.95, 0.90, 0.85, 0.90, 0.95, 1.00, 1.05, 1.10, 1.15,
            ],
            premium_markets: vec!["tirupati".to_string(), "rajahmundry".to_string()],
            premium_multiplier: 1.05,
            discount_markets: vec!["kurnool".to_string(), "nandyal".to_string()],
            discount_multiplier: 0.98,
            method_labels: vec![
                labels(
                    "rice",
                    &[
                        "STLM (Seasonal-Trend Decomposition)",
                        "LSTM Neural Network",
                        "ARIMA-GARCH",
                    ],
                ),
                labels(
                    "banana",
                    &[
                        "Random Forest Regressor",
                        "STLM (Seasonal-Trend)",
                        "Gradient Boosting",
                    ],
                ),
                labels("tomato", &["LSTM Deep Learning", "SVR with RBF Kernel", "STLM"]),
                labels("cotton", &["ARIMA-X Model", "Neural Network Ensemble", "STLM"]),
                labels(
                    "groundnut",
                    &["XGBoost Regressor", "STLM (Seasonal-Trend)", "Time Series CNN"],
                ),
                labels("maize", &["Random Forest", "LSTM-Attention", "STLM"]),
                labels("mango", &["Seasonal ARIMA", "Deep Neural Network", "STLM"]),
                labels("papaya", &["STLM (Seasonal-Trend)", "Support Vector Regression"]),
                labels("jowar", &["ARIMA(2,1,2)", "STLM", "Ensemble Methods"]),
                labels("sorghum", &["ARIMA(2,1,2)", "STLM", "Ensemble Methods"]),
                labels("brinjal", &["LSTM Neural Network", "STLM", "Random Forest"]),
                labels("green chilli", &["XGBoost", "STLM (Seasonal-Trend)", "LSTM"]),
                labels("black gram", &["ARIMA-GARCH", "STLM", "Neural Network"]),
                labels("wheat", &["STLM (Seasonal-Trend)", "ARIMA-X", "Random Forest"]),
                labels("turmeric", &["LSTM Deep Learning", "STLM", "Gradient Boosting"]),
            ],
            default_method_labels: vec![
                "STLM (Seasonal-Trend)".to_string(),
                "ARIMA-X".to_string(),
                "Random Forest".to_string(),
            ],
            confidence: 0.75,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
