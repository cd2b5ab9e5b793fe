//! Process-wide configuration (spec §6). Loaded once from the environment
//! at startup, following the teacher's `env::var(...).ok().and_then(...)`
//! pattern in `main.rs`.

use std::env;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ServiceUrls {
    pub scanner: String,
    pub pattern: String,
    pub technical: String,
    pub risk_manager: String,
    pub trading: String,
    pub news: String,
    pub reporting: String,
}

impl ServiceUrls {
    fn from_env() -> Self {
        Self {
            scanner: env_or("SCANNER_URL", "http://scanner:5001"),
            pattern: env_or("PATTERN_URL", "http://pattern:5002"),
            technical: env_or("TECHNICAL_URL", "http://technical:5003"),
            risk_manager: env_or("RISK_URL", "http://risk-manager:5004"),
            trading: env_or("TRADING_URL", "http://trading:5005"),
            news: env_or("NEWS_URL", "http://news:5008"),
            reporting: env_or("REPORTING_URL", "http://reporting:5009"),
        }
    }

    /// Closed set of logical service names, matching the `ServiceClient`
    /// contract in spec §4.2.
    pub fn resolve(&self, service: &str) -> Option<&str> {
        match service {
            "scanner" => Some(&self.scanner),
            "pattern" => Some(&self.pattern),
            "technical" => Some(&self.technical),
            "risk-manager" => Some(&self.risk_manager),
            "trading" => Some(&self.trading),
            "news" => Some(&self.news),
            "reporting" => Some(&self.reporting),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("scanner", self.scanner.as_str()),
            ("pattern", self.pattern.as_str()),
            ("technical", self.technical.as_str()),
            ("risk-manager", self.risk_manager.as_str()),
            ("trading", self.trading.as_str()),
            ("news", self.news.as_str()),
            ("reporting", self.reporting.as_str()),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub api_id: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub store_path: String,
    pub services: ServiceUrls,
    pub broker: BrokerCredentials,
    pub news_source_keys: Vec<(String, String)>,
    pub alerting_sink: Option<String>,

    pub service_call_timeout: Duration,
    pub service_max_retries: u32,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,

    pub health_probe_interval_market: Duration,
    pub health_probe_interval_off_hours: Duration,
    pub health_history_len: usize,

    pub stage_fanout: usize,

    pub news_ingest_interval: Duration,
    pub news_impact_interval: Duration,
    pub news_impact_delay: Duration,
    pub news_impact_batch: usize,
    pub news_impact_max_attempts: u32,

    pub mark_to_market_interval: Duration,
    pub emergency_exit_deadline: Duration,

    pub store_pool_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            store_path: env_or("STORE_PATH", "catalyst.db"),
            services: ServiceUrls::from_env(),
            broker: BrokerCredentials {
                api_id: env_or("BROKER_API_ID", ""),
                api_secret: env_or("BROKER_API_SECRET", ""),
            },
            news_source_keys: env::var("NEWS_SOURCE_KEYS")
                .ok()
                .map(|raw| {
                    raw.split(',')
                        .filter_map(|pair| pair.split_once('='))
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            alerting_sink: env::var("ALERTING_SINK").ok(),

            service_call_timeout: Duration::from_secs(env_parse("SERVICE_CALL_TIMEOUT_SECS", 30)),
            service_max_retries: env_parse("SERVICE_MAX_RETRIES", 3),
            circuit_breaker_threshold: env_parse("CIRCUIT_BREAKER_THRESHOLD", 5),
            circuit_breaker_cooldown: Duration::from_secs(env_parse("CIRCUIT_BREAKER_COOLDOWN_SECS", 60)),

            health_probe_interval_market: Duration::from_secs(env_parse("HEALTH_PROBE_MARKET_SECS", 120)),
            health_probe_interval_off_hours: Duration::from_secs(env_parse("HEALTH_PROBE_OFFHOURS_SECS", 300)),
            health_history_len: env_parse("HEALTH_HISTORY_LEN", 5),

            stage_fanout: env_parse("STAGE_FANOUT", 10),

            news_ingest_interval: Duration::from_secs(env_parse("NEWS_INGEST_INTERVAL_SECS", 300)),
            news_impact_interval: Duration::from_secs(env_parse("NEWS_IMPACT_INTERVAL_SECS", 60)),
            news_impact_delay: Duration::from_secs(env_parse("NEWS_IMPACT_DELAY_SECS", 300)),
            news_impact_batch: env_parse("NEWS_IMPACT_BATCH", 50),
            news_impact_max_attempts: env_parse("NEWS_IMPACT_MAX_ATTEMPTS", 5),

            mark_to_market_interval: Duration::from_secs(env_parse("MARK_TO_MARKET_INTERVAL_SECS", 60)),
            emergency_exit_deadline: Duration::from_secs(env_parse("EMERGENCY_EXIT_DEADLINE_SECS", 30)),

            store_pool_size: env_parse("STORE_POOL_SIZE", 16),
        }
    }
}
