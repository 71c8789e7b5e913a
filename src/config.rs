use crate::chunks::LoaderSettings;
use crate::guide::{BillingCalendar, BillingDay};
use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use guide_core::RegionCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the viewing guide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chunked loading settings
    pub guide: GuideConfig,

    /// Episode source settings
    pub source: SourceConfig,

    /// Month cache settings
    pub cache: CacheConfig,

    /// Provider billing days
    pub billing: BillingConfig,

    /// Savings display settings
    pub savings: SavingsConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Days per loaded chunk
    pub chunk_days: u32,

    /// Days beyond the visible range that trigger a fetch
    pub trigger_margin_days: u32,

    /// Loaded chunks kept before the furthest are evicted
    pub max_retained_chunks: usize,

    /// First retry delay after a failed chunk (milliseconds)
    pub retry_base_ms: u64,

    /// Retry delay cap (milliseconds)
    pub retry_max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// ISO 3166-1 alpha-2 region for provider availability
    pub default_region: String,

    /// IANA timezone used to decide what "today" is
    pub timezone: Option<String>,

    /// Maximum concurrent per-show fetches
    pub max_concurrent_fetches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Month guide TTL in seconds
    pub month_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub providers: Vec<BillingDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavingsConfig {
    pub currency_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level
    pub log_level: String,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            chunk_days: 30,
            trigger_margin_days: 7,
            max_retained_chunks: 12,
            retry_base_ms: 500,
            retry_max_ms: 30_000,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            default_region: "US".to_string(),
            timezone: iana_time_zone::get_timezone().ok(),
            max_concurrent_fetches: num_cpus::get().min(8), // Use available cores, max 8
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            month_ttl_secs: 3600, // 1 hour
        }
    }
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            guide: GuideConfig::default(),
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            billing: BillingConfig::default(),
            savings: SavingsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

impl Config {
    /// Load configuration from the first readable config file, then the environment
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tally-guide.toml",
            "config/tally-guide.toml",
            "~/.config/tally-guide/config.toml",
            "/etc/tally-guide/config.toml",
        ];

        for path in &config_paths {
            let path = expand_home(path);
            if let Ok(config_str) = std::fs::read_to_string(&path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Ok(config.apply_env().normalized());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from one file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config.normalized())
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().apply_env().normalized())
    }

    fn apply_env(mut self) -> Self {
        if let Ok(region) = std::env::var("TALLY_GUIDE_REGION") {
            self.source.default_region = region;
        }

        if let Ok(timezone) = std::env::var("TALLY_GUIDE_TIMEZONE") {
            self.source.timezone = Some(timezone);
        }

        if let Ok(chunk_days) = std::env::var("TALLY_GUIDE_CHUNK_DAYS") {
            self.guide.chunk_days = chunk_days.parse().unwrap_or(self.guide.chunk_days);
        }

        if let Ok(max_concurrent) = std::env::var("TALLY_GUIDE_MAX_CONCURRENT") {
            self.source.max_concurrent_fetches = max_concurrent
                .parse()
                .unwrap_or(self.source.max_concurrent_fetches);
        }

        if let Ok(log_level) = std::env::var("TALLY_GUIDE_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        self
    }

    /// Clamp out-of-range numeric settings instead of rejecting them
    pub fn normalized(mut self) -> Self {
        self.guide.chunk_days = self.guide.chunk_days.max(1);
        self.guide.max_retained_chunks = self.guide.max_retained_chunks.max(1);
        self.guide.retry_max_ms = self.guide.retry_max_ms.max(self.guide.retry_base_ms);
        self.source.max_concurrent_fetches = self.source.max_concurrent_fetches.max(1);
        for entry in &mut self.billing.providers {
            entry.day = entry.day.clamp(1, 31);
        }
        self
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.region()?;

        if let Some(timezone) = &self.source.timezone {
            timezone
                .parse::<Tz>()
                .map_err(|_| anyhow!("Unknown timezone: {}", timezone))?;
        }

        if self.savings.currency_symbol.trim().is_empty() {
            return Err(anyhow!("currency_symbol must not be empty"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    pub fn region(&self) -> Result<RegionCode> {
        Ok(RegionCode::parse(&self.source.default_region)?)
    }

    /// Configured timezone, else UTC
    pub fn user_timezone(&self) -> Tz {
        self.source
            .timezone
            .as_deref()
            .and_then(|tz| tz.parse().ok())
            .unwrap_or(chrono_tz::UTC)
    }

    /// Today's date in the user's timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.user_timezone()).date_naive()
    }

    pub fn billing_calendar(&self) -> BillingCalendar {
        BillingCalendar::from_entries(&self.billing.providers)
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            trigger_margin_days: self.guide.trigger_margin_days,
            max_retained_chunks: self.guide.max_retained_chunks,
            retry_base: Duration::from_millis(self.guide.retry_base_ms),
            retry_max: Duration::from_millis(self.guide.retry_max_ms),
        }
    }

    pub fn month_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.month_ttl_secs)
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Tally Guide Configuration:\n\
            - Region: {}\n\
            - Timezone: {}\n\
            - Chunk Size: {} days (margin {})\n\
            - Retained Chunks: {}\n\
            - Concurrent Fetches: {}\n\
            - Month Cache TTL: {}s\n\
            - Billing Days: {}",
            self.source.default_region,
            self.user_timezone(),
            self.guide.chunk_days,
            self.guide.trigger_margin_days,
            self.guide.max_retained_chunks,
            self.source.max_concurrent_fetches,
            self.cache.month_ttl_secs,
            self.billing.providers.len()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.config.source.default_region = region.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.config.source.timezone = Some(timezone.into());
        self
    }

    pub fn with_chunk_days(mut self, chunk_days: u32) -> Self {
        self.config.guide.chunk_days = chunk_days;
        self
    }

    pub fn with_trigger_margin(mut self, days: u32) -> Self {
        self.config.guide.trigger_margin_days = days;
        self
    }

    pub fn with_max_retained_chunks(mut self, chunks: usize) -> Self {
        self.config.guide.max_retained_chunks = chunks;
        self
    }

    pub fn with_retry(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.config.guide.retry_base_ms = base_ms;
        self.config.guide.retry_max_ms = max_ms;
        self
    }

    pub fn with_max_concurrent(mut self, fetches: usize) -> Self {
        self.config.source.max_concurrent_fetches = fetches;
        self
    }

    pub fn with_month_ttl(mut self, secs: u64) -> Self {
        self.config.cache.month_ttl_secs = secs;
        self
    }

    pub fn with_billing_day(mut self, provider_id: u32, day: i64) -> Self {
        self.config.billing.providers.push(BillingDay { provider_id, day });
        self
    }

    pub fn build(self) -> Config {
        self.config.normalized()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.guide.chunk_days, 30);
        assert_eq!(config.guide.trigger_margin_days, 7);
        assert_eq!(config.source.default_region, "US");
        assert!(config.source.max_concurrent_fetches >= 1);
        assert!(config.source.max_concurrent_fetches <= 8);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_region("gb")
            .with_chunk_days(0)
            .with_retry(2000, 100)
            .with_billing_day(8, 45)
            .build();

        assert_eq!(config.region().unwrap().as_str(), "GB");
        assert_eq!(config.guide.chunk_days, 1);
        assert_eq!(config.guide.retry_max_ms, 2000);
        assert_eq!(config.billing.providers[0].day, 31);
        assert_eq!(config.billing_calendar().billing_day(8), Some(31));
    }

    #[test]
    fn test_config_validation() {
        let config = ConfigBuilder::new().with_timezone("Europe/Berlin").build();
        assert!(config.validate().is_ok());
        assert_eq!(config.user_timezone(), chrono_tz::Europe::Berlin);

        let bad_region = ConfigBuilder::new().with_region("USA").build();
        assert!(bad_region.validate().is_err());

        let bad_timezone = ConfigBuilder::new().with_timezone("Mars/Olympus").build();
        assert!(bad_timezone.validate().is_err());
        assert_eq!(bad_timezone.user_timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally-guide.toml");

        let config = ConfigBuilder::new()
            .with_region("DE")
            .with_timezone("Europe/Berlin")
            .with_month_ttl(60)
            .with_billing_day(8, 15)
            .with_billing_day(337, 31)
            .build();
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[guide]\nchunk_days = 14\n\n[[billing.providers]]\nprovider_id = 8\nday = 0\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.guide.chunk_days, 14);
        assert_eq!(config.guide.max_retained_chunks, 12);
        assert_eq!(config.billing.providers[0].day, 1);
        assert_eq!(config.savings.currency_symbol, "$");
    }

    #[test]
    fn test_loader_settings() {
        let settings = ConfigBuilder::new().with_retry(250, 4000).build().loader_settings();
        assert_eq!(settings.retry_base, Duration::from_millis(250));
        assert_eq!(settings.retry_max, Duration::from_secs(4));
        assert_eq!(settings.max_retained_chunks, 12);
    }
}
