use crate::retry::RetryPolicy;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Access node REST API base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Listing-completed event types to poll
    #[serde(default = "default_listing_event_types")]
    pub listing_event_types: Vec<String>,
    /// Address of the NonFungibleToken standard contract
    #[serde(default = "default_nft_standard_address")]
    pub nft_standard_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// NFT type identifier of the tracked collection
    #[serde(default = "default_nft_type")]
    pub nft_type: String,
    /// Minimum USD price to post
    #[serde(default = "default_threshold_usd")]
    pub threshold_usd: f64,
    /// Log posts instead of publishing; threshold is not applied.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    /// Vault types already denominated in USD (full id or `Contract.Vault` suffix)
    #[serde(default = "default_usd_vaults")]
    pub usd_vaults: Vec<String>,
    /// Spot price API base URL
    #[serde(default = "default_oracle_url")]
    pub oracle_url: String,
    /// Vault type -> spot product id, e.g. FLOW-USD
    #[serde(default = "default_products")]
    pub products: HashMap<String, String>,
    #[serde(default = "default_price_ttl_secs")]
    pub ttl_secs: u64,
    /// `coinbase` (spot API) or `script` (on-chain feed via a Cadence script)
    #[serde(default = "default_price_source")]
    pub source: String,
    /// Cadence script returning the feed's UFix64 price, for `source = "script"`
    #[serde(default)]
    pub script: Option<String>,
    /// Address of the on-chain price feed passed to the script
    #[serde(default = "default_feed_address")]
    pub feed_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after that.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Access node limit on blocks per events query
    #[serde(default = "default_max_block_span")]
    pub max_block_span: u64,
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// Cadence script returning a pin by (owner, id). Lookups are disabled
    /// unless both scripts are set.
    #[serde(default)]
    pub pin_script: Option<String>,
    /// Cadence script returning an edition by id
    #[serde(default)]
    pub edition_script: Option<String>,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Publish to X; when false every post goes through the dry-run notifier.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_handle")]
    pub handle: String,
    /// Loaded from env TWITTER_BEARER_TOKEN
    #[serde(default)]
    pub bearer_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Directory for JSON-lines audit files; unset disables them.
    #[serde(default = "default_audit_dir")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_rest_url() -> String {
    "https://rest-mainnet.onflow.org".to_string()
}
fn default_listing_event_types() -> Vec<String> {
    vec![
        "A.4eb8a10cb9f87357.NFTStorefrontV2.ListingCompleted".to_string(),
        "A.3cdbb3d569211ff3.NFTStorefrontV2.ListingCompleted".to_string(),
    ]
}
fn default_nft_standard_address() -> String {
    "1d7e57aa55817448".to_string()
}
fn default_nft_type() -> String {
    "A.edf9df96c92f4595.Pinnacle.NFT".to_string()
}
fn default_threshold_usd() -> f64 {
    50.0
}
fn default_usd_vaults() -> Vec<String> {
    vec![
        "DapperUtilityCoin.Vault".to_string(),
        "FiatToken.Vault".to_string(),
    ]
}
fn default_oracle_url() -> String {
    "https://api.coinbase.com".to_string()
}
fn default_products() -> HashMap<String, String> {
    HashMap::from([(
        "A.1654653399040a61.FlowToken.Vault".to_string(),
        "FLOW-USD".to_string(),
    )])
}
fn default_price_ttl_secs() -> u64 {
    60
}
fn default_price_source() -> String {
    "coinbase".to_string()
}
fn default_feed_address() -> String {
    "e385412159992e11".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_max_block_span() -> u64 {
    250
}
fn default_status_interval_secs() -> u64 {
    10
}
fn default_image_base_url() -> String {
    "https://assets.disneypinnacle.com".to_string()
}
fn default_api_url() -> String {
    "https://api.x.com".to_string()
}
fn default_site_url() -> String {
    "https://disneypinnacle.com".to_string()
}
fn default_handle() -> String {
    "@DisneyPinnacle".to_string()
}
fn default_audit_dir() -> Option<String> {
    Some("logs".to_string())
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            listing_event_types: default_listing_event_types(),
            nft_standard_address: default_nft_standard_address(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            nft_type: default_nft_type(),
            threshold_usd: default_threshold_usd(),
            dry_run: false,
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            usd_vaults: default_usd_vaults(),
            oracle_url: default_oracle_url(),
            products: default_products(),
            ttl_secs: default_price_ttl_secs(),
            source: default_price_source(),
            script: None,
            feed_address: default_feed_address(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_block_span: default_max_block_span(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            pin_script: None,
            edition_script: None,
            image_base_url: default_image_base_url(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_api_url(),
            site_url: default_site_url(),
            handle: default_handle(),
            bearer_token: String::new(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: default_audit_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Secrets never live in the config file
        if let Ok(token) = std::env::var("TWITTER_BEARER_TOKEN") {
            config.notify.bearer_token = token;
        }

        Ok(config)
    }

    /// Load a default config with env overrides (no file needed).
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(url) = std::env::var("FLOW_REST_URL") {
            config.flow.rest_url = url;
        }
        if let Some(threshold) = std::env::var("PINBOT_THRESHOLD_USD")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.tracking.threshold_usd = threshold;
        }
        config.notify.enabled = std::env::var("PINBOT_ENABLE_POSTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        config.notify.bearer_token = std::env::var("TWITTER_BEARER_TOKEN").unwrap_or_default();
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.poll.max_block_span == 0 {
            return Err(ConfigError::Invalid("poll.max_block_span must be at least 1".into()));
        }
        self.threshold()?;
        match (self.price.source.as_str(), &self.price.script) {
            ("coinbase", _) | ("script", Some(_)) => {}
            ("script", None) => {
                return Err(ConfigError::Invalid(
                    "price.source = \"script\" needs price.script".into(),
                ))
            }
            (other, _) => {
                return Err(ConfigError::Invalid(format!(
                    "price.source must be coinbase or script, got {other:?}"
                )))
            }
        }
        if self.flow.listing_event_types.is_empty() {
            return Err(ConfigError::Invalid("flow.listing_event_types is empty".into()));
        }
        if self.notify.enabled && !self.has_credentials() {
            return Err(ConfigError::MissingEnv("TWITTER_BEARER_TOKEN".into()));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.notify.bearer_token.is_empty()
    }

    /// USD threshold as an exact decimal. Values a `Decimal` cannot hold are
    /// rejected rather than clamped.
    pub fn threshold(&self) -> Result<Decimal, ConfigError> {
        let raw = self.tracking.threshold_usd;
        let invalid = || {
            ConfigError::Invalid(format!(
                "tracking.threshold_usd must be a non-negative number a decimal can hold, got {raw}"
            ))
        };
        if !raw.is_finite() || raw < 0.0 {
            return Err(invalid());
        }
        Decimal::from_str(&raw.to_string()).map_err(|_| invalid())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.tracking.nft_type, "A.edf9df96c92f4595.Pinnacle.NFT");
        assert_eq!(config.flow.listing_event_types.len(), 2);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.poll.max_block_span, 250);
        assert_eq!(config.price.ttl_secs, 60);
        assert_eq!(
            config.price.products.get("A.1654653399040a61.FlowToken.Vault").map(String::as_str),
            Some("FLOW-USD")
        );
        assert_eq!(config.threshold().unwrap(), Decimal::new(50, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_override() {
        let config: Config = toml::from_str(
            r#"
            [tracking]
            threshold_usd = 200.0
            dry_run = true

            [retry]
            max_attempts = 2
            base_delay_ms = 500

            [audit]
            dir = "/var/log/pinbot"
            "#,
        )
        .unwrap();

        assert_eq!(config.threshold().unwrap(), Decimal::new(200, 0));
        assert!(config.tracking.dry_run);
        assert_eq!(config.retry_policy(), RetryPolicy::new(2, Duration::from_millis(500)));
        assert_eq!(config.audit.dir.as_deref(), Some("/var/log/pinbot"));
        assert_eq!(config.poll.interval_ms, 2000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.poll.max_block_span = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tracking.threshold_usd = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notify.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingEnv(_))));
    }

    #[test]
    fn test_script_price_source_needs_script() {
        let config: Config = toml::from_str("[price]\nsource = \"script\"").unwrap();
        assert_eq!(config.price.feed_address, "e385412159992e11");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: Config =
            toml::from_str("[price]\nsource = \"script\"\nscript = \"cadence/flow_price.cdc\"").unwrap();
        assert!(config.validate().is_ok());

        let config: Config = toml::from_str("[price]\nsource = \"chainlink\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_threshold_is_rejected() {
        let config: Config = toml::from_str("[tracking]\nthreshold_usd = 1e30").unwrap();
        assert!(matches!(config.threshold(), Err(ConfigError::Invalid(_))));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.tracking.threshold_usd = f64::NAN;
        assert!(config.threshold().is_err());
    }
}
