use std::time::Duration;

use config::{Config, File};
use serde::{de, Deserialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::{
    fields::{ContractVersion, ExecutionMode},
    logging::TracingSettings,
};

pub const SERVICE_NAME: &str = "MARKET_STATS";

/// Wrapper under [`serde::de::IgnoredAny`] which implements
/// [`PartialEq`] and [`Eq`] for fields to be ignored.
#[derive(Copy, Clone, Debug, Default, Deserialize)]
struct IgnoredAny(de::IgnoredAny);

impl PartialEq for IgnoredAny {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for IgnoredAny {}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api: ApiSettings,
    pub query: QuerySettings,
    pub deferred: DeferredSettings,
    pub contract: ContractSettings,
    pub tracing: TracingSettings,

    // `MARKET_STATS__CONFIG` is also picked up by the environment source;
    // without this field `deny_unknown_fields` would reject it
    #[serde(rename = "config")]
    config_path: IgnoredAny,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    pub url: url::Url,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "http_timeout_ms")]
    pub http_timeout: Duration,
    pub max_retries: u32,
    pub probe_url: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            url: url::Url::parse("http://127.0.0.1:8050").unwrap(),
            http_timeout: Duration::from_secs(30),
            max_retries: 3,
            probe_url: false,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySettings {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "debounce_delay_ms")]
    pub debounce_delay: Duration,
    pub keep_previous_data: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(200),
            keep_previous_data: true,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeferredSettings {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "medium_stagger_ms")]
    pub medium_stagger: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "low_stagger_ms")]
    pub low_stagger: Duration,
}

impl Default for DeferredSettings {
    fn default() -> Self {
        Self {
            medium_stagger: Duration::from_millis(100),
            low_stagger: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ContractSettings {
    pub mode: ExecutionMode,
    pub supported_versions: Vec<ContractVersion>,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            supported_versions: ContractVersion::ALL.to_vec(),
        }
    }
}

impl Settings {
    /// Read settings from the file named by `MARKET_STATS__CONFIG` (if set)
    /// overlaid with `MARKET_STATS__*` environment variables.
    pub fn build() -> anyhow::Result<Self> {
        let config_path = std::env::var(format!("{SERVICE_NAME}__CONFIG"));

        let mut builder = Config::builder();
        if let Ok(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        };
        // `__` separates sections so that keys may contain single underscores
        builder = builder.add_source(
            config::Environment::with_prefix(SERVICE_NAME)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("contract.supported_versions")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.contract.supported_versions.is_empty() {
            anyhow::bail!("contract.supported_versions must not be empty");
        }
        if self.query.debounce_delay.is_zero() {
            anyhow::bail!("query.debounce_delay_ms must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::logging::TracingFormat;

    fn from_toml(toml: &str) -> Result<Settings, config::ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.query.debounce_delay, Duration::from_millis(200));
        assert!(settings.query.keep_previous_data);
        assert_eq!(settings.contract.mode, ExecutionMode::Production);
        assert_eq!(settings.contract.supported_versions.len(), 3);
        settings.validate().unwrap();
    }

    #[test]
    fn sections_are_read_from_file() {
        let settings = from_toml(
            r#"
            [api]
            url = "https://stats.example.com/"
            http_timeout_ms = 5000
            max_retries = 0

            [query]
            debounce_delay_ms = 350

            [contract]
            mode = "test"
            supported_versions = ["v2", "v3"]

            [tracing]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(settings.api.url.as_str(), "https://stats.example.com/");
        assert_eq!(settings.api.http_timeout, Duration::from_secs(5));
        assert_eq!(settings.api.max_retries, 0);
        assert_eq!(settings.query.debounce_delay, Duration::from_millis(350));
        assert_eq!(settings.contract.mode, ExecutionMode::Test);
        assert_eq!(
            settings.contract.supported_versions,
            vec![ContractVersion::V2, ContractVersion::V3]
        );
        assert_eq!(settings.tracing.format, TracingFormat::Json);
    }

    #[test]
    fn unknown_versions_and_fields_are_rejected() {
        assert!(from_toml("[contract]\nsupported_versions = [\"v7\"]").is_err());
        assert!(from_toml("[query]\ndebounce = 1").is_err());
    }

    #[test]
    fn environment_overrides_defaults() {
        std::env::set_var("MARKET_STATS__QUERY__DEBOUNCE_DELAY_MS", "500");
        std::env::set_var("MARKET_STATS__CONTRACT__SUPPORTED_VERSIONS", "v2,v3");
        std::env::set_var("MARKET_STATS__CONTRACT__MODE", "development");
        let settings = Settings::build().unwrap();
        std::env::remove_var("MARKET_STATS__QUERY__DEBOUNCE_DELAY_MS");
        std::env::remove_var("MARKET_STATS__CONTRACT__SUPPORTED_VERSIONS");
        std::env::remove_var("MARKET_STATS__CONTRACT__MODE");

        assert_eq!(settings.query.debounce_delay, Duration::from_millis(500));
        assert_eq!(
            settings.contract.supported_versions,
            vec![ContractVersion::V2, ContractVersion::V3]
        );
        assert_eq!(settings.contract.mode, ExecutionMode::Development);
        assert_eq!(settings.api, ApiSettings::default());
    }

    #[test]
    fn empty_version_set_fails_validation() {
        let settings = from_toml("[contract]\nsupported_versions = []").unwrap();
        assert!(settings.validate().is_err());
    }
}
