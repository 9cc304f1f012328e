//! Project configuration
//!
//! A project describes one collection: where its tokens live, how to score
//! them and how hard to hit each data source. Configs are TOML; missing
//! sections fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use rarity_core::RarityRules;
use rarity_fetch::{FetchOptions, FetchOverrides};
use rarity_sources::{MarketplaceApi, TOKEN_ID_PLACEHOLDER};

/// Embedded example project
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where token metadata is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// JSON metadata at the token URI
    Metadata,
    /// HTML token homepage with embedded page data
    Homepage,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    /// Marketplace collection slug, for stats
    #[serde(default)]
    pub slug: Option<String>,
    pub contract_address: String,
    /// Token URI template containing `{ID}`
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Token homepage template containing `{ID}`, used when there is no token URI
    #[serde(default)]
    pub home_url: Option<String>,
    /// First and last token id, inclusive
    pub supply: [u64; 2],
    /// Image served before reveal
    #[serde(default)]
    pub unrevealed_image: Option<String>,
}

/// Trait types to compute per-value floors for
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FloorConfig {
    #[serde(default)]
    pub trait_types: Vec<String>,
}

/// Fetch options per data source.
///
/// Each `[fetch.<source>]` table only overrides the fields it sets; the rest
/// come from that source's preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FetchConfigOverrides")]
pub struct FetchConfig {
    pub assets: FetchOptions,
    pub events: FetchOptions,
    pub tokens: FetchOptions,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FetchConfigOverrides {
    assets: FetchOverrides,
    events: FetchOverrides,
    tokens: FetchOverrides,
}

impl From<FetchConfigOverrides> for FetchConfig {
    fn from(overrides: FetchConfigOverrides) -> Self {
        Self {
            assets: overrides.assets.apply(FetchOptions::assets()),
            events: overrides.events.apply(FetchOptions::events()),
            tokens: overrides.tokens.apply(FetchOptions::tokens()),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            assets: FetchOptions::assets(),
            events: FetchOptions::events(),
            tokens: FetchOptions::tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub collection: CollectionConfig,
    #[serde(default)]
    pub rules: RarityRules,
    #[serde(default)]
    pub floors: FloorConfig,
    #[serde(default)]
    pub marketplace: MarketplaceApi,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl ProjectConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The embedded example project
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.marketplace.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_marketplace_url(mut self, base_url: &str) -> Self {
        self.marketplace.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let collection = &self.collection;
        if collection.contract_address.trim().is_empty() {
            return Err(ConfigError::Invalid("collection.contract_address is empty".into()));
        }
        let [first, last] = collection.supply;
        if first > last {
            return Err(ConfigError::Invalid(format!(
                "collection.supply first id {} is after last id {}",
                first, last
            )));
        }
        let (template, _) = self.token_template()?;
        if !template.contains(TOKEN_ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "token template {} has no {} placeholder",
                template, TOKEN_ID_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// Token template and how to read it. The token URI wins over the homepage.
    pub fn token_template(&self) -> Result<(&str, TokenSource), ConfigError> {
        let collection = &self.collection;
        match (&collection.token_uri, &collection.home_url) {
            (Some(uri), _) => Ok((uri.as_str(), TokenSource::Metadata)),
            (None, Some(url)) => Ok((url.as_str(), TokenSource::Homepage)),
            (None, None) => Err(ConfigError::Invalid(
                "collection needs token_uri or home_url".into(),
            )),
        }
    }

    /// Every token id in the configured supply
    pub fn token_ids(&self) -> Vec<String> {
        let [first, last] = self.collection.supply;
        (first..=last).map(|id| id.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rarity_core::RankKey;
    use std::time::Duration;

    const MINIMAL: &str = r#"
[collection]
name = "Minimal"
contract_address = "0xabc"
home_url = "https://example.test/token/{ID}"
supply = [0, 4]
"#;

    #[test]
    fn test_embedded_config_parses() {
        let config = ProjectConfig::embedded().unwrap();
        assert_eq!(config.collection.supply, [1, 100]);
        assert!(config.rules.normalize);
        assert_eq!(config.rules.outliers, Some(RankKey::Score));
        assert_eq!(config.fetch.assets.max_concurrent, 10);
        assert_eq!(config.fetch.tokens.placeholder_delay, Duration::from_secs(12));
        assert_eq!(config.token_ids().len(), 100);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ProjectConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.fetch, FetchConfig::default());
        assert_eq!(config.marketplace, MarketplaceApi::default());
        assert_eq!(config.rules, RarityRules::default());
        assert_eq!(config.token_ids(), vec!["0", "1", "2", "3", "4"]);

        let (template, source) = config.token_template().unwrap();
        assert_eq!(template, "https://example.test/token/{ID}");
        assert_eq!(source, TokenSource::Homepage);
    }

    #[test]
    fn test_partial_fetch_table_keeps_source_preset() {
        let text = format!("{}\n[fetch.events]\nretry_budget_ms = 60000\n", MINIMAL);
        let config = ProjectConfig::from_toml_str(&text).unwrap();

        let expected = FetchOptions::events().with_retry_budget(Duration::from_secs(60));
        assert_eq!(config.fetch.events, expected);
        assert_eq!(config.fetch.events.max_concurrent, 10);
        assert_eq!(config.fetch.tokens, FetchOptions::tokens());
    }

    #[test]
    fn test_invalid_configs() {
        let reversed = MINIMAL.replace("[0, 4]", "[5, 4]");
        assert!(matches!(
            ProjectConfig::from_toml_str(&reversed),
            Err(ConfigError::Invalid(_))
        ));

        let no_placeholder = MINIMAL.replace("{ID}", "1");
        assert!(matches!(
            ProjectConfig::from_toml_str(&no_placeholder),
            Err(ConfigError::Invalid(_))
        ));

        let no_template = MINIMAL.replace("home_url = \"https://example.test/token/{ID}\"", "");
        assert!(matches!(
            ProjectConfig::from_toml_str(&no_template),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            ProjectConfig::from_toml_str("[collection"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = ProjectConfig::load(Path::new("/nonexistent/nft-rarity.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
