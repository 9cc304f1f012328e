//! Marketplace REST endpoints

use serde::{Deserialize, Serialize};

/// Marketplace API location and paging limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceApi {
    /// API root, e.g. `https://api.opensea.io`
    pub base_url: String,
    /// Public site root used for permalinks and owner pages
    pub site_url: String,
    /// Sent as `X-API-KEY`
    pub api_key: Option<String>,
    /// Token ids per assets request
    pub assets_chunk_size: usize,
    /// Events per page
    pub events_page_size: usize,
    /// Upper bound on events fetched per crawl
    pub events_limit: usize,
}

impl Default for MarketplaceApi {
    fn default() -> Self {
        Self {
            base_url: "https://api.opensea.io".to_string(),
            site_url: "https://opensea.io".to_string(),
            api_key: None,
            assets_chunk_size: 20,
            events_page_size: 200,
            events_limit: 2000,
        }
    }
}

/// Sort direction for asset pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

impl MarketplaceApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Collection stats by slug
    pub fn stats_url(&self, slug: &str) -> String {
        self.api(&format!("collection/{}/stats", urlencoding::encode(slug)))
    }

    /// Contract details
    pub fn contract_url(&self, contract_address: &str) -> String {
        self.api(&format!("asset_contract/{}", contract_address))
    }

    /// One page of assets, optionally restricted to specific token ids
    pub fn assets_url(
        &self,
        contract_address: &str,
        token_ids: &[String],
        offset: usize,
        limit: usize,
        direction: OrderDirection,
    ) -> String {
        let mut url = self.api(&format!(
            "assets?asset_contract_address={}&order_direction={}&offset={}&limit={}",
            contract_address,
            direction.as_str(),
            offset,
            limit
        ));
        if !token_ids.is_empty() {
            let ids: Vec<String> = token_ids
                .iter()
                .map(|id| format!("token_ids={}", urlencoding::encode(id)))
                .collect();
            url.push('&');
            url.push_str(&ids.join("&"));
        }
        url
    }

    /// One page of events of a given type
    pub fn events_url(
        &self,
        contract_address: &str,
        event_type: &str,
        offset: usize,
        limit: usize,
    ) -> String {
        self.api(&format!(
            "events?asset_contract_address={}&event_type={}&only_opensea=false&offset={}&limit={}",
            contract_address,
            urlencoding::encode(event_type),
            offset,
            limit
        ))
    }

    /// Public page of one token
    pub fn permalink(&self, contract_address: &str, token_id: &str) -> String {
        format!(
            "{}/assets/{}/{}",
            self.site_url.trim_end_matches('/'),
            contract_address,
            token_id
        )
    }

    /// Public page of an owner
    pub fn owner_url(&self, owner: &str) -> String {
        format!(
            "{}/{}",
            self.site_url.trim_end_matches('/'),
            urlencoding::encode(owner)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let api = MarketplaceApi::new("https://api.test/");
        assert_eq!(api.stats_url("my collection"), "https://api.test/api/v1/collection/my%20collection/stats");
        assert_eq!(api.contract_url("0xabc"), "https://api.test/api/v1/asset_contract/0xabc");
        assert_eq!(
            api.assets_url("0xabc", &["1".into(), "2".into()], 0, 20, OrderDirection::Asc),
            "https://api.test/api/v1/assets?asset_contract_address=0xabc&order_direction=asc&offset=0&limit=20&token_ids=1&token_ids=2"
        );
        assert_eq!(
            api.events_url("0xabc", "created", 200, 200),
            "https://api.test/api/v1/events?asset_contract_address=0xabc&event_type=created&only_opensea=false&offset=200&limit=200"
        );
    }

    #[test]
    fn test_site_links() {
        let api = MarketplaceApi::default();
        assert_eq!(api.permalink("0xabc", "7"), "https://opensea.io/assets/0xabc/7");
        assert_eq!(api.owner_url("alice"), "https://opensea.io/alice");
    }
}
