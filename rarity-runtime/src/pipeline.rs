//! Crawl pipeline
//!
//! One pipeline run produces a [`Snapshot`] of a collection:
//! 1. Collection stats (floor price), when a slug is configured
//! 2. Marketplace assets and listing events, crawled concurrently
//! 3. Token metadata for the configured supply, flagged with asset presence
//! 4. Assembly, rarity scoring, floors and floor history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use rarity_core::{calc_rarity, Collection, RarityError, RarityRules, Token};
use rarity_fetch::{
    fetch_with, FetchItem, FetchOptions, FetchOutcome, FetchResponse, FetchStats, HttpTransport,
    ReqwestTransport, Scheduler, TransportConfig,
};
use rarity_sources::{
    asset_items, classify_assets, classify_events, classify_json, classify_token_homepage,
    classify_token_metadata, event_items, is_collection_revealed, stats_floor_price,
    stats_total_supply, token_items, AssetsContext, EventsContext, JsonContext, TokensContext,
    EVENT_TYPE_CREATED,
};

use crate::{
    assemble_collection, calc_floors, floor_history, ConfigError, FloorEntry, FloorPoint,
    ProjectConfig, TokenSource,
};

/// Tokens inspected when deciding whether the collection is revealed
const REVEAL_SAMPLE_SIZE: usize = 10;

type TokenClassifier = fn(&FetchItem, &FetchResponse, &mut TokensContext, &FetchOptions) -> FetchOutcome;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no tokens fetched for {0}")]
    NoTokens(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rarity(#[from] RarityError),
}

/// Fetch counters per data source
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceStats {
    pub stats: FetchStats,
    pub assets: FetchStats,
    pub events: FetchStats,
    pub tokens: FetchStats,
}

impl SourceStats {
    pub fn total(&self) -> FetchStats {
        let mut total = FetchStats::default();
        for stats in [&self.stats, &self.assets, &self.events, &self.tokens] {
            total.merge(stats);
        }
        total
    }
}

/// A scored collection with its market data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub created: DateTime<Utc>,
    pub collection: Collection,
    /// Floor reported by the marketplace stats endpoint
    #[serde(default)]
    pub floor_price: Option<f64>,
    /// Supply reported by the marketplace stats endpoint
    #[serde(default)]
    pub total_supply: Option<u64>,
    #[serde(default)]
    pub floors: Vec<FloorEntry>,
    #[serde(default)]
    pub floor_history: Vec<FloorPoint>,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default)]
    pub fetch_stats: SourceStats,
}

/// Reachability of the marketplace endpoints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckReport {
    pub contract_ok: bool,
    pub stats_ok: Option<bool>,
    pub floor_price: Option<f64>,
    pub stats: FetchStats,
}

/// Drop everything the rarity engine derived, keeping fetched data
pub fn unscored(token: Token) -> Token {
    Token {
        name: token.name,
        image: token.image,
        token_uri: token.token_uri,
        extra: token.extra,
        market: token.market,
        ..Token::new(&token.token_id, token.attributes)
    }
}

/// Recompute rarity, floors and reveal state of a saved snapshot under new rules
pub fn rescore(
    snapshot: Snapshot,
    rules: &RarityRules,
    floor_trait_types: &[String],
) -> Result<Snapshot, PipelineError> {
    let name = snapshot.collection.name.clone();
    let tokens: Vec<Token> = snapshot.collection.tokens.into_iter().map(unscored).collect();
    if tokens.is_empty() {
        return Err(PipelineError::NoTokens(name));
    }

    let mut collection = Collection::new(&name, tokens);
    calc_rarity(&mut collection, rules)?;
    info!("Rescored {} tokens of {}", collection.num_tokens(), name);

    Ok(Snapshot {
        created: Utc::now(),
        floors: calc_floors(&collection, floor_trait_types),
        collection,
        ..snapshot
    })
}

/// Crawl pipeline for one project
pub struct Pipeline {
    config: ProjectConfig,
    transport: Arc<dyn HttpTransport>,
    scheduler: Scheduler,
}

impl Pipeline {
    pub fn new(config: ProjectConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            scheduler: Scheduler::global().clone(),
        }
    }

    /// Pipeline over a reqwest transport carrying the marketplace API key
    pub fn from_config(config: ProjectConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let mut transport_config = TransportConfig::default();
        if let Some(api_key) = &config.marketplace.api_key {
            transport_config = transport_config.with_api_key(api_key);
        }
        let transport = ReqwestTransport::new(&transport_config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    async fn fetch_json(&self, uri: &str) -> JsonContext {
        let mut context = JsonContext::default();
        fetch_with(
            &self.scheduler,
            &*self.transport,
            vec![FetchItem::new(uri)],
            classify_json,
            &mut context,
            &self.config.fetch.assets,
        )
        .await;
        context
    }

    async fn fetch_assets(&self, token_ids: &[String]) -> AssetsContext {
        let items = asset_items(
            &self.config.marketplace,
            &self.config.collection.contract_address,
            token_ids,
        );
        info!("Fetch assets ({} batches)...", items.len());
        let mut context = AssetsContext::new();
        fetch_with(
            &self.scheduler,
            &*self.transport,
            items,
            classify_assets,
            &mut context,
            &self.config.fetch.assets,
        )
        .await;
        context
    }

    async fn fetch_events(&self) -> EventsContext {
        let items = event_items(
            &self.config.marketplace,
            &self.config.collection.contract_address,
            EVENT_TYPE_CREATED,
        );
        info!("Fetch listing events ({} pages)...", items.len());
        let mut context = EventsContext::default();
        fetch_with(
            &self.scheduler,
            &*self.transport,
            items,
            classify_events,
            &mut context,
            &self.config.fetch.events,
        )
        .await;
        context
    }

    async fn fetch_tokens(
        &self,
        token_ids: &[String],
        known: &HashSet<String>,
    ) -> Result<TokensContext, PipelineError> {
        let (template, source) = self.config.token_template()?;
        let classify: TokenClassifier = match source {
            TokenSource::Metadata => classify_token_metadata,
            TokenSource::Homepage => classify_token_homepage,
        };

        info!("Fetch {} tokens...", token_ids.len());
        let mut context = TokensContext::new(self.config.collection.unrevealed_image.as_deref());
        fetch_with(
            &self.scheduler,
            &*self.transport,
            token_items(template, token_ids, known),
            classify,
            &mut context,
            &self.config.fetch.tokens,
        )
        .await;
        Ok(context)
    }

    /// Check that the contract and stats endpoints respond
    pub async fn check(&self) -> CheckReport {
        let api = &self.config.marketplace;
        let contract = self
            .fetch_json(&api.contract_url(&self.config.collection.contract_address))
            .await;

        let mut report = CheckReport {
            contract_ok: contract.value.is_some(),
            stats: contract.stats,
            ..Default::default()
        };

        if let Some(slug) = &self.config.collection.slug {
            let stats = self.fetch_json(&api.stats_url(slug)).await;
            report.stats_ok = Some(stats.value.is_some());
            report.floor_price = stats.value.as_ref().and_then(stats_floor_price);
            report.stats.merge(&stats.stats);
        }
        report
    }

    /// Crawl, assemble and score the collection
    pub async fn run(&self) -> Result<Snapshot, PipelineError> {
        self.config.validate()?;
        let name = self.config.collection.name.clone();
        let token_ids = self.config.token_ids();
        let mut fetch_stats = SourceStats::default();

        info!("Crawling {} ({} token ids)", name, token_ids.len());

        let mut floor_price = None;
        let mut total_supply = None;
        if let Some(slug) = &self.config.collection.slug {
            let stats = self.fetch_json(&self.config.marketplace.stats_url(slug)).await;
            floor_price = stats.value.as_ref().and_then(stats_floor_price);
            total_supply = stats.value.as_ref().and_then(stats_total_supply);
            fetch_stats.stats = stats.stats;
        }
        if let Some(supply) = total_supply.filter(|n| *n != token_ids.len() as u64) {
            warn!(
                "Marketplace reports {} tokens for {}, config covers {}",
                supply,
                name,
                token_ids.len()
            );
        }

        let (assets, events) = tokio::join!(self.fetch_assets(&token_ids), self.fetch_events());
        fetch_stats.assets = assets.stats;
        fetch_stats.events = events.stats;
        info!(
            "Fetched {} assets and {} events",
            assets.assets.len(),
            events.events.len()
        );

        let known: HashSet<String> = assets.assets.iter().map(|a| a.token_id.clone()).collect();
        let tokens = self.fetch_tokens(&token_ids, &known).await?;
        fetch_stats.tokens = tokens.stats;
        info!("Fetched {} tokens: {}", tokens.tokens.len(), tokens.stats);

        if tokens.tokens.is_empty() {
            return Err(PipelineError::NoTokens(name));
        }

        let sample_end = tokens.tokens.len().min(REVEAL_SAMPLE_SIZE);
        let revealed = is_collection_revealed(
            &tokens.tokens[..sample_end],
            tokens.unrevealed_image.as_deref(),
        );
        if !revealed {
            warn!("{} does not look revealed yet", name);
        }

        let mut collection = assemble_collection(
            &name,
            tokens.tokens,
            &assets.assets,
            &self.config.rules,
            &self.config.marketplace,
            &self.config.collection.contract_address,
        );
        if collection.tokens.is_empty() {
            return Err(PipelineError::NoTokens(name));
        }
        calc_rarity(&mut collection, &self.config.rules)?;

        let floors = calc_floors(&collection, &self.config.floors.trait_types);
        let floor_history = floor_history(&events.events);
        info!(
            "Snapshot ready: {} tokens, {} floors, {} history days ({})",
            collection.num_tokens(),
            floors.len(),
            floor_history.len(),
            fetch_stats.total()
        );

        Ok(Snapshot {
            created: Utc::now(),
            collection,
            floor_price,
            total_supply,
            floors,
            floor_history,
            revealed,
            fetch_stats,
        })
    }
}
