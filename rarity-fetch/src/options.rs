//! Fetch run options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for one fetch run. Durations are read from config in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Shared concurrency budget, divided across simultaneous runs
    pub max_concurrent: usize,
    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,
    /// Delay between dispatch passes
    #[serde(rename = "batch_delay_ms", with = "millis")]
    pub batch_delay: Duration,
    /// Retry delay for transient server errors
    #[serde(rename = "standard_delay_ms", with = "millis")]
    pub standard_delay: Duration,
    /// Retry delay after a request timeout
    #[serde(rename = "timeout_delay_ms", with = "millis")]
    pub timeout_delay: Duration,
    /// Retry delay while a token still serves placeholder metadata
    #[serde(rename = "placeholder_delay_ms", with = "millis")]
    pub placeholder_delay: Duration,
    /// Wall-clock budget after which pending items stop retrying
    #[serde(rename = "retry_budget_ms", with = "opt_millis")]
    pub retry_budget: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 100,
            request_timeout: Duration::from_millis(8000),
            batch_delay: Duration::from_millis(100),
            standard_delay: Duration::from_millis(1000),
            timeout_delay: Duration::from_millis(1000),
            placeholder_delay: Duration::from_millis(1000),
            retry_budget: None,
        }
    }
}

/// Concurrency for the rate-limited marketplace API
const MARKETPLACE_MAX_CONCURRENT: usize = 10;

/// Time a token server usually needs to swap placeholder metadata for the real one
const TOKEN_PLACEHOLDER_DELAY: Duration = Duration::from_millis(12000);

impl FetchOptions {
    /// Marketplace asset pages
    pub fn assets() -> Self {
        Self::default().with_max_concurrent(MARKETPLACE_MAX_CONCURRENT)
    }

    /// Marketplace event pages, walked one offset page after another
    pub fn events() -> Self {
        Self::default()
            .with_max_concurrent(MARKETPLACE_MAX_CONCURRENT)
            .with_standard_delay(Duration::from_millis(2000))
    }

    /// Token metadata and token homepages
    pub fn tokens() -> Self {
        Self::default()
            .with_max_concurrent(100)
            .with_placeholder_delay(TOKEN_PLACEHOLDER_DELAY)
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_standard_delay(mut self, delay: Duration) -> Self {
        self.standard_delay = delay;
        self
    }

    pub fn with_timeout_delay(mut self, delay: Duration) -> Self {
        self.timeout_delay = delay;
        self
    }

    pub fn with_placeholder_delay(mut self, delay: Duration) -> Self {
        self.placeholder_delay = delay;
        self
    }

    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = Some(budget);
        self
    }
}

/// Partial [`FetchOptions`] from config, laid over a per-source preset
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FetchOverrides {
    pub max_concurrent: Option<usize>,
    pub request_timeout_ms: Option<u64>,
    pub batch_delay_ms: Option<u64>,
    pub standard_delay_ms: Option<u64>,
    pub timeout_delay_ms: Option<u64>,
    pub placeholder_delay_ms: Option<u64>,
    pub retry_budget_ms: Option<u64>,
}

impl FetchOverrides {
    /// `base` with every field set here replaced
    pub fn apply(&self, mut base: FetchOptions) -> FetchOptions {
        if let Some(max_concurrent) = self.max_concurrent {
            base = base.with_max_concurrent(max_concurrent);
        }
        if let Some(ms) = self.request_timeout_ms {
            base.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.batch_delay_ms {
            base.batch_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.standard_delay_ms {
            base.standard_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timeout_delay_ms {
            base.timeout_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.placeholder_delay_ms {
            base.placeholder_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_budget_ms {
            base.retry_budget = Some(Duration::from_millis(ms));
        }
        base
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}
