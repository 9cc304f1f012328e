//! Scripted transport for tests
//!
//! Built with `cfg(test)` or the `test-util` feature, so crates depending on
//! the fetch layer can drive the engine without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::{FetchResponse, HttpTransport};

/// In-memory transport replaying scripted responses.
///
/// Each route holds a queue of responses; the last one repeats. A route key
/// matches a URI exactly or as its longest prefix. Unrouted URIs get the
/// fallback response (404 by default).
#[derive(Debug)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<FetchResponse>>>,
    fallback: FetchResponse,
    latency: Duration,
    log: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            fallback: FetchResponse::http(404, ""),
            latency: Duration::from_millis(10),
            log: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_fallback(mut self, response: FetchResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Queue responses for a route
    pub fn script(&self, route: &str, responses: Vec<FetchResponse>) {
        self.routes
            .lock()
            .entry(route.to_string())
            .or_default()
            .extend(responses);
    }

    /// Every requested URI, in request order
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().iter().map(|(uri, _)| uri.clone()).collect()
    }

    /// Times at which `uri` was requested
    pub fn request_times(&self, uri: &str) -> Vec<Instant> {
        self.log
            .lock()
            .iter()
            .filter(|(u, _)| u == uri)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Highest number of simultaneous requests seen
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_response(&self, uri: &str) -> FetchResponse {
        let mut routes = self.routes.lock();
        let key = if routes.contains_key(uri) {
            Some(uri.to_string())
        } else {
            routes
                .keys()
                .filter(|route| uri.starts_with(route.as_str()))
                .max_by_key(|route| route.len())
                .cloned()
        };

        let queue = match key {
            Some(k) => routes.get_mut(&k),
            None => None,
        };
        let Some(queue) = queue else {
            return self.fallback.clone();
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| self.fallback.clone())
        } else {
            queue.front().cloned().unwrap_or_else(|| self.fallback.clone())
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, uri: &str, _timeout: Duration) -> FetchResponse {
        self.log.lock().push((uri.to_string(), Instant::now()));
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        trace!("Scripted GET {} ({} active)", uri, active);

        tokio::time::sleep(self.latency).await;
        let response = self.next_response(uri);

        self.active.fetch_sub(1, Ordering::SeqCst);
        response
    }
}
