//! Per-run fetch counters
//!
//! The engine itself never fails; classifiers record what happened here.

use serde::{Deserialize, Serialize};

/// Counters accumulated by classifiers over one or more runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchStats {
    pub ok: usize,
    pub skipped: usize,
    pub timeouts: usize,
    pub not_found: usize,
    pub rate_limited: usize,
    pub server_errors: usize,
    pub malformed: usize,
    pub placeholders: usize,
    pub unknown_status: usize,
    pub no_request: usize,
    pub expired: usize,
    pub retries: usize,
}

impl FetchStats {
    /// Add another run's counters
    pub fn merge(&mut self, other: &FetchStats) {
        self.ok += other.ok;
        self.skipped += other.skipped;
        self.timeouts += other.timeouts;
        self.not_found += other.not_found;
        self.rate_limited += other.rate_limited;
        self.server_errors += other.server_errors;
        self.malformed += other.malformed;
        self.placeholders += other.placeholders;
        self.unknown_status += other.unknown_status;
        self.no_request += other.no_request;
        self.expired += other.expired;
        self.retries += other.retries;
    }

    /// Items that reached a terminal outcome
    pub fn finished(&self) -> usize {
        self.ok + self.skipped
    }
}

impl std::fmt::Display for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ok={} skipped={} retries={} timeouts={} 404={} 429={} 5xx={} malformed={} placeholders={} expired={}",
            self.ok,
            self.skipped,
            self.retries,
            self.timeouts,
            self.not_found,
            self.rate_limited,
            self.server_errors,
            self.malformed,
            self.placeholders,
            self.expired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut a = FetchStats {
            ok: 2,
            retries: 1,
            ..Default::default()
        };
        let b = FetchStats {
            ok: 1,
            skipped: 3,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.ok, 3);
        assert_eq!(a.finished(), 6);
        assert!(a.to_string().starts_with("ok=3 skipped=3"));
    }
}
