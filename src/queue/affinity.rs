// src/queue/affinity.rs

//! Host-to-host throughput model used to score locality.
//!
//! Scores live in `(0, 1]`. Explicit scores may be given for host pairs or
//! for domain pairs; everything else is derived from the host names:
//!
//! - identical hosts score `1`
//! - an explicit host pair (either direction) wins
//! - otherwise both names are split into `short.domain`, and an explicit
//!   domain pair wins, then same-domain pairs score [`NEAR_SCORE`] and
//!   cross-domain pairs [`FAR_SCORE`]
//! - a query with no source host scores the minimum explicit value (or `1`
//!   if nothing was supplied)
//!
//! The table is immutable after construction; reverse pairs are mirrored
//! up front instead of being cached lazily.

use std::collections::HashMap;

use crate::config::model::AffinityEntry;
use crate::errors::{HostdagError, Result};
use crate::types::Host;

pub const NEAR_SCORE: f64 = 1.0;
pub const FAR_SCORE: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct AffinityTable {
    pairs: HashMap<(String, String), f64>,
    min_value: f64,
}

impl Default for AffinityTable {
    fn default() -> Self {
        Self {
            pairs: HashMap::new(),
            min_value: 1.0,
        }
    }
}

impl AffinityTable {
    /// Build from explicit `(a, b, score)` triples. Names may be hosts or
    /// domains; both are looked up in the same table.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S, f64)>,
        S: Into<String>,
    {
        let mut pairs = HashMap::new();
        let mut min_value: Option<f64> = None;

        for (a, b, score) in entries {
            let (a, b) = (a.into(), b.into());
            if !(score > 0.0 && score <= 1.0) {
                return Err(HostdagError::ConfigError(format!(
                    "affinity score for ({a}, {b}) must be in (0, 1] (got {score})"
                )));
            }
            min_value = Some(min_value.map_or(score, |m: f64| m.min(score)));
            pairs.insert((b.clone(), a.clone()), score);
            pairs.insert((a, b), score);
        }

        Ok(Self {
            pairs,
            min_value: min_value.unwrap_or(1.0),
        })
    }

    pub fn from_config(entries: &[AffinityEntry]) -> Result<Self> {
        Self::new(entries.iter().map(|e| (e.a.as_str(), e.b.as_str(), e.score)))
    }

    /// Smallest explicitly supplied score (`1` if none).
    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    /// Score between two hosts. `from = None` stands for "no host", e.g.
    /// work that is not bound anywhere yet.
    pub fn score(&self, from: Option<&str>, to: &str) -> f64 {
        let Some(from) = from else {
            return self.min_value;
        };
        if from == to {
            return 1.0;
        }
        if let Some(v) = self.lookup(from, to) {
            return v;
        }
        let (_, from_domain) = split_hostname(from);
        let (_, to_domain) = split_hostname(to);
        self.interdomain(from_domain, to_domain)
    }

    fn interdomain(&self, x: &str, y: &str) -> f64 {
        if let Some(v) = self.lookup(x, y) {
            return v;
        }
        if x == y { NEAR_SCORE } else { FAR_SCORE }
    }

    fn lookup(&self, x: &str, y: &str) -> Option<f64> {
        self.pairs.get(&(x.to_string(), y.to_string())).copied()
    }

    /// Order `hosts` by descending score against `origin`; ties keep the
    /// input order.
    pub fn rank<'a>(&self, origin: Option<&str>, hosts: &'a [Host]) -> Vec<&'a Host> {
        let mut ranked: Vec<(f64, &Host)> = hosts
            .iter()
            .map(|h| (self.score(origin, h), h))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().map(|(_, h)| h).collect()
    }
}

/// Split `"node1.rack.example"` into `("node1", "rack.example")`.
pub fn split_hostname(host: &str) -> (&str, &str) {
    host.split_once('.').unwrap_or((host, ""))
}
