// src/config/hosts.rs

//! Worker host layout.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::{HostdagError, Result};
use crate::types::Host;

pub const LOCALHOST: &str = "localhost";

/// Hosts known to the scheduler and the host each worker is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// One entry per worker. Hosts are interleaved so that the first workers
    /// land on different hosts.
    pub core_list: Vec<Host>,
    /// Distinct hosts in hostfile order.
    pub hosts: Vec<Host>,
    /// Hosts per group number from the hostfile's third column.
    pub groups: Vec<Vec<Host>>,
}

impl Cluster {
    /// `num_threads` workers, all on `localhost`.
    pub fn local(num_threads: usize) -> Self {
        let n = num_threads.max(1);
        Self {
            core_list: vec![LOCALHOST.to_string(); n],
            hosts: vec![LOCALHOST.to_string()],
            groups: vec![vec![LOCALHOST.to_string()]],
        }
    }

    /// Resolve the layout from an optional hostfile or worker count.
    pub fn from_options(hostfile: Option<&Path>, num_threads: Option<usize>) -> Result<Self> {
        match (hostfile, num_threads) {
            (Some(_), Some(_)) => Err(HostdagError::ConfigError(
                "cannot set `hostfile` and `num_threads` simultaneously".to_string(),
            )),
            (Some(path), None) => Self::load_hostfile(path),
            (None, n) => Ok(Self::local(n.unwrap_or(1))),
        }
    }

    pub fn load_hostfile(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let cluster = Self::parse_hostfile(&contents)?;
        debug!(path = ?path, hosts = ?cluster.hosts, workers = cluster.core_list.len(), "loaded hostfile");
        Ok(cluster)
    }

    /// Parse `host [ncore [group]]` lines; `#` starts a comment.
    pub fn parse_hostfile(contents: &str) -> Result<Self> {
        let mut slots: Vec<(Host, usize)> = Vec::new();
        let mut hosts: Vec<Host> = Vec::new();
        let mut groups: Vec<Vec<Host>> = Vec::new();

        for (lineno, raw) in contents.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("");
            let mut fields = line.split_whitespace();
            let Some(host) = fields.next() else {
                continue;
            };
            let ncore = parse_field(fields.next(), 1, "ncore", lineno)?;
            let group = parse_field(fields.next(), 0, "group", lineno)?;
            if ncore == 0 {
                return Err(HostdagError::ConfigError(format!(
                    "hostfile line {}: ncore must be >= 1",
                    lineno + 1
                )));
            }

            slots.push((host.to_string(), ncore));
            if !hosts.iter().any(|h| h == host) {
                hosts.push(host.to_string());
            }
            if groups.len() <= group {
                groups.resize(group + 1, Vec::new());
            }
            groups[group].push(host.to_string());
        }

        if slots.is_empty() {
            return Err(HostdagError::ConfigError(
                "hostfile lists no hosts".to_string(),
            ));
        }

        // Round-robin: one core from each host per pass.
        let mut core_list = Vec::new();
        loop {
            let mut took = false;
            for (host, left) in slots.iter_mut() {
                if *left > 0 {
                    core_list.push(host.clone());
                    *left -= 1;
                    took = true;
                }
            }
            if !took {
                break;
            }
        }

        Ok(Self {
            core_list,
            hosts,
            groups,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.core_list.len()
    }
}

fn parse_field(field: Option<&str>, default: usize, what: &str, lineno: usize) -> Result<usize> {
    match field {
        None => Ok(default),
        Some(s) => s.parse().map_err(|_| {
            HostdagError::ConfigError(format!(
                "hostfile line {}: invalid {what} '{s}'",
                lineno + 1
            ))
        }),
    }
}
