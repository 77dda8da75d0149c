// src/engine/placement.rs

//! Placement hints: which hosts a ready node should be queued on, given where
//! its prerequisites' artifacts live.

use std::collections::HashMap;
use std::fmt;

use crate::types::{Host, PlacementStrategy};

/// Location and size of one prerequisite's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocation {
    pub hosts: Vec<Host>,
    pub size: u64,
}

impl DataLocation {
    pub fn new<S: Into<Host>>(hosts: impl IntoIterator<Item = S>, size: u64) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            size,
        }
    }
}

/// Turns prerequisite locations into the `hints` given to the ready queue.
/// Inputs are in prerequisite order; an empty result means "anywhere".
pub trait PlacementHints: Send + Sync + fmt::Debug {
    fn derive(&self, inputs: &[DataLocation]) -> Vec<Host>;
}

/// Hosts holding a majority of the input data.
///
/// Sums each host's contributed size across all inputs and keeps hosts whose
/// total is strictly greater than half of the best host's total. The result
/// is ordered by total (descending), then host name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityData;

impl PlacementHints for MajorityData {
    fn derive(&self, inputs: &[DataLocation]) -> Vec<Host> {
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for input in inputs {
            for host in &input.hosts {
                let total = totals.entry(host.as_str()).or_default();
                *total = total.saturating_add(input.size);
            }
        }
        let Some(&max) = totals.values().max() else {
            return Vec::new();
        };

        let mut selected: Vec<(&str, u64)> = totals
            .into_iter()
            .filter(|&(_, total)| total > 0 && u128::from(total) * 2 > u128::from(max))
            .collect();
        selected.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        selected.into_iter().map(|(h, _)| h.to_string()).collect()
    }
}

/// Wherever the first prerequisite's artifact lives.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPrerequisite;

impl PlacementHints for FirstPrerequisite {
    fn derive(&self, inputs: &[DataLocation]) -> Vec<Host> {
        inputs.first().map(|d| d.hosts.clone()).unwrap_or_default()
    }
}

pub fn for_strategy(strategy: PlacementStrategy) -> Box<dyn PlacementHints> {
    match strategy {
        PlacementStrategy::Majority => Box::new(MajorityData),
        PlacementStrategy::FirstPrerequisite => Box::new(FirstPrerequisite),
    }
}
