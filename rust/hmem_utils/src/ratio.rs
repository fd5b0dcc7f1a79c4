// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Bandwidth row to interleave weight reduction.
//!
//! Raw bandwidth numbers are tens of thousands of MB/s; the kernel wants
//! small integer weights. [`reduce`] repeatedly halves a row until its
//! largest entry drops to the configured soft-max bound, then rounds and
//! divides out the GCD. The bound is "soft" because halving stops early
//! whenever another step would push some node's nonzero share to one or
//! below, where rounding could erase it entirely; in that case the final
//! weights may exceed the bound.
//!
//! [`weights_for_node`] wraps the reduction for one source node, first
//! restricting its row to the targets in the same physical package when the
//! topology is known.

use std::collections::BTreeSet;

use num::integer::gcd;
use serde::Serialize;

use crate::BandwidthMatrix;
use crate::IwError;
use crate::Topology;

/// Default upper bound the reduction drives the largest weight toward.
pub const DEFAULT_SOFT_MAX_RATIO: u64 = 10;

/// Reduce one bandwidth row to an integer weight vector.
///
/// Pure: identical `(row, soft_max)` inputs produce identical outputs.
pub fn reduce(row: &[f64], soft_max: u64) -> Vec<u64> {
    let mut vals = row.to_vec();

    loop {
        let max = vals.iter().cloned().fold(0.0, f64::max);
        if max <= soft_max as f64 {
            break;
        }
        let halved: Vec<f64> = vals.iter().map(|v| v / 2.0).collect();
        // The whole step is discarded, not just the offending entry.
        if halved.iter().any(|&v| v != 0.0 && v <= 1.0) {
            break;
        }
        vals = halved;
    }

    let rounded: Vec<u64> = vals.iter().map(|v| v.round() as u64).collect();
    let common = rounded.iter().fold(0, |acc, &v| gcd(acc, v));
    if common != 0 {
        rounded.iter().map(|v| v / common).collect()
    } else {
        rounded
    }
}

/// One target node's share of a source node's interleave weight.
#[derive(Debug, Clone, Serialize)]
pub struct TargetWeight {
    target: usize,
    weight: u64,
}

impl TargetWeight {
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }
}

/// The reduced weight vector for one source compute node: ordered
/// `(target node, weight)` pairs restricted to the source's package when the
/// topology is known.
#[derive(Debug, Clone, Serialize)]
pub struct WeightVector {
    node: usize,
    weights: Vec<TargetWeight>,
}

impl WeightVector {
    /// The source compute node this vector applies to.
    pub fn node(&self) -> usize {
        self.node
    }

    pub fn weights(&self) -> &[TargetWeight] {
        &self.weights
    }

    /// The kernel interface format: `"<target>*<weight>,..."`.
    pub fn ratio_string(&self) -> String {
        self.weights
            .iter()
            .map(|tw| format!("{}*{}", tw.target, tw.weight))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Reject a vector that starves a cpu node: a compute-capable target
    /// must never receive zero effective memory bandwidth share.
    pub fn validate(&self, possible: &BTreeSet<usize>) -> Result<(), IwError> {
        for tw in &self.weights {
            if tw.weight == 0 && possible.contains(&tw.target) {
                return Err(IwError::InvalidRatio(self.ratio_string()));
            }
        }
        Ok(())
    }
}

/// Compute the weight vector for source node `node`.
///
/// With a known topology the bandwidth row is restricted to targets sharing
/// `node`'s package before reduction; without one the full row is used.
pub fn weights_for_node(
    matrix: &BandwidthMatrix,
    topology: Option<&Topology>,
    node: usize,
    soft_max: u64,
) -> WeightVector {
    let row = matrix.row(node);

    let targets: Vec<usize> = match topology {
        Some(topo) => (0..row.len())
            .filter(|&i| topo.same_package(i, node))
            .collect(),
        None => (0..row.len()).collect(),
    };
    let restricted: Vec<f64> = targets.iter().map(|&i| row[i]).collect();

    let weights = reduce(&restricted, soft_max)
        .into_iter()
        .zip(targets)
        .map(|(weight, target)| TargetWeight { target, weight })
        .collect();

    WeightVector { node, weights }
}
