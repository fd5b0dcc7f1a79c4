// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::path::PathBuf;

/// Errors produced while deriving or applying interleave weights.
///
/// Every variant is fatal to the run. There is no retry and no
/// partial-success mode; in particular a [`IwError::SysfsWrite`] raised
/// mid-application leaves the weights written so far in place.
#[derive(Debug, thiserror::Error)]
pub enum IwError {
    /// Malformed benchmark report text.
    #[error("failed to parse bandwidth report: {0}")]
    Parse(String),

    /// Malformed topology report or literal topology string.
    #[error("invalid topology: {0}")]
    TopologyFormat(String),

    /// The topology does not cover exactly the system's NUMA nodes.
    #[error("topology has {listed} numa nodes but must have {system} nodes")]
    TopologyNodeCount { listed: usize, system: usize },

    /// A package contains no compute-capable node.
    #[error("package {0:?} has no cpu numa nodes")]
    TopologyPackage(Vec<usize>),

    /// A node id appears in more than one place in the topology.
    #[error("numa node {0} listed more than once in topology")]
    DuplicateNode(usize),

    /// A reduced weight vector assigns zero weight to a cpu node.
    #[error("invalid ratio {0}: cpu node without memory is not allowed")]
    InvalidRatio(String),

    /// The process lacks the privilege needed to write kernel policy.
    #[error("root permission required to update interleave weights")]
    Permission,

    /// The kernel does not expose the weighted interleave control tree.
    #[error("weighted interleave sysfs not found at {}", .0.display())]
    UnsupportedKernel(PathBuf),

    /// Writing a weight to a kernel control file failed.
    #[error("failed to write {}: {source}", .path.display())]
    SysfsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an input or kernel-exposed file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
