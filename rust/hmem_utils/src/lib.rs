// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Utility collection for heterogeneous-memory interleave tooling
//!
//! Heterogeneous-memory servers mix local DRAM with slower but
//! bandwidth-additive memory tiers such as CXL-attached DIMMs. The kernel's
//! weighted interleave policy can spread page allocations across such tiers
//! proportionally to per-node integer weights, but somebody has to derive
//! sensible weights from what the hardware can actually sustain.
//!
//! This crate is that somebody. It turns a measured inter-node bandwidth
//! matrix and the machine's package/NUMA topology into small integer weight
//! vectors and applies them to the kernel's weighted-interleave sysfs
//! interface. The pieces are usable on their own:
//!
//! - [`BandwidthMatrix`] parses a bandwidth benchmark report into an N x N
//!   matrix.
//! - [`Topology`] maps NUMA nodes to physical packages, built either from a
//!   hierarchical topology report or from a literal nested-list string such
//!   as `"[[0,2],[1,3]]"`.
//! - [`ratio`] reduces one bandwidth row to a bounded weight vector.
//! - [`IwSysfs`] reads the kernel's node facts and writes the final weights.
//!
//! All entities are built once per invocation and are read-only afterwards;
//! the only durable side effect anywhere is the sysfs write.

mod errors;
pub use errors::IwError;

pub mod misc;

mod bandwidth;
pub use bandwidth::BandwidthMatrix;

mod topology;
pub use topology::Topology;

pub mod ratio;
pub use ratio::WeightVector;
pub use ratio::DEFAULT_SOFT_MAX_RATIO;

mod sysfs;
pub use sysfs::IwSysfs;
