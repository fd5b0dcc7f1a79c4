use std::path::PathBuf;

use clap::Parser;
use hmem_utils::DEFAULT_SOFT_MAX_RATIO;

/// bwactl: derive per-node weighted interleave ratios from a measured
/// inter-node bandwidth matrix and apply them to the kernel.
///
/// By default the bandwidth matrix is measured live with
/// `mlc --bandwidth_matrix -W2` and the package topology is discovered with
/// `lstopo-no-graphics -p`; both can be substituted with pre-recorded files,
/// and the topology can be overridden with a literal nested list.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Opts {
    /// Read the mlc bandwidth report from FILE instead of running mlc
    #[arg(long, value_name = "FILE")]
    pub mlc_file: Option<PathBuf>,

    /// Read the lstopo report from FILE instead of running lstopo
    #[arg(long, value_name = "FILE")]
    pub lstopo_file: Option<PathBuf>,

    /// Topology override as nested lists of node ids, e.g. "[[0,2],[1,3]]"
    #[arg(long, value_name = "TOPOLOGY")]
    pub topology: Option<String>,

    /// Upper bound the reduction drives the largest weight toward
    #[arg(long, default_value_t = DEFAULT_SOFT_MAX_RATIO, value_name = "N")]
    pub soft_max: u64,

    /// Write the computed weights as a JSON config to FILE instead of
    /// applying them to sysfs
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose output, including debug. Specify multiple times to
    /// increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
