// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Bandwidth benchmark report parsing.
//!
//! Inter-node bandwidth benchmarks print a banner, a header block marked by
//! the substring `"Numa node"`, and then one row per source node:
//!
//! ```text
//!                 Numa node
//! Numa node            0       1
//!        0        84654.4 30499.5
//!        1        30470.9 84963.1
//! ```
//!
//! A `-` entry means the pair could not be measured and counts as zero.

use crate::IwError;

const HEADER_MARKER: &str = "Numa node";

/// An immutable square matrix of inter-node bandwidth, `[source][target]`.
///
/// N equals the system's total NUMA node count; rows the report does not
/// mention stay all-zero. Values are truncated to whole MB/s at parse time
/// since the ratio pipeline only works on integral bandwidth.
#[derive(Debug, Clone)]
pub struct BandwidthMatrix {
    rows: Vec<Vec<f64>>,
}

impl BandwidthMatrix {
    /// Parse a benchmark report into an `nr_nodes` x `nr_nodes` matrix.
    pub fn parse(report: &str, nr_nodes: usize) -> Result<BandwidthMatrix, IwError> {
        let mut lines = report.lines();

        // Everything up to and including the header block is banner text.
        let mut header_found = false;
        let mut first_row = None;
        for line in lines.by_ref() {
            if line.contains(HEADER_MARKER) {
                header_found = true;
            } else if header_found {
                first_row = Some(line);
                break;
            }
        }
        if !header_found {
            return Err(IwError::Parse(format!(
                "no '{HEADER_MARKER}' header found in report"
            )));
        }

        let mut rows = vec![vec![0.0; nr_nodes]; nr_nodes];
        for line in first_row.into_iter().chain(lines) {
            if line.trim().is_empty() {
                continue;
            }
            let (source, values) = Self::parse_row(line, nr_nodes)?;
            rows[source] = values;
        }

        Ok(BandwidthMatrix { rows })
    }

    fn parse_row(line: &str, nr_nodes: usize) -> Result<(usize, Vec<f64>), IwError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != nr_nodes + 1 {
            return Err(IwError::Parse(format!(
                "row '{}' has {} columns, expected {}",
                line.trim(),
                fields.len().saturating_sub(1),
                nr_nodes
            )));
        }

        let source = fields[0]
            .parse::<usize>()
            .map_err(|_| IwError::Parse(format!("invalid row index '{}'", fields[0])))?;
        if source >= nr_nodes {
            return Err(IwError::Parse(format!(
                "row index {source} out of range, system has {nr_nodes} nodes"
            )));
        }

        let mut values = Vec::with_capacity(nr_nodes);
        for field in &fields[1..] {
            let val = match *field {
                "-" => 0.0,
                s => s
                    .parse::<f64>()
                    .map_err(|_| IwError::Parse(format!("invalid bandwidth value '{s}'")))?,
            };
            if val < 0.0 {
                return Err(IwError::Parse(format!("negative bandwidth value '{field}'")));
            }
            values.push(val.trunc());
        }

        Ok((source, values))
    }

    /// Number of NUMA nodes the matrix covers.
    pub fn nr_nodes(&self) -> usize {
        self.rows.len()
    }

    /// Bandwidth from `source` to every target node.
    pub fn row(&self, source: usize) -> &[f64] {
        &self.rows[source]
    }
}
