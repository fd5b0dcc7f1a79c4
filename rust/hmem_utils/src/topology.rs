// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! NUMA node to physical package mapping.
//!
//! Weight vectors only make sense within one package: interleaving a
//! package's allocations over another socket's memory would route every
//! access across the inter-socket link. The [`Topology`] answers "which
//! package does node N belong to" and is built from one of two inputs:
//!
//! - a hierarchical topology report (`lstopo-no-graphics -p` output), where
//!   nesting under a `Package` line determines membership and a top-level
//!   `NUMANode` line is a memory-only node with no package;
//! - a literal nested-list string like `"[[0,2],[1,3]]"` supplied by the
//!   operator, one inner list per package.
//!
//! A Topology is immutable once built and is rebuilt fresh per invocation.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::IwError;

lazy_static! {
    // Exact indentation is load bearing: a package sits at depth one, its
    // nodes at depth two or three depending on whether caches are folded in,
    // and a memory-only node shares depth one with packages.
    static ref RE_PACKAGE: Regex = Regex::new(r"^  Package P#(\d+)").unwrap();
    static ref RE_NODE: Regex = Regex::new(r"^    NUMANode P#(\d+)").unwrap();
    static ref RE_NODE_DEEP: Regex = Regex::new(r"^      NUMANode P#(\d+)").unwrap();
    static ref RE_NODE_MEMONLY: Regex = Regex::new(r"^  NUMANode P#(\d+)").unwrap();
}

/// Immutable node-to-package mapping covering every system NUMA node.
///
/// Memory-only nodes carry no package assignment in report mode.
#[derive(Debug, Clone)]
pub struct Topology {
    packages: BTreeMap<usize, Option<usize>>,
}

impl Topology {
    /// Build a Topology from a hierarchical topology report.
    ///
    /// `nr_nodes` is the system's total NUMA node count; the report must
    /// mention every node id below it exactly once.
    pub fn from_report(report: &str, nr_nodes: usize) -> Result<Topology, IwError> {
        let mut packages: BTreeMap<usize, Option<usize>> = BTreeMap::new();
        let mut current_package = None;

        for line in report.lines() {
            if line.contains("Package") {
                let caps = RE_PACKAGE
                    .captures(line)
                    .ok_or_else(|| IwError::TopologyFormat(format!("bad package line '{line}'")))?;
                current_package = Some(capture_id(&caps, line)?);
            } else if line.contains("NUMANode") {
                let (node, package) = if let Some(caps) =
                    RE_NODE.captures(line).or_else(|| RE_NODE_DEEP.captures(line))
                {
                    (capture_id(&caps, line)?, current_package)
                } else if let Some(caps) = RE_NODE_MEMONLY.captures(line) {
                    (capture_id(&caps, line)?, None)
                } else {
                    return Err(IwError::TopologyFormat(format!("bad node line '{line}'")));
                };
                if packages.insert(node, package).is_some() {
                    return Err(IwError::DuplicateNode(node));
                }
            }
        }

        verify_node_coverage(&packages, nr_nodes)?;
        Ok(Topology { packages })
    }

    /// Build a Topology from a literal nested-list string.
    ///
    /// Exactly one level of nesting is allowed; each inner list is one
    /// package and must contain at least one node from the compute-capable
    /// set `possible`.
    pub fn from_literal(
        literal: &str,
        nr_nodes: usize,
        possible: &BTreeSet<usize>,
    ) -> Result<Topology, IwError> {
        let package_lists = LiteralParser::new(literal).parse()?;

        let mut packages: BTreeMap<usize, Option<usize>> = BTreeMap::new();
        for (package, nodes) in package_lists.iter().enumerate() {
            if !nodes.iter().any(|nid| possible.contains(nid)) {
                return Err(IwError::TopologyPackage(nodes.clone()));
            }
            for &nid in nodes {
                if packages.insert(nid, Some(package)).is_some() {
                    return Err(IwError::DuplicateNode(nid));
                }
            }
        }

        verify_node_coverage(&packages, nr_nodes)?;
        Ok(Topology { packages })
    }

    /// The package `node` belongs to, or None for a memory-only node.
    pub fn package_of(&self, node: usize) -> Option<usize> {
        self.packages.get(&node).copied().flatten()
    }

    /// Whether `a` and `b` share a package. Two packageless (memory-only)
    /// nodes count as sharing.
    pub fn same_package(&self, a: usize, b: usize) -> bool {
        self.packages.get(&a) == self.packages.get(&b)
    }
}

fn capture_id(caps: &regex::Captures, line: &str) -> Result<usize, IwError> {
    caps[1]
        .parse::<usize>()
        .map_err(|_| IwError::TopologyFormat(format!("bad id in '{line}'")))
}

fn verify_node_coverage(
    packages: &BTreeMap<usize, Option<usize>>,
    nr_nodes: usize,
) -> Result<(), IwError> {
    if packages.len() != nr_nodes || packages.keys().any(|&nid| nid >= nr_nodes) {
        return Err(IwError::TopologyNodeCount {
            listed: packages.len(),
            system: nr_nodes,
        });
    }
    Ok(())
}

/// Recursive-descent scanner for the literal topology syntax.
///
/// The grammar is deliberately rigid so the nesting-depth-of-exactly-one
/// invariant stays explicit: `topology := '[' package (',' package)* ']'`,
/// `package := '[' id (',' id)* ']'`. Whitespace is allowed between tokens.
struct LiteralParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        LiteralParser { input, pos: 0 }
    }

    fn parse(mut self) -> Result<Vec<Vec<usize>>, IwError> {
        self.expect('[')?;

        let mut packages = vec![self.parse_package()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    packages.push(self.parse_package()?);
                }
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                _ => return self.fail("expected ',' or ']'"),
            }
        }

        self.skip_whitespace();
        if self.pos != self.input.len() {
            return self.fail("trailing characters after topology");
        }
        Ok(packages)
    }

    fn parse_package(&mut self) -> Result<Vec<usize>, IwError> {
        self.expect('[')?;

        let mut nodes = vec![self.parse_id()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    nodes.push(self.parse_id()?);
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok(nodes);
                }
                Some('[') => return self.fail("nesting deeper than one level"),
                _ => return self.fail("expected ',' or ']'"),
            }
        }
    }

    fn parse_id(&mut self) -> Result<usize, IwError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return self.fail("expected a node id");
        }
        self.input[start..self.pos]
            .parse::<usize>()
            .map_err(|_| IwError::TopologyFormat(format!("bad node id in '{}'", self.input)))
    }

    fn expect(&mut self, c: char) -> Result<(), IwError> {
        self.skip_whitespace();
        if self.peek() != Some(c) {
            return self.fail(&format!("expected '{c}'"));
        }
        self.pos += 1;
        Ok(())
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn fail<T>(&self, what: &str) -> Result<T, IwError> {
        Err(IwError::TopologyFormat(format!(
            "{} at offset {} in '{}'",
            what, self.pos, self.input
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::Topology;
    use crate::IwError;
    use std::collections::BTreeSet;

    const REPORT: &str = "\
Machine (251GB total)
  Package P#0
    NUMANode P#0 (62GB)
    L3 P#0 (37MB)
  Package P#1
      NUMANode P#1 (62GB)
  NUMANode P#2 (64GB)
";

    #[test]
    fn test_report_mode() {
        let topo = Topology::from_report(REPORT, 3).unwrap();
        assert_eq!(topo.package_of(0), Some(0));
        assert_eq!(topo.package_of(1), Some(1));
        assert_eq!(topo.package_of(2), None);
        assert!(!topo.same_package(0, 1));
        assert!(!topo.same_package(0, 2));
    }

    #[test]
    fn test_report_mode_incomplete_coverage() {
        assert!(matches!(
            Topology::from_report(REPORT, 4),
            Err(IwError::TopologyNodeCount {
                listed: 3,
                system: 4
            })
        ));
    }

    #[test]
    fn test_report_mode_bad_node_line() {
        // Wrong indentation depth for a node under a package.
        let report = "  Package P#0\n        NUMANode P#0\n";
        assert!(matches!(
            Topology::from_report(report, 1),
            Err(IwError::TopologyFormat(_))
        ));
    }

    #[test]
    fn test_report_mode_duplicate_node() {
        let report = "  Package P#0\n    NUMANode P#0\n    NUMANode P#0\n";
        assert!(matches!(
            Topology::from_report(report, 1),
            Err(IwError::DuplicateNode(0))
        ));
    }

    fn possible(ids: &[usize]) -> BTreeSet<usize> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_literal_mode() {
        let topo = Topology::from_literal("[[0,2],[1,3]]", 4, &possible(&[0, 1])).unwrap();
        assert_eq!(topo.package_of(0), Some(0));
        assert_eq!(topo.package_of(2), Some(0));
        assert_eq!(topo.package_of(1), Some(1));
        assert_eq!(topo.package_of(3), Some(1));
        assert!(topo.same_package(0, 2));
        assert!(!topo.same_package(0, 3));
    }

    #[test]
    fn test_literal_mode_whitespace() {
        let topo = Topology::from_literal(" [ [0, 2], [1, 3] ] ", 4, &possible(&[0, 1])).unwrap();
        assert_eq!(topo.package_of(3), Some(1));
    }

    #[test]
    fn test_literal_duplicate_node() {
        assert!(matches!(
            Topology::from_literal("[[0,1],[1,2]]", 3, &possible(&[0, 1])),
            Err(IwError::DuplicateNode(1))
        ));
    }

    #[test]
    fn test_literal_node_count_mismatch() {
        assert!(matches!(
            Topology::from_literal("[[0,2],[1,3]]", 6, &possible(&[0, 1])),
            Err(IwError::TopologyNodeCount {
                listed: 4,
                system: 6
            })
        ));
    }

    #[test]
    fn test_literal_package_without_cpu_node() {
        // Only node 0 is compute-capable, so package [3] has no cpu node.
        let err = Topology::from_literal("[[0,2,1],[3]]", 4, &possible(&[0])).unwrap_err();
        assert!(matches!(err, IwError::TopologyPackage(ref nodes) if nodes == &vec![3]));
    }

    #[test]
    fn test_literal_rejects_bad_nesting() {
        for bad in [
            "[[0,[1]]]", // depth two
            "[0,1]",     // depth zero
            "[[0,1]",    // unbalanced
            "[[0,1]]]",  // trailing bracket
            "[[]]",      // empty package
            "[[0];[1]]", // bad separator
            "[[0,1]] x", // trailing garbage
        ] {
            assert!(
                matches!(
                    Topology::from_literal(bad, 2, &possible(&[0, 1])),
                    Err(IwError::TopologyFormat(_))
                ),
                "expected format error for '{bad}'"
            );
        }
    }
}
