// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Kernel weighted-interleave sysfs interface.
//!
//! The kernel exposes one control file per NUMA node under
//! `/sys/kernel/mm/interleave_weight/node/node<N>/interleave_weight` plus a
//! `possible` file listing the compute-capable nodes; the system node
//! directories under `/sys/devices/system/node` give the total node count.
//! Both roots are injectable so the whole interface can be exercised against
//! a fixture tree in tests.
//!
//! Writes mutate live kernel policy and are not rolled back: if one write
//! fails the earlier ones in the same run stay applied.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use log::debug;

use crate::misc;
use crate::IwError;
use crate::WeightVector;

/// Default root of the weighted-interleave control tree.
pub const IW_SYSFS_ROOT: &str = "/sys/kernel/mm/interleave_weight";

/// Default directory holding the system's `node<N>` entries.
pub const SYS_NODE_DIR: &str = "/sys/devices/system/node";

/// Handle on the kernel's weighted-interleave interface.
#[derive(Debug, Clone)]
pub struct IwSysfs {
    root: PathBuf,
    sys_node_dir: PathBuf,
}

impl Default for IwSysfs {
    fn default() -> Self {
        Self::new()
    }
}

impl IwSysfs {
    /// Handle using the fixed kernel paths.
    pub fn new() -> IwSysfs {
        Self::with_paths(IW_SYSFS_ROOT, SYS_NODE_DIR)
    }

    /// Handle with injected roots.
    pub fn with_paths<P: AsRef<Path>, Q: AsRef<Path>>(root: P, sys_node_dir: Q) -> IwSysfs {
        IwSysfs {
            root: root.as_ref().to_path_buf(),
            sys_node_dir: sys_node_dir.as_ref().to_path_buf(),
        }
    }

    /// Control file carrying node `node`'s weight vector.
    pub fn weight_path(&self, node: usize) -> PathBuf {
        self.root
            .join("node")
            .join(format!("node{node}"))
            .join("interleave_weight")
    }

    /// Check that the running kernel exposes the control tree at all.
    pub fn verify_supported(&self) -> Result<(), IwError> {
        if !self.weight_path(0).exists() {
            return Err(IwError::UnsupportedKernel(self.root.clone()));
        }
        Ok(())
    }

    /// The compute-capable ("possible") node set. Memory-only nodes are
    /// deliberately absent from this file.
    pub fn possible_nodes(&self) -> Result<BTreeSet<usize>, IwError> {
        let path = self.root.join("possible");
        misc::parse_node_list(&misc::read_file_string(&path)?)
    }

    /// Total NUMA node count, from the `node<N>` entries of the system node
    /// directory.
    pub fn nr_system_nodes(&self) -> Result<usize, IwError> {
        let entries = fs::read_dir(&self.sys_node_dir).map_err(|source| IwError::Io {
            path: self.sys_node_dir.clone(),
            source,
        })?;

        let mut nr_nodes = 0;
        for entry in entries {
            let entry = entry.map_err(|source| IwError::Io {
                path: self.sys_node_dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_prefix("node") {
                if id.chars().all(|c| c.is_ascii_digit()) && !id.is_empty() {
                    nr_nodes += 1;
                }
            }
        }
        Ok(nr_nodes)
    }

    /// Write every vector's ratio string to its node's control file, in the
    /// given order, returning the paths written.
    ///
    /// Stops at the first failed write; prior writes are left in place.
    pub fn apply(&self, vectors: &[WeightVector]) -> Result<Vec<PathBuf>, IwError> {
        let mut updated = Vec::with_capacity(vectors.len());

        for wv in vectors {
            let path = self.weight_path(wv.node());
            let ratio = wv.ratio_string();
            debug!("writing '{}' to {}", ratio, path.display());
            fs::write(&path, &ratio).map_err(|source| IwError::SysfsWrite {
                path: path.clone(),
                source,
            })?;
            updated.push(path);
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::IwSysfs;
    use crate::ratio::weights_for_node;
    use crate::BandwidthMatrix;
    use crate::IwError;
    use std::fs;
    use std::path::Path;

    fn fixture_iw_root(dir: &Path, nodes: &[usize], possible: &str) -> IwSysfs {
        let root = dir.join("interleave_weight");
        for node in nodes {
            fs::create_dir_all(root.join("node").join(format!("node{node}"))).unwrap();
            fs::write(
                root.join("node").join(format!("node{node}")).join("interleave_weight"),
                "",
            )
            .unwrap();
        }
        fs::write(root.join("possible"), possible).unwrap();
        IwSysfs::with_paths(root, dir.join("node"))
    }

    fn vectors(report_rows: &str, nr_nodes: usize, sources: &[usize]) -> Vec<crate::WeightVector> {
        let report = format!("Numa node\n{report_rows}");
        let matrix = BandwidthMatrix::parse(&report, nr_nodes).unwrap();
        sources
            .iter()
            .map(|&nid| weights_for_node(&matrix, None, nid, 10))
            .collect()
    }

    #[test]
    fn test_possible_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let sysfs = fixture_iw_root(dir.path(), &[0], "0-1,3\n");
        let possible = sysfs.possible_nodes().unwrap();
        assert_eq!(possible.into_iter().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn test_nr_system_nodes_ignores_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let node_dir = dir.path().join("node");
        for name in ["node0", "node1", "has_cpu", "possible", "nodelist"] {
            fs::create_dir_all(node_dir.join(name)).unwrap();
        }
        let sysfs = IwSysfs::with_paths(dir.path().join("iw"), &node_dir);
        assert_eq!(sysfs.nr_system_nodes().unwrap(), 2);
    }

    #[test]
    fn test_verify_supported() {
        let dir = tempfile::tempdir().unwrap();
        let sysfs = IwSysfs::with_paths(dir.path().join("missing"), dir.path());
        assert!(matches!(
            sysfs.verify_supported(),
            Err(IwError::UnsupportedKernel(_))
        ));

        let sysfs = fixture_iw_root(dir.path(), &[0], "0\n");
        assert!(sysfs.verify_supported().is_ok());
    }

    #[test]
    fn test_apply_writes_ratio_strings() {
        let dir = tempfile::tempdir().unwrap();
        let sysfs = fixture_iw_root(dir.path(), &[0, 1], "0,1\n");

        let vectors = vectors("0 100 50\n1 50 100\n", 2, &[0, 1]);
        let updated = sysfs.apply(&vectors).unwrap();

        assert_eq!(updated, vec![sysfs.weight_path(0), sysfs.weight_path(1)]);
        assert_eq!(fs::read_to_string(sysfs.weight_path(0)).unwrap(), "0*2,1*1");
        assert_eq!(fs::read_to_string(sysfs.weight_path(1)).unwrap(), "0*1,1*2");
    }

    #[test]
    fn test_apply_failure_keeps_prior_writes() {
        let dir = tempfile::tempdir().unwrap();
        // Only node0 has a control file; writing node1 must fail.
        let sysfs = fixture_iw_root(dir.path(), &[0], "0,1\n");

        let vectors = vectors("0 100 50\n1 50 100\n", 2, &[0, 1]);
        let err = sysfs.apply(&vectors).unwrap_err();

        match err {
            IwError::SysfsWrite { path, .. } => assert_eq!(path, sysfs.weight_path(1)),
            other => panic!("unexpected error {other:?}"),
        }
        // The first write is not rolled back.
        assert_eq!(fs::read_to_string(sysfs.weight_path(0)).unwrap(), "0*2,1*1");
    }
}
