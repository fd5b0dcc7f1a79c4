// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::collections::BTreeSet;
use std::path::Path;

use crate::IwError;

/// Read a file to a string, tagging failures with the path.
pub fn read_file_string(path: &Path) -> Result<String, IwError> {
    std::fs::read_to_string(path).map_err(|source| IwError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a kernel-style node list: comma-separated ids and `a-b` ranges.
///
/// `"0-1,3"` parses to `{0, 1, 3}`.
pub fn parse_node_list(list: &str) -> Result<BTreeSet<usize>, IwError> {
    let mut nodes = BTreeSet::new();

    for group in list.trim().split(',') {
        let group = group.trim();
        if let Some((lo, hi)) = group.split_once('-') {
            let lo = parse_node_id(lo)?;
            let hi = parse_node_id(hi)?;
            if lo > hi {
                return Err(IwError::Parse(format!("invalid node range '{group}'")));
            }
            nodes.extend(lo..=hi);
        } else {
            nodes.insert(parse_node_id(group)?);
        }
    }

    Ok(nodes)
}

fn parse_node_id(s: &str) -> Result<usize, IwError> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| IwError::Parse(format!("invalid node id '{}'", s.trim())))
}

/// Check that the process runs with root privilege. Interleave weights live
/// under a root-only sysfs tree, so everything else is pointless without it.
pub fn check_root_permission() -> Result<(), IwError> {
    if unsafe { libc::geteuid() } != 0 {
        return Err(IwError::Permission);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_node_list;

    #[test]
    fn test_node_list_ids_and_ranges() {
        let nodes = parse_node_list("0-1,3").unwrap();
        assert_eq!(nodes.into_iter().collect::<Vec<_>>(), vec![0, 1, 3]);

        let nodes = parse_node_list("0,1,2,3\n").unwrap();
        assert_eq!(nodes.len(), 4);

        let nodes = parse_node_list("2-2").unwrap();
        assert_eq!(nodes.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_node_list_rejects_garbage() {
        assert!(parse_node_list("0,x").is_err());
        assert!(parse_node_list("3-1").is_err());
        assert!(parse_node_list("").is_err());
    }
}
