// meridian/core/state/src/access.rs

// Read/write key sets observed while executing one transaction
use std::collections::BTreeSet;

/// Keys a transaction read from and wrote to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSet {
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
}

impl AccessSet {
    /// Whether any key this set read or wrote is in `written`.
    pub fn touches(&self, written: &BTreeSet<String>) -> bool {
        !self.reads.is_disjoint(written) || !self.writes.is_disjoint(written)
    }

    pub fn merge(&mut self, other: &AccessSet) {
        self.reads.extend(other.reads.iter().cloned());
        self.writes.extend(other.writes.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(reads: &[&str], writes: &[&str]) -> AccessSet {
        AccessSet {
            reads: reads.iter().map(|s| s.to_string()).collect(),
            writes: writes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn keys(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_touches_reads_and_writes() {
        let acc = set(&["balance/a"], &["balance/b"]);
        assert!(acc.touches(&keys(&["balance/a"])));
        assert!(acc.touches(&keys(&["balance/b"])));
        assert!(!acc.touches(&keys(&["balance/c"])));
        assert!(!acc.touches(&BTreeSet::new()));
    }

    #[test]
    fn test_merge() {
        let mut committed = AccessSet::default();
        committed.merge(&set(&["x"], &["y"]));
        committed.merge(&set(&["z"], &["y", "w"]));
        assert_eq!(committed.reads, keys(&["x", "z"]));
        assert_eq!(committed.writes, keys(&["w", "y"]));
    }
}
