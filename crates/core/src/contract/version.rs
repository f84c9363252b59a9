//! Document version identifier
//!
//! Every committed mutation of a document produces a new version.
//!
//! ## Shape
//!
//! A version is the pair `(created_at_ns, revision)`:
//!
//! - `created_at_ns` is assigned once, when the key is first created, and
//!   never changes for the lifetime of the key (deleting and recreating a
//!   document keeps it).
//! - `revision` starts at 1 and increments by 1 on every committed mutation.
//!
//! ## Comparison
//!
//! Versions are compared as a numeric tuple: `created_at_ns` first, then
//! `revision`. `(1, 10)` is newer than `(1, 2)`.
//!
//! ## Encoding
//!
//! The JSON form is the two-element array `[created_at_ns, revision]`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Version identifier for a document
///
/// ## Invariants
///
/// - Versions of one key are strictly increasing in commit order
/// - `created_at_ns` is constant across all versions of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct Version {
    /// Creation time of the key, nanoseconds since Unix epoch
    pub created_at_ns: u64,
    /// Mutation counter, 1 for the first committed write
    pub revision: u64,
}

impl Version {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a version from its parts
    pub const fn new(created_at_ns: u64, revision: u64) -> Self {
        Version {
            created_at_ns,
            revision,
        }
    }

    /// The version of a key's first write
    pub const fn initial(created_at_ns: u64) -> Self {
        Version::new(created_at_ns, 1)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// The version following this one
    pub const fn next(&self) -> Self {
        Version::new(self.created_at_ns, self.revision.saturating_add(1))
    }

    /// The version preceding this one
    ///
    /// Useful for polling: asking for patches newer than `v.previous()`
    /// returns the patch that produced `v`, if it is still buffered.
    pub const fn previous(&self) -> Self {
        Version::new(self.created_at_ns, self.revision.saturating_sub(1))
    }

    /// Check if this version is strictly newer than `other`
    #[inline]
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self > other
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.created_at_ns
            .cmp(&other.created_at_ns)
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(u64, u64)> for Version {
    fn from((created_at_ns, revision): (u64, u64)) -> Self {
        Version::new(created_at_ns, revision)
    }
}

impl From<Version> for (u64, u64) {
    fn from(v: Version) -> Self {
        (v.created_at_ns, v.revision)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.created_at_ns, self.revision)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_version_constructors() {
        assert_eq!(Version::initial(7), Version::new(7, 1));
        assert_eq!(Version::default(), Version::new(0, 0));
    }

    #[test]
    fn test_next_keeps_created_at() {
        let v = Version::initial(1_700_000_000_000_000_000);
        let n = v.next().next();
        assert_eq!(n.created_at_ns, v.created_at_ns);
        assert_eq!(n.revision, 3);
    }

    #[test]
    fn test_previous_saturates() {
        assert_eq!(Version::new(5, 2).previous(), Version::new(5, 1));
        assert_eq!(Version::new(5, 0).previous(), Version::new(5, 0));
    }

    #[test]
    fn test_revision_compared_numerically() {
        // A string comparison would put "10" before "2".
        assert!(Version::new(1, 10) > Version::new(1, 2));
        assert!(Version::new(1, 10).is_newer_than(&Version::new(1, 2)));
        assert!(!Version::new(1, 2).is_newer_than(&Version::new(1, 10)));
    }

    #[test]
    fn test_created_at_dominates_revision() {
        let older = Version::new(1_700_000_000_000_000_000, 999);
        let newer = Version::new(1_700_000_000_000_000_001, 1);
        assert!(newer > older);
    }

    #[test]
    fn test_large_created_at_values() {
        let a = Version::new(9_999_999_999_999_999_999, 1);
        let b = Version::new(10_000_000_000_000_000_000, 1);
        assert!(b > a);
    }

    #[test]
    fn test_equal_is_not_newer() {
        let v = Version::new(3, 3);
        assert!(!v.is_newer_than(&v));
    }

    #[test]
    fn test_json_form_is_pair() {
        let v = Version::new(123, 4);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[123,4]");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::new(10, 2).to_string(), "10.2");
    }

    proptest! {
        #[test]
        fn prop_ordering_matches_numeric_tuple(
            a in any::<u64>(), b in any::<u64>(), c in any::<u64>(), d in any::<u64>()
        ) {
            prop_assert_eq!(Version::new(a, b).cmp(&Version::new(c, d)), (a, b).cmp(&(c, d)));
        }

        #[test]
        fn prop_next_is_newer(a in any::<u64>(), b in 0..u64::MAX) {
            let v = Version::new(a, b);
            prop_assert!(v.next().is_newer_than(&v));
        }
    }
}
