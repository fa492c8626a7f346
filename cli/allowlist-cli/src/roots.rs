use std::collections::HashSet;

use crate::allowlist::Cohort;
use crate::common::Digest;
use crate::error::{LedgerError, LedgerResult};

/// Most roots a deployment tracks at once (two cohorts, current and legacy).
pub const MAX_ROOTS: usize = 4;

/// Trusted allowlist roots, one per cohort.
///
/// The whole set is replaced in one call so no cohort's root can lag behind
/// another's. Replaced roots are forgotten.
#[derive(Debug, Clone, Default)]
pub struct RootRegistry {
    slots: Vec<(Cohort, Digest)>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every tracked root with `roots`.
    ///
    /// # Errors
    /// [`LedgerError::InvalidRootSet`] if there are no roots, more than
    /// [`MAX_ROOTS`], or the same cohort twice. The registry is unchanged on
    /// error.
    pub fn set_roots(&mut self, roots: Vec<(Cohort, Digest)>) -> LedgerResult<()> {
        if roots.is_empty() || roots.len() > MAX_ROOTS {
            return Err(LedgerError::InvalidRootSet(format!(
                "expected 1 to {} roots, got {}",
                MAX_ROOTS,
                roots.len()
            )));
        }
        let mut seen = HashSet::new();
        for (cohort, _) in &roots {
            if !seen.insert(cohort) {
                return Err(LedgerError::InvalidRootSet(format!(
                    "cohort {} listed twice",
                    cohort
                )));
            }
        }
        self.slots = roots;
        Ok(())
    }

    pub fn current_root(&self, cohort: &Cohort) -> Option<Digest> {
        self.slots
            .iter()
            .find(|(tracked, _)| tracked == cohort)
            .map(|(_, root)| *root)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Cohort, &Digest)> {
        self.slots.iter().map(|(cohort, root)| (cohort, root))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort(name: &str) -> Cohort {
        Cohort::new(name).unwrap()
    }

    #[test]
    fn test_set_and_read_roots() {
        let mut registry = RootRegistry::new();
        registry
            .set_roots(vec![(cohort("reapers"), [1; 32]), (cohort("tricksters"), [2; 32])])
            .unwrap();
        assert_eq!(registry.current_root(&cohort("reapers")), Some([1; 32]));
        assert_eq!(registry.current_root(&cohort("tricksters")), Some([2; 32]));
        assert_eq!(registry.current_root(&cohort("others")), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_set_roots_replaces_whole_set() {
        let mut registry = RootRegistry::new();
        registry
            .set_roots(vec![(cohort("reapers"), [1; 32]), (cohort("tricksters"), [2; 32])])
            .unwrap();
        registry.set_roots(vec![(cohort("reapers"), [3; 32])]).unwrap();
        assert_eq!(registry.current_root(&cohort("reapers")), Some([3; 32]));
        assert_eq!(registry.current_root(&cohort("tricksters")), None);
    }

    #[test]
    fn test_four_roots_allowed_five_rejected() {
        let mut registry = RootRegistry::new();
        let four: Vec<_> = (0..4u8).map(|i| (cohort(&format!("c{i}")), [i; 32])).collect();
        registry.set_roots(four).unwrap();
        assert_eq!(registry.len(), 4);

        let five: Vec<_> = (0..5u8).map(|i| (cohort(&format!("c{i}")), [i; 32])).collect();
        assert!(matches!(
            registry.set_roots(five),
            Err(LedgerError::InvalidRootSet(_))
        ));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_empty_and_duplicate_sets_rejected() {
        let mut registry = RootRegistry::new();
        assert!(registry.set_roots(vec![]).is_err());
        assert!(registry
            .set_roots(vec![(cohort("reapers"), [1; 32]), (cohort("reapers"), [2; 32])])
            .is_err());
        assert!(registry.is_empty());
    }
}
