//! Predicates deciding whether two peaks elute together.

use crate::peaks::Peak;

/// Decide whether two peaks co-elute.
///
/// Implementations must be pure functions of the two peaks and the tolerance, so that
/// they may be shared across threads during signature searches.
pub trait CoelutionPolicy: Sync {
    fn is_coeluted(&self, a: &Peak, b: &Peak, rt_tolerance: f64) -> bool;
}

/// Compare the peaks' elution spans, requiring the shared region to cover more than half
/// of the narrower peak. Peaks without both boundaries fall back to [`DistanceCoelution`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlapCoelution;

/// Compare apex times only
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceCoelution;

/// Test the boundary overlap rule, returning `None` if either peak is missing a boundary.
pub fn coeluted_by_overlap(a: &Peak, b: &Peak) -> Option<bool> {
    let span_a = a.boundaries()?;
    let span_b = b.boundaries()?;
    let overlap = span_a.end.min(span_b.end) - span_a.start.max(span_b.start);
    let shorter = (span_a.end - span_a.start).min(span_b.end - span_b.start);
    Some(overlap > 0.5 * shorter)
}

#[inline]
pub fn coeluted_by_distance(a: &Peak, b: &Peak, rt_tolerance: f64) -> bool {
    (a.apex - b.apex).abs() <= rt_tolerance
}

impl CoelutionPolicy for OverlapCoelution {
    fn is_coeluted(&self, a: &Peak, b: &Peak, rt_tolerance: f64) -> bool {
        coeluted_by_overlap(a, b).unwrap_or_else(|| coeluted_by_distance(a, b, rt_tolerance))
    }
}

impl CoelutionPolicy for DistanceCoelution {
    fn is_coeluted(&self, a: &Peak, b: &Peak, rt_tolerance: f64) -> bool {
        coeluted_by_distance(a, b, rt_tolerance)
    }
}

impl<F> CoelutionPolicy for F
where
    F: Fn(&Peak, &Peak, f64) -> bool + Sync,
{
    fn is_coeluted(&self, a: &Peak, b: &Peak, rt_tolerance: f64) -> bool {
        (self)(a, b, rt_tolerance)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overlap() {
        let a = Peak::new("a", 100.0, 10.0, 1.0).with_bases(5.0, 15.0);
        let b = Peak::new("b", 101.0, 12.0, 1.0).with_bases(8.0, 14.0);
        assert_eq!(coeluted_by_overlap(&a, &b), Some(true));

        // overlap of 2 against a shorter length of 6
        let c = Peak::new("c", 101.0, 16.0, 1.0).with_bases(13.0, 19.0);
        assert_eq!(coeluted_by_overlap(&a, &c), Some(false));
        assert!(!OverlapCoelution.is_coeluted(&a, &c, 100.0));

        let d = Peak::new("d", 101.0, 40.0, 1.0).with_bases(30.0, 50.0);
        assert_eq!(coeluted_by_overlap(&a, &d), Some(false));
    }

    #[test]
    fn test_overlap_ignores_apex() {
        let a = Peak::new("a", 100.0, 10.0, 1.0).with_bases(5.0, 15.0);
        let mut b = Peak::new("b", 101.0, 6.0, 1.0).with_bases(6.0, 14.0);
        let first = OverlapCoelution.is_coeluted(&a, &b, 0.5);
        b.apex = 13.9;
        let second = OverlapCoelution.is_coeluted(&a, &b, 0.5);
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_to_distance() {
        let a = Peak::new("a", 100.0, 10.0, 1.0).with_bases(5.0, 15.0);
        let b = Peak::new("b", 101.0, 12.0, 1.0);
        assert_eq!(coeluted_by_overlap(&a, &b), None);
        assert!(OverlapCoelution.is_coeluted(&a, &b, 2.0));
        assert!(!OverlapCoelution.is_coeluted(&a, &b, 1.9));
        assert!(DistanceCoelution.is_coeluted(&a, &b, 2.0));
    }

    #[test]
    fn test_closure_policy() {
        let never = |_: &Peak, _: &Peak, _: f64| false;
        let a = Peak::new("a", 100.0, 10.0, 1.0);
        assert!(!never.is_coeluted(&a, &a, 10.0));
    }
}
