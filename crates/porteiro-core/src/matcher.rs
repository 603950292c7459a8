use crate::signature::{Metric, Signature};

/// Result of matching a probe signature against the roster gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Index into the gallery slice, i.e. insertion order.
    pub index: usize,
    /// Distance between probe and the matched signature.
    pub distance: f64,
}

/// Strategy for deciding which enrolled signature, if any, a probe belongs to.
pub trait Matcher {
    fn best_match(&self, known: &[Signature], probe: &Signature) -> Option<Match>;
}

/// Minimum-distance matcher with a hard tolerance cut-off.
///
/// A gallery entry is a candidate when its distance to the probe is at most
/// `tolerance`; among candidates the smallest distance wins, ties going to
/// the earliest entry. The whole gallery is always scanned.
#[derive(Debug, Clone)]
pub struct NearestMatcher {
    pub tolerance: f64,
    pub metric: Metric,
}

impl Default for NearestMatcher {
    fn default() -> Self {
        Self {
            tolerance: 0.6,
            metric: Metric::Euclidean,
        }
    }
}

impl NearestMatcher {
    pub fn new(tolerance: f64, metric: Metric) -> Self {
        Self { tolerance, metric }
    }
}

impl Matcher for NearestMatcher {
    fn best_match(&self, known: &[Signature], probe: &Signature) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (index, candidate) in known.iter().enumerate() {
            let distance = self.metric.distance(candidate, probe);
            // Written as a negated `<=` so a NaN distance (possible when a
            // stored signature carries NaN components) is never a candidate.
            if !(distance <= self.tolerance) {
                continue;
            }
            // Strict < keeps the first occurrence on ties.
            let improves = match &best {
                None => true,
                Some(m) => distance < m.distance,
            };
            if improves {
                best = Some(Match { index, distance });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SIGNATURE_DIM;

    fn sig(first: f64) -> Signature {
        let mut v = vec![0.0; SIGNATURE_DIM];
        v[0] = first;
        Signature::new(v).unwrap()
    }

    #[test]
    fn test_empty_gallery_never_matches() {
        let m = NearestMatcher::default();
        assert_eq!(m.best_match(&[], &sig(0.0)), None);
    }

    #[test]
    fn test_picks_minimum_distance_within_tolerance() {
        let m = NearestMatcher::default();
        let gallery = vec![sig(0.5), sig(0.1), sig(2.0)];
        let found = m.best_match(&gallery, &sig(0.0)).unwrap();
        assert_eq!(found.index, 1);
        assert!((found.distance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_nothing_within_tolerance() {
        let m = NearestMatcher::default();
        let gallery = vec![sig(5.0), sig(-3.0)];
        assert_eq!(m.best_match(&gallery, &sig(0.0)), None);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        // 0.5 squares and roots exactly in binary floating point, so the
        // distance equals the tolerance with no rounding slack.
        let m = NearestMatcher::new(0.5, Metric::Euclidean);
        let gallery = vec![sig(0.5)];
        let found = m.best_match(&gallery, &sig(0.0)).unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.distance, 0.5);
    }

    #[test]
    fn test_ties_break_to_first_occurrence() {
        let m = NearestMatcher::default();
        // Entries 0 and 2 are equidistant from the probe.
        let gallery = vec![sig(0.2), sig(0.5), sig(-0.2)];
        let found = m.best_match(&gallery, &sig(0.0)).unwrap();
        assert_eq!(found.index, 0);
    }

    #[test]
    fn test_exact_probe_matches_at_distance_zero() {
        let m = NearestMatcher::default();
        let gallery = vec![sig(1.0), sig(3.0)];
        let found = m.best_match(&gallery, &sig(1.0)).unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.distance, 0.0);
    }

    #[test]
    fn test_whole_gallery_is_scanned() {
        // Best entry is last; an early-exit matcher would miss it.
        let m = NearestMatcher::default();
        let gallery = vec![sig(0.5), sig(0.4), sig(0.01)];
        let found = m.best_match(&gallery, &sig(0.0)).unwrap();
        assert_eq!(found.index, 2);
    }

    #[test]
    fn test_nan_distance_is_never_a_candidate() {
        let m = NearestMatcher::default();
        let mut corrupt = vec![9.0; SIGNATURE_DIM];
        corrupt[0] = f64::NAN;
        let gallery = vec![Signature::new(corrupt).unwrap()];
        // Distance to the corrupt entry is NaN, which must not count as
        // within tolerance, regardless of the probe.
        assert_eq!(m.best_match(&gallery, &sig(9.0)), None);

        // A NaN probe likewise matches nothing.
        let mut bad_probe = vec![0.0; SIGNATURE_DIM];
        bad_probe[0] = f64::NAN;
        let gallery = vec![sig(0.0)];
        assert_eq!(
            m.best_match(&gallery, &Signature::new(bad_probe).unwrap()),
            None
        );
    }

    #[test]
    fn test_cosine_metric() {
        let m = NearestMatcher::new(0.01, Metric::Cosine);
        // Same direction, different magnitude: cosine distance 0.
        let mut a = vec![0.0; SIGNATURE_DIM];
        a[0] = 1.0;
        a[1] = 2.0;
        let mut b = vec![0.0; SIGNATURE_DIM];
        b[0] = 2.0;
        b[1] = 4.0;
        let gallery = vec![Signature::new(a).unwrap()];
        let found = m.best_match(&gallery, &Signature::new(b).unwrap()).unwrap();
        assert_eq!(found.index, 0);
        assert!(found.distance.abs() < 1e-12);
    }
}
