use std::cmp::Ordering;
use std::fmt;

/// A float that orders totally, for score-keyed indexes.
///
/// Uses [`f64::total_cmp`], so `-0.0 < 0.0` and NaNs sort past the infinities.
/// Pair it with a tie-break key, e.g. `OrderedIndex<(Score, String), V>`, to
/// get a sorted-set layout.
#[derive(Clone, Copy, Default)]
pub struct Score(pub f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
