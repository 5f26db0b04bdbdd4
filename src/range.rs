//! Half-open numeric ranges, for banding IMD scores and bucketing ages.
use std::fmt;

/// `[from, to)`, or `[from, ∞)` when there is no upper bound.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Range<T> {
    from: T,
    to: Option<T>,
}

impl<T: Ord> Range<T> {
    pub fn new(from: T, to: Option<T>) -> Self {
        assert!(
            to.as_ref().map_or(true, |to| from < *to),
            "ranges must go from low to high"
        );
        Range { from, to }
    }

    pub fn contains(&self, value: &T) -> bool {
        *value >= self.from && self.to.as_ref().map_or(true, |to| value < to)
    }
}

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.to {
            Some(to) => write!(f, "{} - {}", self.from, to),
            None => write!(f, "{}+", self.from),
        }
    }
}

/// Ranges tried in order. They are not required to be disjoint; the first match wins.
#[derive(Debug, Clone)]
pub struct RangeSet<T> {
    ranges: Vec<Range<T>>,
}

impl<T: Ord> RangeSet<T> {
    pub fn new(ranges: Vec<Range<T>>) -> Self {
        Self { ranges }
    }

    /// The index of the first range containing `value`.
    pub fn position(&self, value: &T) -> Option<usize> {
        self.ranges.iter().position(|range| range.contains(value))
    }

    /// Count values per range. Missing values, and values in no range, are counted separately.
    pub fn bucket_values_with_missing(
        self,
        values: impl IntoIterator<Item = Option<T>>,
    ) -> Buckets<T> {
        let mut counts = vec![0; self.ranges.len()];
        let mut missing = 0;
        for value in values {
            match value.and_then(|value| self.position(&value)) {
                Some(idx) => counts[idx] += 1,
                None => missing += 1,
            }
        }
        Buckets {
            set: self,
            counts,
            missing,
        }
    }
}

/// Counts per range of a `RangeSet`.
#[derive(Debug, Clone)]
pub struct Buckets<T> {
    set: RangeSet<T>,
    counts: Vec<usize>,
    missing: usize,
}

impl<T: fmt::Display> Buckets<T> {
    /// `(label, count)` per range, then the missing count.
    pub fn for_display(&self) -> impl Iterator<Item = (String, usize)> + '_ {
        self.set
            .ranges
            .iter()
            .zip(self.counts.iter().copied())
            .map(|(range, count)| (range.to_string(), count))
            .chain(Some(("missing".to_string(), self.missing)))
    }
}

/// Labelled ranges, with a fallback label for missing values and values outside every range.
#[derive(Debug, Clone)]
pub struct Bands<T> {
    set: RangeSet<T>,
    labels: Vec<&'static str>,
    fallback: &'static str,
}

impl<T: Ord> Bands<T> {
    pub fn new(bands: Vec<(Range<T>, &'static str)>, fallback: &'static str) -> Self {
        let (ranges, labels) = bands.into_iter().unzip();
        Self {
            set: RangeSet::new(ranges),
            labels,
            fallback,
        }
    }

    pub fn label(&self, value: Option<&T>) -> &'static str {
        value
            .and_then(|value| self.set.position(value))
            .map_or(self.fallback, |idx| self.labels[idx])
    }
}
