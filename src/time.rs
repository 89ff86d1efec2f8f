use itertools::Itertools;
use num::{Integer, One};
use serde::{Deserialize, Serialize};

/// Inclusive [start, end] run of whole time units
/// <N>: Any integer type
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct TimeRange<N>(pub N, pub N)
where
    N: Integer + One + Copy;

impl<N> TimeRange<N>
where
    N: Integer + One + Copy,
{
    /// Construct a new Time Range
    /// Range is inclusive on [start, end]
    /// # Examples
    /// ```
    /// use zeitraster_libs::time::TimeRange;
    ///
    /// let test = TimeRange::new(10_u8, 11);
    ///
    /// assert_eq!(test.start(), 10);
    /// assert_eq!(test.end(), 11);
    /// assert_eq!(test.len(), 2);
    /// ```
    pub fn new(start: N, end: N) -> TimeRange<N> {
        TimeRange(start, end)
    }

    pub fn start(self) -> N {
        self.0
    }

    pub fn end(self) -> N {
        self.1
    }

    /// Number of units covered, both ends included. Zero for a reversed range.
    pub fn len(self) -> N {
        if self.end() < self.start() {
            N::zero()
        } else {
            N::one() + (self.end() - self.start())
        }
    }

    pub fn is_empty(self) -> bool {
        self.end() < self.start()
    }

    /// Intersects this range with the inclusive bounds `[low, high]`
    ///
    /// # Examples
    /// ```
    /// use zeitraster_libs::time::TimeRange;
    ///
    /// assert_eq!(TimeRange::new(7_u8, 12).clamp(9, 23), Some(TimeRange::new(9, 12)));
    /// assert_eq!(TimeRange::new(3_u8, 8).clamp(9, 23), None);
    /// ```
    pub fn clamp(self, low: N, high: N) -> Option<TimeRange<N>> {
        let clamped = TimeRange(self.start().max(low), self.end().min(high));
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }

    /// True when the ranges overlap or sit directly next to each other
    pub fn touches(self, other: TimeRange<N>) -> bool {
        self.start() <= other.end() + N::one() && other.start() <= self.end() + N::one()
    }
}

pub trait TimeMerge<N>
where
    N: Integer + Copy,
{
    fn time_merge(self) -> Vec<TimeRange<N>>;
}

impl<'a, T, N> TimeMerge<N> for T
where
    T: Iterator<Item = &'a TimeRange<N>>,
    N: 'a + Integer + One + Copy,
{
    /// Combines overlapping and adjacent TimeRanges together, in any input order
    ///
    /// # Examples
    /// ```
    /// use zeitraster_libs::time::{TimeMerge, TimeRange};
    ///
    /// let runs = vec![
    ///     TimeRange::new(14_u8, 15),
    ///     TimeRange::new(10, 11),
    ///     TimeRange::new(12, 12),
    ///     TimeRange::new(18, 18),
    /// ];
    ///
    /// assert_eq!(
    ///     runs.iter().time_merge(),
    ///     vec![TimeRange::new(10, 12), TimeRange::new(14, 15), TimeRange::new(18, 18)]
    /// );
    /// ```
    fn time_merge(self) -> Vec<TimeRange<N>> {
        self.filter(|time| !time.is_empty())
            .sorted_unstable()
            .fold(Vec::new(), |mut acc: Vec<TimeRange<N>>, &curr| {
                match acc.last_mut() {
                    Some(last) if last.touches(curr) => {
                        last.1 = last.end().max(curr.end());
                    }
                    _ => acc.push(curr),
                }
                acc
            })
    }
}

pub trait Units<N>
where
    N: Integer,
{
    fn count_units(&mut self) -> N;
}

impl<'a, T, N> Units<N> for T
where
    T: Iterator<Item = &'a TimeRange<N>>,
    N: 'a + Integer + One + Copy + std::iter::Sum,
{
    /// Total number of units covered by these `TimeRange`s
    ///
    /// # Examples
    /// ```
    /// use zeitraster_libs::time::{Units, TimeRange};
    ///
    /// let times = vec![
    ///     TimeRange::new(9_u8, 11),
    ///     TimeRange::new(20, 20)
    /// ];
    ///
    /// assert_eq!(times.iter().count_units(), 4);
    /// ```
    fn count_units(&mut self) -> N {
        self.map(|time| time.len()).sum()
    }
}

pub trait Windowed<N>
where
    N: Integer + Copy,
{
    fn windowed(self, duration: N) -> Vec<TimeRange<N>>;
}

impl<'a, T, N> Windowed<N> for T
where
    T: Iterator<Item = &'a TimeRange<N>>,
    N: 'a + Integer + One + Copy,
{
    /// Splits each `TimeRange` into every window of `duration` units it holds
    ///
    /// # Example
    /// ```
    /// use zeitraster_libs::time::{Windowed, TimeRange};
    ///
    /// let times = vec![ TimeRange::new(10_u8, 12) ];
    ///
    /// assert_eq!(times.iter().windowed(1),
    ///     vec![
    ///         TimeRange::new(10, 10),
    ///         TimeRange::new(11, 11),
    ///         TimeRange::new(12, 12),
    ///     ]
    /// );
    ///
    /// assert_eq!(times.iter().windowed(2),
    ///     vec![
    ///         TimeRange::new(10, 11),
    ///         TimeRange::new(11, 12),
    ///     ]
    /// );
    /// ```
    fn windowed(self, duration: N) -> Vec<TimeRange<N>> {
        let mut windows: Vec<TimeRange<N>> = Vec::with_capacity(self.size_hint().1.unwrap_or(0));

        if duration.is_zero() {
            return windows;
        }

        let zero_duration = duration - <N>::one();

        for time in self {
            let mut start = time.start();

            while start + zero_duration <= time.end() {
                windows.push(TimeRange::new(start, start + zero_duration));
                start = start + <N>::one();
            }
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_disjoint_runs_apart() {
        let runs = vec![TimeRange::new(9_u8, 9), TimeRange::new(11, 12)];
        assert_eq!(runs.iter().time_merge(), runs);
    }

    #[test]
    fn merge_swallows_contained_runs() {
        let runs = vec![
            TimeRange::new(10_u8, 20),
            TimeRange::new(12, 13),
            TimeRange::new(19, 21),
        ];
        assert_eq!(runs.iter().time_merge(), vec![TimeRange::new(10, 21)]);
    }

    #[test]
    fn reversed_ranges_are_empty() {
        let reversed = TimeRange::new(12_u8, 11);
        assert!(reversed.is_empty());
        assert_eq!(reversed.len(), 0);
        assert!(vec![reversed].iter().time_merge().is_empty());
    }

    #[test]
    fn windows_of_a_single_unit() {
        let runs = vec![TimeRange::new(22_u8, 23), TimeRange::new(9, 9)];
        assert_eq!(
            runs.iter().windowed(1),
            vec![
                TimeRange::new(22, 22),
                TimeRange::new(23, 23),
                TimeRange::new(9, 9)
            ]
        );
        assert!(runs.iter().windowed(3).is_empty());
    }
}
