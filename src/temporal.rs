//! Temporal index: the latest record at or before a timestamp.
//!
//! Two query modes are offered over any [`Timestamped`] record:
//!
//! - point queries for one (location, category), and
//! - a bulk query that reduces a whole collection to the latest record per
//!   (location, category) in a single pass.
//!
//! [`TemporalIndex`] pre-groups and time-sorts records so point queries are a
//! binary search. Among records sharing the latest time, the one encountered
//! last wins in every mode.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::category::{Category, LocationId};
use crate::record::Timestamped;
use crate::time::TimeRange;

/// Latest record per location and category.
pub type Snapshot<'a, R> = BTreeMap<LocationId, BTreeMap<Category, &'a R>>;

fn at_or_before(record_time: DateTime<Utc>, cutoff: Option<DateTime<Utc>>) -> bool {
    cutoff.map_or(true, |t| record_time <= t)
}

/// Latest record for `(location, category)` with `time <= cutoff`.
///
/// Returns `None` when no record qualifies.
#[must_use]
pub fn latest_as_of<'a, R, I>(
    records: I,
    location: &LocationId,
    category: Category,
    cutoff: DateTime<Utc>,
) -> Option<&'a R>
where
    R: Timestamped + 'a,
    I: IntoIterator<Item = &'a R>,
{
    records
        .into_iter()
        .filter(|r| r.category() == category && r.location() == location && r.time() <= cutoff)
        .fold(None, |best: Option<&'a R>, r| match best {
            Some(b) if r.time() < b.time() => Some(b),
            _ => Some(r),
        })
}

/// Reduces `records` to the latest record per (location, category) in one pass.
///
/// A `cutoff` of `None` keeps the latest record overall.
#[must_use]
pub fn bulk_latest_as_of<'a, R, I>(records: I, cutoff: Option<DateTime<Utc>>) -> Snapshot<'a, R>
where
    R: Timestamped + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut out: Snapshot<'a, R> = BTreeMap::new();
    for record in records {
        if !at_or_before(record.time(), cutoff) {
            continue;
        }
        let slot = out
            .entry(record.location().clone())
            .or_default()
            .entry(record.category())
            .or_insert(record);
        if record.time() >= slot.time() {
            *slot = record;
        }
    }
    out
}

/// Records grouped by (location, category), each bucket sorted by time.
#[derive(Debug, Clone)]
pub struct TemporalIndex<R> {
    buckets: HashMap<(LocationId, Category), Vec<R>>,
    len: usize,
}

impl<R> Default for TemporalIndex<R> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            len: 0,
        }
    }
}

impl<R: Timestamped> TemporalIndex<R> {
    /// Builds the index. The sort is stable, so equal times keep input order.
    #[must_use]
    pub fn build(records: impl IntoIterator<Item = R>) -> Self {
        let mut buckets: HashMap<(LocationId, Category), Vec<R>> = HashMap::new();
        let mut len = 0;
        for record in records {
            len += 1;
            buckets
                .entry((record.location().clone(), record.category()))
                .or_default()
                .push(record);
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by_key(|r| r.time());
        }
        Self { buckets, len }
    }

    /// Total number of indexed records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is indexed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All records for a (location, category), oldest first.
    #[must_use]
    pub fn bucket(&self, location: &LocationId, category: Category) -> &[R] {
        self.buckets
            .get(&(location.clone(), category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest record at or before `cutoff`, in `O(log n)`.
    #[must_use]
    pub fn latest_as_of(
        &self,
        location: &LocationId,
        category: Category,
        cutoff: DateTime<Utc>,
    ) -> Option<&R> {
        let bucket = self.bucket(location, category);
        let end = bucket.partition_point(|r| r.time() <= cutoff);
        end.checked_sub(1).map(|i| &bucket[i])
    }

    /// Latest record overall for a (location, category).
    #[must_use]
    pub fn latest(&self, location: &LocationId, category: Category) -> Option<&R> {
        self.bucket(location, category).last()
    }

    /// Records of a bucket inside a closed time range, oldest first.
    #[must_use]
    pub fn within(&self, location: &LocationId, category: Category, range: &TimeRange) -> &[R] {
        let bucket = self.bucket(location, category);
        let start = range
            .from
            .map_or(0, |from| bucket.partition_point(|r| r.time() < from));
        let end = range
            .to
            .map_or(bucket.len(), |to| bucket.partition_point(|r| r.time() <= to));
        if start >= end {
            &[]
        } else {
            &bucket[start..end]
        }
    }

    /// Latest record per (location, category) at `cutoff`, optionally
    /// restricted to one category. Equivalent to [`bulk_latest_as_of`].
    #[must_use]
    pub fn snapshot(
        &self,
        category: Option<Category>,
        cutoff: Option<DateTime<Utc>>,
    ) -> Snapshot<'_, R> {
        let mut out: Snapshot<'_, R> = BTreeMap::new();
        for ((location, cat), bucket) in &self.buckets {
            if category.is_some_and(|c| c != *cat) {
                continue;
            }
            let found = match cutoff {
                Some(t) => {
                    let end = bucket.partition_point(|r| r.time() <= t);
                    end.checked_sub(1).map(|i| &bucket[i])
                }
                None => bucket.last(),
            };
            if let Some(record) = found {
                out.entry(location.clone()).or_default().insert(*cat, record);
            }
        }
        out
    }

    /// Distinct locations present in the index.
    #[must_use]
    pub fn locations(&self) -> BTreeSet<&LocationId> {
        self.buckets.keys().map(|(location, _)| location).collect()
    }

    /// Iterates over every record, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.buckets.values().flatten()
    }

    /// Earliest and latest record times.
    #[must_use]
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.buckets.values().filter_map(|b| b.first()).map(|r| r.time()).min()?;
        let last = self.buckets.values().filter_map(|b| b.last()).map(|r| r.time()).max()?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BstsSummary;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 8, h, 0, 0).unwrap()
    }

    fn rec(loc: u32, cat: Category, h: u32, map: f64) -> BstsSummary {
        BstsSummary::new(at(h), LocationId::from(loc), cat, map)
    }

    fn fixture() -> Vec<BstsSummary> {
        vec![
            rec(1, Category::Power, 18, 3.0),
            rec(1, Category::Power, 10, 1.0),
            rec(1, Category::Power, 14, 2.0),
            rec(2, Category::Power, 12, 5.0),
            rec(1, Category::Medical, 9, 7.0),
        ]
    }

    fn map_of(r: &BstsSummary) -> f64 {
        r.value.value().unwrap()
    }

    #[test]
    fn test_latest_as_of_picks_latest_before_cutoff() {
        let records = fixture();
        let loc = LocationId::from(1);
        let found = latest_as_of(&records, &loc, Category::Power, at(15)).unwrap();
        assert_eq!(found.time, at(14));
        assert!(latest_as_of(&records, &loc, Category::Power, at(9)).is_none());
        let exact = latest_as_of(&records, &loc, Category::Power, at(18)).unwrap();
        assert_eq!(exact.time, at(18));
    }

    #[test]
    fn test_latest_as_of_ties_resolve_to_last_encountered() {
        let records = vec![
            rec(1, Category::Power, 10, 1.0),
            rec(1, Category::Power, 10, 2.0),
        ];
        let loc = LocationId::from(1);
        let found = latest_as_of(&records, &loc, Category::Power, at(11)).unwrap();
        assert!((map_of(found) - 2.0).abs() < f64::EPSILON);

        let bulk = bulk_latest_as_of(&records, Some(at(11)));
        assert!((map_of(bulk[&loc][&Category::Power]) - 2.0).abs() < f64::EPSILON);

        let index = TemporalIndex::build(records.clone());
        let indexed = index.latest_as_of(&loc, Category::Power, at(11)).unwrap();
        assert!((map_of(indexed) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bulk_latest_as_of_groups_by_location_and_category() {
        let records = fixture();
        let snapshot = bulk_latest_as_of(&records, Some(at(13)));
        let one = &snapshot[&LocationId::from(1)];
        assert_eq!(one[&Category::Power].time, at(10));
        assert_eq!(one[&Category::Medical].time, at(9));
        assert_eq!(snapshot[&LocationId::from(2)][&Category::Power].time, at(12));

        let early = bulk_latest_as_of(&records, Some(at(8)));
        assert!(early.is_empty());

        let all = bulk_latest_as_of(&records, None);
        assert_eq!(all[&LocationId::from(1)][&Category::Power].time, at(18));
    }

    #[test]
    fn test_index_matches_linear_queries() {
        let records = fixture();
        let index = TemporalIndex::build(records.clone());
        assert_eq!(index.len(), records.len());
        for h in 0..24 {
            for loc in [1, 2, 3] {
                for cat in Category::ALL {
                    let id = LocationId::from(loc);
                    let linear = latest_as_of(&records, &id, cat, at(h));
                    let indexed = index.latest_as_of(&id, cat, at(h));
                    assert_eq!(linear.map(|r| r.time), indexed.map(|r| r.time));
                }
            }
            let bulk = bulk_latest_as_of(&records, Some(at(h)));
            let snap = index.snapshot(None, Some(at(h)));
            assert_eq!(bulk.len(), snap.len());
        }
    }

    #[test]
    fn test_index_snapshot_category_filter() {
        let index = TemporalIndex::build(fixture());
        let snap = index.snapshot(Some(Category::Medical), None);
        assert_eq!(snap.len(), 1);
        assert!(snap[&LocationId::from(1)].contains_key(&Category::Medical));
    }

    #[test]
    fn test_index_bucket_sorted_and_within() {
        let index = TemporalIndex::build(fixture());
        let loc = LocationId::from(1);
        let times: Vec<_> = index.bucket(&loc, Category::Power).iter().map(|r| r.time).collect();
        assert_eq!(times, vec![at(10), at(14), at(18)]);

        let window = index.within(&loc, Category::Power, &TimeRange::new(at(10), at(14)));
        assert_eq!(window.len(), 2);
        let none = index.within(&loc, Category::Power, &TimeRange::new(at(15), at(17)));
        assert!(none.is_empty());
        assert_eq!(index.latest(&loc, Category::Power).map(|r| r.time), Some(at(18)));
    }

    #[test]
    fn test_index_metadata() {
        let index = TemporalIndex::build(fixture());
        assert_eq!(index.locations().len(), 2);
        assert_eq!(index.time_span(), Some((at(9), at(18))));
        assert_eq!(index.iter().count(), 5);
        assert!(TemporalIndex::<BstsSummary>::default().is_empty());
    }
}
