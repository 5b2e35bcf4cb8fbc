//! Time-ordered view over an athlete's activity history
//!
//! Aggregators only ever walk the newest records they need, so their cost is
//! bounded by the window size rather than by the athlete's total history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ActivityRecord;

/// Activity records ordered by timestamp, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ActivityRecord>", into = "Vec<ActivityRecord>")]
pub struct ActivityHistory {
    records: Vec<ActivityRecord>,
}

impl ActivityHistory {
    /// Build a history from records in any order
    pub fn new(mut records: Vec<ActivityRecord>) -> Self {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        ActivityHistory { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    /// Mutable access for rewriting derived fields.
    ///
    /// Timestamps must not be changed through this slice.
    pub fn records_mut(&mut self) -> &mut [ActivityRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<ActivityRecord> {
        self.records
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &ActivityRecord> + '_ {
        self.records.iter()
    }

    /// Records strictly before `cutoff`, newest first (all records when `None`)
    pub fn before(
        &self,
        cutoff: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &ActivityRecord> + '_ {
        self.records
            .iter()
            .skip_while(move |record| cutoff.map_or(false, |cutoff| record.timestamp >= cutoff))
    }

    /// Records in `[start, end)`, newest first
    pub fn within(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &ActivityRecord> + '_ {
        self.records
            .iter()
            .skip_while(move |record| record.timestamp >= end)
            .take_while(move |record| record.timestamp >= start)
    }

    /// Records in `[start, until]`, newest first
    pub fn since(
        &self,
        start: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Iterator<Item = &ActivityRecord> + '_ {
        self.records
            .iter()
            .skip_while(move |record| record.timestamp > until)
            .take_while(move |record| record.timestamp >= start)
    }
}

impl From<Vec<ActivityRecord>> for ActivityHistory {
    fn from(records: Vec<ActivityRecord>) -> Self {
        ActivityHistory::new(records)
    }
}

impl From<ActivityHistory> for Vec<ActivityRecord> {
    fn from(history: ActivityHistory) -> Self {
        history.records
    }
}

impl FromIterator<ActivityRecord> for ActivityHistory {
    fn from_iter<I: IntoIterator<Item = ActivityRecord>>(iter: I) -> Self {
        ActivityHistory::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityKind;
    use chrono::{Duration, TimeZone};

    fn history_of_days(days: &[i64]) -> (ActivityHistory, DateTime<Utc>) {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let records = days
            .iter()
            .map(|day| {
                ActivityRecord::new(
                    format!("day{}", day),
                    base + Duration::days(*day),
                    ActivityKind::Road,
                    5000.0,
                    1500,
                )
            })
            .collect::<Vec<_>>();
        (ActivityHistory::new(records), base)
    }

    #[test]
    fn test_sorted_newest_first() {
        let (history, _) = history_of_days(&[3, 1, 7, 5]);
        let ids: Vec<&str> = history.newest_first().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["day7", "day5", "day3", "day1"]);
    }

    #[test]
    fn test_before_cutoff_is_strict() {
        let (history, base) = history_of_days(&[1, 2, 3, 4]);
        let ids: Vec<&str> = history
            .before(Some(base + Duration::days(3)))
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["day2", "day1"]);

        assert_eq!(history.before(None).count(), 4);
    }

    #[test]
    fn test_within_half_open() {
        let (history, base) = history_of_days(&[0, 1, 2, 3, 4, 5]);
        let ids: Vec<&str> = history
            .within(base + Duration::days(1), base + Duration::days(4))
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["day3", "day2", "day1"]);
    }

    #[test]
    fn test_since_inclusive() {
        let (history, base) = history_of_days(&[0, 1, 2]);
        let count = history
            .since(base + Duration::days(1), base + Duration::days(2))
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_serde_resorts() {
        let (history, _) = history_of_days(&[2, 9, 4]);
        let mut records = history.into_records();
        records.reverse();
        let json = serde_json::to_string(&records).unwrap();

        let restored: ActivityHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.records()[0].id, "day9");
    }
}
