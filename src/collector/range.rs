use tracing::debug;

use crate::collector::error::CollectError;
use crate::collector::task::{DayKey, FetchTask};

/// Expand an inclusive `[from, to]` range into one day key per calendar day
pub fn expand(from: DayKey, to: DayKey) -> Result<Vec<DayKey>, CollectError> {
    if to < from {
        return Err(CollectError::invalid_range(format!(
            "'to' ({}) cannot be earlier than 'from' ({})",
            to, from
        )));
    }

    let days = from.days_until(&to) as usize + 1;
    let mut keys = Vec::with_capacity(days);
    let mut current = Some(from);

    while let Some(day) = current {
        if day > to {
            break;
        }
        keys.push(day);
        current = day.succ();
    }

    debug!(%from, %to, days = keys.len(), "Expanded date range");

    Ok(keys)
}

/// Number each day with its offset so results can be placed back in order
pub fn into_tasks(days: &[DayKey]) -> Vec<FetchTask> {
    days.iter()
        .enumerate()
        .map(|(index, day)| FetchTask { index, day: *day })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::error::ErrorKind;

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_expand_across_month_boundary() {
        let keys = expand(day("2022-06-29"), day("2022-07-01")).unwrap();
        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(rendered, vec!["2022-06-29", "2022-06-30", "2022-07-01"]);
    }

    #[test]
    fn test_expand_single_day() {
        let keys = expand(day("2022-07-01"), day("2022-07-01")).unwrap();
        assert_eq!(keys, vec![day("2022-07-01")]);
    }

    #[test]
    fn test_expand_rejects_reversed_range() {
        let err = expand(day("2022-07-01"), day("2022-06-29")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRange);
    }

    #[test]
    fn test_expand_properties_over_leap_year() {
        let from = day("2023-12-15");
        let to = day("2024-03-10");
        let keys = expand(from, to).unwrap();

        assert_eq!(keys.len() as i64, from.days_until(&to) + 1);
        assert_eq!(keys.first(), Some(&from));
        assert_eq!(keys.last(), Some(&to));
        assert!(keys.contains(&day("2024-02-29")));
        for pair in keys.windows(2) {
            assert_eq!(pair[0].days_until(&pair[1]), 1);
        }
    }

    #[test]
    fn test_expand_is_idempotent() {
        let a = expand(day("2021-01-30"), day("2021-02-02")).unwrap();
        let b = expand(day("2021-01-30"), day("2021-02-02")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_into_tasks_numbers_in_order() {
        let keys = expand(day("2022-06-29"), day("2022-07-01")).unwrap();
        let tasks = into_tasks(&keys);
        assert_eq!(tasks.len(), 3);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.index, i);
            assert_eq!(task.day, keys[i]);
        }
    }
}
