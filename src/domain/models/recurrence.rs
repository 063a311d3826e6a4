//! Recurrence patterns: enumerate occurrence instants for recurring events.
//!
//! Each pattern variant is an immutable value anchored at a starting instant
//! (UTC). `next_n_occurrences` and `is_due_on` are the two operations every
//! variant must support; `is_due_on` is always derived from
//! `next_n_occurrences` so there is a single source of truth for "is this
//! instant an occurrence".

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::ports::errors::AppError;

/// `max = UNBOUNDED` means the pattern never stops by count.
pub const UNBOUNDED_COUNT: i64 = -1;

/// A discriminated recurrence variant, anchored at `anchor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily {
        anchor: DateTime<Utc>,
        interval: i64,
        #[serde(default = "default_unbounded")]
        max: i64,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
    Weekly {
        anchor: DateTime<Utc>,
        interval: i64,
        days: Vec<Weekday>,
        #[serde(default = "default_unbounded")]
        max: i64,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
    Monthly {
        anchor: DateTime<Utc>,
        interval: i64,
        #[serde(default = "default_unbounded")]
        max: i64,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
    Yearly {
        anchor: DateTime<Utc>,
        interval: i64,
        #[serde(default = "default_unbounded")]
        max: i64,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
}

fn default_unbounded() -> i64 {
    UNBOUNDED_COUNT
}

fn end_or_max(end: Option<DateTime<Utc>>) -> DateTime<Utc> {
    end.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl RecurrencePattern {
    /// Validate the invariants: `interval >= 1`, and weekly patterns must
    /// name at least one day.
    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            Self::Daily { interval, .. }
            | Self::Monthly { interval, .. }
            | Self::Yearly { interval, .. } => {
                if *interval < 1 {
                    return Err(AppError::InvalidPattern(
                        "interval must be >= 1".to_string(),
                    ));
                }
            }
            Self::Weekly {
                interval, days, ..
            } => {
                if *interval < 1 {
                    return Err(AppError::InvalidPattern(
                        "interval must be >= 1".to_string(),
                    ));
                }
                if days.is_empty() {
                    return Err(AppError::InvalidPattern(
                        "weekly pattern requires at least one day".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        match self {
            Self::Daily { anchor, .. }
            | Self::Weekly { anchor, .. }
            | Self::Monthly { anchor, .. }
            | Self::Yearly { anchor, .. } => *anchor,
        }
    }

    /// Next `n` occurrences strictly greater than `after`, ascending,
    /// respecting `max` (index bound) and `end` (instant bound).
    pub fn next_n_occurrences(&self, after: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        if n == 0 {
            return Vec::new();
        }
        match self {
            Self::Daily {
                anchor,
                interval,
                max,
                end,
            } => daily_occurrences(*anchor, *interval, *max, end_or_max(*end), after, n),
            Self::Weekly {
                anchor,
                interval,
                days,
                max,
                end,
            } => weekly_occurrences(*anchor, *interval, days, *max, end_or_max(*end), after, n),
            Self::Monthly {
                anchor,
                interval,
                max,
                end,
            } => month_like_occurrences(*anchor, *interval, *max, end_or_max(*end), after, n, 1),
            Self::Yearly {
                anchor,
                interval,
                max,
                end,
            } => month_like_occurrences(*anchor, *interval, *max, end_or_max(*end), after, n, 12),
        }
    }

    /// `is_due_on(d) == d` is the sole occurrence produced by
    /// `next_n_occurrences(d - epsilon, 1)`.
    pub fn is_due_on(&self, d: DateTime<Utc>) -> bool {
        let just_before = d - Duration::milliseconds(1);
        self.next_n_occurrences(just_before, 1)
            .first()
            .is_some_and(|candidate| *candidate == d)
    }
}

fn daily_occurrences(
    anchor: DateTime<Utc>,
    interval: i64,
    max: i64,
    end: DateTime<Utc>,
    after: DateTime<Utc>,
    n: usize,
) -> Vec<DateTime<Utc>> {
    let mut result = Vec::new();
    let day_span = Duration::hours(24 * interval);

    let mut index: i64 = 0;
    if after > anchor {
        let diff_days = (after - anchor).num_hours() / 24;
        index = diff_days / interval + 1;
    }

    while result.len() < n {
        let next_time = anchor + day_span * i32::try_from(index).unwrap_or(i32::MAX);
        if next_time > end {
            break;
        }
        if max != UNBOUNDED_COUNT && index >= max {
            break;
        }
        if next_time > after {
            result.push(next_time);
        }
        index += 1;
    }
    result
}

fn weekly_occurrences(
    anchor: DateTime<Utc>,
    interval: i64,
    days: &[Weekday],
    max: i64,
    end: DateTime<Utc>,
    after: DateTime<Utc>,
    n: usize,
) -> Vec<DateTime<Utc>> {
    let mut sorted_days = days.to_vec();
    sorted_days.sort_by_key(Weekday::num_days_from_sunday);
    sorted_days.dedup();

    let anchor_day = anchor.date_naive().and_hms_opt(0, 0, 0).unwrap();
    let anchor_day = Utc.from_utc_datetime(&anchor_day);
    let time_of_day = anchor - anchor_day;
    let anchor_weekday = anchor.weekday().num_days_from_sunday() as i64;

    let mut week_index: i64 = 0;
    if after > anchor {
        let diff_weeks = (after - anchor_day).num_hours() / (24 * 7);
        week_index = diff_weeks / interval;
    }

    let mut result = Vec::new();
    let mut occurrences_checked = week_index * sorted_days.len() as i64;

    'outer: loop {
        for day in &sorted_days {
            let day_num = day.num_days_from_sunday() as i64;
            let offset_days = week_index * interval * 7 + (day_num - anchor_weekday);
            let candidate = anchor_day + Duration::hours(24 * offset_days) + time_of_day;

            if candidate < anchor {
                continue;
            }
            if candidate > end {
                break 'outer;
            }
            if max != UNBOUNDED_COUNT && occurrences_checked >= max {
                break 'outer;
            }
            if candidate > after {
                result.push(candidate);
                if result.len() >= n {
                    break 'outer;
                }
            }
            occurrences_checked += 1;
        }
        week_index += 1;
    }
    result
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        chrono::NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid month arithmetic");
    let first_of_this = chrono::NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    (first_of_next - first_of_this).num_days() as u32
}

/// Shared monthly/yearly stepping: add `index * interval * unit_months`
/// months to the anchor, clamping the day-of-month into the target month.
fn month_like_occurrences(
    anchor: DateTime<Utc>,
    interval: i64,
    max: i64,
    end: DateTime<Utc>,
    after: DateTime<Utc>,
    n: usize,
    unit_months: i64,
) -> Vec<DateTime<Utc>> {
    let step = |index: i64| -> DateTime<Utc> {
        let total_months = i64::from(anchor.month0()) + index * interval * unit_months;
        let year = anchor.year() as i64 + total_months.div_euclid(12);
        let month0 = total_months.rem_euclid(12) as u32;
        let month = month0 + 1;
        let days = days_in_month(year as i32, month);
        let day = anchor.day().min(days);
        let naive = chrono::NaiveDate::from_ymd_opt(year as i32, month, day)
            .expect("clamped day is valid")
            .and_hms_opt(anchor.hour(), anchor.minute(), anchor.second())
            .expect("valid time-of-day");
        Utc.from_utc_datetime(&naive)
    };

    let mut index: i64 = 0;
    loop {
        let candidate = step(index);
        if candidate > after || candidate > end {
            break;
        }
        index += 1;
        if max != UNBOUNDED_COUNT && index >= max {
            return Vec::new();
        }
    }

    let mut result = Vec::new();
    while result.len() < n {
        let candidate = step(index);
        if candidate > end {
            break;
        }
        if max != UNBOUNDED_COUNT && index >= max {
            break;
        }
        if candidate > after {
            result.push(candidate);
        }
        index += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    #[test]
    fn daily_interval_two() {
        let p = RecurrencePattern::Daily {
            anchor: utc(2025, 6, 1, 9, 0),
            interval: 2,
            max: 5,
            end: None,
        };
        let occs = p.next_n_occurrences(utc(2025, 5, 31, 0, 0), 10);
        let expected = vec![
            utc(2025, 6, 1, 9, 0),
            utc(2025, 6, 3, 9, 0),
            utc(2025, 6, 5, 9, 0),
            utc(2025, 6, 7, 9, 0),
            utc(2025, 6, 9, 9, 0),
        ];
        assert_eq!(occs, expected);
        assert!(!p.is_due_on(utc(2025, 6, 2, 9, 0)));
        assert!(p.is_due_on(utc(2025, 6, 3, 9, 0)));
    }

    #[test]
    fn weekly_mon_wed() {
        let p = RecurrencePattern::Weekly {
            anchor: utc(2025, 6, 2, 9, 0), // Monday
            interval: 1,
            days: vec![Weekday::Mon, Weekday::Wed],
            max: 5,
            end: None,
        };
        let occs = p.next_n_occurrences(utc(2025, 6, 1, 0, 0), 10);
        let expected = vec![
            utc(2025, 6, 2, 9, 0),
            utc(2025, 6, 4, 9, 0),
            utc(2025, 6, 9, 9, 0),
            utc(2025, 6, 11, 9, 0),
            utc(2025, 6, 16, 9, 0),
        ];
        assert_eq!(occs, expected);
    }

    #[test]
    fn monthly_end_of_month_clamp() {
        let p = RecurrencePattern::Monthly {
            anchor: utc(2025, 1, 31, 9, 0),
            interval: 1,
            max: UNBOUNDED_COUNT,
            end: None,
        };
        let occs = p.next_n_occurrences(utc(2025, 1, 1, 0, 0), 3);
        assert_eq!(occs[0], utc(2025, 1, 31, 9, 0));
        assert_eq!(occs[1], utc(2025, 2, 28, 9, 0));
        assert_eq!(occs[2], utc(2025, 3, 31, 9, 0));
    }

    #[test]
    fn monthly_leap_year_clamp() {
        let p = RecurrencePattern::Monthly {
            anchor: utc(2024, 1, 31, 9, 0),
            interval: 1,
            max: UNBOUNDED_COUNT,
            end: None,
        };
        let occs = p.next_n_occurrences(utc(2024, 1, 1, 0, 0), 2);
        assert_eq!(occs[1], utc(2024, 2, 29, 9, 0));
    }

    #[test]
    fn n_zero_is_empty() {
        let p = RecurrencePattern::Daily {
            anchor: utc(2025, 1, 1, 0, 0),
            interval: 1,
            max: UNBOUNDED_COUNT,
            end: None,
        };
        assert!(p.next_n_occurrences(utc(2025, 1, 1, 0, 0), 0).is_empty());
    }

    #[test]
    fn invalid_interval_rejected() {
        let p = RecurrencePattern::Daily {
            anchor: utc(2025, 1, 1, 0, 0),
            interval: 0,
            max: UNBOUNDED_COUNT,
            end: None,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn empty_weekly_days_rejected() {
        let p = RecurrencePattern::Weekly {
            anchor: utc(2025, 1, 1, 0, 0),
            interval: 1,
            days: vec![],
            max: UNBOUNDED_COUNT,
            end: None,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn is_due_on_matches_next_n_occurrences() {
        let p = RecurrencePattern::Daily {
            anchor: utc(2025, 6, 1, 9, 0),
            interval: 2,
            max: UNBOUNDED_COUNT,
            end: None,
        };
        for d in p.next_n_occurrences(utc(2025, 6, 1, 0, 0), 5) {
            assert!(p.is_due_on(d));
        }
        assert!(!p.is_due_on(utc(2025, 6, 2, 9, 0)));
    }
}

/// Property-style tests for the quantified invariants: for any
/// pattern and any `(after, n)`, `next_n_occurrences` returns a strictly
/// ascending sequence of at most `n` instants, each `> after`, each `<=
/// end` (when bounded), with indices respecting `max` (when finite).
#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn anchor_strategy() -> impl Strategy<Value = DateTime<Utc>> {
        (2020i32..2030, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60)
            .prop_map(|(y, m, d, hh, mm)| Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap())
    }

    fn pattern_strategy() -> impl Strategy<Value = RecurrencePattern> {
        let daily = (anchor_strategy(), 1i64..5, prop_oneof![Just(UNBOUNDED_COUNT), 1i64..20])
            .prop_map(|(anchor, interval, max)| RecurrencePattern::Daily {
                anchor,
                interval,
                max,
                end: None,
            });
        let weekly = (
            anchor_strategy(),
            1i64..4,
            prop::collection::vec(0u8..7, 1..=4),
            prop_oneof![Just(UNBOUNDED_COUNT), 1i64..20],
        )
            .prop_map(|(anchor, interval, raw_days, max)| {
                let days = raw_days
                    .into_iter()
                    .map(|d| Weekday::try_from(d).unwrap())
                    .collect();
                RecurrencePattern::Weekly {
                    anchor,
                    interval,
                    days,
                    max,
                    end: None,
                }
            });
        let monthly = (anchor_strategy(), 1i64..6, prop_oneof![Just(UNBOUNDED_COUNT), 1i64..20]).prop_map(
            |(anchor, interval, max)| RecurrencePattern::Monthly {
                anchor,
                interval,
                max,
                end: None,
            },
        );
        prop_oneof![daily, weekly, monthly]
    }

    proptest! {
        #[test]
        fn next_n_is_ascending_and_strictly_after(
            pattern in pattern_strategy(),
            after_offset_days in -10i64..200,
            n in 0usize..12,
        ) {
            let after = pattern.anchor() + Duration::days(after_offset_days);
            let occs = pattern.next_n_occurrences(after, n);

            prop_assert!(occs.len() <= n);
            for w in occs.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
            for t in &occs {
                prop_assert!(*t > after);
            }
        }

        #[test]
        fn is_due_on_agrees_with_next_n(pattern in pattern_strategy(), after_offset_days in 0i64..60) {
            let probe = pattern.anchor() + Duration::days(after_offset_days);
            let due = pattern.is_due_on(probe);
            let matches_next = pattern
                .next_n_occurrences(probe - Duration::milliseconds(1), 1)
                .first()
                .is_some_and(|t| *t == probe);
            prop_assert_eq!(due, matches_next);
        }
    }
}
