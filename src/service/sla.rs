//! Service-level deadlines.
//!
//! Budgets are counted in business minutes only: time outside the daily
//! window, or on an inactive weekday, does not consume the budget, so a
//! ticket filed on Friday evening starts its clock on Monday morning.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::model::ticket::TicketPriority;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlaConfigError {
    #[error("invalid time of day `{0}`, expected HH:MM")]
    InvalidTime(String),
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
    #[error("business window must end after it starts")]
    EmptyWindow,
    #[error("weekday {0} is out of range 0-6")]
    InvalidWeekday(u32),
    #[error("at least one weekday must be active")]
    NoActiveDays,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessHours {
    start: NaiveTime,
    end: NaiveTime,
    timezone: Tz,
    /// Indexed by days from Sunday.
    active_days: [bool; 7],
}

impl BusinessHours {
    pub fn new(start: &str, end: &str, timezone: &str, work_days: &[u32]) -> Result<Self, SlaConfigError> {
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        if end <= start {
            return Err(SlaConfigError::EmptyWindow);
        }
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| SlaConfigError::UnknownTimezone(timezone.to_string()))?;

        let mut active_days = [false; 7];
        for &day in work_days {
            let slot = active_days
                .get_mut(day as usize)
                .ok_or(SlaConfigError::InvalidWeekday(day))?;
            *slot = true;
        }
        if !active_days.contains(&true) {
            return Err(SlaConfigError::NoActiveDays);
        }

        Ok(Self { start, end, timezone, active_days })
    }

    /// 09:00-17:00 UTC, Monday to Friday.
    pub fn office_default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            timezone: Tz::UTC,
            active_days: [false, true, true, true, true, true, false],
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn is_active(&self, date: NaiveDate) -> bool {
        self.active_days[date.weekday().num_days_from_sunday() as usize]
    }

    fn localize(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
        let naive = date.and_time(time);
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(at) => at,
            LocalResult::Ambiguous(earliest, _) => earliest,
            // DST gap: read the wall time with the offset in force before it,
            // which lands just past the gap on the same day
            LocalResult::None => {
                let before = self
                    .timezone
                    .offset_from_utc_datetime(&(naive - Duration::days(1)))
                    .fix()
                    .local_minus_utc();
                self.timezone
                    .from_utc_datetime(&(naive - Duration::seconds(i64::from(before))))
            }
        }
    }

    /// The instant itself when it lies inside a window, otherwise the start
    /// of the next window.
    fn next_open(&self, at: DateTime<Tz>) -> DateTime<Tz> {
        let date = at.date_naive();
        let time = at.time();
        if self.is_active(date) {
            if time < self.start {
                return self.localize(date, self.start);
            }
            if time < self.end {
                return at;
            }
        }

        let mut day = date;
        loop {
            day = match day.succ_opt() {
                Some(next) => next,
                None => return at,
            };
            if self.is_active(day) {
                return self.localize(day, self.start);
            }
        }
    }

    /// Advances `from` by `minutes` of business time.
    pub fn add_business_minutes(&self, from: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        let mut remaining = Duration::minutes(minutes.max(0));
        let mut cursor = self.next_open(from.with_timezone(&self.timezone));

        loop {
            let window_end = self.localize(cursor.date_naive(), self.end);
            let available = (window_end - cursor).max(Duration::zero());
            if remaining <= available {
                return (cursor + remaining).with_timezone(&Utc);
            }
            remaining -= available;
            cursor = self.next_open(window_end);
        }
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, SlaConfigError> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| SlaConfigError::InvalidTime(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlaPolicy {
    pub priority: TicketPriority,
    pub response_minutes: i64,
    pub resolution_minutes: i64,
    pub business_hours: BusinessHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub response: DateTime<Utc>,
    pub resolution: DateTime<Utc>,
}

impl SlaPolicy {
    pub fn deadlines(&self, created_at: DateTime<Utc>) -> Deadlines {
        compute_deadlines(created_at, self)
    }
}

pub fn compute_deadlines(created_at: DateTime<Utc>, policy: &SlaPolicy) -> Deadlines {
    let hours = &policy.business_hours;
    Deadlines {
        response: hours.add_business_minutes(created_at, policy.response_minutes),
        resolution: hours.add_business_minutes(created_at, policy.resolution_minutes),
    }
}

/// A ticket is in breach once its resolution deadline has passed, or when
/// its first response came (or is still missing) after the response deadline.
pub fn is_breached(
    deadlines: &Deadlines,
    first_response_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    now > deadlines.resolution || first_response_at.unwrap_or(now) > deadlines.response
}

#[derive(Debug, Clone)]
pub struct SlaPolicies {
    policies: HashMap<TicketPriority, SlaPolicy>,
}

impl SlaPolicies {
    pub fn new(policies: impl IntoIterator<Item = SlaPolicy>) -> Self {
        Self {
            policies: policies.into_iter().map(|p| (p.priority, p)).collect(),
        }
    }

    pub fn for_priority(&self, priority: TicketPriority) -> Option<&SlaPolicy> {
        self.policies.get(&priority)
    }

    pub fn deadlines(&self, priority: TicketPriority, created_at: DateTime<Utc>) -> Option<Deadlines> {
        self.for_priority(priority).map(|policy| policy.deadlines(created_at))
    }
}

impl Default for SlaPolicies {
    fn default() -> Self {
        let policy = |priority, response_minutes, resolution_minutes| SlaPolicy {
            priority,
            response_minutes,
            resolution_minutes,
            business_hours: BusinessHours::office_default(),
        };
        Self::new([
            policy(TicketPriority::Critical, 30, 240),
            policy(TicketPriority::High, 60, 480),
            policy(TicketPriority::Medium, 240, 1440),
            policy(TicketPriority::Low, 480, 2880),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-01 is a Monday.
    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn office() -> BusinessHours {
        BusinessHours::office_default()
    }

    #[test]
    fn inside_the_window_the_clock_runs_straight() {
        assert_eq!(office().add_business_minutes(utc(1, 10, 0), 60), utc(1, 11, 0));
    }

    #[test]
    fn overflow_rolls_into_the_next_day() {
        assert_eq!(office().add_business_minutes(utc(1, 16, 30), 60), utc(2, 9, 30));
    }

    #[test]
    fn before_opening_starts_at_opening() {
        assert_eq!(office().add_business_minutes(utc(1, 7, 0), 30), utc(1, 9, 30));
    }

    #[test]
    fn weekends_are_skipped() {
        // Friday 16:00 + 2h -> Monday 10:00
        assert_eq!(office().add_business_minutes(utc(5, 16, 0), 120), utc(8, 10, 0));
        // Saturday submission starts Monday morning
        assert_eq!(office().add_business_minutes(utc(6, 12, 0), 30), utc(8, 9, 30));
    }

    #[test]
    fn a_full_day_budget_spans_three_windows() {
        // 1440 business minutes = three 8h windows
        assert_eq!(office().add_business_minutes(utc(1, 9, 0), 1440), utc(3, 17, 0));
    }

    #[test]
    fn exact_window_end_is_a_valid_deadline() {
        assert_eq!(office().add_business_minutes(utc(1, 16, 0), 60), utc(1, 17, 0));
    }

    #[test]
    fn windows_follow_the_policy_timezone() {
        let hours = BusinessHours::new("09:00", "17:00", "America/New_York", &[1, 2, 3, 4, 5]).unwrap();
        // 13:00 UTC is 08:00 EST; the window opens at 14:00 UTC
        assert_eq!(hours.add_business_minutes(utc(1, 13, 0), 60), utc(1, 15, 0));
    }

    #[test]
    fn window_opening_inside_a_dst_gap_starts_after_the_gap() {
        // 2024-03-10 02:00-03:00 does not exist in New York
        let hours = BusinessHours::new("02:30", "10:00", "America/New_York", &[0]).unwrap();
        let from = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        // opens 03:30 EDT (07:30 UTC), one hour later is 08:30 UTC
        assert_eq!(
            hours.add_business_minutes(from, 60),
            Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn window_closing_inside_a_dst_gap_still_advances() {
        let hours = BusinessHours::new("01:00", "02:30", "America/New_York", &[0]).unwrap();
        let from = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();
        // 01:00 EST opening, 90 minutes fit before 03:30 EDT
        assert_eq!(
            hours.add_business_minutes(from, 90),
            Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap()
        );
        // the next Sunday window is a normal 90 minutes long
        assert_eq!(
            hours.add_business_minutes(from, 120),
            Utc.with_ymd_and_hms(2024, 3, 17, 5, 30, 0).unwrap()
        );
    }

    #[test]
    fn default_policies_match_priorities() {
        let policies = SlaPolicies::default();
        let deadlines = policies.deadlines(TicketPriority::High, utc(1, 10, 0)).unwrap();
        assert_eq!(deadlines.response, utc(1, 11, 0));
        assert_eq!(deadlines.resolution, utc(2, 10, 0));
        assert_eq!(policies.for_priority(TicketPriority::Critical).unwrap().response_minutes, 30);
    }

    #[test]
    fn breach_on_late_or_missing_response() {
        let deadlines = Deadlines { response: utc(1, 11, 0), resolution: utc(2, 10, 0) };
        assert!(!is_breached(&deadlines, None, utc(1, 10, 30)));
        assert!(is_breached(&deadlines, None, utc(1, 11, 1)));
        assert!(!is_breached(&deadlines, Some(utc(1, 10, 45)), utc(1, 15, 0)));
        assert!(is_breached(&deadlines, Some(utc(1, 12, 0)), utc(1, 15, 0)));
        assert!(is_breached(&deadlines, Some(utc(1, 10, 45)), utc(2, 10, 1)));
    }

    #[test]
    fn rejects_unusable_windows() {
        assert_eq!(BusinessHours::new("17:00", "09:00", "UTC", &[1]), Err(SlaConfigError::EmptyWindow));
        assert_eq!(BusinessHours::new("09:00", "17:00", "UTC", &[]), Err(SlaConfigError::NoActiveDays));
        assert_eq!(BusinessHours::new("09:00", "17:00", "UTC", &[7]), Err(SlaConfigError::InvalidWeekday(7)));
        assert!(matches!(
            BusinessHours::new("9am", "17:00", "UTC", &[1]),
            Err(SlaConfigError::InvalidTime(_))
        ));
        assert!(matches!(
            BusinessHours::new("09:00", "17:00", "Mars/Olympus", &[1]),
            Err(SlaConfigError::UnknownTimezone(_))
        ));
    }
}
