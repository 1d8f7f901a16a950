//! Monotonic time source, per-user timezone resolution, and next-fire
//! computation for the scheduler's interval, cron, and one-shot triggers
//! (spec §4.1).

use std::str::FromStr;

use ac_domain::entities::Trigger;
use ac_domain::expr::cron::field_matches;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("malformed trigger: {0}")]
    MalformedTrigger(String),
}

/// Upper bound on how far ahead `next_fire` searches for a cron match
/// before giving up (a little over a year of minutes).
const MAX_CRON_PROBES: i64 = 366 * 24 * 60;

/// Abstracts "what time is it" so the scheduler and tests can swap in a
/// fixed clock without touching wall-clock time.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn now_in(&self, tz: &str) -> Result<DateTime<chrono_tz::Tz>, ClockError> {
        let zone = parse_tz(tz)?;
        Ok(self.now_utc().with_timezone(&zone))
    }

    /// Computes the next instant strictly after `after` at which `trigger`
    /// fires. `Ok(None)` means the trigger will never fire again and the
    /// owning task should be disabled (spec §4.1 "none").
    fn next_fire(
        &self,
        trigger: &Trigger,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ClockError> {
        next_fire(trigger, after)
    }
}

/// Default `Clock` backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parses an IANA timezone name. Unlike a best-effort fallback to UTC,
/// an unknown name is a hard error here — the clock service is required
/// to surface malformed input rather than silently substitute a zone the
/// caller didn't ask for (spec §4.1 "Failures").
pub fn parse_tz(tz: &str) -> Result<chrono_tz::Tz, ClockError> {
    chrono_tz::Tz::from_str(tz).map_err(|_| ClockError::UnknownTimezone(tz.to_string()))
}

/// Formats an `at=HH:MM` daily reminder as the equivalent 5-field cron
/// expression (spec §4.1: "`at=HH:MM` with tz treated as a daily cron").
pub fn daily_at_cron(hour: u32, minute: u32) -> String {
    format!("{} {} * * *", minute, hour)
}

fn cron_matches_naive(cron: &str, dt: &NaiveDateTime) -> Result<bool, ClockError> {
    let fields: Vec<&str> = cron.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ClockError::MalformedTrigger(format!(
            "cron expression must have exactly 5 fields, got {}",
            fields.len()
        )));
    }
    let map_err = |e: ac_domain::expr::cron::CronError| ClockError::MalformedTrigger(e.to_string());
    let minute_ok = field_matches(fields[0], dt.minute()).map_err(map_err)?;
    let hour_ok = field_matches(fields[1], dt.hour()).map_err(map_err)?;
    let day_ok = field_matches(fields[2], dt.day()).map_err(map_err)?;
    let month_ok = field_matches(fields[3], dt.month()).map_err(map_err)?;
    let weekday_ok = field_matches(fields[4], dt.weekday().num_days_from_sunday()).map_err(map_err)?;
    Ok(minute_ok && hour_ok && day_ok && month_ok && weekday_ok)
}

/// Next instant matching a 5-field cron expression in `tz`, strictly after
/// `after`. Skips local times that don't exist (spring-forward gaps) and
/// resolves ambiguous local times (fall-back overlaps) to the earlier
/// occurrence, per spec §4.1.
fn cron_next_tz(
    cron: &str,
    after: DateTime<Utc>,
    tz: chrono_tz::Tz,
) -> Result<Option<DateTime<Utc>>, ClockError> {
    let local_after = after.with_timezone(&tz).naive_local();
    let next_min_secs = 60 - local_after.second() as i64;
    let mut candidate = local_after + Duration::seconds(next_min_secs);
    candidate = candidate.with_second(0).unwrap_or(candidate);

    for _ in 0..MAX_CRON_PROBES {
        if cron_matches_naive(cron, &candidate)? {
            match tz.from_local_datetime(&candidate) {
                chrono::LocalResult::Single(dt) => return Ok(Some(dt.with_timezone(&Utc))),
                chrono::LocalResult::Ambiguous(earliest, _) => {
                    return Ok(Some(earliest.with_timezone(&Utc)))
                }
                chrono::LocalResult::None => {}
            }
        }
        candidate += Duration::minutes(1);
    }
    Ok(None)
}

/// Computes the next fire instant for any trigger kind (spec §4.1).
pub fn next_fire(
    trigger: &Trigger,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ClockError> {
    match trigger {
        Trigger::Interval {
            interval_seconds,
            anchor,
        } => {
            if *interval_seconds < 1 {
                return Err(ClockError::MalformedTrigger(
                    "interval_seconds must be >= 1".into(),
                ));
            }
            let step = Duration::seconds(*interval_seconds as i64);
            if *anchor > after {
                return Ok(Some(*anchor));
            }
            let elapsed = (after - *anchor).num_seconds();
            let k = elapsed / *interval_seconds as i64 + 1;
            Ok(Some(*anchor + step * k as i32))
        }
        Trigger::Cron { cron_expr, timezone } => {
            let zone = parse_tz(timezone)?;
            cron_next_tz(cron_expr, after, zone)
        }
        Trigger::OneShot { at_timestamp } => {
            if *at_timestamp > after {
                Ok(Some(*at_timestamp))
            } else {
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::entities::Trigger;
    use chrono::TimeZone;

    #[test]
    fn interval_fires_at_next_anchor_multiple() {
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 25).unwrap();
        let trigger = Trigger::Interval {
            interval_seconds: 10,
            anchor,
        };
        let next = next_fire(&trigger, after).unwrap().unwrap();
        assert_eq!(next, anchor + Duration::seconds(30));
    }

    #[test]
    fn interval_before_anchor_fires_at_anchor() {
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let after = anchor - Duration::seconds(5);
        let trigger = Trigger::Interval {
            interval_seconds: 10,
            anchor,
        };
        assert_eq!(next_fire(&trigger, after).unwrap(), Some(anchor));
    }

    #[test]
    fn one_shot_future_fires_once() {
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let trigger = Trigger::OneShot { at_timestamp: at };
        let after = at - Duration::minutes(1);
        assert_eq!(next_fire(&trigger, after).unwrap(), Some(at));
    }

    #[test]
    fn one_shot_past_is_none() {
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let trigger = Trigger::OneShot { at_timestamp: at };
        let after = at + Duration::minutes(1);
        assert_eq!(next_fire(&trigger, after).unwrap(), None);
    }

    #[test]
    fn cron_next_tz_basic_conversion() {
        let after = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let trigger = Trigger::Cron {
            cron_expr: "0 9 * * *".into(),
            timezone: "America/New_York".into(),
        };
        let next = next_fire(&trigger, after).unwrap().unwrap();
        assert_eq!(next.hour(), 13); // 9 ET (EDT, UTC-4) == 13 UTC
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn cron_spring_forward_gap_is_skipped() {
        let after = Utc.with_ymd_and_hms(2026, 3, 7, 6, 0, 0).unwrap();
        let trigger = Trigger::Cron {
            cron_expr: "30 2 * * *".into(),
            timezone: "America/New_York".into(),
        };
        let next = next_fire(&trigger, after).unwrap().unwrap();
        // 2026-03-08 02:30 local doesn't exist (US spring-forward); the
        // next real occurrence lands on 2026-03-09.
        assert_eq!(next.with_timezone(&chrono_tz::America::New_York).day(), 9);
    }

    #[test]
    fn cron_fall_back_resolves_to_earlier_occurrence() {
        let after = Utc.with_ymd_and_hms(2026, 11, 1, 4, 0, 0).unwrap();
        let trigger = Trigger::Cron {
            cron_expr: "30 1 * * *".into(),
            timezone: "America/New_York".into(),
        };
        let next = next_fire(&trigger, after).unwrap().unwrap();
        // 1:30 AM occurs twice on fall-back day; earliest (EDT, UTC-4) wins.
        assert_eq!(next.hour(), 5);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let trigger = Trigger::Cron {
            cron_expr: "0 9 * * *".into(),
            timezone: "Not/AZone".into(),
        };
        let after = Utc.now();
        assert!(matches!(
            next_fire(&trigger, after),
            Err(ClockError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn malformed_cron_field_count_is_an_error() {
        let trigger = Trigger::Cron {
            cron_expr: "* * *".into(),
            timezone: "UTC".into(),
        };
        let after = Utc.now();
        assert!(matches!(
            next_fire(&trigger, after),
            Err(ClockError::MalformedTrigger(_))
        ));
    }

    #[test]
    fn daily_at_cron_formats_minute_hour_wildcard_fields() {
        assert_eq!(daily_at_cron(9, 5), "5 9 * * *");
    }

    #[test]
    fn system_clock_now_in_reports_requested_zone() {
        let clock = SystemClock;
        let tokyo = clock.now_in("Asia/Tokyo").unwrap();
        assert_eq!(tokyo.timezone(), chrono_tz::Asia::Tokyo);
    }
}
