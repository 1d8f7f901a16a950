//! Cron field parsing shared between config validation (here) and the
//! next-fire computation in `ac-clock`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CronError {
    #[error("cron expression must have exactly 5 fields (minute hour day month weekday), got {0}")]
    WrongFieldCount(usize),
    #[error("invalid cron field {field:?} in position {position}")]
    InvalidField { field: String, position: usize },
}

/// Whether a single cron field (`*`, `*/N`, `a,b,c`, `a-b`, or a bare
/// number) matches `value`.
pub fn field_matches(field: &str, value: u32) -> Result<bool, CronError> {
    if field == "*" {
        return Ok(true);
    }
    if let Some(step) = field.strip_prefix("*/") {
        let step: u32 = step
            .parse()
            .map_err(|_| CronError::InvalidField { field: field.into(), position: 0 })?;
        if step == 0 {
            return Err(CronError::InvalidField { field: field.into(), position: 0 });
        }
        return Ok(value % step == 0);
    }
    if field.contains(',') {
        for part in field.split(',') {
            if field_matches(part, value)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if let Some((lo, hi)) = field.split_once('-') {
        let lo: u32 = lo
            .parse()
            .map_err(|_| CronError::InvalidField { field: field.into(), position: 0 })?;
        let hi: u32 = hi
            .parse()
            .map_err(|_| CronError::InvalidField { field: field.into(), position: 0 })?;
        return Ok(value >= lo && value <= hi);
    }
    let n: u32 = field
        .parse()
        .map_err(|_| CronError::InvalidField { field: field.into(), position: 0 })?;
    Ok(n == value)
}

/// Split a 5-field cron expression and sanity-check each field's syntax
/// (does not validate against a concrete instant).
pub fn validate_cron(expr: &str) -> Result<(), CronError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(CronError::WrongFieldCount(fields.len()));
    }
    // Probe each field against value 0 purely to exercise the parser; any
    // syntax error surfaces regardless of the probed value.
    for (i, field) in fields.iter().enumerate() {
        field_matches(field, 0).map_err(|_| CronError::InvalidField {
            field: (*field).to_string(),
            position: i,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_everything() {
        assert_eq!(field_matches("*", 42), Ok(true));
    }

    #[test]
    fn step_matches_multiples() {
        assert_eq!(field_matches("*/15", 30), Ok(true));
        assert_eq!(field_matches("*/15", 31), Ok(false));
    }

    #[test]
    fn list_matches_any_member() {
        assert_eq!(field_matches("1,3,5", 3), Ok(true));
        assert_eq!(field_matches("1,3,5", 4), Ok(false));
    }

    #[test]
    fn range_matches_inclusive_bounds() {
        assert_eq!(field_matches("9-17", 9), Ok(true));
        assert_eq!(field_matches("9-17", 17), Ok(true));
        assert_eq!(field_matches("9-17", 18), Ok(false));
    }

    #[test]
    fn bare_number_matches_exactly() {
        assert_eq!(field_matches("5", 5), Ok(true));
        assert_eq!(field_matches("5", 6), Ok(false));
    }

    #[test]
    fn validate_cron_rejects_wrong_field_count() {
        assert_eq!(validate_cron("* * *"), Err(CronError::WrongFieldCount(3)));
    }

    #[test]
    fn validate_cron_accepts_daily_at_nine() {
        assert!(validate_cron("0 9 * * *").is_ok());
    }

    #[test]
    fn validate_cron_rejects_garbage_field() {
        assert!(validate_cron("abc 9 * * *").is_err());
    }
}
