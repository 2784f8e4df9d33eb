//! Business rules for the delivery workflow. Pure functions over timestamps
//! and prior state; callers gather the inputs (current time, stored rows,
//! request fields) and map violations onto HTTP responses.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

/// Maximum non-canceled collections per deliveryman per calendar day.
pub const DAILY_DELIVERY_LIMIT: usize = 5;

const WINDOW_OPENS_HOUR: u32 = 8;
const COLLECTION_CLOSES_HOUR: u32 = 19;
const START_DATE_CLOSES_HOUR: u32 = 18;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("Start date must be between 08:00 and 18:00.")]
    OutsideAllowedWindow,
    #[error("You can make only 5 deliveries / day.")]
    DailyCapExceeded,
    #[error("End date must be after Start date.")]
    EndBeforeStart,
    #[error("Signature not sent.")]
    SignatureMissing,
}

/// Collections are accepted from 08:00:00 inclusive to 19:00:00 exclusive,
/// local time of the attempt's own day.
pub fn check_collection_window(at: NaiveDateTime) -> Result<(), RuleViolation> {
    check_window(at, COLLECTION_CLOSES_HOUR)
}

/// An administratively supplied start_date must fall within 08:00:00
/// inclusive to 18:00:00 exclusive of its own day. The upper bound differs
/// from the collection window's by one hour; both bounds are kept as found.
pub fn check_start_date_window(at: NaiveDateTime) -> Result<(), RuleViolation> {
    check_window(at, START_DATE_CLOSES_HOUR)
}

fn check_window(at: NaiveDateTime, closes_hour: u32) -> Result<(), RuleViolation> {
    let seconds = at.num_seconds_from_midnight();
    if seconds >= WINDOW_OPENS_HOUR * 3600 && seconds < closes_hour * 3600 {
        Ok(())
    } else {
        Err(RuleViolation::OutsideAllowedWindow)
    }
}

/// Refuses once the deliveryman already has `DAILY_DELIVERY_LIMIT`
/// qualifying collections; the attempt itself is not counted.
pub fn check_daily_limit(existing: usize) -> Result<(), RuleViolation> {
    if existing >= DAILY_DELIVERY_LIMIT {
        Err(RuleViolation::DailyCapExceeded)
    } else {
        Ok(())
    }
}

/// Half-open range covering the calendar day of `at`: midnight inclusive to
/// the next midnight exclusive. Used to count a deliveryman's collections
/// for the day.
pub fn collection_day_range(at: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let start = at.date().and_time(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

/// The end date must not precede the effective start. A start supplied in
/// the same request wins over the stored one; equality passes; with no
/// start from either source the end is refused.
pub fn check_end_after_start(
    stored_start: Option<NaiveDateTime>,
    supplied_start: Option<NaiveDateTime>,
    end: NaiveDateTime,
) -> Result<(), RuleViolation> {
    match supplied_start.or(stored_start) {
        Some(start) if end >= start => Ok(()),
        _ => Err(RuleViolation::EndBeforeStart),
    }
}

/// Finishing a delivery requires the signature image in the same request.
pub fn check_signature_present(has_signature: bool) -> Result<(), RuleViolation> {
    if has_signature {
        Ok(())
    } else {
        Err(RuleViolation::SignatureMissing)
    }
}
