use chrono::{Local, NaiveDateTime};

/// Source of "now" for every business-rule decision. Timestamps are naive
/// local wall-clock values throughout; the delivery time windows are defined
/// in the server's local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
