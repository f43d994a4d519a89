// Rolling reporting window: the current Monday–Sunday week plus the twelve
// weeks before it.
use chrono::{Datelike, Duration, NaiveDate};

pub const WEEKS_BACK: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window anchored on `today`: from the Monday of the week twelve weeks
    /// back through the Sunday closing the current week, both inclusive.
    pub fn anchored_at(today: NaiveDate) -> Self {
        let back = today - Duration::weeks(WEEKS_BACK);
        let start = back - Duration::days(back.weekday().num_days_from_monday() as i64);
        let end = today + Duration::days(6 - today.weekday().num_days_from_monday() as i64);
        DateWindow { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
