//! Area buckets.
//!
//! Two area codes are reported under their own label; every other code is
//! folded into the catch-all [`OTHER_AREAS`] bucket.

use std::collections::HashSet;

use crate::types::AppointmentRecord;

pub const OTHER_AREAS: &str = "Other Areas";

const NAMED_AREAS: [(&str, &str); 2] = [
    ("304", "304-Area 30 Tamara Fuente"),
    ("109", "109-Area 7 Eleonora Armonici"),
];

/// Bucket label for an area code.
pub fn bucket_for(area_code: &str) -> &'static str {
    let code = area_code.trim();
    NAMED_AREAS
        .iter()
        .find(|(named, _)| *named == code)
        .map(|(_, label)| *label)
        .unwrap_or(OTHER_AREAS)
}

pub fn is_other(area: &str) -> bool {
    area == OTHER_AREAS
}

/// Number of distinct area codes folded into "Other Areas", counted once
/// over the whole loaded table. Blank codes are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherAreasDivisor(usize);

impl OtherAreasDivisor {
    pub fn from_records(records: &[AppointmentRecord]) -> Self {
        let codes: HashSet<&str> = records
            .iter()
            .filter(|r| is_other(&r.area))
            .map(|r| r.area_code.trim())
            .filter(|code| !code.is_empty())
            .collect();
        OtherAreasDivisor(codes.len())
    }

    pub fn count(&self) -> usize {
        self.0
    }

    /// The divisor to apply, or `None` when no code was counted and
    /// apportionment is undefined.
    pub fn as_divisor(&self) -> Option<f64> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0 as f64)
        }
    }
}
