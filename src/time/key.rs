//! Date folder keys

use crate::config::Granularity;
use chrono::NaiveDateTime;
use std::fmt;

/// Name of a date folder, e.g. `20240305` (day) or `202403` (month)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(String);

impl DateKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for DateKey {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

/// Map a capture timestamp to its folder key.
///
/// The timestamp is used as recorded; no timezone conversion happens here.
pub fn classify(timestamp: &NaiveDateTime, granularity: Granularity) -> DateKey {
    let format = match granularity {
        Granularity::Day => "%Y%m%d",
        Granularity::Month => "%Y%m",
    };
    DateKey(timestamp.format(format).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_day_key() {
        assert_eq!(classify(&at(2024, 3, 5, 10, 0), Granularity::Day).as_str(), "20240305");
    }

    #[test]
    fn test_month_key() {
        assert_eq!(classify(&at(2024, 3, 5, 10, 0), Granularity::Month).as_str(), "202403");
    }

    #[test]
    fn test_truncates_time_of_day() {
        let morning = classify(&at(2023, 12, 31, 0, 0), Granularity::Day);
        let night = classify(&at(2023, 12, 31, 23, 59), Granularity::Day);
        assert_eq!(morning, night);

        let first = classify(&at(2023, 12, 1, 0, 0), Granularity::Month);
        let last = classify(&at(2023, 12, 31, 23, 59), Granularity::Month);
        assert_eq!(first, last);
        assert_ne!(first, classify(&at(2024, 1, 1, 0, 0), Granularity::Month));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let ts = at(2019, 7, 4, 18, 45);
        for granularity in [Granularity::Day, Granularity::Month] {
            let first = classify(&ts, granularity);
            for _ in 0..10 {
                assert_eq!(classify(&ts, granularity), first);
            }
        }
    }

    #[test]
    fn test_display_matches_folder_name() {
        let key = classify(&at(2021, 1, 9, 0, 0), Granularity::Day);
        assert_eq!(key.to_string(), "20210109");
        assert_eq!(std::path::Path::new("out").join(&key), std::path::Path::new("out/20210109"));
    }
}
