use chrono::{Duration, NaiveDate};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Physical representation of a polars `Date` value.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_days() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 24).unwrap();
        assert_eq!(days_to_date(date_to_days(date)), date);
        assert_eq!(date_to_days(epoch()), 0);
    }
}
