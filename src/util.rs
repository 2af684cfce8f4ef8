use chrono::{Days, NaiveDate, NaiveDateTime};

/// Date format of the page's from/to inputs.
pub const PAGE_DATE: &str = "%m/%d/%Y";
/// Date format of the `date` column of a cache file.
pub const CACHE_DATE: &str = "%Y-%m-%d";

pub fn parse_page_date(date_str: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(date_str.trim(), PAGE_DATE);
    tracing::debug!(target: "date-converter", "{date_str:?} -> {date:?}");

    date.ok()
}

pub fn format_page_date(date: NaiveDate) -> String {
    date.format(PAGE_DATE).to_string()
}

/// Accepts both a bare date and a midnight timestamp, the latter being what
/// older caches carry in their `date` column.
pub fn parse_cache_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();
    NaiveDate::parse_from_str(date_str, CACHE_DATE)
        .or_else(|_| NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

#[inline]
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

#[inline]
pub fn prev_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN)
}

/// Parses a count cell such as `12,345`.
pub fn parse_count(text: &str) -> Option<u64> {
    text.trim().replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_dates() {
        let date = parse_page_date(" 07/09/2023 ").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 7, 9).unwrap());
        assert_eq!(format_page_date(date), "07/09/2023");
        assert!(parse_page_date("2023-07-09").is_none());
    }

    #[test]
    fn cache_dates_accept_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2023, 6, 20);
        assert_eq!(parse_cache_date("2023-06-20"), expected);
        assert_eq!(parse_cache_date("2023-06-20 00:00:00"), expected);
        assert_eq!(parse_cache_date("20/06/2023"), None);
    }

    #[test]
    fn day_steps_cross_month_end() {
        let last = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(next_day(last), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(prev_day(next_day(last)), last);
    }

    #[test]
    fn counts_with_separators() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count(" 17 "), Some(17));
        assert_eq!(parse_count("-"), None);
    }
}
