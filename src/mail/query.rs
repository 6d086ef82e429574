use chrono::{Days, NaiveDate};

/// Append `before:<today - max_age_days>` (YYYY/MM/DD) to the caller's filter.
pub fn listing_query(base: &str, max_age_days: u32, today: NaiveDate) -> String {
    let threshold = today
        .checked_sub_days(Days::new(u64::from(max_age_days)))
        .unwrap_or(NaiveDate::MIN);
    let before = format!("before:{}", threshold.format("%Y/%m/%d"));
    let base = base.trim();
    if base.is_empty() {
        before
    } else {
        format!("{base} {before}")
    }
}
