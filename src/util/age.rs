use chrono::{Local, NaiveDate, TimeZone};

/// Epoch values below this are taken to be seconds rather than milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalize an epoch timestamp in seconds or milliseconds to milliseconds.
///
/// ```
/// use skimly::util::epoch_to_millis;
///
/// assert_eq!(epoch_to_millis(1_700_000_000), 1_700_000_000_000);
/// assert_eq!(epoch_to_millis(1_700_000_000_000), 1_700_000_000_000);
/// ```
pub fn epoch_to_millis(epoch: i64) -> i64 {
    if epoch < MILLIS_THRESHOLD {
        epoch.saturating_mul(1000)
    } else {
        epoch
    }
}

/// Whole local calendar days between `epoch` and `today`, never negative.
///
/// # Arguments
///
/// * `epoch` - Timestamp in seconds or milliseconds
/// * `today` - The local date to measure against
///
/// An entry from late yesterday is one day old, however few hours ago it was
/// published. Future timestamps count as 0.
pub fn age_in_days(epoch: i64, today: NaiveDate) -> i64 {
    match Local.timestamp_millis_opt(epoch_to_millis(epoch)).earliest() {
        Some(published) => (today - published.date_naive()).num_days().max(0),
        None => 0,
    }
}

/// Render an entry's age as "N days ago" relative to `today`.
///
/// ```
/// use chrono::{Local, NaiveDate, TimeZone};
/// use skimly::util::format_age_days;
///
/// let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
/// let published = Local.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
/// assert_eq!(format_age_days(published.timestamp_millis(), today), "2 days ago");
/// assert_eq!(format_age_days(published.timestamp(), today), "2 days ago");
/// ```
pub fn format_age_days(epoch: i64, today: NaiveDate) -> String {
    let days = age_in_days(epoch, today);
    let plural = if days == 1 { "" } else { "s" };
    format!("{days} day{plural} ago")
}

/// [`format_age_days`] relative to the current local date.
pub fn format_age(epoch: i64) -> String {
    format_age_days(epoch, Local::now().date_naive())
}
