use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{DateRange, Dimension, KeyTotal, Measure, SalesRecord};
use crate::report;

/// Ranks keys by their summed `measure` over the rows inside `window`.
///
/// Highest total first; equal totals fall back to ascending key order.
/// At most `n` entries are returned.
pub fn top_n(
    records: &[SalesRecord],
    dimension: Dimension,
    measure: Measure,
    window: DateRange,
    n: usize,
) -> Vec<KeyTotal> {
    let in_window = report::filter_by_date(records, window);
    let mut totals = report::group_sum(&in_window, dimension, measure);

    totals.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    totals.truncate(n);
    totals
}

/// `[reference - days, reference]`. Negative lengths collapse to the reference day.
pub fn trailing_window(reference: NaiveDate, days: i64) -> DateRange {
    let start = Duration::try_days(days.max(0))
        .and_then(|span| reference.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN);
    DateRange::new(start, reference)
}

/// From the first day of the reference month through the reference day.
pub fn month_to_date_window(reference: NaiveDate) -> DateRange {
    let start = reference.with_day(1).unwrap_or(reference);
    DateRange::new(start, reference)
}
