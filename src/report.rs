use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::error::ReportError;
use crate::leaderboard;
use crate::models::{
    DateRange, Dimension, KeyTotal, Kpis, Measure, ReportResult, RevenuePoint, SalesRecord,
};

/// Knobs for the two time-windowed leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardSettings {
    pub trailing_days: i64,
    pub limit: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            trailing_days: 7,
            limit: 5,
        }
    }
}

pub fn filter_by_date(records: &[SalesRecord], range: DateRange) -> Vec<SalesRecord> {
    records
        .iter()
        .filter(|record| range.contains(record.sale_date))
        .cloned()
        .collect()
}

pub fn compute_kpis(records: &[SalesRecord]) -> Result<Kpis, ReportError> {
    if records.is_empty() {
        return Err(ReportError::EmptyDataset);
    }

    let total_revenue: f64 = records.iter().map(|record| record.revenue).sum();
    let total_profit: f64 = records.iter().map(|record| record.profit_margin).sum();
    let average_margin = total_profit / records.len() as f64;

    // group_sum is ascending by key, so keeping only strictly larger totals
    // resolves ties to the lowest product id.
    let mut top: Option<KeyTotal> = None;
    for entry in group_sum(records, Dimension::Product, Measure::Revenue) {
        if top.as_ref().map_or(true, |best| entry.total > best.total) {
            top = Some(entry);
        }
    }
    let top_product_id = top.map(|entry| entry.key).ok_or(ReportError::EmptyDataset)?;

    Ok(Kpis {
        total_revenue,
        total_profit,
        average_margin,
        top_product_id,
    })
}

/// Sums `measure` per distinct `dimension` key, ascending by key.
pub fn group_sum(records: &[SalesRecord], dimension: Dimension, measure: Measure) -> Vec<KeyTotal> {
    let mut totals: BTreeMap<_, f64> = BTreeMap::new();

    for record in records {
        *totals.entry(dimension.key(record)).or_insert(0.0) += measure.value(record);
    }

    totals
        .into_iter()
        .map(|(key, total)| KeyTotal {
            key: key.clone(),
            total,
        })
        .collect()
}

/// One point per row, ordered by sale date.
pub fn revenue_series(records: &[SalesRecord]) -> Vec<RevenuePoint> {
    let mut points: Vec<RevenuePoint> = records
        .iter()
        .map(|record| RevenuePoint {
            sale_date: record.sale_date,
            revenue: record.revenue,
        })
        .collect();
    points.sort_by_key(|point| point.sale_date);
    points
}

pub fn build_report(
    records: &[SalesRecord],
    range: DateRange,
    as_of: NaiveDate,
    settings: LeaderboardSettings,
) -> ReportResult {
    let filtered = filter_by_date(records, range);
    tracing::debug!(
        total = records.len(),
        retained = filtered.len(),
        %range,
        "filtered sales by date"
    );

    let kpis = match compute_kpis(&filtered) {
        Ok(kpis) => Some(kpis),
        Err(err) => {
            tracing::warn!(%range, "{err}");
            None
        }
    };

    let top_recent_products = leaderboard::top_n(
        &filtered,
        Dimension::Product,
        Measure::Quantity,
        leaderboard::trailing_window(as_of, settings.trailing_days),
        settings.limit,
    );
    let top_monthly_customers = leaderboard::top_n(
        &filtered,
        Dimension::Customer,
        Measure::Revenue,
        leaderboard::month_to_date_window(as_of),
        settings.limit,
    );

    ReportResult {
        range,
        as_of,
        record_count: filtered.len(),
        kpis,
        product_profit: group_sum(&filtered, Dimension::Product, Measure::ProfitMargin),
        revenue_series: revenue_series(&filtered),
        revenue_share: group_sum(&filtered, Dimension::Product, Measure::Revenue),
        top_recent_products,
        top_monthly_customers,
    }
}

/// `1234.5` becomes `1,234.50`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

pub fn render_markdown(report: &ReportResult, settings: LeaderboardSettings) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Sales Dashboard");
    let _ = writeln!(
        output,
        "Sales from {} ({} records, as of {})",
        report.range, report.record_count, report.as_of
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Figures");

    match &report.kpis {
        Some(kpis) => {
            let _ = writeln!(output, "- Total revenue: {}", format_amount(kpis.total_revenue));
            let _ = writeln!(output, "- Total profit: {}", format_amount(kpis.total_profit));
            let _ = writeln!(output, "- Average margin: {:.2}", kpis.average_margin);
            let _ = writeln!(output, "- Top product: ID {}", kpis.top_product_id);
        }
        None => {
            let _ = writeln!(output, "- Total revenue: N/A");
            let _ = writeln!(output, "- Total profit: N/A");
            let _ = writeln!(output, "- Average margin: N/A");
            let _ = writeln!(output, "- Top product: N/A");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Profit by Product");
    if report.product_profit.is_empty() {
        let _ = writeln!(output, "No sales recorded for this range.");
    } else {
        let _ = writeln!(output, "| Product | Profit |");
        let _ = writeln!(output, "|---|---:|");
        for entry in &report.product_profit {
            let _ = writeln!(output, "| {} | {} |", entry.key, format_amount(entry.total));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue Over Time");
    if report.revenue_series.is_empty() {
        let _ = writeln!(output, "No sales recorded for this range.");
    } else {
        let _ = writeln!(output, "| Date | Revenue |");
        let _ = writeln!(output, "|---|---:|");
        for point in &report.revenue_series {
            let _ = writeln!(output, "| {} | {} |", point.sale_date, format_amount(point.revenue));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue Share by Product");
    let total_revenue: f64 = report.revenue_share.iter().map(|entry| entry.total).sum();
    if report.revenue_share.is_empty() {
        let _ = writeln!(output, "No sales recorded for this range.");
    } else {
        for entry in &report.revenue_share {
            let share = if total_revenue == 0.0 {
                0.0
            } else {
                entry.total / total_revenue * 100.0
            };
            let _ = writeln!(
                output,
                "- Product {}: {} ({:.1}%)",
                entry.key,
                format_amount(entry.total),
                share
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Top {} Products (last {} days)",
        settings.limit, settings.trailing_days
    );
    if report.top_recent_products.is_empty() {
        let _ = writeln!(output, "No products sold in this window.");
    } else {
        for (rank, entry) in report.top_recent_products.iter().enumerate() {
            let _ = writeln!(output, "{}. Product {}: {} units", rank + 1, entry.key, entry.total);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top {} Customers (month to date)", settings.limit);
    if report.top_monthly_customers.is_empty() {
        let _ = writeln!(output, "No customer purchases this month.");
    } else {
        for (rank, entry) in report.top_monthly_customers.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. Customer {}: {}",
                rank + 1,
                entry.key,
                format_amount(entry.total)
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(
        sale_date: NaiveDate,
        product: &str,
        customer: &str,
        quantity: u32,
        revenue: f64,
        profit_margin: f64,
    ) -> SalesRecord {
        SalesRecord {
            sale_date,
            product_id: RecordId::from(product),
            customer_id: RecordId::from(customer),
            quantity,
            revenue,
            profit_margin,
        }
    }

    fn two_day_sample() -> Vec<SalesRecord> {
        vec![
            sale(date(2024, 1, 1), "P1", "C1", 2, 100.0, 10.0),
            sale(date(2024, 1, 2), "P2", "C1", 1, 50.0, 5.0),
        ]
    }

    #[test]
    fn filter_keeps_only_rows_inside_range() {
        let records = vec![
            sale(date(2023, 12, 31), "1", "1", 1, 1.0, 0.1),
            sale(date(2024, 1, 1), "2", "1", 1, 1.0, 0.1),
            sale(date(2024, 1, 15), "3", "1", 1, 1.0, 0.1),
            sale(date(2024, 2, 1), "4", "1", 1, 1.0, 0.1),
        ];
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31));
        let filtered = filter_by_date(&records, range);

        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|record| range.contains(record.sale_date)));
        assert!(filtered.iter().all(|record| records.contains(record)));
    }

    #[test]
    fn filter_without_matches_is_empty() {
        let range = DateRange::new(date(2030, 1, 1), date(2030, 1, 31));
        assert!(filter_by_date(&two_day_sample(), range).is_empty());
    }

    #[test]
    fn kpis_for_two_day_scenario() {
        let records = two_day_sample();
        let filtered = filter_by_date(&records, DateRange::new(date(2024, 1, 1), date(2024, 1, 2)));
        let kpis = compute_kpis(&filtered).unwrap();

        assert_eq!(kpis.total_revenue, 150.0);
        assert_eq!(kpis.total_profit, 15.0);
        assert_eq!(kpis.average_margin, 7.5);
        assert_eq!(kpis.top_product_id.as_str(), "P1");
    }

    #[test]
    fn kpis_for_single_row_mirror_the_row() {
        let records = vec![sale(date(2024, 6, 3), "42", "7", 3, 19.99, 4.5)];
        let kpis = compute_kpis(&records).unwrap();

        assert_eq!(kpis.total_revenue, 19.99);
        assert_eq!(kpis.average_margin, 4.5);
        assert_eq!(kpis.top_product_id.as_str(), "42");
    }

    #[test]
    fn kpis_on_empty_set_fail() {
        assert_eq!(compute_kpis(&[]), Err(ReportError::EmptyDataset));
    }

    #[test]
    fn top_product_uses_summed_revenue() {
        let records = vec![
            sale(date(2024, 1, 1), "1", "1", 1, 80.0, 1.0),
            sale(date(2024, 1, 1), "2", "1", 1, 60.0, 1.0),
            sale(date(2024, 1, 2), "2", "1", 1, 60.0, 1.0),
        ];
        assert_eq!(compute_kpis(&records).unwrap().top_product_id.as_str(), "2");
    }

    #[test]
    fn top_product_tie_goes_to_lowest_id() {
        let records = vec![
            sale(date(2024, 1, 1), "9", "1", 1, 50.0, 1.0),
            sale(date(2024, 1, 1), "3", "1", 1, 50.0, 1.0),
        ];
        assert_eq!(compute_kpis(&records).unwrap().top_product_id.as_str(), "3");
    }

    #[test]
    fn group_sum_covers_each_key_once_in_order() {
        let records = vec![
            sale(date(2024, 1, 1), "10", "1", 1, 1.0, 2.0),
            sale(date(2024, 1, 1), "2", "1", 1, 1.0, 3.0),
            sale(date(2024, 1, 2), "10", "1", 1, 1.0, 4.0),
            sale(date(2024, 1, 3), "1", "1", 1, 1.0, 0.5),
        ];
        let totals = group_sum(&records, Dimension::Product, Measure::ProfitMargin);
        let pairs: Vec<(&str, f64)> = totals.iter().map(|e| (e.key.as_str(), e.total)).collect();

        assert_eq!(pairs, vec![("1", 0.5), ("2", 3.0), ("10", 6.0)]);
    }

    #[test]
    fn group_sum_on_empty_input_is_empty() {
        assert!(group_sum(&[], Dimension::Customer, Measure::Revenue).is_empty());
    }

    #[test]
    fn revenue_series_keeps_every_row() {
        let records = vec![
            sale(date(2024, 1, 3), "1", "1", 1, 30.0, 1.0),
            sale(date(2024, 1, 1), "1", "1", 1, 10.0, 1.0),
            sale(date(2024, 1, 3), "2", "1", 1, 5.0, 1.0),
        ];
        let series = revenue_series(&records);
        let points: Vec<(NaiveDate, f64)> = series.iter().map(|p| (p.sale_date, p.revenue)).collect();

        assert_eq!(
            points,
            vec![
                (date(2024, 1, 1), 10.0),
                (date(2024, 1, 3), 30.0),
                (date(2024, 1, 3), 5.0),
            ]
        );
    }

    #[test]
    fn leaderboards_apply_on_top_of_the_range_filter() {
        let records = vec![
            sale(date(2024, 3, 1), "1", "C1", 4, 40.0, 4.0),
            sale(date(2024, 3, 8), "2", "C2", 9, 90.0, 9.0),
            sale(date(2024, 3, 9), "3", "C3", 1, 10.0, 1.0),
        ];
        // Range stops before the March 9th sale even though the windows reach it.
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 8));
        let report = build_report(&records, range, date(2024, 3, 10), LeaderboardSettings::default());

        assert_eq!(report.record_count, 2);
        let recent: Vec<&str> = report.top_recent_products.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(recent, vec!["2"]);
        let customers: Vec<&str> = report.top_monthly_customers.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(customers, vec!["C2", "C1"]);
        assert_eq!(report.revenue_share.len(), 2);
    }

    #[test]
    fn empty_range_report_has_no_kpis() {
        let range = DateRange::new(date(2030, 1, 1), date(2030, 1, 2));
        let report = build_report(&two_day_sample(), range, date(2030, 1, 2), LeaderboardSettings::default());

        assert!(report.kpis.is_none());
        assert!(report.product_profit.is_empty());
        assert!(report.top_recent_products.is_empty());

        let markdown = render_markdown(&report, LeaderboardSettings::default());
        assert!(markdown.contains("- Total revenue: N/A"));
        assert!(markdown.contains("No products sold in this window."));
    }

    #[test]
    fn markdown_lists_kpis_and_shares() {
        let records = two_day_sample();
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 2));
        let settings = LeaderboardSettings::default();
        let report = build_report(&records, range, date(2024, 1, 2), settings);
        let markdown = render_markdown(&report, settings);

        assert!(markdown.contains("- Total revenue: 150.00"));
        assert!(markdown.contains("- Average margin: 7.50"));
        assert!(markdown.contains("- Top product: ID P1"));
        assert!(markdown.contains("- Product P1: 100.00 (66.7%)"));
        assert!(markdown.contains("1. Product P1: 2 units"));
        assert!(markdown.contains("1. Customer C1: 150.00"));
    }

    #[test]
    fn amounts_get_thousands_separators() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.999), "1,000.00");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(-9876543.21), "-9,876,543.21");
    }

    #[test]
    fn build_report_is_repeatable() {
        let records = two_day_sample();
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 2));
        let first = build_report(&records, range, date(2024, 1, 2), LeaderboardSettings::default());
        let second = build_report(&records, range, date(2024, 1, 2), LeaderboardSettings::default());
        assert_eq!(first, second);
    }
}
