use std::cmp::Ordering;
use std::fmt;

use anyhow::bail;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque product or customer identifier as it appears in the dataset.
///
/// Ordering is only used by sort steps: plain integer ids compare
/// numerically (so `2` sorts before `10`), anything else compares as text,
/// and integer ids sort ahead of textual ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> (bool, Option<i64>, &str) {
        let numeric = self.0.trim().parse::<i64>().ok();
        (numeric.is_none(), numeric, &self.0)
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub sale_date: NaiveDate,
    pub product_id: RecordId,
    pub customer_id: RecordId,
    pub quantity: u32,
    pub revenue: f64,
    pub profit_margin: f64,
}

/// Inclusive on both ends. `start <= end` is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Earliest to latest sale date, or `None` for an empty dataset.
    pub fn spanning(records: &[SalesRecord]) -> Option<Self> {
        let start = records.iter().map(|record| record.sale_date).min()?;
        let end = records.iter().map(|record| record.sale_date).max()?;
        Some(Self { start, end })
    }

    /// Fills each missing bound from the dataset's span, or from `as_of`
    /// when the dataset is empty, and rejects a start after the end.
    pub fn resolve(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        records: &[SalesRecord],
        as_of: NaiveDate,
    ) -> anyhow::Result<Self> {
        let span = Self::spanning(records);
        let start = from.or(span.map(|s| s.start)).unwrap_or(as_of);
        let end = to.or(span.map(|s| s.end)).unwrap_or(as_of);
        if start > end {
            bail!("start date {start} must not be after end date {end}");
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Field a record set is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Product,
    Customer,
}

impl Dimension {
    pub fn key<'a>(&self, record: &'a SalesRecord) -> &'a RecordId {
        match self {
            Dimension::Product => &record.product_id,
            Dimension::Customer => &record.customer_id,
        }
    }
}

/// Numeric field summed within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Quantity,
    Revenue,
    ProfitMargin,
}

impl Measure {
    pub fn value(&self, record: &SalesRecord) -> f64 {
        match self {
            Measure::Quantity => f64::from(record.quantity),
            Measure::Revenue => record.revenue,
            Measure::ProfitMargin => record.profit_margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyTotal {
    pub key: RecordId,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub sale_date: NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_revenue: f64,
    pub total_profit: f64,
    pub average_margin: f64,
    pub top_product_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResult {
    pub range: DateRange,
    pub as_of: NaiveDate,
    pub record_count: usize,
    /// Absent when the filtered subset is empty.
    pub kpis: Option<Kpis>,
    pub product_profit: Vec<KeyTotal>,
    pub revenue_series: Vec<RevenuePoint>,
    pub revenue_share: Vec<KeyTotal>,
    pub top_recent_products: Vec<KeyTotal>,
    pub top_monthly_customers: Vec<KeyTotal>,
}
