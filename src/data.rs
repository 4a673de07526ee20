use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{RecordId, SalesRecord};

/// Load-once holder for the sales dataset.
///
/// The first call to [`SalesCache::records`] reads the file; later calls
/// hand out the retained rows until [`SalesCache::reload`] or
/// [`SalesCache::invalidate`] is called.
#[derive(Debug)]
pub struct SalesCache {
    path: PathBuf,
    records: Option<Arc<[SalesRecord]>>,
}

impl SalesCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    pub fn records(&mut self) -> anyhow::Result<Arc<[SalesRecord]>> {
        if let Some(records) = &self.records {
            return Ok(Arc::clone(records));
        }
        let records: Arc<[SalesRecord]> = load_sales(&self.path)?.into();
        self.records = Some(Arc::clone(&records));
        Ok(records)
    }

    pub fn reload(&mut self) -> anyhow::Result<Arc<[SalesRecord]>> {
        self.invalidate();
        self.records()
    }

    pub fn invalidate(&mut self) {
        self.records = None;
    }
}

pub fn load_sales(csv_path: &Path) -> anyhow::Result<Vec<SalesRecord>> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open sales data at {}", csv_path.display()))?;
    let records = read_sales(reader)
        .with_context(|| format!("failed to load sales data from {}", csv_path.display()))?;

    tracing::info!(
        rows = records.len(),
        path = %csv_path.display(),
        "loaded sales dataset"
    );
    Ok(records)
}

fn read_sales<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Vec<SalesRecord>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        sale_date: String,
        product_id: String,
        customer_id: String,
        quantity: u32,
        revenue: f64,
        profit_margin: f64,
    }

    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let row = result.with_context(|| format!("malformed row on line {line}"))?;

        let sale_date = parse_sale_date(&row.sale_date)
            .with_context(|| format!("invalid sale_date {:?} on line {line}", row.sale_date))?;

        if row.product_id.trim().is_empty() || row.customer_id.trim().is_empty() {
            bail!("missing product_id or customer_id on line {line}");
        }
        if !row.revenue.is_finite() || !row.profit_margin.is_finite() {
            bail!("non-finite revenue or profit_margin on line {line}");
        }

        records.push(SalesRecord {
            sale_date,
            product_id: RecordId::new(row.product_id.trim()),
            customer_id: RecordId::new(row.customer_id.trim()),
            quantity: row.quantity,
            revenue: row.revenue,
            profit_margin: row.profit_margin,
        });
    }

    Ok(records)
}

/// Accepts plain dates and timestamps; timestamps keep only their date.
pub fn parse_sale_date(raw: &str) -> anyhow::Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(timestamp.date());
        }
    }
    let timestamp = DateTime::parse_from_rfc3339(raw).context("unrecognised date format")?;
    Ok(timestamp.date_naive())
}
