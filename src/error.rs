use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    /// Mean and max-by-sum are undefined over zero rows.
    #[error("no sales records in the selected date range")]
    EmptyDataset,
}
