//! Sales reporting engine: date filtering, KPIs, grouped totals and
//! time-windowed leaderboards over an in-memory sales dataset.

pub mod data;
pub mod error;
pub mod leaderboard;
pub mod models;
pub mod report;

pub use error::ReportError;
pub use models::{DateRange, ReportResult, SalesRecord};
