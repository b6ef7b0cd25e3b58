use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::TripCategory;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_category(value: &str) -> Result<TripCategory> {
    match value {
        "Unclassified" => Ok(TripCategory::Unclassified),
        "Business" => Ok(TripCategory::Business),
        "Personal" => Ok(TripCategory::Personal),
        other => Err(anyhow!("unknown trip category {other}")),
    }
}

/// SQLite REAL columns must not receive NaN.
pub fn finite(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("{field} is not a finite number: {value}"))
    }
}
