use serde::{Deserialize, Serialize};

/// Mileage totals per category, as shown on the summary screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MileageSummary {
    pub business_miles: f64,
    pub personal_miles: f64,
    pub unclassified_miles: f64,
    pub business_trips: u32,
    pub personal_trips: u32,
    pub unclassified_trips: u32,
    /// Business miles times the mileage rate in effect when the summary was built
    pub deduction: f64,
}
