use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{finite, parse_category, parse_datetime},
    models::{MileageSummary, Trip, TripCategory},
};
use crate::detection::{StoreError, TripStore};

const TRIP_COLUMNS: &str = "id, date, start_odometer, end_odometer, distance, category, purpose, notes, is_auto_detected";

fn row_to_trip(row: &Row) -> Result<Trip> {
    let date: String = row.get("date")?;
    let category: String = row.get("category")?;

    Ok(Trip {
        id: row.get("id")?,
        date: parse_datetime(&date, "date")?,
        start_odometer: row.get("start_odometer")?,
        end_odometer: row.get("end_odometer")?,
        distance: row.get("distance")?,
        category: parse_category(&category)?,
        purpose: row.get("purpose")?,
        notes: row.get("notes")?,
        is_auto_detected: row.get("is_auto_detected")?,
    })
}

fn insert_trip_row(conn: &rusqlite::Connection, trip: &Trip) -> Result<()> {
    conn.execute(
        "INSERT INTO trips (id, date, start_odometer, end_odometer, distance, category, purpose, notes, is_auto_detected, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            trip.id,
            trip.date.to_rfc3339(),
            finite(trip.start_odometer, "start_odometer")?,
            finite(trip.end_odometer, "end_odometer")?,
            finite(trip.distance, "distance")?,
            trip.category.as_str(),
            trip.purpose,
            trip.notes,
            trip.is_auto_detected,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("failed to insert trip {}", trip.id))?;
    Ok(())
}

impl Database {
    pub async fn insert_trip(&self, trip: &Trip) -> Result<()> {
        let record = trip.clone();
        self.execute(move |conn| insert_trip_row(conn, &record)).await
    }

    pub fn insert_trip_blocking(&self, trip: &Trip) -> Result<()> {
        let record = trip.clone();
        self.execute_blocking(move |conn| insert_trip_row(conn, &record))
    }

    /// All trips, newest first.
    pub async fn get_trips(&self) -> Result<Vec<Trip>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TRIP_COLUMNS} FROM trips ORDER BY date DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut trips = Vec::new();
            while let Some(row) = rows.next()? {
                trips.push(row_to_trip(row)?);
            }

            Ok(trips)
        })
        .await
    }

    pub async fn get_trip(&self, trip_id: &str) -> Result<Option<Trip>> {
        let trip_id = trip_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1"))?;
            let trip = stmt
                .query_row(params![trip_id], |row| Ok(row_to_trip(row)))
                .optional()?
                .transpose()?;
            Ok(trip)
        })
        .await
    }

    /// Returns false when no trip had that id.
    pub async fn delete_trip(&self, trip_id: &str) -> Result<bool> {
        let trip_id = trip_id.to_string();
        self.execute(move |conn| {
            let removed = conn
                .execute("DELETE FROM trips WHERE id = ?1", params![trip_id])
                .with_context(|| format!("failed to delete trip {trip_id}"))?;
            Ok(removed > 0)
        })
        .await
    }

    /// Per-category totals over the whole log. `rate` is the deduction per business mile.
    pub async fn mileage_summary(&self, rate: f64) -> Result<MileageSummary> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT category, COALESCE(SUM(distance), 0), COUNT(*) FROM trips GROUP BY category",
            )?;

            let mut rows = stmt.query([])?;
            let mut summary = MileageSummary::default();
            while let Some(row) = rows.next()? {
                let category: String = row.get(0)?;
                let miles: f64 = row.get(1)?;
                let count: u32 = row.get(2)?;
                match parse_category(&category)? {
                    TripCategory::Business => {
                        summary.business_miles = miles;
                        summary.business_trips = count;
                    }
                    TripCategory::Personal => {
                        summary.personal_miles = miles;
                        summary.personal_trips = count;
                    }
                    TripCategory::Unclassified => {
                        summary.unclassified_miles = miles;
                        summary.unclassified_trips = count;
                    }
                }
            }
            summary.deduction = summary.business_miles * rate;

            Ok(summary)
        })
        .await
    }
}

impl TripStore for Database {
    fn insert(&mut self, trip: &Trip) -> Result<(), StoreError> {
        self.insert_trip_blocking(trip).map_err(StoreError::from)
    }
}
