//! `BookingRepository`: async persistence interface for customers and bookings.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::BookingPayload;
use crate::error::DatabaseError;

/// Status written for bookings committed by the assistant.
pub const STATUS_CONFIRMED: &str = "confirmed";

/// A customer row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub customer_id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Fields for a new booking row.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: i64,
    pub booking_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A booking row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBooking {
    pub id: i64,
    pub customer_id: i64,
    pub booking_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A booking joined with its customer, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingListing {
    pub booking_id: i64,
    pub customer_id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub booking_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Filters for `list_bookings`. Empty filters match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    /// Case-insensitive substring of the customer name.
    pub name: Option<String>,
    /// Case-insensitive substring of the customer email.
    pub email: Option<String>,
    /// Exact check-in date.
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub date: Option<NaiveDate>,
}

/// Query strings send `date=` for "no filter".
fn blank_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Result of the composite `persist_booking` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistOutcome {
    pub success: bool,
    pub booking_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub error: Option<String>,
}

impl PersistOutcome {
    pub fn saved(booking_id: i64, customer_id: i64) -> Self {
        Self {
            success: true,
            booking_id: Some(booking_id),
            customer_id: Some(customer_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            booking_id: None,
            customer_id: None,
            error: Some(error.into()),
        }
    }
}

/// Backend-agnostic booking persistence.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Find a customer by exact email.
    async fn lookup_customer_by_email(&self, email: &str)
    -> Result<Option<Customer>, DatabaseError>;

    /// Insert a customer and return its id.
    async fn insert_customer(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<i64, DatabaseError>;

    /// Insert a booking and return its id.
    async fn insert_booking(&self, booking: &NewBooking) -> Result<i64, DatabaseError>;

    /// All bookings for the customer with this email, newest first.
    async fn find_bookings_by_email(&self, email: &str)
    -> Result<Vec<StoredBooking>, DatabaseError>;

    /// Bookings joined with customers, filtered, newest first.
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<Vec<BookingListing>, DatabaseError>;

    /// Reuse or create the customer, then insert a confirmed booking.
    ///
    /// Never returns an error: failures are reported in the outcome.
    async fn persist_booking(&self, payload: &BookingPayload) -> PersistOutcome {
        let customer_id = match self.lookup_customer_by_email(&payload.email).await {
            Ok(Some(customer)) => customer.customer_id,
            Ok(None) => match self
                .insert_customer(
                    &payload.customer_name,
                    &payload.email,
                    Some(payload.phone.as_str()),
                )
                .await
            {
                Ok(id) => id,
                Err(e) => return PersistOutcome::failed(e.to_string()),
            },
            Err(e) => return PersistOutcome::failed(e.to_string()),
        };

        let booking = NewBooking {
            customer_id,
            booking_type: payload.booking_type.clone(),
            date: payload.date,
            time: payload.time,
            status: STATUS_CONFIRMED.to_string(),
            created_at: Utc::now(),
        };
        match self.insert_booking(&booking).await {
            Ok(booking_id) => {
                tracing::info!(booking_id, customer_id, "Booking persisted");
                PersistOutcome::saved(booking_id, customer_id)
            }
            Err(e) => PersistOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_treats_blank_date_as_absent() {
        let filter: BookingFilter = serde_json::from_str(r#"{"name": "jane", "date": ""}"#).unwrap();
        assert_eq!(filter.name.as_deref(), Some("jane"));
        assert!(filter.date.is_none());

        let filter: BookingFilter = serde_json::from_str(r#"{"date": "2030-07-01"}"#).unwrap();
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2030, 7, 1));

        assert!(serde_json::from_str::<BookingFilter>(r#"{"date": "July 1"}"#).is_err());
    }
}
