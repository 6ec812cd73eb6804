//! libSQL backend: async `BookingRepository` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    BookingFilter, BookingListing, BookingRepository, Customer, NewBooking, StoredBooking,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests and ephemeral runs).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_date_column(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DatabaseError::Query(format!("bad date column '{s}': {e}")))
}

fn parse_time_column(s: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| DatabaseError::Query(format!("bad time column '{s}': {e}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Blank filters are treated as absent.
fn filter_text(s: &Option<String>) -> libsql::Value {
    opt_text(s.as_deref().map(str::trim).filter(|s| !s.is_empty()))
}

const BOOKING_COLUMNS: &str = "id, customer_id, booking_type, date, time, status, created_at";

/// Map a row to a StoredBooking. Column order matches BOOKING_COLUMNS.
fn row_to_booking(row: &libsql::Row) -> Result<StoredBooking, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));
    let date: String = row.get(3).map_err(parse)?;
    let time: String = row.get(4).map_err(parse)?;
    let created: String = row.get(6).map_err(parse)?;
    Ok(StoredBooking {
        id: row.get(0).map_err(parse)?,
        customer_id: row.get(1).map_err(parse)?,
        booking_type: row.get(2).map_err(parse)?,
        date: parse_date_column(&date)?,
        time: parse_time_column(&time)?,
        status: row.get(5).map_err(parse)?,
        created_at: parse_datetime(&created),
    })
}

const LISTING_COLUMNS: &str = "b.id, c.customer_id, c.name, c.email, c.phone, b.booking_type, \
     b.date, b.time, b.status, b.created_at";

fn row_to_listing(row: &libsql::Row) -> Result<BookingListing, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));
    let date: String = row.get(6).map_err(parse)?;
    let time: String = row.get(7).map_err(parse)?;
    let created: String = row.get(9).map_err(parse)?;
    Ok(BookingListing {
        booking_id: row.get(0).map_err(parse)?,
        customer_id: row.get(1).map_err(parse)?,
        name: row.get(2).map_err(parse)?,
        email: row.get(3).map_err(parse)?,
        phone: row.get(4).ok(),
        booking_type: row.get(5).map_err(parse)?,
        date: parse_date_column(&date)?,
        time: parse_time_column(&time)?,
        status: row.get(8).map_err(parse)?,
        created_at: parse_datetime(&created),
    })
}

/// Classify an insert failure. UNIQUE violations become `Constraint`.
fn insert_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Read the single `RETURNING` id row of an insert. With `RETURNING`,
/// constraint failures are reported by the first `next`, not by `query`.
async fn returned_id(mut rows: libsql::Rows, op: &str) -> Result<i64, DatabaseError> {
    match rows.next().await {
        Ok(Some(row)) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}"))),
        Ok(None) => Err(DatabaseError::Query(format!("{op}: no id returned"))),
        Err(e) => Err(insert_error(op, e)),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl BookingRepository for LibSqlBackend {
    async fn lookup_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT customer_id, name, email, phone FROM customers WHERE email = ?1",
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("lookup_customer_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));
                Ok(Some(Customer {
                    customer_id: row.get(0).map_err(parse)?,
                    name: row.get(1).map_err(parse)?,
                    email: row.get(2).map_err(parse)?,
                    phone: row.get(3).ok(),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!(
                "lookup_customer_by_email: {e}"
            ))),
        }
    }

    async fn insert_customer(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        let rows = self
            .conn()
            .query(
                "INSERT INTO customers (name, email, phone) VALUES (?1, ?2, ?3)
                 RETURNING customer_id",
                params![name, email, opt_text(phone)],
            )
            .await
            .map_err(|e| insert_error("insert_customer", e))?;

        let id = returned_id(rows, "insert_customer").await?;
        debug!(customer_id = id, "Customer inserted into DB");
        Ok(id)
    }

    async fn insert_booking(&self, booking: &NewBooking) -> Result<i64, DatabaseError> {
        let rows = self
            .conn()
            .query(
                "INSERT INTO bookings (customer_id, booking_type, date, time, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id",
                params![
                    booking.customer_id,
                    booking.booking_type.as_str(),
                    booking.date.format(DATE_FORMAT).to_string(),
                    booking.time.format(TIME_FORMAT).to_string(),
                    booking.status.as_str(),
                    booking.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| insert_error("insert_booking", e))?;

        let id = returned_id(rows, "insert_booking").await?;
        debug!(booking_id = id, customer_id = booking.customer_id, "Booking inserted into DB");
        Ok(id)
    }

    async fn find_bookings_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<StoredBooking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings
                     WHERE customer_id = (SELECT customer_id FROM customers WHERE email = ?1)
                     ORDER BY created_at DESC, id DESC"
                ),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_bookings_by_email: {e}")))?;

        let mut bookings = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find_bookings_by_email: {e}")))?
        {
            bookings.push(row_to_booking(&row)?);
        }
        Ok(bookings)
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<Vec<BookingListing>, DatabaseError> {
        let date = filter
            .date
            .map(|d| libsql::Value::Text(d.format(DATE_FORMAT).to_string()))
            .unwrap_or(libsql::Value::Null);

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LISTING_COLUMNS}
                     FROM bookings b JOIN customers c ON c.customer_id = b.customer_id
                     WHERE (?1 IS NULL OR LOWER(c.name) LIKE '%' || LOWER(?1) || '%')
                       AND (?2 IS NULL OR LOWER(c.email) LIKE '%' || LOWER(?2) || '%')
                       AND (?3 IS NULL OR b.date = ?3)
                     ORDER BY b.created_at DESC, b.id DESC"
                ),
                params![filter_text(&filter.name), filter_text(&filter.email), date],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_bookings: {e}")))?;

        let mut listings = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_bookings: {e}")))?
        {
            listings.push(row_to_listing(&row)?);
        }
        Ok(listings)
    }
}
