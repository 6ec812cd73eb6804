//! Persistence layer: libSQL-backed storage for customers and bookings.

pub mod libsql_backend;
mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    BookingFilter, BookingListing, BookingRepository, Customer, NewBooking, PersistOutcome,
    StoredBooking,
};
