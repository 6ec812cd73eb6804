//! The partial booking record collected by the slot-filling flow.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// The six booking slots, in the order they are asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingField {
    CustomerName,
    Email,
    Phone,
    BookingType,
    Date,
    Time,
}

impl BookingField {
    /// Fixed priority order for missing-field detection.
    pub const ALL: [BookingField; 6] = [
        Self::CustomerName,
        Self::Email,
        Self::Phone,
        Self::BookingType,
        Self::Date,
        Self::Time,
    ];

    /// Key used by the extractor's JSON contract.
    pub fn key(&self) -> &'static str {
        match self {
            Self::CustomerName => "customer_name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::BookingType => "booking_type",
            Self::Date => "date",
            Self::Time => "time",
        }
    }

    /// Human label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomerName => "Name",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::BookingType => "Room Type",
            Self::Date => "Date",
            Self::Time => "Time",
        }
    }
}

impl std::fmt::Display for BookingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered field → message map, rebuilt every turn.
///
/// Inserting an existing field replaces its message in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(Vec<(BookingField, String)>);

impl FieldErrors {
    pub fn insert(&mut self, field: BookingField, message: impl Into<String>) {
        let message = message.into();
        match self.0.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = message,
            None => self.0.push((field, message)),
        }
    }

    pub fn get(&self, field: BookingField) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn contains(&self, field: BookingField) -> bool {
        self.get(field).is_some()
    }

    /// The error shown to the user this turn.
    pub fn first(&self) -> Option<(BookingField, &str)> {
        self.0.first().map(|(f, m)| (*f, m.as_str()))
    }

    /// Move `field`'s error (if any) to the front, keeping the rest in order.
    pub fn prioritize(&mut self, field: BookingField) {
        if let Some(pos) = self.0.iter().position(|(f, _)| *f == field) {
            let entry = self.0.remove(pos);
            self.0.insert(0, entry);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BookingField, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

/// A booking in progress. Every set field has passed its validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub booking_type: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,

    /// All six fields are set and the summary has been shown.
    pub awaiting_confirmation: bool,
    /// The booking flow has handled at least one turn for this record.
    pub active: bool,
    pub errors: FieldErrors,
}

impl BookingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, field: BookingField) -> bool {
        match field {
            BookingField::CustomerName => self.customer_name.is_some(),
            BookingField::Email => self.email.is_some(),
            BookingField::Phone => self.phone.is_some(),
            BookingField::BookingType => self.booking_type.is_some(),
            BookingField::Date => self.date.is_some(),
            BookingField::Time => self.time.is_some(),
        }
    }

    /// Unset a field (the extractor's reset sentinel).
    pub fn clear(&mut self, field: BookingField) {
        match field {
            BookingField::CustomerName => self.customer_name = None,
            BookingField::Email => self.email = None,
            BookingField::Phone => self.phone = None,
            BookingField::BookingType => self.booking_type = None,
            BookingField::Date => self.date = None,
            BookingField::Time => self.time = None,
        }
    }

    pub fn missing_fields(&self) -> Vec<BookingField> {
        BookingField::ALL
            .into_iter()
            .filter(|f| !self.is_set(*f))
            .collect()
    }

    /// The field currently being asked for.
    pub fn first_missing(&self) -> Option<BookingField> {
        BookingField::ALL.into_iter().find(|f| !self.is_set(*f))
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    /// The persistence payload, if every field is set.
    pub fn to_payload(&self) -> Option<BookingPayload> {
        Some(BookingPayload {
            customer_name: self.customer_name.clone()?,
            email: self.email.clone()?,
            phone: self.phone.clone()?,
            booking_type: self.booking_type.clone()?,
            date: self.date?,
            time: self.time?,
        })
    }
}

/// A fully collected booking, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub booking_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_misses_everything_in_order() {
        let record = BookingRecord::new();
        assert_eq!(record.missing_fields(), BookingField::ALL.to_vec());
        assert_eq!(record.first_missing(), Some(BookingField::CustomerName));
        assert!(record.to_payload().is_none());
    }

    #[test]
    fn first_missing_skips_set_fields() {
        let record = BookingRecord {
            customer_name: Some("Jane".into()),
            email: Some("jane@example.com".into()),
            ..Default::default()
        };
        assert_eq!(record.first_missing(), Some(BookingField::Phone));
    }

    #[test]
    fn clear_unsets_field() {
        let mut record = BookingRecord {
            email: Some("jane@example.com".into()),
            ..Default::default()
        };
        record.clear(BookingField::Email);
        assert!(!record.is_set(BookingField::Email));
    }

    #[test]
    fn errors_keep_insertion_order_and_replace_in_place() {
        let mut errors = FieldErrors::default();
        errors.insert(BookingField::Email, "bad email");
        errors.insert(BookingField::Date, "bad date");
        errors.insert(BookingField::Email, "still bad");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.first(), Some((BookingField::Email, "still bad")));
    }

    #[test]
    fn prioritize_moves_target_first() {
        let mut errors = FieldErrors::default();
        errors.insert(BookingField::Email, "bad email");
        errors.insert(BookingField::Phone, "bad phone");
        errors.insert(BookingField::Date, "bad date");
        errors.prioritize(BookingField::Date);
        let order: Vec<_> = errors.iter().map(|(f, _)| f).collect();
        assert_eq!(
            order,
            vec![BookingField::Date, BookingField::Email, BookingField::Phone]
        );

        // Absent field is a no-op.
        errors.prioritize(BookingField::Time);
        assert_eq!(errors.first().map(|(f, _)| f), Some(BookingField::Date));
    }

    #[test]
    fn field_keys_match_serde() {
        for field in BookingField::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(format!("\"{}\"", field.key()), json);
        }
    }
}
