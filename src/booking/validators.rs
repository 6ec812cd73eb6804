//! Field validators for booking slots.
//!
//! Every validator is total: it returns a parsed value or a failure signal
//! and never panics. Callers only validate candidates that are present, so
//! "absent" never reaches these functions.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

static TIME_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("valid time regex"));

/// Shortest phone number accepted, in digits.
pub const MIN_PHONE_DIGITS: usize = 10;
/// Longest phone number accepted, in digits (E.164 limit).
pub const MAX_PHONE_DIGITS: usize = 15;

/// Syntactic email validation. No deliverability (MX) check.
pub fn validate_email(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.parse::<lettre::Address>().is_ok()
}

/// Parse a `YYYY-MM-DD` date. Any other shape returns `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if !DATE_SHAPE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a 24-hour `HH:MM` or `HH:MM:SS` time.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if !TIME_SHAPE.is_match(s) {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Strip everything but digits. Valid iff 10..=15 digits remain.
pub fn normalize_phone(s: &str) -> (String, bool) {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    let valid = (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len());
    (digits, valid)
}

/// Guest name: any non-blank text, whitespace collapsed.
pub fn validate_name(s: &str) -> Option<String> {
    let name = s.split_whitespace().collect::<Vec<_>>().join(" ");
    (!name.is_empty()).then_some(name)
}

/// Room type: free text of at least two characters, on one line.
pub fn validate_room_type(s: &str) -> Option<String> {
    let room = s.split_whitespace().collect::<Vec<_>>().join(" ");
    (room.chars().count() >= 2).then_some(room)
}

/// Check-in must not be in the past.
pub fn validate_check_in(date: NaiveDate, today: NaiveDate) -> bool {
    date >= today
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_accepts_plain_address() {
        assert!(validate_email("jane@example.com"));
        assert!(validate_email("  jane.doe+hotel@mail.example.co.uk "));
    }

    #[test]
    fn email_rejects_garbage() {
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email(""));
        assert!(!validate_email("jane@"));
        assert!(!validate_email("@example.com"));
    }

    #[test]
    fn date_accepts_only_iso_shape() {
        assert_eq!(parse_date("2099-01-01"), NaiveDate::from_ymd_opt(2099, 1, 1));
        assert_eq!(parse_date(" 2099-12-31 "), NaiveDate::from_ymd_opt(2099, 12, 31));
        assert_eq!(parse_date("01/01/2099"), None);
        assert_eq!(parse_date("2099-1-1"), None);
        assert_eq!(parse_date("next friday"), None);
        assert_eq!(parse_date("2099-02-30"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn time_accepts_minutes_and_seconds() {
        assert_eq!(parse_time("14:00"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_time("09:30:15"), NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("2pm"), None);
        assert_eq!(parse_time("14.00"), None);
    }

    #[test]
    fn phone_boundaries() {
        assert!(!normalize_phone("123456789").1);
        assert!(normalize_phone("1234567890").1);
        assert!(normalize_phone("123456789012345").1);
        assert!(!normalize_phone("1234567890123456").1);
    }

    #[test]
    fn phone_strips_formatting() {
        let (digits, valid) = normalize_phone("+1 (555) 123-4567");
        assert_eq!(digits, "15551234567");
        assert!(valid);
    }

    #[test]
    fn name_and_room_rules() {
        assert_eq!(validate_name("  Jane   Doe "), Some("Jane Doe".to_string()));
        assert_eq!(validate_name("   "), None);
        assert_eq!(validate_room_type("Deluxe"), Some("Deluxe".to_string()));
        assert_eq!(validate_room_type("D"), None);
        assert_eq!(
            validate_room_type("Deluxe\n- Email: evil@example.com"),
            Some("Deluxe - Email: evil@example.com".to_string())
        );
        assert_eq!(validate_room_type("Sea\r\n\tView"), Some("Sea View".to_string()));
    }

    #[test]
    fn check_in_today_is_allowed_yesterday_is_not() {
        let today = NaiveDate::from_ymd_opt(2030, 6, 15).unwrap();
        assert!(validate_check_in(today, today));
        assert!(!validate_check_in(today.pred_opt().unwrap(), today));
    }
}
