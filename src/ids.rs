//! Human-readable ID formatting and parsing.
//!
//! Pure functions: deterministic for the same inputs, no I/O. The raw
//! serials behind these IDs come from `db::counters`.

use regex::Regex;
use std::sync::OnceLock;

pub const STUDENT_ID_PREFIX: &str = "STU";
pub const CERT_NO_PREFIX: &str = "QT-CERT";

/// `STU0007`. Serials below 1 are clamped to 1.
pub fn format_student_id(serial: i64) -> String {
    format!("{}{:04}", STUDENT_ID_PREFIX, serial.max(1))
}

/// `QT-CERT-2025-0007`. Serials below 1 are clamped to 1.
pub fn format_certificate_no(serial: i64, year: i32) -> String {
    format!("{}-{}-{:04}", CERT_NO_PREFIX, year, serial.max(1))
}

fn student_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^STU(\d+)$").unwrap())
}

fn cert_no_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^QT-CERT-\d{4}-(\d+)$").unwrap())
}

/// Extract the numeric serial from a student ID, if it matches `STU####`.
pub fn parse_student_serial(id: &str) -> Option<i64> {
    student_id_re()
        .captures(id)
        .and_then(|c| c[1].parse().ok())
}

/// Extract the numeric serial from a certificate number, if it matches
/// `QT-CERT-YYYY-####`.
pub fn parse_certificate_serial(cert_no: &str) -> Option<i64> {
    cert_no_re()
        .captures(cert_no)
        .and_then(|c| c[1].parse().ok())
}

/// Maximum serial found among existing IDs; 0 when none match.
///
/// Used to seed and re-sync counters so that manually inserted legacy
/// records never collide with newly allocated serials.
pub fn max_serial<'a, I>(ids: I, parse: fn(&str) -> Option<i64>) -> i64
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter().filter_map(parse).max().unwrap_or(0)
}
