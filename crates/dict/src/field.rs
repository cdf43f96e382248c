//! Field metadata and typed value conversion.
//!
//! A [`Field`] is immutable once loaded and owned exclusively by its
//! data dictionary. Values travel through the engine in the store's
//! internal form; conversion to and from the external (display) form is
//! done here, per field kind.

use crate::fieldtype::FieldType;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use trellis_core::FieldId;

/// Years in the store's internal date form are counted from 1700.
const YEAR_BASE: i32 = 1700;

/// A typed column within a file.
#[derive(Debug, Clone)]
pub struct Field {
    /// Dotted field identifier; native sort position within the record.
    pub id: FieldId,
    /// Normalized name, unique within the file.
    pub name: String,
    /// Classified kind.
    pub ty: FieldType,
    /// Must be non-empty on every record.
    pub mandatory: bool,
    /// Storage location hint (`node;piece`), informational.
    pub storage: Option<String>,
    /// Raw details piece (pointer target, set spec, …).
    pub details: String,
    /// Ordered code→label mapping for set-typed fields.
    pub codes: Vec<(String, String)>,
    /// Target file identifier for pointer-typed fields.
    pub pointer_target: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Help text.
    pub help: Option<String>,
}

impl Field {
    /// Parse the ordered code→label details of a set-typed field,
    /// `"j:JUNIOR;s:SENIOR;"`.
    pub fn parse_codes(details: &str) -> Vec<(String, String)> {
        details
            .split(';')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once(':') {
                Some((code, label)) => (code.to_string(), label.to_string()),
                None => (part.to_string(), String::new()),
            })
            .collect()
    }

    /// Label for a set code, if registered.
    pub fn code_label(&self, code: &str) -> Option<&str> {
        self.codes
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, label)| label.as_str())
    }

    /// Convert an internal value to its external (display) form.
    ///
    /// Unknown or malformed values pass through unchanged; the store is
    /// the validator, not this conversion.
    pub fn external(&self, internal: &str) -> String {
        match self.ty {
            FieldType::Set => self
                .code_label(internal)
                .filter(|label| !label.is_empty())
                .unwrap_or(internal)
                .to_string(),
            FieldType::DateTime => {
                decode_datetime(internal).unwrap_or_else(|| internal.to_string())
            }
            _ => internal.to_string(),
        }
    }

    /// Convert an external value to the internal form the store expects.
    ///
    /// Set labels map back to their code; ISO dates map to the compact
    /// internal form. Values already internal pass through.
    pub fn internal(&self, external: &str) -> String {
        match self.ty {
            FieldType::Set => self
                .codes
                .iter()
                .find(|(_, label)| label.eq_ignore_ascii_case(external))
                .map(|(code, _)| code.clone())
                .unwrap_or_else(|| external.to_string()),
            FieldType::DateTime => {
                encode_datetime(external).unwrap_or_else(|| external.to_string())
            }
            _ => external.to_string(),
        }
    }
}

/// Normalize a raw field name: lowercase, keep `[a-z0-9_ ]`, spaces to
/// underscores.
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == ' ')
        .collect::<String>()
        .replace(' ', "_")
}

/// Decode the compact internal form `YYYMMDD[.HHMMSS]` to ISO.
fn decode_datetime(internal: &str) -> Option<String> {
    let (date_part, time_part) = match internal.split_once('.') {
        Some((d, t)) => (d, Some(t)),
        None => (internal, None),
    };
    if date_part.len() != 7 || !date_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = date_part[..3].parse().ok()?;
    let month: u32 = date_part[3..5].parse().ok()?;
    let day: u32 = date_part[5..7].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(YEAR_BASE + year, month, day)?;
    match time_part {
        None => Some(date.format("%Y-%m-%d").to_string()),
        Some(t) => {
            let padded = format!("{:0<6}", t);
            if padded.len() != 6 || !padded.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let hour: u32 = padded[..2].parse().ok()?;
            let minute: u32 = padded[2..4].parse().ok()?;
            let second: u32 = padded[4..6].parse().ok()?;
            let time = NaiveTime::from_hms_opt(hour, minute, second)?;
            Some(
                NaiveDateTime::new(date, time)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            )
        }
    }
}

/// Encode an ISO date or datetime to the compact internal form.
fn encode_datetime(external: &str) -> Option<String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(external, "%Y-%m-%d %H:%M:%S") {
        let date = dt.date();
        return Some(format!(
            "{:03}{:02}{:02}.{:02}{:02}{:02}",
            date.year() - YEAR_BASE,
            date.month(),
            date.day(),
            dt.time().hour(),
            dt.time().minute(),
            dt.time().second(),
        ));
    }
    let date = NaiveDate::parse_from_str(external, "%Y-%m-%d").ok()?;
    Some(format!(
        "{:03}{:02}{:02}",
        date.year() - YEAR_BASE,
        date.month(),
        date.day(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_field() -> Field {
        Field {
            id: FieldId::from("2"),
            name: "grade".into(),
            ty: FieldType::Set,
            mandatory: false,
            storage: None,
            details: "j:JUNIOR;s:SENIOR;".into(),
            codes: Field::parse_codes("j:JUNIOR;s:SENIOR;"),
            pointer_target: None,
            title: None,
            help: None,
        }
    }

    fn date_field() -> Field {
        Field {
            id: FieldId::from("3"),
            name: "hired".into(),
            ty: FieldType::DateTime,
            mandatory: false,
            storage: None,
            details: String::new(),
            codes: Vec::new(),
            pointer_target: None,
            title: None,
            help: None,
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("NAME"), "name");
        assert_eq!(normalize_name("DATE OF BIRTH"), "date_of_birth");
        assert_eq!(normalize_name("X-RAY #2"), "xray_2");
    }

    #[test]
    fn test_parse_codes_ordered() {
        let codes = Field::parse_codes("a:APPLE;b:BANANA;");
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0], ("a".into(), "APPLE".into()));
        assert_eq!(codes[1], ("b".into(), "BANANA".into()));
    }

    #[test]
    fn test_set_external_and_internal() {
        let f = set_field();
        assert_eq!(f.external("j"), "JUNIOR");
        assert_eq!(f.external("zz"), "zz"); // unknown code passes through
        assert_eq!(f.internal("SENIOR"), "s");
        assert_eq!(f.internal("senior"), "s");
        assert_eq!(f.internal("s"), "s");
    }

    #[test]
    fn test_datetime_decode() {
        let f = date_field();
        assert_eq!(f.external("3240115"), "2024-01-15");
        assert_eq!(f.external("3240115.0930"), "2024-01-15 09:30:00");
        assert_eq!(f.external("garbage"), "garbage");
    }

    #[test]
    fn test_datetime_encode_round_trip() {
        let f = date_field();
        assert_eq!(f.internal("2024-01-15"), "3240115");
        assert_eq!(f.internal("2024-01-15 09:30:00"), "3240115.093000");
        assert_eq!(f.external(&f.internal("1999-12-31")), "1999-12-31");
    }

    #[test]
    fn test_text_values_pass_through() {
        let mut f = set_field();
        f.ty = FieldType::Text;
        assert_eq!(f.external("hello"), "hello");
        assert_eq!(f.internal("hello"), "hello");
    }
}
