//! Date (de)serialization honoring the round-trip law: dates decode from either ISO-8601
//! "YYYY-MM-DD" or the compact "YYYYMMDD" editor format, and always re-encode as "YYYY-MM-DD".

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serializer};

pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok();
    }
    None
}

pub fn format_iso(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// 8-digit "YYYYMMDD" editor format used across the engine adapter boundary (§6).
pub fn format_compact(date: &NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub mod opt_date {
    use super::*;

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&format_iso(d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse_flexible_date(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
        }
    }
}

pub mod date {
    use super::*;

    pub fn serialize<S>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_iso(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_flexible_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_iso_and_compact() {
        let a = parse_flexible_date("2025-07-30").unwrap();
        let b = parse_flexible_date("20250730").unwrap();
        assert_eq!(a, b);
        assert_eq!(format_iso(&a), "2025-07-30");
        assert_eq!(format_compact(&a), "20250730");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_flexible_date("not-a-date").is_none());
        assert!(parse_flexible_date("").is_none());
    }
}
