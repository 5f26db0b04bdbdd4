use crate::ArcStr;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{de, Deserialize, Deserializer};
use std::{fs, io, path::Path};

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

// Helpers for serde to parse fields with quirks.
//
// The extracts are CSV, where missing values are written as the empty string or "NULL". Our
// binary caches are written with the derived `Serialize` impls, so when the format isn't human
// readable we defer to the plain `Option<T>` impl.

fn is_missing(s: &str) -> bool {
    s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("na")
}

/// A field of a hand-parsed record, with missing markers mapped to `None`.
pub fn opt_str(s: &str) -> Option<ArcStr> {
    let s = s.trim();
    if is_missing(s) {
        None
    } else {
        Some(s.into())
    }
}

/// Parse a string, but map "null" to `None` (in addition to the default "" -> None mapping)
pub fn optional_string<'de, D>(d: D) -> Result<Option<ArcStr>, D::Error>
where
    D: Deserializer<'de>,
{
    if !d.is_human_readable() {
        return Deserialize::deserialize(d);
    }
    let s: String = Deserialize::deserialize(d)?;
    Ok(opt_str(&s))
}

/// Parse a date in ISO format (`yyyy-mm-dd`).
///
/// A datetime with a zero time part is also accepted, as some extracts write dates that way.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    let datetime = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("invalid date \"{}\": {}", s, e))?;
    if datetime.hour() != 0 || datetime.minute() != 0 || datetime.second() != 0 {
        return Err(format!("non-zero time in date \"{}\"", s));
    }
    Ok(datetime.date())
}

/// Like `parse_date`, but maps missing markers to `None`.
pub fn parse_opt_date(s: &str) -> Result<Option<NaiveDate>, String> {
    if is_missing(s.trim()) {
        Ok(None)
    } else {
        parse_date(s).map(Some)
    }
}

pub fn opt_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    if !d.is_human_readable() {
        return Deserialize::deserialize(d);
    }
    let s: String = Deserialize::deserialize(d)?;
    parse_opt_date(&s).map_err(de::Error::custom)
}

pub fn opt_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    if !d.is_human_readable() {
        return Deserialize::deserialize(d);
    }
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if is_missing(s) {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(de::Error::custom(format!("invalid number \"{}\"", s))),
    }
}

pub fn opt_i64<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    if !d.is_human_readable() {
        return Deserialize::deserialize(d);
    }
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if is_missing(s) {
        return Ok(None);
    }
    s.parse::<i64>()
        .map(Some)
        .map_err(|_| de::Error::custom(format!("invalid integer \"{}\"", s)))
}

/// Parse a boolean flag. The extracts use `T`/`F`, `1`/`0` and `true`/`false` interchangeably.
pub fn flag<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    if !d.is_human_readable() {
        return Deserialize::deserialize(d);
    }
    let s: String = Deserialize::deserialize(d)?;
    match s.trim() {
        "T" | "t" | "1" | "true" | "True" | "TRUE" => Ok(true),
        "F" | "f" | "0" | "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(de::Error::custom(format!(
            "expected a boolean flag, found \"{}\"",
            other
        ))),
    }
}

pub fn header(header: &str) {
    let len = header.len();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dates() {
        assert_eq!(
            parse_date("2021-03-04").unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()
        );
        assert_eq!(
            parse_date("2021-03-04 00:00:00").unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()
        );
        assert!(parse_date("2021-03-04 10:00:00").is_err());
        assert_eq!(parse_opt_date("").unwrap(), None);
        assert_eq!(parse_opt_date("NULL").unwrap(), None);
        assert!(parse_opt_date("04/03/2021").is_err());
    }
}
