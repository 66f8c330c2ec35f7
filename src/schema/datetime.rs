//! Datetime format inference
//!
//! For every top-level field, remembers the first known format that parses
//! its first datetime-like value, and drops the field for good as soon as a
//! later value does not parse with that format.

use crate::slice::Record;
use crate::types::JsonValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Epoch values in these ranges (seconds, milliseconds) may be timestamps
const TIMESTAMP_RANGES: [Range<i64>; 2] = [
    1_000_000_000..2_000_000_000,
    1_000_000_000_000..2_000_000_000_000,
];

#[derive(Debug, Clone, Copy)]
enum Parser {
    Date(&'static str),
    DateTime(&'static str),
    Zoned(&'static str),
    YearMonth,
    Epoch,
}

/// Candidate formats in priority order: reported strftime format, parser
const FORMATS: [(&str, Parser); 9] = [
    ("%Y-%m-%d", Parser::Date("%Y-%m-%d")),
    ("%Y-%m-%d %H:%M:%S", Parser::DateTime("%Y-%m-%d %H:%M:%S")),
    ("%Y-%m-%dT%H:%M:%S", Parser::DateTime("%Y-%m-%dT%H:%M:%S")),
    ("%Y-%m-%d %H:%M:%S.%f+00:00", Parser::DateTime("%Y-%m-%d %H:%M:%S%.f+00:00")),
    ("%Y-%m-%dT%H:%M:%S.%f%z", Parser::Zoned("%Y-%m-%dT%H:%M:%S%.f%z")),
    ("%s", Parser::Epoch),
    ("%d/%m/%Y %H:%M", Parser::DateTime("%d/%m/%Y %H:%M")),
    ("%Y-%m", Parser::YearMonth),
    ("%d-%m-%Y", Parser::Date("%d-%m-%Y")),
];

impl Parser {
    fn parses(self, value: &str) -> bool {
        match self {
            Parser::Date(format) => NaiveDate::parse_from_str(value, format).is_ok(),
            Parser::DateTime(format) => NaiveDateTime::parse_from_str(value, format).is_ok(),
            Parser::Zoned(format) => {
                let normalized = match value.strip_suffix('Z') {
                    Some(rest) => format!("{rest}+00:00"),
                    None => value.to_string(),
                };
                DateTime::parse_from_str(&normalized, format).is_ok()
            }
            Parser::YearMonth => {
                value.len() == 7 && NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok()
            }
            Parser::Epoch => value
                .parse::<i64>()
                .is_ok_and(|n| TIMESTAMP_RANGES.iter().any(|range| range.contains(&n))),
        }
    }
}

/// Text form of a value that could hold a datetime
fn datetime_candidate(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return None,
    };
    // Plain numbers only count inside the timestamp ranges
    match text.parse::<i64>() {
        Ok(n) if !TIMESTAMP_RANGES.iter().any(|range| range.contains(&n)) => None,
        _ => Some(text),
    }
}

/// Infers one datetime format per top-level field
#[derive(Debug, Clone, Default)]
pub struct DatetimeFormatInferrer {
    candidates: BTreeMap<String, &'static str>,
    invalid: BTreeSet<String>,
}

impl DatetimeFormatInferrer {
    /// Create an inferrer that has seen no records
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a record's fields into the inference
    pub fn accumulate(&mut self, record: &Record) {
        for (field, value) in record.iter() {
            if self.invalid.contains(field) {
                continue;
            }
            let Some(text) = datetime_candidate(value) else {
                continue;
            };
            match self.candidates.get(field).copied() {
                Some(format) => {
                    if !matches_format(&text, format) {
                        self.candidates.remove(field);
                        self.invalid.insert(field.clone());
                    }
                }
                None => {
                    if let Some((format, _)) = FORMATS.iter().find(|(_, parser)| parser.parses(&text)) {
                        self.candidates.insert(field.clone(), *format);
                    }
                }
            }
        }
    }

    /// Field name to format, for fields where every value matched
    pub fn get_inferred_datetime_formats(&self) -> BTreeMap<String, String> {
        self.candidates
            .iter()
            .map(|(field, format)| (field.clone(), (*format).to_string()))
            .collect()
    }
}

fn matches_format(value: &str, format: &str) -> bool {
    FORMATS
        .iter()
        .find(|(name, _)| *name == format)
        .is_some_and(|(_, parser)| parser.parses(value))
}
