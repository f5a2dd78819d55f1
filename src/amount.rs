//! Numeric text fields and yen formatting.
//!
//! Quantity and unit price are edited as free text. The raw text is kept as
//! typed so a half-finished entry like `1.` or `abc` stays editable, and the
//! value is coerced to a number only when arithmetic needs it.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw text of a numeric input together with its coerced value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NumberText(String);

impl NumberText {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Parsed value, `None` for blank or malformed text.
    pub fn parsed(&self) -> Option<f64> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Value used in calculations; anything unparsable counts as zero.
    pub fn value(&self) -> f64 {
        self.parsed().unwrap_or(0.0)
    }

    /// Text shown in the printed document: blank when the value is zero.
    pub fn display(&self) -> &str {
        if self.value() == 0.0 && (self.parsed().is_some() || self.0.trim().is_empty()) {
            ""
        } else {
            &self.0
        }
    }

    /// True when the raw text is exactly how the number would be printed.
    fn is_canonical(&self) -> bool {
        self.parsed()
            .map(|v| format_number(v) == self.0)
            .unwrap_or(false)
    }
}

impl From<f64> for NumberText {
    fn from(value: f64) -> Self {
        Self(format_number(value))
    }
}

impl From<i64> for NumberText {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for NumberText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.parsed() {
            Some(v) if self.is_canonical() => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    serializer.serialize_i64(v as i64)
                } else {
                    serializer.serialize_f64(v)
                }
            }
            _ => serializer.serialize_str(&self.0),
        }
    }
}

struct NumberTextVisitor;

impl<'de> Visitor<'de> for NumberTextVisitor {
    type Value = NumberText;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a string or null")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<NumberText, E> {
        Ok(NumberText::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<NumberText, E> {
        Ok(NumberText(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<NumberText, E> {
        Ok(NumberText::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<NumberText, E> {
        Ok(NumberText::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<NumberText, E> {
        Ok(NumberText(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<NumberText, E> {
        Ok(NumberText::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<NumberText, E> {
        Ok(NumberText::default())
    }
}

impl<'de> Deserialize<'de> for NumberText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumberTextVisitor)
    }
}

/// Plain rendering of a number, without a trailing `.0` for integers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Groups thousands with `,` and keeps at most three fraction digits.
pub fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if value < 0.0 && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    let digits = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_yen(value: f64) -> String {
    format!("¥{}", format_grouped(value))
}
