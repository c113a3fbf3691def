//! `range` and `length` boundaries.
//!
//! A boundary expression is a `|`-separated list of parts, each either a
//! single value or `lower..upper`. `min` and `max` stand for the bounds of
//! the numeric domain the expression restricts. Values are held as integers
//! scaled by 10^18 so that integer and decimal64 domains compare exactly.
//!
//! # Examples
//!
//! ```
//! use yang_resolver_core::boundary::{NumericDomain, parse_range, validate_boundaries};
//!
//! let pairs = parse_range("min..-1 | 1..max", NumericDomain::Int8);
//! assert_eq!(pairs.len(), 2);
//! assert!(validate_boundaries(&pairs, NumericDomain::Int8));
//!
//! assert!(parse_range("1..", NumericDomain::Int8).is_empty());
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const FRACTION_DIGITS: u32 = 18;
const SCALE: i128 = 10i128.pow(FRACTION_DIGITS);

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("static regex must compile")
});

/// The value space a boundary expression is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericDomain {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64 { fraction_digits: u8 },
    /// Lengths of strings and binaries: `0..i64::MAX`.
    Length,
}

impl NumericDomain {
    /// Maps a built-in type name to its domain. `fraction_digits` is only
    /// consulted for `decimal64`, where a missing or out-of-range value
    /// yields `None`.
    pub fn from_type_name(name: &str, fraction_digits: Option<u8>) -> Option<Self> {
        Some(match name {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "decimal64" => match fraction_digits {
                Some(fd @ 1..=18) => Self::Decimal64 {
                    fraction_digits: fd,
                },
                _ => return None,
            },
            _ => return None,
        })
    }

    /// Whether `name` is one of the numeric built-in types.
    pub fn is_numeric_type(name: &str) -> bool {
        matches!(
            name,
            "int8"
                | "int16"
                | "int32"
                | "int64"
                | "uint8"
                | "uint16"
                | "uint32"
                | "uint64"
                | "decimal64"
        )
    }

    pub fn min(self) -> BoundaryValue {
        BoundaryValue(match self {
            Self::Int8 => i128::from(i8::MIN) * SCALE,
            Self::Int16 => i128::from(i16::MIN) * SCALE,
            Self::Int32 => i128::from(i32::MIN) * SCALE,
            Self::Int64 => i128::from(i64::MIN) * SCALE,
            Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 | Self::Length => 0,
            Self::Decimal64 { fraction_digits } => {
                i128::from(i64::MIN) * SCALE / 10i128.pow(u32::from(fraction_digits))
            }
        })
    }

    pub fn max(self) -> BoundaryValue {
        BoundaryValue(match self {
            Self::Int8 => i128::from(i8::MAX) * SCALE,
            Self::Int16 => i128::from(i16::MAX) * SCALE,
            Self::Int32 => i128::from(i32::MAX) * SCALE,
            Self::Int64 | Self::Length => i128::from(i64::MAX) * SCALE,
            Self::Uint8 => i128::from(u8::MAX) * SCALE,
            Self::Uint16 => i128::from(u16::MAX) * SCALE,
            Self::Uint32 => i128::from(u32::MAX) * SCALE,
            Self::Uint64 => i128::from(u64::MAX) * SCALE,
            Self::Decimal64 { fraction_digits } => {
                i128::from(i64::MAX) * SCALE / 10i128.pow(u32::from(fraction_digits))
            }
        })
    }

    fn is_integral(self) -> bool {
        !matches!(self, Self::Decimal64 { .. })
    }
}

/// A boundary value, scaled by 10^18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoundaryValue(i128);

impl BoundaryValue {
    /// Parses a decimal literal. More than 18 fraction digits, or a value
    /// too large to scale, yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !NUMBER.is_match(text) {
            return None;
        }
        let (negative, digits) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if fraction.len() > FRACTION_DIGITS as usize {
            return None;
        }
        let whole: i128 = whole.parse().ok()?;
        let mut scaled = whole.checked_mul(SCALE)?;
        if !fraction.is_empty() {
            let padded = format!("{fraction:0<18}");
            let fraction: i128 = padded.parse().ok()?;
            scaled = scaled.checked_add(fraction)?;
        }
        Some(Self(if negative { -scaled } else { scaled }))
    }

    pub fn has_fraction(self) -> bool {
        self.0 % SCALE != 0
    }
}

impl fmt::Display for BoundaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let fraction = (self.0 % SCALE).abs();
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let sign = if self.0 < 0 && whole == 0 { "-" } else { "" };
        let digits = format!("{fraction:018}");
        write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// One `lower..upper` interval, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPair {
    pub lower: BoundaryValue,
    pub upper: BoundaryValue,
}

impl BoundaryPair {
    /// Whether this interval lies entirely inside `outer`.
    pub fn is_within(&self, outer: &BoundaryPair) -> bool {
        self.lower >= outer.lower && self.upper <= outer.upper
    }
}

/// Parses a `range` argument against `domain`. Any syntax error yields an
/// empty list.
pub fn parse_range(text: &str, domain: NumericDomain) -> Vec<BoundaryPair> {
    parse(text, domain).unwrap_or_default()
}

/// Parses a `length` argument.
pub fn parse_length(text: &str) -> Vec<BoundaryPair> {
    parse(text, NumericDomain::Length).unwrap_or_default()
}

fn parse(text: &str, domain: NumericDomain) -> Option<Vec<BoundaryPair>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('|') || text.ends_with('|') {
        return None;
    }

    let bound = |part: &str| match part.trim() {
        "min" => Some(domain.min()),
        "max" => Some(domain.max()),
        other => BoundaryValue::parse(other),
    };

    let mut pairs = Vec::new();
    for part in text.split('|') {
        let part = part.trim();
        if part.starts_with("..") || part.ends_with("..") {
            return None;
        }
        let pair = match part.split_once("..") {
            Some((lower, upper)) => BoundaryPair {
                lower: bound(lower)?,
                upper: bound(upper)?,
            },
            None => {
                let value = bound(part)?;
                BoundaryPair {
                    lower: value,
                    upper: value,
                }
            }
        };
        pairs.push(pair);
    }
    Some(pairs)
}

/// Checks that `pairs` is non-empty, lies inside `domain`, has
/// `lower <= upper` in every pair, and is strictly ascending and disjoint.
/// Integer domains reject fractional values.
pub fn validate_boundaries(pairs: &[BoundaryPair], domain: NumericDomain) -> bool {
    if pairs.is_empty() {
        return false;
    }
    let (min, max) = (domain.min(), domain.max());
    let mut previous_upper: Option<BoundaryValue> = None;
    for pair in pairs {
        if domain.is_integral() && (pair.lower.has_fraction() || pair.upper.has_fraction()) {
            return false;
        }
        if pair.lower < min || pair.upper > max || pair.lower > pair.upper {
            return false;
        }
        if previous_upper.is_some_and(|prev| pair.lower <= prev) {
            return false;
        }
        previous_upper = Some(pair.upper);
    }
    true
}

/// Whether every pair of `restriction` fits inside some pair of `allowed`.
pub fn fits_within(restriction: &[BoundaryPair], allowed: &[BoundaryPair]) -> bool {
    restriction
        .iter()
        .all(|pair| allowed.iter().any(|outer| pair.is_within(outer)))
}
