//! Units
//!
//! Every length the session hands to the solver is an integer number of
//! millimetres. Users type decimal values in metres, decimetres, centimetres
//! or millimetres; this module is the only place that conversion happens.

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing a unit symbol.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    /// The symbol is not one of `m`, `dm`, `cm` or `mm`.
    #[error("unknown length unit: {0}")]
    Unknown(String),
}

/// Length unit selectable for a row or the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Metres
    #[default]
    M,

    /// Decimetres
    Dm,

    /// Centimetres
    Cm,

    /// Millimetres
    Mm,
}

impl Unit {
    /// Number of millimetres in one of this unit.
    pub fn factor(self) -> u32 {
        match self {
            Unit::M => 1000,
            Unit::Dm => 100,
            Unit::Cm => 10,
            Unit::Mm => 1,
        }
    }

    /// Unit symbol as typed by users.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::M => "m",
            Unit::Dm => "dm",
            Unit::Cm => "cm",
            Unit::Mm => "mm",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" => Ok(Unit::M),
            "dm" => Ok(Unit::Dm),
            "cm" => Ok(Unit::Cm),
            "mm" => Ok(Unit::Mm),
            other => Err(UnitError::Unknown(other.to_string())),
        }
    }
}

/// Convert a length to whole millimetres, rounding half away from zero.
///
/// Negative values normalise to `0`; values too large for a `u32` saturate.
pub fn to_mm(value: Decimal, unit: Unit) -> u32 {
    if value.is_sign_negative() {
        return 0;
    }

    value
        .checked_mul(Decimal::from(unit.factor()))
        .map_or(u32::MAX, |mm| {
            mm.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
                .unwrap_or(u32::MAX)
        })
}

/// Parse raw user input and convert it to millimetres.
///
/// Anything that is not a decimal number normalises to `0`.
pub fn parse_length(raw: &str, unit: Unit) -> u32 {
    Decimal::from_str(raw.trim()).map_or(0, |value| to_mm(value, unit))
}
