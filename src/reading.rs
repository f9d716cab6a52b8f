use std::fmt;
use thiserror::Error;

/// One reading reported by the balance.
///
/// The balance has different reply formats depending on whether it
/// judges the readout stable or unstable, see chapter 10.3 of the
/// manual: the unit is transmitted exactly when the value has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    /// Unit as printed by the balance, `None` while the readout has not
    /// settled.
    pub unit: Option<String>,
    pub stable: bool,
}

/// A frame that could not be interpreted as a reading.
///
/// Single bad frames are expected during operation (line noise, a read
/// truncated mid-transmission) and are counted by the caller, never
/// fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("balance reports an error, the maximum load has probably been exceeded")]
    Overload,
    #[error("value is not numeric: {0:?}")]
    BadValue(String),
    #[error("expected value and optional unit, got {0} fields")]
    FieldCount(usize),
}

impl Reading {
    /// Parse one raw frame.
    ///
    /// Stable readouts carry a trailing unit (`"  12.345 g"`), unstable
    /// readouts just the bare value (`"  12.345"`). A frame reading
    /// `Error` is the balance's own overload report.
    pub fn parse(frame: &str) -> Result<Self, FrameError> {
        let frame = frame.trim();
        if frame.is_empty() {
            return Err(FrameError::Empty);
        }
        if frame.eq_ignore_ascii_case("error") {
            return Err(FrameError::Overload);
        }

        let fields: Vec<&str> = frame.split_whitespace().collect();
        let (value, unit) = match fields[..] {
            [value] => (value, None),
            [value, unit] => (value, Some(unit)),
            _ => return Err(FrameError::FieldCount(fields.len())),
        };

        // A balance never transmits nan/inf spellings, reject them along
        // with everything else that is not a finite decimal.
        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| FrameError::BadValue(value.to_string()))?;

        Ok(Self {
            value,
            unit: unit.map(str::to_string),
            stable: unit.is_some(),
        })
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} {}", self.value, unit),
            None => write!(f, "{} (unstable)", self.value),
        }
    }
}
