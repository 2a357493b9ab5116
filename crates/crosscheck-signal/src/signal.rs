use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::CodecError;

/// The value carried by one channel.
///
/// On the wire each value occupies two bits. `Unset` is the all-ones code
/// and means "no asserted value"; the remaining code `0b10` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Low,
    High,
    Unset,
}

impl Signal {
    /// 2-bit wire code.
    pub const fn code(self) -> u8 {
        match self {
            Signal::Low => 0b00,
            Signal::High => 0b01,
            Signal::Unset => 0b11,
        }
    }

    /// Inverse of [`Signal::code`]. Returns `None` for the reserved code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code & 0b11 {
            0b00 => Some(Signal::Low),
            0b01 => Some(Signal::High),
            0b11 => Some(Signal::Unset),
            _ => None,
        }
    }

    pub const fn from_level(high: bool) -> Self {
        if high {
            Signal::High
        } else {
            Signal::Low
        }
    }

    /// Electrical level, if the value asserts one.
    pub const fn level(self) -> Option<bool> {
        match self {
            Signal::Low => Some(false),
            Signal::High => Some(true),
            Signal::Unset => None,
        }
    }

    pub const fn is_unset(self) -> bool {
        matches!(self, Signal::Unset)
    }

    fn symbol(self) -> char {
        match self {
            Signal::Low => '0',
            Signal::High => '1',
            Signal::Unset => 'x',
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// An ordered sequence of channel values, index = channel number.
///
/// Trailing `Unset` entries carry no information: two vectors are equal
/// when their trimmed forms are equal, so `[1, 0]` equals `[1, 0, x, x]`.
#[derive(Debug, Clone, Default, Eq)]
pub struct SignalVector(Vec<Signal>);

impl SignalVector {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self(signals)
    }

    /// `count` channels all carrying `signal`.
    pub fn uniform(signal: Signal, count: usize) -> Self {
        Self(vec![signal; count])
    }

    /// A vector asserting only `index`: every preceding channel is `Unset`.
    pub fn single(index: usize, signal: Signal) -> Self {
        let mut signals = vec![Signal::Unset; index];
        signals.push(signal);
        Self(signals)
    }

    /// Build from electrical levels (as read from digital lines).
    pub fn from_levels(levels: &[bool]) -> Self {
        Self(levels.iter().map(|&high| Signal::from_level(high)).collect())
    }

    pub fn as_slice(&self) -> &[Signal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of channel `index`, or `None` if the vector is shorter.
    pub fn get(&self, index: usize) -> Option<Signal> {
        self.0.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        self.0.iter().copied()
    }

    /// Slice without the trailing run of `Unset` values.
    pub fn significant(&self) -> &[Signal] {
        let len = self
            .0
            .iter()
            .rposition(|s| !s.is_unset())
            .map_or(0, |last| last + 1);
        &self.0[..len]
    }

    /// Drop the trailing run of `Unset` values in place.
    pub fn trim(&mut self) {
        while self.0.last() == Some(&Signal::Unset) {
            self.0.pop();
        }
    }

    /// The first `len` channels; the whole vector when it is shorter.
    pub fn prefix(&self, len: usize) -> SignalVector {
        Self(self.0.iter().take(len).copied().collect())
    }

    pub fn into_inner(self) -> Vec<Signal> {
        self.0
    }
}

impl PartialEq for SignalVector {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl From<Vec<Signal>> for SignalVector {
    fn from(signals: Vec<Signal>) -> Self {
        Self(signals)
    }
}

impl FromIterator<Signal> for SignalVector {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for SignalVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, signal) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{signal}")?;
        }
        write!(f, "]")
    }
}

impl FromStr for SignalVector {
    type Err = CodecError;

    /// Accepts `0`, `1` and `x`/`X`; brackets, commas and whitespace are
    /// ignored, so both `"10x1"` and `"[1, 0, x, 1]"` parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .filter(|c| !matches!(c, '[' | ']' | ',') && !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(Signal::Low),
                '1' => Ok(Signal::High),
                'x' | 'X' => Ok(Signal::Unset),
                other => Err(CodecError::InvalidSymbol { symbol: other }),
            })
            .collect()
    }
}

impl Serialize for SignalVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SignalVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
