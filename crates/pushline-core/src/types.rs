use crate::{
    Result,
    constants::{NANOS_PER_MICRO, NANOS_PER_SECOND, PUD_DOWN, PUD_OFF, PUD_UP},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Electrical level sampled from a line (0 or 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawLevel {
    Low,
    High,
}

impl RawLevel {
    /// Build a level from a driver sample, keeping only the lowest bit.
    #[must_use]
    pub fn from_bit(value: u8) -> Self {
        if value & 1 == 1 { Self::High } else { Self::Low }
    }

    #[must_use]
    pub fn as_bit(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }

    #[must_use]
    pub fn is_high(&self) -> bool {
        matches!(self, Self::High)
    }
}

impl From<bool> for RawLevel {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl fmt::Display for RawLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_bit())
    }
}

/// Which raw level counts as "pressed"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveMode {
    /// Pressed when the line reads high.
    ActiveHigh,
    /// Pressed when the line reads low.
    ActiveLow,
}

/// Passive pull resistor applied to the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    #[default]
    Off,
    PullDown,
    PullUp,
}

impl Bias {
    /// Level an otherwise undriven line settles at with this bias.
    #[must_use]
    pub fn idle_level(&self) -> RawLevel {
        match self {
            Bias::PullUp => RawLevel::High,
            Bias::Off | Bias::PullDown => RawLevel::Low,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Bias::Off => "off",
            Bias::PullDown => "pull-down",
            Bias::PullUp => "pull-up",
        };
        write!(f, "{name}")
    }
}

/// Polarity and bias of a button line.
///
/// Immutable once built. The logical (pressed) state is always
/// `raw XOR (mode == ActiveLow)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolarityConfig {
    mode: ActiveMode,
    bias: Bias,
}

impl PolarityConfig {
    #[must_use]
    pub const fn new(mode: ActiveMode, bias: Bias) -> Self {
        Self { mode, bias }
    }

    /// Build the configuration from a legacy PUD value.
    ///
    /// # Errors
    /// Returns `Error::InvalidLegacyPud` if the value is not 0, 1 or 2.
    pub fn from_pud(pud: u8) -> Result<Self> {
        LegacyPud::try_from(pud).map(Self::from)
    }

    #[must_use]
    pub fn mode(&self) -> ActiveMode {
        self.mode
    }

    #[must_use]
    pub fn bias(&self) -> Bias {
        self.bias
    }

    #[must_use]
    pub fn is_active_low(&self) -> bool {
        self.mode == ActiveMode::ActiveLow
    }

    /// Map a raw sample to the logical pressed state.
    #[must_use]
    pub fn logical(&self, raw: RawLevel) -> bool {
        logical(raw, self)
    }
}

/// Map a raw level to the logical pressed state for `cfg`.
///
/// # Examples
///
/// ```
/// use pushline_core::{ActiveMode, Bias, PolarityConfig, RawLevel, logical};
///
/// let pull_up = PolarityConfig::new(ActiveMode::ActiveLow, Bias::PullUp);
/// assert!(!logical(RawLevel::High, &pull_up));
/// assert!(logical(RawLevel::Low, &pull_up));
/// ```
#[must_use]
pub fn logical(raw: RawLevel, cfg: &PolarityConfig) -> bool {
    raw.is_high() != cfg.is_active_low()
}

/// Legacy numeric pull configuration (`0=off`, `1=down`, `2=up`).
///
/// Only a constructor adapter: it always resolves to a [`PolarityConfig`]
/// through the fixed table below and is never consulted afterwards.
///
/// | PUD | Bias     | Polarity   |
/// |-----|----------|------------|
/// | 0   | Off      | ActiveHigh |
/// | 1   | PullDown | ActiveHigh |
/// | 2   | PullUp   | ActiveLow  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LegacyPud {
    Off,
    PullDown,
    PullUp,
}

impl LegacyPud {
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            LegacyPud::Off => PUD_OFF,
            LegacyPud::PullDown => PUD_DOWN,
            LegacyPud::PullUp => PUD_UP,
        }
    }
}

impl TryFrom<u8> for LegacyPud {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            PUD_OFF => Ok(LegacyPud::Off),
            PUD_DOWN => Ok(LegacyPud::PullDown),
            PUD_UP => Ok(LegacyPud::PullUp),
            other => Err(Error::InvalidLegacyPud(other)),
        }
    }
}

impl From<LegacyPud> for u8 {
    fn from(pud: LegacyPud) -> Self {
        pud.as_u8()
    }
}

impl From<LegacyPud> for PolarityConfig {
    fn from(pud: LegacyPud) -> Self {
        match pud {
            LegacyPud::Off => PolarityConfig::new(ActiveMode::ActiveHigh, Bias::Off),
            LegacyPud::PullDown => PolarityConfig::new(ActiveMode::ActiveHigh, Bias::PullDown),
            LegacyPud::PullUp => PolarityConfig::new(ActiveMode::ActiveLow, Bias::PullUp),
        }
    }
}

/// Direction of a detected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Rising,
    Falling,
}

impl EdgeDirection {
    #[must_use]
    pub fn is_rising(&self) -> bool {
        matches!(self, Self::Rising)
    }

    /// Level the line is at right after this edge.
    #[must_use]
    pub fn resulting_level(&self) -> RawLevel {
        match self {
            Self::Rising => RawLevel::High,
            Self::Falling => RawLevel::Low,
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
        }
    }
}

/// Edges a line is configured to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSelector {
    Rising,
    Falling,
    #[default]
    Both,
}

impl EdgeSelector {
    /// Legacy `both_edges` flag: `true` selects both edges, `false` rising only.
    #[must_use]
    pub fn from_both_edges(both_edges: bool) -> Self {
        if both_edges { Self::Both } else { Self::Rising }
    }

    #[must_use]
    pub fn matches(&self, direction: EdgeDirection) -> bool {
        match self {
            Self::Both => true,
            Self::Rising => direction == EdgeDirection::Rising,
            Self::Falling => direction == EdgeDirection::Falling,
        }
    }
}

impl fmt::Display for EdgeSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for EdgeSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rising" => Ok(Self::Rising),
            "falling" => Ok(Self::Falling),
            "both" => Ok(Self::Both),
            _ => Err(Error::InvalidEdgeSelector(s.to_string())),
        }
    }
}

/// Kernel timestamp of an edge, as seconds plus nanoseconds.
///
/// Always normalized so that `0 <= nanoseconds < 1_000_000_000`, including
/// after deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawTimestamp")]
pub struct EdgeTimestamp {
    seconds: i64,
    nanoseconds: i64,
}

/// Serialized form of [`EdgeTimestamp`], before normalization.
#[derive(Deserialize)]
struct RawTimestamp {
    seconds: i64,
    nanoseconds: i64,
}

impl From<RawTimestamp> for EdgeTimestamp {
    fn from(raw: RawTimestamp) -> Self {
        Self::new(raw.seconds, raw.nanoseconds)
    }
}

impl EdgeTimestamp {
    #[must_use]
    pub fn new(seconds: i64, nanoseconds: i64) -> Self {
        Self {
            seconds: seconds + nanoseconds.div_euclid(NANOS_PER_SECOND),
            nanoseconds: nanoseconds.rem_euclid(NANOS_PER_SECOND),
        }
    }

    /// Build a timestamp from a nanosecond count (as reported by the kernel).
    #[must_use]
    pub fn from_nanos(nanos: u64) -> Self {
        let nanos = nanos as i128;
        let per_second = NANOS_PER_SECOND as i128;
        Self {
            seconds: (nanos / per_second) as i64,
            nanoseconds: (nanos % per_second) as i64,
        }
    }

    #[must_use]
    pub fn from_micros(micros: i64) -> Self {
        Self::new(0, micros * NANOS_PER_MICRO)
    }

    #[must_use]
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    #[must_use]
    pub fn nanoseconds(&self) -> i64 {
        self.nanoseconds
    }

    #[must_use]
    pub fn as_nanos(&self) -> i128 {
        i128::from(self.seconds) * i128::from(NANOS_PER_SECOND) + i128::from(self.nanoseconds)
    }

    /// Signed distance from `earlier` to `self` in whole microseconds.
    #[must_use]
    pub fn micros_since(&self, earlier: &EdgeTimestamp) -> i128 {
        (self.as_nanos() - earlier.as_nanos()) / i128::from(NANOS_PER_MICRO)
    }
}

impl fmt::Display for EdgeTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// A detected transition on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeEvent {
    direction: EdgeDirection,
    timestamp: EdgeTimestamp,
}

impl EdgeEvent {
    #[must_use]
    pub fn new(direction: EdgeDirection, timestamp: EdgeTimestamp) -> Self {
        Self {
            direction,
            timestamp,
        }
    }

    #[must_use]
    pub fn rising(timestamp: EdgeTimestamp) -> Self {
        Self::new(EdgeDirection::Rising, timestamp)
    }

    #[must_use]
    pub fn falling(timestamp: EdgeTimestamp) -> Self {
        Self::new(EdgeDirection::Falling, timestamp)
    }

    #[must_use]
    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    #[must_use]
    pub fn timestamp(&self) -> EdgeTimestamp {
        self.timestamp
    }
}
