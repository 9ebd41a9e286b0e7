use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported unit: {0:?}")]
pub struct UnknownUnit(pub String);

/// What the weights of a profile measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    /// Unitless sample counts; also what `"none"` means in trace files.
    #[serde(alias = "none")]
    Count,
    Bytes,
    Percent,
}

impl ProfileUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "nanoseconds",
            Self::Microseconds => "microseconds",
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Count => "count",
            Self::Bytes => "bytes",
            Self::Percent => "percent",
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(
            self,
            Self::Nanoseconds | Self::Microseconds | Self::Milliseconds | Self::Seconds
        )
    }

    /// One second expressed in this unit.
    ///
    /// Used as the width of an empty profile's config space so a time grid can
    /// still be drawn. Non-time units fall back to the millisecond scale.
    pub fn one_second(&self) -> f64 {
        match self {
            Self::Nanoseconds => 1e9,
            Self::Microseconds => 1e6,
            Self::Milliseconds => 1e3,
            Self::Seconds => 1.0,
            Self::Count | Self::Bytes | Self::Percent => 1e3,
        }
    }

    /// Format a value in this unit for display.
    pub fn format_value(&self, value: f64) -> String {
        match self {
            Self::Nanoseconds => format_time(value / 1e6),
            Self::Microseconds => format_time(value / 1e3),
            Self::Milliseconds => format_time(value),
            Self::Seconds => format_time(value * 1e3),
            Self::Count => {
                if value >= 1_000_000.0 {
                    format!("{:.1}M", value / 1_000_000.0)
                } else if value >= 1_000.0 {
                    format!("{:.1}K", value / 1_000.0)
                } else {
                    format!("{value:.0}")
                }
            }
            Self::Bytes => {
                if value >= 1_073_741_824.0 {
                    format!("{:.2} GB", value / 1_073_741_824.0)
                } else if value >= 1_048_576.0 {
                    format!("{:.1} MB", value / 1_048_576.0)
                } else if value >= 1024.0 {
                    format!("{:.1} KB", value / 1024.0)
                } else {
                    format!("{value:.0} B")
                }
            }
            Self::Percent => format!("{value:.2}%"),
        }
    }
}

/// `ms` is a duration in milliseconds.
fn format_time(ms: f64) -> String {
    if ms >= 1_000.0 {
        format!("{:.2}s", ms / 1_000.0)
    } else if ms >= 1.0 {
        format!("{ms:.1}ms")
    } else if ms >= 0.001 {
        format!("{:.0}µs", ms * 1_000.0)
    } else {
        format!("{:.0}ns", ms * 1_000_000.0)
    }
}

impl FromStr for ProfileUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nanoseconds" => Ok(Self::Nanoseconds),
            "microseconds" => Ok(Self::Microseconds),
            "milliseconds" => Ok(Self::Milliseconds),
            "seconds" => Ok(Self::Seconds),
            "count" | "none" => Ok(Self::Count),
            "bytes" => Ok(Self::Bytes),
            "percent" => Ok(Self::Percent),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProfileUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
