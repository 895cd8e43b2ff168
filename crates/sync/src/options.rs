//! Runtime-adjustable knobs for the polling layer.
//!
//! Values mirror what the dashboard surfaces. All are live (pushed through
//! watch channels); none are persisted here. The CLI stores its own defaults
//! in config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often live streams poll. `Off` disables the timers entirely without
/// touching accumulated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PollInterval {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "100ms")]
    Ms100,
    #[serde(rename = "0.5s")]
    Ms500,
    #[serde(rename = "1s")]
    S1,
    #[default]
    #[serde(rename = "5s")]
    S5,
    #[serde(rename = "10s")]
    S10,
    #[serde(rename = "30s")]
    S30,
}

impl PollInterval {
    /// Tick period in milliseconds; `None` means disabled.
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Off => None,
            Self::Ms100 => Some(100),
            Self::Ms500 => Some(500),
            Self::S1 => Some(1_000),
            Self::S5 => Some(5_000),
            Self::S10 => Some(10_000),
            Self::S30 => Some(30_000),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.as_millis().map(Duration::from_millis)
    }

    pub fn is_off(&self) -> bool {
        matches!(self, Self::Off)
    }

    pub fn cycle(&self) -> Self {
        match self {
            Self::Off => Self::Ms100,
            Self::Ms100 => Self::Ms500,
            Self::Ms500 => Self::S1,
            Self::S1 => Self::S5,
            Self::S5 => Self::S10,
            Self::S10 => Self::S30,
            Self::S30 => Self::Off,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Ms100 => "100ms",
            Self::Ms500 => "0.5s",
            Self::S1 => "1s",
            Self::S5 => "5s",
            Self::S10 => "10s",
            Self::S30 => "30s",
        }
    }
}

impl std::fmt::Display for PollInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

impl std::str::FromStr for PollInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "100ms" => Ok(Self::Ms100),
            "0.5s" => Ok(Self::Ms500),
            "1s" => Ok(Self::S1),
            "5s" => Ok(Self::S5),
            "10s" => Ok(Self::S10),
            "30s" => Ok(Self::S30),
            other => Err(format!(
                "unknown poll interval {other:?}, expected one of: off, 100ms, 0.5s, 1s, 5s, 10s, 30s"
            )),
        }
    }
}

/// How far back the message timeline starts. Changing the window resets the
/// accumulated buffer and refetches from the new start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageWindow {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1h")]
    Hour1,
    #[default]
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "5m")]
    Min5,
}

impl MessageWindow {
    /// Window length in milliseconds; `None` means unbounded.
    pub fn span_ms(&self) -> Option<u64> {
        const MINUTE: u64 = 60_000;
        match self {
            Self::All => None,
            Self::Day1 => Some(24 * 60 * MINUTE),
            Self::Hour1 => Some(60 * MINUTE),
            Self::Min30 => Some(30 * MINUTE),
            Self::Min15 => Some(15 * MINUTE),
            Self::Min5 => Some(5 * MINUTE),
        }
    }

    /// Start-of-window timestamp for a given "now", both epoch milliseconds.
    /// `All` starts at zero.
    pub fn start_from(&self, now_ms: u64) -> u64 {
        match self.span_ms() {
            Some(span) => now_ms.saturating_sub(span),
            None => 0,
        }
    }

    pub fn cycle(&self) -> Self {
        match self {
            Self::All => Self::Day1,
            Self::Day1 => Self::Hour1,
            Self::Hour1 => Self::Min30,
            Self::Min30 => Self::Min15,
            Self::Min15 => Self::Min5,
            Self::Min5 => Self::All,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Day1 => "1d",
            Self::Hour1 => "1h",
            Self::Min30 => "30m",
            Self::Min15 => "15m",
            Self::Min5 => "5m",
        }
    }
}

impl std::fmt::Display for MessageWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

impl std::str::FromStr for MessageWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "1d" => Ok(Self::Day1),
            "1h" => Ok(Self::Hour1),
            "30m" => Ok(Self::Min30),
            "15m" => Ok(Self::Min15),
            "5m" => Ok(Self::Min5),
            other => Err(format!(
                "unknown message window {other:?}, expected one of: all, 1d, 1h, 30m, 15m, 5m"
            )),
        }
    }
}
