use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub type GatherableId = u32;
pub type LocationId = u32;

/// Server time in whole seconds since the Unix epoch.
///
/// Signed so that window arithmetic (start minus offset, phase shifts) never
/// has to special-case values before the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerTime(pub i64);

impl ServerTime {
    /// Start of the unbounded window used for resources that are always up.
    pub const MIN: ServerTime = ServerTime(i64::MIN);

    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn secs(self) -> i64 {
        self.0
    }

    pub const fn saturating_sub_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    pub const fn saturating_add_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds from `earlier` to `self` (negative if `earlier` is later).
    pub const fn seconds_since(self, earlier: ServerTime) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.0, 0).single()
    }
}

impl From<DateTime<Utc>> for ServerTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp())
    }
}

impl fmt::Display for ServerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "{}s", self.0),
        }
    }
}

/// Half-open availability interval `[start, end)`. `end == None` means the
/// resource never goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ServerTime,
    pub end: Option<ServerTime>,
}

impl TimeWindow {
    pub const fn bounded(start: ServerTime, end: ServerTime) -> Self {
        Self { start, end: Some(end) }
    }

    pub const fn always() -> Self {
        Self {
            start: ServerTime::MIN,
            end: None,
        }
    }

    pub const fn is_unbounded(&self) -> bool {
        self.end.is_none()
    }

    pub fn contains(&self, t: ServerTime) -> bool {
        t >= self.start && self.end.map_or(true, |end| t < end)
    }

    pub fn has_ended(&self, t: ServerTime) -> bool {
        self.end.is_some_and(|end| t >= end)
    }

    /// Length in seconds, `None` when unbounded.
    pub fn duration(&self) -> Option<i64> {
        self.end.map(|end| end.seconds_since(self.start))
    }
}

/// Client language of the game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    German,
    French,
    Japanese,
    ChineseSimplified,
}

impl Language {
    /// Parse a language tag such as `en`, `de-DE` or `Japanese`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        match primary {
            "en" | "english" => Some(Self::English),
            "de" | "german" | "deutsch" => Some(Self::German),
            "fr" | "french" | "francais" => Some(Self::French),
            "ja" | "jp" | "japanese" => Some(Self::Japanese),
            "zh" | "cn" | "chs" | "chinese" | "chinesesimplified" => Some(Self::ChineseSimplified),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::German => "de",
            Self::French => "fr",
            Self::Japanese => "ja",
            Self::ChineseSimplified => "zh",
        }
    }

    pub fn all() -> &'static [Language] {
        &[
            Self::English,
            Self::German,
            Self::French,
            Self::Japanese,
            Self::ChineseSimplified,
        ]
    }
}

/// Render a span of seconds the way countdowns are shown in chat,
/// e.g. `1d 03h`, `2:05:09`, `4:07`.
pub fn duration_string(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{days}d {hours:02}h")
    } else if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
