// Alarm model types for configuration and events.
//
// Alarms and groups serialize as part of settings.json and of clipboard
// exports; ids are assigned by the registry on load and never persisted.

use serde::{Deserialize, Serialize};

use crate::core::model::{GatherableId, Language, LocationId, TimeWindow};

/// Largest allowed offset: one real day.
pub const MAX_OFFSET_SECS: u32 = 86_400;
/// Longest alarm or group name.
pub const MAX_NAME_LEN: usize = 64;
/// Longest group description.
pub const MAX_DESCRIPTION_LEN: usize = 128;

pub type AlarmId = u64;

/// Sound played when an alarm fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sound {
    #[default]
    None,
    /// One of the game's chat sound effects, `<se.1>` to `<se.16>`.
    Effect(u8),
}

impl Sound {
    pub const MAX_EFFECT: u8 = 16;

    pub fn is_valid(&self) -> bool {
        match self {
            Self::None => true,
            Self::Effect(idx) => (1..=Self::MAX_EFFECT).contains(idx),
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Every selectable sound, silence first.
    pub fn all() -> Vec<Sound> {
        std::iter::once(Self::None)
            .chain((1..=Self::MAX_EFFECT).map(Self::Effect))
            .collect()
    }

    pub fn label(&self) -> String {
        match self {
            Self::None => "No Sound".to_string(),
            Self::Effect(idx) => format!("Sound Effect {idx}"),
        }
    }
}

/// A reminder for one gatherable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    #[serde(skip)]
    pub id: AlarmId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub item: GatherableId,
    /// Seconds before the window opens at which the alarm fires.
    #[serde(default)]
    pub offset_seconds: u32,
    #[serde(default)]
    pub sound: Sound,
    #[serde(default)]
    pub print_message: bool,
    #[serde(default)]
    pub preferred_location: Option<LocationId>,
}

fn default_enabled() -> bool {
    true
}

impl Alarm {
    pub fn new(item: GatherableId) -> Self {
        Self {
            id: 0,
            name: String::new(),
            enabled: true,
            item,
            offset_seconds: 0,
            sound: Sound::None,
            print_message: false,
            preferred_location: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_offset(mut self, offset_seconds: u32) -> Self {
        self.offset_seconds = offset_seconds;
        self
    }

    pub fn with_sound(mut self, sound: Sound) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_message(mut self, print_message: bool) -> Self {
        self.print_message = print_message;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A named, ordered collection of alarms that can be switched as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
}

impl AlarmGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: true,
            alarms: Vec::new(),
        }
    }
}

/// How a fire instant crossed while alarms are suppressed is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionPolicy {
    /// Leave the window unconsumed: the alarm fires as soon as suppression
    /// lifts, provided the window has not ended yet.
    #[default]
    Defer,
    /// Consume the window silently; the reminder is lost.
    Drop,
}

/// Default chat message for fired alarms.
pub const DEFAULT_ALARM_FORMAT: &str = "[Alarm {Alarm}]: {Item} {DelayString}. {Location}";

/// Scheduler configuration - persisted in settings.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSettings {
    /// Master switch for all alarms.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Fire alarms while inside a duty.
    #[serde(default)]
    pub in_duty: bool,
    /// Only fire alarms once a character is logged in.
    #[serde(default = "default_enabled")]
    pub only_when_logged_in: bool,
    /// Chat message template, empty for none.
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub suppression: SuppressionPolicy,
    /// Chime on every Eorzea hour change.
    #[serde(default)]
    pub hour_sound: Sound,
    /// Chime on every weather change.
    #[serde(default)]
    pub weather_sound: Sound,
    /// Language used for item and location names in messages.
    #[serde(default)]
    pub language: Language,
}

fn default_format() -> String {
    DEFAULT_ALARM_FORMAT.to_string()
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            in_duty: false,
            only_when_logged_in: true,
            format: default_format(),
            suppression: SuppressionPolicy::Defer,
            hour_sound: Sound::None,
            weather_sound: Sound::None,
            language: Language::English,
        }
    }
}

/// Session context supplied by the game on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmGate {
    pub in_duty: bool,
    pub logged_in: bool,
}

impl Default for AlarmGate {
    fn default() -> Self {
        Self {
            in_duty: false,
            logged_in: true,
        }
    }
}

impl AlarmSettings {
    /// True when no alarm may fire under the given session context.
    pub fn is_suppressed(&self, gate: AlarmGate) -> bool {
        !self.enabled
            || (gate.in_duty && !self.in_duty)
            || (!gate.logged_in && self.only_when_logged_in)
    }
}

/// Emitted once per alarm per availability window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmFired {
    pub alarm_id: AlarmId,
    pub gatherable_id: GatherableId,
    pub alarm_name: String,
    pub window: TimeWindow,
    pub sound: Sound,
    /// Formatted chat message, present only for alarms that print one.
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    AlarmFired(AlarmFired),
    /// A new Eorzea hour began.
    EorzeaHourChanged { hour: u8, sound: Sound },
    /// Weather rolled over.
    WeatherChanged { sound: Sound },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_validity() {
        assert!(Sound::None.is_valid());
        assert!(Sound::Effect(1).is_valid());
        assert!(Sound::Effect(16).is_valid());
        assert!(!Sound::Effect(0).is_valid());
        assert!(!Sound::Effect(17).is_valid());
        assert_eq!(Sound::all().len(), 17);
        assert!(Sound::all().iter().all(Sound::is_valid));
    }

    #[test]
    fn test_suppression_gates() {
        let settings = AlarmSettings::default();
        assert!(!settings.is_suppressed(AlarmGate::default()));
        assert!(settings.is_suppressed(AlarmGate { in_duty: true, logged_in: true }));
        assert!(settings.is_suppressed(AlarmGate { in_duty: false, logged_in: false }));

        let permissive = AlarmSettings {
            in_duty: true,
            only_when_logged_in: false,
            ..AlarmSettings::default()
        };
        assert!(!permissive.is_suppressed(AlarmGate { in_duty: true, logged_in: false }));

        let disabled = AlarmSettings {
            enabled: false,
            ..AlarmSettings::default()
        };
        assert!(disabled.is_suppressed(AlarmGate::default()));
    }

    #[test]
    fn test_alarm_defaults_from_json() {
        let alarm: Alarm = serde_json::from_str(r#"{ "item": 42 }"#).unwrap();
        assert_eq!(alarm.item, 42);
        assert!(alarm.enabled);
        assert_eq!(alarm.offset_seconds, 0);
        assert_eq!(alarm.sound, Sound::None);

        let settings: AlarmSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AlarmSettings::default());
    }
}
